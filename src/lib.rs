//! Contractr captures signatures on construction contract forms and turns the filled-in forms
//! into paginated A4 PDF documents, which can then be saved locally or uploaded to the backend
//! where the leads, the contracts and the remote signature requests are kept.
//!
//! The pipeline is driven by a `DocumentDescriptor`, which declares the fields, the ordered page
//! sections and the page margins of a document type. A `DocumentModel` holds the values of one
//! document; each of its sections is laid out, rasterized and placed on its own page of a
//! `PdfDocument` by the `Exporter`.

/// The dialog in which the signer adopts a drawn or typed signature for the session.
pub mod adoption;

/// The backend of the forms: lead search, contract upload and remote signing.
///
/// # Introduction
///
/// Every call goes through the `DataBridge` trait. `HttpBridge` talks to the real backend with a
/// blocking client and a client-side timeout, while `InMemoryBridge` implements the same rules
/// in memory (sessions, search ordering, token expiry) and is what the tests run against.
pub mod bridge;

/// The surfaces on which signatures are drawn with a pointer or typed in a cursive typeface.
///
/// Every visual change of a surface is reported synchronously through its `on_change` listener
/// and the latest reported image is the authoritative value of the surface. A surface with no
/// ink always reports the empty signature.
pub mod capture;

/// The built-in document types with their fields, sections and fixed company details.
pub mod catalog;

/// The application configuration read from a JSON file.
pub mod config;

/// The module where the `DocumentDescriptor` and the `DocumentModel` are presented.
///
/// # Introduction
///
/// A descriptor declares the fields of a document type once, with their kind and default, and
/// partitions them into page sections. The model is the typed store of the values of a single
/// document: addressing a field which is not declared, or giving it a value of the wrong kind,
/// is reported as a `FieldError`. Select fields come with a generated `<name>Custom` text field
/// which replaces the chosen option whenever the option is `"Other"`.
pub mod document;

/// This module contains the `ContextError` type which is the error type used throughout this library,
/// together with the errors callers need to branch on.
///
/// The `ContextError` type is always returned from a `Result` type, which means that the end user can
/// expect to obtain an explanation whenever a function returns an error. If an error happened in a
/// function which was called inside a function of this library, then the user can expect to also obtain
/// information about this propagated error.
pub mod error;

/// The export pipeline, from the filled-in document to the saved or uploaded PDF.
pub mod export;

/// The signature and initials adopted once and then applied to any number of fields.
pub mod identity;

/// The visual tree of the page sections and its print normalization.
pub mod layout;

/// The leads as stored by the backend and their prefill attributes.
pub mod lead;

/// Lazily loaded resources which can be reset.
pub mod loader;

/// The placement of the rendered pages on the pages of the PDF document.
pub mod paginate;

/// The module were the `PdfDocument` interface for working with PDF documents is presented.
///
/// # Introduction
///
/// The main component of this module is the struct `PdfDocument`. For it, convenience functions
/// such as `add_page_with_layer`, `add_image`, `place_image_on_layer_in_page`, `write_all` and
/// `save_to_bytes` are implemented, which allow the end user to interact with a PDF document in a
/// meaningful way, while keeping all the complexity hidden below a curtain of private methods.
/// The images are embedded as Flate compressed XObjects with a soft mask for their transparency.
pub mod pdf;

/// The capture of the page sections as raster images at a fixed width and scale.
pub mod raster;

/// The `SignatureImage` type and its PNG data URL encoding.
pub mod signature;

/// The typefaces used to paint the page text and the typed signatures.
pub mod typeface;
