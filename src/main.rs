#![warn(clippy::unwrap_used)]

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use contractr::{
    adoption::{AdoptionDialog, CaptureMode},
    bridge::{DataBridge, HttpBridge, SignatureRequestDraft},
    catalog::DocumentType,
    config::AppConfiguration,
    document::{DocumentDescriptor, DocumentModel, FieldKind},
    error::ContextError,
    export::{BridgeUpload, Delivery, Exporter, LocalDownload},
    identity::{AdoptedIdentity, ApplyOutcome},
    lead::Lead,
    loader::ResourceLoader,
    signature::{SignatureImage, SignatureMode},
    typeface::{FontFace, Typeface},
};

#[derive(Parser)]
#[command(version, long_about = None)]
struct CliArguments {
    #[arg(long = "config", help = "Path to the application configuration in the JSON format")]
    configuration_path: Option<PathBuf>,
    #[arg(long = "verbose", help = "Print the debug messages")]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

/// The document to work on and the values it is filled in with.
#[derive(clap::Args)]
struct DocumentArguments {
    #[arg(long = "document-type", help = "One of the built-in document types", value_enum)]
    document_type: Option<DocumentType>,
    #[arg(
        long = "descriptor-path",
        help = "Path to a custom document descriptor in the JSON format"
    )]
    descriptor_path: Option<PathBuf>,
    #[arg(long = "values-path", help = "Path to the form values in the JSON format")]
    values_path: Option<PathBuf>,
    #[arg(long = "lead-path", help = "Path to the lead to prefill the form from")]
    lead_path: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Generates the PDF of a document and saves or uploads it
    Export {
        #[command(flatten)]
        document: DocumentArguments,
        #[arg(long = "signature-path", help = "PNG image of the adopted signature")]
        signature_path: Option<PathBuf>,
        #[arg(long = "initials-path", help = "PNG image of the adopted initials")]
        initials_path: Option<PathBuf>,
        #[arg(long = "typed-name", help = "Type the signature instead of reading an image")]
        typed_name: Option<String>,
        #[arg(long = "typed-initials", help = "Initials typed along with --typed-name")]
        typed_initials: Option<String>,
        #[arg(long = "cursive-typeface-path", help = "TTF/OTF typeface of the typed marks")]
        cursive_typeface_path: Option<PathBuf>,
        #[arg(long = "lock-signatures", help = "Lock the signatures once applied")]
        lock_signatures: bool,
        #[arg(long = "typeface-path", help = "TTF/OTF typeface used to paint the pages")]
        typeface_path: Option<PathBuf>,
        #[arg(long = "output-directory", help = "Directory the PDF is saved to")]
        output_directory: Option<PathBuf>,
        #[arg(long = "upload", help = "Upload the PDF to the lead with this identifier")]
        upload_lead_id: Option<String>,
    },
    /// Searches the leads matching a query
    Search { query: String },
    /// Emails a signing link for a document to a lead
    RequestSignature {
        #[command(flatten)]
        document: DocumentArguments,
        #[arg(long = "lead-id")]
        lead_id: String,
        #[arg(long = "email", help = "Address the signing link is sent to")]
        email: String,
    },
    /// Signs the document of a signature request
    Sign {
        #[arg(long = "token")]
        token: String,
        #[arg(long = "signature-path", help = "PNG image of the signature")]
        signature_path: PathBuf,
        #[arg(long = "ip-address", default_value = "127.0.0.1")]
        ip_address: String,
    },
    /// Checks that the configuration has every required key
    CheckConfig,
}

fn main() {
    if let Err(error) = fallible_main() {
        log::error!("{}", error);
        std::process::exit(1);
    }
}

fn fallible_main() -> Result<(), ContextError> {
    let cli_arguments = CliArguments::parse();
    env_logger::builder()
        .filter_level(if cli_arguments.verbose {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Info
        })
        .init();

    let configuration = cli_arguments
        .configuration_path
        .as_deref()
        .map(AppConfiguration::from_path)
        .transpose()?;

    match cli_arguments.command {
        Command::Export {
            document,
            signature_path,
            initials_path,
            typed_name,
            typed_initials,
            cursive_typeface_path,
            lock_signatures,
            typeface_path,
            output_directory,
            upload_lead_id,
        } => {
            let mut model = open_document(&document)?;
            let mut identity = AdoptedIdentity::new(model.descriptor().needs_initials);
            if let Some(typed_name) = typed_name {
                let cursive_typeface_path = cursive_typeface_path
                    .or_else(|| {
                        configuration
                            .as_ref()
                            .and_then(|configuration| configuration.cursive_typeface_path.clone())
                    })
                    .ok_or_else(|| {
                        ContextError::with_context(
                            "Typing a signature requires --cursive-typeface-path or cursiveTypefacePath",
                        )
                    })?;
                adopt_typed_marks(
                    &mut identity,
                    cursive_typeface_path,
                    &typed_name,
                    typed_initials.as_deref().unwrap_or_default(),
                )?;
                apply_signatures(&mut model, &identity)?;
            } else if let Some(signature_path) = signature_path {
                let initials = initials_path.as_deref().map(read_signature).transpose()?;
                identity.adopt(read_signature(&signature_path)?, initials);
                apply_signatures(&mut model, &identity)?;
            }
            if lock_signatures {
                model.lock_signatures().map_err(|error| {
                    ContextError::with_error("Unable to lock the signatures", &error)
                })?;
            }

            let typeface_path = typeface_path
                .or_else(|| {
                    configuration
                        .as_ref()
                        .and_then(|configuration| configuration.body_typeface_path.clone())
                })
                .ok_or_else(|| {
                    ContextError::with_context(
                        "A typeface is required, pass --typeface-path or set bodyTypefacePath",
                    )
                })?;
            let exporter = Exporter::with_typeface_path(&typeface_path);

            let delivery = match upload_lead_id {
                Some(lead_id) => {
                    let bridge = connect(configuration.as_ref())?;
                    exporter.export_to(&model, &mut BridgeUpload::new(&bridge, lead_id))
                }
                None => {
                    let output_directory = output_directory
                        .or_else(|| {
                            configuration
                                .as_ref()
                                .map(|configuration| configuration.output_directory.clone())
                        })
                        .unwrap_or_else(|| PathBuf::from("."));
                    exporter.export_to(&model, &mut LocalDownload::new(output_directory))
                }
            }
            .map_err(|error| ContextError::with_context(error.user_message()))?;

            match delivery {
                Delivery::Saved(file_path) => println!("{}", file_path.display()),
                Delivery::Uploaded(receipt) => println!("{}", receipt.view_url),
            }
        }
        Command::Search { query } => {
            let bridge = connect(configuration.as_ref())?;
            let leads = bridge
                .search_leads(&query)
                .map_err(|error| ContextError::with_context(error.user_message()))?;
            for lead in leads {
                let lead_line = serde_json::to_string(&lead).map_err(|error| {
                    ContextError::with_error("Unable to serialize the lead", &error)
                })?;
                println!("{}", lead_line);
            }
        }
        Command::RequestSignature {
            document,
            lead_id,
            email,
        } => {
            let model = open_document(&document)?;
            let bridge = connect(configuration.as_ref())?;
            let signature_request = bridge
                .create_signature_request(SignatureRequestDraft {
                    lead_id,
                    contract_type: model.descriptor().contract_type.clone(),
                    contract_data: model.snapshot(),
                    lead_email: email,
                })
                .map_err(|error| ContextError::with_context(error.user_message()))?;
            log::info!(
                "The signature request expires on {}",
                signature_request.expires_at
            );
            println!("{}", signature_request.token);
        }
        Command::Sign {
            token,
            signature_path,
            ip_address,
        } => {
            let signature = read_signature(&signature_path)?;
            let bridge = connect(configuration.as_ref())?;
            let signed_contract = bridge
                .record_signature(&token, &signature.to_data_url(), &ip_address)
                .map_err(|error| ContextError::with_context(error.user_message()))?;
            println!("{}", signed_contract.id);
        }
        Command::CheckConfig => {
            let configuration = configuration.ok_or_else(|| {
                ContextError::with_context("Pass the configuration to check with --config")
            })?;
            configuration.validate()?;
            log::info!("The configuration is complete");
        }
    }

    Ok(())
}

fn open_document(arguments: &DocumentArguments) -> Result<DocumentModel, ContextError> {
    let descriptor = match (&arguments.descriptor_path, arguments.document_type) {
        (Some(descriptor_path), _) => DocumentDescriptor::from_path(descriptor_path)?,
        (None, Some(document_type)) => document_type.descriptor(),
        (None, None) => {
            return Err(ContextError::with_context(
                "Pass either --document-type or --descriptor-path",
            ))
        }
    };
    let mut model = DocumentModel::new(descriptor)?;

    if let Some(lead_path) = &arguments.lead_path {
        let lead = Lead::from_path(lead_path)?;
        let prefilled_count = model.prefill_from_lead(&lead);
        log::debug!("Prefilled {} fields from the lead {}", prefilled_count, lead.id);
    }
    if let Some(values_path) = &arguments.values_path {
        let values_contents = std::fs::read_to_string(values_path).map_err(|error| {
            ContextError::with_error(format!("Unable to read the values {:?}", values_path), &error)
        })?;
        let values: serde_json::Value = serde_json::from_str(&values_contents).map_err(|error| {
            ContextError::with_error(format!("Unable to parse the values {:?}", values_path), &error)
        })?;
        model
            .set_from_json(&values)
            .map_err(|error| ContextError::with_error("Unable to fill in the form", &error))?;
    }

    Ok(model)
}

fn read_signature(signature_path: &Path) -> Result<SignatureImage, ContextError> {
    let png_bytes = std::fs::read(signature_path).map_err(|error| {
        ContextError::with_error(
            format!("Unable to read the signature {:?}", signature_path),
            &error,
        )
    })?;

    SignatureImage::from_png(png_bytes, SignatureMode::Drawn)
}

/// Renders the typed name and initials in the cursive typeface and adopts them.
fn adopt_typed_marks(
    identity: &mut AdoptedIdentity,
    cursive_typeface_path: PathBuf,
    typed_name: &str,
    typed_initials: &str,
) -> Result<(), ContextError> {
    let cursive = ResourceLoader::new("cursive typeface", move || {
        Ok(Box::new(FontFace::from_path(&cursive_typeface_path)?) as Box<dyn Typeface>)
    });
    let mut dialog = AdoptionDialog::new(identity.needs_initials(), cursive)?;
    dialog.set_mode(CaptureMode::Type)?;
    dialog.set_typed_name(typed_name)?;
    dialog.set_typed_initials(typed_initials)?;

    if !dialog.adopt(identity) {
        return Err(ContextError::with_context(
            "Type the name, and the initials when the document needs them",
        ));
    }

    Ok(())
}

/// Applies the adopted marks to every blank signature field of the document.
fn apply_signatures(
    model: &mut DocumentModel,
    identity: &AdoptedIdentity,
) -> Result<(), ContextError> {
    if !identity.is_ready() {
        log::warn!("Some of the required marks are missing");
    }

    let blank_signature_fields: Vec<_> = model
        .fields()
        .iter()
        .filter_map(|field| match field.kind {
            FieldKind::Signature { mark } => Some((field.name.clone(), mark)),
            _ => None,
        })
        .filter(|(name, _)| {
            model
                .field(name)
                .ok()
                .and_then(|value| value.as_signature())
                .is_some_and(SignatureImage::is_empty)
        })
        .collect();

    for (name, mark) in blank_signature_fields {
        let outcome = identity
            .apply_to(model, &name, mark)
            .map_err(|error| ContextError::with_error("Unable to apply the signature", &error))?;
        if outcome == ApplyOutcome::Applied {
            log::debug!("Signed the field {:?}", name);
        }
    }

    Ok(())
}

fn connect(configuration: Option<&AppConfiguration>) -> Result<HttpBridge, ContextError> {
    let configuration = configuration.ok_or_else(|| {
        ContextError::with_context("Pass the configuration of the backend with --config")
    })?;

    HttpBridge::from_configuration(configuration)
}
