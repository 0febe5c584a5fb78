use serde::{Deserialize, Serialize};

/// A struct that represents an error with a context and possibly the propagated source error.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ContextError {
    pub context: String,
    pub source_error: Option<String>,
}

impl std::fmt::Display for ContextError {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.source_error {
            Some(source_error) => write!(
                formatter,
                "{}: {}",
                self.context,
                minimize_first_letter(source_error.to_string()),
            ),
            None => write!(formatter, "{}", self.context),
        }
    }
}

impl std::error::Error for ContextError {}

impl ContextError {
    /// Create a new `ContextError` with the given context.
    pub fn with_context<S: Into<String>>(context: S) -> ContextError {
        ContextError {
            context: context.into(),
            source_error: None,
        }
    }

    /// Create a new `ContextError` with the given context and source error.
    pub fn with_error<S: Into<String>>(context: S, error: &dyn std::error::Error) -> ContextError {
        ContextError {
            context: context.into(),
            source_error: Some(error.to_string()),
        }
    }
}

/// The errors raised by the document model when a field is addressed incorrectly.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldError {
    /// The field name is not declared by the document type.
    UnknownField { document: String, field: String },
    /// The value does not match the declared kind of the field.
    KindMismatch {
        field: String,
        expected: &'static str,
        found: &'static str,
    },
    /// The value has the right kind but is not acceptable for the field.
    InvalidValue { field: String, reason: String },
    /// The signatures of the document were locked and can no longer be edited.
    SignaturesLocked { field: String },
    /// Locking was requested while every signature field is still blank.
    NoSignatureToLock,
}

impl std::fmt::Display for FieldError {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldError::UnknownField { document, field } => write!(
                formatter,
                "The field {:?} is not declared by the document {:?}",
                field, document
            ),
            FieldError::KindMismatch {
                field,
                expected,
                found,
            } => write!(
                formatter,
                "The field {:?} expects a {} value but was given a {} value",
                field, expected, found
            ),
            FieldError::InvalidValue { field, reason } => {
                write!(formatter, "Invalid value for the field {:?}: {}", field, reason)
            }
            FieldError::SignaturesLocked { field } => write!(
                formatter,
                "The signatures are locked, the field {:?} can no longer be changed",
                field
            ),
            FieldError::NoSignatureToLock => write!(
                formatter,
                "Please add at least one signature before locking."
            ),
        }
    }
}

impl std::error::Error for FieldError {}

/// The stage of the export pipeline in which an error happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportStage {
    /// Loading the typefaces and the other lazily loaded resources.
    LoadingResources,
    /// Rasterizing the page sections.
    Rasterization,
    /// Placing the rasters onto the PDF pages and encoding the document.
    Pagination,
    /// Writing the document to disk or handing it to the bridge.
    Delivery,
}

impl std::fmt::Display for ExportStage {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let stage = match self {
            ExportStage::LoadingResources => "loading resources",
            ExportStage::Rasterization => "rasterization",
            ExportStage::Pagination => "pagination",
            ExportStage::Delivery => "delivery",
        };
        write!(formatter, "{}", stage)
    }
}

/// An error which aborted a whole export, tagged with the stage it happened in.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportError {
    pub stage: ExportStage,
    pub error: ContextError,
}

impl ExportError {
    pub fn new(stage: ExportStage, error: ContextError) -> Self {
        ExportError { stage, error }
    }

    /// The single message which is shown to the user when the export fails.
    pub fn user_message(&self) -> String {
        match self.stage {
            ExportStage::Delivery => format!(
                "The document was generated but could not be saved: {}. Please try again.",
                self.error
            ),
            _ => "Failed to generate PDF. Please try again.".to_string(),
        }
    }
}

impl std::fmt::Display for ExportError {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "Export failed during {}: {}", self.stage, self.error)
    }
}

impl std::error::Error for ExportError {}

/// Minimizes the first letter of a string, it is used for standardizing the error message.
fn minimize_first_letter(string: String) -> String {
    let mut characters = string.chars();
    match characters.next() {
        None => String::new(),
        Some(character) => character.to_lowercase().chain(characters).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_error_is_appended_with_a_lowercase_letter() {
        let source = ContextError::with_context("Unexpected end of file");
        let error = ContextError::with_error("Failed to decode the signature", &source);

        assert_eq!(
            error.to_string(),
            "Failed to decode the signature: unexpected end of file"
        );
    }

    #[test]
    fn export_errors_before_delivery_share_one_message() {
        let rasterization = ExportError::new(
            ExportStage::Rasterization,
            ContextError::with_context("Zero sized raster"),
        );
        let pagination = ExportError::new(
            ExportStage::Pagination,
            ContextError::with_context("Failed to encode"),
        );

        assert_eq!(rasterization.user_message(), pagination.user_message());
        assert!(rasterization.to_string().contains("rasterization"));
    }
}
