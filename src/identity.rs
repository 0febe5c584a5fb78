use crate::{
    document::{DocumentModel, FieldKind, FieldValue},
    error::FieldError,
    signature::{MarkKind, SignatureImage},
};

/// What happened when an adopted mark was applied to a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    Applied,
    /// Nothing was adopted for this mark yet, the field was left unchanged.
    NothingAdopted,
}

/// The signature and initials adopted once per session and then applied to any number
/// of signature fields.
#[derive(Debug, Clone, Default)]
pub struct AdoptedIdentity {
    signature: Option<SignatureImage>,
    initials: Option<SignatureImage>,
    needs_initials: bool,
}

impl AdoptedIdentity {
    pub fn new(needs_initials: bool) -> Self {
        AdoptedIdentity {
            signature: None,
            initials: None,
            needs_initials,
        }
    }

    /// Replaces both stored marks. Initials given to a document type that does not use
    /// them are dropped.
    pub fn adopt(&mut self, signature: SignatureImage, initials: Option<SignatureImage>) {
        self.signature = Some(signature);
        self.initials = if self.needs_initials { initials } else { None };
        log::debug!(
            "Adopted a {:?} signature{}",
            self.signature.as_ref().map(SignatureImage::mode),
            if self.initials.is_some() { " with initials" } else { "" }
        );
    }

    /// Whether every required mark is present and not the empty signature.
    pub fn is_ready(&self) -> bool {
        let is_present = |mark: &Option<SignatureImage>| {
            mark.as_ref().is_some_and(|image| !image.is_empty())
        };
        is_present(&self.signature) && (!self.needs_initials || is_present(&self.initials))
    }

    pub fn needs_initials(&self) -> bool {
        self.needs_initials
    }

    pub fn signature(&self) -> Option<&SignatureImage> {
        self.signature.as_ref()
    }

    pub fn initials(&self) -> Option<&SignatureImage> {
        self.initials.as_ref()
    }

    pub fn mark(&self, mark: MarkKind) -> Option<&SignatureImage> {
        match mark {
            MarkKind::Signature => self.signature(),
            MarkKind::Initials => self.initials(),
        }
    }

    /// Copies the stored mark into the named signature field of the document. The field
    /// receives its own copy, so adopting again later leaves it untouched.
    pub fn apply_to(
        &self,
        document: &mut DocumentModel,
        field: &str,
        mark: MarkKind,
    ) -> Result<ApplyOutcome, FieldError> {
        let field_kind = &document.field_spec(field)?.kind;
        if !matches!(field_kind, FieldKind::Signature { .. }) {
            return Err(FieldError::KindMismatch {
                field: field.to_string(),
                expected: field_kind.name(),
                found: "signature",
            });
        }

        match self.mark(mark).filter(|image| !image.is_empty()) {
            Some(image) => {
                document.set_field(field, FieldValue::Signature(image.clone()))?;
                Ok(ApplyOutcome::Applied)
            }
            None => {
                log::warn!(
                    "No {:?} has been adopted yet, the field {:?} is left unchanged",
                    mark,
                    field
                );
                Ok(ApplyOutcome::NothingAdopted)
            }
        }
    }
}
