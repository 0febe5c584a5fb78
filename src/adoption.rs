use crate::{
    capture::{DrawSurface, TypeSurface, TypedMark, DEFAULT_PAD_SIZE},
    error::ContextError,
    identity::AdoptedIdentity,
    loader::ResourceLoader,
    signature::SignatureImage,
    typeface::Typeface,
};

/// The way the marks are being captured in the dialog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CaptureMode {
    #[default]
    Draw,
    Type,
}

/// The dialog in which the signer draws or types their signature (and initials, when the
/// document uses them) before adopting it for the session.
pub struct AdoptionDialog {
    mode: CaptureMode,
    needs_initials: bool,
    /// The marks the dialog was opened with, restored whenever the draw mode is entered.
    initial_signature: SignatureImage,
    initial_initials: SignatureImage,
    signature_pad: DrawSurface,
    initials_pad: DrawSurface,
    typed_signature: TypeSurface,
    typed_initials: TypeSurface,
    cursive: ResourceLoader<Box<dyn Typeface>>,
}

impl AdoptionDialog {
    /// Creates the dialog, the cursive typeface is only loaded once something is typed.
    pub fn new(
        needs_initials: bool,
        cursive: ResourceLoader<Box<dyn Typeface>>,
    ) -> Result<Self, ContextError> {
        let (pad_width, pad_height) = DEFAULT_PAD_SIZE;
        Ok(AdoptionDialog {
            mode: CaptureMode::Draw,
            needs_initials,
            initial_signature: SignatureImage::empty(),
            initial_initials: SignatureImage::empty(),
            signature_pad: DrawSurface::new(pad_width, pad_height)?,
            initials_pad: DrawSurface::new(pad_width / 2, pad_height)?,
            typed_signature: TypeSurface::new(TypedMark::Signature),
            typed_initials: TypeSurface::new(TypedMark::Initials),
            cursive,
        })
    }

    /// Opens the dialog in draw mode on the marks adopted so far, with empty typed text.
    pub fn open(
        &mut self,
        initial_signature: SignatureImage,
        initial_initials: SignatureImage,
    ) -> Result<(), ContextError> {
        self.initial_signature = initial_signature;
        self.initial_initials = if self.needs_initials {
            initial_initials
        } else {
            SignatureImage::empty()
        };
        self.typed_signature.clear_text();
        self.typed_initials.clear_text();
        self.mode = CaptureMode::Draw;
        self.restore_initial_marks()
    }

    /// Switches between drawing and typing. Entering the draw mode restores the marks the
    /// dialog was opened with; entering the type mode shows whatever is typed, if anything.
    pub fn set_mode(&mut self, mode: CaptureMode) -> Result<(), ContextError> {
        if self.mode == mode {
            return Ok(());
        }

        self.mode = mode;
        match mode {
            CaptureMode::Draw => self.restore_initial_marks(),
            CaptureMode::Type => Ok(()),
        }
    }

    pub fn mode(&self) -> CaptureMode {
        self.mode
    }

    pub fn signature_pad(&mut self) -> &mut DrawSurface {
        &mut self.signature_pad
    }

    pub fn initials_pad(&mut self) -> &mut DrawSurface {
        &mut self.initials_pad
    }

    pub fn set_typed_name(&mut self, text: &str) -> Result<(), ContextError> {
        if text.trim().is_empty() {
            self.typed_signature.clear_text();
            return Ok(());
        }
        let typeface = self.cursive.load()?;
        self.typed_signature.set_text(text, typeface.as_ref())
    }

    pub fn set_typed_initials(&mut self, text: &str) -> Result<(), ContextError> {
        if text.trim().is_empty() {
            self.typed_initials.clear_text();
            return Ok(());
        }
        let typeface = self.cursive.load()?;
        self.typed_initials.set_text(text, typeface.as_ref())
    }

    /// The signature currently shown by the active mode.
    pub fn local_signature(&self) -> &SignatureImage {
        match self.mode {
            CaptureMode::Draw => self.signature_pad.latest(),
            CaptureMode::Type => self.typed_signature.latest(),
        }
    }

    /// The initials currently shown by the active mode, `None` when the document has none.
    pub fn local_initials(&self) -> Option<&SignatureImage> {
        if !self.needs_initials {
            return None;
        }
        Some(match self.mode {
            CaptureMode::Draw => self.initials_pad.latest(),
            CaptureMode::Type => self.typed_initials.latest(),
        })
    }

    /// Whether every required mark is shown and not empty.
    pub fn is_ready(&self) -> bool {
        !self.local_signature().is_empty()
            && self.local_initials().map_or(true, |initials| !initials.is_empty())
    }

    /// Hands the shown marks over to the identity store. Returns whether anything was
    /// adopted, nothing is when a required mark is still missing.
    pub fn adopt(&self, identity: &mut AdoptedIdentity) -> bool {
        if !self.is_ready() {
            log::warn!("Unable to adopt the signature, a required mark is missing");
            return false;
        }

        identity.adopt(
            self.local_signature().clone(),
            self.local_initials().cloned(),
        );
        true
    }

    fn restore_initial_marks(&mut self) -> Result<(), ContextError> {
        self.signature_pad.load(&self.initial_signature)?;
        self.initials_pad.load(&self.initial_initials)
    }
}
