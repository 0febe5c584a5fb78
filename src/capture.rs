use image::{Rgba, RgbaImage};
use tiny_skia::{
    Color, FillRule, FilterQuality, LineCap, LineJoin, Paint, PathBuilder, Pixmap, PixmapPaint,
    Stroke, Transform,
};
use unicode_normalization::UnicodeNormalization as _;

use crate::{
    error::ContextError,
    signature::{SignatureImage, SignatureMode},
    typeface::Typeface,
};

/// The default size of the freehand signature pad, in pixels.
pub const DEFAULT_PAD_SIZE: (u32, u32) = (600, 128);

const STROKE_WIDTH: f32 = 2.0;
const TYPED_PADDING: f32 = 10.0;

type ChangeListener = Box<dyn FnMut(&SignatureImage)>;

/// Keeps the image last reported by a surface and forwards every report to the listener.
#[derive(Default)]
struct ChangeReporter {
    latest: SignatureImage,
    listener: Option<ChangeListener>,
}

impl ChangeReporter {
    fn report(&mut self, image: SignatureImage) {
        self.latest = image;
        if let Some(listener) = self.listener.as_mut() {
            listener(&self.latest);
        }
    }
}

/// The stroke being drawn between a pointer-down and the matching pointer-up.
#[derive(Debug, Clone, Copy)]
struct StrokeInProgress {
    last_point: (f32, f32),
    segment_count: usize,
}

/// A fixed-size pad which turns pointer strokes into a signature image.
///
/// Every visual change is reported synchronously through the listener set with `on_change`:
/// the end of a stroke reports a snapshot of the whole pad, `clear` reports the empty signature.
pub struct DrawSurface {
    pixmap: Pixmap,
    stroke: Option<StrokeInProgress>,
    has_ink: bool,
    reporter: ChangeReporter,
}

impl DrawSurface {
    pub fn new(width: u32, height: u32) -> Result<Self, ContextError> {
        let pixmap = Pixmap::new(width, height).ok_or_else(|| {
            ContextError::with_context(format!(
                "Unable to allocate a signature pad of {}x{} pixels",
                width, height
            ))
        })?;

        Ok(DrawSurface {
            pixmap,
            stroke: None,
            has_ink: false,
            reporter: ChangeReporter::default(),
        })
    }

    /// Sets the function called with the new image after every visual change.
    pub fn on_change<F>(&mut self, listener: F)
    where
        F: FnMut(&SignatureImage) + 'static,
    {
        self.reporter.listener = Some(Box::new(listener));
    }

    pub fn pointer_down(&mut self, x: f32, y: f32) {
        self.stroke = Some(StrokeInProgress {
            last_point: (x, y),
            segment_count: 0,
        });
    }

    /// Extends the current stroke up to the given point, ignored when no stroke was started.
    pub fn pointer_move(&mut self, x: f32, y: f32) {
        let Some(stroke) = self.stroke.as_mut() else {
            return;
        };

        let mut path_builder = PathBuilder::new();
        path_builder.move_to(stroke.last_point.0, stroke.last_point.1);
        path_builder.line_to(x, y);
        stroke.last_point = (x, y);
        // A zero-length segment has no path
        let Some(path) = path_builder.finish() else {
            return;
        };

        let stroke_style = Stroke {
            width: STROKE_WIDTH,
            line_cap: LineCap::Round,
            line_join: LineJoin::Round,
            ..Stroke::default()
        };
        self.pixmap
            .stroke_path(&path, &ink(), &stroke_style, Transform::identity(), None);
        stroke.segment_count += 1;
        self.has_ink = true;
    }

    /// Ends the current stroke and reports a snapshot of the pad. A tap without any movement
    /// leaves a dot.
    pub fn pointer_up(&mut self) -> Result<(), ContextError> {
        let Some(stroke) = self.stroke.take() else {
            return Ok(());
        };

        if stroke.segment_count == 0 {
            let (x, y) = stroke.last_point;
            if let Some(dot) = PathBuilder::from_circle(x, y, STROKE_WIDTH / 2.0) {
                self.pixmap.fill_path(
                    &dot,
                    &ink(),
                    FillRule::Winding,
                    Transform::identity(),
                    None,
                );
                self.has_ink = true;
            }
        }

        let snapshot = self.snapshot()?;
        self.reporter.report(snapshot);
        Ok(())
    }

    /// The pointer leaving the pad ends the stroke like a pointer-up.
    pub fn pointer_leave(&mut self) -> Result<(), ContextError> {
        self.pointer_up()
    }

    /// Wipes the pad and reports the empty signature.
    pub fn clear(&mut self) {
        self.pixmap.fill(Color::TRANSPARENT);
        self.stroke = None;
        self.has_ink = false;
        self.reporter.report(SignatureImage::empty());
    }

    /// Replaces the content of the pad with a previously adopted image, drawn centered and
    /// scaled to fit. The loaded image becomes the current value without being reported.
    pub fn load(&mut self, image: &SignatureImage) -> Result<(), ContextError> {
        self.pixmap.fill(Color::TRANSPARENT);
        self.stroke = None;
        self.has_ink = false;
        self.reporter.latest = image.clone();
        if image.is_empty() {
            return Ok(());
        }

        let source = Pixmap::decode_png(image.png_bytes()).map_err(|error| {
            ContextError::with_error("Unable to decode the signature to load", &error)
        })?;
        let scale = (self.pixmap.width() as f32 / source.width() as f32)
            .min(self.pixmap.height() as f32 / source.height() as f32);
        let offset_x = (self.pixmap.width() as f32 - source.width() as f32 * scale) / 2.0;
        let offset_y = (self.pixmap.height() as f32 - source.height() as f32 * scale) / 2.0;
        let paint = PixmapPaint {
            quality: FilterQuality::Bicubic,
            ..PixmapPaint::default()
        };
        self.pixmap.draw_pixmap(
            0,
            0,
            source.as_ref(),
            &paint,
            Transform::from_row(scale, 0.0, 0.0, scale, offset_x, offset_y),
            None,
        );
        self.has_ink = true;

        Ok(())
    }

    /// Encodes the pad as a PNG, the empty signature when nothing was drawn.
    pub fn snapshot(&self) -> Result<SignatureImage, ContextError> {
        if !self.has_ink {
            return Ok(SignatureImage::empty());
        }

        let png_bytes = self.pixmap.encode_png().map_err(|error| {
            ContextError::with_error("Unable to encode the signature pad", &error)
        })?;
        Ok(SignatureImage::from_encoded_parts(
            self.pixmap.width(),
            self.pixmap.height(),
            png_bytes,
            SignatureMode::Drawn,
        ))
    }

    /// The image last reported or loaded, the authoritative value of the pad.
    pub fn latest(&self) -> &SignatureImage {
        &self.reporter.latest
    }

    pub fn has_ink(&self) -> bool {
        self.has_ink
    }

    pub fn size(&self) -> (u32, u32) {
        (self.pixmap.width(), self.pixmap.height())
    }
}

fn ink() -> Paint<'static> {
    let mut paint = Paint::default();
    paint.set_color_rgba8(0, 0, 0, 255);
    paint.anti_alias = true;
    paint
}

/// The two marks which can be typed instead of drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypedMark {
    Signature,
    Initials,
}

impl TypedMark {
    /// The size of the off-screen surface the mark is rendered onto.
    pub fn surface_size(&self) -> (u32, u32) {
        match self {
            TypedMark::Signature => (300, 120),
            TypedMark::Initials => (150, 120),
        }
    }

    pub fn font_size(&self) -> f32 {
        match self {
            TypedMark::Signature => 48.0,
            TypedMark::Initials => 60.0,
        }
    }
}

/// Renders typed text as a signature image: NFC-normalized, centered on the surface of
/// the mark and shrunk when it would not fit within the padding. Blank text gives the
/// empty signature.
pub fn render_typed_mark(
    typeface: &dyn Typeface,
    text: &str,
    mark: TypedMark,
) -> Result<SignatureImage, ContextError> {
    let text: String = text.trim().nfc().collect();
    if text.is_empty() {
        return Ok(SignatureImage::empty());
    }

    let (width, height) = mark.surface_size();
    let available_width = width as f32 - 2.0 * TYPED_PADDING;
    let mut font_size = mark.font_size();
    let mut advance_width = typeface.advance_width(&text, font_size);
    if advance_width > available_width {
        font_size *= available_width / advance_width;
        advance_width = typeface.advance_width(&text, font_size);
    }

    let metrics = typeface.vertical_metrics(font_size);
    let origin_x = (width as f32 - advance_width) / 2.0;
    // Center the box between the ascent and the descent
    let baseline = (height as f32 + metrics.ascent + metrics.descent) / 2.0;

    let mut canvas = RgbaImage::new(width, height);
    typeface.draw_text(
        &mut canvas,
        &text,
        font_size,
        [origin_x, baseline],
        Rgba([0, 0, 0, 255]),
    );
    // Text made only of invisible characters leaves the surface blank
    if canvas.pixels().all(|pixel| pixel[3] == 0) {
        return Ok(SignatureImage::empty());
    }

    SignatureImage::from_rgba(&canvas, SignatureMode::Typed)
}

/// A text input whose every change is re-rendered as a typed mark and reported immediately.
pub struct TypeSurface {
    mark: TypedMark,
    text: String,
    reporter: ChangeReporter,
}

impl TypeSurface {
    pub fn new(mark: TypedMark) -> Self {
        TypeSurface {
            mark,
            text: String::new(),
            reporter: ChangeReporter::default(),
        }
    }

    pub fn on_change<F>(&mut self, listener: F)
    where
        F: FnMut(&SignatureImage) + 'static,
    {
        self.reporter.listener = Some(Box::new(listener));
    }

    /// Replaces the typed text and reports the re-rendered mark.
    pub fn set_text(&mut self, text: &str, typeface: &dyn Typeface) -> Result<(), ContextError> {
        let image = render_typed_mark(typeface, text, self.mark)?;
        self.text = text.to_string();
        self.reporter.report(image);
        Ok(())
    }

    /// Erases the text and reports the empty signature.
    pub fn clear_text(&mut self) {
        self.text.clear();
        self.reporter.report(SignatureImage::empty());
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn latest(&self) -> &SignatureImage {
        &self.reporter.latest
    }

    pub fn mark(&self) -> TypedMark {
        self.mark
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, rc::Rc};

    use super::*;
    use crate::typeface::BlockTypeface;

    fn recorded(surface: &mut DrawSurface) -> Rc<RefCell<Vec<SignatureImage>>> {
        let reports = Rc::new(RefCell::new(Vec::new()));
        let sink = reports.clone();
        surface.on_change(move |image| sink.borrow_mut().push(image.clone()));
        reports
    }

    #[test]
    fn stroke_is_reported_on_pointer_up() {
        let mut surface = DrawSurface::new(120, 40).unwrap();
        let reports = recorded(&mut surface);

        surface.pointer_down(10.0, 10.0);
        surface.pointer_move(60.0, 20.0);
        surface.pointer_move(100.0, 15.0);
        assert!(reports.borrow().is_empty());
        surface.pointer_up().unwrap();

        let reports = reports.borrow();
        assert_eq!(reports.len(), 1);
        assert!(!reports[0].is_empty());
        assert_eq!((reports[0].width(), reports[0].height()), (120, 40));
        assert_eq!(reports[0].mode(), SignatureMode::Drawn);
        assert_eq!(surface.latest(), &reports[0]);
    }

    #[test]
    fn clear_and_empty_pad_report_the_sentinel() {
        let mut surface = DrawSurface::new(120, 40).unwrap();
        let reports = recorded(&mut surface);

        assert!(surface.snapshot().unwrap().is_empty());
        surface.pointer_down(10.0, 10.0);
        surface.pointer_move(50.0, 30.0);
        surface.pointer_up().unwrap();
        surface.clear();

        let reports = reports.borrow();
        assert_eq!(reports.len(), 2);
        assert!(reports[1].is_empty());
        assert!(surface.latest().is_empty());
    }

    #[test]
    fn a_tap_leaves_a_dot() {
        let mut surface = DrawSurface::new(40, 40).unwrap();
        surface.pointer_down(20.0, 20.0);
        surface.pointer_up().unwrap();

        let image = surface.latest().to_rgba().unwrap().unwrap();
        assert!(image.get_pixel(20, 20)[3] > 0);
    }

    #[test]
    fn moves_without_pointer_down_are_ignored() {
        let mut surface = DrawSurface::new(40, 40).unwrap();
        surface.pointer_move(5.0, 5.0);
        surface.pointer_up().unwrap();
        assert!(!surface.has_ink());
    }

    #[test]
    fn loaded_image_becomes_the_value_without_a_report() {
        let mut source = DrawSurface::new(200, 50).unwrap();
        source.pointer_down(10.0, 10.0);
        source.pointer_move(190.0, 40.0);
        source.pointer_up().unwrap();
        let adopted = source.latest().clone();

        let mut surface = DrawSurface::new(100, 100).unwrap();
        let reports = recorded(&mut surface);
        surface.load(&adopted).unwrap();

        assert!(reports.borrow().is_empty());
        assert_eq!(surface.latest(), &adopted);
        assert!(surface.has_ink());
        // Aspect-fit leaves the top band of the square pad blank
        let snapshot = surface.snapshot().unwrap().to_rgba().unwrap().unwrap();
        assert!(snapshot.rows().take(20).flatten().all(|pixel| pixel[3] == 0));
    }

    #[test]
    fn typed_marks_use_their_fixed_surfaces() {
        let typeface = BlockTypeface::default();
        let signature = render_typed_mark(&typeface, "Jane Doe", TypedMark::Signature).unwrap();
        let initials = render_typed_mark(&typeface, "JD", TypedMark::Initials).unwrap();

        assert_eq!((signature.width(), signature.height()), (300, 120));
        assert_eq!((initials.width(), initials.height()), (150, 120));
        assert_eq!(signature.mode(), SignatureMode::Typed);
        assert!(render_typed_mark(&typeface, "   ", TypedMark::Signature)
            .unwrap()
            .is_empty());
    }

    /// Measures like a real typeface but never paints any glyph.
    struct InvisibleTypeface;

    impl Typeface for InvisibleTypeface {
        fn vertical_metrics(&self, size: f32) -> crate::typeface::VerticalMetrics {
            crate::typeface::VerticalMetrics {
                ascent: size * 0.8,
                descent: -size * 0.2,
                line_gap: 0.0,
            }
        }

        fn advance_width(&self, text: &str, size: f32) -> f32 {
            text.chars().count() as f32 * size * 0.5
        }

        fn draw_text(
            &self,
            _canvas: &mut RgbaImage,
            _text: &str,
            _size: f32,
            _origin: [f32; 2],
            _color: Rgba<u8>,
        ) {
        }
    }

    #[test]
    fn typed_text_without_ink_is_the_sentinel() {
        let signature =
            render_typed_mark(&InvisibleTypeface, "\u{200B}", TypedMark::Signature).unwrap();
        assert!(signature.is_empty());

        let mut identity = crate::identity::AdoptedIdentity::new(false);
        identity.adopt(signature, None);
        assert!(!identity.is_ready());

        let mut surface = TypeSurface::new(TypedMark::Initials);
        surface.set_text("JD", &InvisibleTypeface).unwrap();
        assert!(surface.latest().is_empty());
    }

    #[test]
    fn long_typed_text_stays_within_the_padding() {
        let typeface = BlockTypeface::default();
        let text = "Jane Alexandra Montgomery-Doe";
        let image = render_typed_mark(&typeface, text, TypedMark::Signature)
            .unwrap()
            .to_rgba()
            .unwrap()
            .unwrap();

        for y in 0..image.height() {
            for x in (0..10).chain(291..300) {
                assert_eq!(image.get_pixel(x, y)[3], 0);
            }
        }
    }

    #[test]
    fn every_keystroke_is_reported_and_clearing_reports_the_sentinel() {
        let typeface = BlockTypeface::default();
        let mut surface = TypeSurface::new(TypedMark::Initials);
        let reports = Rc::new(RefCell::new(Vec::new()));
        let sink = reports.clone();
        surface.on_change(move |image| sink.borrow_mut().push(image.is_empty()));

        surface.set_text("J", &typeface).unwrap();
        surface.set_text("JD", &typeface).unwrap();
        surface.clear_text();

        assert_eq!(*reports.borrow(), vec![false, false, true]);
        assert_eq!(surface.text(), "");
    }
}
