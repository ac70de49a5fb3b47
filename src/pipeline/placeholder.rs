//! Synthetic placeholder images for documents that could not be rendered.
//!
//! Two layouts on an 800×600 white card:
//!
//! - [`PlaceholderStyle::GenericFailure`]: four centred lines saying the
//!   conversion failed. Used when the rendering engine is unavailable.
//! - [`PlaceholderStyle::Informative`]: a red "PDF" document icon next to the
//!   file name and size. Used for the preview path that never renders.
//!
//! Text is drawn with the DejaVu Sans faces compiled into the binary, so the
//! output is identical on every host for the same name and size.

use crate::config::OutputFormat;
use crate::error::Pdf2ImgError;
use crate::output::{ConversionResult, ImageStore};
use crate::pipeline::encode::{encode, ArtifactVariant};
use crate::pipeline::input::SourceDocument;
use crate::pipeline::render::RasterSurface;
use ab_glyph::{Font, FontRef, PxScale, ScaleFont};
use image::{Rgba, RgbaImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;
use tracing::{info, warn};

pub const PLACEHOLDER_WIDTH: u32 = 800;
pub const PLACEHOLDER_HEIGHT: u32 = 600;

static REGULAR_FONT: &[u8] = include_bytes!("../../assets/fonts/DejaVuSans.ttf");
static BOLD_FONT: &[u8] = include_bytes!("../../assets/fonts/DejaVuSans-Bold.ttf");

const WHITE: Rgba<u8> = Rgba([0xff, 0xff, 0xff, 0xff]);
const BLACK: Rgba<u8> = Rgba([0x00, 0x00, 0x00, 0xff]);
const ICON_RED: Rgba<u8> = Rgba([0xe7, 0x4c, 0x3c, 0xff]);
const SLATE: Rgba<u8> = Rgba([0x2c, 0x3e, 0x50, 0xff]);
const FRAME_GREY: Rgba<u8> = Rgba([0xbd, 0xc3, 0xc7, 0xff]);

/// Which placeholder layout to draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaceholderStyle {
    /// "PDF to image conversion failed" card; artifact suffix `_fallback`.
    GenericFailure,
    /// "Preview not available" card with file details; suffix `_preview`.
    Informative,
}

impl PlaceholderStyle {
    fn variant(self) -> ArtifactVariant {
        match self {
            PlaceholderStyle::GenericFailure => ArtifactVariant::Fallback,
            PlaceholderStyle::Informative => ArtifactVariant::Preview,
        }
    }
}

/// Draw and encode a placeholder for `document`.
///
/// Never fails outward: any drawing or encoding problem becomes a failure
/// result carrying a `PlaceholderGeneration` message.
pub async fn synthesize(
    document: &SourceDocument,
    style: PlaceholderStyle,
    format: OutputFormat,
    store: &ImageStore,
) -> ConversionResult {
    match try_synthesize(document, style, format, store).await {
        Ok(result) => result,
        Err(e) => {
            warn!("Placeholder for {} failed: {}", document.name(), e);
            ConversionResult::failure(e.to_string())
        }
    }
}

async fn try_synthesize(
    document: &SourceDocument,
    style: PlaceholderStyle,
    format: OutputFormat,
    store: &ImageStore,
) -> Result<ConversionResult, Pdf2ImgError> {
    let name = document.name().to_string();
    let size = document.size();

    let image = tokio::task::spawn_blocking(move || draw(style, &name, size))
        .await
        .map_err(|e| placeholder_error(format!("drawing task panicked: {e}")))??;

    let artifact = encode(
        RasterSurface::new(image),
        document.name(),
        style.variant(),
        format,
        store,
    )
    .await
    .map_err(|e| placeholder_error(e.to_string()))?;

    info!("Synthesized {:?} placeholder {}", style, artifact.name);
    Ok(ConversionResult::success(artifact))
}

fn placeholder_error(detail: impl Into<String>) -> Pdf2ImgError {
    Pdf2ImgError::PlaceholderGeneration {
        detail: detail.into(),
    }
}

/// Draw the placeholder card. `size` is the document size in bytes.
pub fn draw(style: PlaceholderStyle, name: &str, size: usize) -> Result<RgbaImage, Pdf2ImgError> {
    let regular = FontRef::try_from_slice(REGULAR_FONT)
        .map_err(|e| placeholder_error(format!("regular font: {e}")))?;
    let bold = FontRef::try_from_slice(BOLD_FONT)
        .map_err(|e| placeholder_error(format!("bold font: {e}")))?;

    let mut canvas = RgbaImage::from_pixel(PLACEHOLDER_WIDTH, PLACEHOLDER_HEIGHT, WHITE);
    match style {
        PlaceholderStyle::GenericFailure => draw_generic(&mut canvas, &regular, name),
        PlaceholderStyle::Informative => draw_informative(&mut canvas, &regular, &bold, name, size),
    }
    Ok(canvas)
}

fn draw_generic(canvas: &mut RgbaImage, regular: &FontRef<'_>, name: &str) {
    let cx = (PLACEHOLDER_WIDTH / 2) as i32;
    let cy = (PLACEHOLDER_HEIGHT / 2) as i32;

    let heading = TextStyle::new(regular, 24.0, BLACK, Align::Center);
    let body = TextStyle::new(regular, 16.0, BLACK, Align::Center);

    heading.draw(canvas, cx, cy - 20, "PDF Preview");
    body.draw(canvas, cx, cy + 20, &format!("File: {name}"));
    body.draw(canvas, cx, cy + 50, "PDF to image conversion failed");
    body.draw(canvas, cx, cy + 80, "Using fallback preview");
}

fn draw_informative(
    canvas: &mut RgbaImage,
    regular: &FontRef<'_>,
    bold: &FontRef<'_>,
    name: &str,
    size: usize,
) {
    // Document icon
    draw_filled_rect_mut(canvas, Rect::at(50, 50).of_size(100, 120), ICON_RED);
    TextStyle::new(bold, 48.0, WHITE, Align::Center).draw(canvas, 100, 120, "PDF");

    TextStyle::new(bold, 24.0, SLATE, Align::Left).draw(canvas, 200, 80, "PDF Document");

    let body = TextStyle::new(regular, 16.0, SLATE, Align::Left);
    body.draw(canvas, 200, 110, &format!("File: {name}"));
    body.draw(canvas, 200, 135, &format!("Size: {} KB", format_kib(size)));
    body.draw(canvas, 200, 160, "Preview not available");
    body.draw(canvas, 200, 185, "Using placeholder image");

    // 2 px frame straddling the (180, 60, 400×150) outline.
    draw_hollow_rect_mut(canvas, Rect::at(179, 59).of_size(402, 152), FRAME_GREY);
    draw_hollow_rect_mut(canvas, Rect::at(180, 60).of_size(400, 150), FRAME_GREY);
}

/// Size in KiB with one decimal, e.g. `2048` → `"2.0"`. Ties round up
/// (`1280` → `"1.3"`), not to even.
fn format_kib(size: usize) -> String {
    let tenths = (size as f64 * 10.0 / 1024.0 + 0.5).floor();
    format!("{:.1}", tenths / 10.0)
}

#[derive(Clone, Copy)]
enum Align {
    Left,
    Center,
}

/// Font, size, colour and horizontal anchor for one run of text.
struct TextStyle<'f> {
    font: &'f FontRef<'f>,
    scale: PxScale,
    color: Rgba<u8>,
    align: Align,
}

impl<'f> TextStyle<'f> {
    fn new(font: &'f FontRef<'f>, px: f32, color: Rgba<u8>, align: Align) -> Self {
        Self {
            font,
            scale: PxScale::from(px),
            color,
            align,
        }
    }

    /// Draw `text` with its baseline at `baseline_y`, anchored at `x`.
    fn draw(&self, canvas: &mut RgbaImage, x: i32, baseline_y: i32, text: &str) {
        let (width, _) = text_size(self.scale, self.font, text);
        let left = match self.align {
            Align::Left => x,
            Align::Center => x - (width / 2) as i32,
        };
        let ascent = self.font.as_scaled(self.scale).ascent();
        let top = baseline_y - ascent.round() as i32;
        draw_text_mut(canvas, self.color, left, top, self.scale, self.font, text);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(name: &str, size: usize) -> SourceDocument {
        SourceDocument::pdf(vec![0u8; size], name)
    }

    fn ink_pixels(img: &RgbaImage, x0: u32, y0: u32, x1: u32, y1: u32) -> usize {
        let mut n = 0;
        for y in y0..y1 {
            for x in x0..x1 {
                if *img.get_pixel(x, y) != WHITE {
                    n += 1;
                }
            }
        }
        n
    }

    #[test]
    fn kib_formatting() {
        assert_eq!(format_kib(0), "0.0");
        assert_eq!(format_kib(2048), "2.0");
        assert_eq!(format_kib(1536), "1.5");
        assert_eq!(format_kib(1280), "1.3");
        assert_eq!(format_kib(2304), "2.3");
        assert_eq!(format_kib(20 * 1024 * 1024), "20480.0");
    }

    #[test]
    fn generic_card_is_800_by_600_with_centred_text() {
        let img = draw(PlaceholderStyle::GenericFailure, "a.pdf", 10).unwrap();
        assert_eq!(img.dimensions(), (PLACEHOLDER_WIDTH, PLACEHOLDER_HEIGHT));
        assert_eq!(*img.get_pixel(5, 5), WHITE);
        // The four lines sit between y≈260 and y≈385 around the centre column.
        assert!(ink_pixels(&img, 250, 255, 550, 390) > 100);
        assert_eq!(ink_pixels(&img, 0, 0, 800, 200), 0);
    }

    #[test]
    fn informative_card_has_icon_and_frame() {
        let img = draw(PlaceholderStyle::Informative, "a.pdf", 4096).unwrap();
        assert_eq!(img.dimensions(), (800, 600));
        assert_eq!(*img.get_pixel(55, 160), ICON_RED);
        assert_eq!(*img.get_pixel(380, 60), FRAME_GREY);
        assert_eq!(*img.get_pixel(380, 59), FRAME_GREY);
        assert_eq!(*img.get_pixel(700, 500), WHITE);
    }

    #[test]
    fn drawing_is_deterministic() {
        let a = draw(PlaceholderStyle::Informative, "same.pdf", 1234).unwrap();
        let b = draw(PlaceholderStyle::Informative, "same.pdf", 1234).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn different_names_draw_differently() {
        let a = draw(PlaceholderStyle::GenericFailure, "one.pdf", 0).unwrap();
        let b = draw(PlaceholderStyle::GenericFailure, "two.pdf", 0).unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn synthesize_names_fallback_artifact() {
        let store = ImageStore::new();
        let result = synthesize(
            &doc("resume.pdf", 100),
            PlaceholderStyle::GenericFailure,
            OutputFormat::Png,
            &store,
        )
        .await;

        assert!(result.is_success(), "{:?}", result.error());
        let file = result.file().unwrap();
        assert_eq!(file.name, "resume_fallback.png");
        assert_eq!((file.width, file.height), (800, 600));
        let decoded = image::load_from_memory(file.bytes()).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (800, 600));
    }

    #[tokio::test]
    async fn synthesize_names_preview_artifact() {
        let store = ImageStore::new();
        let result = synthesize(
            &doc("resume.pdf", 100),
            PlaceholderStyle::Informative,
            OutputFormat::Png,
            &store,
        )
        .await;
        assert_eq!(result.file().unwrap().name, "resume_preview.png");
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn synthesized_bytes_are_deterministic() {
        let store = ImageStore::new();
        let d = doc("same.pdf", 512);
        let a = synthesize(&d, PlaceholderStyle::Informative, OutputFormat::Png, &store).await;
        let b = synthesize(&d, PlaceholderStyle::Informative, OutputFormat::Png, &store).await;
        assert_eq!(a.file().unwrap().bytes(), b.file().unwrap().bytes());
        assert_ne!(a.image_url(), b.image_url());
    }
}
