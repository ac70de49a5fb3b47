//! Image encoding: `RasterSurface` → compressed byte stream → `OutputArtifact`.
//!
//! PNG is the default because the surface is mostly rendered text, where
//! lossless compression keeps glyph edges crisp. JPEG is available for
//! photo-heavy documents where size matters more than crispness.
//!
//! The encoded bytes are registered in an [`ImageStore`] and the artifact
//! keeps the same `Arc<[u8]>`, so handing out a locator never copies.

use crate::config::OutputFormat;
use crate::error::Pdf2ImgError;
use crate::output::{ImageStore, OutputArtifact};
use crate::pipeline::render::RasterSurface;
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageFormat, RgbaImage};
use std::io::Cursor;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// What produced the surface. Decides the artifact name suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactVariant {
    /// A real render of the document's first page.
    Render,
    /// The generic "conversion failed" placeholder.
    Fallback,
    /// The informative "preview not available" card.
    Preview,
}

impl ArtifactVariant {
    fn suffix(self) -> &'static str {
        match self {
            ArtifactVariant::Render => "",
            ArtifactVariant::Fallback => "_fallback",
            ArtifactVariant::Preview => "_preview",
        }
    }
}

/// Derive the artifact file name from the source display name.
///
/// Only the final extension is stripped: `q3.report.pdf` → `q3.report`. A
/// leading dot is part of the stem, not an extension.
pub fn artifact_name(source_name: &str, variant: ArtifactVariant, extension: &str) -> String {
    let stem = match source_name.rfind('.') {
        Some(dot) if dot > 0 => &source_name[..dot],
        _ => source_name,
    };
    let stem = if stem.is_empty() { "document" } else { stem };
    format!("{stem}{}.{extension}", variant.suffix())
}

/// Encode `surface` and register the result in `store`.
pub async fn encode(
    surface: RasterSurface,
    source_name: &str,
    variant: ArtifactVariant,
    format: OutputFormat,
    store: &ImageStore,
) -> Result<OutputArtifact, Pdf2ImgError> {
    let (width, height) = (surface.width(), surface.height());
    debug!(
        "Encoding {}x{} px surface for {} as {}",
        width,
        height,
        source_name,
        format.mime_type()
    );

    let bytes = tokio::task::spawn_blocking(move || encode_blocking(surface.into_image(), format))
        .await
        .map_err(|e| Pdf2ImgError::Internal(format!("Encode task panicked: {}", e)))?
        .inspect_err(|e| warn!("Encoding {} failed: {}", source_name, e))?;

    let bytes: Arc<[u8]> = Arc::from(bytes);
    let name = artifact_name(source_name, variant, format.extension());
    let locator = store.register(Arc::clone(&bytes));

    info!("Encoded {} ({} bytes) → {}", name, bytes.len(), locator);
    Ok(OutputArtifact::new(
        name,
        format.mime_type(),
        width,
        height,
        locator,
        bytes,
    ))
}

/// Serialise an RGBA buffer in `format`. Never returns an empty stream.
pub(crate) fn encode_blocking(
    image: RgbaImage,
    format: OutputFormat,
) -> Result<Vec<u8>, Pdf2ImgError> {
    let mut buf = Vec::new();

    let written = match format {
        OutputFormat::Png => {
            DynamicImage::ImageRgba8(image).write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        }
        OutputFormat::Jpeg { quality } => {
            // JPEG has no alpha channel.
            let rgb = DynamicImage::ImageRgba8(image).into_rgb8();
            DynamicImage::ImageRgb8(rgb)
                .write_with_encoder(JpegEncoder::new_with_quality(&mut buf, quality))
        }
    };
    written.map_err(|e| Pdf2ImgError::Encode {
        detail: e.to_string(),
    })?;

    if buf.is_empty() {
        return Err(Pdf2ImgError::Encode {
            detail: "encoder produced an empty stream".into(),
        });
    }
    Ok(buf)
}
