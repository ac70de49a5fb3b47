//! Configuration types for PDF-to-image conversion.
//!
//! All conversion behaviour is controlled through [`ConversionConfig`], built
//! via its [`ConversionConfigBuilder`]. The defaults reproduce the reference
//! thumbnail: first page at 2× zoom, PNG output, fallback only when the
//! engine cannot be loaded.

use crate::error::Pdf2ImgError;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Viewport zoom applied to the page's native size.
pub const DEFAULT_SCALE: f32 = 2.0;

/// JPEG quality used when none is given.
pub const DEFAULT_JPEG_QUALITY: u8 = 90;

/// Upload limit enforced by the drop-target widget before a document reaches
/// this pipeline (20 MiB). Exported for collaborators; not enforced here.
pub const MAX_UPLOAD_BYTES: u64 = 20 * 1024 * 1024;

/// Configuration for a conversion.
///
/// # Example
/// ```rust
/// use edgequake_pdf2img::{ConversionConfig, OutputFormat};
///
/// let config = ConversionConfig::builder()
///     .output_format(OutputFormat::Jpeg { quality: 85 })
///     .fallback_on_render_failure(true)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ConversionConfig {
    /// Zoom factor applied to the page's native size in points. Default: 2.0.
    ///
    /// A letter page (612 × 792 pt) renders to 1224 × 1584 px at 2.0.
    pub scale: f32,

    /// Encoded output format. Default: [`OutputFormat::Png`].
    pub output_format: OutputFormat,

    /// Explicit PDFium library file or directory containing it.
    ///
    /// When `None`, `PDFIUM_LIB_PATH` and then `./lib` are tried before the
    /// system library.
    pub library_path: Option<PathBuf>,

    /// Also fall back to the generic placeholder when rendering or encoding
    /// fails. Default: false (only an unavailable engine triggers fallback).
    pub fallback_on_render_failure: bool,

    /// Observer for stage transitions.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            scale: DEFAULT_SCALE,
            output_format: OutputFormat::default(),
            library_path: None,
            fallback_on_render_failure: false,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ConversionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionConfig")
            .field("scale", &self.scale)
            .field("output_format", &self.output_format)
            .field("library_path", &self.library_path)
            .field("fallback_on_render_failure", &self.fallback_on_render_failure)
            .field(
                "progress_callback",
                &self
                    .progress_callback
                    .as_ref()
                    .map(|_| "<dyn ConversionProgressCallback>"),
            )
            .finish()
    }
}

impl ConversionConfig {
    /// Create a new builder for `ConversionConfig`.
    pub fn builder() -> ConversionConfigBuilder {
        ConversionConfigBuilder {
            config: Self::default(),
        }
    }

    /// Defaults overridden by environment variables.
    ///
    /// | Variable | Field |
    /// |----------|-------|
    /// | `PDFIUM_LIB_PATH` | `library_path` |
    /// | `PDF2IMG_SCALE` | `scale` |
    /// | `PDF2IMG_FORMAT` | `output_format` (`png` / `jpeg`) |
    /// | `PDF2IMG_JPEG_QUALITY` | JPEG quality |
    ///
    /// Unparseable values are ignored.
    pub fn from_env() -> Self {
        let mut builder = Self::builder();

        if let Some(path) = non_empty_env("PDFIUM_LIB_PATH") {
            builder = builder.library_path(path);
        }
        if let Some(scale) = non_empty_env("PDF2IMG_SCALE").and_then(|s| s.parse::<f32>().ok()) {
            builder = builder.scale(scale);
        }
        let quality = non_empty_env("PDF2IMG_JPEG_QUALITY")
            .and_then(|q| q.parse::<u8>().ok())
            .unwrap_or(DEFAULT_JPEG_QUALITY);
        if let Some(format) = non_empty_env("PDF2IMG_FORMAT")
            .and_then(|f| OutputFormat::parse(&f, quality))
        {
            builder = builder.output_format(format);
        }

        builder.config
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Builder for [`ConversionConfig`].
#[derive(Debug)]
pub struct ConversionConfigBuilder {
    config: ConversionConfig,
}

impl ConversionConfigBuilder {
    pub fn scale(mut self, scale: f32) -> Self {
        self.config.scale = if scale.is_finite() {
            scale.clamp(0.1, 8.0)
        } else {
            DEFAULT_SCALE
        };
        self
    }

    pub fn output_format(mut self, format: OutputFormat) -> Self {
        self.config.output_format = match format {
            OutputFormat::Jpeg { quality } => OutputFormat::Jpeg {
                quality: quality.clamp(1, 100),
            },
            png => png,
        };
        self
    }

    pub fn library_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.library_path = Some(path.into());
        self
    }

    pub fn fallback_on_render_failure(mut self, v: bool) -> Self {
        self.config.fallback_on_render_failure = v;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConversionConfig, Pdf2ImgError> {
        let c = &self.config;
        if !(c.scale.is_finite() && c.scale > 0.0) {
            return Err(Pdf2ImgError::InvalidConfig(format!(
                "scale must be a positive number, got {}",
                c.scale
            )));
        }
        if let OutputFormat::Jpeg { quality } = c.output_format {
            if quality == 0 || quality > 100 {
                return Err(Pdf2ImgError::InvalidConfig(format!(
                    "JPEG quality must be 1–100, got {quality}"
                )));
            }
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Encoded image format of the output artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "format")]
pub enum OutputFormat {
    /// Lossless PNG. (default)
    #[default]
    Png,
    /// Lossy JPEG at the given quality (1–100).
    Jpeg { quality: u8 },
}

impl OutputFormat {
    /// Parse `png` / `jpeg` / `jpg` (case-insensitive).
    pub fn parse(s: &str, jpeg_quality: u8) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "png" => Some(OutputFormat::Png),
            "jpeg" | "jpg" => Some(OutputFormat::Jpeg {
                quality: jpeg_quality.clamp(1, 100),
            }),
            _ => None,
        }
    }

    /// File extension without the dot.
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Png => "png",
            OutputFormat::Jpeg { .. } => "jpg",
        }
    }

    /// MIME type of the encoded stream.
    pub fn mime_type(&self) -> &'static str {
        match self {
            OutputFormat::Png => "image/png",
            OutputFormat::Jpeg { .. } => "image/jpeg",
        }
    }
}
