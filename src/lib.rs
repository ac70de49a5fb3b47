//! # edgequake-pdf2img
//!
//! Render the first page of a PDF to a preview image.
//!
//! ## Why this crate?
//!
//! Upload widgets, document lists and chat attachments all want a thumbnail
//! of a PDF, and none of them can afford to show nothing when rendering goes
//! wrong. This crate binds PDFium once per process, rasterises page 1 at 2×
//! its native size and hands back an encoded image plus a locator. When the
//! engine cannot be loaded it draws a placeholder card instead, so the caller
//! always has an image or a readable error.
//!
//! ## Pipeline Overview
//!
//! ```text
//! SourceDocument
//!  │
//!  ├─ 1. Validate  media type must be application/pdf
//!  ├─ 2. Engine    bind PDFium once (library path → system library)
//!  ├─ 3. Render    page 1 at scale 2.0 (CPU-bound, spawn_blocking)
//!  ├─ 4. Encode    PNG (or JPEG) → OutputArtifact + blob:pdf2img/<uuid>
//!  └─ fallback     engine unavailable → 800×600 placeholder card
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_pdf2img::{convert_pdf_to_image, SourceDocument};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let doc = SourceDocument::from_path("document.pdf").await?;
//!     let result = convert_pdf_to_image(&doc).await;
//!     let file = result.into_result()?;
//!     std::fs::write(&file.name, file.bytes())?;
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | The `pdf2img` binary (clap, anyhow, tracing-subscriber, indicatif) |
//!
//! Disable `cli` when using only the library to avoid pulling in CLI-only deps:
//! ```toml
//! edgequake-pdf2img = { version = "0.1", default-features = false }
//! ```
//!
//! ## Finding PDFium
//!
//! | Order | Source | Where |
//! |-------|--------|-------|
//! | 1 | `library-path` | `ConversionConfig::library_path`, else `PDFIUM_LIB_PATH`, else `./lib` |
//! | 2 | `system-library` | whatever the dynamic loader resolves for `libpdfium` |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod engine;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod stream;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ConversionConfig, ConversionConfigBuilder, OutputFormat, MAX_UPLOAD_BYTES};
pub use convert::{
    convert_pdf_to_image, convert_pdf_to_preview, convert_sync, default_converter, Converter,
    EngineProbe, Stage,
};
pub use engine::{EngineHandle, EngineLoader, EngineSource, LoaderState, RenderEngine};
pub use error::{AcquireFailure, Pdf2ImgError};
pub use output::{ConversionResult, ImageLocator, ImageStore, OutputArtifact};
pub use pipeline::input::SourceDocument;
pub use pipeline::placeholder::PlaceholderStyle;
pub use progress::{ConversionProgressCallback, NoopProgressCallback, ProgressCallback};
pub use stream::{convert_stream, convert_stream_keyed, ConversionStream};
