//! Error types for the edgequake-pdf2img library.
//!
//! [`Pdf2ImgError`] names every way a conversion can go wrong. The
//! orchestrator in [`crate::convert`] never lets one escape: each failure is
//! either recovered (engine unavailable → placeholder image) or folded into
//! the `error` field of a [`crate::output::ConversionResult`].
//!
//! The type is `Clone` because a single engine-loading failure is delivered
//! to every caller that was waiting on the same in-flight attempt.

use thiserror::Error;

/// All errors produced by the conversion pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Pdf2ImgError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// The declared media type is not `application/pdf`.
    #[error("Invalid file type '{media_type}'. Only PDF files are supported.")]
    InvalidInputType { media_type: String },

    // ── Engine errors ─────────────────────────────────────────────────────
    /// Every engine acquisition strategy failed.
    #[error(
        "Failed to load the PDF rendering engine: {}\n\n\
You can:\n\
  • Set PDFIUM_LIB_PATH=/path/to/libpdfium to use an existing copy.\n\
  • Place the platform pdfium library under ./lib next to the working directory.\n\
  • Install pdfium system-wide so the dynamic loader can find it.\n",
        summarize_attempts(.attempts)
    )]
    EngineUnavailable { attempts: Vec<AcquireFailure> },

    // ── Document errors ───────────────────────────────────────────────────
    /// The engine could not decode the byte buffer as a PDF.
    #[error("Document '{name}' could not be decoded: {detail}")]
    DocumentDecode { name: String, detail: String },

    /// The document has no first page, or it could not be materialized.
    #[error("Page 1 of '{name}' is not accessible: {detail}")]
    PageAccess { name: String, detail: String },

    /// The engine failed while rasterising the page.
    #[error("Rasterisation of '{name}' failed: {detail}")]
    RenderExecution { name: String, detail: String },

    // ── Output errors ─────────────────────────────────────────────────────
    /// The surface could not be serialised to an image stream.
    #[error("Failed to create image blob from surface: {detail}")]
    Encode { detail: String },

    /// Drawing or encoding a placeholder image failed. Terminal.
    #[error("Placeholder image creation failed: {detail}")]
    PlaceholderGeneration { detail: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// A blocking task panicked or was cancelled.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Pdf2ImgError {
    /// `true` for the one failure the orchestrator recovers from locally.
    pub fn is_engine_unavailable(&self) -> bool {
        matches!(self, Pdf2ImgError::EngineUnavailable { .. })
    }
}

/// One failed engine acquisition strategy.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{source_name}: {reason}")]
pub struct AcquireFailure {
    /// Name of the [`crate::engine::EngineSource`] that failed.
    pub source_name: String,
    /// Human-readable failure reason.
    pub reason: String,
}

impl AcquireFailure {
    pub fn new(source_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            source_name: source_name.into(),
            reason: reason.into(),
        }
    }
}

fn summarize_attempts(attempts: &[AcquireFailure]) -> String {
    if attempts.is_empty() {
        return "no acquisition strategies configured".to_string();
    }
    attempts
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_input_display() {
        let e = Pdf2ImgError::InvalidInputType {
            media_type: "image/png".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("image/png"), "got: {msg}");
        assert!(msg.contains("Only PDF"));
    }

    #[test]
    fn engine_unavailable_lists_every_attempt() {
        let e = Pdf2ImgError::EngineUnavailable {
            attempts: vec![
                AcquireFailure::new("library-path", "not found"),
                AcquireFailure::new("system-library", "dlopen failed"),
            ],
        };
        let msg = e.to_string();
        assert!(msg.contains("library-path: not found"), "got: {msg}");
        assert!(msg.contains("system-library: dlopen failed"), "got: {msg}");
        assert!(e.is_engine_unavailable());
    }

    #[test]
    fn engine_unavailable_without_attempts() {
        let e = Pdf2ImgError::EngineUnavailable { attempts: vec![] };
        assert!(e.to_string().contains("no acquisition strategies"));
    }

    #[test]
    fn render_errors_are_not_engine_unavailable() {
        let e = Pdf2ImgError::RenderExecution {
            name: "a.pdf".into(),
            detail: "boom".into(),
        };
        assert!(!e.is_engine_unavailable());
        assert!(e.to_string().contains("a.pdf"));
    }
}
