//! Conversion entry points and the orchestrating state machine.
//!
//! ```text
//! Validating ──▶ LoadingEngine ──▶ Rendering ──▶ Encoding ──▶ Done
//!     │               │                │            │
//!     │               └─(unavailable)──┼────────────┼──▶ SynthesizingFallback ──▶ Done
//!     ▼                                ▼            ▼
//!   Failed                           Failed       Failed
//! ```
//!
//! Only an unavailable engine triggers the placeholder by default. Render and
//! encode failures go to `Failed` unless
//! [`ConversionConfig::fallback_on_render_failure`] is set.
//!
//! ## Why return `ConversionResult` and not `Result`?
//!
//! Callers are UI code that always needs *something* to display. Every
//! outcome, including failures, is a value with the same shape; nothing
//! escapes as an `Err` or a panic.

use crate::config::ConversionConfig;
use crate::engine::pdfium::default_sources;
use crate::engine::EngineLoader;
use crate::error::Pdf2ImgError;
use crate::output::{ConversionResult, ImageStore};
use crate::pipeline::encode::{encode, ArtifactVariant};
use crate::pipeline::input::SourceDocument;
use crate::pipeline::placeholder::{synthesize, PlaceholderStyle};
use crate::pipeline::render::render;
use crate::progress::ProgressCallback;
use once_cell::sync::Lazy;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Prefix of every failure message returned by [`Converter::convert`].
pub const FAILURE_PREFIX: &str = "Failed to convert PDF to image";

/// Orchestrator states, reported to logs and progress callbacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Validating,
    LoadingEngine,
    Rendering,
    Encoding,
    SynthesizingFallback,
    Done,
    Failed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Validating => "validating",
            Stage::LoadingEngine => "loading engine",
            Stage::Rendering => "rendering",
            Stage::Encoding => "encoding",
            Stage::SynthesizingFallback => "synthesizing fallback",
            Stage::Done => "done",
            Stage::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Result of [`Converter::probe_engine`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EngineProbe {
    pub available: bool,
    /// Engine name, when available.
    pub engine: Option<String>,
    /// Acquisition strategy that produced the engine.
    pub source: Option<String>,
    pub error: Option<String>,
}

/// Converts documents using one engine loader and one locator store.
///
/// # Example
/// ```rust,no_run
/// use edgequake_pdf2img::{ConversionConfig, Converter, SourceDocument};
///
/// # async fn run() -> std::io::Result<()> {
/// let converter = Converter::new(ConversionConfig::default());
/// let doc = SourceDocument::from_path("report.pdf").await?;
/// let result = converter.convert(&doc).await;
/// match result.file() {
///     Some(file) => println!("{} ({} bytes)", file.name, file.len()),
///     None => eprintln!("{}", result.error().unwrap_or_default()),
/// }
/// # Ok(())
/// # }
/// ```
pub struct Converter {
    config: ConversionConfig,
    loader: Arc<EngineLoader>,
    store: ImageStore,
}

impl Converter {
    /// A converter with its own PDFium loader.
    pub fn new(config: ConversionConfig) -> Self {
        let loader = Arc::new(EngineLoader::new(default_sources(&config)));
        Self::with_loader(config, loader)
    }

    /// A converter sharing an existing loader, e.g. one with custom sources.
    pub fn with_loader(config: ConversionConfig, loader: Arc<EngineLoader>) -> Self {
        Self {
            config,
            loader,
            store: ImageStore::new(),
        }
    }

    /// Register artifacts in `store` instead of a private one.
    pub fn with_store(mut self, store: ImageStore) -> Self {
        self.store = store;
        self
    }

    pub fn config(&self) -> &ConversionConfig {
        &self.config
    }

    pub fn loader(&self) -> &Arc<EngineLoader> {
        &self.loader
    }

    /// Store holding the bytes behind every locator this converter issued.
    pub fn store(&self) -> &ImageStore {
        &self.store
    }

    /// Release a locator returned in a [`ConversionResult`].
    pub fn revoke(&self, locator: &str) -> bool {
        self.store.revoke(locator)
    }

    /// Render the first page of `document` to an image.
    pub async fn convert(&self, document: &SourceDocument) -> ConversionResult {
        let progress = Reporter::new(self.config.progress_callback.as_ref(), document.name());
        info!(
            "Converting {} ({}, {} bytes)",
            document.name(),
            document.media_type(),
            document.size()
        );

        // ── Validating ───────────────────────────────────────────────────
        progress.start(Stage::Validating);
        if let Err(e) = document.validate() {
            return progress.fail(Stage::Validating, &e);
        }
        progress.complete(Stage::Validating);

        // ── LoadingEngine ────────────────────────────────────────────────
        progress.start(Stage::LoadingEngine);
        let engine = match self.loader.acquire().await {
            Ok(engine) => engine,
            Err(e) if e.is_engine_unavailable() => {
                progress.error(Stage::LoadingEngine, &e);
                return self.fall_back(document, &progress, &e).await;
            }
            Err(e) => return progress.fail(Stage::LoadingEngine, &e),
        };
        debug!("Using engine '{}' via {}", engine.engine().name(), engine.source());
        progress.complete(Stage::LoadingEngine);

        // ── Rendering ────────────────────────────────────────────────────
        progress.start(Stage::Rendering);
        let surface = match render(&engine, document, self.config.scale).await {
            Ok(surface) => surface,
            Err(e) => return self.render_failed(document, &progress, Stage::Rendering, e).await,
        };
        progress.complete(Stage::Rendering);

        // ── Encoding ─────────────────────────────────────────────────────
        progress.start(Stage::Encoding);
        let artifact = match encode(
            surface,
            document.name(),
            ArtifactVariant::Render,
            self.config.output_format,
            &self.store,
        )
        .await
        {
            Ok(artifact) => artifact,
            Err(e) => return self.render_failed(document, &progress, Stage::Encoding, e).await,
        };
        progress.complete(Stage::Encoding);

        progress.finish(Stage::Done);
        ConversionResult::success(artifact)
    }

    /// Produce the informative "preview not available" card without
    /// touching the engine.
    pub async fn convert_preview(&self, document: &SourceDocument) -> ConversionResult {
        let progress = Reporter::new(self.config.progress_callback.as_ref(), document.name());
        info!("Building preview card for {}", document.name());

        progress.start(Stage::SynthesizingFallback);
        let result = synthesize(
            document,
            PlaceholderStyle::Informative,
            self.config.output_format,
            &self.store,
        )
        .await;
        progress.settle_synthesis(result)
    }

    /// Acquire the engine without converting anything.
    pub async fn probe_engine(&self) -> EngineProbe {
        match self.loader.acquire().await {
            Ok(handle) => EngineProbe {
                available: true,
                engine: Some(handle.engine().name().to_string()),
                source: Some(handle.source().to_string()),
                error: None,
            },
            Err(e) => EngineProbe {
                available: false,
                engine: None,
                source: None,
                error: Some(e.to_string()),
            },
        }
    }

    async fn render_failed(
        &self,
        document: &SourceDocument,
        progress: &Reporter<'_>,
        stage: Stage,
        error: Pdf2ImgError,
    ) -> ConversionResult {
        if self.config.fallback_on_render_failure {
            progress.error(stage, &error);
            self.fall_back(document, progress, &error).await
        } else {
            progress.fail(stage, &error)
        }
    }

    async fn fall_back(
        &self,
        document: &SourceDocument,
        progress: &Reporter<'_>,
        reason: &Pdf2ImgError,
    ) -> ConversionResult {
        progress.fallback(reason);
        progress.start(Stage::SynthesizingFallback);
        let result = synthesize(
            document,
            PlaceholderStyle::GenericFailure,
            self.config.output_format,
            &self.store,
        )
        .await;
        progress.settle_synthesis(result)
    }
}

impl fmt::Debug for Converter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Converter")
            .field("config", &self.config)
            .field("loader", &self.loader)
            .field("store", &self.store)
            .finish()
    }
}

/// Emits log events and progress callbacks for one document.
struct Reporter<'a> {
    callback: Option<&'a ProgressCallback>,
    name: &'a str,
}

impl<'a> Reporter<'a> {
    fn new(callback: Option<&'a ProgressCallback>, name: &'a str) -> Self {
        Self { callback, name }
    }

    fn start(&self, stage: Stage) {
        debug!("{}: {} started", self.name, stage);
        if let Some(cb) = self.callback {
            cb.on_stage_start(self.name, stage);
        }
    }

    fn complete(&self, stage: Stage) {
        debug!("{}: {} complete", self.name, stage);
        if let Some(cb) = self.callback {
            cb.on_stage_complete(self.name, stage);
        }
    }

    fn error(&self, stage: Stage, error: &Pdf2ImgError) {
        warn!("{}: {} failed: {}", self.name, stage, error);
        if let Some(cb) = self.callback {
            cb.on_stage_error(self.name, stage, &error.to_string());
        }
    }

    fn fallback(&self, reason: &Pdf2ImgError) {
        warn!("{}: falling back to placeholder image", self.name);
        if let Some(cb) = self.callback {
            cb.on_fallback(self.name, &reason.to_string());
        }
    }

    fn finish(&self, terminal: Stage) {
        info!("{}: {}", self.name, terminal);
        if let Some(cb) = self.callback {
            cb.on_conversion_complete(self.name, terminal == Stage::Done);
        }
    }

    /// Record a stage error and return the terminal failure result.
    fn fail(&self, stage: Stage, error: &Pdf2ImgError) -> ConversionResult {
        self.error(stage, error);
        self.finish(Stage::Failed);
        ConversionResult::failure(format!("{FAILURE_PREFIX}: {error}"))
    }

    /// Close out a placeholder synthesis, success or not.
    fn settle_synthesis(&self, result: ConversionResult) -> ConversionResult {
        if result.is_success() {
            self.complete(Stage::SynthesizingFallback);
            self.finish(Stage::Done);
            return result;
        }

        let message = result.error().unwrap_or_default().to_string();
        warn!("{}: {} failed: {}", self.name, Stage::SynthesizingFallback, message);
        if let Some(cb) = self.callback {
            cb.on_stage_error(self.name, Stage::SynthesizingFallback, &message);
        }
        self.finish(Stage::Failed);
        ConversionResult::failure(format!("{FAILURE_PREFIX}: {message}"))
    }
}

// ── Process-wide default ─────────────────────────────────────────────────

static DEFAULT_CONVERTER: Lazy<Converter> =
    Lazy::new(|| Converter::new(ConversionConfig::from_env()));

/// The converter behind [`convert_pdf_to_image`], configured from the
/// environment on first use. Its engine loader is shared by the whole
/// process.
pub fn default_converter() -> &'static Converter {
    &DEFAULT_CONVERTER
}

/// Convert `document` with the process-wide default converter.
pub async fn convert_pdf_to_image(document: &SourceDocument) -> ConversionResult {
    DEFAULT_CONVERTER.convert(document).await
}

/// Build the informative preview card with the default converter.
pub async fn convert_pdf_to_preview(document: &SourceDocument) -> ConversionResult {
    DEFAULT_CONVERTER.convert_preview(document).await
}

/// Synchronous wrapper around [`Converter::convert`].
///
/// Creates a temporary tokio runtime internally; do not call from inside an
/// async context.
pub fn convert_sync(converter: &Converter, document: &SourceDocument) -> ConversionResult {
    match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime.block_on(converter.convert(document)),
        Err(e) => ConversionResult::failure(format!(
            "{FAILURE_PREFIX}: {}",
            Pdf2ImgError::Internal(format!("Failed to create tokio runtime: {e}"))
        )),
    }
}
