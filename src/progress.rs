//! Progress-callback trait for conversion stage events.
//!
//! Inject an [`Arc<dyn ConversionProgressCallback>`] via
//! [`crate::config::ConversionConfigBuilder::progress_callback`] to observe
//! the orchestrator's state machine as a document moves through it.
//!
//! Callbacks complement the `tracing` events the pipeline emits: logs are
//! for operators, callbacks are for the host application (a spinner, a
//! status line, a metrics counter).
//!
//! # Example
//!
//! ```rust
//! use edgequake_pdf2img::{ConversionConfig, ConversionProgressCallback, Stage};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct FallbackCounter(AtomicUsize);
//!
//! impl ConversionProgressCallback for FallbackCounter {
//!     fn on_fallback(&self, _name: &str, _reason: &str) {
//!         self.0.fetch_add(1, Ordering::SeqCst);
//!     }
//! }
//!
//! let config = ConversionConfig::builder()
//!     .progress_callback(Arc::new(FallbackCounter(AtomicUsize::new(0))))
//!     .build()
//!     .unwrap();
//! ```

use crate::convert::Stage;
use std::sync::Arc;

/// Called by the orchestrator at each stage transition.
///
/// Implementations must be `Send + Sync`: several documents may be converted
/// concurrently and share one callback. All methods default to no-ops.
pub trait ConversionProgressCallback: Send + Sync {
    /// A stage has started for the document `name`.
    fn on_stage_start(&self, name: &str, stage: Stage) {
        let _ = (name, stage);
    }

    /// A stage finished successfully.
    fn on_stage_complete(&self, name: &str, stage: Stage) {
        let _ = (name, stage);
    }

    /// A stage failed with `error`. A fallback may follow.
    fn on_stage_error(&self, name: &str, stage: Stage, error: &str) {
        let _ = (name, stage, error);
    }

    /// The orchestrator switched to placeholder synthesis.
    fn on_fallback(&self, name: &str, reason: &str) {
        let _ = (name, reason);
    }

    /// The conversion reached a terminal state.
    ///
    /// `success` is `true` when the result carries an image (including a
    /// placeholder).
    fn on_conversion_complete(&self, name: &str, success: bool) {
        let _ = (name, success);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ConversionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ConversionConfig`].
pub type ProgressCallback = Arc<dyn ConversionProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConversionConfig;
    use crate::convert::Converter;
    use crate::engine::{EngineLoader, EngineSource, RenderEngine};
    use crate::error::AcquireFailure;
    use crate::pipeline::input::SourceDocument;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct TrackingCallback {
        starts: AtomicUsize,
        completes: AtomicUsize,
        errors: AtomicUsize,
        stages: Mutex<Vec<Stage>>,
    }

    impl ConversionProgressCallback for TrackingCallback {
        fn on_stage_start(&self, _name: &str, stage: Stage) {
            self.starts.fetch_add(1, Ordering::SeqCst);
            self.stages.lock().unwrap().push(stage);
        }

        fn on_stage_complete(&self, _name: &str, _stage: Stage) {
            self.completes.fetch_add(1, Ordering::SeqCst);
        }

        fn on_stage_error(&self, _name: &str, _stage: Stage, _error: &str) {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_stage_start("a.pdf", Stage::Validating);
        cb.on_stage_complete("a.pdf", Stage::Validating);
        cb.on_stage_error("a.pdf", Stage::Rendering, "boom");
        cb.on_fallback("a.pdf", "engine unavailable");
        cb.on_conversion_complete("a.pdf", true);
    }

    struct Missing;

    impl EngineSource for Missing {
        fn name(&self) -> &str {
            "missing"
        }

        fn acquire(&self) -> Result<Arc<dyn RenderEngine>, AcquireFailure> {
            Err(AcquireFailure::new("missing", "not installed"))
        }
    }

    #[tokio::test]
    async fn converter_reports_fallback_stages() {
        let tracker = Arc::new(TrackingCallback::default());
        let config = ConversionConfig::builder()
            .progress_callback(tracker.clone())
            .build()
            .unwrap();
        let loader = Arc::new(EngineLoader::new(vec![Box::new(Missing)]));
        let converter = Converter::with_loader(config, loader);

        let result = converter
            .convert(&SourceDocument::pdf(b"%PDF".to_vec(), "a.pdf"))
            .await;

        assert!(result.is_success());
        assert_eq!(tracker.starts.load(Ordering::SeqCst), 3);
        assert_eq!(tracker.completes.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.errors.load(Ordering::SeqCst), 1);
        assert_eq!(
            *tracker.stages.lock().unwrap(),
            vec![Stage::Validating, Stage::LoadingEngine, Stage::SynthesizingFallback]
        );
    }

    #[tokio::test]
    async fn converter_stops_reporting_after_rejected_input() {
        let tracker = Arc::new(TrackingCallback::default());
        let config = ConversionConfig::builder()
            .progress_callback(tracker.clone())
            .build()
            .unwrap();
        let loader = Arc::new(EngineLoader::new(vec![Box::new(Missing)]));
        let converter = Converter::with_loader(config, loader);

        let doc = SourceDocument::new(b"x".to_vec(), "text/plain", "a.txt");
        assert!(!converter.convert(&doc).await.is_success());

        assert_eq!(*tracker.stages.lock().unwrap(), vec![Stage::Validating]);
        assert_eq!(tracker.completes.load(Ordering::SeqCst), 0);
        assert_eq!(tracker.errors.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn arc_dyn_callback_works() {
        let cb: ProgressCallback = Arc::new(NoopProgressCallback);
        cb.on_stage_start("a.pdf", Stage::Encoding);
        cb.on_conversion_complete("a.pdf", false);
    }
}
