//! Rendering-engine abstraction and the lazy, process-wide engine loader.
//!
//! ## Why a loader instead of `Pdfium::default()` per call?
//!
//! Binding PDFium loads a ~30 MB dynamic library and initialises global C++
//! state. Doing that on every conversion is slow, and doing it concurrently
//! from several tasks races inside the library. [`EngineLoader`] binds once,
//! memoizes the result, and makes every concurrent caller wait on the same
//! in-flight attempt.
//!
//! ## Lifecycle
//!
//! ```text
//!            acquire()                 all sources ok
//! Unloaded ────────────▶ Loading ─────────────────────▶ Ready (forever)
//!     ▲                     │
//!     └─────────────────────┘ every source failed → EngineUnavailable
//! ```
//!
//! Acquisition strategies are an ordered list of [`EngineSource`]s. The
//! first one that yields an engine wins; failures are collected and reported
//! together only when the list is exhausted.

pub mod pdfium;

use crate::error::{AcquireFailure, Pdf2ImgError};
use futures::future::{BoxFuture, FutureExt, Shared};
use image::RgbaImage;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info, warn};

// ── Engine traits ────────────────────────────────────────────────────────

/// Native page size in PDF points (1/72 inch).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageSize {
    pub width: f32,
    pub height: f32,
}

/// Pixel rectangle a page is rasterised into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    /// Scale a page size, truncating to whole pixels.
    pub fn from_page(size: PageSize, scale: f32) -> Self {
        Self {
            width: truncate_px(size.width * scale),
            height: truncate_px(size.height * scale),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

fn truncate_px(v: f32) -> u32 {
    if v.is_finite() && v > 0.0 {
        // `as` saturates at u32::MAX and truncates the fraction.
        v as u32
    } else {
        0
    }
}

/// A document decoded by a [`RenderEngine`].
pub trait DocumentHandle {
    /// Number of pages in the document.
    fn page_count(&self) -> usize;

    /// Native size of the page at `index`.
    fn page_size(&self, index: usize) -> Result<PageSize, Pdf2ImgError>;

    /// Rasterise the page at `index` into exactly `viewport`'s pixel size,
    /// with smoothing enabled.
    fn rasterize(&self, index: usize, viewport: Viewport) -> Result<RgbaImage, Pdf2ImgError>;
}

/// A loaded rendering engine.
///
/// Engines are shared by every conversion once loaded, so they must be
/// `Send + Sync`; calls happen on the blocking thread pool.
pub trait RenderEngine: Send + Sync {
    /// Short engine name for logs.
    fn name(&self) -> &str;

    /// Decode `bytes`. `doc_name` is used only in error messages.
    fn open<'a>(
        &'a self,
        bytes: &'a [u8],
        doc_name: &str,
    ) -> Result<Box<dyn DocumentHandle + 'a>, Pdf2ImgError>;
}

/// One way of obtaining a [`RenderEngine`].
///
/// `acquire` may block (it typically loads a dynamic library); the loader
/// always calls it from the blocking pool.
pub trait EngineSource: Send + Sync {
    /// Strategy name used in logs and [`AcquireFailure`]s.
    fn name(&self) -> &str;

    fn acquire(&self) -> Result<Arc<dyn RenderEngine>, AcquireFailure>;
}

// ── Handle ───────────────────────────────────────────────────────────────

/// Shared reference to a ready engine.
#[derive(Clone)]
pub struct EngineHandle {
    engine: Arc<dyn RenderEngine>,
    source: Arc<str>,
}

impl EngineHandle {
    pub fn new(engine: Arc<dyn RenderEngine>, source: impl Into<Arc<str>>) -> Self {
        Self {
            engine,
            source: source.into(),
        }
    }

    pub fn engine(&self) -> &Arc<dyn RenderEngine> {
        &self.engine
    }

    /// Name of the [`EngineSource`] that produced this engine.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// `true` if both handles point at the same engine instance.
    pub fn same_engine(&self, other: &EngineHandle) -> bool {
        Arc::ptr_eq(&self.engine, &other.engine)
    }
}

impl fmt::Debug for EngineHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineHandle")
            .field("engine", &self.engine.name())
            .field("source", &self.source)
            .finish()
    }
}

// ── Loader ───────────────────────────────────────────────────────────────

/// Observable lifecycle state of an [`EngineLoader`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoaderState {
    Unloaded,
    Loading,
    Ready,
}

type Attempt = Shared<BoxFuture<'static, Result<EngineHandle, Pdf2ImgError>>>;

enum State {
    Unloaded,
    Loading(Attempt),
    Ready(EngineHandle),
}

/// Lazily acquires an engine once and shares it.
pub struct EngineLoader {
    sources: Arc<Vec<Box<dyn EngineSource>>>,
    state: Arc<Mutex<State>>,
}

impl EngineLoader {
    /// A loader that tries `sources` in order.
    pub fn new(sources: Vec<Box<dyn EngineSource>>) -> Self {
        Self {
            sources: Arc::new(sources),
            state: Arc::new(Mutex::new(State::Unloaded)),
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> LoaderState {
        match &*self.lock() {
            State::Unloaded => LoaderState::Unloaded,
            State::Loading(_) => LoaderState::Loading,
            State::Ready(_) => LoaderState::Ready,
        }
    }

    /// Names of the configured strategies, in order.
    pub fn source_names(&self) -> Vec<String> {
        self.sources.iter().map(|s| s.name().to_string()).collect()
    }

    /// Return the engine, loading it on first use.
    ///
    /// Concurrent callers share one attempt and all receive its outcome. A
    /// ready engine is returned immediately and never reloaded.
    pub async fn acquire(&self) -> Result<EngineHandle, Pdf2ImgError> {
        let attempt = {
            let mut state = self.lock();
            let in_flight = match &*state {
                State::Ready(handle) => return Ok(handle.clone()),
                State::Loading(attempt) => Some(attempt.clone()),
                State::Unloaded => None,
            };
            match in_flight {
                Some(attempt) => {
                    debug!("Engine load already in flight; waiting");
                    attempt
                }
                None => {
                    let attempt = self.start_attempt();
                    *state = State::Loading(attempt.clone());
                    attempt
                }
            }
        };

        attempt.await
    }

    fn start_attempt(&self) -> Attempt {
        let sources = Arc::clone(&self.sources);
        let state = Arc::clone(&self.state);

        async move {
            info!("Loading rendering engine ({} strategies)", sources.len());

            let outcome = tokio::task::spawn_blocking(move || run_sources(&sources))
                .await
                .unwrap_or_else(|e| {
                    Err(Pdf2ImgError::Internal(format!(
                        "Engine load task panicked: {e}"
                    )))
                });

            let mut guard = state.lock().unwrap_or_else(PoisonError::into_inner);
            match &outcome {
                Ok(handle) => {
                    info!("Rendering engine ready (via {})", handle.source());
                    *guard = State::Ready(handle.clone());
                }
                Err(e) => {
                    warn!("Rendering engine unavailable: {}", e);
                    *guard = State::Unloaded;
                }
            }
            outcome
        }
        .boxed()
        .shared()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for EngineLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineLoader")
            .field("sources", &self.source_names())
            .field("state", &self.state())
            .finish()
    }
}

/// Try each source in order; aggregate failures into `EngineUnavailable`.
fn run_sources(sources: &[Box<dyn EngineSource>]) -> Result<EngineHandle, Pdf2ImgError> {
    let mut attempts = Vec::with_capacity(sources.len());

    for source in sources {
        debug!("Trying engine source '{}'", source.name());
        match source.acquire() {
            Ok(engine) => {
                debug!("Engine source '{}' succeeded", source.name());
                return Ok(EngineHandle::new(engine, source.name()));
            }
            Err(failure) => {
                debug!("Engine source '{}' failed: {}", source.name(), failure.reason);
                attempts.push(failure);
            }
        }
    }

    Err(Pdf2ImgError::EngineUnavailable { attempts })
}
