//! First-page rasterisation.
//!
//! ## Why spawn_blocking?
//!
//! Decoding and rasterising are CPU-bound calls into a C++ library that
//! knows nothing about async. `tokio::task::spawn_blocking` moves the work
//! onto the blocking pool so the runtime's worker threads keep serving other
//! conversions while a large page renders.
//!
//! ## Why a fixed scale, not a pixel cap?
//!
//! The output is a thumbnail of a known page. Rendering at a fixed zoom of
//! the page's native size keeps the aspect ratio exact and makes the pixel
//! size predictable from the page dimensions alone.

use crate::engine::{EngineHandle, Viewport};
use crate::error::Pdf2ImgError;
use crate::pipeline::input::SourceDocument;
use image::RgbaImage;
use tracing::{debug, info, warn};

/// Only the first page is ever rendered.
const FIRST_PAGE: usize = 0;

/// An RGBA pixel buffer produced by one render.
#[derive(Debug, Clone)]
pub struct RasterSurface {
    image: RgbaImage,
}

impl RasterSurface {
    pub fn new(image: RgbaImage) -> Self {
        Self { image }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    pub fn into_image(self) -> RgbaImage {
        self.image
    }
}

/// Render page 1 of `document` at `scale` × its native size.
///
/// The media type is checked before the engine is touched.
pub async fn render(
    engine: &EngineHandle,
    document: &SourceDocument,
    scale: f32,
) -> Result<RasterSurface, Pdf2ImgError> {
    document.validate()?;

    let engine = engine.clone();
    let bytes = document.shared_bytes();
    let name = document.name().to_string();

    info!("Rendering first page of {} ({} bytes)", name, bytes.len());

    let result = tokio::task::spawn_blocking(move || render_blocking(&engine, &bytes, &name, scale))
        .await
        .map_err(|e| Pdf2ImgError::Internal(format!("Render task panicked: {}", e)))?;

    match &result {
        Ok(surface) => info!(
            "Rendered {} → {}x{} px",
            document.name(),
            surface.width(),
            surface.height()
        ),
        Err(e) => warn!("Render of {} failed: {}", document.name(), e),
    }
    result
}

/// Blocking implementation of [`render`].
fn render_blocking(
    engine: &EngineHandle,
    bytes: &[u8],
    name: &str,
    scale: f32,
) -> Result<RasterSurface, Pdf2ImgError> {
    let document = engine.engine().open(bytes, name)?;

    let page_count = document.page_count();
    debug!("{} decoded: {} pages", name, page_count);
    if page_count == 0 {
        return Err(Pdf2ImgError::PageAccess {
            name: name.to_string(),
            detail: "document has no pages".into(),
        });
    }

    let size = document.page_size(FIRST_PAGE)?;
    let viewport = Viewport::from_page(size, scale);
    debug!(
        "Page 1 is {:.1}x{:.1} pt; viewport {}x{} px at {}x",
        size.width, size.height, viewport.width, viewport.height, scale
    );
    if viewport.is_empty() {
        return Err(Pdf2ImgError::PageAccess {
            name: name.to_string(),
            detail: format!(
                "page 1 has an empty viewport ({:.1}x{:.1} pt at {}x)",
                size.width, size.height, scale
            ),
        });
    }

    let image = document.rasterize(FIRST_PAGE, viewport)?;
    if image.width() != viewport.width || image.height() != viewport.height {
        return Err(Pdf2ImgError::RenderExecution {
            name: name.to_string(),
            detail: format!(
                "engine produced {}x{} px for a {}x{} viewport",
                image.width(),
                image.height(),
                viewport.width,
                viewport.height
            ),
        });
    }

    Ok(RasterSurface::new(image))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{DocumentHandle, PageSize, RenderEngine};
    use image::Rgba;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Engine whose single behaviour is chosen per test.
    struct StubEngine {
        pages: Vec<PageSize>,
        /// Return a bitmap of this size instead of the viewport's.
        wrong_size: Option<(u32, u32)>,
        opens: AtomicUsize,
    }

    impl StubEngine {
        fn with_pages(pages: Vec<PageSize>) -> Self {
            Self {
                pages,
                wrong_size: None,
                opens: AtomicUsize::new(0),
            }
        }
    }

    struct StubDocument<'a> {
        engine: &'a StubEngine,
    }

    impl DocumentHandle for StubDocument<'_> {
        fn page_count(&self) -> usize {
            self.engine.pages.len()
        }

        fn page_size(&self, index: usize) -> Result<PageSize, Pdf2ImgError> {
            Ok(self.engine.pages[index])
        }

        fn rasterize(&self, _index: usize, viewport: Viewport) -> Result<RgbaImage, Pdf2ImgError> {
            let (w, h) = self
                .engine
                .wrong_size
                .unwrap_or((viewport.width, viewport.height));
            Ok(RgbaImage::from_pixel(w, h, Rgba([255, 255, 255, 255])))
        }
    }

    impl RenderEngine for StubEngine {
        fn name(&self) -> &str {
            "stub"
        }

        fn open<'a>(
            &'a self,
            bytes: &'a [u8],
            doc_name: &str,
        ) -> Result<Box<dyn DocumentHandle + 'a>, Pdf2ImgError> {
            self.opens.fetch_add(1, Ordering::SeqCst);
            if !bytes.starts_with(b"%PDF") {
                return Err(Pdf2ImgError::DocumentDecode {
                    name: doc_name.to_string(),
                    detail: "missing header".into(),
                });
            }
            Ok(Box::new(StubDocument { engine: self }))
        }
    }

    fn letter() -> PageSize {
        PageSize {
            width: 612.0,
            height: 792.0,
        }
    }

    fn handle(engine: StubEngine) -> (EngineHandle, Arc<StubEngine>) {
        let engine = Arc::new(engine);
        (EngineHandle::new(engine.clone(), "stub"), engine)
    }

    #[tokio::test]
    async fn renders_letter_page_at_double_size() {
        let (h, _) = handle(StubEngine::with_pages(vec![letter(), letter()]));
        let doc = SourceDocument::pdf(b"%PDF-1.4".to_vec(), "a.pdf");
        let surface = render(&h, &doc, 2.0).await.unwrap();
        assert_eq!((surface.width(), surface.height()), (1224, 1584));
    }

    #[tokio::test]
    async fn non_pdf_never_reaches_engine() {
        let (h, engine) = handle(StubEngine::with_pages(vec![letter()]));
        let doc = SourceDocument::new(b"%PDF-1.4".to_vec(), "text/plain", "a.txt");
        let err = render(&h, &doc, 2.0).await.unwrap_err();
        assert!(matches!(err, Pdf2ImgError::InvalidInputType { .. }));
        assert_eq!(engine.opens.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn malformed_bytes_are_decode_errors() {
        let (h, _) = handle(StubEngine::with_pages(vec![letter()]));
        let doc = SourceDocument::pdf(b"garbage".to_vec(), "a.pdf");
        let err = render(&h, &doc, 2.0).await.unwrap_err();
        assert!(matches!(err, Pdf2ImgError::DocumentDecode { .. }));
    }

    #[tokio::test]
    async fn zero_pages_is_page_access_error() {
        let (h, _) = handle(StubEngine::with_pages(vec![]));
        let doc = SourceDocument::pdf(b"%PDF-1.4".to_vec(), "empty.pdf");
        let err = render(&h, &doc, 2.0).await.unwrap_err();
        assert!(matches!(err, Pdf2ImgError::PageAccess { .. }));
    }

    #[tokio::test]
    async fn zero_area_page_is_page_access_error() {
        let (h, _) = handle(StubEngine::with_pages(vec![PageSize {
            width: 0.0,
            height: 792.0,
        }]));
        let doc = SourceDocument::pdf(b"%PDF-1.4".to_vec(), "thin.pdf");
        let err = render(&h, &doc, 2.0).await.unwrap_err();
        assert!(matches!(err, Pdf2ImgError::PageAccess { .. }));
    }

    #[tokio::test]
    async fn mismatched_bitmap_is_render_error() {
        let mut engine = StubEngine::with_pages(vec![letter()]);
        engine.wrong_size = Some((10, 10));
        let (h, _) = handle(engine);
        let doc = SourceDocument::pdf(b"%PDF-1.4".to_vec(), "a.pdf");
        let err = render(&h, &doc, 2.0).await.unwrap_err();
        assert!(matches!(err, Pdf2ImgError::RenderExecution { .. }));
    }
}
