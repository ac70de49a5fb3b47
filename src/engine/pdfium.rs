//! PDFium-backed [`RenderEngine`] and its acquisition strategies.
//!
//! Two strategies are tried in order by [`default_sources`]:
//!
//! 1. [`LibraryPathSource`]: bind to a library at an explicit location
//!    (configured path, `PDFIUM_LIB_PATH`, or `./lib`).
//! 2. [`SystemLibrarySource`]: let the dynamic loader find `libpdfium`.
//!
//! The second is a retry of the same engine through a different entry
//! point, not a different rendering backend.

use super::{DocumentHandle, EngineSource, PageSize, RenderEngine, Viewport};
use crate::config::ConversionConfig;
use crate::error::{AcquireFailure, Pdf2ImgError};
use image::RgbaImage;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Environment variable naming an existing pdfium library (file or directory).
pub const PDFIUM_LIB_PATH_ENV: &str = "PDFIUM_LIB_PATH";

/// A bound PDFium library.
pub struct PdfiumEngine {
    pdfium: Pdfium,
}

impl PdfiumEngine {
    pub fn new(pdfium: Pdfium) -> Self {
        Self { pdfium }
    }
}

impl RenderEngine for PdfiumEngine {
    fn name(&self) -> &str {
        "pdfium"
    }

    fn open<'a>(
        &'a self,
        bytes: &'a [u8],
        doc_name: &str,
    ) -> Result<Box<dyn DocumentHandle + 'a>, Pdf2ImgError> {
        let document = self
            .pdfium
            .load_pdf_from_byte_slice(bytes, None)
            .map_err(|e| Pdf2ImgError::DocumentDecode {
                name: doc_name.to_string(),
                detail: describe_pdfium_error(&e),
            })?;

        Ok(Box::new(PdfiumDocument {
            document,
            name: doc_name.to_string(),
        }))
    }
}

struct PdfiumDocument<'a> {
    document: PdfDocument<'a>,
    name: String,
}

impl<'a> PdfiumDocument<'a> {
    fn page(&self, index: usize) -> Result<PdfPage<'a>, Pdf2ImgError> {
        let index = PdfPageIndex::try_from(index).map_err(|_| Pdf2ImgError::PageAccess {
            name: self.name.clone(),
            detail: format!("page index {index} exceeds the engine's limit"),
        })?;

        self.document
            .pages()
            .get(index)
            .map_err(|e| Pdf2ImgError::PageAccess {
                name: self.name.clone(),
                detail: describe_pdfium_error(&e),
            })
    }
}

impl DocumentHandle for PdfiumDocument<'_> {
    fn page_count(&self) -> usize {
        self.document.pages().len() as usize
    }

    fn page_size(&self, index: usize) -> Result<PageSize, Pdf2ImgError> {
        let page = self.page(index)?;
        Ok(PageSize {
            width: page.width().value,
            height: page.height().value,
        })
    }

    fn rasterize(&self, index: usize, viewport: Viewport) -> Result<RgbaImage, Pdf2ImgError> {
        let page = self.page(index)?;

        let width = Pixels::try_from(viewport.width);
        let height = Pixels::try_from(viewport.height);
        let (Ok(width), Ok(height)) = (width, height) else {
            return Err(Pdf2ImgError::RenderExecution {
                name: self.name.clone(),
                detail: format!(
                    "viewport {}x{} exceeds the engine's bitmap limits",
                    viewport.width, viewport.height
                ),
            });
        };

        let render_config = PdfRenderConfig::new()
            .set_fixed_size(width, height)
            .set_text_smoothing(true)
            .set_image_smoothing(true)
            .set_path_smoothing(true)
            .render_annotations(true)
            .render_form_data(true);

        let bitmap = page
            .render_with_config(&render_config)
            .map_err(|e| Pdf2ImgError::RenderExecution {
                name: self.name.clone(),
                detail: describe_pdfium_error(&e),
            })?;

        Ok(bitmap.as_image().into_rgba8())
    }
}

fn describe_pdfium_error(e: &PdfiumError) -> String {
    format!("{e:?}")
}

// ── Acquisition strategies ───────────────────────────────────────────────

/// Bind to a pdfium library at an explicit path.
///
/// `path` may name the library file itself or a directory containing the
/// platform library (`libpdfium.so`, `libpdfium.dylib`, `pdfium.dll`).
pub struct LibraryPathSource {
    path: PathBuf,
}

impl LibraryPathSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location from config, else `PDFIUM_LIB_PATH`, else `./lib`.
    pub fn from_config(config: &ConversionConfig) -> Self {
        let path = config
            .library_path
            .clone()
            .or_else(|| {
                std::env::var(PDFIUM_LIB_PATH_ENV)
                    .ok()
                    .filter(|p| !p.is_empty())
                    .map(PathBuf::from)
            })
            .unwrap_or_else(|| PathBuf::from("./lib"));
        Self::new(path)
    }

    /// The concrete library file this source will try to bind.
    pub fn library_file(&self) -> PathBuf {
        resolve_library_file(&self.path)
    }
}

fn resolve_library_file(path: &Path) -> PathBuf {
    if path.is_dir() {
        Pdfium::pdfium_platform_library_name_at_path(path)
    } else {
        path.to_path_buf()
    }
}

impl EngineSource for LibraryPathSource {
    fn name(&self) -> &str {
        "library-path"
    }

    fn acquire(&self) -> Result<Arc<dyn RenderEngine>, AcquireFailure> {
        let file = self.library_file();
        if !file.exists() {
            return Err(AcquireFailure::new(
                self.name(),
                format!("no pdfium library at '{}'", file.display()),
            ));
        }

        debug!("Binding pdfium from {}", file.display());
        Pdfium::bind_to_library(&file)
            .map(into_engine)
            .map_err(|e| {
                AcquireFailure::new(
                    self.name(),
                    format!("failed to bind '{}': {}", file.display(), e),
                )
            })
    }
}

/// Bind to the pdfium library found by the system dynamic loader.
pub struct SystemLibrarySource;

impl EngineSource for SystemLibrarySource {
    fn name(&self) -> &str {
        "system-library"
    }

    fn acquire(&self) -> Result<Arc<dyn RenderEngine>, AcquireFailure> {
        debug!("Binding system pdfium library");
        Pdfium::bind_to_system_library()
            .map(into_engine)
            .map_err(|e| AcquireFailure::new(self.name(), e.to_string()))
    }
}

fn into_engine(bindings: Box<dyn PdfiumLibraryBindings>) -> Arc<dyn RenderEngine> {
    Arc::new(PdfiumEngine::new(Pdfium::new(bindings)))
}

/// The primary-then-alternate PDFium strategy list.
pub fn default_sources(config: &ConversionConfig) -> Vec<Box<dyn EngineSource>> {
    vec![
        Box::new(LibraryPathSource::from_config(config)),
        Box::new(SystemLibrarySource),
    ]
}
