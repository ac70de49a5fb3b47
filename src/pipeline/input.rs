//! The document handed to the pipeline.
//!
//! A [`SourceDocument`] is what an upload widget or file picker produces:
//! raw bytes, the media type it declared and the display name. The pipeline
//! trusts the declared type only as far as validation goes; decoding errors
//! from mislabelled files surface later as `DocumentDecode`.

use crate::error::Pdf2ImgError;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// The only media type the renderer accepts.
pub const PDF_MEDIA_TYPE: &str = "application/pdf";

/// Media type assigned to files whose extension isn't `.pdf`.
pub const OCTET_STREAM_MEDIA_TYPE: &str = "application/octet-stream";

/// Raw input document. Cheap to clone; the bytes are shared.
#[derive(Clone)]
pub struct SourceDocument {
    bytes: Arc<[u8]>,
    media_type: String,
    name: String,
}

impl SourceDocument {
    pub fn new(
        bytes: impl Into<Arc<[u8]>>,
        media_type: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            bytes: bytes.into(),
            media_type: media_type.into(),
            name: name.into(),
        }
    }

    /// A document declared as `application/pdf`.
    pub fn pdf(bytes: impl Into<Arc<[u8]>>, name: impl Into<String>) -> Self {
        Self::new(bytes, PDF_MEDIA_TYPE, name)
    }

    /// Read a document from disk.
    ///
    /// The media type comes from the extension, as a browser file picker
    /// would report it: `.pdf` (any case) is `application/pdf`, everything
    /// else is `application/octet-stream`.
    pub async fn from_path(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await?;

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let media_type = media_type_for(path);

        debug!("Read {} ({} bytes, {})", name, bytes.len(), media_type);
        Ok(Self::new(bytes, media_type, name))
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Shared handle to the bytes, for moving into blocking tasks.
    pub fn shared_bytes(&self) -> Arc<[u8]> {
        Arc::clone(&self.bytes)
    }

    pub fn media_type(&self) -> &str {
        &self.media_type
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Size in bytes.
    pub fn size(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_pdf(&self) -> bool {
        self.media_type == PDF_MEDIA_TYPE
    }

    /// Reject anything not declared as a PDF.
    pub fn validate(&self) -> Result<(), Pdf2ImgError> {
        if self.is_pdf() {
            Ok(())
        } else {
            Err(Pdf2ImgError::InvalidInputType {
                media_type: self.media_type.clone(),
            })
        }
    }
}

impl fmt::Debug for SourceDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceDocument")
            .field("name", &self.name)
            .field("media_type", &self.media_type)
            .field("size", &self.bytes.len())
            .finish()
    }
}

fn media_type_for(path: &Path) -> &'static str {
    match path.extension() {
        Some(ext) if ext.eq_ignore_ascii_case("pdf") => PDF_MEDIA_TYPE,
        _ => OCTET_STREAM_MEDIA_TYPE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn pdf_constructor_declares_pdf() {
        let doc = SourceDocument::pdf(b"%PDF-1.4".to_vec(), "a.pdf");
        assert!(doc.is_pdf());
        assert!(doc.validate().is_ok());
        assert_eq!(doc.size(), 8);
    }

    #[test]
    fn other_media_types_are_rejected() {
        let doc = SourceDocument::new(b"GIF89a".to_vec(), "image/gif", "a.gif");
        match doc.validate() {
            Err(Pdf2ImgError::InvalidInputType { media_type }) => {
                assert_eq!(media_type, "image/gif")
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn media_type_follows_extension() {
        assert_eq!(media_type_for(Path::new("x/Report.PDF")), PDF_MEDIA_TYPE);
        assert_eq!(media_type_for(Path::new("notes.txt")), OCTET_STREAM_MEDIA_TYPE);
        assert_eq!(media_type_for(Path::new("no_extension")), OCTET_STREAM_MEDIA_TYPE);
    }

    #[tokio::test]
    async fn from_path_reads_bytes_and_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("invoice.pdf");
        std::fs::File::create(&path)
            .unwrap()
            .write_all(b"%PDF-1.7 body")
            .unwrap();

        let doc = SourceDocument::from_path(&path).await.unwrap();
        assert_eq!(doc.name(), "invoice.pdf");
        assert_eq!(doc.bytes(), b"%PDF-1.7 body");
        assert!(doc.is_pdf());
    }

    #[tokio::test]
    async fn from_path_missing_file_is_io_error() {
        let err = SourceDocument::from_path("/no/such/file.pdf").await.unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::NotFound);
    }

    #[test]
    fn debug_omits_bytes() {
        let doc = SourceDocument::pdf(vec![0u8; 1000], "big.pdf");
        let s = format!("{doc:?}");
        assert!(s.contains("size: 1000"));
    }
}
