//! Output types: the conversion result, the encoded artifact and the
//! process-local locator store that lets callers reference image bytes
//! without copying them.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Serialize, Serializer};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::debug;
use uuid::Uuid;

/// Scheme prefix of every locator handed out by an [`ImageStore`].
pub const LOCATOR_PREFIX: &str = "blob:pdf2img/";

// ── Locators ─────────────────────────────────────────────────────────────

/// A revocable, process-local reference to encoded image bytes.
///
/// Rendered as `blob:pdf2img/<uuid>`. Resolve it through the
/// [`ImageStore`] that issued it; after [`ImageStore::revoke`] it resolves
/// to nothing.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImageLocator(String);

impl ImageLocator {
    fn generate() -> Self {
        Self(format!("{LOCATOR_PREFIX}{}", Uuid::new_v4()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ImageLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for ImageLocator {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

/// Registry of live locators.
///
/// Entries stay alive until the caller revokes them; the store never
/// expires anything on its own. Cloning a store clones the handle, not the
/// entries.
#[derive(Clone, Default)]
pub struct ImageStore {
    entries: Arc<RwLock<HashMap<String, Arc<[u8]>>>>,
}

impl ImageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `bytes` and return a fresh locator for them.
    pub fn register(&self, bytes: Arc<[u8]>) -> ImageLocator {
        let locator = ImageLocator::generate();
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(locator.0.clone(), bytes);
        debug!("Registered locator {}", locator);
        locator
    }

    /// Look up the bytes behind a locator string.
    pub fn resolve(&self, locator: &str) -> Option<Arc<[u8]>> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(locator)
            .cloned()
    }

    /// Release a locator. Returns `false` if it was unknown or already revoked.
    pub fn revoke(&self, locator: &str) -> bool {
        let removed = self
            .entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(locator)
            .is_some();
        if removed {
            debug!("Revoked locator {}", locator);
        }
        removed
    }

    /// Number of live locators.
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for ImageStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageStore").field("live", &self.len()).finish()
    }
}

// ── Artifact ─────────────────────────────────────────────────────────────

/// An encoded output image plus the locator that references it.
#[derive(Clone, Serialize)]
pub struct OutputArtifact {
    /// Derived file name, e.g. `resume.png` or `resume_fallback.png`.
    pub name: String,
    /// MIME type of `bytes`.
    pub mime_type: &'static str,
    /// Pixel width of the encoded image.
    pub width: u32,
    /// Pixel height of the encoded image.
    pub height: u32,
    /// Locator registered for `bytes`.
    pub locator: ImageLocator,
    #[serde(rename = "size_bytes", serialize_with = "serialize_len")]
    bytes: Arc<[u8]>,
}

fn serialize_len<S: Serializer>(bytes: &Arc<[u8]>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(bytes.len() as u64)
}

impl OutputArtifact {
    pub(crate) fn new(
        name: String,
        mime_type: &'static str,
        width: u32,
        height: u32,
        locator: ImageLocator,
        bytes: Arc<[u8]>,
    ) -> Self {
        Self {
            name,
            mime_type,
            width,
            height,
            locator,
            bytes,
        }
    }

    /// The encoded image stream.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Shared handle to the encoded stream (no copy).
    pub fn shared_bytes(&self) -> Arc<[u8]> {
        Arc::clone(&self.bytes)
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// A self-contained `data:` URL carrying the image as base64.
    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, STANDARD.encode(&self.bytes))
    }
}

impl fmt::Debug for OutputArtifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutputArtifact")
            .field("name", &self.name)
            .field("mime_type", &self.mime_type)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("locator", &self.locator)
            .field("len", &self.bytes.len())
            .finish()
    }
}

// ── Result ───────────────────────────────────────────────────────────────

/// Outcome of one conversion.
///
/// Either a success (`image_url` non-empty, `file` present, no error) or a
/// failure (`image_url` empty, no file, error message). The constructors are
/// the only way to build one, so a partially populated result cannot exist.
#[derive(Debug, Clone, Serialize)]
pub struct ConversionResult {
    image_url: String,
    file: Option<OutputArtifact>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl ConversionResult {
    pub fn success(file: OutputArtifact) -> Self {
        Self {
            image_url: file.locator.to_string(),
            file: Some(file),
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        let error = error.into();
        Self {
            image_url: String::new(),
            file: None,
            // An empty message would make the failure indistinguishable from
            // nothing at all.
            error: Some(if error.is_empty() {
                "Unknown conversion error".to_string()
            } else {
                error
            }),
        }
    }

    /// Locator of the produced image, or `""` on failure.
    pub fn image_url(&self) -> &str {
        &self.image_url
    }

    pub fn file(&self) -> Option<&OutputArtifact> {
        self.file.as_ref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_success(&self) -> bool {
        self.file.is_some()
    }

    /// Convert into a `Result` for `?`-style callers.
    pub fn into_result(self) -> Result<OutputArtifact, String> {
        match (self.file, self.error) {
            (Some(file), _) => Ok(file),
            (None, error) => Err(error.unwrap_or_default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn artifact(store: &ImageStore, bytes: &[u8]) -> OutputArtifact {
        let bytes: Arc<[u8]> = Arc::from(bytes);
        let locator = store.register(Arc::clone(&bytes));
        OutputArtifact::new("doc.png".into(), "image/png", 4, 3, locator, bytes)
    }

    #[test]
    fn store_register_resolve_revoke() {
        let store = ImageStore::new();
        let bytes: Arc<[u8]> = Arc::from(&b"abc"[..]);
        let loc = store.register(Arc::clone(&bytes));

        assert!(loc.as_str().starts_with(LOCATOR_PREFIX));
        assert_eq!(store.len(), 1);
        let resolved = store.resolve(loc.as_str()).expect("live locator");
        assert!(Arc::ptr_eq(&resolved, &bytes), "store must not copy bytes");

        assert!(store.revoke(loc.as_str()));
        assert!(!store.revoke(loc.as_str()));
        assert!(store.resolve(loc.as_str()).is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn locators_are_unique() {
        let store = ImageStore::new();
        let a = store.register(Arc::from(&b"x"[..]));
        let b = store.register(Arc::from(&b"x"[..]));
        assert_ne!(a, b);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn success_result_is_fully_populated() {
        let store = ImageStore::new();
        let r = ConversionResult::success(artifact(&store, b"png"));
        assert!(r.is_success());
        assert!(!r.image_url().is_empty());
        assert_eq!(r.image_url(), r.file().unwrap().locator.as_str());
        assert!(r.error().is_none());
    }

    #[test]
    fn failure_result_is_empty_with_error() {
        let r = ConversionResult::failure("bad");
        assert!(!r.is_success());
        assert_eq!(r.image_url(), "");
        assert!(r.file().is_none());
        assert_eq!(r.error(), Some("bad"));
        assert_eq!(r.into_result().unwrap_err(), "bad");
    }

    #[test]
    fn failure_never_has_empty_error() {
        let r = ConversionResult::failure("");
        assert!(!r.error().unwrap().is_empty());
    }

    #[test]
    fn data_url_has_mime_prefix() {
        let store = ImageStore::new();
        let a = artifact(&store, b"hello");
        assert_eq!(a.to_data_url(), "data:image/png;base64,aGVsbG8=");
    }

    #[test]
    fn serialises_without_raw_bytes() {
        let store = ImageStore::new();
        let r = ConversionResult::success(artifact(&store, b"hello"));
        let json = serde_json::to_value(&r).unwrap();
        assert_eq!(json["file"]["name"], "doc.png");
        assert_eq!(json["file"]["size_bytes"], 5);
        assert!(json.get("error").is_none());

        let failed = serde_json::to_value(ConversionResult::failure("x")).unwrap();
        assert_eq!(failed["image_url"], "");
        assert!(failed["file"].is_null());
        assert_eq!(failed["error"], "x");
    }
}
