//! Pipeline stages for PDF-to-image conversion.
//!
//! Each submodule implements exactly one transformation step. The
//! orchestrator in [`crate::convert`] sequences them and decides when to
//! fall back to a placeholder.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ render ──▶ encode ──▶ OutputArtifact
//! (bytes)   (engine)   (png/jpeg)
//!              │
//!              └──(engine unavailable)──▶ placeholder ──▶ encode
//! ```
//!
//! 1. [`input`]: the uploaded document (bytes, media type, name)
//! 2. [`render`]: rasterise page 1 on the blocking pool
//! 3. [`encode`]: compress the surface and register a locator
//! 4. [`placeholder`]: draw a synthetic card when rendering is impossible

pub mod encode;
pub mod input;
pub mod placeholder;
pub mod render;
