//! Batch conversion: convert many documents, yielding results as they finish.
//!
//! ## Why stream?
//!
//! A folder of uploads can hold dozens of documents. A stream lets callers
//! show each thumbnail as soon as it exists instead of waiting for the whole
//! batch, and `concurrency` bounds how many renders occupy the blocking pool
//! at once.
//!
//! Results arrive in completion order, not input order. Every item carries
//! the document's display name, or a caller-chosen key with
//! [`convert_stream_keyed`], so callers can match them up.

use crate::convert::Converter;
use crate::output::ConversionResult;
use crate::pipeline::input::SourceDocument;
use futures::stream::{self, StreamExt};
use std::pin::Pin;
use std::sync::Arc;
use tokio_stream::Stream;
use tracing::info;

/// A boxed stream of `(document name, result)` pairs.
pub type ConversionStream = Pin<Box<dyn Stream<Item = (String, ConversionResult)> + Send>>;

/// Convert `documents` with at most `concurrency` conversions in flight.
///
/// All conversions share `converter`'s engine loader, so the engine is
/// acquired once for the whole batch. A `concurrency` of 0 is treated as 1.
///
/// # Example
/// ```rust,no_run
/// use edgequake_pdf2img::{convert_stream, ConversionConfig, Converter, SourceDocument};
/// use futures::StreamExt;
/// use std::sync::Arc;
///
/// # async fn run(docs: Vec<SourceDocument>) {
/// let converter = Arc::new(Converter::new(ConversionConfig::default()));
/// let mut results = convert_stream(converter, docs, 4);
/// while let Some((name, result)) = results.next().await {
///     println!("{name}: {}", if result.is_success() { "ok" } else { "failed" });
/// }
/// # }
/// ```
pub fn convert_stream(
    converter: Arc<Converter>,
    documents: impl IntoIterator<Item = SourceDocument>,
    concurrency: usize,
) -> ConversionStream {
    let keyed = documents
        .into_iter()
        .map(|document| (document.name().to_string(), document));
    convert_stream_keyed(converter, keyed, concurrency)
}

/// Like [`convert_stream`], but each result carries the caller's key
/// instead of the display name.
///
/// Display names need not be unique (`a/x.pdf` and `b/x.pdf` are both
/// `x.pdf`); a key such as the input path or index tells such results apart.
pub fn convert_stream_keyed<K>(
    converter: Arc<Converter>,
    documents: impl IntoIterator<Item = (K, SourceDocument)>,
    concurrency: usize,
) -> Pin<Box<dyn Stream<Item = (K, ConversionResult)> + Send>>
where
    K: Send + 'static,
{
    let documents: Vec<(K, SourceDocument)> = documents.into_iter().collect();
    let concurrency = concurrency.max(1);
    info!(
        "Starting batch conversion: {} documents, concurrency {}",
        documents.len(),
        concurrency
    );

    let s = stream::iter(documents.into_iter().map(move |(key, document)| {
        let converter = Arc::clone(&converter);
        async move {
            let result = converter.convert(&document).await;
            (key, result)
        }
    }))
    .buffer_unordered(concurrency);

    Box::pin(s)
}
