//! Ingestion: URL → bytes → text lines → structured document.
//!
//! ```text
//! URL
//!  │
//!  ├─ 1. Fetch        bounded streaming download (async)
//!  ├─ 2. Extract      PDF text lines via lopdf (sync)
//!  ├─ 3. Structure    ordered line rules → blocks (sync)
//!  └─ 4. Render       blocks → Markdown
//! ```
//!
//! Any stage failure aborts the run; no partial document is returned.

use crate::config::PaperLensConfig;
use crate::error::PaperError;
use crate::output::{IngestOutput, IngestStats, RawDocument};
use crate::pipeline::{extract, fetch::ContentFetcher, structure};
use std::time::Instant;
use tracing::{debug, info};

/// Download and reconstruct the paper at `url`.
pub async fn ingest(
    url: &str,
    fetcher: &ContentFetcher,
    config: &PaperLensConfig,
) -> Result<IngestOutput, PaperError> {
    let total_start = Instant::now();

    // ── Step 1: Fetch ────────────────────────────────────────────────────
    if let Some(ref cb) = config.progress_callback {
        cb.on_fetch_start(url);
    }
    let fetch_start = Instant::now();
    let raw = fetcher.fetch(url).await.inspect_err(|e| {
        if let Some(ref cb) = config.progress_callback {
            cb.on_error("fetch", &e.to_string());
        }
    })?;
    let fetch_duration_ms = fetch_start.elapsed().as_millis() as u64;
    if let Some(ref cb) = config.progress_callback {
        cb.on_fetch_complete(url, raw.len());
    }

    // ── Steps 2-4: Extract, structure, render ────────────────────────────
    let mut output = ingest_bytes(raw, config)?;
    output.stats.fetch_duration_ms = fetch_duration_ms;
    output.stats.total_duration_ms = total_start.elapsed().as_millis() as u64;

    info!(
        "Ingested {}: {} pages, {} blocks, {} text bytes in {}ms",
        url,
        output.page_count,
        output.document.blocks.len(),
        output.text_bytes,
        output.stats.total_duration_ms
    );
    Ok(output)
}

/// Reconstruct a document that is already in memory.
///
/// Synchronous: extraction and reconstruction are CPU-bound. Call from
/// `spawn_blocking` when documents are large.
pub fn ingest_bytes(raw: RawDocument, config: &PaperLensConfig) -> Result<IngestOutput, PaperError> {
    let start = Instant::now();
    let downloaded_bytes = raw.len();

    let text = extract::extract_text(raw, config.max_pages).inspect_err(|e| {
        if let Some(ref cb) = config.progress_callback {
            cb.on_error("extract", &e.to_string());
        }
    })?;
    if let Some(ref cb) = config.progress_callback {
        cb.on_extract_complete(text.page_count, text.lines.len());
    }
    debug!(
        "Extracted {} lines from {} pages",
        text.lines.len(),
        text.page_count
    );

    let document = structure::reconstruct(&text);
    if let Some(ref cb) = config.progress_callback {
        cb.on_structure_complete(document.blocks.len());
    }
    let markdown = structure::render_markdown(&document);
    let elapsed = start.elapsed().as_millis() as u64;

    Ok(IngestOutput {
        text_bytes: text.byte_size(),
        page_count: text.page_count,
        document,
        markdown,
        stats: IngestStats {
            downloaded_bytes,
            fetch_duration_ms: 0,
            extract_duration_ms: elapsed,
            total_duration_ms: elapsed,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ExtractError;

    #[test]
    fn html_bytes_are_rejected() {
        let raw = RawDocument::new(b"<!doctype html><p>hi</p>".to_vec(), Some("text/html".into()));
        let err = ingest_bytes(raw, &PaperLensConfig::default()).unwrap_err();
        assert!(
            matches!(err, PaperError::Extract(ExtractError::UnsupportedFormat { .. })),
            "got: {err:?}"
        );
    }
}
