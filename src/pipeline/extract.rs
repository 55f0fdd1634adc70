//! Text extraction: turn PDF bytes into a flat sequence of lines.
//!
//! Uses `lopdf`, which parses the document in memory and walks each page's
//! content stream for text operators. There is no layout analysis: columns,
//! tables and figure labels come out in content-stream order. The structure
//! reconstructor downstream is written to tolerate that.
//!
//! Extraction is synchronous and CPU-bound.

use crate::error::ExtractError;
use crate::output::{ExtractedText, RawDocument};
use lopdf::Document;
use tracing::{debug, info, warn};

/// PDF readers accept the header anywhere in the first KiB.
const HEADER_SEARCH_WINDOW: usize = 1024;

/// Return true if `bytes` carries a `%PDF-` header.
pub fn looks_like_pdf(bytes: &[u8]) -> bool {
    let window = &bytes[..bytes.len().min(HEADER_SEARCH_WINDOW)];
    window.windows(5).any(|w| w == b"%PDF-")
}

/// Return true if the server declared a type that cannot be a PDF.
///
/// A missing type and the generic binary types are accepted; servers often
/// send PDFs as `application/octet-stream`.
pub fn declared_non_pdf(content_type: Option<&str>) -> bool {
    let Some(declared) = content_type else {
        return false;
    };
    let essence = declared
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    if essence.is_empty() {
        return false;
    }
    let (top, sub) = essence.split_once('/').unwrap_or((essence.as_str(), ""));
    match top {
        "text" | "image" | "audio" | "video" | "font" | "multipart" => true,
        "application" => matches!(
            sub,
            "json" | "xml" | "xhtml+xml" | "javascript" | "zip" | "gzip" | "msword"
        ),
        _ => false,
    }
}

/// Extract text lines from a downloaded document.
///
/// Consumes the raw document; its bytes are released when this returns.
pub fn extract_text(raw: RawDocument, max_pages: usize) -> Result<ExtractedText, ExtractError> {
    if declared_non_pdf(raw.content_type.as_deref()) || !looks_like_pdf(&raw.bytes) {
        let magic = raw.bytes.iter().take(8).copied().collect();
        return Err(ExtractError::UnsupportedFormat {
            content_type: raw.content_type,
            magic,
        });
    }

    let document = Document::load_mem(&raw.bytes).map_err(|e| ExtractError::CorruptDocument {
        detail: e.to_string(),
    })?;
    drop(raw);

    let pages = document.get_pages();
    let page_count = pages.len();
    info!("PDF loaded: {} pages", page_count);

    if page_count == 0 {
        return Err(ExtractError::CorruptDocument {
            detail: "document has no pages".into(),
        });
    }
    if page_count > max_pages {
        return Err(ExtractError::PageLimitExceeded {
            pages: page_count,
            limit: max_pages,
        });
    }

    let mut lines = Vec::new();
    for page_num in pages.keys() {
        let text = match document.extract_text(&[*page_num]) {
            Ok(t) => t,
            Err(e) => {
                warn!("Page {}: text extraction failed: {}", page_num, e);
                continue;
            }
        };
        let before = lines.len();
        lines.extend(split_lines(&text));
        debug!("Page {}: {} lines", page_num, lines.len() - before);
    }

    Ok(ExtractedText::new(lines, page_count))
}

/// Split page text into right-trimmed lines with invisible characters removed.
fn split_lines(text: &str) -> Vec<String> {
    text.replace("\r\n", "\n")
        .split(['\n', '\r'])
        .map(|line| remove_invisible_chars(line.trim_end()))
        .collect()
}

fn remove_invisible_chars(input: &str) -> String {
    input.replace(
        [
            '\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}',
        ],
        "",
    )
}
