//! PDF text extraction.
//!
//! This module is only available when the `pdf` feature is enabled.
//!
//! Extraction reads the text-showing operators (`Tj`, `TJ`, `'`, `"`) out
//! of each page's content stream. Pages become blank-line-separated
//! paragraphs so downstream chunking can split on page boundaries. This
//! covers plainly encoded text; PDFs using custom font encodings may
//! extract poorly, which surfaces as an empty-extraction error rather than
//! garbage chunks.

use std::path::Path;

use tracing::{debug, warn};

use crate::error::{RagError, Result};

/// Extract the text content of a PDF file, one paragraph per page.
///
/// # Errors
///
/// Returns [`RagError::PipelineError`] if the file cannot be parsed or
/// yields no text at all. Individual unreadable pages are skipped with a
/// warning.
pub fn extract_pdf_text(path: &Path) -> Result<String> {
    let doc = lopdf::Document::load(path).map_err(|e| {
        RagError::PipelineError(format!("failed to load '{}': {e}", path.display()))
    })?;

    let pages = doc.get_pages();
    debug!(page_count = pages.len(), "extracting pdf text");

    let mut page_texts = Vec::new();
    for (page_num, page_id) in pages {
        match doc.get_page_content(page_id) {
            Ok(content) => {
                let text = normalize(&content_text(&content));
                if !text.is_empty() {
                    page_texts.push(text);
                }
            }
            Err(e) => {
                warn!(page = page_num, error = %e, "skipping unreadable pdf page");
            }
        }
    }

    if page_texts.is_empty() {
        return Err(RagError::PipelineError(format!(
            "no text content extracted from '{}'",
            path.display()
        )));
    }

    Ok(page_texts.join("\n\n"))
}

/// Pull the shown text out of a page content stream, reading between
/// `BT`/`ET` text blocks.
fn content_text(content: &[u8]) -> String {
    let stream = String::from_utf8_lossy(content);
    let mut text = String::new();
    let mut in_text_block = false;

    for line in stream.lines() {
        let trimmed = line.trim();
        match trimmed {
            "BT" => in_text_block = true,
            "ET" => in_text_block = false,
            _ if in_text_block => {
                if let Some(shown) = operator_text(trimmed) {
                    text.push_str(&shown);
                    text.push(' ');
                }
            }
            _ => {}
        }
    }

    text
}

/// The string argument of a text-showing operator, if the line ends in one.
fn operator_text(line: &str) -> Option<String> {
    // (text) Tj and the single-quote/double-quote variants
    if line.ends_with("Tj") || line.ends_with('\'') || line.ends_with('"') {
        let start = line.find('(')?;
        let end = line.rfind(')')?;
        if start < end {
            return Some(unescape(&line[start + 1..end]));
        }
        return None;
    }

    // [(a) -120 (b)] TJ: concatenate every parenthesized run
    if line.ends_with("TJ") {
        let mut result = String::new();
        let mut current = String::new();
        let mut in_paren = false;
        for ch in line.chars() {
            match ch {
                '(' if !in_paren => in_paren = true,
                ')' if in_paren => {
                    in_paren = false;
                    result.push_str(&unescape(&current));
                    current.clear();
                }
                _ if in_paren => current.push(ch),
                _ => {}
            }
        }
        if !result.is_empty() {
            return Some(result);
        }
    }

    None
}

/// Resolve PDF literal-string escapes.
fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('t') => out.push('\t'),
            Some(c) => out.push(c),
            None => {}
        }
    }
    out
}

/// Collapse runs of whitespace within a page to single spaces.
fn normalize(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_tj_operators_between_text_blocks() {
        let content = b"BT\n(Hello) Tj\n(world) Tj\nET\n(ignored) Tj\n";
        assert_eq!(normalize(&content_text(content)), "Hello world");
    }

    #[test]
    fn reads_tj_arrays() {
        assert_eq!(operator_text("[(Hel) -120 (lo)] TJ").as_deref(), Some("Hello"));
    }

    #[test]
    fn resolves_string_escapes() {
        assert_eq!(unescape("line\\nbreak"), "line\nbreak");
        assert_eq!(unescape("a \\(paren\\)"), "a (paren)");
    }

    #[test]
    fn non_showing_operators_yield_nothing() {
        assert_eq!(operator_text("1 0 0 1 72 720 Tm"), None);
        assert_eq!(operator_text("/F1 12 Tf"), None);
    }

    #[test]
    fn whitespace_collapses_within_a_page() {
        assert_eq!(normalize("Hello   World\n\nAgain"), "Hello World Again");
    }
}
