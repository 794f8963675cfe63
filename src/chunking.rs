//! Text chunking.
//!
//! [`ParagraphChunker`] splits raw text on blank-line paragraph boundaries,
//! greedily packs paragraphs up to a character budget, falls back to sentence
//! splitting for oversized paragraphs, and optionally duplicates a character
//! overlap across chunk boundaries so similarity search is not penalized for
//! passage cuts.

use std::path::Path;

use crate::error::{RagError, Result};

/// Characters recognized as sentence terminators, covering both ASCII and
/// CJK full-width punctuation.
const SENTENCE_TERMINATORS: [char; 6] = ['.', '!', '?', '。', '！', '？'];

/// One chunk of segmented text, before embedding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkPayload {
    /// The chunk text, including any overlap prefix.
    pub content: String,
    /// 0-based, contiguous position within the source text.
    pub chunk_index: usize,
}

/// A strategy for splitting raw text into chunk payloads.
///
/// Implementations produce ordered payloads with contiguous 0-based indices.
/// Empty or all-blank input yields an empty `Vec`.
pub trait Chunker: Send + Sync {
    /// Split text into ordered chunk payloads.
    fn chunk(&self, text: &str) -> Vec<ChunkPayload>;
}

/// Paragraph-first chunker with sentence fallback and boundary overlap.
///
/// All sizes are in characters, not bytes. Guarantees:
///
/// - no chunk exceeds `chunk_size` before overlap is applied, except a
///   single sentence that alone exceeds the limit, which passes through
///   verbatim;
/// - concatenating chunk contents (ignoring overlap duplication)
///   reconstructs the non-blank paragraphs in order;
/// - when `chunk_overlap > 0`, every chunk after the first is prefixed with
///   the last `chunk_overlap` characters of its predecessor, joined by a
///   line break.
#[derive(Debug, Clone)]
pub struct ParagraphChunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl ParagraphChunker {
    /// Create a new `ParagraphChunker`.
    ///
    /// `chunk_overlap` must be less than `chunk_size`; the config builder
    /// enforces this for pipeline-constructed chunkers.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self { chunk_size, chunk_overlap }
    }

    /// Greedily pack paragraphs into segments of at most `chunk_size` chars.
    fn segment(&self, text: &str) -> Vec<String> {
        let mut segments = Vec::new();
        let mut current = String::new();
        let mut current_len = 0usize;

        for para in paragraphs(text) {
            let para_len = char_len(&para);

            if para_len > self.chunk_size {
                if !current.is_empty() {
                    segments.push(std::mem::take(&mut current));
                    current_len = 0;
                }
                segments.extend(self.split_long_paragraph(&para));
            } else if !current.is_empty() && current_len + 2 + para_len > self.chunk_size {
                segments.push(std::mem::replace(&mut current, para));
                current_len = para_len;
            } else if current.is_empty() {
                current = para;
                current_len = para_len;
            } else {
                current.push_str("\n\n");
                current.push_str(&para);
                current_len += 2 + para_len;
            }
        }

        if !current.is_empty() {
            segments.push(current);
        }
        segments
    }

    /// Split a paragraph longer than `chunk_size` on sentence boundaries,
    /// using the same greedy accumulation rule. A single sentence longer
    /// than the limit becomes its own segment, verbatim.
    fn split_long_paragraph(&self, para: &str) -> Vec<String> {
        let mut segments = Vec::new();
        let mut current = String::new();
        let mut current_len = 0usize;

        for sentence in split_sentences(para) {
            let sentence_len = char_len(&sentence);
            if !current.is_empty() && current_len + sentence_len > self.chunk_size {
                segments.push(std::mem::replace(&mut current, sentence));
                current_len = sentence_len;
            } else {
                current.push_str(&sentence);
                current_len += sentence_len;
            }
        }

        if !current.is_empty() {
            segments.push(current);
        }
        segments
    }
}

impl Chunker for ParagraphChunker {
    fn chunk(&self, text: &str) -> Vec<ChunkPayload> {
        let segments = self.segment(text);
        if segments.is_empty() {
            return Vec::new();
        }

        let contents = if self.chunk_overlap > 0 && segments.len() > 1 {
            let mut overlapped = Vec::with_capacity(segments.len());
            overlapped.push(segments[0].clone());
            for i in 1..segments.len() {
                // Overlap is taken from the previous pre-overlap segment.
                let prefix = tail_chars(&segments[i - 1], self.chunk_overlap);
                overlapped.push(format!("{prefix}\n{}", segments[i]));
            }
            overlapped
        } else {
            segments
        };

        contents
            .into_iter()
            .enumerate()
            .map(|(chunk_index, content)| ChunkPayload { content, chunk_index })
            .collect()
    }
}

/// Split text into trimmed, non-empty paragraphs at blank-line boundaries.
/// Lines containing only whitespace count as blank.
fn paragraphs(text: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut buf: Vec<&str> = Vec::new();
    for line in text.lines() {
        if line.trim().is_empty() {
            flush_paragraph(&mut buf, &mut out);
        } else {
            buf.push(line);
        }
    }
    flush_paragraph(&mut buf, &mut out);
    out
}

fn flush_paragraph(buf: &mut Vec<&str>, out: &mut Vec<String>) {
    if buf.is_empty() {
        return;
    }
    let para = buf.join("\n").trim().to_string();
    if !para.is_empty() {
        out.push(para);
    }
    buf.clear();
}

/// Split a paragraph into trimmed sentences, each keeping its terminal
/// punctuation. Runs of terminators (`"?!"`, `"..."`) stay together.
fn split_sentences(text: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut buf = String::new();
    let mut chars = text.chars().peekable();

    while let Some(ch) = chars.next() {
        buf.push(ch);
        let at_boundary = SENTENCE_TERMINATORS.contains(&ch)
            && chars.peek().is_none_or(|next| !SENTENCE_TERMINATORS.contains(next));
        if at_boundary {
            let sentence = buf.trim();
            if !sentence.is_empty() {
                out.push(sentence.to_string());
            }
            buf.clear();
        }
    }

    let sentence = buf.trim();
    if !sentence.is_empty() {
        out.push(sentence.to_string());
    }
    out
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// The last `n` characters of `s`, or all of `s` if it is shorter.
fn tail_chars(s: &str, n: usize) -> &str {
    if n == 0 {
        return "";
    }
    match s.char_indices().rev().nth(n - 1) {
        Some((idx, _)) => &s[idx..],
        None => s,
    }
}

/// Read text content from a source file.
///
/// Supports plain-text formats (`.txt`, `.md`), and `.pdf` when the `pdf`
/// feature is enabled. Any other extension is reported as
/// [`RagError::UnsupportedFormat`] and is not retried.
pub async fn extract_text(path: &Path) -> Result<String> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    match extension.as_str() {
        "txt" | "md" => tokio::fs::read_to_string(path).await.map_err(|e| {
            RagError::PipelineError(format!("failed to read '{}': {e}", path.display()))
        }),
        #[cfg(feature = "pdf")]
        "pdf" => crate::pdf::extract_pdf_text(path),
        _ => Err(RagError::UnsupportedFormat { extension }),
    }
}
