//! Tests for paragraph chunking (packing, sentence fallback, overlap) and
//! file text extraction.

use corpus_rag::chunking::{Chunker, ParagraphChunker};
use proptest::prelude::*;

fn contents(chunker: &ParagraphChunker, text: &str) -> Vec<String> {
    chunker.chunk(text).into_iter().map(|p| p.content).collect()
}

#[test]
fn empty_input_yields_no_chunks() {
    let chunker = ParagraphChunker::new(500, 50);
    assert!(chunker.chunk("").is_empty());
    assert!(chunker.chunk("   \n\n   \n").is_empty());
}

#[test]
fn short_text_is_a_single_chunk() {
    let chunker = ParagraphChunker::new(500, 50);
    let chunks = chunker.chunk("hello world");
    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0].content, "hello world");
    assert_eq!(chunks[0].chunk_index, 0);
}

#[test]
fn paragraphs_pack_greedily_up_to_the_limit() {
    // Two paragraphs of 300 and 400 chars cannot share a 500-char chunk.
    let a = "a".repeat(300);
    let b = "b".repeat(400);
    let chunker = ParagraphChunker::new(500, 50);
    let chunks = chunker.chunk(&format!("{a}\n\n{b}"));

    assert_eq!(chunks.len(), 2);
    assert_eq!(chunks[0].content, a);
    // The second chunk carries the last 50 chars of the first, joined by a
    // line break.
    assert_eq!(chunks[1].content, format!("{}\n{b}", "a".repeat(50)));
    assert_eq!(chunks[1].chunk_index, 1);
}

#[test]
fn small_paragraphs_share_a_chunk() {
    let chunker = ParagraphChunker::new(500, 0);
    let chunks = chunker.chunk("first paragraph\n\nsecond paragraph");
    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0].content, "first paragraph\n\nsecond paragraph");
}

#[test]
fn oversized_paragraph_splits_on_sentences() {
    let s1 = format!("{}.", "x".repeat(199));
    let s2 = format!("{}.", "y".repeat(199));
    let s3 = format!("{}.", "z".repeat(199));
    let chunker = ParagraphChunker::new(500, 0);
    let chunks = contents(&chunker, &format!("{s1} {s2} {s3}"));

    assert_eq!(chunks.len(), 2);
    assert_eq!(chunks[0], format!("{s1}{s2}"));
    assert_eq!(chunks[1], s3);
    for chunk in &chunks {
        assert!(chunk.chars().count() <= 500);
    }
}

#[test]
fn unsplittable_sentence_passes_verbatim() {
    let long = "w".repeat(700);
    let chunker = ParagraphChunker::new(500, 0);
    let chunks = contents(&chunker, &long);
    assert_eq!(chunks, vec![long]);
}

#[test]
fn terminator_runs_stay_together() {
    let chunker = ParagraphChunker::new(12, 0);
    let chunks = contents(&chunker, "what?! really... yes.");
    assert_eq!(chunks, vec!["what?!", "really...", "yes."]);
}

#[test]
fn overlap_comes_from_the_pre_overlap_predecessor() {
    // Three 8-char paragraphs with a 10-char budget become three chunks;
    // each prefix is taken from the predecessor before its own prefix was
    // added, so overlap never compounds.
    let chunker = ParagraphChunker::new(10, 3);
    let chunks = contents(&chunker, "aaaaaaaa\n\nbbbbbbbb\n\ncccccccc");
    assert_eq!(chunks, vec!["aaaaaaaa", "aaa\nbbbbbbbb", "bbb\ncccccccc"]);
}

#[test]
fn indices_are_contiguous_from_zero() {
    let chunker = ParagraphChunker::new(50, 10);
    let text = (0..10).map(|i| format!("paragraph number {i} with some text."))
        .collect::<Vec<_>>()
        .join("\n\n");
    let chunks = chunker.chunk(&text);
    for (i, chunk) in chunks.iter().enumerate() {
        assert_eq!(chunk.chunk_index, i);
    }
}

/// Text made of short terminated sentences grouped into paragraphs, so no
/// single sentence can exceed the smallest chunk size used below.
fn arb_text() -> impl Strategy<Value = String> {
    let sentence = "[a-z ]{1,40}".prop_map(|s| format!("{}.", s.trim()));
    let paragraph =
        proptest::collection::vec(sentence, 1..6).prop_map(|sentences| sentences.join(" "));
    proptest::collection::vec(paragraph, 1..8).prop_map(|paras| paras.join("\n\n"))
}

fn strip_whitespace(s: &str) -> String {
    s.chars().filter(|c| !c.is_whitespace()).collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// With no overlap and sentences shorter than the budget, no chunk
    /// exceeds the configured size.
    #[test]
    fn chunks_respect_the_size_limit(text in arb_text(), chunk_size in 50usize..200) {
        let chunker = ParagraphChunker::new(chunk_size, 0);
        for chunk in chunker.chunk(&text) {
            prop_assert!(
                chunk.content.chars().count() <= chunk_size,
                "chunk of {} chars exceeds limit {}",
                chunk.content.chars().count(),
                chunk_size,
            );
        }
    }

    /// With no overlap, chunking loses no text: concatenating all chunks
    /// reproduces the input modulo whitespace normalization.
    #[test]
    fn chunking_preserves_content(text in arb_text(), chunk_size in 50usize..200) {
        let chunker = ParagraphChunker::new(chunk_size, 0);
        let joined: String = contents(&chunker, &text).concat();
        prop_assert_eq!(strip_whitespace(&joined), strip_whitespace(&text));
    }

    /// With overlap, every chunk after the first starts with the tail of
    /// its predecessor's pre-overlap content.
    #[test]
    fn overlap_prefixes_repeat_predecessor_tails(text in arb_text()) {
        let chunk_size = 80;
        let overlap = 15;
        let base = contents(&ParagraphChunker::new(chunk_size, 0), &text);
        let overlapped = contents(&ParagraphChunker::new(chunk_size, overlap), &text);
        prop_assert_eq!(base.len(), overlapped.len());
        for i in 1..overlapped.len() {
            let tail: String = base[i - 1]
                .chars()
                .rev()
                .take(overlap)
                .collect::<Vec<_>>()
                .into_iter()
                .rev()
                .collect();
            prop_assert_eq!(&overlapped[i], &format!("{tail}\n{}", base[i]));
        }
    }
}

#[tokio::test]
async fn extraction_rejects_unsupported_extensions() {
    let err = corpus_rag::extract_text(std::path::Path::new("notes.docx")).await.unwrap_err();
    match err {
        corpus_rag::RagError::UnsupportedFormat { extension } => assert_eq!(extension, "docx"),
        other => panic!("expected UnsupportedFormat, got {other:?}"),
    }
}

#[tokio::test]
async fn extraction_reads_plain_text_files() {
    let path = std::env::temp_dir().join("corpus_rag_extract_test.txt");
    tokio::fs::write(&path, "hello from disk").await.unwrap();
    let text = corpus_rag::extract_text(&path).await.unwrap();
    assert_eq!(text, "hello from disk");
    let _ = tokio::fs::remove_file(&path).await;
}
