//! Tests for the in-memory vector store: search ordering, partition
//! isolation, filtering, and lifecycle semantics.

mod common;

use common::{scored, vectorize};
use corpus_rag::document::Chunk;
use corpus_rag::inmemory::InMemoryVectorStore;
use corpus_rag::vectorstore::{AccessMode, Filter, VectorStore};
use proptest::prelude::*;
use std::collections::HashMap;

const DIM: usize = 16;

fn chunk_with_embedding(id: &str, embedding: Vec<f32>) -> Chunk {
    let mut chunk = scored(id, "content", 0.0).chunk;
    chunk.embedding = embedding;
    chunk
}

/// Generate a non-zero L2-normalized embedding of the given dimension.
fn arb_normalized_embedding(dim: usize) -> impl Strategy<Value = Vec<f32>> {
    proptest::collection::vec(-1.0f32..1.0f32, dim).prop_filter_map(
        "non-zero embedding",
        |mut v| {
            let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
            if norm < 1e-8 {
                return None;
            }
            for val in &mut v {
                *val /= norm;
            }
            Some(v)
        },
    )
}

/// Generate a chunk with a normalized embedding.
fn arb_chunk(dim: usize) -> impl Strategy<Value = Chunk> {
    ("[a-z]{3,8}", arb_normalized_embedding(dim))
        .prop_map(|(id, embedding)| chunk_with_embedding(&id, embedding))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Search returns results ordered by descending cosine similarity, with
    /// at most top_k entries.
    #[test]
    fn results_ordered_descending_and_bounded_by_top_k(
        chunks in proptest::collection::vec(arb_chunk(DIM), 1..20),
        query in arb_normalized_embedding(DIM),
        top_k in 1usize..25,
    ) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let (results, unique_count) = rt.block_on(async {
            let store = InMemoryVectorStore::new();
            store.ensure_collection("test", AccessMode::Public, DIM).await.unwrap();

            // Deduplicate chunks by id to avoid upsert overwriting
            let mut deduped: HashMap<String, Chunk> = HashMap::new();
            for chunk in &chunks {
                deduped.entry(chunk.id.clone()).or_insert_with(|| chunk.clone());
            }
            let unique_chunks: Vec<Chunk> = deduped.into_values().collect();
            let count = unique_chunks.len();

            store.insert("test", &unique_chunks, None).await.unwrap();
            let results = store.search("test", &query, top_k, None, None).await.unwrap();
            (results, count)
        });

        prop_assert!(results.len() <= top_k);
        prop_assert!(results.len() <= unique_count);

        for window in results.windows(2) {
            prop_assert!(
                window[0].score >= window[1].score,
                "results not in descending order: {} < {}",
                window[0].score,
                window[1].score,
            );
        }
    }
}

#[tokio::test]
async fn reinserting_an_id_overwrites() {
    let store = InMemoryVectorStore::new();
    store.ensure_collection("docs", AccessMode::Public, DIM).await.unwrap();

    let v = vectorize("hello", DIM);
    let mut chunk = chunk_with_embedding("c1", v.clone());
    store.insert("docs", std::slice::from_ref(&chunk), None).await.unwrap();
    chunk.content = "updated".to_string();
    store.insert("docs", std::slice::from_ref(&chunk), None).await.unwrap();

    let results = store.search("docs", &v, 10, None, None).await.unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].chunk.content, "updated");
}

#[tokio::test]
async fn search_is_scoped_to_listed_partitions() {
    let store = InMemoryVectorStore::new();
    store.ensure_collection("private", AccessMode::Private, DIM).await.unwrap();
    store.ensure_partition("private", "user_a").await.unwrap();
    store.ensure_partition("private", "user_b").await.unwrap();

    let v = vectorize("shared", DIM);
    store
        .insert("private", &[chunk_with_embedding("a1", v.clone())], Some("user_a"))
        .await
        .unwrap();
    store
        .insert("private", &[chunk_with_embedding("b1", v.clone())], Some("user_b"))
        .await
        .unwrap();

    let partitions = ["user_a".to_string()];
    let results = store.search("private", &v, 10, Some(&partitions), None).await.unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].chunk.id, "a1");
}

#[tokio::test]
async fn valid_filter_excludes_soft_deleted_chunks() {
    let store = InMemoryVectorStore::new();
    store.ensure_collection("docs", AccessMode::Public, DIM).await.unwrap();

    let v = vectorize("text", DIM);
    let live = chunk_with_embedding("live", v.clone());
    let mut dead = chunk_with_embedding("dead", v.clone());
    dead.valid = false;
    store.insert("docs", &[live, dead], None).await.unwrap();

    let results =
        store.search("docs", &v, 10, None, Some(&Filter::valid_only())).await.unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].chunk.id, "live");
}

#[tokio::test]
async fn unknown_filter_field_is_an_error() {
    let store = InMemoryVectorStore::new();
    store.ensure_collection("docs", AccessMode::Public, DIM).await.unwrap();

    let filter = Filter::new().eq("no_such_field", "x");
    let result = store.search("docs", &vectorize("q", DIM), 5, None, Some(&filter)).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn ensure_collection_is_idempotent_but_schema_immutable() {
    let store = InMemoryVectorStore::new();
    store.ensure_collection("docs", AccessMode::Public, DIM).await.unwrap();
    store.ensure_collection("docs", AccessMode::Public, DIM).await.unwrap();

    assert!(store.ensure_collection("docs", AccessMode::Public, DIM + 1).await.is_err());
    assert!(store.ensure_collection("docs", AccessMode::Private, DIM).await.is_err());
}

#[tokio::test]
async fn insert_rejects_mismatched_dimensions() {
    let store = InMemoryVectorStore::new();
    store.ensure_collection("docs", AccessMode::Public, DIM).await.unwrap();

    let chunk = chunk_with_embedding("c1", vec![0.5; DIM + 4]);
    assert!(store.insert("docs", &[chunk], None).await.is_err());
}

#[tokio::test]
async fn searching_a_missing_partition_is_an_error() {
    let store = InMemoryVectorStore::new();
    store.ensure_collection("private", AccessMode::Private, DIM).await.unwrap();

    let partitions = ["user_ghost".to_string()];
    let result =
        store.search("private", &vectorize("q", DIM), 5, Some(&partitions), None).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn has_partition_reflects_ensure_partition() {
    let store = InMemoryVectorStore::new();
    store.ensure_collection("private", AccessMode::Private, DIM).await.unwrap();

    assert!(!store.has_partition("private", "user_a").await.unwrap());
    store.ensure_partition("private", "user_a").await.unwrap();
    assert!(store.has_partition("private", "user_a").await.unwrap());
}

#[tokio::test]
async fn delete_by_doc_id_removes_all_chunks_and_tolerates_absence() {
    let store = InMemoryVectorStore::new();
    store.ensure_collection("docs", AccessMode::Public, DIM).await.unwrap();

    let v = vectorize("doc", DIM);
    let mut c0 = chunk_with_embedding("d1#0", v.clone());
    c0.doc_id = "d1".to_string();
    let mut c1 = chunk_with_embedding("d1#1", v.clone());
    c1.doc_id = "d1".to_string();
    store.insert("docs", &[c0, c1], None).await.unwrap();

    store.delete_by_doc_id("docs", "d1", None).await.unwrap();
    let results = store.search("docs", &v, 10, None, None).await.unwrap();
    assert!(results.is_empty());

    // Deleting a document with no chunks is a no-op.
    store.delete_by_doc_id("docs", "never_ingested", None).await.unwrap();
}

#[tokio::test]
async fn delete_by_ids_is_partition_scoped() {
    let store = InMemoryVectorStore::new();
    store.ensure_collection("private", AccessMode::Private, DIM).await.unwrap();
    store.ensure_partition("private", "user_a").await.unwrap();
    store.ensure_partition("private", "user_b").await.unwrap();

    let v = vectorize("x", DIM);
    store
        .insert("private", &[chunk_with_embedding("same_id", v.clone())], Some("user_a"))
        .await
        .unwrap();
    store
        .insert("private", &[chunk_with_embedding("same_id", v.clone())], Some("user_b"))
        .await
        .unwrap();

    store.delete("private", &["same_id"], Some("user_a")).await.unwrap();

    let a = ["user_a".to_string()];
    let b = ["user_b".to_string()];
    assert!(store.search("private", &v, 10, Some(&a), None).await.unwrap().is_empty());
    assert_eq!(store.search("private", &v, 10, Some(&b), None).await.unwrap().len(), 1);
}
