//! Shared test doubles for the integration test suite.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use corpus_rag::document::{Chunk, ScoredChunk};
use corpus_rag::embedding::EmbeddingProvider;
use corpus_rag::error::{RagError, Result};
use corpus_rag::reranker::Reranker;
use corpus_rag::vectorstore::{AccessMode, Filter, VectorStore};

/// Deterministic embedder: folds text bytes into a normalized vector.
pub struct FakeEmbedder {
    pub dim: usize,
}

impl FakeEmbedder {
    pub fn new(dim: usize) -> Self {
        Self { dim }
    }
}

pub fn vectorize(text: &str, dim: usize) -> Vec<f32> {
    let mut v = vec![0.0f32; dim];
    for (i, byte) in text.bytes().enumerate() {
        v[i % dim] += f32::from(byte) / 255.0;
    }
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in &mut v {
            *x /= norm;
        }
    }
    v
}

#[async_trait]
impl EmbeddingProvider for FakeEmbedder {
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| vectorize(t, self.dim)).collect())
    }

    fn dimensions(&self) -> usize {
        self.dim
    }
}

/// Embedder that always fails.
pub struct FailingEmbedder {
    pub dim: usize,
}

#[async_trait]
impl EmbeddingProvider for FailingEmbedder {
    async fn embed_batch(&self, _texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        Err(RagError::EmbeddingError {
            provider: "failing".to_string(),
            message: "induced failure".to_string(),
        })
    }

    fn dimensions(&self) -> usize {
        self.dim
    }
}

/// A store returning canned search results per collection, recording which
/// collections were searched.
#[derive(Default)]
pub struct ScriptedStore {
    pub results: HashMap<String, Vec<ScoredChunk>>,
    pub partitions: HashSet<(String, String)>,
    pub fail_collections: HashSet<String>,
    pub searched: Mutex<Vec<String>>,
}

impl ScriptedStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_results(mut self, collection: &str, results: Vec<ScoredChunk>) -> Self {
        self.results.insert(collection.to_string(), results);
        self
    }

    pub fn with_partition(mut self, collection: &str, partition: &str) -> Self {
        self.partitions.insert((collection.to_string(), partition.to_string()));
        self
    }

    pub fn failing(mut self, collection: &str) -> Self {
        self.fail_collections.insert(collection.to_string());
        self
    }

    pub fn searched_collections(&self) -> Vec<String> {
        self.searched.lock().unwrap().clone()
    }
}

#[async_trait]
impl VectorStore for ScriptedStore {
    async fn ensure_collection(
        &self,
        _name: &str,
        _access_mode: AccessMode,
        _dimensions: usize,
    ) -> Result<()> {
        Ok(())
    }

    async fn ensure_partition(&self, _collection: &str, _partition_key: &str) -> Result<()> {
        Ok(())
    }

    async fn has_partition(&self, collection: &str, partition_key: &str) -> Result<bool> {
        Ok(self.partitions.contains(&(collection.to_string(), partition_key.to_string())))
    }

    async fn insert(
        &self,
        _collection: &str,
        _chunks: &[Chunk],
        _partition_key: Option<&str>,
    ) -> Result<()> {
        Ok(())
    }

    async fn search(
        &self,
        collection: &str,
        _embedding: &[f32],
        top_k: usize,
        _partition_keys: Option<&[String]>,
        _filter: Option<&Filter>,
    ) -> Result<Vec<ScoredChunk>> {
        self.searched.lock().unwrap().push(collection.to_string());
        if self.fail_collections.contains(collection) {
            return Err(RagError::VectorStoreError {
                backend: "scripted".to_string(),
                message: "induced failure".to_string(),
            });
        }
        let mut hits = self.results.get(collection).cloned().unwrap_or_default();
        hits.truncate(top_k);
        Ok(hits)
    }

    async fn delete_by_doc_id(
        &self,
        _collection: &str,
        _doc_id: &str,
        _partition_key: Option<&str>,
    ) -> Result<()> {
        Ok(())
    }

    async fn delete(
        &self,
        _collection: &str,
        _ids: &[&str],
        _partition_key: Option<&str>,
    ) -> Result<()> {
        Ok(())
    }
}

/// Build a scored document chunk with the given id and raw score.
pub fn scored(id: &str, content: &str, score: f32) -> ScoredChunk {
    ScoredChunk {
        chunk: Chunk {
            id: id.to_string(),
            doc_id: format!("doc_{id}"),
            owner_id: None,
            chunk_index: 0,
            title: format!("title {id}"),
            doc_type: "report".to_string(),
            content: content.to_string(),
            embedding: Vec::new(),
            weight: 1.0,
            valid: true,
            created_at: 0,
        },
        score,
    }
}

/// Build a scored conversation chunk ("Q: ...\nA: ..." content).
pub fn scored_exchange(id: &str, question: &str, answer: &str, score: f32) -> ScoredChunk {
    let mut hit = scored(id, "", score);
    hit.chunk.content = format!("Q: {question}\nA: {answer}");
    hit.chunk.doc_type = "conversation".to_string();
    hit
}

/// Reranker scoring 1.0 for passages containing the keyword, 0.0 otherwise.
pub struct KeywordReranker {
    pub keyword: String,
}

#[async_trait]
impl Reranker for KeywordReranker {
    async fn score(&self, _query: &str, passages: &[&str]) -> Result<Vec<f32>> {
        Ok(passages
            .iter()
            .map(|p| if p.contains(&self.keyword) { 1.0 } else { 0.0 })
            .collect())
    }
}

/// Reranker that always fails.
pub struct FailingReranker;

#[async_trait]
impl Reranker for FailingReranker {
    async fn score(&self, _query: &str, _passages: &[&str]) -> Result<Vec<f32>> {
        Err(RagError::RerankerError {
            reranker: "failing".to_string(),
            message: "induced failure".to_string(),
        })
    }
}

/// Reranker that sleeps past any reasonable timeout.
pub struct SlowReranker {
    pub delay: Duration,
}

#[async_trait]
impl Reranker for SlowReranker {
    async fn score(&self, _query: &str, passages: &[&str]) -> Result<Vec<f32>> {
        tokio::time::sleep(self.delay).await;
        Ok(vec![0.0; passages.len()])
    }
}

/// Reranker returning the wrong number of scores.
pub struct MisalignedReranker;

#[async_trait]
impl Reranker for MisalignedReranker {
    async fn score(&self, _query: &str, passages: &[&str]) -> Result<Vec<f32>> {
        Ok(vec![1.0; passages.len() + 1])
    }
}
