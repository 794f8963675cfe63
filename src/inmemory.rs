//! In-memory vector store using cosine similarity.
//!
//! [`InMemoryVectorStore`] implements the full gateway surface, including
//! partitions and equality filters, backed by nested `HashMap`s behind a
//! `tokio::sync::RwLock`. It is a development and test backend, not an ANN
//! engine: search is an exact scan of the targeted partitions.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::document::{Chunk, ScoredChunk};
use crate::error::{RagError, Result};
use crate::vectorstore::{AccessMode, Filter, FilterValue, VectorStore};

const BACKEND: &str = "in-memory";

/// Partition used for unpartitioned writes and public collections.
const DEFAULT_PARTITION: &str = "_default";

#[derive(Debug)]
struct CollectionState {
    access_mode: AccessMode,
    dimensions: usize,
    /// partition key → chunk id → chunk
    partitions: HashMap<String, HashMap<String, Chunk>>,
}

/// An in-memory, partition-aware vector store using cosine similarity.
#[derive(Debug, Default)]
pub struct InMemoryVectorStore {
    collections: RwLock<HashMap<String, CollectionState>>,
}

impl InMemoryVectorStore {
    /// Create a new empty in-memory vector store.
    pub fn new() -> Self {
        Self::default()
    }

    fn missing_collection(name: &str) -> RagError {
        RagError::VectorStoreError {
            backend: BACKEND.to_string(),
            message: format!("collection '{name}' does not exist"),
        }
    }

    fn missing_partition(collection: &str, partition: &str) -> RagError {
        RagError::VectorStoreError {
            backend: BACKEND.to_string(),
            message: format!("partition '{partition}' does not exist in '{collection}'"),
        }
    }
}

/// Compute cosine similarity between two vectors.
///
/// Returns 0.0 if either vector has zero magnitude.
pub(crate) fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// Evaluate an equality filter against a chunk's scalar fields.
fn matches_filter(chunk: &Chunk, filter: &Filter) -> Result<bool> {
    for (field, value) in filter.clauses() {
        let matched = match (field.as_str(), value) {
            ("valid", FilterValue::Bool(v)) => chunk.valid == *v,
            ("id", FilterValue::Str(v)) => chunk.id == *v,
            ("doc_id", FilterValue::Str(v)) => chunk.doc_id == *v,
            ("owner_id", FilterValue::Str(v)) => chunk.owner_id.as_deref() == Some(v.as_str()),
            ("doc_type", FilterValue::Str(v)) => chunk.doc_type == *v,
            ("chunk_index", FilterValue::Int(v)) => chunk.chunk_index as i64 == *v,
            ("created_at", FilterValue::Int(v)) => chunk.created_at == *v,
            _ => {
                return Err(RagError::VectorStoreError {
                    backend: BACKEND.to_string(),
                    message: format!("unsupported filter clause on field '{field}'"),
                });
            }
        };
        if !matched {
            return Ok(false);
        }
    }
    Ok(true)
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn ensure_collection(
        &self,
        name: &str,
        access_mode: AccessMode,
        dimensions: usize,
    ) -> Result<()> {
        let mut collections = self.collections.write().await;
        match collections.get(name) {
            Some(existing) => {
                // Schemas are immutable once created.
                if existing.dimensions != dimensions || existing.access_mode != access_mode {
                    return Err(RagError::VectorStoreError {
                        backend: BACKEND.to_string(),
                        message: format!(
                            "collection '{name}' already exists with a different schema \
                             (dimensions {}, access mode {:?})",
                            existing.dimensions, existing.access_mode
                        ),
                    });
                }
                Ok(())
            }
            None => {
                let mut partitions = HashMap::new();
                partitions.insert(DEFAULT_PARTITION.to_string(), HashMap::new());
                collections.insert(
                    name.to_string(),
                    CollectionState { access_mode, dimensions, partitions },
                );
                Ok(())
            }
        }
    }

    async fn ensure_partition(&self, collection: &str, partition_key: &str) -> Result<()> {
        let mut collections = self.collections.write().await;
        let state =
            collections.get_mut(collection).ok_or_else(|| Self::missing_collection(collection))?;
        state.partitions.entry(partition_key.to_string()).or_default();
        Ok(())
    }

    async fn has_partition(&self, collection: &str, partition_key: &str) -> Result<bool> {
        let collections = self.collections.read().await;
        let state =
            collections.get(collection).ok_or_else(|| Self::missing_collection(collection))?;
        Ok(state.partitions.contains_key(partition_key))
    }

    async fn insert(
        &self,
        collection: &str,
        chunks: &[Chunk],
        partition_key: Option<&str>,
    ) -> Result<()> {
        let mut collections = self.collections.write().await;
        let state =
            collections.get_mut(collection).ok_or_else(|| Self::missing_collection(collection))?;

        for chunk in chunks {
            if chunk.embedding.len() != state.dimensions {
                return Err(RagError::VectorStoreError {
                    backend: BACKEND.to_string(),
                    message: format!(
                        "chunk '{}' has dimension {} but collection '{collection}' expects {}",
                        chunk.id,
                        chunk.embedding.len(),
                        state.dimensions
                    ),
                });
            }
        }

        let key = partition_key.unwrap_or(DEFAULT_PARTITION);
        let partition = state
            .partitions
            .get_mut(key)
            .ok_or_else(|| Self::missing_partition(collection, key))?;
        for chunk in chunks {
            partition.insert(chunk.id.clone(), chunk.clone());
        }
        Ok(())
    }

    async fn search(
        &self,
        collection: &str,
        embedding: &[f32],
        top_k: usize,
        partition_keys: Option<&[String]>,
        filter: Option<&Filter>,
    ) -> Result<Vec<ScoredChunk>> {
        let collections = self.collections.read().await;
        let state =
            collections.get(collection).ok_or_else(|| Self::missing_collection(collection))?;

        let mut targets: Vec<&HashMap<String, Chunk>> = Vec::new();
        match partition_keys {
            Some(keys) => {
                for key in keys {
                    let partition = state
                        .partitions
                        .get(key)
                        .ok_or_else(|| Self::missing_partition(collection, key))?;
                    targets.push(partition);
                }
            }
            None => targets.extend(state.partitions.values()),
        }

        let mut scored = Vec::new();
        for partition in targets {
            for chunk in partition.values() {
                if let Some(filter) = filter {
                    if !matches_filter(chunk, filter)? {
                        continue;
                    }
                }
                let score = cosine_similarity(&chunk.embedding, embedding);
                scored.push(ScoredChunk { chunk: chunk.clone(), score });
            }
        }

        // Tie-break on id so results are deterministic across map iteration
        // orders.
        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.chunk.id.cmp(&b.chunk.id))
        });
        scored.truncate(top_k);
        Ok(scored)
    }

    async fn delete_by_doc_id(
        &self,
        collection: &str,
        doc_id: &str,
        partition_key: Option<&str>,
    ) -> Result<()> {
        let mut collections = self.collections.write().await;
        let state =
            collections.get_mut(collection).ok_or_else(|| Self::missing_collection(collection))?;

        match partition_key {
            Some(key) => {
                if let Some(partition) = state.partitions.get_mut(key) {
                    partition.retain(|_, chunk| chunk.doc_id != doc_id);
                }
            }
            None => {
                for partition in state.partitions.values_mut() {
                    partition.retain(|_, chunk| chunk.doc_id != doc_id);
                }
            }
        }
        Ok(())
    }

    async fn delete(
        &self,
        collection: &str,
        ids: &[&str],
        partition_key: Option<&str>,
    ) -> Result<()> {
        let mut collections = self.collections.write().await;
        let state =
            collections.get_mut(collection).ok_or_else(|| Self::missing_collection(collection))?;

        match partition_key {
            Some(key) => {
                if let Some(partition) = state.partitions.get_mut(key) {
                    for id in ids {
                        partition.remove(*id);
                    }
                }
            }
            None => {
                for partition in state.partitions.values_mut() {
                    for id in ids {
                        partition.remove(*id);
                    }
                }
            }
        }
        Ok(())
    }
}
