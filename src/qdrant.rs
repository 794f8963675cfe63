//! Qdrant vector store backend.
//!
//! Provides [`QdrantVectorStore`] which implements [`VectorStore`] using
//! the [qdrant-client](https://docs.rs/qdrant-client) crate over gRPC.
//!
//! Qdrant has no native partitions; they are emulated with a
//! `partition_key` payload field. A keyword index on that field is created
//! for private collections so partition-scoped searches stay cheap.
//! `ensure_partition` is therefore a no-op, and `has_partition` reports
//! whether any point carries the key, which matches the gateway contract
//! ("created or written to") for emulated partitions.
//!
//! Qdrant point ids must be integers or UUIDs, while chunk ids are strings
//! of the form `"{doc_id}#{chunk_index}"`. Points are keyed by a stable
//! 64-bit hash of the chunk id; the original id lives in the payload and is
//! what search results report.

use async_trait::async_trait;
use qdrant_client::qdrant::value::Kind;
use qdrant_client::qdrant::{
    CollectionInfo, Condition, CountPointsBuilder, CreateCollectionBuilder,
    CreateFieldIndexCollectionBuilder, DeletePointsBuilder, Distance, FieldType,
    Filter as QdrantFilter, PointStruct, PointsIdsList, SearchPointsBuilder, UpsertPointsBuilder,
    Value as QdrantValue, VectorParamsBuilder, vectors_config,
};
use qdrant_client::{Payload, Qdrant};
use tracing::debug;

use crate::document::{Chunk, ScoredChunk};
use crate::error::{RagError, Result};
use crate::vectorstore::{AccessMode, Filter, FilterValue, VectorStore};

const BACKEND: &str = "qdrant";

/// Payload field emulating partitions.
const PARTITION_FIELD: &str = "partition_key";

/// A [`VectorStore`] backed by [Qdrant](https://qdrant.tech/).
///
/// Wraps a [`qdrant_client::Qdrant`] client and maps collections to Qdrant
/// collections with cosine distance. Chunk fields are stored as Qdrant
/// payload; embeddings are not returned on read.
pub struct QdrantVectorStore {
    client: Qdrant,
}

impl QdrantVectorStore {
    /// Create a new Qdrant vector store connecting to the given URL.
    pub fn new(url: &str) -> Result<Self> {
        let client = Qdrant::from_url(url).build().map_err(Self::map_err)?;
        Ok(Self { client })
    }

    /// Create a new Qdrant vector store with default URL (`http://localhost:6334`).
    pub fn default_url() -> Result<Self> {
        Self::new("http://localhost:6334")
    }

    /// Create a new Qdrant vector store from an existing client.
    pub fn from_client(client: Qdrant) -> Self {
        Self { client }
    }

    fn map_err(e: qdrant_client::QdrantError) -> RagError {
        RagError::VectorStoreError { backend: BACKEND.to_string(), message: e.to_string() }
    }

    async fn collection_exists(&self, name: &str) -> Result<bool> {
        let collections = self.client.list_collections().await.map_err(Self::map_err)?;
        Ok(collections.collections.iter().any(|c| c.name == name))
    }

    /// The vector size an existing collection was created with, if it can
    /// be read from its configuration.
    async fn existing_dimensions(&self, name: &str) -> Result<Option<u64>> {
        let info = self.client.collection_info(name).await.map_err(Self::map_err)?;
        Ok(info.result.as_ref().and_then(configured_dimensions))
    }

    /// Extract a string from a Qdrant payload value.
    fn extract_string(value: &QdrantValue) -> Option<String> {
        match &value.kind {
            Some(Kind::StringValue(s)) => Some(s.clone()),
            _ => None,
        }
    }

    fn extract_i64(value: &QdrantValue) -> Option<i64> {
        match &value.kind {
            Some(Kind::IntegerValue(n)) => Some(*n),
            _ => None,
        }
    }

    fn extract_bool(value: &QdrantValue) -> Option<bool> {
        match &value.kind {
            Some(Kind::BoolValue(b)) => Some(*b),
            _ => None,
        }
    }

    fn extract_f64(value: &QdrantValue) -> Option<f64> {
        match &value.kind {
            Some(Kind::DoubleValue(f)) => Some(*f),
            _ => None,
        }
    }

    /// Build the qdrant filter combining the gateway filter with the
    /// emulated partition scope.
    fn qdrant_filter(
        filter: Option<&Filter>,
        partition_keys: Option<&[String]>,
    ) -> Option<QdrantFilter> {
        let mut must: Vec<Condition> = Vec::new();

        if let Some(filter) = filter {
            for (field, value) in filter.clauses() {
                let condition = match value {
                    FilterValue::Bool(v) => Condition::matches(field.clone(), *v),
                    FilterValue::Str(v) => Condition::matches(field.clone(), v.clone()),
                    FilterValue::Int(v) => Condition::matches(field.clone(), *v),
                };
                must.push(condition);
            }
        }

        if let Some(keys) = partition_keys {
            let scoped: Vec<Condition> = keys
                .iter()
                .map(|key| Condition::matches(PARTITION_FIELD, key.clone()))
                .collect();
            // One key is a plain must; several become a should-group so any
            // listed partition matches.
            match scoped.len() {
                0 => {}
                1 => must.extend(scoped),
                _ => must.push(QdrantFilter::should(scoped).into()),
            }
        }

        if must.is_empty() { None } else { Some(QdrantFilter::must(must)) }
    }

    fn chunk_payload(chunk: &Chunk, partition_key: Option<&str>) -> Payload {
        let mut map = serde_json::Map::new();
        map.insert("id".to_string(), serde_json::Value::String(chunk.id.clone()));
        map.insert("doc_id".to_string(), serde_json::Value::String(chunk.doc_id.clone()));
        if let Some(owner) = &chunk.owner_id {
            map.insert("owner_id".to_string(), serde_json::Value::String(owner.clone()));
        }
        map.insert("chunk_index".to_string(), serde_json::Value::from(chunk.chunk_index as i64));
        map.insert("title".to_string(), serde_json::Value::String(chunk.title.clone()));
        map.insert("doc_type".to_string(), serde_json::Value::String(chunk.doc_type.clone()));
        map.insert("content".to_string(), serde_json::Value::String(chunk.content.clone()));
        map.insert("weight".to_string(), serde_json::Value::from(f64::from(chunk.weight)));
        map.insert("valid".to_string(), serde_json::Value::Bool(chunk.valid));
        map.insert("created_at".to_string(), serde_json::Value::from(chunk.created_at));
        if let Some(key) = partition_key {
            map.insert(PARTITION_FIELD.to_string(), serde_json::Value::String(key.to_string()));
        }
        Payload::try_from(serde_json::Value::Object(map)).unwrap_or_default()
    }

    fn payload_chunk(payload: &std::collections::HashMap<String, QdrantValue>) -> Chunk {
        Chunk {
            id: payload.get("id").and_then(Self::extract_string).unwrap_or_default(),
            doc_id: payload.get("doc_id").and_then(Self::extract_string).unwrap_or_default(),
            owner_id: payload.get("owner_id").and_then(Self::extract_string),
            chunk_index: payload
                .get("chunk_index")
                .and_then(Self::extract_i64)
                .unwrap_or_default() as usize,
            title: payload.get("title").and_then(Self::extract_string).unwrap_or_default(),
            doc_type: payload.get("doc_type").and_then(Self::extract_string).unwrap_or_default(),
            content: payload.get("content").and_then(Self::extract_string).unwrap_or_default(),
            embedding: Vec::new(),
            weight: payload.get("weight").and_then(Self::extract_f64).unwrap_or(1.0) as f32,
            valid: payload.get("valid").and_then(Self::extract_bool).unwrap_or(true),
            created_at: payload.get("created_at").and_then(Self::extract_i64).unwrap_or_default(),
        }
    }
}

/// Read the single-vector size out of a collection's configuration.
/// Named-vector collections are not created by this backend and report
/// `None`.
fn configured_dimensions(info: &CollectionInfo) -> Option<u64> {
    let config = info.config.as_ref()?.params.as_ref()?.vectors_config.as_ref()?;
    match config.config.as_ref()? {
        vectors_config::Config::Params(params) => Some(params.size),
        vectors_config::Config::ParamsMap(_) => None,
    }
}

/// Schemas are immutable once created: re-ensuring with a different
/// dimension is an error, not a silent success. A collection whose size
/// cannot be read is left alone rather than guessed at.
fn check_dimensions(name: &str, existing: Option<u64>, requested: usize) -> Result<()> {
    match existing {
        Some(size) if size != requested as u64 => Err(RagError::VectorStoreError {
            backend: BACKEND.to_string(),
            message: format!(
                "collection '{name}' already exists with dimension {size}, requested {requested}"
            ),
        }),
        _ => Ok(()),
    }
}

/// Stable FNV-1a hash of a chunk id, used as the Qdrant point id.
fn point_id(id: &str) -> u64 {
    let mut hash = 0xcbf2_9ce4_8422_2325u64;
    for byte in id.as_bytes() {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    hash
}

#[async_trait]
impl VectorStore for QdrantVectorStore {
    async fn ensure_collection(
        &self,
        name: &str,
        access_mode: AccessMode,
        dimensions: usize,
    ) -> Result<()> {
        if self.collection_exists(name).await? {
            // Access mode is not recorded by qdrant; the dimension is the
            // verifiable half of the schema.
            check_dimensions(name, self.existing_dimensions(name).await?, dimensions)?;
        } else {
            let created = self
                .client
                .create_collection(
                    CreateCollectionBuilder::new(name).vectors_config(VectorParamsBuilder::new(
                        dimensions as u64,
                        Distance::Cosine,
                    )),
                )
                .await;
            match created {
                Ok(_) => {
                    debug!(collection = name, dimensions, "created qdrant collection");
                }
                // A concurrent caller may have won the create; re-check
                // before surfacing the error.
                Err(e) if self.collection_exists(name).await? => {
                    debug!(collection = name, error = %e, "lost collection create race");
                    check_dimensions(name, self.existing_dimensions(name).await?, dimensions)?;
                }
                Err(e) => return Err(Self::map_err(e)),
            }
        }

        if access_mode.is_private() {
            self.client
                .create_field_index(CreateFieldIndexCollectionBuilder::new(
                    name,
                    PARTITION_FIELD,
                    FieldType::Keyword,
                ))
                .await
                .map_err(Self::map_err)?;
        }
        Ok(())
    }

    async fn ensure_partition(&self, collection: &str, partition_key: &str) -> Result<()> {
        // Partitions are payload-emulated; nothing to create up front.
        debug!(collection, partition_key, "partition is implicit in qdrant");
        Ok(())
    }

    async fn has_partition(&self, collection: &str, partition_key: &str) -> Result<bool> {
        let filter =
            QdrantFilter::must([Condition::matches(PARTITION_FIELD, partition_key.to_string())]);
        // This gate decides whether a user's private data is searched at
        // all, so the count must be exact; an approximate zero would hide
        // existing points.
        let response = self
            .client
            .count(CountPointsBuilder::new(collection).filter(filter).exact(true))
            .await
            .map_err(Self::map_err)?;
        Ok(response.result.is_some_and(|r| r.count > 0))
    }

    async fn insert(
        &self,
        collection: &str,
        chunks: &[Chunk],
        partition_key: Option<&str>,
    ) -> Result<()> {
        if chunks.is_empty() {
            return Ok(());
        }

        let points: Vec<PointStruct> = chunks
            .iter()
            .map(|chunk| {
                PointStruct::new(
                    point_id(&chunk.id),
                    chunk.embedding.clone(),
                    Self::chunk_payload(chunk, partition_key),
                )
            })
            .collect();

        self.client
            .upsert_points(UpsertPointsBuilder::new(collection, points).wait(true))
            .await
            .map_err(Self::map_err)?;

        debug!(collection, count = chunks.len(), "upserted chunks to qdrant");
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
        let mut builder =
            SearchPointsBuilder::new(collection, embedding.to_vec(), top_k as u64)
                .with_payload(true);
        if let Some(filter) = Self::qdrant_filter(filter, partition_keys) {
            builder = builder.filter(filter);
        }

        let response = self.client.search_points(builder).await.map_err(Self::map_err)?;

        Ok(response
            .result
            .into_iter()
            .map(|scored| ScoredChunk {
                chunk: Self::payload_chunk(&scored.payload),
                score: scored.score,
            })
            .collect())
    }

    async fn delete_by_doc_id(
        &self,
        collection: &str,
        doc_id: &str,
        partition_key: Option<&str>,
    ) -> Result<()> {
        let mut must = vec![Condition::matches("doc_id", doc_id.to_string())];
        if let Some(key) = partition_key {
            must.push(Condition::matches(PARTITION_FIELD, key.to_string()));
        }

        self.client
            .delete_points(
                DeletePointsBuilder::new(collection).points(QdrantFilter::must(must)).wait(true),
            )
            .await
            .map_err(Self::map_err)?;

        debug!(collection, doc_id, "deleted document points from qdrant");
        Ok(())
    }

    async fn delete(
        &self,
        collection: &str,
        ids: &[&str],
        _partition_key: Option<&str>,
    ) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }

        // Point ids are globally unique hashes of chunk ids, so the
        // partition scope adds nothing here.
        let point_ids: Vec<qdrant_client::qdrant::PointId> =
            ids.iter().map(|id| point_id(id).into()).collect();

        self.client
            .delete_points(
                DeletePointsBuilder::new(collection)
                    .points(PointsIdsList { ids: point_ids })
                    .wait(true),
            )
            .await
            .map_err(Self::map_err)?;

        debug!(collection, count = ids.len(), "deleted points from qdrant");
        Ok(())
    }
}
