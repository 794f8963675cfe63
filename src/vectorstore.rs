//! Vector store gateway trait: collection/partition lifecycle and vector CRUD.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::document::{Chunk, ScoredChunk};
use crate::error::Result;

/// How a collection scopes access to its contents.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AccessMode {
    /// A single shared index; no partitioning, no `owner_id` field.
    Public,
    /// Partitioned by owning user; one partition per user, created lazily.
    Private,
}

impl AccessMode {
    /// Whether this mode partitions data per owner.
    pub fn is_private(&self) -> bool {
        matches!(self, AccessMode::Private)
    }
}

/// The partition key for a user's slice of a private collection.
pub fn user_partition(user_id: &str) -> String {
    format!("user_{user_id}")
}

/// A scalar value usable in an equality filter clause.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum FilterValue {
    /// Boolean equality, e.g. `valid == true`.
    Bool(bool),
    /// String equality, e.g. `doc_id == "doc_42"`.
    Str(String),
    /// Integer equality.
    Int(i64),
}

impl From<bool> for FilterValue {
    fn from(v: bool) -> Self {
        FilterValue::Bool(v)
    }
}

impl From<&str> for FilterValue {
    fn from(v: &str) -> Self {
        FilterValue::Str(v.to_string())
    }
}

impl From<String> for FilterValue {
    fn from(v: String) -> Self {
        FilterValue::Str(v)
    }
}

impl From<i64> for FilterValue {
    fn from(v: i64) -> Self {
        FilterValue::Int(v)
    }
}

/// A conjunction of equality predicates over scalar chunk fields.
///
/// This is the minimal expression language the gateway requires of a
/// backend: enough to exclude soft-deleted chunks (`valid == true`) and to
/// scope deletes by `doc_id`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Filter {
    clauses: Vec<(String, FilterValue)>,
}

impl Filter {
    /// An empty filter matching everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an equality clause.
    pub fn eq(mut self, field: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        self.clauses.push((field.into(), value.into()));
        self
    }

    /// The standard search filter excluding soft-deleted chunks.
    pub fn valid_only() -> Self {
        Self::new().eq("valid", true)
    }

    /// The equality clauses, in insertion order.
    pub fn clauses(&self) -> &[(String, FilterValue)] {
        &self.clauses
    }
}

/// A storage gateway owning collection/partition lifecycle and vector CRUD
/// against a nearest-neighbor index.
///
/// Creation operations are idempotent and tolerate concurrent callers: two
/// processes racing to create the same collection must both complete
/// successfully with exactly one physical collection, with no process-wide
/// locking. Connectivity errors are surfaced, not retried; retry policy
/// belongs to the caller.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Create the collection if absent and make it ready for queries.
    ///
    /// A benign "already exists" race outcome is success. Re-ensuring an
    /// existing collection with a different dimension or access mode is a
    /// schema violation and errors: schemas are immutable once created.
    async fn ensure_collection(
        &self,
        name: &str,
        access_mode: AccessMode,
        dimensions: usize,
    ) -> Result<()>;

    /// Create a partition within a collection if absent. Idempotent.
    async fn ensure_partition(&self, collection: &str, partition_key: &str) -> Result<()>;

    /// Whether the partition exists (i.e. has been created or written to).
    async fn has_partition(&self, collection: &str, partition_key: &str) -> Result<bool>;

    /// Upsert chunks, keyed by chunk id, optionally into one partition.
    ///
    /// Re-inserting an id overwrites the previous entry. The call is
    /// all-or-nothing from the caller's perspective.
    async fn insert(
        &self,
        collection: &str,
        chunks: &[Chunk],
        partition_key: Option<&str>,
    ) -> Result<()>;

    /// Similarity search returning up to `top_k` chunks by descending score.
    ///
    /// When `partition_keys` is supplied, only those partitions are
    /// searched; returning a chunk from any other partition is a
    /// correctness violation. `filter` further restricts matches; searches
    /// issued by the engine always pass [`Filter::valid_only`].
    async fn search(
        &self,
        collection: &str,
        embedding: &[f32],
        top_k: usize,
        partition_keys: Option<&[String]>,
        filter: Option<&Filter>,
    ) -> Result<Vec<ScoredChunk>>;

    /// Remove every chunk belonging to a document.
    ///
    /// Safe to call for a document with zero indexed chunks (no-op).
    async fn delete_by_doc_id(
        &self,
        collection: &str,
        doc_id: &str,
        partition_key: Option<&str>,
    ) -> Result<()>;

    /// Remove chunks by id, optionally scoped to one partition.
    async fn delete(
        &self,
        collection: &str,
        ids: &[&str],
        partition_key: Option<&str>,
    ) -> Result<()>;
}
