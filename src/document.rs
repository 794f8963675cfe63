//! Data types for documents, chunks, conversations, and retrieval candidates.

use serde::{Deserialize, Serialize};

/// Lower bound for conversation weights after feedback adjustment.
pub const WEIGHT_MIN: f32 = 0.1;
/// Upper bound for conversation weights after feedback adjustment.
pub const WEIGHT_MAX: f32 = 1.0;

/// The origin of a retrieval candidate.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    /// The shared, unpartitioned document collection.
    Public,
    /// The caller's partition of the private document collection.
    Private,
    /// The caller's indexed question/answer history.
    Conversation,
}

impl SourceType {
    /// Stable lowercase name, used in logs and citation output.
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceType::Public => "public",
            SourceType::Private => "private",
            SourceType::Conversation => "conversation",
        }
    }
}

impl std::fmt::Display for SourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A source document to be chunked and indexed.
///
/// The relational row backing this document is owned by the caller; the
/// engine only references it through `doc_id`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    /// Unique identifier, shared with the caller's relational store.
    pub doc_id: String,
    /// Owning user, or `None` for public documents.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<String>,
    /// Display title.
    pub title: String,
    /// Document category, e.g. `"report"` or `"policy"`.
    pub doc_type: String,
    /// The raw text content.
    pub content: String,
    /// Document-level relevance multiplier.
    pub weight: f32,
}

impl Document {
    /// Create a document with weight 1.0.
    pub fn new(
        doc_id: impl Into<String>,
        owner_id: Option<String>,
        title: impl Into<String>,
        doc_type: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            doc_id: doc_id.into(),
            owner_id,
            title: title.into(),
            doc_type: doc_type.into(),
            content: content.into(),
            weight: 1.0,
        }
    }
}

/// The unit of indexed text stored in a vector collection.
///
/// Chunk ids are deterministic (`"{doc_id}#{chunk_index}"`), so re-ingesting
/// the same document overwrites its chunks instead of duplicating them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    /// Primary key within the collection: `"{doc_id}#{chunk_index}"`.
    pub id: String,
    /// The parent document's id.
    pub doc_id: String,
    /// Owning user; `None` in the public collection.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<String>,
    /// 0-based, contiguous position within the parent document.
    pub chunk_index: usize,
    /// Parent document title, denormalized for rendering.
    pub title: String,
    /// Parent document category, denormalized for rendering.
    pub doc_type: String,
    /// The chunk text (including any overlap prefix).
    pub content: String,
    /// Fixed-dimension embedding vector.
    pub embedding: Vec<f32>,
    /// Document-level relevance multiplier.
    pub weight: f32,
    /// Soft-delete flag; searches filter on `valid == true`.
    pub valid: bool,
    /// Unix timestamp of indexing.
    pub created_at: i64,
}

/// A chunk returned from a similarity search, paired with its raw score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredChunk {
    /// The retrieved chunk. Backends may omit the embedding on read.
    pub chunk: Chunk,
    /// Raw similarity score (higher is more relevant).
    pub score: f32,
}

/// A persisted question/answer pair, retrievable as a conversation chunk.
///
/// The relational row is owned by the caller. Soft deletion must invalidate
/// both the row (`valid = false`) and the vector entry together; the engine
/// covers the vector side via `ConversationMemory::forget`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConversationRecord {
    /// Unique identifier, doubling as the vector-store primary key.
    pub conv_id: String,
    /// Owning user.
    pub user_id: String,
    /// The question asked.
    pub question: String,
    /// The generated answer.
    pub answer: String,
    /// Relevance multiplier, adjustable by feedback, clamped to [0.1, 1.0].
    pub weight: f32,
    /// Whether the user liked this answer.
    pub liked: bool,
    /// Soft-delete flag.
    pub valid: bool,
    /// Unix timestamp of creation.
    pub created_at: i64,
}

impl ConversationRecord {
    /// Create a record with weight 1.0, not liked, valid, timestamped now.
    pub fn new(
        conv_id: impl Into<String>,
        user_id: impl Into<String>,
        question: impl Into<String>,
        answer: impl Into<String>,
    ) -> Self {
        Self {
            conv_id: conv_id.into(),
            user_id: user_id.into(),
            question: question.into(),
            answer: answer.into(),
            weight: 1.0,
            liked: false,
            valid: true,
            created_at: chrono::Utc::now().timestamp(),
        }
    }

    /// Apply user feedback: an optional liked flag and an optional weight
    /// delta. The weight stays within [[`WEIGHT_MIN`], [`WEIGHT_MAX`]] after
    /// any sequence of deltas.
    pub fn apply_feedback(&mut self, liked: Option<bool>, weight_delta: Option<f32>) {
        if let Some(liked) = liked {
            self.liked = liked;
        }
        if let Some(delta) = weight_delta {
            self.weight = (self.weight + delta).clamp(WEIGHT_MIN, WEIGHT_MAX);
        }
    }

    /// Mark the record soft-deleted. The vector entry must be removed
    /// separately (see `ConversationMemory::forget`).
    pub fn invalidate(&mut self) {
        self.valid = false;
    }
}

/// What a retrieval candidate points at, driving context rendering.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CandidateContent {
    /// A chunk from a document collection.
    Excerpt {
        /// Parent document id.
        doc_id: String,
        /// Parent document title.
        title: String,
        /// Parent document category.
        doc_type: String,
        /// Position within the parent document.
        chunk_index: usize,
        /// The chunk text.
        content: String,
    },
    /// A recovered question/answer pair from conversation memory.
    Exchange {
        /// Conversation id.
        conv_id: String,
        /// The recovered question.
        question: String,
        /// The recovered answer.
        answer: String,
    },
}

/// An ephemeral, per-query retrieval result.
///
/// Created during retrieval, optionally re-scored by the reranker, consumed
/// by the context builder, and discarded with the response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Candidate {
    /// The retrieved content.
    pub content: CandidateContent,
    /// Which source produced this candidate.
    pub source_type: SourceType,
    /// Raw similarity score from the source.
    pub score: f32,
    /// `score × source_weight`; the merge ordering key.
    pub weighted_score: f32,
    /// Cross-encoder score, set only when reranking succeeded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rerank_score: Option<f32>,
}

impl Candidate {
    /// The passage text handed to the reranker: chunk content for document
    /// candidates, the answer for conversation candidates.
    pub fn text(&self) -> &str {
        match &self.content {
            CandidateContent::Excerpt { content, .. } => content,
            CandidateContent::Exchange { answer, .. } => answer,
        }
    }
}
