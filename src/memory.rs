//! Conversation memory: prior question/answer pairs as a retrieval source.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::document::{Chunk, ConversationRecord};
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::vectorstore::{Filter, VectorStore, user_partition};

/// Marker joining the question and answer halves of a stored exchange.
const ANSWER_MARKER: &str = "\nA: ";
/// Prefix of the question half.
const QUESTION_PREFIX: &str = "Q: ";

/// How many characters of the question become the chunk title.
const TITLE_CHARS: usize = 50;

/// A question/answer pair recovered from conversation memory.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecalledExchange {
    /// The originating conversation id.
    pub conv_id: String,
    /// The recovered question.
    pub question: String,
    /// The recovered answer.
    pub answer: String,
    /// Raw similarity score against the query.
    pub score: f32,
    /// The conversation's feedback-adjusted weight.
    pub weight: f32,
    /// Unix timestamp of the original exchange.
    pub created_at: i64,
}

/// Indexes question/answer pairs per user and exposes them as a retrieval
/// source.
///
/// Each exchange is stored as a single chunk whose content is
/// `"Q: {question}\nA: {answer}"`, in the user's partition of the
/// conversation collection (created lazily on first write).
///
/// # Known limitation
///
/// [`recall`](ConversationMemory::recall) recovers the pair by splitting on
/// the first literal `"\nA: "` in the stored content. If the question itself
/// contains that marker, recovery splits early. No escaping is attempted.
pub struct ConversationMemory {
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    collection: String,
}

impl ConversationMemory {
    /// Create a memory over the given store and embedder, writing to the
    /// named conversation collection.
    pub fn new(
        store: Arc<dyn VectorStore>,
        embedder: Arc<dyn EmbeddingProvider>,
        collection: impl Into<String>,
    ) -> Self {
        Self { store, embedder, collection: collection.into() }
    }

    /// Embed and index one exchange under the user's partition.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::IngestError`] if embedding or the vector write
    /// fails. The caller's relational record is expected to survive so the
    /// vectorization can be retried; the failure mode is logged distinctly
    /// for reconciliation.
    pub async fn remember(&self, record: &ConversationRecord) -> Result<()> {
        let content = format!(
            "{QUESTION_PREFIX}{}{ANSWER_MARKER}{}",
            record.question, record.answer
        );

        let mut embeddings =
            self.embedder.embed_batch(&[content.as_str()]).await.map_err(|e| {
                error!(
                    conv_id = %record.conv_id,
                    user_id = %record.user_id,
                    error = %e,
                    "conversation vectorization failed; relational record retained for retry"
                );
                RagError::IngestError {
                    doc_id: record.conv_id.clone(),
                    message: format!("embedding failed: {e}"),
                }
            })?;
        let embedding = mem_embedding(&record.conv_id, embeddings.pop())?;

        let chunk = Chunk {
            id: record.conv_id.clone(),
            doc_id: record.conv_id.clone(),
            owner_id: Some(record.user_id.clone()),
            chunk_index: 0,
            title: head_chars(&record.question, TITLE_CHARS),
            doc_type: "conversation".to_string(),
            content,
            embedding,
            weight: record.weight,
            valid: record.valid,
            created_at: record.created_at,
        };

        let partition = user_partition(&record.user_id);
        let write = async {
            self.store.ensure_partition(&self.collection, &partition).await?;
            self.store.insert(&self.collection, std::slice::from_ref(&chunk), Some(&partition)).await
        };
        write.await.map_err(|e| {
            error!(
                conv_id = %record.conv_id,
                user_id = %record.user_id,
                error = %e,
                "conversation vector write failed; relational record retained for retry"
            );
            RagError::IngestError {
                doc_id: record.conv_id.clone(),
                message: format!("vector write failed: {e}"),
            }
        })?;

        info!(conv_id = %record.conv_id, user_id = %record.user_id, "indexed conversation");
        Ok(())
    }

    /// Recall the user's most similar past exchanges.
    ///
    /// Searches only the user's partition; a user with no partition yet gets
    /// an empty result, not an error. Soft-deleted exchanges are excluded.
    pub async fn recall(
        &self,
        user_id: &str,
        query_vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<RecalledExchange>> {
        if top_k == 0 {
            return Ok(Vec::new());
        }

        let partition = user_partition(user_id);
        if !self.store.has_partition(&self.collection, &partition).await? {
            debug!(user_id, "no conversation partition yet");
            return Ok(Vec::new());
        }

        let partitions = [partition];
        let hits = self
            .store
            .search(
                &self.collection,
                query_vector,
                top_k,
                Some(&partitions),
                Some(&Filter::valid_only()),
            )
            .await?;

        let exchanges = hits
            .into_iter()
            .map(|hit| {
                let (question, answer) = split_exchange(&hit.chunk.content);
                RecalledExchange {
                    conv_id: hit.chunk.id,
                    question,
                    answer,
                    score: hit.score,
                    weight: hit.chunk.weight,
                    created_at: hit.chunk.created_at,
                }
            })
            .collect::<Vec<_>>();

        debug!(user_id, count = exchanges.len(), "recalled conversations");
        Ok(exchanges)
    }

    /// Remove the exchange's vector entry.
    ///
    /// The relational soft delete (`valid = false`) is the caller's write;
    /// both must be invalidated together, so a vector deletion failure is
    /// surfaced rather than swallowed.
    pub async fn forget(&self, record: &ConversationRecord) -> Result<()> {
        let partition = user_partition(&record.user_id);
        self.store.delete(&self.collection, &[record.conv_id.as_str()], Some(&partition)).await?;
        info!(conv_id = %record.conv_id, user_id = %record.user_id, "removed conversation vector");
        Ok(())
    }

    /// The conversation collection this memory writes to.
    pub fn collection(&self) -> &str {
        &self.collection
    }
}

fn mem_embedding(conv_id: &str, embedding: Option<Vec<f32>>) -> Result<Vec<f32>> {
    embedding.ok_or_else(|| RagError::IngestError {
        doc_id: conv_id.to_string(),
        message: "embedding provider returned no vector".to_string(),
    })
}

/// Split stored content back into (question, answer) at the first answer
/// marker. Content without the marker becomes a question with an empty
/// answer.
fn split_exchange(content: &str) -> (String, String) {
    match content.split_once(ANSWER_MARKER) {
        Some((q, a)) => {
            (q.strip_prefix(QUESTION_PREFIX).unwrap_or(q).to_string(), a.to_string())
        }
        None => {
            let q = content.strip_prefix(QUESTION_PREFIX).unwrap_or(content);
            (q.to_string(), String::new())
        }
    }
}

/// The first `n` characters of `s`.
fn head_chars(s: &str, n: usize) -> String {
    s.chars().take(n).collect()
}
