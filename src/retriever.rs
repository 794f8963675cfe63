//! Weighted multi-source retrieval: public documents, private documents, and
//! conversation memory, fanned out concurrently and merged into one ranking.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tracing::{debug, warn};

use crate::config::{CollectionNames, RagConfig};
use crate::document::{Candidate, CandidateContent, ScoredChunk, SourceType};
use crate::error::{RagError, Result};
use crate::memory::{ConversationMemory, RecalledExchange};
use crate::vectorstore::{Filter, VectorStore, user_partition};

/// Retrieves from all configured sources for one query and merges the
/// results by weighted score.
///
/// Each source is queried concurrently under its own timeout; a failing or
/// slow source is logged and contributes zero candidates without aborting
/// the overall retrieval. Store calls are bounded by a semaphore so slow
/// vector-store I/O cannot starve unrelated requests. Dropping the returned
/// future discards in-flight results without affecting store state.
pub struct MultiSourceRetriever {
    store: Arc<dyn VectorStore>,
    memory: Arc<ConversationMemory>,
    collections: CollectionNames,
    public_weight: f32,
    private_weight: f32,
    conversation_weight: f32,
    timeout: Duration,
    permits: Arc<Semaphore>,
}

impl MultiSourceRetriever {
    /// Create a retriever over the given store and conversation memory.
    pub fn new(
        store: Arc<dyn VectorStore>,
        memory: Arc<ConversationMemory>,
        collections: CollectionNames,
        config: &RagConfig,
        permits: Arc<Semaphore>,
    ) -> Self {
        Self {
            store,
            memory,
            collections,
            public_weight: config.public_weight,
            private_weight: config.private_weight,
            conversation_weight: config.conversation_weight,
            timeout: config.retrieval_timeout,
            permits,
        }
    }

    /// Retrieve up to `round(pool_size × w)` candidates from each source and
    /// merge them, ordered by `raw_score × source_weight` descending. Ties
    /// keep source-arrival order (public, private, conversation).
    ///
    /// `query` is used for failure logging only; retrieval runs on
    /// `query_vector`.
    pub async fn retrieve(
        &self,
        user_id: &str,
        query: &str,
        query_vector: &[f32],
        pool_size: usize,
        include_conversations: bool,
    ) -> Vec<Candidate> {
        let public_k = source_request(pool_size, self.public_weight);
        let private_k = source_request(pool_size, self.private_weight);
        let conversation_k = source_request(pool_size, self.conversation_weight);

        let (public, private, conversations) = tokio::join!(
            self.with_timeout(self.search_public(query_vector, public_k)),
            self.with_timeout(self.search_private(user_id, query_vector, private_k)),
            async {
                if include_conversations {
                    self.with_timeout(self.recall_conversations(
                        user_id,
                        query_vector,
                        conversation_k,
                    ))
                    .await
                } else {
                    Ok(Vec::new())
                }
            },
        );

        let public = recover("public", user_id, query, public);
        let private = recover("private", user_id, query, private);
        let conversations = recover("conversation", user_id, query, conversations);

        let mut merged = Vec::with_capacity(public.len() + private.len() + conversations.len());
        merged.extend(
            public.into_iter().map(|hit| excerpt(hit, SourceType::Public, self.public_weight)),
        );
        merged.extend(
            private.into_iter().map(|hit| excerpt(hit, SourceType::Private, self.private_weight)),
        );
        merged.extend(
            conversations.into_iter().map(|ex| exchange(ex, self.conversation_weight)),
        );

        // Stable sort: equal weighted scores keep arrival order.
        merged.sort_by(|a, b| {
            b.weighted_score.partial_cmp(&a.weighted_score).unwrap_or(std::cmp::Ordering::Equal)
        });

        debug!(user_id, count = merged.len(), "merged retrieval pool");
        merged
    }

    async fn search_public(&self, query_vector: &[f32], top_k: usize) -> Result<Vec<ScoredChunk>> {
        if top_k == 0 {
            return Ok(Vec::new());
        }
        let _permit = self.acquire().await?;
        self.store
            .search(
                &self.collections.public,
                query_vector,
                top_k,
                None,
                Some(&Filter::valid_only()),
            )
            .await
    }

    async fn search_private(
        &self,
        user_id: &str,
        query_vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<ScoredChunk>> {
        if top_k == 0 {
            return Ok(Vec::new());
        }
        let _permit = self.acquire().await?;
        let partition = user_partition(user_id);
        if !self.store.has_partition(&self.collections.private, &partition).await? {
            return Ok(Vec::new());
        }
        let partitions = [partition];
        self.store
            .search(
                &self.collections.private,
                query_vector,
                top_k,
                Some(&partitions),
                Some(&Filter::valid_only()),
            )
            .await
    }

    async fn recall_conversations(
        &self,
        user_id: &str,
        query_vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<RecalledExchange>> {
        if top_k == 0 {
            return Ok(Vec::new());
        }
        let _permit = self.acquire().await?;
        self.memory.recall(user_id, query_vector, top_k).await
    }

    async fn acquire(&self) -> Result<tokio::sync::SemaphorePermit<'_>> {
        self.permits.acquire().await.map_err(|_| RagError::VectorStoreError {
            backend: "gateway".to_string(),
            message: "store executor is closed".to_string(),
        })
    }

    async fn with_timeout<T>(
        &self,
        fut: impl Future<Output = Result<Vec<T>>>,
    ) -> Result<Vec<T>> {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(RagError::VectorStoreError {
                backend: "gateway".to_string(),
                message: format!("source retrieval timed out after {:?}", self.timeout),
            }),
        }
    }
}

/// How many candidates to request from a source: `round(pool_size × weight)`.
fn source_request(pool_size: usize, weight: f32) -> usize {
    (pool_size as f64 * f64::from(weight)).round() as usize
}

/// Collapse a per-source failure into zero candidates, logging enough
/// context to reconcile later.
fn recover<T>(source: &str, user_id: &str, query: &str, result: Result<Vec<T>>) -> Vec<T> {
    match result {
        Ok(hits) => {
            debug!(source, count = hits.len(), "source retrieval completed");
            hits
        }
        Err(e) => {
            warn!(
                source,
                user_id,
                query,
                error = %e,
                "source retrieval failed; contributing no candidates"
            );
            Vec::new()
        }
    }
}

fn excerpt(hit: ScoredChunk, source_type: SourceType, weight: f32) -> Candidate {
    Candidate {
        content: CandidateContent::Excerpt {
            doc_id: hit.chunk.doc_id,
            title: hit.chunk.title,
            doc_type: hit.chunk.doc_type,
            chunk_index: hit.chunk.chunk_index,
            content: hit.chunk.content,
        },
        source_type,
        score: hit.score,
        weighted_score: hit.score * weight,
        rerank_score: None,
    }
}

fn exchange(ex: RecalledExchange, weight: f32) -> Candidate {
    Candidate {
        content: CandidateContent::Exchange {
            conv_id: ex.conv_id,
            question: ex.question,
            answer: ex.answer,
        },
        source_type: SourceType::Conversation,
        score: ex.score,
        weighted_score: ex.score * weight,
        rerank_score: None,
    }
}
