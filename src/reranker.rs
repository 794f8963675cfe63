//! Second-stage reranking of merged candidates.
//!
//! Reranking is a best-effort refinement: any failure (endpoint error,
//! timeout, misaligned response) falls back to the pre-rerank weighted
//! ordering.

use std::time::Duration;

use async_trait::async_trait;

use crate::document::Candidate;
use crate::error::Result;

/// A cross-encoder-style scorer for query/passage pairs.
///
/// [`score`](Reranker::score) returns one relevance score per passage,
/// positionally aligned with the input.
#[async_trait]
pub trait Reranker: Send + Sync {
    /// Score each passage against the query.
    async fn score(&self, query: &str, passages: &[&str]) -> Result<Vec<f32>>;
}

/// Rerank `candidates` against `query`, falling back to the incoming
/// ordering on any failure, and truncate to `top_k`.
///
/// Reranking only engages when the pool is larger than `top_k`; reordering
/// a pool no larger than the target cannot change the final set.
pub async fn rerank_or_fallback(
    reranker: &dyn Reranker,
    query: &str,
    mut candidates: Vec<Candidate>,
    top_k: usize,
    timeout: Duration,
) -> Vec<Candidate> {
    if candidates.len() <= top_k {
        return candidates;
    }

    let expected = candidates.len();
    let passages: Vec<&str> = candidates.iter().map(Candidate::text).collect();

    match tokio::time::timeout(timeout, reranker.score(query, &passages)).await {
        Ok(Ok(scores)) if scores.len() == expected => {
            for (candidate, score) in candidates.iter_mut().zip(&scores) {
                candidate.rerank_score = Some(*score);
            }
            candidates.sort_by(|a, b| {
                b.rerank_score
                    .partial_cmp(&a.rerank_score)
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
            tracing::debug!(count = expected, "reranked candidate pool");
        }
        Ok(Ok(scores)) => {
            tracing::warn!(
                expected,
                received = scores.len(),
                "reranker returned misaligned scores; keeping weighted ordering"
            );
        }
        Ok(Err(e)) => {
            tracing::warn!(error = %e, "rerank failed; keeping weighted ordering");
        }
        Err(_) => {
            tracing::warn!(?timeout, "rerank timed out; keeping weighted ordering");
        }
    }

    candidates.truncate(top_k);
    candidates
}

#[cfg(feature = "http")]
pub use self::http::HttpReranker;

#[cfg(feature = "http")]
mod http {
    //! HTTP reranker client for a cross-encoder scoring endpoint.

    use async_trait::async_trait;
    use serde::{Deserialize, Serialize};
    use tracing::{debug, error};

    use crate::error::{RagError, Result};

    use super::Reranker;

    /// A [`Reranker`] backed by an HTTP scoring service.
    ///
    /// Posts `{model, query, passages}` and expects `{scores}` aligned
    /// positionally with the passages.
    pub struct HttpReranker {
        client: reqwest::Client,
        endpoint: String,
        model: String,
    }

    impl HttpReranker {
        /// Create a reranker posting to the given endpoint with the given
        /// model name.
        pub fn new(endpoint: impl Into<String>, model: impl Into<String>) -> Self {
            Self {
                client: reqwest::Client::new(),
                endpoint: endpoint.into(),
                model: model.into(),
            }
        }

        fn map_err(message: String) -> RagError {
            RagError::RerankerError { reranker: "http".to_string(), message }
        }
    }

    #[derive(Serialize)]
    struct RerankRequest<'a> {
        model: &'a str,
        query: &'a str,
        passages: &'a [&'a str],
    }

    #[derive(Deserialize)]
    struct RerankResponse {
        scores: Vec<f32>,
    }

    #[async_trait]
    impl Reranker for HttpReranker {
        async fn score(&self, query: &str, passages: &[&str]) -> Result<Vec<f32>> {
            debug!(model = %self.model, passage_count = passages.len(), "scoring passages");

            let request = RerankRequest { model: &self.model, query, passages };
            let response = self
                .client
                .post(&self.endpoint)
                .json(&request)
                .send()
                .await
                .map_err(|e| {
                    error!(error = %e, "rerank request failed");
                    Self::map_err(format!("request failed: {e}"))
                })?;

            if !response.status().is_success() {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                error!(%status, "rerank endpoint returned an error");
                return Err(Self::map_err(format!("endpoint returned {status}: {body}")));
            }

            let parsed: RerankResponse = response.json().await.map_err(|e| {
                error!(error = %e, "failed to parse rerank response");
                Self::map_err(format!("failed to parse response: {e}"))
            })?;

            Ok(parsed.scores)
        }
    }
}
