//! Embedding provider trait for generating vector embeddings from text.

use async_trait::async_trait;

use crate::error::{RagError, Result};

/// A provider that generates vector embeddings from text input.
///
/// Implementations wrap a specific embedding backend behind a unified async
/// interface. The dimension reported by [`dimensions`](EmbeddingProvider::dimensions)
/// is fixed per deployment and must match every collection's configured
/// dimension.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate embedding vectors for a batch of passages, positionally
    /// aligned with the input.
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>>;

    /// Generate an embedding for a retrieval query.
    ///
    /// Some backends use a dedicated query instruction or task type; the
    /// default implementation embeds the query like any other passage.
    async fn embed_query(&self, query: &str) -> Result<Vec<f32>> {
        let mut embeddings = self.embed_batch(&[query]).await?;
        embeddings.pop().ok_or_else(|| RagError::EmbeddingError {
            provider: "unknown".to_string(),
            message: "provider returned no embedding for the query".to_string(),
        })
    }

    /// Return the dimensionality of embeddings produced by this provider.
    fn dimensions(&self) -> usize;
}
