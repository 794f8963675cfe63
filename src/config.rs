//! Configuration for the RAG engine.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};

/// Names of the three logical collections the engine operates on.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CollectionNames {
    /// Unpartitioned collection holding documents visible to every user.
    pub public: String,
    /// Per-user partitioned collection of private documents.
    pub private: String,
    /// Per-user partitioned collection of indexed question/answer pairs.
    pub conversations: String,
}

impl Default for CollectionNames {
    fn default() -> Self {
        Self {
            public: "public_documents".to_string(),
            private: "private_documents".to_string(),
            conversations: "conversations".to_string(),
        }
    }
}

/// Configuration parameters for the RAG engine.
///
/// Source weights need not sum to 1; each source's raw similarity scores are
/// multiplied by its weight as-is, and `round(top_k × weight)` candidates are
/// requested from it. Construct via [`RagConfig::builder()`] to get
/// validation, or use [`Default`] for the stock deployment values.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RagConfig {
    /// Maximum chunk size in characters.
    pub chunk_size: usize,
    /// Number of characters duplicated from the previous chunk.
    pub chunk_overlap: usize,
    /// Number of final candidates returned by a retrieval.
    pub top_k: usize,
    /// Score multiplier for the public document source, in (0, 1].
    pub public_weight: f32,
    /// Score multiplier for the private document source, in (0, 1].
    pub private_weight: f32,
    /// Score multiplier for the conversation memory source, in (0, 1].
    pub conversation_weight: f32,
    /// Approximate token budget for assembled context.
    pub token_limit: usize,
    /// Character-to-token cost multiplier used by the context builder.
    ///
    /// A placeholder heuristic; swap in a measured value (or a real
    /// tokenizer behind the same estimate function) as needed.
    pub token_cost_multiplier: f32,
    /// Independent timeout applied to each source retrieval.
    pub retrieval_timeout: Duration,
    /// Timeout applied to the optional rerank call.
    pub rerank_timeout: Duration,
    /// Maximum number of concurrent vector-store calls issued per retrieval
    /// layer. Bounds blocking store I/O so a slow store cannot starve
    /// unrelated requests.
    pub max_store_concurrency: usize,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            chunk_size: 500,
            chunk_overlap: 50,
            top_k: 6,
            public_weight: 0.6,
            private_weight: 0.4,
            conversation_weight: 0.3,
            token_limit: 3000,
            token_cost_multiplier: 1.5,
            retrieval_timeout: Duration::from_secs(10),
            rerank_timeout: Duration::from_secs(10),
            max_store_concurrency: 8,
        }
    }
}

impl RagConfig {
    /// Create a new builder for constructing a [`RagConfig`].
    pub fn builder() -> RagConfigBuilder {
        RagConfigBuilder::default()
    }
}

/// Builder for constructing a validated [`RagConfig`].
#[derive(Debug, Clone, Default)]
pub struct RagConfigBuilder {
    config: RagConfig,
}

impl RagConfigBuilder {
    /// Set the maximum chunk size in characters.
    pub fn chunk_size(mut self, size: usize) -> Self {
        self.config.chunk_size = size;
        self
    }

    /// Set the overlap between consecutive chunks in characters.
    pub fn chunk_overlap(mut self, overlap: usize) -> Self {
        self.config.chunk_overlap = overlap;
        self
    }

    /// Set the number of final candidates returned by a retrieval.
    pub fn top_k(mut self, k: usize) -> Self {
        self.config.top_k = k;
        self
    }

    /// Set the per-source score weights (public, private, conversation).
    pub fn source_weights(mut self, public: f32, private: f32, conversation: f32) -> Self {
        self.config.public_weight = public;
        self.config.private_weight = private;
        self.config.conversation_weight = conversation;
        self
    }

    /// Set the approximate token budget for assembled context.
    pub fn token_limit(mut self, limit: usize) -> Self {
        self.config.token_limit = limit;
        self
    }

    /// Set the character-to-token cost multiplier.
    pub fn token_cost_multiplier(mut self, multiplier: f32) -> Self {
        self.config.token_cost_multiplier = multiplier;
        self
    }

    /// Set the independent per-source retrieval timeout.
    pub fn retrieval_timeout(mut self, timeout: Duration) -> Self {
        self.config.retrieval_timeout = timeout;
        self
    }

    /// Set the rerank call timeout.
    pub fn rerank_timeout(mut self, timeout: Duration) -> Self {
        self.config.rerank_timeout = timeout;
        self
    }

    /// Set the bound on concurrent vector-store calls.
    pub fn max_store_concurrency(mut self, limit: usize) -> Self {
        self.config.max_store_concurrency = limit;
        self
    }

    /// Build the [`RagConfig`], validating that parameters are consistent.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if:
    /// - `chunk_overlap >= chunk_size`
    /// - `top_k == 0`
    /// - any source weight is outside `(0, 1]`
    /// - `token_cost_multiplier <= 0`
    /// - `max_store_concurrency == 0`
    pub fn build(self) -> Result<RagConfig> {
        let c = self.config;
        if c.chunk_overlap >= c.chunk_size {
            return Err(RagError::ConfigError(format!(
                "chunk_overlap ({}) must be less than chunk_size ({})",
                c.chunk_overlap, c.chunk_size
            )));
        }
        if c.top_k == 0 {
            return Err(RagError::ConfigError("top_k must be greater than zero".to_string()));
        }
        for (name, weight) in [
            ("public_weight", c.public_weight),
            ("private_weight", c.private_weight),
            ("conversation_weight", c.conversation_weight),
        ] {
            if !(weight > 0.0 && weight <= 1.0) {
                return Err(RagError::ConfigError(format!(
                    "{name} ({weight}) must be in (0, 1]"
                )));
            }
        }
        if c.token_cost_multiplier <= 0.0 {
            return Err(RagError::ConfigError(
                "token_cost_multiplier must be positive".to_string(),
            ));
        }
        if c.max_store_concurrency == 0 {
            return Err(RagError::ConfigError(
                "max_store_concurrency must be greater than zero".to_string(),
            ));
        }
        Ok(c)
    }
}
