//! Error types for the `corpus-rag` crate.

use thiserror::Error;

/// Errors that can occur in RAG operations.
///
/// Not every variant propagates to the caller: per-source retrieval failures
/// and reranker failures are recovered locally by the pipeline (logged, with
/// the affected source contributing nothing), while query-embedding failures
/// and ingest failures do propagate.
#[derive(Debug, Error)]
pub enum RagError {
    /// An error occurred during embedding generation.
    ///
    /// Fatal on the query path: retrieval cannot proceed without a query
    /// vector.
    #[error("Embedding error ({provider}): {message}")]
    EmbeddingError {
        /// The embedding provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// An error occurred in the vector store backend.
    #[error("Vector store error ({backend}): {message}")]
    VectorStoreError {
        /// The vector store backend that produced the error.
        backend: String,
        /// A description of the failure.
        message: String,
    },

    /// Chunking, embedding, or storage failed while indexing a document or
    /// conversation.
    ///
    /// The caller's relational record is expected to survive this error so
    /// that vectorization can be retried out-of-band.
    #[error("Ingest error for '{doc_id}': {message}")]
    IngestError {
        /// The document (or conversation) whose indexing failed.
        doc_id: String,
        /// A description of the failure.
        message: String,
    },

    /// An error occurred during result reranking.
    #[error("Reranker error ({reranker}): {message}")]
    RerankerError {
        /// The reranker that produced the error.
        reranker: String,
        /// A description of the failure.
        message: String,
    },

    /// A source file has a format this engine cannot extract text from.
    #[error("Unsupported source format: '{extension}'")]
    UnsupportedFormat {
        /// The offending file extension (may be empty).
        extension: String,
    },

    /// The input text was empty or all whitespace.
    #[error("Input is empty")]
    EmptyInput,

    /// A configuration validation error.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// An error in the pipeline orchestration.
    #[error("Pipeline error: {0}")]
    PipelineError(String),
}

/// A convenience result type for RAG operations.
pub type Result<T> = std::result::Result<T, RagError>;
