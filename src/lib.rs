//! # corpus-rag
//!
//! A retrieval-augmented generation engine over partitioned vector
//! collections: document chunking, weighted multi-source retrieval,
//! optional reranking, and token-budgeted context assembly.
//!
//! ## Overview
//!
//! The engine operates on three logical collections:
//!
//! - a shared **public** document collection,
//! - a **private** document collection partitioned per user,
//! - a **conversation** collection of indexed question/answer pairs,
//!   partitioned per user.
//!
//! A query is embedded once, fanned out concurrently to all three sources,
//! and the results are merged by `raw_score × source_weight`. An optional
//! cross-encoder reranker refines the pool; failures fall back to the
//! weighted ordering. Top candidates are packed whole into a context string
//! bounded by an approximate token budget, alongside structured citation
//! metadata.
//!
//! Backends plug in at trait seams: [`VectorStore`] for storage,
//! [`EmbeddingProvider`] for vectors, [`Chunker`] for segmentation, and
//! [`Reranker`] for second-stage scoring. [`InMemoryVectorStore`] ships for
//! development and tests; a Qdrant backend and OpenAI-compatible HTTP
//! clients are available behind feature flags.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use corpus_rag::{
//!     Document, InMemoryVectorStore, RagPipeline, RetrieveOptions,
//! };
//! # use corpus_rag::{EmbeddingProvider, Result};
//! # async fn demo(embedder: Arc<dyn EmbeddingProvider>) -> Result<()> {
//! let pipeline = RagPipeline::builder()
//!     .embedder(embedder)
//!     .store(Arc::new(InMemoryVectorStore::new()))
//!     .build()?;
//! pipeline.provision().await?;
//!
//! let doc = Document::new("doc_1", None, "Onboarding", "guide", "Welcome...");
//! pipeline.ingest(&doc).await?;
//!
//! let context = pipeline
//!     .retrieve_context("user_42", "how do I get started?", &RetrieveOptions::default())
//!     .await?;
//! println!("{}", context.text);
//! # Ok(())
//! # }
//! ```
//!
//! ## Feature Flags
//!
//! - `http` – [`OpenAIEmbeddingProvider`] and [`HttpReranker`] via `reqwest`.
//! - `qdrant` – [`qdrant::QdrantVectorStore`] via `qdrant-client`.
//! - `pdf` – `.pdf` support in [`extract_text`] via `lopdf`.

pub mod chunking;
pub mod config;
pub mod context;
pub mod document;
pub mod embedding;
pub mod error;
pub mod inmemory;
pub mod memory;
#[cfg(feature = "http")]
pub mod openai;
#[cfg(feature = "pdf")]
mod pdf;
pub mod pipeline;
#[cfg(feature = "qdrant")]
pub mod qdrant;
pub mod reranker;
pub mod retriever;
pub mod vectorstore;

pub use chunking::{ChunkPayload, Chunker, ParagraphChunker, extract_text};
pub use config::{CollectionNames, RagConfig, RagConfigBuilder};
pub use context::{ContextBuilder, ContextBundle, SourceRef};
pub use document::{
    Candidate, CandidateContent, Chunk, ConversationRecord, Document, ScoredChunk, SourceType,
};
pub use embedding::EmbeddingProvider;
pub use error::{RagError, Result};
pub use inmemory::InMemoryVectorStore;
pub use memory::{ConversationMemory, RecalledExchange};
#[cfg(feature = "http")]
pub use openai::OpenAIEmbeddingProvider;
pub use pipeline::{NO_MATERIAL_FALLBACK, RagPipeline, RagPipelineBuilder, RetrieveOptions};
#[cfg(feature = "http")]
pub use reranker::HttpReranker;
pub use reranker::{Reranker, rerank_or_fallback};
pub use retriever::MultiSourceRetriever;
pub use vectorstore::{AccessMode, Filter, FilterValue, VectorStore, user_partition};
