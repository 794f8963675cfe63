//! The RAG pipeline orchestrating ingest, retrieval, reranking, and context
//! assembly.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tracing::{error, info};

use crate::chunking::{Chunker, ParagraphChunker, extract_text};
use crate::config::{CollectionNames, RagConfig};
use crate::context::{ContextBuilder, ContextBundle};
use crate::document::{Candidate, Chunk, ConversationRecord, Document};
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::memory::ConversationMemory;
use crate::reranker::{Reranker, rerank_or_fallback};
use crate::retriever::MultiSourceRetriever;
use crate::vectorstore::{AccessMode, VectorStore, user_partition};

/// Answer text for callers to fall back on when retrieval produced no usable
/// context. The engine itself never fabricates content.
pub const NO_MATERIAL_FALLBACK: &str =
    "No relevant reference material was found for this question.";

/// Per-call retrieval options.
#[derive(Debug, Clone)]
pub struct RetrieveOptions {
    /// Override the configured `top_k` for this call.
    pub top_k: Option<usize>,
    /// Whether conversation memory participates as a source.
    pub include_conversations: bool,
    /// Whether to rerank the merged pool (requires a configured reranker).
    pub rerank: bool,
}

impl Default for RetrieveOptions {
    fn default() -> Self {
        Self { top_k: None, include_conversations: true, rerank: true }
    }
}

/// The main RAG pipeline.
///
/// Owns the full query path (embed once, fan out, merge, optionally rerank,
/// assemble context) and the ingest path (chunk, embed, route, upsert).
/// Construct via [`RagPipeline::builder()`].
pub struct RagPipeline {
    config: RagConfig,
    collections: CollectionNames,
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStore>,
    chunker: Box<dyn Chunker>,
    reranker: Option<Box<dyn Reranker>>,
    memory: Arc<ConversationMemory>,
    retriever: MultiSourceRetriever,
    context: ContextBuilder,
}

impl RagPipeline {
    /// Create a new builder for constructing a [`RagPipeline`].
    pub fn builder() -> RagPipelineBuilder {
        RagPipelineBuilder::default()
    }

    /// The pipeline's configuration.
    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    /// The conversation memory backing the conversation source.
    pub fn memory(&self) -> &Arc<ConversationMemory> {
        &self.memory
    }

    /// Ensure all three collections exist with the embedder's dimension.
    ///
    /// Idempotent, and tolerant of concurrent callers racing to provision the
    /// same deployment. Re-provisioning against collections created with a
    /// different dimension is a schema violation and errors.
    pub async fn provision(&self) -> Result<()> {
        let dims = self.embedder.dimensions();
        self.store.ensure_collection(&self.collections.public, AccessMode::Public, dims).await?;
        self.store.ensure_collection(&self.collections.private, AccessMode::Private, dims).await?;
        self.store
            .ensure_collection(&self.collections.conversations, AccessMode::Private, dims)
            .await?;
        info!(dimensions = dims, "collections provisioned");
        Ok(())
    }

    /// Chunk, embed, and index a document, returning the number of chunks
    /// written.
    ///
    /// Documents with an `owner_id` go to the owner's partition of the
    /// private collection (created lazily); documents without go to the
    /// public collection. Chunk ids are deterministic, so re-ingesting a
    /// document replaces its previous chunks; any stale chunks from a longer
    /// previous version are removed first.
    ///
    /// Empty or all-blank content indexes nothing and returns `Ok(0)`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::IngestError`] if embedding or the vector write
    /// fails. The caller's relational record is expected to survive so
    /// vectorization can be retried.
    pub async fn ingest(&self, document: &Document) -> Result<usize> {
        let payloads = self.chunker.chunk(&document.content);
        if payloads.is_empty() {
            info!(doc_id = %document.doc_id, "document produced no chunks");
            return Ok(0);
        }

        let texts: Vec<&str> = payloads.iter().map(|p| p.content.as_str()).collect();
        let embeddings = self.embedder.embed_batch(&texts).await.map_err(|e| {
            error!(
                doc_id = %document.doc_id,
                error = %e,
                "document vectorization failed; relational record retained for retry"
            );
            RagError::IngestError {
                doc_id: document.doc_id.clone(),
                message: format!("embedding failed: {e}"),
            }
        })?;
        if embeddings.len() != payloads.len() {
            return Err(RagError::IngestError {
                doc_id: document.doc_id.clone(),
                message: format!(
                    "embedding provider returned {} vectors for {} chunks",
                    embeddings.len(),
                    payloads.len()
                ),
            });
        }

        let created_at = chrono::Utc::now().timestamp();
        let chunks: Vec<Chunk> = payloads
            .into_iter()
            .zip(embeddings)
            .map(|(payload, embedding)| Chunk {
                id: format!("{}#{}", document.doc_id, payload.chunk_index),
                doc_id: document.doc_id.clone(),
                owner_id: document.owner_id.clone(),
                chunk_index: payload.chunk_index,
                title: document.title.clone(),
                doc_type: document.doc_type.clone(),
                content: payload.content,
                embedding,
                weight: document.weight,
                valid: true,
                created_at,
            })
            .collect();

        let count = chunks.len();
        let write = async {
            match &document.owner_id {
                Some(owner) => {
                    let partition = user_partition(owner);
                    self.store.ensure_partition(&self.collections.private, &partition).await?;
                    self.store
                        .delete_by_doc_id(
                            &self.collections.private,
                            &document.doc_id,
                            Some(&partition),
                        )
                        .await?;
                    self.store.insert(&self.collections.private, &chunks, Some(&partition)).await
                }
                None => {
                    self.store
                        .delete_by_doc_id(&self.collections.public, &document.doc_id, None)
                        .await?;
                    self.store.insert(&self.collections.public, &chunks, None).await
                }
            }
        };
        write.await.map_err(|e| {
            error!(
                doc_id = %document.doc_id,
                error = %e,
                "document vector write failed; relational record retained for retry"
            );
            RagError::IngestError {
                doc_id: document.doc_id.clone(),
                message: format!("vector write failed: {e}"),
            }
        })?;

        info!(
            doc_id = %document.doc_id,
            chunk_count = count,
            public = document.owner_id.is_none(),
            "indexed document"
        );
        Ok(count)
    }

    /// Read a source file, then chunk, embed, and index it as `document`'s
    /// content.
    ///
    /// The `content` field of `document` is ignored; the file's text replaces
    /// it. Unsupported formats are rejected before any I/O on the store.
    pub async fn ingest_file(
        &self,
        document: &Document,
        path: &std::path::Path,
    ) -> Result<usize> {
        let content = extract_text(path).await?;
        let document = Document { content, ..document.clone() };
        self.ingest(&document).await
    }

    /// Remove every indexed chunk of a document.
    ///
    /// `owner_id` must match the routing used at ingest time: `Some` for a
    /// private document, `None` for a public one. Deleting a document with no
    /// indexed chunks is a no-op.
    pub async fn delete_document(&self, doc_id: &str, owner_id: Option<&str>) -> Result<()> {
        match owner_id {
            Some(owner) => {
                let partition = user_partition(owner);
                self.store
                    .delete_by_doc_id(&self.collections.private, doc_id, Some(&partition))
                    .await?;
            }
            None => {
                self.store.delete_by_doc_id(&self.collections.public, doc_id, None).await?;
            }
        }
        info!(doc_id, public = owner_id.is_none(), "removed document vectors");
        Ok(())
    }

    /// Index a question/answer exchange into conversation memory.
    pub async fn remember_conversation(&self, record: &ConversationRecord) -> Result<()> {
        self.memory.remember(record).await
    }

    /// Remove an exchange's vector entry from conversation memory.
    pub async fn forget_conversation(&self, record: &ConversationRecord) -> Result<()> {
        self.memory.forget(record).await
    }

    /// Retrieve the final ranked candidates for a query.
    ///
    /// The query is embedded exactly once; the vector is shared across all
    /// source searches. Per-source failures and rerank failures degrade the
    /// result instead of failing it; only a blank query or a query-embedding
    /// failure is fatal.
    pub async fn retrieve(
        &self,
        user_id: &str,
        query: &str,
        options: &RetrieveOptions,
    ) -> Result<Vec<Candidate>> {
        if query.trim().is_empty() {
            return Err(RagError::EmptyInput);
        }
        let top_k = options.top_k.unwrap_or(self.config.top_k);
        if top_k == 0 {
            return Ok(Vec::new());
        }

        let query_vector = self.embedder.embed_query(query).await.map_err(|e| {
            error!(user_id, error = %e, "query embedding failed");
            e
        })?;

        // Over-fetch so the reranker has a pool to reorder.
        let pool_size = top_k * 2;
        let mut pool = self
            .retriever
            .retrieve(user_id, query, &query_vector, pool_size, options.include_conversations)
            .await;
        info!(user_id, candidate_count = pool.len(), "retrieval pool merged");

        if options.rerank {
            if let Some(reranker) = &self.reranker {
                return Ok(rerank_or_fallback(
                    reranker.as_ref(),
                    query,
                    pool,
                    top_k,
                    self.config.rerank_timeout,
                )
                .await);
            }
        }
        pool.truncate(top_k);
        Ok(pool)
    }

    /// Assemble ranked candidates into a token-budgeted context bundle.
    pub fn build_context(&self, candidates: &[Candidate]) -> ContextBundle {
        self.context.build(candidates)
    }

    /// Retrieve and assemble context in one call.
    ///
    /// An empty bundle (no candidates, or none fit the budget) is a valid
    /// outcome; callers typically answer with [`NO_MATERIAL_FALLBACK`] in
    /// that case rather than generating unsupported content.
    pub async fn retrieve_context(
        &self,
        user_id: &str,
        query: &str,
        options: &RetrieveOptions,
    ) -> Result<ContextBundle> {
        let candidates = self.retrieve(user_id, query, options).await?;
        Ok(self.build_context(&candidates))
    }
}

/// Builder for constructing a [`RagPipeline`].
#[derive(Default)]
pub struct RagPipelineBuilder {
    config: Option<RagConfig>,
    collections: Option<CollectionNames>,
    embedder: Option<Arc<dyn EmbeddingProvider>>,
    store: Option<Arc<dyn VectorStore>>,
    chunker: Option<Box<dyn Chunker>>,
    reranker: Option<Box<dyn Reranker>>,
}

impl RagPipelineBuilder {
    /// Set the engine configuration. Defaults to [`RagConfig::default()`].
    pub fn config(mut self, config: RagConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the collection names. Defaults to [`CollectionNames::default()`].
    pub fn collections(mut self, collections: CollectionNames) -> Self {
        self.collections = Some(collections);
        self
    }

    /// Set the embedding provider (required).
    pub fn embedder(mut self, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    /// Set the vector store (required).
    pub fn store(mut self, store: Arc<dyn VectorStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Override the chunking strategy. Defaults to a [`ParagraphChunker`]
    /// sized from the configuration.
    pub fn chunker(mut self, chunker: Box<dyn Chunker>) -> Self {
        self.chunker = Some(chunker);
        self
    }

    /// Set an optional reranker for second-stage scoring.
    pub fn reranker(mut self, reranker: Box<dyn Reranker>) -> Self {
        self.reranker = Some(reranker);
        self
    }

    /// Build the pipeline.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if the embedder or store is missing.
    pub fn build(self) -> Result<RagPipeline> {
        let embedder = self
            .embedder
            .ok_or_else(|| RagError::ConfigError("embedding provider is required".to_string()))?;
        let store = self
            .store
            .ok_or_else(|| RagError::ConfigError("vector store is required".to_string()))?;
        let config = self.config.unwrap_or_default();
        let collections = self.collections.unwrap_or_default();
        let chunker = self.chunker.unwrap_or_else(|| {
            Box::new(ParagraphChunker::new(config.chunk_size, config.chunk_overlap))
        });

        let memory = Arc::new(ConversationMemory::new(
            Arc::clone(&store),
            Arc::clone(&embedder),
            collections.conversations.clone(),
        ));
        let permits = Arc::new(Semaphore::new(config.max_store_concurrency));
        let retriever = MultiSourceRetriever::new(
            Arc::clone(&store),
            Arc::clone(&memory),
            collections.clone(),
            &config,
            permits,
        );
        let context = ContextBuilder::from_config(&config);

        Ok(RagPipeline {
            config,
            collections,
            embedder,
            store,
            chunker,
            reranker: self.reranker,
            memory,
            retriever,
            context,
        })
    }
}
