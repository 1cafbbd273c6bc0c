//! Pipeline coordinating chunking, embedding, vector storage, and answering.

use crate::{
    answering::{AnswerRequest, AnsweringClient, build_answering_client},
    config::Config,
    embedding::{EmbeddingClient, build_embedding_client},
    index::{
        ChunkPayload, CollectionSpec, QdrantService, QdrantSettings, StoredPoint, VectorIndex,
        current_timestamp_rfc3339, generate_point_id,
    },
    metrics::{MetricsSnapshot, PipelineMetrics},
    processing::{
        chunking::{ChunkParams, ChunkingStrategy, chunk},
        document::Document,
        retrieval::{ContextBundle, aggregate_hits},
        types::{Answer, ChunkingError, IngestOutcome, PipelineError},
    },
    tokenizer::{Tokenizer, build_tokenizer},
};
use async_trait::async_trait;
use futures_util::{StreamExt, TryStreamExt, stream};
use std::sync::Arc;

const DEFAULT_TOP_K: usize = 3;
const DEFAULT_EMBEDDING_BATCH_SIZE: usize = 32;
const DEFAULT_EMBEDDING_CONCURRENCY: usize = 4;

/// Static knobs of a [`RagPipeline`].
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Collection that stores the chunks, with its dimension and metric.
    pub collection: CollectionSpec,
    /// Chunking strategy applied during ingestion.
    pub strategy: ChunkingStrategy,
    /// Validated chunk size and overlap.
    pub params: ChunkParams,
    /// `top_k` used when a query does not specify one.
    pub default_top_k: usize,
    /// Texts sent per embedding request.
    pub embedding_batch_size: usize,
    /// Embedding requests allowed in flight at once.
    pub embedding_concurrency: usize,
}

impl PipelineSettings {
    /// Settings with default top_k and embedding batching.
    pub fn new(
        collection: CollectionSpec,
        strategy: ChunkingStrategy,
        params: ChunkParams,
    ) -> Self {
        Self {
            collection,
            strategy,
            params,
            default_top_k: DEFAULT_TOP_K,
            embedding_batch_size: DEFAULT_EMBEDDING_BATCH_SIZE,
            embedding_concurrency: DEFAULT_EMBEDDING_CONCURRENCY,
        }
    }

    /// Derive settings from the runtime configuration.
    pub fn from_config(config: &Config) -> Result<Self, PipelineError> {
        let params = ChunkParams::new(config.chunk_size, config.chunk_overlap)?;
        if config.search_top_k == 0 {
            return Err(PipelineError::Configuration(
                "SEARCH_TOP_K must be greater than zero".into(),
            ));
        }
        Ok(Self {
            default_top_k: config.search_top_k,
            ..Self::new(
                CollectionSpec::cosine(
                    config.qdrant_collection_name.clone(),
                    config.embedding_dimension,
                ),
                config.chunk_strategy,
                params,
            )
        })
    }
}

/// Retrieval-augmented generation pipeline over injected collaborators.
///
/// The pipeline owns long-lived handles to the tokenizer, embedding gateway, vector index, and
/// optional answering gateway. Construct it once near process start and share it through an
/// `Arc`; ingestion and retrieval share nothing beyond the collection name.
pub struct RagPipeline {
    tokenizer: Arc<dyn Tokenizer>,
    embedding_client: Box<dyn EmbeddingClient>,
    index: Arc<dyn VectorIndex>,
    answering_client: Option<Box<dyn AnsweringClient>>,
    settings: PipelineSettings,
    metrics: Arc<PipelineMetrics>,
}

/// Abstraction over the pipeline used by external surfaces.
#[async_trait]
pub trait PipelineApi: Send + Sync {
    /// Ingest one document unless the collection is already populated.
    async fn ingest(&self, document: Document) -> Result<IngestOutcome, PipelineError>;

    /// Retrieve the context for a query.
    async fn retrieve(
        &self,
        query: String,
        top_k: Option<usize>,
    ) -> Result<ContextBundle, PipelineError>;

    /// Answer a query from retrieved context.
    async fn answer(&self, query: String, top_k: Option<usize>) -> Result<Answer, PipelineError>;

    /// Exact number of stored chunks.
    async fn count(&self) -> Result<usize, PipelineError>;

    /// Retrieve the current metrics snapshot for diagnostics.
    fn metrics_snapshot(&self) -> MetricsSnapshot;
}

impl RagPipeline {
    /// Assemble a pipeline from explicit collaborators. Answering is disabled until
    /// [`RagPipeline::with_answering_client`] is used.
    pub fn new(
        tokenizer: Arc<dyn Tokenizer>,
        embedding_client: Box<dyn EmbeddingClient>,
        index: Arc<dyn VectorIndex>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            tokenizer,
            embedding_client,
            index,
            answering_client: None,
            settings,
            metrics: Arc::new(PipelineMetrics::new()),
        }
    }

    /// Attach an answering gateway.
    pub fn with_answering_client(mut self, client: Box<dyn AnsweringClient>) -> Self {
        self.answering_client = Some(client);
        self
    }

    /// Build every collaborator from the runtime configuration, backed by Qdrant.
    pub fn from_config(config: &Config) -> Result<Self, PipelineError> {
        let settings = PipelineSettings::from_config(config)?;
        tracing::info!(model = %config.embedding_model, "Initializing tokenizer");
        let tokenizer = build_tokenizer(&config.embedding_model, config.tokenizer_path.as_deref())
            .map_err(ChunkingError::from)?;
        let embedding_client =
            build_embedding_client(config).map_err(PipelineError::embedding("initialize"))?;
        let index = QdrantService::new(&QdrantSettings::from_config(config))
            .map_err(PipelineError::index("connect"))?;

        let mut pipeline = Self::new(tokenizer, embedding_client, Arc::new(index), settings);
        if let Some(client) = build_answering_client(config)? {
            pipeline = pipeline.with_answering_client(client);
        }
        Ok(pipeline)
    }

    /// Static settings the pipeline was built with.
    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Create the collection when absent, verifying dimension and metric otherwise.
    pub async fn ensure_ready(&self) -> Result<(), PipelineError> {
        let collection = &self.settings.collection;
        self.index
            .ensure_collection(collection)
            .await
            .map_err(PipelineError::index("ensure collection"))?;
        tracing::debug!(
            collection = %collection.name,
            vectors = %collection.vectors,
            "Collection ready"
        );
        Ok(())
    }

    /// Exact number of stored chunks.
    pub async fn count(&self) -> Result<usize, PipelineError> {
        self.index
            .count(&self.settings.collection.name)
            .await
            .map_err(PipelineError::index("count"))
    }

    /// Chunk, embed, and store one document.
    ///
    /// Precondition: ingestion is skipped when the collection already holds any point. The guard
    /// is presence-only; it does not compare content, so a different document offered to a
    /// populated collection is skipped too.
    pub async fn ingest(&self, document: &Document) -> Result<IngestOutcome, PipelineError> {
        self.ingest_all(std::slice::from_ref(document)).await
    }

    /// Chunk several documents as one ordered chunk list and store it, guarded by a single
    /// count check. The collection is created first when absent.
    ///
    /// `chunk_index` numbers chunks across the whole call, in document order. Chunks holding
    /// only whitespace, as token windows over trailing blanks can, are not stored.
    pub async fn ingest_all(&self, documents: &[Document]) -> Result<IngestOutcome, PipelineError> {
        let collection = &self.settings.collection;
        self.ensure_ready().await?;
        let existing = self.count().await?;
        if existing > 0 {
            self.metrics.record_skip();
            tracing::info!(
                collection = %collection.name,
                existing,
                "Collection already populated; skipping ingestion"
            );
            return Ok(IngestOutcome::Skipped { existing });
        }

        let mut pending = Vec::new();
        for document in documents {
            let content_hash = document.content_hash();
            let chunks: Vec<_> = chunk(
                [document.text.as_str()],
                self.settings.strategy,
                self.settings.params,
                self.tokenizer.as_ref(),
            )?
            .into_iter()
            .filter(|chunk| !chunk.text.trim().is_empty())
            .collect();
            tracing::debug!(source = %document.source, chunks = chunks.len(), "Document chunked");
            pending.extend(
                chunks
                    .into_iter()
                    .map(|chunk| (document, content_hash.clone(), chunk)),
            );
        }

        if pending.is_empty() {
            tracing::info!(collection = %collection.name, "No content to ingest");
            return Ok(IngestOutcome::Indexed {
                chunks: 0,
                upserted: 0,
            });
        }

        let texts: Vec<String> = pending
            .iter()
            .map(|(_, _, chunk)| chunk.text.clone())
            .collect();
        let vectors = self.embed_batches(texts).await?;
        if vectors.len() != pending.len() {
            return Err(PipelineError::Embedding {
                operation: "embed chunks",
                source: crate::embedding::EmbeddingClientError::InvalidResponse(format!(
                    "expected {} embeddings, received {}",
                    pending.len(),
                    vectors.len()
                )),
            });
        }

        let ingested_at = current_timestamp_rfc3339();
        let points: Vec<StoredPoint> = pending
            .into_iter()
            .zip(vectors)
            .enumerate()
            .map(|(chunk_index, ((document, content_hash, chunk), vector))| StoredPoint {
                id: generate_point_id(),
                vector,
                payload: ChunkPayload {
                    text: chunk.text,
                    source: document.source.clone(),
                    chunk_index,
                    content_hash: Some(content_hash),
                    ingested_at: Some(ingested_at.clone()),
                    title: chunk.headers.title,
                    section: chunk.headers.section,
                    subsection: chunk.headers.subsection,
                },
            })
            .collect();
        let chunks = points.len();

        let summary = self
            .index
            .upsert(collection, points)
            .await
            .map_err(PipelineError::index("upsert"))?;

        self.metrics
            .record_ingestion(documents.len() as u64, summary.applied as u64);
        tracing::info!(
            collection = %collection.name,
            documents = documents.len(),
            chunks,
            upserted = summary.applied,
            "Documents ingested"
        );

        Ok(IngestOutcome::Indexed {
            chunks,
            upserted: summary.applied,
        })
    }

    /// Embed `query`, search the collection, and fold the hits into a [`ContextBundle`].
    ///
    /// An empty collection yields an empty bundle, not an error.
    pub async fn retrieve(
        &self,
        query: &str,
        top_k: Option<usize>,
    ) -> Result<ContextBundle, PipelineError> {
        let top_k = top_k.unwrap_or(self.settings.default_top_k);
        if top_k == 0 {
            return Err(PipelineError::Configuration(
                "top_k must be greater than zero".into(),
            ));
        }

        let vector = self
            .embedding_client
            .generate_embedding(query.to_string())
            .await
            .map_err(PipelineError::embedding("embed query"))?;
        self.check_dimension(&vector)?;

        let collection = &self.settings.collection;
        let hits = self
            .index
            .similarity_search(collection, &vector, top_k)
            .await
            .map_err(PipelineError::index("similarity search"))?;

        let bundle = aggregate_hits(hits);
        self.metrics.record_query();
        tracing::info!(
            collection = %collection.name,
            top_k,
            contexts = bundle.contexts.len(),
            sources = bundle.sources.len(),
            "Context retrieved"
        );
        Ok(bundle)
    }

    /// Retrieve context for `query` and hand it to the answering gateway.
    pub async fn answer(&self, query: &str, top_k: Option<usize>) -> Result<Answer, PipelineError> {
        let client = self.answering_client.as_ref().ok_or_else(|| {
            PipelineError::Configuration("no answering provider configured".into())
        })?;

        let context = self.retrieve(query, top_k).await?;
        if context.is_empty() {
            tracing::warn!(query_len = query.len(), "Answering without retrieved context");
        }
        let text = client
            .generate_answer(AnswerRequest {
                query: query.to_string(),
                contexts: context.contexts.clone(),
            })
            .await
            .inspect_err(|error| tracing::error!(error = %error, "Answer generation failed"))?;

        Ok(Answer { text, context })
    }

    /// Return the current pipeline metrics snapshot.
    pub fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    async fn embed_batches(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>, PipelineError> {
        let batch_size = self.settings.embedding_batch_size.max(1);
        let batches: Vec<Vec<String>> = texts
            .chunks(batch_size)
            .map(<[String]>::to_vec)
            .collect();
        tracing::debug!(
            texts = texts.len(),
            batches = batches.len(),
            concurrency = self.settings.embedding_concurrency,
            "Embedding chunks"
        );

        // `buffered` keeps batch order, so vectors line up with chunk order.
        let embedded: Vec<Vec<Vec<f32>>> = stream::iter(batches)
            .map(|batch| self.embedding_client.generate_embeddings(batch))
            .buffered(self.settings.embedding_concurrency.max(1))
            .try_collect()
            .await
            .map_err(PipelineError::embedding("embed chunks"))?;

        let vectors: Vec<Vec<f32>> = embedded.into_iter().flatten().collect();
        for vector in &vectors {
            self.check_dimension(vector)?;
        }
        Ok(vectors)
    }

    fn check_dimension(&self, vector: &[f32]) -> Result<(), PipelineError> {
        let expected = self.settings.collection.dimension();
        if vector.len() != expected {
            return Err(PipelineError::DimensionMismatch {
                expected,
                actual: vector.len(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl PipelineApi for RagPipeline {
    async fn ingest(&self, document: Document) -> Result<IngestOutcome, PipelineError> {
        RagPipeline::ingest(self, &document).await
    }

    async fn retrieve(
        &self,
        query: String,
        top_k: Option<usize>,
    ) -> Result<ContextBundle, PipelineError> {
        RagPipeline::retrieve(self, &query, top_k).await
    }

    async fn answer(&self, query: String, top_k: Option<usize>) -> Result<Answer, PipelineError> {
        RagPipeline::answer(self, &query, top_k).await
    }

    async fn count(&self) -> Result<usize, PipelineError> {
        RagPipeline::count(self).await
    }

    fn metrics_snapshot(&self) -> MetricsSnapshot {
        RagPipeline::metrics_snapshot(self)
    }
}
