//! Core data types and error definitions for the processing pipeline.

use crate::{
    answering::AnsweringClientError, embedding::EmbeddingClientError, index::IndexError,
    processing::retrieval::ContextBundle, tokenizer::TokenizerError,
};
use serde::Serialize;
use thiserror::Error;

/// Errors produced while turning raw text into chunks.
#[derive(Debug, Error)]
pub enum ChunkingError {
    /// Chunk size and overlap describe an impossible window.
    #[error(
        "chunk size must be greater than zero and greater than the overlap \
         (chunk_size={chunk_size}, chunk_overlap={chunk_overlap})"
    )]
    InvalidParameters {
        /// Requested chunk size in tokens.
        chunk_size: usize,
        /// Requested overlap in tokens.
        chunk_overlap: usize,
    },
    /// Tokenizer failed to encode or decode text.
    #[error("tokenizer failed: {0}")]
    Tokenizer(#[from] TokenizerError),
}

/// Errors emitted by the retrieval-augmented generation pipeline.
///
/// Every upstream failure names the collaborator and the operation that failed. Use
/// [`PipelineError::is_configuration`] and [`PipelineError::is_transient`] to decide whether a
/// retry can help.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Caller-supplied or configured values are inconsistent.
    #[error("invalid configuration: {0}")]
    Configuration(String),
    /// Chunking step failed to segment the document.
    #[error("chunking failed: {0}")]
    Chunking(#[from] ChunkingError),
    /// Embedding provider failed to produce vectors.
    #[error("embedding gateway failed during {operation}: {source}")]
    Embedding {
        /// Pipeline step that issued the embedding request.
        operation: &'static str,
        /// Underlying provider error.
        #[source]
        source: EmbeddingClientError,
    },
    /// Embedding dimension does not match the collection.
    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Dimension the collection was created with.
        expected: usize,
        /// Dimension produced by the embedding provider.
        actual: usize,
    },
    /// Vector index request failed.
    #[error("vector index failed during {operation}: {source}")]
    VectorIndex {
        /// Vector index operation that failed.
        operation: &'static str,
        /// Underlying index error.
        #[source]
        source: IndexError,
    },
    /// Answering gateway failed to generate a response.
    #[error("answering gateway failed: {0}")]
    Answering(#[from] AnsweringClientError),
}

impl PipelineError {
    pub(crate) fn embedding(operation: &'static str) -> impl FnOnce(EmbeddingClientError) -> Self {
        move |source| Self::Embedding { operation, source }
    }

    pub(crate) fn index(operation: &'static str) -> impl FnOnce(IndexError) -> Self {
        move |source| Self::VectorIndex { operation, source }
    }

    /// Whether the failure stems from invalid parameters rather than an upstream fault.
    pub fn is_configuration(&self) -> bool {
        match self {
            Self::Configuration(_) | Self::DimensionMismatch { .. } => true,
            Self::Chunking(error) => matches!(error, ChunkingError::InvalidParameters { .. }),
            Self::VectorIndex { source, .. } => source.is_configuration(),
            Self::Embedding { .. } | Self::Answering(_) => false,
        }
    }

    /// Whether retrying the same call may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Embedding { source, .. } => source.is_transient(),
            Self::VectorIndex { source, .. } => source.is_transient(),
            Self::Answering(error) => error.is_transient(),
            Self::Configuration(_) | Self::Chunking(_) | Self::DimensionMismatch { .. } => false,
        }
    }

    /// Points applied and points requested when an upsert failed part-way.
    pub fn partial_batch(&self) -> Option<(usize, usize)> {
        match self {
            Self::VectorIndex {
                source: IndexError::PartialBatch { applied, total, .. },
                ..
            } => Some((*applied, *total)),
            _ => None,
        }
    }
}

/// Summary of an ingestion request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum IngestOutcome {
    /// Chunks were embedded and written to the collection.
    Indexed {
        /// Number of chunks produced across the ingested documents.
        chunks: usize,
        /// Number of points written to the vector index.
        upserted: usize,
    },
    /// Collection already held points; nothing was written.
    Skipped {
        /// Point count observed by the guard.
        existing: usize,
    },
}

/// Answer produced for a query, along with the context it was grounded in.
#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    /// Free text returned by the answering gateway.
    pub text: String,
    /// Context handed to the answering gateway.
    pub context: ContextBundle,
}
