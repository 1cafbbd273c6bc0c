//! Document processing pipeline: chunking, embedding, storage, and retrieval orchestration.

pub mod chunking;
pub mod document;
pub mod retrieval;
mod service;
pub mod types;

pub use chunking::{Chunk, ChunkParams, ChunkingStrategy, chunk};
pub use document::{Document, DocumentError, load_documents};
pub use retrieval::{ContextBundle, aggregate_hits};
pub use service::{PipelineApi, PipelineSettings, RagPipeline};
pub use types::{Answer, ChunkingError, IngestOutcome, PipelineError};
