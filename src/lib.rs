#![deny(missing_docs)]

//! Core library for Rusty RAG: token-aware chunking, vector storage, and context retrieval.

/// Generative answering gateways.
pub mod answering;
/// HTTP routing and REST handlers.
pub mod api;
/// Environment-driven configuration management.
pub mod config;
/// Embedding client abstraction and adapters.
pub mod embedding;
/// Vector index abstraction with Qdrant and in-memory backends.
pub mod index;
/// Structured logging and tracing setup.
pub mod logging;
/// Pipeline metrics helpers.
pub mod metrics;
/// Document processing pipeline: chunking, ingestion, and retrieval.
pub mod processing;
/// Tokenizer adapters used for chunk sizing.
pub mod tokenizer;
