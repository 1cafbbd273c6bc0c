use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters describing pipeline activity.
#[derive(Default)]
pub struct PipelineMetrics {
    documents_ingested: AtomicU64,
    chunks_ingested: AtomicU64,
    ingestions_skipped: AtomicU64,
    queries_served: AtomicU64,
}

impl PipelineMetrics {
    /// Create an empty metrics accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an ingestion run covering `documents` documents and `chunks` stored chunks.
    pub fn record_ingestion(&self, documents: u64, chunks: u64) {
        self.documents_ingested
            .fetch_add(documents, Ordering::Relaxed);
        self.chunks_ingested.fetch_add(chunks, Ordering::Relaxed);
    }

    /// Record an ingestion skipped by the populated-collection guard.
    pub fn record_skip(&self) {
        self.ingestions_skipped.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a retrieval or answer request.
    pub fn record_query(&self) {
        self.queries_served.fetch_add(1, Ordering::Relaxed);
    }

    /// Return a snapshot of the current counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            documents_ingested: self.documents_ingested.load(Ordering::Relaxed),
            chunks_ingested: self.chunks_ingested.load(Ordering::Relaxed),
            ingestions_skipped: self.ingestions_skipped.load(Ordering::Relaxed),
            queries_served: self.queries_served.load(Ordering::Relaxed),
        }
    }
}

/// Immutable view of pipeline counters used for reporting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct MetricsSnapshot {
    /// Documents ingested since startup.
    pub documents_ingested: u64,
    /// Chunks written across all ingestions.
    pub chunks_ingested: u64,
    /// Ingestions skipped because the collection was already populated.
    pub ingestions_skipped: u64,
    /// Retrieval and answer requests served.
    pub queries_served: u64,
}
