//! Shaping nearest-neighbour hits into the context handed to the answering gateway.

use crate::index::ScoredPoint;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeSet;

/// Passages and sources gathered for a single query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ContextBundle {
    /// Passage texts, nearest first. Duplicates are kept, empty texts are not.
    pub contexts: Vec<String>,
    /// Source identifiers seen among the hits.
    pub sources: BTreeSet<String>,
}

impl ContextBundle {
    /// Whether no passage was retrieved.
    pub fn is_empty(&self) -> bool {
        self.contexts.is_empty()
    }
}

/// Fold hits into a [`ContextBundle`] without reordering, thresholding, or truncation.
///
/// A hit contributes its `source` even when its `text` is empty. Missing or non-string payload
/// keys read as empty strings.
pub fn aggregate_hits(hits: Vec<ScoredPoint>) -> ContextBundle {
    let mut bundle = ContextBundle::default();
    for hit in hits {
        let mut payload = hit.payload.unwrap_or_default();
        let text = string_field(payload.remove("text"));
        let source = string_field(payload.remove("source"));

        if !text.is_empty() {
            bundle.contexts.push(text);
        }
        bundle.sources.insert(source);
    }
    bundle
}

fn string_field(value: Option<Value>) -> String {
    match value {
        Some(Value::String(text)) => text,
        _ => String::new(),
    }
}
