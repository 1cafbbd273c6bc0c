//! Tokenizer adapters used for chunk sizing.
//!
//! Chunk budgets are only meaningful when the same tokenizer is used for chunking and for the
//! embedding model. Two adapters are provided:
//!
//! - [`TiktokenTokenizer`]: OpenAI BPE encodings resolved from the embedding model name, falling
//!   back to the encoding name and finally to `cl100k_base`.
//! - [`HuggingFaceTokenizer`]: any `tokenizer.json` (e.g. the BGE-M3 tokenizer shipped with the
//!   embedding model), loaded through the `tokenizers` crate.

use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tiktoken_rs::{
    CoreBPE, cl100k_base, get_bpe_from_model, o200k_base, p50k_base, p50k_edit, r50k_base,
};

/// Errors raised by tokenizer adapters.
#[derive(Debug, Error)]
pub enum TokenizerError {
    /// Tokenizer resources could not be loaded.
    #[error("failed to load tokenizer '{name}': {reason}")]
    Load {
        /// Model, encoding, or file we attempted to load.
        name: String,
        /// Underlying failure description.
        reason: String,
    },
    /// Text could not be encoded into token ids.
    #[error("failed to encode text: {0}")]
    Encode(String),
    /// Token ids could not be decoded back into text.
    #[error("failed to decode tokens: {0}")]
    Decode(String),
}

/// Token encoder/decoder shared by chunking and token counting.
pub trait Tokenizer: Send + Sync {
    /// Encode text into an ordered sequence of token ids.
    fn encode(&self, text: &str) -> Result<Vec<u32>, TokenizerError>;

    /// Decode a sequence of token ids back into text.
    fn decode(&self, ids: &[u32]) -> Result<String, TokenizerError>;

    /// Number of tokens `text` encodes to.
    fn count(&self, text: &str) -> Result<usize, TokenizerError> {
        Ok(self.encode(text)?.len())
    }
}

/// Tokenizer backed by an OpenAI BPE encoding.
pub struct TiktokenTokenizer {
    encoding: CoreBPE,
}

impl TiktokenTokenizer {
    /// Resolve the encoding for a model or encoding name.
    ///
    /// An empty name selects `cl100k_base`. Unknown names log a warning and fall back to
    /// `cl100k_base` so that token counting keeps flowing for locally aliased models.
    pub fn for_model(model: &str) -> Result<Self, TokenizerError> {
        let normalized = model.trim();
        let target = if normalized.is_empty() {
            "cl100k_base"
        } else {
            normalized
        };
        let encoding = resolve_encoding(target).map_err(|error| TokenizerError::Load {
            name: target.to_string(),
            reason: error.to_string(),
        })?;
        Ok(Self { encoding })
    }
}

impl Tokenizer for TiktokenTokenizer {
    fn encode(&self, text: &str) -> Result<Vec<u32>, TokenizerError> {
        Ok(self.encoding.encode_ordinary(text))
    }

    fn decode(&self, ids: &[u32]) -> Result<String, TokenizerError> {
        self.encoding
            .decode(ids.to_vec())
            .map_err(|error| TokenizerError::Decode(error.to_string()))
    }
}

fn resolve_encoding(model: &str) -> anyhow::Result<CoreBPE> {
    match get_bpe_from_model(model) {
        Ok(encoding) => Ok(encoding),
        Err(model_err) => {
            tracing::debug!(
                model,
                error = %model_err,
                "Tokenizer model lookup failed; trying encoding name"
            );
            if let Some(candidate) = encoding_from_name(model) {
                candidate
            } else {
                tracing::warn!(
                    model,
                    "Falling back to 'cl100k_base' encoding for token counting"
                );
                cl100k_base()
            }
        }
    }
}

fn encoding_from_name(name: &str) -> Option<anyhow::Result<CoreBPE>> {
    match name {
        "cl100k_base" => Some(cl100k_base()),
        "o200k_base" => Some(o200k_base()),
        "p50k_base" => Some(p50k_base()),
        "p50k_edit" => Some(p50k_edit()),
        "r50k_base" | "gpt2" => Some(r50k_base()),
        _ => None,
    }
}

/// Tokenizer loaded from a HuggingFace `tokenizer.json`.
pub struct HuggingFaceTokenizer {
    inner: tokenizers::Tokenizer,
}

impl HuggingFaceTokenizer {
    /// Load a tokenizer definition from disk.
    pub fn from_file(path: &Path) -> Result<Self, TokenizerError> {
        let inner =
            tokenizers::Tokenizer::from_file(path).map_err(|error| TokenizerError::Load {
                name: path.display().to_string(),
                reason: error.to_string(),
            })?;
        Ok(Self { inner })
    }
}

impl Tokenizer for HuggingFaceTokenizer {
    fn encode(&self, text: &str) -> Result<Vec<u32>, TokenizerError> {
        // Special tokens are excluded so windows decode back to the source text.
        let encoding = self
            .inner
            .encode(text, false)
            .map_err(|error| TokenizerError::Encode(error.to_string()))?;
        Ok(encoding.get_ids().to_vec())
    }

    fn decode(&self, ids: &[u32]) -> Result<String, TokenizerError> {
        self.inner
            .decode(ids, true)
            .map_err(|error| TokenizerError::Decode(error.to_string()))
    }
}

/// Build the tokenizer for the configured embedding model.
///
/// A `tokenizer.json` path takes precedence; otherwise the model name selects a tiktoken
/// encoding.
pub fn build_tokenizer(
    model: &str,
    tokenizer_path: Option<&Path>,
) -> Result<Arc<dyn Tokenizer>, TokenizerError> {
    if let Some(path) = tokenizer_path {
        tracing::info!(path = %path.display(), "Loading HuggingFace tokenizer");
        return Ok(Arc::new(HuggingFaceTokenizer::from_file(path)?));
    }
    tracing::debug!(model, "Using tiktoken tokenizer");
    Ok(Arc::new(TiktokenTokenizer::for_model(model)?))
}
