use crate::processing::chunking::ChunkingStrategy;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::OnceLock;
use thiserror::Error;

const DEFAULT_CHUNK_SIZE: usize = 500;
const DEFAULT_CHUNK_OVERLAP: usize = 50;
const DEFAULT_SEARCH_TOP_K: usize = 3;
const DEFAULT_UPSERT_BATCH_SIZE: usize = 64;
const DEFAULT_ANSWER_MODEL: &str = "phi-3.5-mini-instruct";

/// Errors encountered while loading configuration from environment variables.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Required environment variable was not provided.
    #[error("Missing environment variable: {0}")]
    MissingVariable(String),
    /// Environment variable contained a value that could not be parsed.
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
}

/// Runtime configuration for the Rusty RAG pipeline.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the Qdrant instance that stores embeddings.
    pub qdrant_url: String,
    /// Name of the Qdrant collection used for document storage.
    pub qdrant_collection_name: String,
    /// Optional API key required to access Qdrant.
    pub qdrant_api_key: Option<String>,
    /// Optional timeout applied to each individual Qdrant request.
    pub qdrant_timeout_secs: Option<u64>,
    /// Number of points sent per upsert request.
    pub qdrant_upsert_batch_size: usize,
    /// Embedding provider used to generate vector representations.
    pub embedding_provider: EmbeddingProvider,
    /// Embedding model identifier passed to the provider.
    pub embedding_model: String,
    /// Dimensionality of the produced vectors.
    pub embedding_dimension: usize,
    /// Optional base URL override for the embedding provider.
    pub embedding_url: Option<String>,
    /// Bearer token for OpenAI-compatible providers.
    pub openai_api_key: Option<String>,
    /// Optional HuggingFace `tokenizer.json` used for token counting.
    pub tokenizer_path: Option<PathBuf>,
    /// Chunking strategy applied during ingestion.
    pub chunk_strategy: ChunkingStrategy,
    /// Chunk size measured in tokens.
    pub chunk_size: usize,
    /// Token overlap between adjacent chunks.
    pub chunk_overlap: usize,
    /// Default number of neighbours requested per query.
    pub search_top_k: usize,
    /// Generative model backend used to answer queries.
    pub answer_provider: AnswerProvider,
    /// Optional base URL override for the answering provider.
    pub answer_url: Option<String>,
    /// Generative model identifier.
    pub answer_model: String,
    /// Optional override for the HTTP server port.
    pub server_port: Option<u16>,
}

/// Supported embedding backends for the processing pipeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EmbeddingProvider {
    /// Local Ollama runtime.
    Ollama,
    /// Hosted OpenAI embeddings API (or any compatible server).
    OpenAI,
    /// Deterministic offline embedding derived from the text bytes.
    Hashed,
}

/// Supported generative backends for answering queries.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AnswerProvider {
    /// Retrieval only; `answer` requests are rejected.
    None,
    /// Local Ollama runtime.
    Ollama,
    /// OpenAI-compatible chat completions endpoint (LM Studio, vLLM, OpenAI).
    OpenAI,
}

impl Config {
    /// Load configuration from environment variables, performing validation along the way.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            qdrant_url: load_env("QDRANT_URL")?,
            qdrant_collection_name: load_env("QDRANT_COLLECTION_NAME")?,
            qdrant_api_key: load_env_optional("QDRANT_API_KEY"),
            qdrant_timeout_secs: parse_optional("QDRANT_TIMEOUT_SECS")?,
            qdrant_upsert_batch_size: parse_optional("QDRANT_UPSERT_BATCH_SIZE")?
                .unwrap_or(DEFAULT_UPSERT_BATCH_SIZE),
            embedding_provider: load_env("EMBEDDING_PROVIDER")?
                .parse()
                .map_err(|()| ConfigError::InvalidValue("EMBEDDING_PROVIDER".to_string()))?,
            embedding_model: load_env("EMBEDDING_MODEL")?,
            embedding_dimension: load_env("EMBEDDING_DIMENSION")?
                .parse()
                .map_err(|_| ConfigError::InvalidValue("EMBEDDING_DIMENSION".to_string()))?,
            embedding_url: load_env_optional("EMBEDDING_URL"),
            openai_api_key: load_env_optional("OPENAI_API_KEY"),
            tokenizer_path: load_env_optional("TOKENIZER_PATH").map(PathBuf::from),
            chunk_strategy: load_env_optional("CHUNK_STRATEGY")
                .map(|value| {
                    value
                        .parse()
                        .map_err(|()| ConfigError::InvalidValue("CHUNK_STRATEGY".to_string()))
                })
                .transpose()?
                .unwrap_or_default(),
            chunk_size: parse_optional("CHUNK_SIZE")?.unwrap_or(DEFAULT_CHUNK_SIZE),
            chunk_overlap: parse_optional("CHUNK_OVERLAP")?.unwrap_or(DEFAULT_CHUNK_OVERLAP),
            search_top_k: parse_optional("SEARCH_TOP_K")?.unwrap_or(DEFAULT_SEARCH_TOP_K),
            answer_provider: load_env_optional("ANSWER_PROVIDER")
                .map(|value| {
                    value
                        .parse()
                        .map_err(|()| ConfigError::InvalidValue("ANSWER_PROVIDER".to_string()))
                })
                .transpose()?
                .unwrap_or(AnswerProvider::None),
            answer_url: load_env_optional("ANSWER_URL"),
            answer_model: load_env_optional("ANSWER_MODEL")
                .unwrap_or_else(|| DEFAULT_ANSWER_MODEL.to_string()),
            server_port: parse_optional("SERVER_PORT")?,
        })
    }
}

fn load_env(key: &str) -> Result<String, ConfigError> {
    env::var(key).map_err(|_| ConfigError::MissingVariable(key.to_string()))
}

fn load_env_optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_optional<T: FromStr>(key: &str) -> Result<Option<T>, ConfigError> {
    load_env_optional(key)
        .map(|value| {
            value
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidValue(key.to_string()))
        })
        .transpose()
}

impl FromStr for EmbeddingProvider {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "ollama" => Ok(Self::Ollama),
            "openai" => Ok(Self::OpenAI),
            "hashed" => Ok(Self::Hashed),
            _ => Err(()),
        }
    }
}

impl FromStr for AnswerProvider {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "none" => Ok(Self::None),
            "ollama" => Ok(Self::Ollama),
            "openai" | "lmstudio" => Ok(Self::OpenAI),
            _ => Err(()),
        }
    }
}

/// Global configuration cache populated during process start.
pub static CONFIG: OnceLock<Config> = OnceLock::new();

/// Load configuration from the environment (and `.env`) and install it in the global cache.
pub fn init_config() -> Result<&'static Config, ConfigError> {
    if let Some(config) = CONFIG.get() {
        return Ok(config);
    }
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;
    tracing::debug!(
        qdrant_url = %config.qdrant_url,
        collection = %config.qdrant_collection_name,
        embedding_provider = ?config.embedding_provider,
        chunk_strategy = ?config.chunk_strategy,
        chunk_size = config.chunk_size,
        chunk_overlap = config.chunk_overlap,
        "Loaded configuration"
    );
    Ok(CONFIG.get_or_init(|| config))
}
