//! Generative gateways that turn a query and retrieved context into free text.
//!
//! Answering is optional; when no provider is configured the pipeline serves retrieval only.
//! Adapters own prompt construction and call the provider over plain HTTP, mirroring the
//! embedding adapters.

use crate::config::{AnswerProvider, Config};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;

const DEFAULT_OLLAMA_URL: &str = "http://127.0.0.1:11434";
const DEFAULT_LM_STUDIO_URL: &str = "http://127.0.0.1:1234";

/// Errors surfaced while generating an answer.
#[derive(Debug, Error)]
pub enum AnsweringClientError {
    /// Provider was explicitly disabled or unreachable.
    #[error("Answering provider unavailable: {0}")]
    ProviderUnavailable(String),
    /// Provider returned an error response.
    #[error("Failed to generate answer ({status}): {body}")]
    GenerationFailed {
        /// HTTP status returned by the provider.
        status: StatusCode,
        /// Response body, for diagnostics.
        body: String,
    },
    /// Provider response could not be parsed.
    #[error("Malformed provider response: {0}")]
    InvalidResponse(String),
}

impl AnsweringClientError {
    /// Whether retrying the same request may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::ProviderUnavailable(_) => true,
            Self::GenerationFailed { status, .. } => {
                status.is_server_error() || *status == StatusCode::TOO_MANY_REQUESTS
            }
            Self::InvalidResponse(_) => false,
        }
    }
}

/// Query and context handed to the answering provider.
#[derive(Debug, Clone)]
pub struct AnswerRequest {
    /// User question.
    pub query: String,
    /// Retrieved passages, nearest first. May be empty.
    pub contexts: Vec<String>,
}

/// Interface implemented by generative providers.
#[async_trait]
pub trait AnsweringClient: Send + Sync {
    /// Generate an answer grounded in the supplied context.
    async fn generate_answer(&self, request: AnswerRequest) -> Result<String, AnsweringClientError>;
}

/// Assemble the prompt sent to the model.
///
/// The model is asked to outline the context relevant to the question before answering.
/// Passages are separated by blank lines.
pub fn build_prompt(request: &AnswerRequest) -> String {
    let context = request.contexts.join("\n\n");
    format!(
        "Answer the question below by first outlining the main points of context relevant to \
         the question, then use that outline to generate the final answer.\n\n\
         Context:\n{context}\n\n\
         Question:\n{query}\n",
        query = request.query
    )
}

/// Build an answering client based on configuration; `None` when answering is disabled.
pub fn build_answering_client(
    config: &Config,
) -> Result<Option<Box<dyn AnsweringClient>>, AnsweringClientError> {
    let client: Box<dyn AnsweringClient> = match config.answer_provider {
        AnswerProvider::None => return Ok(None),
        AnswerProvider::Ollama => Box::new(OllamaAnsweringClient::new(
            config
                .answer_url
                .clone()
                .unwrap_or_else(|| DEFAULT_OLLAMA_URL.to_string()),
            config.answer_model.clone(),
        )?),
        AnswerProvider::OpenAI => Box::new(OpenAiCompatibleAnsweringClient::new(
            config
                .answer_url
                .clone()
                .unwrap_or_else(|| DEFAULT_LM_STUDIO_URL.to_string()),
            config.answer_model.clone(),
            config.openai_api_key.clone(),
        )?),
    };
    tracing::debug!(
        provider = ?config.answer_provider,
        model = %config.answer_model,
        "Answering client ready"
    );
    Ok(Some(client))
}

/// Client for the Ollama `/api/generate` endpoint.
pub struct OllamaAnsweringClient {
    http: Client,
    base_url: String,
    model: String,
}

impl OllamaAnsweringClient {
    /// Construct a client for the Ollama runtime at `base_url`.
    pub fn new(base_url: String, model: String) -> Result<Self, AnsweringClientError> {
        Ok(Self {
            http: http_client()?,
            base_url,
            model,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/api/generate", self.base_url.trim_end_matches('/'))
    }
}

#[derive(Debug, Deserialize)]
struct OllamaResponse {
    response: String,
    done: bool,
}

#[async_trait]
impl AnsweringClient for OllamaAnsweringClient {
    async fn generate_answer(
        &self,
        request: AnswerRequest,
    ) -> Result<String, AnsweringClientError> {
        let payload = json!({
            "model": self.model,
            "prompt": build_prompt(&request),
            "stream": false,
        });

        let response = self
            .http
            .post(self.endpoint())
            .json(&payload)
            .send()
            .await
            .map_err(|error| {
                AnsweringClientError::ProviderUnavailable(format!(
                    "failed to reach Ollama at {}: {error}",
                    self.base_url
                ))
            })?;

        let response = ensure_success(response).await?;
        let body: OllamaResponse = response.json().await.map_err(|error| {
            AnsweringClientError::InvalidResponse(format!(
                "failed to decode Ollama response: {error}"
            ))
        })?;

        if !body.done {
            return Err(AnsweringClientError::InvalidResponse(
                "Ollama response incomplete (streaming not supported)".into(),
            ));
        }

        Ok(body.response.trim().to_string())
    }
}

/// Client for OpenAI-compatible `/v1/chat/completions` servers such as LM Studio.
pub struct OpenAiCompatibleAnsweringClient {
    http: Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
}

impl OpenAiCompatibleAnsweringClient {
    /// Construct a client for the server at `base_url`.
    pub fn new(
        base_url: String,
        model: String,
        api_key: Option<String>,
    ) -> Result<Self, AnsweringClientError> {
        Ok(Self {
            http: http_client()?,
            base_url,
            model,
            api_key,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

#[async_trait]
impl AnsweringClient for OpenAiCompatibleAnsweringClient {
    async fn generate_answer(
        &self,
        request: AnswerRequest,
    ) -> Result<String, AnsweringClientError> {
        let payload = json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": build_prompt(&request) }],
            "stream": false,
        });

        let mut builder = self.http.post(self.endpoint()).json(&payload);
        if let Some(api_key) = &self.api_key {
            builder = builder.bearer_auth(api_key);
        }
        let response = builder.send().await.map_err(|error| {
            AnsweringClientError::ProviderUnavailable(format!(
                "failed to reach chat server at {}: {error}",
                self.base_url
            ))
        })?;

        let response = ensure_success(response).await?;
        let body: ChatCompletionResponse = response.json().await.map_err(|error| {
            AnsweringClientError::InvalidResponse(format!(
                "failed to decode chat completion: {error}"
            ))
        })?;

        body.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
            .ok_or_else(|| {
                AnsweringClientError::InvalidResponse("completion had no content".into())
            })
    }
}

fn http_client() -> Result<Client, AnsweringClientError> {
    Client::builder()
        .user_agent("rusty-rag/answer")
        .build()
        .map_err(|error| AnsweringClientError::ProviderUnavailable(error.to_string()))
}

async fn ensure_success(
    response: reqwest::Response,
) -> Result<reqwest::Response, AnsweringClientError> {
    if response.status() == StatusCode::NOT_FOUND {
        return Err(AnsweringClientError::ProviderUnavailable(format!(
            "endpoint {} returned 404",
            response.url()
        )));
    }
    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        return Err(AnsweringClientError::GenerationFailed { status, body });
    }
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::{Method::POST, MockServer};

    fn request(contexts: &[&str]) -> AnswerRequest {
        AnswerRequest {
            query: "What is RAG?".into(),
            contexts: contexts.iter().map(|text| text.to_string()).collect(),
        }
    }

    #[test]
    fn prompt_outlines_context_before_question() {
        let prompt = build_prompt(&request(&["first passage", "second passage"]));
        assert!(prompt.starts_with("Answer the question below by first outlining"));
        assert!(
            prompt.contains("Context:\nfirst passage\n\nsecond passage\n\nQuestion:\nWhat is RAG?")
        );
    }

    #[test]
    fn prompt_tolerates_empty_context() {
        let prompt = build_prompt(&request(&[]));
        assert!(prompt.contains("Context:\n\n\nQuestion:\nWhat is RAG?"));
    }

    #[tokio::test]
    async fn ollama_client_handles_successful_response() {
        let server = MockServer::start_async().await;
        let client =
            OllamaAnsweringClient::new(server.base_url(), "phi3.5".into()).expect("client");

        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/api/generate")
                    .body_contains("first outlining");
                then.status(200).json_body(json!({
                    "response": "  Retrieval-augmented generation. ",
                    "done": true
                }));
            })
            .await;

        let answer = client
            .generate_answer(request(&["RAG grounds answers in documents."]))
            .await
            .expect("answer");

        mock.assert_async().await;
        assert_eq!(answer, "Retrieval-augmented generation.");
    }

    #[tokio::test]
    async fn ollama_client_handles_error_status() {
        let server = MockServer::start_async().await;
        let client =
            OllamaAnsweringClient::new(server.base_url(), "phi3.5".into()).expect("client");

        server
            .mock_async(|when, then| {
                when.method(POST).path("/api/generate");
                then.status(500).body("boom");
            })
            .await;

        let error = client
            .generate_answer(request(&[]))
            .await
            .expect_err("error response");

        assert!(matches!(
            error,
            AnsweringClientError::GenerationFailed {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                ref body,
            } if body == "boom"
        ));
        assert!(error.is_transient());
    }

    #[tokio::test]
    async fn chat_client_reads_first_choice() {
        let server = MockServer::start_async().await;
        let client = OpenAiCompatibleAnsweringClient::new(
            server.base_url(),
            "phi-3.5-mini-instruct".into(),
            None,
        )
        .expect("client");

        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v1/chat/completions")
                    .body_contains("\"role\":\"user\"");
                then.status(200).json_body(json!({
                    "id": "chatcmpl-1",
                    "choices": [
                        {
                            "index": 0,
                            "message": { "role": "assistant", "content": "Outline, then answer." }
                        }
                    ]
                }));
            })
            .await;

        let answer = client
            .generate_answer(request(&["context"]))
            .await
            .expect("answer");

        mock.assert_async().await;
        assert_eq!(answer, "Outline, then answer.");
    }

    #[tokio::test]
    async fn missing_endpoint_is_reported_as_unavailable() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/v1/chat/completions");
                then.status(404);
            })
            .await;

        let client =
            OpenAiCompatibleAnsweringClient::new(server.base_url(), "model".into(), None)
                .expect("client");
        let error = client
            .generate_answer(request(&["context"]))
            .await
            .expect_err("404");
        assert!(matches!(error, AnsweringClientError::ProviderUnavailable(_)));
    }
}
