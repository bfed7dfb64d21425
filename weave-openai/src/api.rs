//! OpenAI API wire types and client
//!
//! Types match the OpenAI API format and are used for serialization when
//! communicating with OpenAI's servers. Messages stay untyped JSON values:
//! the runtime hands them through verbatim and OpenAI validates their shape.

use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};
use uuid::Uuid;
use weave_resource::{ResourceError, ResourceResult};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

const USER_AGENT: &str = "weave-openai/0.1.0";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Chat completion request body
#[derive(Debug, Clone, Serialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

/// Chat completion response
#[derive(Debug, Deserialize)]
pub struct ChatCompletionResponse {
    pub id: String,
    pub model: String,
    pub choices: Vec<ChatChoice>,
    pub usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
pub struct ChatChoice {
    pub message: AssistantMessage,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AssistantMessage {
    pub role: String,
    pub content: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Embeddings request body
#[derive(Debug, Clone, Serialize)]
pub struct EmbeddingsRequest {
    pub model: String,
    pub input: EmbeddingInput,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<u32>,
}

/// One text or a batch of texts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EmbeddingInput {
    Single(String),
    Batch(Vec<String>),
}

#[derive(Debug, Deserialize)]
pub struct EmbeddingsResponse {
    pub model: String,
    pub data: Vec<EmbeddingData>,
    pub usage: EmbeddingsUsage,
}

#[derive(Debug, Deserialize)]
pub struct EmbeddingData {
    pub embedding: Vec<f32>,
    pub index: u32,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct EmbeddingsUsage {
    pub prompt_tokens: u32,
    pub total_tokens: u32,
}

/// OpenAI error response body
#[derive(Debug, Deserialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
pub struct ErrorDetail {
    pub message: String,

    #[serde(rename = "type")]
    pub error_type: String,

    pub code: Option<String>,
}

/// Thin client over the OpenAI REST API.
pub struct OpenAiClient {
    http: Client,
    base_url: String,
    api_key: String,
}

impl OpenAiClient {
    pub fn new(api_key: impl Into<String>) -> ResourceResult<Self> {
        Self::with_base_url(api_key, DEFAULT_BASE_URL)
    }

    pub fn with_base_url(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
    ) -> ResourceResult<Self> {
        let http = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ResourceError::Network(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        })
    }

    pub async fn create_chat_completion(
        &self,
        request: &ChatCompletionRequest,
    ) -> ResourceResult<ChatCompletionResponse> {
        self.post("/chat/completions", request).await
    }

    pub async fn create_embeddings(
        &self,
        request: &EmbeddingsRequest,
    ) -> ResourceResult<EmbeddingsResponse> {
        self.post("/embeddings", request).await
    }

    async fn post<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> ResourceResult<T> {
        let url = format!("{}{}", self.base_url, path);
        let request_id = Uuid::new_v4();
        debug!("POST {} [request_id: {}]", url, request_id);

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .header("X-Request-ID", request_id.to_string())
            .json(body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            warn!("POST {} failed with {} [request_id: {}]", url, status, request_id);
            return Err(map_error_body(status, &text));
        }

        serde_json::from_str(&text)
            .map_err(|e| ResourceError::Parse(format!("invalid response format: {}", e)))
    }
}

/// Map an OpenAI error body onto the shared taxonomy, falling back to plain
/// status-code mapping when the body is not the documented error shape.
pub fn map_error_body(status: StatusCode, body: &str) -> ResourceError {
    let Ok(parsed) = serde_json::from_str::<ErrorBody>(body) else {
        return ResourceError::from_status(status, body);
    };

    let detail = parsed.error;
    let kind = detail.code.as_deref().unwrap_or(&detail.error_type);

    match kind {
        "invalid_api_key" => ResourceError::Authentication(detail.message),
        "rate_limit_exceeded" | "insufficient_quota" => ResourceError::RateLimit {
            message: detail.message,
            retry_after_secs: None,
        },
        "model_not_found" => ResourceError::NotFound(detail.message),
        "invalid_request_error" => ResourceError::Validation(detail.message),
        _ => ResourceError::Api {
            code: kind.to_string(),
            message: detail.message,
        },
    }
}
