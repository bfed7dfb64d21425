//! Anthropic API wire types and client

use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};
use uuid::Uuid;
use weave_resource::{ResourceError, ResourceResult};

pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com/v1";

/// API version header Anthropic requires on every request.
pub const ANTHROPIC_VERSION: &str = "2023-06-01";

const USER_AGENT: &str = "weave-anthropic/0.1.0";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Messages request body
#[derive(Debug, Clone, Serialize)]
pub struct MessagesRequest {
    pub model: String,
    pub messages: Vec<Value>,
    pub max_tokens: u32,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

/// Messages response
#[derive(Debug, Deserialize)]
pub struct MessagesResponse {
    pub id: String,
    pub model: String,
    pub content: Vec<Value>,
    pub stop_reason: Option<String>,
    pub usage: MessagesUsage,
}

#[derive(Debug, Deserialize)]
pub struct MessagesUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

/// Anthropic error response body
#[derive(Debug, Deserialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
pub struct ErrorDetail {
    #[serde(rename = "type")]
    pub error_type: String,

    pub message: String,
}

/// Thin client over the Anthropic REST API.
pub struct AnthropicClient {
    http: Client,
    base_url: String,
    api_key: String,
}

impl AnthropicClient {
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

    pub async fn create_message(
        &self,
        request: &MessagesRequest,
    ) -> ResourceResult<MessagesResponse> {
        let url = format!("{}/messages", self.base_url);
        let request_id = Uuid::new_v4();
        debug!("POST {} [request_id: {}]", url, request_id);

        let response = self
            .http
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("X-Request-ID", request_id.to_string())
            .json(request)
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

/// Map an Anthropic error body onto the shared taxonomy.
pub fn map_error_body(status: StatusCode, body: &str) -> ResourceError {
    let Ok(parsed) = serde_json::from_str::<ErrorBody>(body) else {
        return ResourceError::from_status(status, body);
    };

    let detail = parsed.error;

    match detail.error_type.as_str() {
        "authentication_error" => ResourceError::Authentication(detail.message),
        "permission_error" => ResourceError::PermissionDenied(detail.message),
        "not_found_error" => ResourceError::NotFound(detail.message),
        "rate_limit_error" => ResourceError::RateLimit {
            message: detail.message,
            retry_after_secs: None,
        },
        "invalid_request_error" => ResourceError::Validation(detail.message),
        "overloaded_error" => ResourceError::Unavailable(detail.message),
        _ => ResourceError::Api {
            code: detail.error_type,
            message: detail.message,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_body_maps_by_type() {
        let body = r#"{"type":"error","error":{"type":"overloaded_error","message":"try later"}}"#;
        let err = map_error_body(StatusCode::SERVICE_UNAVAILABLE, body);
        assert!(matches!(err, ResourceError::Unavailable(_)));
    }

    #[test]
    fn optional_request_fields_are_omitted() {
        let request = MessagesRequest {
            model: "claude-sonnet-4-20250514".to_string(),
            messages: vec![],
            max_tokens: 1024,
            system: None,
            temperature: None,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert!(json.get("system").is_none());
        assert!(json.get("temperature").is_none());
        assert_eq!(json["max_tokens"], 1024);
    }
}
