//! GCP REST client
//!
//! Bearer-auth JSON verbs plus URL builders for the API families this
//! provider touches. API bases are overridable so tests can point the client
//! at a local mock server.

use reqwest::{Client, Method, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};
use weave_resource::{ResourceError, ResourceResult};

use crate::auth::{CredentialsConfig, TokenSource};

const CONTAINER_BASE: &str = "https://container.googleapis.com/v1";
const SQLADMIN_BASE: &str = "https://sqladmin.googleapis.com/v1";
const SECRETMANAGER_BASE: &str = "https://secretmanager.googleapis.com/v1";
const LOGGING_BASE: &str = "https://logging.googleapis.com/v2";

const USER_AGENT: &str = "weave-gcp/0.1.0";

/// REST client shared by all GCP resources.
#[derive(Clone)]
pub struct GcpClient {
    http: Client,
    token: TokenSource,
    container_base: String,
    sqladmin_base: String,
    secretmanager_base: String,
    logging_base: String,
}

impl GcpClient {
    pub fn new(credentials: &CredentialsConfig) -> ResourceResult<Self> {
        Self::with_token_source(TokenSource::from_credentials(credentials)?)
    }

    pub fn with_token_source(token: TokenSource) -> ResourceResult<Self> {
        let http = Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| ResourceError::Network(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http,
            token,
            container_base: CONTAINER_BASE.to_string(),
            sqladmin_base: SQLADMIN_BASE.to_string(),
            secretmanager_base: SECRETMANAGER_BASE.to_string(),
            logging_base: LOGGING_BASE.to_string(),
        })
    }

    /// Point every API family at one base URL (tests).
    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        let base = base.into().trim_end_matches('/').to_string();
        self.container_base = base.clone();
        self.sqladmin_base = base.clone();
        self.secretmanager_base = base.clone();
        self.logging_base = base;
        self
    }

    /// Build a GKE API URL.
    pub fn container_url(&self, path: &str) -> String {
        format!("{}/{}", self.container_base, path)
    }

    /// Build a Cloud SQL Admin API URL.
    pub fn sqladmin_url(&self, path: &str) -> String {
        format!("{}/{}", self.sqladmin_base, path)
    }

    /// Build a Secret Manager API URL.
    pub fn secretmanager_url(&self, path: &str) -> String {
        format!("{}/{}", self.secretmanager_base, path)
    }

    /// Build a Cloud Logging API URL.
    pub fn logging_url(&self, path: &str) -> String {
        format!("{}/{}", self.logging_base, path)
    }

    pub async fn get(&self, url: &str) -> ResourceResult<Value> {
        self.execute(Method::GET, url, None).await
    }

    pub async fn post(&self, url: &str, body: Option<&Value>) -> ResourceResult<Value> {
        self.execute(Method::POST, url, body).await
    }

    pub async fn put(&self, url: &str, body: Option<&Value>) -> ResourceResult<Value> {
        self.execute(Method::PUT, url, body).await
    }

    pub async fn delete(&self, url: &str) -> ResourceResult<Value> {
        self.execute(Method::DELETE, url, None).await
    }

    async fn execute(
        &self,
        method: Method,
        url: &str,
        body: Option<&Value>,
    ) -> ResourceResult<Value> {
        let token = self.token.token().await?;
        debug!("{} {}", method, url);

        let mut request = self.http.request(method.clone(), url).bearer_auth(token);

        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            warn!("{} {} failed with {}", method, url, status);
            return Err(map_error_body(status, &text));
        }

        if text.is_empty() {
            return Ok(Value::Null);
        }

        serde_json::from_str(&text)
            .map_err(|e| ResourceError::Parse(format!("invalid response JSON: {}", e)))
    }
}

#[derive(Deserialize)]
struct GoogleError {
    error: GoogleErrorDetail,
}

#[derive(Deserialize)]
struct GoogleErrorDetail {
    message: String,
    #[serde(default)]
    status: Option<String>,
}

/// Map a Google error body (`{"error": {"code", "message", "status"}}`) onto
/// the shared taxonomy, falling back to plain status-code mapping.
pub fn map_error_body(status: StatusCode, body: &str) -> ResourceError {
    let Ok(parsed) = serde_json::from_str::<GoogleError>(body) else {
        return ResourceError::from_status(status, body);
    };

    let message = parsed.error.message;

    match parsed.error.status.as_deref() {
        Some("NOT_FOUND") => ResourceError::NotFound(message),
        Some("ALREADY_EXISTS") => ResourceError::AlreadyExists(message),
        Some("PERMISSION_DENIED") => ResourceError::PermissionDenied(message),
        Some("UNAUTHENTICATED") => ResourceError::Authentication(message),
        Some("RESOURCE_EXHAUSTED") => ResourceError::RateLimit {
            message,
            retry_after_secs: None,
        },
        Some("INVALID_ARGUMENT") | Some("FAILED_PRECONDITION") => {
            ResourceError::Validation(message)
        }
        Some(code) => ResourceError::Api {
            code: code.to_string(),
            message,
        },
        None => ResourceError::from_status(status, &message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn google_status_strings_take_precedence() {
        let body = r#"{"error":{"code":409,"message":"Secret already exists","status":"ALREADY_EXISTS"}}"#;
        let err = map_error_body(StatusCode::CONFLICT, body);
        assert!(matches!(err, ResourceError::AlreadyExists(_)));
    }

    #[test]
    fn sqladmin_bodies_without_status_fall_back_to_code() {
        let body = r#"{"error":{"code":404,"message":"The Cloud SQL instance does not exist."}}"#;
        let err = map_error_body(StatusCode::NOT_FOUND, body);
        assert!(matches!(err, ResourceError::NotFound(_)));
    }
}
