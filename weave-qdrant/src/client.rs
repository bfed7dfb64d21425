//! Qdrant REST client

use reqwest::{Client, Method, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};
use weave_resource::{ResourceError, ResourceResult};

use crate::resources::collection::{Distance, VectorConfig};

const USER_AGENT: &str = "weave-qdrant/0.1.0";

/// Thin client over the Qdrant REST API. The `api-key` header is optional for
/// local instances.
#[derive(Clone)]
pub struct QdrantClient {
    http: Client,
    base_url: String,
    api_key: Option<String>,
}

impl QdrantClient {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> ResourceResult<Self> {
        let http = Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| ResourceError::Network(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
        })
    }

    pub async fn collection_exists(&self, name: &str) -> ResourceResult<bool> {
        let response = self
            .request(Method::GET, &format!("/collections/{}/exists", name), None)
            .await?;

        Ok(response
            .pointer("/result/exists")
            .and_then(Value::as_bool)
            .unwrap_or(false))
    }

    /// Fetch collection info (the `result` object of the response).
    pub async fn get_collection(&self, name: &str) -> ResourceResult<Value> {
        let response = self
            .request(Method::GET, &format!("/collections/{}", name), None)
            .await?;

        response
            .get("result")
            .cloned()
            .ok_or_else(|| ResourceError::Parse("collection response missing result".into()))
    }

    pub async fn create_collection(
        &self,
        name: &str,
        vectors: &VectorConfig,
        on_disk: bool,
    ) -> ResourceResult<()> {
        let body = json!({
            "vectors": {
                "size": vectors.size,
                "distance": vectors.distance,
                "on_disk": on_disk,
            }
        });

        self.request(Method::PUT, &format!("/collections/{}", name), Some(&body))
            .await?;
        Ok(())
    }

    pub async fn delete_collection(&self, name: &str) -> ResourceResult<()> {
        self.request(Method::DELETE, &format!("/collections/{}", name), None)
            .await?;
        Ok(())
    }

    async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> ResourceResult<Value> {
        let url = format!("{}{}", self.base_url, path);
        debug!("{} {}", method, url);

        let mut request = self.http.request(method.clone(), &url);

        if let Some(api_key) = &self.api_key {
            request = request.header("api-key", api_key);
        }

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

        serde_json::from_str(&text)
            .map_err(|e| ResourceError::Parse(format!("invalid response JSON: {}", e)))
    }
}

#[derive(Deserialize)]
struct QdrantErrorBody {
    status: QdrantErrorStatus,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum QdrantErrorStatus {
    Detail { error: String },
    Plain(String),
}

/// Map a Qdrant error body (`{"status": {"error": "..."}}`) onto the shared
/// taxonomy.
pub fn map_error_body(status: StatusCode, body: &str) -> ResourceError {
    let message = match serde_json::from_str::<QdrantErrorBody>(body) {
        Ok(parsed) => match parsed.status {
            QdrantErrorStatus::Detail { error } => error,
            QdrantErrorStatus::Plain(text) => text,
        },
        Err(_) => body.to_string(),
    };

    ResourceError::from_status(status, &message)
}

/// Distance is serialized in Qdrant's own spelling, so requests can embed it
/// directly.
impl Distance {
    pub fn as_str(&self) -> &'static str {
        match self {
            Distance::Cosine => "Cosine",
            Distance::Euclid => "Euclid",
            Distance::Dot => "Dot",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_body_extracts_detail() {
        let body = r#"{"status":{"error":"Collection `docs` not found"},"time":0.0}"#;
        let err = map_error_body(StatusCode::NOT_FOUND, body);

        match err {
            ResourceError::NotFound(message) => assert!(message.contains("docs")),
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
