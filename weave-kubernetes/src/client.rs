//! Kubernetes REST client
//!
//! Built either from a resolved GKE dependency (endpoint + base64 CA cert +
//! service-account bearer tokens) or directly from a URL and token (tests,
//! clusters with externally managed kubeconfigs). Apply semantics are
//! GET -> POST on 404, merge-PATCH otherwise.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Method, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};
use weave_gcp::{CredentialsConfig, Gke, GkeOutputs, TokenSource};
use weave_resource::{Dependency, ResourceError, ResourceResult};

const USER_AGENT: &str = "weave-kubernetes/0.1.0";
const MERGE_PATCH_CONTENT_TYPE: &str = "application/merge-patch+json";

/// REST client shared by all Kubernetes resources.
#[derive(Clone)]
pub struct K8sClient {
    http: Client,
    base_url: String,
    token: TokenSource,
}

impl K8sClient {
    /// Client for a cluster reachable at `base_url` with a ready-made token.
    pub fn new(base_url: impl Into<String>, token: TokenSource) -> ResourceResult<Self> {
        let http = Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| ResourceError::Network(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
        })
    }

    /// Client for a GKE cluster, trusting its CA and authenticating with the
    /// service-account credentials that manage it.
    pub fn from_gke(outputs: &GkeOutputs, credentials: &CredentialsConfig) -> ResourceResult<Self> {
        let token = TokenSource::from_credentials(credentials)?;

        let base_url = if outputs.endpoint.starts_with("http://")
            || outputs.endpoint.starts_with("https://")
        {
            outputs.endpoint.trim_end_matches('/').to_string()
        } else {
            format!("https://{}", outputs.endpoint)
        };

        let mut builder = Client::builder().user_agent(USER_AGENT);

        if !outputs.cluster_ca_certificate.is_empty() {
            let pem = BASE64.decode(&outputs.cluster_ca_certificate).map_err(|e| {
                ResourceError::Authentication(format!("invalid cluster CA certificate: {}", e))
            })?;
            let certificate = reqwest::Certificate::from_pem(&pem).map_err(|e| {
                ResourceError::Authentication(format!("invalid cluster CA certificate: {}", e))
            })?;
            builder = builder.add_root_certificate(certificate);
        }

        let http = builder
            .build()
            .map_err(|e| ResourceError::Network(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url,
            token,
        })
    }

    pub async fn get(&self, path: &str) -> ResourceResult<Value> {
        self.execute(Method::GET, path, None, None).await
    }

    pub async fn post(&self, path: &str, body: &Value) -> ResourceResult<Value> {
        self.execute(Method::POST, path, Some(body), None).await
    }

    pub async fn patch_merge(&self, path: &str, body: &Value) -> ResourceResult<Value> {
        self.execute(Method::PATCH, path, Some(body), Some(MERGE_PATCH_CONTENT_TYPE))
            .await
    }

    pub async fn delete(&self, path: &str) -> ResourceResult<Value> {
        self.execute(Method::DELETE, path, None, None).await
    }

    /// Create-or-update: GET the object, POST to the collection when absent,
    /// merge-PATCH in place when present.
    pub async fn apply(
        &self,
        collection: &str,
        name: &str,
        manifest: &Value,
    ) -> ResourceResult<Value> {
        let item = format!("{}/{}", collection, name);

        match self.get(&item).await {
            Ok(_) => self.patch_merge(&item, manifest).await,
            Err(err) if err.is_not_found() => self.post(collection, manifest).await,
            Err(err) => Err(err),
        }
    }

    /// GET a path that returns plain text (pod logs).
    pub async fn get_text(&self, path: &str) -> ResourceResult<String> {
        let token = self.token.token().await?;
        let url = format!("{}{}", self.base_url, path);
        debug!("GET {}", url);

        let response = self.http.get(&url).bearer_auth(token).send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            warn!("GET {} failed with {}", url, status);
            return Err(map_error_body(status, &text));
        }

        Ok(text)
    }

    async fn execute(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        content_type: Option<&str>,
    ) -> ResourceResult<Value> {
        let token = self.token.token().await?;
        let url = format!("{}{}", self.base_url, path);
        debug!("{} {}", method, url);

        let mut request = self.http.request(method.clone(), &url).bearer_auth(token);

        if let Some(body) = body {
            let bytes = serde_json::to_vec(body)?;
            request = request
                .header(CONTENT_TYPE, content_type.unwrap_or("application/json"))
                .body(bytes);
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

/// Build a client from a resolved GKE cluster dependency.
pub fn client_from_cluster(cluster: &Dependency<Gke>) -> ResourceResult<K8sClient> {
    let resolved = cluster.resolve()?;
    let outputs = resolved
        .outputs
        .as_ref()
        .ok_or_else(|| ResourceError::State("GKE cluster outputs not available".into()))?;

    K8sClient::from_gke(outputs, &resolved.config.credentials)
}

#[derive(Deserialize)]
struct K8sStatus {
    #[serde(default)]
    message: String,
    #[serde(default)]
    reason: String,
}

/// Map a Kubernetes `Status` error body onto the shared taxonomy.
pub fn map_error_body(status: StatusCode, body: &str) -> ResourceError {
    let Ok(parsed) = serde_json::from_str::<K8sStatus>(body) else {
        return ResourceError::from_status(status, body);
    };

    let message = if parsed.message.is_empty() {
        body.to_string()
    } else {
        parsed.message
    };

    match parsed.reason.as_str() {
        "NotFound" => ResourceError::NotFound(message),
        "AlreadyExists" => ResourceError::AlreadyExists(message),
        "Unauthorized" => ResourceError::Authentication(message),
        "Forbidden" => ResourceError::PermissionDenied(message),
        "Invalid" | "BadRequest" => ResourceError::Validation(message),
        "Conflict" => ResourceError::State(message),
        _ => ResourceError::from_status(status, &message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_reason_takes_precedence() {
        let body = r#"{"kind":"Status","status":"Failure","message":"services \"qdrant\" not found","reason":"NotFound","code":404}"#;
        let err = map_error_body(StatusCode::NOT_FOUND, body);
        assert!(matches!(err, ResourceError::NotFound(_)));
    }

    #[test]
    fn non_status_bodies_fall_back_to_code() {
        let err = map_error_body(StatusCode::UNAUTHORIZED, "Unauthorized");
        assert!(matches!(err, ResourceError::Authentication(_)));
    }
}
