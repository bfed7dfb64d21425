//! GCP authentication
//!
//! Resources receive service-account credentials in their configs (JSON object
//! or raw JSON string) rather than relying on ambient Application Default
//! Credentials: each invocation may act on behalf of a different tenant.

use std::sync::Arc;

use gcp_auth::{CustomServiceAccount, TokenProvider};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use weave_resource::{ResourceError, ResourceResult};

/// Scope requested for all GCP API access.
pub const CLOUD_PLATFORM_SCOPES: &[&str] = &["https://www.googleapis.com/auth/cloud-platform"];

/// Service-account credentials as they appear in resource configs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CredentialsConfig {
    /// The key file content as a raw JSON string.
    Raw(String),
    /// The key file content as a parsed JSON object.
    Json(Value),
}

impl CredentialsConfig {
    pub fn to_json_string(&self) -> ResourceResult<String> {
        match self {
            CredentialsConfig::Raw(raw) => Ok(raw.clone()),
            CredentialsConfig::Json(value) => Ok(serde_json::to_string(value)?),
        }
    }
}

/// Bearer-token source for API calls.
///
/// Production resources exchange service-account keys for access tokens;
/// tests construct clients around a fixed token instead.
#[derive(Clone)]
pub enum TokenSource {
    ServiceAccount(Arc<CustomServiceAccount>),
    Static(String),
}

impl TokenSource {
    pub fn from_credentials(credentials: &CredentialsConfig) -> ResourceResult<Self> {
        let json = credentials.to_json_string()?;
        let account = CustomServiceAccount::from_json(&json).map_err(|e| {
            ResourceError::Authentication(format!("invalid service account credentials: {}", e))
        })?;

        Ok(TokenSource::ServiceAccount(Arc::new(account)))
    }

    pub fn fixed(token: impl Into<String>) -> Self {
        TokenSource::Static(token.into())
    }

    pub async fn token(&self) -> ResourceResult<String> {
        match self {
            TokenSource::ServiceAccount(account) => {
                let token = account.token(CLOUD_PLATFORM_SCOPES).await.map_err(|e| {
                    ResourceError::Authentication(format!("failed to get access token: {}", e))
                })?;

                Ok(token.as_str().to_string())
            }
            TokenSource::Static(token) => Ok(token.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn credentials_deserialize_from_string_or_object() {
        let raw: CredentialsConfig = serde_json::from_str("\"{\\\"type\\\":\\\"service_account\\\"}\"").unwrap();
        assert!(matches!(raw, CredentialsConfig::Raw(_)));

        let parsed: CredentialsConfig =
            serde_json::from_value(json!({"type": "service_account"})).unwrap();
        assert!(matches!(parsed, CredentialsConfig::Json(_)));
    }

    #[tokio::test]
    async fn fixed_token_source_returns_the_token() {
        let source = TokenSource::fixed("test-token");
        assert_eq!(source.token().await.unwrap(), "test-token");
    }
}
