//! GCP Secret Manager secret resource

use std::collections::HashMap;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;
use weave_resource::{FieldValue, Resource, ResourceError, ResourceResult};

use crate::auth::CredentialsConfig;
use crate::client::GcpClient;

/// Configuration for a Secret Manager secret.
///
/// Attributes:
/// - `project_id`: GCP project that owns the secret.
/// - `secret_id`: Secret id within the project (immutable).
/// - `data`: Secret payload; accepts a `$ref` for runtime injection.
/// - `credentials`: Service-account credentials JSON object or string.
/// - `labels`: Optional labels applied at secret creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecretConfig {
    pub project_id: String,
    pub secret_id: String,
    pub data: FieldValue<String>,
    pub credentials: CredentialsConfig,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels: Option<HashMap<String, String>>,
}

impl SecretConfig {
    fn validate(&self) -> ResourceResult<()> {
        if self.project_id.trim().is_empty() {
            return Err(ResourceError::Validation("project_id must not be empty".into()));
        }

        if self.secret_id.is_empty() || self.secret_id.len() > 255 {
            return Err(ResourceError::Validation(
                "secret_id must be 1-255 characters".into(),
            ));
        }

        let valid = self
            .secret_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(ResourceError::Validation(
                "secret_id can only contain letters, numbers, hyphens, and underscores".into(),
            ));
        }

        Ok(())
    }

    fn secret_path(&self) -> String {
        format!("projects/{}/secrets/{}", self.project_id, self.secret_id)
    }
}

/// Outputs from secret creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecretOutputs {
    /// Full secret resource name, `projects/{p}/secrets/{id}`.
    pub resource_name: String,
    /// Full version resource name including the version number.
    pub version_name: String,
    /// The version number, e.g. `"1"`.
    pub version_id: String,
}

/// GCP Secret Manager secret resource.
///
/// Lifecycle:
/// - `on_create`: create secret (exists tolerated), add a version
/// - `on_update`: changed data adds a new version
/// - `on_delete`: delete secret, idempotent
pub struct Secret {
    name: String,
    config: SecretConfig,
    outputs: Option<SecretOutputs>,
    client: Option<GcpClient>,
}

impl Secret {
    pub fn new(name: impl Into<String>, config: SecretConfig) -> Self {
        Self {
            name: name.into(),
            config,
            outputs: None,
            client: None,
        }
    }

    pub fn with_outputs(mut self, outputs: SecretOutputs) -> Self {
        self.outputs = Some(outputs);
        self
    }

    /// Inject a pre-built client (tests).
    pub fn with_client(mut self, client: GcpClient) -> Self {
        self.client = Some(client);
        self
    }

    fn client(&self) -> ResourceResult<GcpClient> {
        match &self.client {
            Some(client) => Ok(client.clone()),
            None => GcpClient::new(&self.config.credentials),
        }
    }

    async fn ensure_secret(&self, client: &GcpClient) -> ResourceResult<()> {
        let url = client.secretmanager_url(&format!(
            "projects/{}/secrets?secretId={}",
            self.config.project_id, self.config.secret_id
        ));

        let mut body = json!({"replication": {"automatic": {}}});
        if let Some(labels) = &self.config.labels {
            body["labels"] = json!(labels);
        }

        match client.post(&url, Some(&body)).await {
            Ok(_) => Ok(()),
            Err(err) if err.is_already_exists() => Ok(()),
            Err(err) => Err(err),
        }
    }

    async fn add_version(&self, client: &GcpClient) -> ResourceResult<SecretOutputs> {
        let data = self.config.data.value()?;
        let url = client.secretmanager_url(&format!("{}:addVersion", self.config.secret_path()));
        let body = json!({"payload": {"data": BASE64.encode(data)}});

        let version = client.post(&url, Some(&body)).await?;
        let version_name = version
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| ResourceError::Parse("version response missing name".into()))?
            .to_string();
        let version_id = version_name
            .rsplit('/')
            .next()
            .unwrap_or_default()
            .to_string();

        Ok(SecretOutputs {
            resource_name: self.config.secret_path(),
            version_name,
            version_id,
        })
    }
}

#[async_trait]
impl Resource for Secret {
    type Config = SecretConfig;
    type Outputs = SecretOutputs;

    const PROVIDER: &'static str = "gcp";
    const KIND: &'static str = "secret";

    fn name(&self) -> &str {
        &self.name
    }

    fn config(&self) -> &Self::Config {
        &self.config
    }

    fn outputs(&self) -> Option<&Self::Outputs> {
        self.outputs.as_ref()
    }

    /// Create secret and first version. Idempotent on the secret itself;
    /// re-creating an existing secret only adds a version.
    async fn on_create(&self) -> ResourceResult<Self::Outputs> {
        self.config.validate()?;

        let client = self.client()?;
        self.ensure_secret(&client).await?;

        info!("secret `{}` adding version to {}", self.name, self.config.secret_path());
        self.add_version(&client).await
    }

    async fn on_update(&self, previous_config: &Self::Config) -> ResourceResult<Self::Outputs> {
        if previous_config.project_id != self.config.project_id {
            return Err(ResourceError::Immutable("project_id"));
        }

        if previous_config.secret_id != self.config.secret_id {
            return Err(ResourceError::Immutable("secret_id"));
        }

        if previous_config.data == self.config.data {
            if let Some(outputs) = &self.outputs {
                return Ok(outputs.clone());
            }
        }

        self.config.validate()?;

        let client = self.client()?;
        self.ensure_secret(&client).await?;
        self.add_version(&client).await
    }

    /// Delete the secret and all its versions. Idempotent.
    async fn on_delete(&self) -> ResourceResult<()> {
        let client = self.client()?;
        let url = client.secretmanager_url(&self.config.secret_path());

        match client.delete(&url).await {
            Ok(_) => Ok(()),
            Err(err) if err.is_not_found() => Ok(()),
            Err(err) => Err(err),
        }
    }
}
