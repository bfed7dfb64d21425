//! GCP Cloud SQL user resource

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;
use weave_resource::{Dependency, FieldValue, Resource, ResourceError, ResourceResult};

use crate::client::GcpClient;
use crate::resources::cloudsql::database_instance::{DatabaseInstance, DatabaseInstanceConfig};
use crate::resources::cloudsql::{connection_info, extract_ips};

/// Configuration for a Cloud SQL user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SqlUserConfig {
    /// The Cloud SQL instance hosting this user.
    pub instance: Dependency<DatabaseInstance>,

    /// Username (immutable).
    pub username: String,

    /// Password; accepts a `$ref` for runtime injection.
    pub password: FieldValue<String>,
}

impl SqlUserConfig {
    fn validate(&self) -> ResourceResult<()> {
        if self.username.trim().is_empty() {
            return Err(ResourceError::Validation("username must not be empty".into()));
        }

        Ok(())
    }
}

/// Outputs from user creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SqlUserOutputs {
    pub username: String,
    pub instance_name: String,
    pub host: String,
    pub port: u16,
}

/// GCP Cloud SQL user resource.
///
/// Lifecycle:
/// - `on_create`: insert user (exists tolerated)
/// - `on_update`: password change rewrites the user
/// - `on_delete`: delete user, idempotent
pub struct SqlUser {
    name: String,
    config: SqlUserConfig,
    outputs: Option<SqlUserOutputs>,
    client: Option<GcpClient>,
}

impl SqlUser {
    pub fn new(name: impl Into<String>, config: SqlUserConfig) -> Self {
        Self {
            name: name.into(),
            config,
            outputs: None,
            client: None,
        }
    }

    pub fn with_outputs(mut self, outputs: SqlUserOutputs) -> Self {
        self.outputs = Some(outputs);
        self
    }

    /// Inject a pre-built client (tests).
    pub fn with_client(mut self, client: GcpClient) -> Self {
        self.client = Some(client);
        self
    }

    fn client_for(&self, instance: &DatabaseInstanceConfig) -> ResourceResult<GcpClient> {
        match &self.client {
            Some(client) => Ok(client.clone()),
            None => GcpClient::new(&instance.credentials),
        }
    }

    async fn build_outputs(
        &self,
        client: &GcpClient,
        instance_config: &DatabaseInstanceConfig,
    ) -> ResourceResult<SqlUserOutputs> {
        let url = client.sqladmin_url(&instance_config.instance_path());
        let instance = client.get(&url).await?;

        let (public_ip, private_ip) = extract_ips(&instance);
        let version = instance
            .get("databaseVersion")
            .and_then(Value::as_str)
            .unwrap_or("POSTGRES_15");
        let (_, port) = connection_info(version);

        let host = public_ip
            .or(private_ip)
            .unwrap_or_else(|| instance_config.connection_name());

        Ok(SqlUserOutputs {
            username: self.config.username.clone(),
            instance_name: instance_config.instance_name.clone(),
            host,
            port,
        })
    }
}

#[async_trait]
impl Resource for SqlUser {
    type Config = SqlUserConfig;
    type Outputs = SqlUserOutputs;

    const PROVIDER: &'static str = "gcp";
    const KIND: &'static str = "cloudsql/user";

    fn name(&self) -> &str {
        &self.name
    }

    fn config(&self) -> &Self::Config {
        &self.config
    }

    fn outputs(&self) -> Option<&Self::Outputs> {
        self.outputs.as_ref()
    }

    /// Create the user in the host instance. Idempotent.
    async fn on_create(&self) -> ResourceResult<Self::Outputs> {
        self.config.validate()?;

        let instance_config = &self.config.instance.resolve()?.config;
        let client = self.client_for(instance_config)?;
        let password = self.config.password.value()?;

        let url = client.sqladmin_url(&format!("{}/users", instance_config.instance_path()));
        let body = json!({
            "name": self.config.username,
            "password": password,
        });

        info!(
            "cloudsql user `{}` creating {} in {}",
            self.name, self.config.username, instance_config.instance_name
        );
        match client.post(&url, Some(&body)).await {
            Ok(_) => {}
            Err(err) if err.is_already_exists() => {}
            Err(err) => return Err(err),
        }

        self.build_outputs(&client, instance_config).await
    }

    /// username and instance are immutable; a password change rewrites the
    /// user in place.
    async fn on_update(&self, previous_config: &Self::Config) -> ResourceResult<Self::Outputs> {
        if previous_config.username != self.config.username {
            return Err(ResourceError::Immutable("username"));
        }

        if previous_config.instance != self.config.instance {
            return Err(ResourceError::Immutable("instance"));
        }

        self.config.validate()?;

        let instance_config = &self.config.instance.resolve()?.config;
        let client = self.client_for(instance_config)?;

        if previous_config.password != self.config.password {
            let password = self.config.password.value()?;
            let url = client.sqladmin_url(&format!(
                "{}/users?name={}",
                instance_config.instance_path(),
                self.config.username
            ));
            let body = json!({
                "name": self.config.username,
                "password": password,
            });

            client.put(&url, Some(&body)).await?;
        }

        self.build_outputs(&client, instance_config).await
    }

    /// Delete the user. Idempotent.
    async fn on_delete(&self) -> ResourceResult<()> {
        let instance_config = &self.config.instance.resolve()?.config;
        let client = self.client_for(instance_config)?;

        let url = client.sqladmin_url(&format!(
            "{}/users?name={}",
            instance_config.instance_path(),
            self.config.username
        ));

        match client.delete(&url).await {
            Ok(_) => Ok(()),
            Err(err) if err.is_not_found() => Ok(()),
            Err(err) => Err(err),
        }
    }
}
