//! GCP Cloud SQL database resource

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;
use weave_resource::{Dependency, Resource, ResourceError, ResourceResult};

use crate::client::GcpClient;
use crate::resources::cloudsql::database_instance::{DatabaseInstance, DatabaseInstanceConfig};
use crate::resources::cloudsql::{connection_info, extract_ips};

/// Configuration for a database within a Cloud SQL instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// The Cloud SQL instance hosting this database.
    pub instance: Dependency<DatabaseInstance>,

    /// Database name (immutable).
    pub database_name: String,
}

impl DatabaseConfig {
    fn validate(&self) -> ResourceResult<()> {
        if self.database_name.trim().is_empty() {
            return Err(ResourceError::Validation(
                "database_name must not be empty".into(),
            ));
        }

        Ok(())
    }
}

/// Outputs from database creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseOutputs {
    pub database_name: String,
    pub instance_name: String,
    /// IP address, or the connection name when no IP is assigned.
    pub host: String,
    pub port: u16,
    /// Connection URL format, without credentials.
    pub url: String,
}

/// GCP Cloud SQL database resource.
///
/// Changing the instance moves the database: delete from the old instance,
/// create in the new one.
pub struct Database {
    name: String,
    config: DatabaseConfig,
    outputs: Option<DatabaseOutputs>,
    client: Option<GcpClient>,
}

impl Database {
    pub fn new(name: impl Into<String>, config: DatabaseConfig) -> Self {
        Self {
            name: name.into(),
            config,
            outputs: None,
            client: None,
        }
    }

    pub fn with_outputs(mut self, outputs: DatabaseOutputs) -> Self {
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
    ) -> ResourceResult<DatabaseOutputs> {
        let url = client.sqladmin_url(&instance_config.instance_path());
        let instance = client.get(&url).await?;

        let (public_ip, private_ip) = extract_ips(&instance);
        let version = instance
            .get("databaseVersion")
            .and_then(Value::as_str)
            .unwrap_or("POSTGRES_15");
        let (scheme, port) = connection_info(version);

        let host = public_ip
            .or(private_ip)
            .unwrap_or_else(|| instance_config.connection_name());

        Ok(DatabaseOutputs {
            database_name: self.config.database_name.clone(),
            instance_name: instance_config.instance_name.clone(),
            host: host.clone(),
            port,
            url: format!("{}://{}:{}/{}", scheme, host, port, self.config.database_name),
        })
    }

    async fn delete_from(&self, config: &DatabaseConfig) -> ResourceResult<()> {
        let instance_config = &config.instance.resolve()?.config;
        let client = self.client_for(instance_config)?;

        let url = client.sqladmin_url(&format!(
            "{}/databases/{}",
            instance_config.instance_path(),
            config.database_name
        ));

        match client.delete(&url).await {
            Ok(_) => Ok(()),
            Err(err) if err.is_not_found() => Ok(()),
            Err(err) => Err(err),
        }
    }
}

#[async_trait]
impl Resource for Database {
    type Config = DatabaseConfig;
    type Outputs = DatabaseOutputs;

    const PROVIDER: &'static str = "gcp";
    const KIND: &'static str = "cloudsql/database";

    fn name(&self) -> &str {
        &self.name
    }

    fn config(&self) -> &Self::Config {
        &self.config
    }

    fn outputs(&self) -> Option<&Self::Outputs> {
        self.outputs.as_ref()
    }

    /// Create the database in the host instance. Idempotent.
    async fn on_create(&self) -> ResourceResult<Self::Outputs> {
        self.config.validate()?;

        let instance_config = &self.config.instance.resolve()?.config;
        let client = self.client_for(instance_config)?;

        let url = client.sqladmin_url(&format!("{}/databases", instance_config.instance_path()));
        let body = json!({
            "name": self.config.database_name,
            "project": instance_config.project_id,
            "instance": instance_config.instance_name,
        });

        info!(
            "cloudsql database `{}` creating {} in {}",
            self.name, self.config.database_name, instance_config.instance_name
        );
        match client.post(&url, Some(&body)).await {
            Ok(_) => {}
            Err(err) if err.is_already_exists() => {}
            Err(err) => return Err(err),
        }

        self.build_outputs(&client, instance_config).await
    }

    /// database_name is immutable; an instance change moves the database.
    async fn on_update(&self, previous_config: &Self::Config) -> ResourceResult<Self::Outputs> {
        if previous_config.database_name != self.config.database_name {
            return Err(ResourceError::Immutable("database_name"));
        }

        if previous_config.instance != self.config.instance {
            self.delete_from(previous_config).await?;
            return self.on_create().await;
        }

        let instance_config = &self.config.instance.resolve()?.config;
        let client = self.client_for(instance_config)?;
        self.build_outputs(&client, instance_config).await
    }

    /// Delete the database. Idempotent.
    async fn on_delete(&self) -> ResourceResult<()> {
        self.delete_from(&self.config).await
    }
}
