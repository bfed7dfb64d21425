//! GCP Cloud SQL database instance resource

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;
use weave_resource::{
    HealthStatus, LogEntry, LogLevel, Resource, ResourceError, ResourceResult,
};

use crate::auth::CredentialsConfig;
use crate::client::GcpClient;
use crate::resources::cloudsql::{extract_ips, generate_password};

const POLL_INTERVAL: Duration = Duration::from_secs(30);
const MAX_POLL_ATTEMPTS: u32 = 30;

const ROOT_PASSWORD_LENGTH: usize = 24;

/// ZONAL (single zone) or REGIONAL (high availability).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AvailabilityType {
    Zonal,
    Regional,
}

impl AvailabilityType {
    fn as_str(&self) -> &'static str {
        match self {
            AvailabilityType::Zonal => "ZONAL",
            AvailabilityType::Regional => "REGIONAL",
        }
    }
}

fn default_database_version() -> String {
    "POSTGRES_15".to_string()
}

fn default_tier() -> String {
    "db-f1-micro".to_string()
}

fn default_availability_type() -> AvailabilityType {
    AvailabilityType::Zonal
}

fn default_backup_enabled() -> bool {
    true
}

fn default_enable_public_ip() -> bool {
    true
}

/// Configuration for a Cloud SQL database instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseInstanceConfig {
    pub project_id: String,
    pub credentials: CredentialsConfig,
    pub region: String,

    /// Instance name, unique per project.
    pub instance_name: String,

    /// Database version, e.g. POSTGRES_15, MYSQL_8_0.
    #[serde(default = "default_database_version")]
    pub database_version: String,

    /// Machine tier, e.g. db-f1-micro, db-custom-1-3840.
    #[serde(default = "default_tier")]
    pub tier: String,

    #[serde(default = "default_availability_type")]
    pub availability_type: AvailabilityType,

    #[serde(default = "default_backup_enabled")]
    pub backup_enabled: bool,

    #[serde(default)]
    pub deletion_protection: bool,

    /// CIDR ranges allowed to connect.
    #[serde(default)]
    pub authorized_networks: Vec<String>,

    #[serde(default = "default_enable_public_ip")]
    pub enable_public_ip: bool,
}

impl DatabaseInstanceConfig {
    fn validate(&self) -> ResourceResult<()> {
        if self.project_id.trim().is_empty() {
            return Err(ResourceError::Validation("project_id must not be empty".into()));
        }

        if self.instance_name.is_empty() || self.instance_name.len() > 98 {
            return Err(ResourceError::Validation(
                "instance_name must be 1-98 characters".into(),
            ));
        }

        let starts_with_letter = self
            .instance_name
            .chars()
            .next()
            .map(|c| c.is_ascii_alphabetic())
            .unwrap_or(false);
        if !starts_with_letter {
            return Err(ResourceError::Validation(
                "instance_name must start with a letter".into(),
            ));
        }

        let valid = self
            .instance_name
            .to_lowercase()
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
        if !valid {
            return Err(ResourceError::Validation(
                "instance_name can only contain letters, numbers, and hyphens".into(),
            ));
        }

        let supported = ["POSTGRES_", "MYSQL_", "SQLSERVER_"];
        if !supported.iter().any(|p| self.database_version.starts_with(p)) {
            return Err(ResourceError::Validation(format!(
                "unsupported database version: {}; must start with POSTGRES_, MYSQL_, or SQLSERVER_",
                self.database_version
            )));
        }

        Ok(())
    }

    pub(crate) fn instance_path(&self) -> String {
        format!(
            "projects/{}/instances/{}",
            self.project_id, self.instance_name
        )
    }

    pub(crate) fn connection_name(&self) -> String {
        format!(
            "{}:{}:{}",
            self.project_id, self.region, self.instance_name
        )
    }
}

/// Outputs from Cloud SQL instance creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseInstanceOutputs {
    /// Cloud SQL connection name, `project:region:instance`.
    pub connection_name: String,
    pub public_ip: Option<String>,
    pub private_ip: Option<String>,
    pub ready: bool,
    /// URL to view the instance in the GCP console.
    pub console_url: String,
    /// URL to view instance logs in Cloud Logging.
    pub logs_url: String,
}

/// GCP Cloud SQL database instance resource.
///
/// Lifecycle:
/// - `on_create`: insert if absent, wait for RUNNABLE
/// - `on_update`: immutable-field checks, refresh state
/// - `on_delete`: delete instance, wait for completion, idempotent
pub struct DatabaseInstance {
    name: String,
    config: DatabaseInstanceConfig,
    outputs: Option<DatabaseInstanceOutputs>,
    client: Option<GcpClient>,
}

impl DatabaseInstance {
    pub fn new(name: impl Into<String>, config: DatabaseInstanceConfig) -> Self {
        Self {
            name: name.into(),
            config,
            outputs: None,
            client: None,
        }
    }

    pub fn with_outputs(mut self, outputs: DatabaseInstanceOutputs) -> Self {
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

    fn build_outputs(&self, instance: &Value) -> DatabaseInstanceOutputs {
        let project = &self.config.project_id;
        let name = &self.config.instance_name;

        let (public_ip, private_ip) = extract_ips(instance);

        let console_url = format!(
            "https://console.cloud.google.com/sql/instances/{}/overview?project={}",
            name, project
        );
        let logs_url = format!(
            "https://console.cloud.google.com/logs/query;\
             query=resource.type%3D%22cloudsql_database%22%0A\
             resource.labels.database_id%3D%22{}%3A{}%22?project={}",
            project, name, project
        );

        DatabaseInstanceOutputs {
            connection_name: self.config.connection_name(),
            public_ip,
            private_ip,
            ready: instance.get("state").and_then(Value::as_str) == Some("RUNNABLE"),
            console_url,
            logs_url,
        }
    }

    /// Fetch the instance, mapping 404 to `None`.
    async fn get_instance(&self, client: &GcpClient) -> ResourceResult<Option<Value>> {
        let url = client.sqladmin_url(&self.config.instance_path());

        match client.get(&url).await {
            Ok(instance) => Ok(Some(instance)),
            Err(err) if err.is_not_found() => Ok(None),
            Err(err) => Err(err),
        }
    }

    async fn wait_for_runnable(&self, client: &GcpClient) -> ResourceResult<Value> {
        for attempt in 0..MAX_POLL_ATTEMPTS {
            let instance = self
                .get_instance(client)
                .await?
                .ok_or_else(|| ResourceError::State("instance not found during polling".into()))?;

            let state = instance
                .get("state")
                .and_then(Value::as_str)
                .unwrap_or_default();

            match state {
                "RUNNABLE" => return Ok(instance),
                "FAILED" | "SUSPENDED" => {
                    return Err(ResourceError::State(format!(
                        "instance entered {} state",
                        state
                    )));
                }
                _ => {}
            }

            if attempt + 1 < MAX_POLL_ATTEMPTS {
                tokio::time::sleep(POLL_INTERVAL).await;
            }
        }

        Err(ResourceError::WaitTimeout {
            what: format!("instance {} to reach RUNNABLE", self.config.instance_name),
            secs: MAX_POLL_ATTEMPTS as u64 * POLL_INTERVAL.as_secs(),
        })
    }

    async fn wait_for_deletion(&self, client: &GcpClient) -> ResourceResult<()> {
        for attempt in 0..MAX_POLL_ATTEMPTS {
            if self.get_instance(client).await?.is_none() {
                return Ok(());
            }

            if attempt + 1 < MAX_POLL_ATTEMPTS {
                tokio::time::sleep(POLL_INTERVAL).await;
            }
        }

        Err(ResourceError::WaitTimeout {
            what: format!("instance {} to be deleted", self.config.instance_name),
            secs: MAX_POLL_ATTEMPTS as u64 * POLL_INTERVAL.as_secs(),
        })
    }

    fn build_instance_body(&self) -> Value {
        let authorized_networks: Vec<Value> = self
            .config
            .authorized_networks
            .iter()
            .enumerate()
            .map(|(i, network)| json!({"name": format!("network-{}", i), "value": network}))
            .collect();

        let mut ip_configuration = json!({"ipv4Enabled": self.config.enable_public_ip});
        if !authorized_networks.is_empty() {
            ip_configuration["authorizedNetworks"] = json!(authorized_networks);
        }

        let mut settings = json!({
            "tier": self.config.tier,
            "availabilityType": self.config.availability_type.as_str(),
            "ipConfiguration": ip_configuration,
            "deletionProtectionEnabled": self.config.deletion_protection,
        });

        if self.config.backup_enabled {
            settings["backupConfiguration"] = json!({"enabled": true, "startTime": "03:00"});
        }

        json!({
            "name": self.config.instance_name,
            "region": self.config.region,
            "databaseVersion": self.config.database_version,
            "settings": settings,
            "rootPassword": generate_password(ROOT_PASSWORD_LENGTH),
        })
    }
}

#[async_trait]
impl Resource for DatabaseInstance {
    type Config = DatabaseInstanceConfig;
    type Outputs = DatabaseInstanceOutputs;

    const PROVIDER: &'static str = "gcp";
    const KIND: &'static str = "cloudsql/database_instance";

    fn name(&self) -> &str {
        &self.name
    }

    fn config(&self) -> &Self::Config {
        &self.config
    }

    fn outputs(&self) -> Option<&Self::Outputs> {
        self.outputs.as_ref()
    }

    /// Create the instance and wait for RUNNABLE. Idempotent: an existing
    /// instance is adopted.
    async fn on_create(&self) -> ResourceResult<Self::Outputs> {
        self.config.validate()?;

        let client = self.client()?;

        if self.get_instance(&client).await?.is_none() {
            let url = client.sqladmin_url(&format!(
                "projects/{}/instances",
                self.config.project_id
            ));

            info!(
                "cloudsql instance `{}` creating {}",
                self.name,
                self.config.connection_name()
            );
            client.post(&url, Some(&self.build_instance_body())).await?;
        }

        let instance = self.wait_for_runnable(&client).await?;
        Ok(self.build_outputs(&instance))
    }

    /// Most instance properties require recreation; validate that immutable
    /// fields are unchanged and return current state.
    async fn on_update(&self, previous_config: &Self::Config) -> ResourceResult<Self::Outputs> {
        if previous_config.project_id != self.config.project_id {
            return Err(ResourceError::Immutable("project_id"));
        }

        if previous_config.region != self.config.region {
            return Err(ResourceError::Immutable("region"));
        }

        if previous_config.instance_name != self.config.instance_name {
            return Err(ResourceError::Immutable("instance_name"));
        }

        if previous_config.database_version != self.config.database_version {
            return Err(ResourceError::Immutable("database_version"));
        }

        if let Some(outputs) = &self.outputs {
            return Ok(outputs.clone());
        }

        let client = self.client()?;
        let instance = self
            .get_instance(&client)
            .await?
            .ok_or_else(|| ResourceError::NotFound("instance not found".into()))?;

        Ok(self.build_outputs(&instance))
    }

    /// Delete the instance. Idempotent; respects deletion_protection on the
    /// remote instance.
    async fn on_delete(&self) -> ResourceResult<()> {
        let client = self.client()?;
        let url = client.sqladmin_url(&self.config.instance_path());

        info!(
            "cloudsql instance `{}` deleting {}",
            self.name,
            self.config.connection_name()
        );
        match client.delete(&url).await {
            Ok(_) => self.wait_for_deletion(&client).await,
            Err(err) if err.is_not_found() => Ok(()),
            Err(err) => Err(err),
        }
    }

    async fn health(&self) -> ResourceResult<HealthStatus> {
        let client = self.client()?;

        let Some(instance) = self.get_instance(&client).await? else {
            return Ok(HealthStatus::unhealthy("instance not found"));
        };

        let state = instance
            .get("state")
            .and_then(Value::as_str)
            .unwrap_or("UNKNOWN");

        Ok(match state {
            "RUNNABLE" => {
                let tier = instance
                    .pointer("/settings/tier")
                    .and_then(Value::as_str)
                    .unwrap_or_default();
                HealthStatus::healthy("instance is running").with_details(json!({"tier": tier}))
            }
            "PENDING_CREATE" | "MAINTENANCE" => HealthStatus::degraded(format!(
                "instance is {}",
                state.to_lowercase().replace('_', " ")
            )),
            _ => HealthStatus::unhealthy(format!("instance state: {}", state)),
        })
    }

    /// Fetch instance logs from Cloud Logging.
    async fn logs(
        &self,
        since: Option<DateTime<Utc>>,
        tail: usize,
    ) -> ResourceResult<Vec<LogEntry>> {
        let client = self.client()?;

        let mut filter_parts = vec![
            "resource.type=\"cloudsql_database\"".to_string(),
            format!(
                "resource.labels.database_id=\"{}:{}\"",
                self.config.project_id, self.config.instance_name
            ),
        ];

        if let Some(since) = since {
            filter_parts.push(format!("timestamp>=\"{}\"", since.to_rfc3339()));
        }

        let url = client.logging_url("entries:list");
        let body = json!({
            "resourceNames": [format!("projects/{}", self.config.project_id)],
            "filter": filter_parts.join(" AND "),
            "orderBy": "timestamp desc",
            "pageSize": tail,
        });

        let response = client.post(&url, Some(&body)).await?;
        let empty = Vec::new();
        let entries = response
            .get("entries")
            .and_then(Value::as_array)
            .unwrap_or(&empty);

        Ok(entries.iter().map(log_entry_from_value).collect())
    }
}

fn log_entry_from_value(entry: &Value) -> LogEntry {
    let timestamp = entry
        .get("timestamp")
        .and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|t| t.with_timezone(&Utc))
        .unwrap_or_else(Utc::now);

    let severity = entry
        .get("severity")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_lowercase();

    let level = if severity.contains("error") || severity.contains("critical") {
        LogLevel::Error
    } else if severity.contains("warn") {
        LogLevel::Warn
    } else if severity.contains("debug") {
        LogLevel::Debug
    } else {
        LogLevel::Info
    };

    let message = entry
        .get("textPayload")
        .and_then(Value::as_str)
        .map(str::to_string)
        .or_else(|| entry.get("jsonPayload").map(|p| p.to_string()))
        .unwrap_or_default();

    let mut log_entry = LogEntry::new(timestamp, level, message);
    if let Some(log_name) = entry.get("logName").and_then(Value::as_str) {
        log_entry.metadata = Some(json!({"log_name": log_name}));
    }

    log_entry
}
