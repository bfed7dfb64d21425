//! The `Resource` lifecycle trait

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::ResourceResult;
use crate::health::{HealthStatus, LogEntry};

/// A typed unit of desired-state configuration with a create/update/delete
/// lifecycle.
///
/// Implementors are plain structs holding `{ name, config, outputs }`; the
/// external runtime constructs them, invokes exactly one lifecycle hook per
/// dispatch, and persists the returned outputs. Nothing is cached or pooled
/// across invocations inside this repository.
#[async_trait]
pub trait Resource: Send + Sync {
    type Config: Send + Sync;
    type Outputs: Send + Sync;

    /// Provider namespace, e.g. `"openai"`.
    const PROVIDER: &'static str;
    /// Resource kind within the provider, e.g. `"chat_completions"`.
    const KIND: &'static str;

    /// Runtime-assigned resource name.
    fn name(&self) -> &str;

    fn config(&self) -> &Self::Config;

    /// Outputs persisted from the most recent lifecycle invocation, if any.
    fn outputs(&self) -> Option<&Self::Outputs>;

    async fn on_create(&self) -> ResourceResult<Self::Outputs>;

    async fn on_update(&self, previous_config: &Self::Config) -> ResourceResult<Self::Outputs>;

    async fn on_delete(&self) -> ResourceResult<()>;

    /// Probe the backing service. Resources without a long-lived backing
    /// service report `Unknown`.
    async fn health(&self) -> ResourceResult<HealthStatus> {
        Ok(HealthStatus::unknown())
    }

    /// Fetch recent logs from the backing workload. Resources without logs
    /// return an empty list.
    async fn logs(
        &self,
        _since: Option<DateTime<Utc>>,
        _tail: usize,
    ) -> ResourceResult<Vec<LogEntry>> {
        Ok(Vec::new())
    }
}
