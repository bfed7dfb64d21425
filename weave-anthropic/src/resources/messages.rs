//! Anthropic Messages resource

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;
use weave_resource::{FieldValue, Resource, ResourceError, ResourceResult};

use crate::api::{AnthropicClient, MessagesRequest};

/// Configuration for the Messages API.
///
/// `api_key` accepts a `$ref` so the runtime can inject it from a secret
/// resource. Messages are the Anthropic conversation format, passed through
/// verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessagesConfig {
    pub api_key: FieldValue<String>,
    pub model: String,
    pub messages: Vec<Value>,

    /// Maximum tokens in the response (required by the API).
    pub max_tokens: u32,

    /// Optional system prompt.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,

    /// Sampling temperature (0.0-1.0).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    /// API base URL override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

impl MessagesConfig {
    fn validate(&self) -> ResourceResult<()> {
        if self.model.trim().is_empty() {
            return Err(ResourceError::Validation("model must not be empty".into()));
        }

        if self.messages.is_empty() {
            return Err(ResourceError::Validation(
                "messages must contain at least one entry".into(),
            ));
        }

        if self.max_tokens == 0 {
            return Err(ResourceError::Validation(
                "max_tokens must be greater than zero".into(),
            ));
        }

        if let Some(temperature) = self.temperature {
            if !(0.0..=1.0).contains(&temperature) {
                return Err(ResourceError::Validation(format!(
                    "temperature must be within 0.0-1.0, got {}",
                    temperature
                )));
            }
        }

        Ok(())
    }
}

/// Normalized result of one Messages call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessagesOutputs {
    pub id: String,
    pub content: Vec<Value>,
    pub model: String,
    pub stop_reason: Option<String>,
    pub input_tokens: u32,
    pub output_tokens: u32,
}

/// Anthropic Messages resource.
///
/// Lifecycle:
/// - `on_create`: call the Messages API
/// - `on_update`: regenerate if the config changed
/// - `on_delete`: no-op (stateless)
pub struct Messages {
    name: String,
    config: MessagesConfig,
    outputs: Option<MessagesOutputs>,
}

impl Messages {
    pub fn new(name: impl Into<String>, config: MessagesConfig) -> Self {
        Self {
            name: name.into(),
            config,
            outputs: None,
        }
    }

    pub fn with_outputs(mut self, outputs: MessagesOutputs) -> Self {
        self.outputs = Some(outputs);
        self
    }

    fn client(&self) -> ResourceResult<AnthropicClient> {
        let api_key = self.config.api_key.value()?;

        match &self.config.base_url {
            Some(base_url) => AnthropicClient::with_base_url(api_key, base_url),
            None => AnthropicClient::new(api_key),
        }
    }

    async fn call_api(&self) -> ResourceResult<MessagesOutputs> {
        self.config.validate()?;

        let client = self.client()?;
        let request = MessagesRequest {
            model: self.config.model.clone(),
            messages: self.config.messages.clone(),
            max_tokens: self.config.max_tokens,
            system: self.config.system.clone(),
            temperature: self.config.temperature,
        };

        info!("messages `{}` calling model {}", self.name, self.config.model);
        let response = client.create_message(&request).await?;

        Ok(MessagesOutputs {
            id: response.id,
            content: response.content,
            model: response.model,
            stop_reason: response.stop_reason,
            input_tokens: response.usage.input_tokens,
            output_tokens: response.usage.output_tokens,
        })
    }
}

#[async_trait]
impl Resource for Messages {
    type Config = MessagesConfig;
    type Outputs = MessagesOutputs;

    const PROVIDER: &'static str = "anthropic";
    const KIND: &'static str = "messages";

    fn name(&self) -> &str {
        &self.name
    }

    fn config(&self) -> &Self::Config {
        &self.config
    }

    fn outputs(&self) -> Option<&Self::Outputs> {
        self.outputs.as_ref()
    }

    async fn on_create(&self) -> ResourceResult<Self::Outputs> {
        self.call_api().await
    }

    async fn on_update(&self, previous_config: &Self::Config) -> ResourceResult<Self::Outputs> {
        if previous_config == &self.config {
            if let Some(outputs) = &self.outputs {
                return Ok(outputs.clone());
            }
        }

        self.call_api().await
    }

    async fn on_delete(&self) -> ResourceResult<()> {
        // Stateless: nothing to tear down remotely.
        Ok(())
    }
}
