//! Reusable prompt template resource

use std::collections::HashMap;
use std::collections::HashSet;
use std::sync::OnceLock;

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use weave_resource::{Resource, ResourceError, ResourceResult};

fn placeholder_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\{\{(\w+)\}\}").expect("placeholder regex"))
}

/// Configuration for a reusable prompt template.
///
/// Template syntax: `{{variable}}` placeholders, each of which must be
/// defined in `variables`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PromptConfig {
    /// Instruction lines, joined with newlines.
    #[serde(default)]
    pub instructions: Vec<String>,

    /// Values for template interpolation.
    #[serde(default)]
    pub variables: HashMap<String, String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,
}

impl PromptConfig {
    pub fn validate(&self) -> ResourceResult<()> {
        if self.instructions.is_empty() && self.template.is_none() {
            return Err(ResourceError::Validation(
                "at least one of `instructions` or `template` must be provided".into(),
            ));
        }

        if let Some(template) = &self.template {
            let placeholders: HashSet<&str> = placeholder_pattern()
                .captures_iter(template)
                .map(|c| c.get(1).map(|m| m.as_str()).unwrap_or_default())
                .collect();

            let mut missing: Vec<&str> = placeholders
                .into_iter()
                .filter(|name| !self.variables.contains_key(*name))
                .collect();

            if !missing.is_empty() {
                missing.sort_unstable();
                return Err(ResourceError::Validation(format!(
                    "missing variables for template placeholders: {:?}",
                    missing
                )));
            }
        }

        Ok(())
    }

    /// Render the prompt text: instructions joined by newlines, followed by
    /// the interpolated template.
    pub fn render(&self) -> String {
        let mut parts: Vec<String> = Vec::new();

        if !self.instructions.is_empty() {
            parts.push(self.instructions.join("\n"));
        }

        if let Some(template) = &self.template {
            let mut rendered = template.clone();
            for (key, value) in &self.variables {
                rendered = rendered.replace(&format!("{{{{{}}}}}", key), value);
            }
            parts.push(rendered);
        }

        parts.join("\n")
    }
}

/// Outputs from the prompt resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptOutputs {
    pub text: String,
    pub instruction_count: usize,
}

/// Reusable prompt template resource.
///
/// Stateless; dependent resources (agno/agent) read the rendered text from
/// the resolved config.
///
/// Lifecycle:
/// - `on_create`/`on_update`: render and return outputs
/// - `on_delete`: no-op
pub struct Prompt {
    name: String,
    config: PromptConfig,
    outputs: Option<PromptOutputs>,
}

impl Prompt {
    pub fn new(name: impl Into<String>, config: PromptConfig) -> Self {
        Self {
            name: name.into(),
            config,
            outputs: None,
        }
    }

    pub fn with_outputs(mut self, outputs: PromptOutputs) -> Self {
        self.outputs = Some(outputs);
        self
    }

    fn build_outputs(&self) -> ResourceResult<PromptOutputs> {
        self.config.validate()?;

        let text = self.config.render();
        let instruction_count = if text.trim().is_empty() {
            0
        } else {
            text.trim().lines().count()
        };

        Ok(PromptOutputs {
            text,
            instruction_count,
        })
    }
}

#[async_trait]
impl Resource for Prompt {
    type Config = PromptConfig;
    type Outputs = PromptOutputs;

    const PROVIDER: &'static str = "agno";
    const KIND: &'static str = "prompt";

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
        self.build_outputs()
    }

    async fn on_update(&self, _previous_config: &Self::Config) -> ResourceResult<Self::Outputs> {
        self.build_outputs()
    }

    async fn on_delete(&self) -> ResourceResult<()> {
        Ok(())
    }
}
