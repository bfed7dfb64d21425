//! Tool spec resources

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use url::Url;
use weave_resource::{Resource, ResourceError, ResourceResult};

use crate::spec::ToolSpec;

/// Outputs shared by both tool resources.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolOutputs {
    pub spec: ToolSpec,
}

fn default_max_results() -> u32 {
    5
}

/// Configuration for the web-search tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolsWebSearchConfig {
    #[serde(default = "default_max_results")]
    pub max_results: u32,
}

impl Default for ToolsWebSearchConfig {
    fn default() -> Self {
        Self {
            max_results: default_max_results(),
        }
    }
}

/// Web-search tool spec resource.
pub struct ToolsWebSearch {
    name: String,
    config: ToolsWebSearchConfig,
    outputs: Option<ToolOutputs>,
}

impl ToolsWebSearch {
    pub fn new(name: impl Into<String>, config: ToolsWebSearchConfig) -> Self {
        Self {
            name: name.into(),
            config,
            outputs: None,
        }
    }

    pub fn with_outputs(mut self, outputs: ToolOutputs) -> Self {
        self.outputs = Some(outputs);
        self
    }

    fn build_outputs(&self) -> ResourceResult<ToolOutputs> {
        if self.config.max_results == 0 {
            return Err(ResourceError::Validation(
                "max_results must be greater than zero".into(),
            ));
        }

        Ok(ToolOutputs {
            spec: ToolSpec::Websearch {
                max_results: self.config.max_results,
            },
        })
    }
}

#[async_trait]
impl Resource for ToolsWebSearch {
    type Config = ToolsWebSearchConfig;
    type Outputs = ToolOutputs;

    const PROVIDER: &'static str = "agno";
    const KIND: &'static str = "tools/websearch";

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

/// MCP server transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum McpTransport {
    #[serde(rename = "sse")]
    Sse,
    #[serde(rename = "streamable-http")]
    StreamableHttp,
}

impl Default for McpTransport {
    fn default() -> Self {
        McpTransport::StreamableHttp
    }
}

/// Configuration for an MCP server tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolsMcpConfig {
    /// MCP server URL.
    pub url: String,

    #[serde(default)]
    pub transport: McpTransport,
}

/// MCP tool spec resource.
pub struct ToolsMcp {
    name: String,
    config: ToolsMcpConfig,
    outputs: Option<ToolOutputs>,
}

impl ToolsMcp {
    pub fn new(name: impl Into<String>, config: ToolsMcpConfig) -> Self {
        Self {
            name: name.into(),
            config,
            outputs: None,
        }
    }

    pub fn with_outputs(mut self, outputs: ToolOutputs) -> Self {
        self.outputs = Some(outputs);
        self
    }

    fn build_outputs(&self) -> ResourceResult<ToolOutputs> {
        Url::parse(&self.config.url)
            .map_err(|e| ResourceError::Validation(format!("invalid MCP server URL: {}", e)))?;

        Ok(ToolOutputs {
            spec: ToolSpec::Mcp {
                url: self.config.url.clone(),
                transport: self.config.transport,
            },
        })
    }
}

#[async_trait]
impl Resource for ToolsMcp {
    type Config = ToolsMcpConfig;
    type Outputs = ToolOutputs;

    const PROVIDER: &'static str = "agno";
    const KIND: &'static str = "tools/mcp";

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

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn websearch_emits_spec_with_defaults() {
        let tool = ToolsWebSearch::new("search", ToolsWebSearchConfig::default());
        let outputs = tool.on_create().await.unwrap();

        assert_eq!(outputs.spec, ToolSpec::Websearch { max_results: 5 });
    }

    #[tokio::test]
    async fn mcp_rejects_invalid_urls() {
        let tool = ToolsMcp::new(
            "docs-mcp",
            ToolsMcpConfig {
                url: "not a url".to_string(),
                transport: McpTransport::default(),
            },
        );

        let err = tool.on_create().await.unwrap_err();
        assert!(matches!(err, ResourceError::Validation(_)));
    }

    #[test]
    fn transport_serializes_in_wire_spelling() {
        assert_eq!(
            serde_json::to_string(&McpTransport::StreamableHttp).unwrap(),
            "\"streamable-http\""
        );
    }
}
