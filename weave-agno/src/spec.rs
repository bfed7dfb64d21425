//! Serializable agent specifications
//!
//! Specs carry everything the deployed container needs to reconstruct an
//! agent at runtime: the model, its credentials, tools, and instructions.
//! They flow from resource outputs into deployment environment variables.

use serde::{Deserialize, Serialize};

/// LLM backend for an agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelProvider {
    OpenAi,
    Anthropic,
}

/// Model specification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSpec {
    pub provider: ModelProvider,

    /// Model identifier, e.g. "gpt-4o" or "claude-sonnet-4-20250514".
    pub id: String,

    pub api_key: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

/// Tool specification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ToolSpec {
    Websearch {
        max_results: u32,
    },
    Mcp {
        url: String,
        transport: crate::resources::tools::McpTransport,
    },
}

/// Complete agent specification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSpec {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,

    pub model: ModelSpec,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolSpec>,
}

/// Team specification: a coordinating model plus member agents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamSpec {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,

    pub model: ModelSpec,

    pub member_specs: Vec<AgentSpec>,
}
