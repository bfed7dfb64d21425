//! Agno provider
//!
//! Assembles serializable agent specifications from model, tool, and prompt
//! resources, and deploys agents and teams to GKE through weave-kubernetes
//! child resources. The deployed container reconstructs the agent from the
//! spec passed in its environment.

pub mod resources;
pub mod spec;

pub use resources::agent::{Agent, AgentConfig, AgentOutputs, ModelRef, ToolRef};
pub use resources::model::{
    AnthropicModel, AnthropicModelConfig, ModelOutputs, OpenAiModel, OpenAiModelConfig,
};
pub use resources::prompt::{Prompt, PromptConfig, PromptOutputs};
pub use resources::team::{Team, TeamConfig, TeamOutputs};
pub use resources::tools::{
    McpTransport, ToolOutputs, ToolsMcp, ToolsMcpConfig, ToolsWebSearch, ToolsWebSearchConfig,
};
pub use spec::{AgentSpec, ModelProvider, ModelSpec, TeamSpec, ToolSpec};
