//! OpenAI provider
//!
//! Wraps the OpenAI Chat Completions and Embeddings APIs behind the weave
//! resource lifecycle. API keys can be injected by the runtime through
//! `FieldValue` references.

pub mod api;
pub mod resources;

pub use resources::chat_completions::{
    ChatCompletions, ChatCompletionsConfig, ChatCompletionsOutputs,
};
pub use resources::embeddings::{
    EmbedInput, EmbedOutput, Embeddings, EmbeddingsConfig, EmbeddingsOutputs,
};
