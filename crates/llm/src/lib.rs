//! Service Builder LLM
//!
//! LLM provider abstraction for the Service Builder workspace. Exposes a
//! single `LlmProvider` trait (text completions, optional JSON mode) and an
//! OpenAI-compatible HTTP implementation.
//!
//! ## Module Organization
//!
//! - `types` - Request/response types (`ProviderConfig`, `Message`, `LlmResponse`, `LlmError`)
//! - `provider` - The `LlmProvider` trait and shared HTTP error mapping
//! - `openai` - `OpenAIProvider` against the chat-completions API

pub mod openai;
pub mod provider;
pub mod types;

pub use openai::OpenAIProvider;
pub use provider::LlmProvider;
pub use types::{
    LlmError, LlmRequestOptions, LlmResponse, LlmResult, Message, MessageRole, ProviderConfig,
    StopReason, UsageStats,
};
