//! AI assistant: forwards prompts to a chat-completions API.

mod client;
mod types;

pub use client::{build_messages, error_for_status, LlmClient};
pub use types::*;
