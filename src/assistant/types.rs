use serde::{Deserialize, Serialize};

use crate::error::ErrorCode;

/// Message in a chat-completions conversation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
}

/// Message role
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

impl Message {
    /// Create a system message
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }

    /// Create a user message
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    /// Create an assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }
}

/// Kind of assistant request; selects the system prompt.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RequestType {
    #[default]
    General,
    SentimentAnalysis,
    StoryQuestion,
}

/// Request accepted by the assistant proxy
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProxyRequest {
    pub prompt: String,
    #[serde(rename = "projectContext", skip_serializing_if = "Option::is_none", default)]
    pub project_context: Option<String>,
    #[serde(rename = "requestType", default)]
    pub request_type: RequestType,
}

impl ProxyRequest {
    /// Create a general request
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            project_context: None,
            request_type: RequestType::General,
        }
    }

    /// Attach project context
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.project_context = Some(context.into());
        self
    }

    /// Set the request type
    pub fn with_type(mut self, request_type: RequestType) -> Self {
        self.request_type = request_type;
        self
    }
}

/// Successful assistant reply
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProxyResponse {
    pub response: String,
}

/// Request body for the chat-completions endpoint
#[derive(Debug, Clone, Serialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

/// Response from the chat-completions endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct ChatCompletionResponse {
    #[serde(default)]
    pub choices: Vec<Choice>,
    pub model: Option<String>,
    pub usage: Option<Usage>,
}

/// One completion choice
#[derive(Debug, Clone, Deserialize)]
pub struct Choice {
    pub message: ChoiceMessage,
    pub finish_reason: Option<String>,
}

/// Message inside a completion choice
#[derive(Debug, Clone, Deserialize)]
pub struct ChoiceMessage {
    pub content: Option<String>,
}

/// Token usage information
#[derive(Debug, Clone, Deserialize)]
pub struct Usage {
    pub prompt_tokens: Option<u32>,
    pub completion_tokens: Option<u32>,
    pub total_tokens: Option<u32>,
}

/// Error body returned by the upstream API
#[derive(Debug, Clone, Deserialize)]
pub struct UpstreamErrorBody {
    pub error: UpstreamError,
}

/// Upstream error details
#[derive(Debug, Clone, Deserialize)]
pub struct UpstreamError {
    pub message: String,
    #[serde(rename = "type")]
    pub error_type: Option<String>,
    pub code: Option<String>,
}

impl ChatCompletionResponse {
    /// Text of the first choice, if non-empty
    pub fn first_content(&self) -> Option<&str> {
        self.choices
            .first()
            .and_then(|c| c.message.content.as_deref())
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

/// User-facing message for an assistant error code.
pub fn user_message(code: ErrorCode) -> &'static str {
    match code {
        ErrorCode::ApiKeyMissing => {
            "The AI assistant is not configured yet. Please add an API key."
        }
        ErrorCode::InvalidApiKey => "The AI assistant API key was rejected. Please check it.",
        ErrorCode::Timeout => "The AI assistant took too long to answer. Please try again.",
        ErrorCode::RateLimit => "The AI assistant is busy right now. Please wait a moment and retry.",
        ErrorCode::BadRequest => "The request to the AI assistant was not valid.",
        ErrorCode::InvalidJson => "The AI assistant returned an unreadable answer.",
        ErrorCode::OpenaiError => "The AI service reported an error. Please try again later.",
        ErrorCode::ServerError => "The AI assistant could not be reached.",
        ErrorCode::UnknownError => "Something went wrong with the AI assistant.",
    }
}

#[cfg(test)]
#[path = "types_tests.rs"]
mod types_tests;
