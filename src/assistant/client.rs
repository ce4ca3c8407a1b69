use reqwest::Client;
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

use super::types::{
    ChatCompletionRequest, ChatCompletionResponse, Message, ProxyRequest, ProxyResponse,
    RequestType, UpstreamErrorBody,
};
use crate::config::LlmConfig;
use crate::error::{ErrorCode, ProxyError, ProxyResult};
use crate::prompts::{self, system_prompt};
use crate::storage::{Project, Story};

/// Characters of each story included in a sentiment request.
const SENTIMENT_STORY_CHARS: usize = 600;

/// Client that forwards assistant prompts to a chat-completions API
#[derive(Clone)]
pub struct LlmClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
    timeout_ms: u64,
}

impl LlmClient {
    /// Create a new client; requests time out after `timeout_ms`
    pub fn new(config: &LlmConfig) -> ProxyResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| {
                ProxyError::new(ErrorCode::ServerError, "Failed to build HTTP client")
                    .with_details(e.to_string())
            })?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            timeout_ms: config.timeout_ms,
        })
    }

    /// Forward one prompt. Failures are not retried; a `timeout` is left
    /// to the caller to retry manually.
    pub async fn complete(&self, request: ProxyRequest) -> ProxyResult<ProxyResponse> {
        if request.prompt.trim().is_empty() {
            return Err(ProxyError::new(ErrorCode::BadRequest, "Prompt is required"));
        }
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            ProxyError::new(ErrorCode::ApiKeyMissing, "Assistant API key is not configured")
        })?;

        let body = ChatCompletionRequest {
            model: self.model.clone(),
            messages: build_messages(&request),
            temperature: Some(0.7),
            max_tokens: Some(1000),
        };

        let start = Instant::now();
        match self.execute_request(api_key, &body).await {
            Ok(response) => {
                info!(
                    request_type = ?request.request_type,
                    latency_ms = start.elapsed().as_millis(),
                    "Assistant call succeeded"
                );
                Ok(response)
            }
            Err(e) => {
                error!(
                    request_type = ?request.request_type,
                    error_code = %e.error_code,
                    error = %e.error,
                    latency_ms = start.elapsed().as_millis(),
                    "Assistant call failed"
                );
                Err(e)
            }
        }
    }

    /// Execute a single request (internal)
    async fn execute_request(
        &self,
        api_key: &str,
        body: &ChatCompletionRequest,
    ) -> ProxyResult<ProxyResponse> {
        let url = format!("{}/v1/chat/completions", self.base_url);

        debug!(model = %body.model, messages = body.messages.len(), "Calling assistant API");

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", api_key))
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProxyError::new(ErrorCode::Timeout, "Request timed out")
                        .with_details(format!("No answer after {}ms", self.timeout_ms))
                } else {
                    ProxyError::new(ErrorCode::ServerError, "Failed to reach assistant API")
                        .with_details(e.to_string())
                }
            })?;

        let status = response.status();
        let text = response.text().await.map_err(|e| {
            if e.is_timeout() {
                ProxyError::new(ErrorCode::Timeout, "Request timed out")
            } else {
                ProxyError::new(ErrorCode::ServerError, "Failed to read assistant response")
                    .with_details(e.to_string())
            }
        })?;

        if !status.is_success() {
            return Err(error_for_status(status.as_u16(), &text));
        }

        let parsed: ChatCompletionResponse = serde_json::from_str(&text).map_err(|e| {
            ProxyError::new(ErrorCode::InvalidJson, "Failed to parse assistant response")
                .with_details(e.to_string())
        })?;

        let content = parsed.first_content().ok_or_else(|| {
            ProxyError::new(ErrorCode::OpenaiError, "Assistant returned an empty answer")
        })?;

        Ok(ProxyResponse {
            response: content.to_string(),
        })
    }

    /// Draft a story question for a project.
    pub async fn generate_story_question(&self, project: &Project) -> ProxyResult<String> {
        let request = ProxyRequest::new(prompts::story_question_request(project))
            .with_type(RequestType::StoryQuestion);
        let response = self.complete(request).await?;
        Ok(response
            .response
            .trim()
            .trim_matches(|c| c == '"' || c == '\u{201c}' || c == '\u{201d}')
            .trim()
            .to_string())
    }

    /// Summarise the emotional tone of a set of stories.
    pub async fn analyze_sentiment(
        &self,
        stories: &[Story],
        project_context: Option<String>,
    ) -> ProxyResult<String> {
        if stories.is_empty() {
            return Err(ProxyError::new(
                ErrorCode::BadRequest,
                "No stories to analyse",
            ));
        }
        let mut request = ProxyRequest::new(prompts::sentiment_request(stories, SENTIMENT_STORY_CHARS))
            .with_type(RequestType::SentimentAnalysis);
        request.project_context = project_context;
        Ok(self.complete(request).await?.response)
    }

    /// Get the base URL (for testing)
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

/// Messages sent upstream: system prompt, optional project context, prompt.
pub fn build_messages(request: &ProxyRequest) -> Vec<Message> {
    let mut messages = vec![Message::system(system_prompt(request.request_type))];

    if let Some(context) = request
        .project_context
        .as_deref()
        .filter(|c| !c.trim().is_empty())
    {
        messages.push(Message::system(format!("Project context:\n{}", context)));
    }

    messages.push(Message::user(request.prompt.clone()));
    messages
}

/// Map an upstream HTTP failure to an error code.
pub fn error_for_status(status: u16, body: &str) -> ProxyError {
    let upstream = serde_json::from_str::<UpstreamErrorBody>(body)
        .map(|b| b.error.message)
        .unwrap_or_else(|_| body.to_string());

    let (code, message) = match status {
        400 => (ErrorCode::BadRequest, "Assistant rejected the request"),
        401 | 403 => (ErrorCode::InvalidApiKey, "Assistant API key is invalid"),
        408 | 504 => (ErrorCode::Timeout, "Request timed out"),
        429 => (ErrorCode::RateLimit, "Assistant rate limit reached"),
        _ => (ErrorCode::OpenaiError, "Assistant service error"),
    };

    ProxyError::new(code, message).with_details(format!("{} - {}", status, upstream))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = LlmClient::new(&LlmConfig::default());
        assert!(client.is_ok());
        assert_eq!(client.unwrap().base_url(), "https://api.openai.com");
    }

    #[test]
    fn test_build_messages_with_context() {
        let request = ProxyRequest::new("What stands out?")
            .with_context("12 stories")
            .with_type(RequestType::General);
        let messages = build_messages(&request);
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0].content, prompts::GENERAL_PROMPT);
        assert!(messages[1].content.contains("12 stories"));
        assert_eq!(messages[2], Message::user("What stands out?"));
    }

    #[test]
    fn test_build_messages_skips_blank_context() {
        let request = ProxyRequest::new("Hi").with_context("   ");
        assert_eq!(build_messages(&request).len(), 2);
    }

    #[test]
    fn test_error_for_status_mapping() {
        assert_eq!(error_for_status(400, "").error_code, ErrorCode::BadRequest);
        assert_eq!(error_for_status(401, "").error_code, ErrorCode::InvalidApiKey);
        assert_eq!(error_for_status(429, "").error_code, ErrorCode::RateLimit);
        assert_eq!(error_for_status(503, "").error_code, ErrorCode::OpenaiError);
        assert_eq!(error_for_status(504, "").error_code, ErrorCode::Timeout);
        assert_eq!(error_for_status(418, "").error_code, ErrorCode::OpenaiError);
        assert_eq!(error_for_status(404, "").error_code, ErrorCode::OpenaiError);
        assert_eq!(error_for_status(302, "").error_code, ErrorCode::OpenaiError);
    }

    #[test]
    fn test_error_for_status_extracts_upstream_message() {
        let err = error_for_status(
            401,
            r#"{"error": {"message": "Incorrect API key provided", "type": "invalid_request_error"}}"#,
        );
        assert_eq!(
            err.details.as_deref(),
            Some("401 - Incorrect API key provided")
        );
    }

    #[tokio::test]
    async fn test_missing_api_key_short_circuits() {
        let client = LlmClient::new(&LlmConfig::default()).unwrap();
        let err = client.complete(ProxyRequest::new("Hello")).await.unwrap_err();
        assert_eq!(err.error_code, ErrorCode::ApiKeyMissing);
    }

    #[tokio::test]
    async fn test_empty_prompt_is_bad_request() {
        let client = LlmClient::new(&LlmConfig::default()).unwrap();
        let err = client.complete(ProxyRequest::new("  ")).await.unwrap_err();
        assert_eq!(err.error_code, ErrorCode::BadRequest);
    }
}
