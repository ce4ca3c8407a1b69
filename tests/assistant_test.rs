//! Integration tests for the assistant client
//!
//! Tests HTTP client behavior using wiremock for request/response mocking.

use serde_json::json;
use wiremock::{
    matchers::{body_partial_json, header, method, path},
    Mock, MockServer, ResponseTemplate,
};

use culture_sprint::assistant::{LlmClient, ProxyRequest, RequestType};
use culture_sprint::cache::ClientCache;
use culture_sprint::config::{Config, LlmConfig};
use culture_sprint::error::{AppError, ErrorCode};
use culture_sprint::prompts::{SENTIMENT_ANALYSIS_PROMPT, STORY_QUESTION_PROMPT};
use culture_sprint::state::AppState;
use culture_sprint::storage::{Project, SqliteStorage, Storage, Story};

fn test_config(base_url: &str, timeout_ms: u64) -> LlmConfig {
    LlmConfig {
        api_key: Some("test-api-key".to_string()),
        base_url: base_url.to_string(),
        model: "gpt-4o-mini".to_string(),
        timeout_ms,
    }
}

/// Create a test client pointing to mock server
fn create_test_client(base_url: &str) -> LlmClient {
    LlmClient::new(&test_config(base_url, 5000)).expect("Failed to create client")
}

fn completion(content: &str) -> serde_json::Value {
    json!({
        "id": "chatcmpl-1",
        "model": "gpt-4o-mini",
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": content},
            "finish_reason": "stop"
        }],
        "usage": {"prompt_tokens": 20, "completion_tokens": 10, "total_tokens": 30}
    })
}

#[cfg(test)]
mod completion_tests {
    use super::*;

    #[tokio::test]
    async fn test_successful_completion() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("Authorization", "Bearer test-api-key"))
            .and(body_partial_json(json!({"model": "gpt-4o-mini"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion("Trust is a theme.")))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server.uri());
        let response = client
            .complete(ProxyRequest::new("What themes stand out?").with_context("3 stories"))
            .await
            .unwrap();

        assert_eq!(response.response, "Trust is a theme.");
    }

    #[tokio::test]
    async fn test_system_prompt_follows_request_type() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(body_partial_json(json!({
                "messages": [{"role": "system", "content": SENTIMENT_ANALYSIS_PROMPT}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion("Mostly positive.")))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server.uri());
        let stories = vec![Story::new("p", "Good day", "We shipped").with_emotional_response("happy")];
        let summary = client.analyze_sentiment(&stories, None).await.unwrap();
        assert_eq!(summary, "Mostly positive.");
    }

    #[tokio::test]
    async fn test_generate_story_question_strips_quotes() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(body_partial_json(json!({
                "messages": [{"role": "system", "content": STORY_QUESTION_PROMPT}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion(
                "\"Tell me about a time you asked for help.\"",
            )))
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server.uri());
        let question = client
            .generate_story_question(&Project::new("Help culture", "u"))
            .await
            .unwrap();
        assert_eq!(question, "Tell me about a time you asked for help.");
    }
}

#[cfg(test)]
mod error_tests {
    use super::*;

    async fn error_code_for(template: ResponseTemplate) -> ErrorCode {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(template)
            .mount(&mock_server)
            .await;

        create_test_client(&mock_server.uri())
            .complete(ProxyRequest::new("Hello"))
            .await
            .unwrap_err()
            .error_code
    }

    #[tokio::test]
    async fn test_unauthorized_maps_to_invalid_api_key() {
        let template = ResponseTemplate::new(401).set_body_json(json!({
            "error": {"message": "Incorrect API key provided", "type": "invalid_request_error"}
        }));
        assert_eq!(error_code_for(template).await, ErrorCode::InvalidApiKey);
    }

    #[tokio::test]
    async fn test_rate_limit() {
        let template = ResponseTemplate::new(429).set_body_string("slow down");
        assert_eq!(error_code_for(template).await, ErrorCode::RateLimit);
    }

    #[tokio::test]
    async fn test_bad_request() {
        let template = ResponseTemplate::new(400).set_body_string("bad");
        assert_eq!(error_code_for(template).await, ErrorCode::BadRequest);
    }

    #[tokio::test]
    async fn test_upstream_server_error() {
        let template = ResponseTemplate::new(502).set_body_string("bad gateway");
        assert_eq!(error_code_for(template).await, ErrorCode::OpenaiError);
    }

    #[tokio::test]
    async fn test_other_client_errors_are_upstream_failures() {
        let template = ResponseTemplate::new(404).set_body_string("no such route");
        assert_eq!(error_code_for(template).await, ErrorCode::OpenaiError);
    }

    #[tokio::test]
    async fn test_unparseable_body() {
        let template = ResponseTemplate::new(200).set_body_string("not json at all");
        assert_eq!(error_code_for(template).await, ErrorCode::InvalidJson);
    }

    #[tokio::test]
    async fn test_empty_choices() {
        let template = ResponseTemplate::new(200).set_body_json(json!({"choices": []}));
        assert_eq!(error_code_for(template).await, ErrorCode::OpenaiError);
    }

    #[tokio::test]
    async fn test_timeout() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(completion("too late"))
                    .set_delay(std::time::Duration::from_millis(500)),
            )
            .mount(&mock_server)
            .await;

        let client = LlmClient::new(&test_config(&mock_server.uri(), 100)).unwrap();
        let err = client.complete(ProxyRequest::new("Hello")).await.unwrap_err();
        assert_eq!(err.error_code, ErrorCode::Timeout);
    }

    #[tokio::test]
    async fn test_missing_key_makes_no_request() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion("unused")))
            .expect(0)
            .mount(&mock_server)
            .await;

        let mut config = test_config(&mock_server.uri(), 5000);
        config.api_key = None;
        let err = LlmClient::new(&config)
            .unwrap()
            .complete(ProxyRequest::new("Hello").with_type(RequestType::General))
            .await
            .unwrap_err();
        assert_eq!(err.error_code, ErrorCode::ApiKeyMissing);
    }

    #[test]
    fn test_error_serializes_with_camel_case_code() {
        let err = culture_sprint::error::ProxyError::new(ErrorCode::RateLimit, "busy");
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["errorCode"], "rate_limit");
        assert_eq!(json["error"], "busy");
    }
}

#[cfg(test)]
mod app_state_tests {
    use super::*;

    #[tokio::test]
    async fn test_ask_sends_project_context() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(body_partial_json(json!({
                "messages": [
                    {"role": "system"},
                    {"role": "system", "content": "Project context:\nProject: Onboarding\nStories collected: 1\nEmotional responses: hopeful (1)\n\nStories:\n- Day one: Met my buddy\n"}
                ]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion("People feel welcome.")))
            .expect(1)
            .mount(&mock_server)
            .await;

        let storage = SqliteStorage::new_in_memory().await.unwrap();
        let project = Project::new("Onboarding", "owner");
        storage.create_project(&project).await.unwrap();
        storage
            .create_story_submission(
                &Story::new(&project.id, "Day one", "Met my buddy").with_emotional_response("hopeful"),
                &[],
                &[],
            )
            .await
            .unwrap();

        let mut config = Config::default();
        config.llm = test_config(&mock_server.uri(), 5000);
        let state = AppState::new(config, storage, ClientCache::in_memory()).unwrap();

        let answer = state.ask(&project.id, "How do newcomers feel?").await.unwrap();
        assert_eq!(answer.response, "People feel welcome.");
    }

    #[tokio::test]
    async fn test_ask_unknown_project() {
        let storage = SqliteStorage::new_in_memory().await.unwrap();
        let state = AppState::new(Config::default(), storage, ClientCache::in_memory()).unwrap();

        let err = state.ask("missing", "Anything?").await.unwrap_err();
        assert!(matches!(err, AppError::Storage(_)));
    }
}
