//! Unit tests for assistant API types.
//!
//! Tests request/response wire shapes and builder patterns.

use super::*;
use serde_json::json;

#[test]
fn test_message_constructors() {
    assert_eq!(Message::system("s").role, MessageRole::System);
    assert_eq!(Message::user("u").role, MessageRole::User);
    assert_eq!(Message::assistant("a").content, "a");
}

#[test]
fn test_message_role_serialization() {
    let json = serde_json::to_value(Message::user("hi")).unwrap();
    assert_eq!(json, json!({"role": "user", "content": "hi"}));
}

#[test]
fn test_proxy_request_wire_shape() {
    let req = ProxyRequest::new("Summarise")
        .with_context("Project: Retro")
        .with_type(RequestType::SentimentAnalysis);
    let json = serde_json::to_value(&req).unwrap();
    assert_eq!(json["prompt"], "Summarise");
    assert_eq!(json["projectContext"], "Project: Retro");
    assert_eq!(json["requestType"], "sentimentAnalysis");
}

#[test]
fn test_proxy_request_defaults_on_deserialize() {
    let req: ProxyRequest = serde_json::from_value(json!({"prompt": "Hello"})).unwrap();
    assert_eq!(req.request_type, RequestType::General);
    assert!(req.project_context.is_none());

    let req: ProxyRequest =
        serde_json::from_value(json!({"prompt": "Q", "requestType": "storyQuestion"})).unwrap();
    assert_eq!(req.request_type, RequestType::StoryQuestion);
}

#[test]
fn test_proxy_request_omits_missing_context() {
    let json = serde_json::to_value(ProxyRequest::new("x")).unwrap();
    assert!(json.get("projectContext").is_none());
}

#[test]
fn test_chat_completion_first_content() {
    let resp: ChatCompletionResponse = serde_json::from_value(json!({
        "choices": [{"message": {"content": "  Hello there "}, "finish_reason": "stop"}],
        "model": "gpt-4o-mini"
    }))
    .unwrap();
    assert_eq!(resp.first_content(), Some("Hello there"));

    let empty: ChatCompletionResponse = serde_json::from_value(json!({"choices": []})).unwrap();
    assert_eq!(empty.first_content(), None);
}

#[test]
fn test_upstream_error_body() {
    let body: UpstreamErrorBody = serde_json::from_value(json!({
        "error": {"message": "Rate limit", "type": "requests", "code": "rate_limit_exceeded"}
    }))
    .unwrap();
    assert_eq!(body.error.message, "Rate limit");
    assert_eq!(body.error.code.as_deref(), Some("rate_limit_exceeded"));
}

#[test]
fn test_every_code_has_user_message() {
    let codes = [
        ErrorCode::BadRequest,
        ErrorCode::ServerError,
        ErrorCode::OpenaiError,
        ErrorCode::InvalidJson,
        ErrorCode::ApiKeyMissing,
        ErrorCode::InvalidApiKey,
        ErrorCode::Timeout,
        ErrorCode::RateLimit,
        ErrorCode::UnknownError,
    ];
    for code in codes {
        assert!(!user_message(code).is_empty());
    }
    assert!(user_message(ErrorCode::Timeout).contains("try again"));
}
