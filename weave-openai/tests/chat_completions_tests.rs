//! Contract tests for the Chat Completions resource

use serde_json::json;
use weave_openai::{ChatCompletions, ChatCompletionsConfig, ChatCompletionsOutputs};
use weave_resource::{FieldValue, Resource, ResourceError};
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config(base_url: &str) -> ChatCompletionsConfig {
    ChatCompletionsConfig {
        api_key: FieldValue::literal("sk-test".to_string()),
        model: "gpt-4o".to_string(),
        messages: vec![json!({"role": "user", "content": "Hello"})],
        max_tokens: Some(100),
        temperature: Some(0.7),
        base_url: Some(base_url.to_string()),
    }
}

fn completion_body() -> serde_json::Value {
    json!({
        "id": "chatcmpl-123",
        "object": "chat.completion",
        "created": 1234567890,
        "model": "gpt-4o-2024-08-06",
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": "Hi there!"},
            "finish_reason": "stop"
        }],
        "usage": {"prompt_tokens": 12, "completion_tokens": 4, "total_tokens": 16}
    })
}

#[tokio::test]
async fn create_maps_response_onto_outputs() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer sk-test"))
        .and(body_partial_json(json!({
            "model": "gpt-4o",
            "max_tokens": 100,
            "temperature": 0.7
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion_body()))
        .expect(1)
        .mount(&server)
        .await;

    let resource = ChatCompletions::new("greeting", config(&server.uri()));
    let outputs = resource.on_create().await.unwrap();

    assert_eq!(outputs.id, "chatcmpl-123");
    assert_eq!(outputs.content, "Hi there!");
    assert_eq!(outputs.model, "gpt-4o-2024-08-06");
    assert_eq!(outputs.finish_reason.as_deref(), Some("stop"));
    assert_eq!(outputs.prompt_tokens, 12);
    assert_eq!(outputs.completion_tokens, 4);
}

#[tokio::test]
async fn create_maps_missing_usage_to_zero() {
    let server = MockServer::start().await;

    let mut body = completion_body();
    body.as_object_mut().unwrap().remove("usage");

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(&server)
        .await;

    let resource = ChatCompletions::new("greeting", config(&server.uri()));
    let outputs = resource.on_create().await.unwrap();

    assert_eq!(outputs.prompt_tokens, 0);
    assert_eq!(outputs.completion_tokens, 0);
}

#[tokio::test]
async fn create_surfaces_authentication_errors() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": {
                "message": "Incorrect API key provided",
                "type": "invalid_request_error",
                "code": "invalid_api_key"
            }
        })))
        .mount(&server)
        .await;

    let resource = ChatCompletions::new("greeting", config(&server.uri()));
    let err = resource.on_create().await.unwrap_err();

    assert!(matches!(err, ResourceError::Authentication(_)));
}

#[tokio::test]
async fn create_surfaces_rate_limits() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(429).set_body_json(json!({
            "error": {
                "message": "Rate limit reached",
                "type": "rate_limit_exceeded",
                "code": null
            }
        })))
        .mount(&server)
        .await;

    let resource = ChatCompletions::new("greeting", config(&server.uri()));
    let err = resource.on_create().await.unwrap_err();

    assert!(matches!(err, ResourceError::RateLimit { .. }));
}

#[tokio::test]
async fn validation_rejects_empty_messages() {
    let mut config = config("http://localhost:1");
    config.messages.clear();

    let resource = ChatCompletions::new("greeting", config);
    let err = resource.on_create().await.unwrap_err();

    assert!(matches!(err, ResourceError::Validation(_)));
}

#[tokio::test]
async fn validation_rejects_out_of_range_temperature() {
    let mut config = config("http://localhost:1");
    config.temperature = Some(3.5);

    let resource = ChatCompletions::new("greeting", config);
    let err = resource.on_create().await.unwrap_err();

    assert!(matches!(err, ResourceError::Validation(_)));
}

#[tokio::test]
async fn unresolved_api_key_fails_before_any_call() {
    let mut config = config("http://localhost:1");
    config.api_key = FieldValue::reference("api-secret.outputs.data");

    let resource = ChatCompletions::new("greeting", config);
    let err = resource.on_create().await.unwrap_err();

    assert!(matches!(err, ResourceError::UnresolvedReference(_)));
}

#[tokio::test]
async fn update_with_unchanged_config_returns_cached_outputs() {
    let server = MockServer::start().await;

    // No call expected when config is unchanged and outputs exist.
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion_body()))
        .expect(0)
        .mount(&server)
        .await;

    let cached = ChatCompletionsOutputs {
        id: "chatcmpl-cached".to_string(),
        content: "cached".to_string(),
        model: "gpt-4o".to_string(),
        finish_reason: Some("stop".to_string()),
        prompt_tokens: 1,
        completion_tokens: 1,
    };

    let config = config(&server.uri());
    let resource = ChatCompletions::new("greeting", config.clone()).with_outputs(cached.clone());
    let outputs = resource.on_update(&config).await.unwrap();

    assert_eq!(outputs, cached);
}

#[tokio::test]
async fn update_with_changed_config_regenerates() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion_body()))
        .expect(1)
        .mount(&server)
        .await;

    let mut previous = config(&server.uri());
    previous.temperature = Some(0.2);

    let resource = ChatCompletions::new("greeting", config(&server.uri()));
    let outputs = resource.on_update(&previous).await.unwrap();

    assert_eq!(outputs.id, "chatcmpl-123");
}

#[tokio::test]
async fn delete_is_a_no_op() {
    let resource = ChatCompletions::new("greeting", config("http://localhost:1"));
    resource.on_delete().await.unwrap();
}
