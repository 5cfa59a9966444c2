//! Model backend adapters against mock servers.

use flowsmith_generation::{
    BackendKind, FlowGenerator, GenerationOutput, GenerationRequest, LlmClient, ModelConfig,
};
use flowsmith_repair::{RepairCollaborator, RepairEngine};
use flowsmith_types::{serialize, FlowsmithError, Node, NodeId, ValidationError};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config(kind: BackendKind, server: &MockServer) -> ModelConfig {
    ModelConfig {
        kind,
        endpoint: Some(format!("{}/v1", server.uri())),
        model: "test-model".into(),
        api_key: Some("test-key".into()),
        temperature: Some(0.0),
        max_tokens: Some(512),
        timeout: Duration::from_secs(5),
    }
}

#[tokio::test]
async fn test_openai_compatible_generation_returns_text() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer test-key"))
        .and(body_partial_json(json!({"model": "test-model", "max_tokens": 512})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"content": "  Node Number,Node Type\n"}, "finish_reason": "stop"}]
        })))
        .mount(&server)
        .await;

    let client = LlmClient::new(config(BackendKind::OpenAi, &server)).unwrap();
    let output = client
        .generate(&GenerationRequest::new(json!({"purpose": "faq"})), &[])
        .await
        .unwrap();

    assert_eq!(output, GenerationOutput::Text("Node Number,Node Type".into()));
}

#[tokio::test]
async fn test_anthropic_text_parts_are_joined() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .and(header("x-api-key", "test-key"))
        .and(header("anthropic-version", "2023-06-01"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "content": [
                {"type": "text", "text": "first"},
                {"type": "tool_use", "id": "t1"},
                {"type": "text", "text": "second"}
            ],
            "stop_reason": "end_turn"
        })))
        .mount(&server)
        .await;

    let client = LlmClient::new(config(BackendKind::Anthropic, &server)).unwrap();
    assert_eq!(client.complete("system", "prompt").await.unwrap(), "first\nsecond");
}

#[tokio::test]
async fn test_ollama_needs_no_key() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .and(body_partial_json(json!({"stream": false, "options": {"num_predict": 512}})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"response": "ok", "done": true})))
        .mount(&server)
        .await;

    let client = LlmClient::new(ModelConfig {
        kind: BackendKind::Ollama,
        endpoint: Some(server.uri()),
        api_key: None,
        ..config(BackendKind::Ollama, &server)
    })
    .unwrap();
    assert_eq!(client.complete("system", "prompt").await.unwrap(), "ok");
}

#[tokio::test]
async fn test_rate_limit_surfaces_and_later_calls_fail_fast() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "45"))
        .expect(1)
        .mount(&server)
        .await;

    let client = LlmClient::new(config(BackendKind::OpenAi, &server)).unwrap();
    let first = client.complete("system", "prompt").await.unwrap_err();
    assert_eq!(first.retry_after(), Some(Duration::from_secs(45)));

    let second = client.complete("system", "prompt").await.unwrap_err();
    assert!(matches!(second, FlowsmithError::RateLimited { retry_after_secs } if retry_after_secs <= 45));
}

#[tokio::test]
async fn test_rejected_key_is_an_auth_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(401).set_body_string("invalid api key"))
        .mount(&server)
        .await;

    let client = LlmClient::new(config(BackendKind::OpenAi, &server)).unwrap();
    match client.complete("system", "prompt").await.unwrap_err() {
        FlowsmithError::Auth(message) => assert!(message.contains("invalid api key")),
        other => panic!("expected auth failure, got {:?}", other),
    }
}

#[tokio::test]
async fn test_client_drives_row_level_repair() {
    let nodes: Vec<Node> = (1u32..=6)
        .map(|id| Node::decision(id, format!("Step {}", id)).with_message("ok"))
        .collect();
    let document = serialize(&nodes);
    let fixed = serialize(&[Node::decision(3, "Step 3").with_message("fixed")]).to_text();

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"content": format!("```csv\n{}```", fixed)}}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client: Arc<dyn RepairCollaborator> =
        Arc::new(LlmClient::new(config(BackendKind::OpenAi, &server)).unwrap());
    let errors = vec![ValidationError::for_node(3, "content", "Message", "too vague")];
    let outcome = RepairEngine::new(client).refine(&document, &errors, 1, &[]).await.unwrap();

    assert!(outcome.still_broken.is_empty());
    assert_eq!(outcome.fixes_made.len(), 1);
    assert_eq!(outcome.fixes_made[0].node_identifier, NodeId::new(3));
    assert_eq!(outcome.document.len(), 6);
    assert_eq!(outcome.document.rows()[0], document.rows()[0]);
}
