// HTTP-level tests for the Claude client against a local mock server.

use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::json;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use ai_client::Claude;

#[derive(Debug, Deserialize, JsonSchema)]
struct TopicAnalysis {
    topic: String,
    keywords: Vec<String>,
}

#[tokio::test]
async fn extract_returns_forced_tool_input() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/messages"))
        .and(header("x-api-key", "sk-ant-test"))
        .and(header("anthropic-version", "2023-06-01"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "content": [{
                "type": "tool_use",
                "id": "toolu_01",
                "name": "structured_response",
                "input": {
                    "topic": "rust async runtimes",
                    "keywords": ["tokio", "scheduling"]
                }
            }],
            "stop_reason": "tool_use"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let claude = Claude::new("sk-ant-test", "claude-sonnet-4-20250514").with_base_url(server.uri());

    let analysis: TopicAnalysis = claude
        .extract("You analyze posts.", "Analyze this post.")
        .await
        .expect("extraction should succeed");

    assert_eq!(analysis.topic, "rust async runtimes");
    assert_eq!(analysis.keywords, vec!["tokio", "scheduling"]);
}

#[tokio::test]
async fn chat_completion_concatenates_text_blocks() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/messages"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "content": [
                {"type": "text", "text": "Hello, "},
                {"type": "text", "text": "world."}
            ],
            "stop_reason": "end_turn"
        })))
        .mount(&server)
        .await;

    let claude = Claude::new("sk-ant-test", "claude-sonnet-4-20250514").with_base_url(server.uri());

    let text = claude
        .chat_completion("You are terse.", "Say hello.")
        .await
        .expect("chat should succeed");

    assert_eq!(text, "Hello, world.");
}

#[tokio::test]
async fn api_error_status_surfaces_body() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/messages"))
        .respond_with(
            ResponseTemplate::new(429).set_body_string("{\"error\":\"rate_limited\"}"),
        )
        .mount(&server)
        .await;

    let claude = Claude::new("sk-ant-test", "claude-sonnet-4-20250514").with_base_url(server.uri());

    let err = claude
        .chat_completion("sys", "user")
        .await
        .expect_err("429 should error");

    let msg = err.to_string();
    assert!(msg.contains("429"), "error should carry status: {msg}");
    assert!(msg.contains("rate_limited"), "error should carry body: {msg}");
}
