mod harness;

use std::sync::Arc;

use axum::http::StatusCode;
use colloquy_config::ProviderType;
use colloquy_llm::{LlmError, Message, Part, Provider, RequestContext, Response, StreamError, Tool, Usage};
use harness::mock_provider::{MockProvider, Reply};
use harness::provider_config;
use serde_json::json;

struct Weather;

impl Tool for Weather {
    fn name(&self) -> &str {
        "get_weather"
    }

    fn description(&self) -> &str {
        "Get current weather"
    }

    fn schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {"location": {"type": "string"}},
            "required": ["location"]
        })
    }
}

fn provider(mock: &MockProvider) -> Arc<dyn Provider> {
    let config = provider_config(ProviderType::Openai, &mock.base_url());
    let tools: Vec<Arc<dyn Tool>> = vec![Arc::new(Weather)];
    colloquy_llm::from_config("gpt", &config, tools).unwrap()
}

fn chunk(delta: &serde_json::Value, finish_reason: Option<&str>) -> String {
    let data = json!({
        "id": "chatcmpl-stream",
        "object": "chat.completion.chunk",
        "created": 1_700_000_000,
        "model": "gpt-4o",
        "choices": [{"index": 0, "delta": delta, "finish_reason": finish_reason}]
    });
    format!("data: {data}\n\n")
}

#[tokio::test]
async fn generate_decodes_tool_calls() {
    let mock = MockProvider::start(Reply::Json(json!({
        "id": "chatcmpl-1",
        "object": "chat.completion",
        "created": 1_700_000_000,
        "model": "gpt-4o",
        "choices": [{
            "index": 0,
            "message": {
                "role": "assistant",
                "content": null,
                "tool_calls": [{
                    "id": "call_1",
                    "type": "function",
                    "function": {"name": "get_weather", "arguments": "{\"location\":\"San Francisco\"}"}
                }]
            },
            "finish_reason": "tool_calls"
        }],
        "usage": {"prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15}
    })))
    .await
    .unwrap();

    let response = provider(&mock)
        .generate(&RequestContext::new(), &[Message::user("Weather?")])
        .await
        .unwrap();

    assert_eq!(
        response.message.parts,
        vec![Part::tool_call("call_1", "get_weather", r#"{"location":"San Francisco"}"#)]
    );
    assert_eq!(response.stop_reason(), Some("tool_calls"));
    assert_eq!(
        response.usage(),
        Some(Usage {
            input_tokens: 10,
            output_tokens: 5
        })
    );

    let request = mock.single_request();
    assert_eq!(request.path, "/v1/chat/completions");
    assert_eq!(request.header("authorization"), Some("Bearer test-key"));
    assert_eq!(request.body["model"], "gpt-4o");
    assert_eq!(request.body["tools"][0]["function"]["name"], "get_weather");
    assert_eq!(request.body["tools"][0]["function"]["parameters"]["required"], json!(["location"]));
}

#[tokio::test]
async fn conversation_with_tool_results_is_sent_in_order() {
    let mock = MockProvider::start(Reply::Json(json!({
        "id": "chatcmpl-2",
        "choices": [{"index": 0, "message": {"role": "assistant", "content": "Sunny."}, "finish_reason": "stop"}]
    })))
    .await
    .unwrap();

    let messages = [
        Message::user("Weather?"),
        Message::new(
            colloquy_llm::Role::Assistant,
            vec![Part::tool_call("call_1", "get_weather", r#"{"location":"SF"}"#)],
        ),
        Message::new(
            colloquy_llm::Role::User,
            vec![Part::tool_result("call_1", "get_weather", json!("sunny"))],
        ),
    ];

    let response = provider(&mock).generate(&RequestContext::new(), &messages).await.unwrap();
    assert_eq!(response.text(), "Sunny.");

    let sent = mock.single_request().body["messages"].clone();
    let roles: Vec<_> = sent
        .as_array()
        .unwrap()
        .iter()
        .map(|message| message["role"].as_str().unwrap().to_owned())
        .collect();

    assert_eq!(roles, vec!["user", "assistant", "tool"]);
    assert_eq!(sent[2]["tool_call_id"], "call_1");
    assert_eq!(sent[2]["content"], "sunny");
}

#[tokio::test]
async fn stream_accumulates_text_and_usage() {
    let usage = json!({
        "id": "chatcmpl-stream",
        "choices": [],
        "usage": {"prompt_tokens": 7, "completion_tokens": 3, "total_tokens": 10}
    });
    let events = format!(
        "{}{}{}{}data: {usage}\n\ndata: [DONE]\n\n",
        chunk(&json!({"role": "assistant", "content": ""}), None),
        chunk(&json!({"content": "Hello "}), None),
        chunk(&json!({"content": "there"}), None),
        chunk(&json!({}), Some("stop")),
    );
    let mock = MockProvider::start(Reply::Events(events)).await.unwrap();

    let mut texts = Vec::new();
    let mut on_event = |event: Result<&Response, &StreamError>| {
        texts.push(event.map(Response::text).unwrap_or_default());
        true
    };

    let response = provider(&mock)
        .generate_stream(&RequestContext::new(), &[Message::user("Hi")], Some(&mut on_event))
        .await
        .unwrap();

    assert_eq!(texts, vec!["Hello ", "Hello there", "Hello there"]);
    assert_eq!(response.id, "chatcmpl-stream");
    assert_eq!(response.text(), "Hello there");
    assert_eq!(
        response.usage(),
        Some(Usage {
            input_tokens: 7,
            output_tokens: 3
        })
    );

    let request = mock.single_request();
    assert_eq!(request.body["stream"], true);
    assert_eq!(request.body["stream_options"], json!({"include_usage": true}));
}

#[tokio::test]
async fn stream_merges_tool_call_fragments() {
    let events = format!(
        "{}{}{}data: [DONE]\n\n",
        chunk(
            &json!({"tool_calls": [{"index": 0, "id": "call_s", "type": "function", "function": {"name": "get_weather"}}]}),
            None
        ),
        chunk(
            &json!({"tool_calls": [{"index": 0, "function": {"arguments": "{\"location\":\"Oslo\"}"}}]}),
            None
        ),
        chunk(&json!({}), Some("tool_calls")),
    );
    let mock = MockProvider::start(Reply::Events(events)).await.unwrap();

    let response = provider(&mock)
        .generate_stream(&RequestContext::new(), &[Message::user("Weather?")], None)
        .await
        .unwrap();

    assert_eq!(
        response.message.parts,
        vec![Part::tool_call("call_s", "get_weather", r#"{"location":"Oslo"}"#)]
    );
    assert_eq!(response.stop_reason(), Some("tool_calls"));
}

#[tokio::test]
async fn server_error_is_reported() {
    let mock = MockProvider::start(Reply::Status(
        StatusCode::INTERNAL_SERVER_ERROR,
        "mock server intentional failure".to_owned(),
    ))
    .await
    .unwrap();

    let err = provider(&mock)
        .generate_stream(&RequestContext::new(), &[Message::user("Hi")], None)
        .await
        .unwrap_err();

    assert!(matches!(err, LlmError::Status { status, .. } if status == StatusCode::INTERNAL_SERVER_ERROR));
    assert_eq!(
        err.to_string(),
        "openai: request failed with status 500: mock server intentional failure"
    );
}
