//! `OpenAI` chat completion streaming state machine

use std::collections::BTreeMap;

use super::sse::SseFrame;
use super::{Flow, Notifier, StreamMachine, parse};
use crate::error::StreamError;
use crate::protocol::openai::{OpenAiStreamChunk, OpenAiStreamSummary, OpenAiStreamToolCall};
use crate::types::{Part, ProviderKind, RawResponse, Response};

/// Sentinel payload ending the stream
const DONE: &str = "[DONE]";

#[derive(Debug, Default)]
struct PendingCall {
    id: String,
    name: String,
    arguments: String,
}

/// Accumulates `OpenAI` chat completion chunks into a [`Response`]
#[derive(Debug, Default)]
pub struct OpenAiStream {
    summary: Option<OpenAiStreamSummary>,
    text: String,
    calls: BTreeMap<u32, PendingCall>,
    stopped: bool,
}

impl OpenAiStream {
    /// Empty state, awaiting the first chunk
    pub fn new() -> Self {
        Self::default()
    }

    fn id(&self) -> String {
        self.summary.as_ref().map(|s| s.id.clone()).unwrap_or_default()
    }

    fn text_part(&self) -> Option<Part> {
        (!self.text.is_empty()).then(|| Part::text(self.text.clone()))
    }

    fn parts(&self) -> Vec<Part> {
        let calls = self.calls.values().map(|call| {
            let arguments = if call.arguments.is_empty() {
                "{}".to_owned()
            } else {
                call.arguments.clone()
            };
            Part::tool_call(call.id.clone(), call.name.clone(), arguments)
        });

        self.text_part().into_iter().chain(calls).collect()
    }

    fn merge_call(&mut self, fragment: OpenAiStreamToolCall) {
        let call = self.calls.entry(fragment.index).or_default();

        if let Some(id) = fragment.id.filter(|id| !id.is_empty()) {
            call.id = id;
        }
        if let Some(function) = fragment.function {
            if let Some(name) = function.name.filter(|name| !name.is_empty()) {
                call.name = name;
            }
            if let Some(arguments) = function.arguments {
                call.arguments.push_str(&arguments);
            }
        }
    }

    fn apply_chunk(&mut self, chunk: OpenAiStreamChunk, notify: &mut Notifier<'_>) -> Flow {
        let summary = self.summary.get_or_insert_with(OpenAiStreamSummary::default);
        if summary.id.is_empty() {
            summary.id = chunk.id;
        }
        if summary.model.is_empty() {
            summary.model = chunk.model;
        }
        if chunk.usage.is_some() {
            summary.usage = chunk.usage;
        }

        let Some(choice) = chunk.choices.into_iter().next() else {
            return Flow::Continue;
        };

        if choice.finish_reason.is_some() {
            summary.finish_reason = choice.finish_reason;
        }

        for fragment in choice.delta.tool_calls {
            self.merge_call(fragment);
        }

        match choice.delta.content {
            Some(content) if !content.is_empty() => {
                self.text.push_str(&content);

                if notify.is_active() {
                    let snapshot = Response::new(self.id(), ProviderKind::OpenAi, self.text_part().into_iter().collect(), None);
                    if !notify.snapshot(&snapshot) {
                        self.stopped = true;
                        return Flow::Stop;
                    }
                }

                Flow::Continue
            }
            _ => Flow::Continue,
        }
    }
}

impl StreamMachine for OpenAiStream {
    fn on_frame(&mut self, frame: &SseFrame, notify: &mut Notifier<'_>) -> Result<Flow, StreamError> {
        let data = frame.data.trim();

        if data == DONE {
            self.summary.as_ref().ok_or(StreamError::NoMessage)?;
            if notify.is_active() {
                notify.snapshot(&Response::new(self.id(), ProviderKind::OpenAi, self.parts(), None));
            }
            return Ok(Flow::Continue);
        }

        let chunk: OpenAiStreamChunk = parse("chat.completion.chunk", data)?;

        if let Some(error) = chunk.error {
            let err = StreamError::Upstream {
                kind: error.error_type.unwrap_or_default(),
                message: error.message,
            };
            notify.error(&err);
            return Err(err);
        }

        Ok(self.apply_chunk(chunk, notify))
    }

    fn finish(self) -> Result<Response, StreamError> {
        let summary = self.summary.as_ref().ok_or(StreamError::NoMessage)?;

        // An early stop keeps only the text; tool arguments may be incomplete
        let parts = if self.stopped {
            self.text_part().into_iter().collect()
        } else {
            self.parts()
        };

        Ok(Response::new(
            summary.id.clone(),
            ProviderKind::OpenAi,
            parts,
            Some(RawResponse::OpenAiStream(Box::new(summary.clone()))),
        ))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tokio_util::sync::CancellationToken;

    use super::*;
    use crate::stream::drive;
    use crate::stream::test_support::body;
    use crate::types::Usage;

    fn chunk(delta: &serde_json::Value, finish_reason: Option<&str>) -> String {
        let data = json!({
            "id": "chatcmpl-1",
            "object": "chat.completion.chunk",
            "created": 1,
            "model": "gpt-4o",
            "choices": [{"index": 0, "delta": delta, "finish_reason": finish_reason}]
        });
        format!("data: {data}\n\n")
    }

    fn text(content: &str) -> String {
        chunk(&json!({"content": content}), None)
    }

    const DONE_FRAME: &str = "data: [DONE]\n\n";

    async fn run(input: &str) -> Result<Response, StreamError> {
        drive(body(&[input]), &CancellationToken::new(), OpenAiStream::new(), None).await
    }

    #[tokio::test]
    async fn text_chunks_accumulate() {
        let input = format!(
            "{}{}{}{}{DONE_FRAME}",
            chunk(&json!({"role": "assistant", "content": ""}), None),
            text("Hello, "),
            text("world!"),
            chunk(&json!({}), Some("stop")),
        );

        let response = run(&input).await.unwrap();

        assert_eq!(response.id, "chatcmpl-1");
        assert_eq!(response.message.parts, vec![Part::text("Hello, world!")]);
        assert_eq!(response.stop_reason(), Some("stop"));
    }

    #[tokio::test]
    async fn tool_calls_merge_by_index() {
        let input = format!(
            "{}{}{}{}{}",
            chunk(
                &json!({"tool_calls": [{"index": 0, "id": "call_1", "type": "function", "function": {"name": "get_weather", "arguments": ""}}]}),
                None
            ),
            chunk(&json!({"tool_calls": [{"index": 0, "function": {"arguments": "{\"locat"}}]}), None),
            chunk(
                &json!({"tool_calls": [{"index": 1, "id": "call_2", "function": {"name": "get_time"}}]}),
                None
            ),
            chunk(&json!({"tool_calls": [{"index": 0, "function": {"arguments": "ion\": \"SF\"}"}}]}), Some("tool_calls")),
            DONE_FRAME,
        );

        let response = run(&input).await.unwrap();

        assert_eq!(
            response.message.parts,
            vec![
                Part::tool_call("call_1", "get_weather", r#"{"location": "SF"}"#),
                Part::tool_call("call_2", "get_time", "{}"),
            ]
        );
    }

    #[tokio::test]
    async fn usage_chunk_is_kept() {
        let usage = json!({
            "id": "chatcmpl-1",
            "choices": [],
            "usage": {"prompt_tokens": 9, "completion_tokens": 3, "total_tokens": 12}
        });
        let input = format!("{}data: {usage}\n\n{DONE_FRAME}", text("Hi"));

        let response = run(&input).await.unwrap();

        assert_eq!(
            response.usage(),
            Some(Usage {
                input_tokens: 9,
                output_tokens: 3
            })
        );
    }

    #[tokio::test]
    async fn callback_stop_returns_text_so_far() {
        let input = format!("{}{}{}{DONE_FRAME}", text("a"), text("b"), text("c"));

        let mut seen = Vec::new();
        let mut on_event = |event: Result<&Response, &StreamError>| {
            seen.push(event.map(Response::text).unwrap_or_default());
            seen.len() < 2
        };

        let response = drive(
            body(&[&input]),
            &CancellationToken::new(),
            OpenAiStream::new(),
            Some(&mut on_event),
        )
        .await
        .unwrap();

        assert_eq!(seen, vec!["a", "ab"]);
        assert_eq!(response.text(), "ab");
    }

    #[tokio::test]
    async fn done_sends_final_notification() {
        let input = format!("{}{DONE_FRAME}", text("Hi"));

        let mut seen = 0;
        let mut on_event = |_: Result<&Response, &StreamError>| {
            seen += 1;
            true
        };

        drive(
            body(&[&input]),
            &CancellationToken::new(),
            OpenAiStream::new(),
            Some(&mut on_event),
        )
        .await
        .unwrap();

        assert_eq!(seen, 2);
    }

    #[tokio::test]
    async fn error_payload_fails() {
        let input = format!(
            "{}data: {}\n\n",
            text("partial"),
            json!({"error": {"message": "Rate limit reached", "type": "rate_limit_error"}})
        );

        let err = run(&input).await.unwrap_err();

        assert_eq!(err.to_string(), "stream error: Rate limit reached");
    }

    #[tokio::test]
    async fn malformed_chunk_fails() {
        let err = run("data: {\"id\": \n\n").await.unwrap_err();

        assert!(matches!(err, StreamError::MalformedEvent { .. }));
    }

    #[tokio::test]
    async fn stream_without_chunks_fails() {
        assert!(matches!(run(DONE_FRAME).await, Err(StreamError::NoMessage)));
        assert!(matches!(run("").await, Err(StreamError::NoMessage)));
    }
}
