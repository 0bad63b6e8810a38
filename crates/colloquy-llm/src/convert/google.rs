//! Conversion between conversation types and the Gemini wire format

use std::sync::Arc;

use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::ConvertError;
use crate::protocol::google::{
    GoogleContent, GoogleFunctionCall, GoogleFunctionDeclaration, GoogleFunctionResponse, GooglePart, GoogleResponse,
    GoogleTool, GoogleUsageMetadata,
};
use crate::types::{Message, Part, ProviderKind, RawResponse, Response, Role, Tool, Usage};

/// Converted conversation: system instruction plus turn contents
#[derive(Debug, Clone)]
pub struct GoogleConversation {
    /// Concatenated system messages, if any
    pub system_instruction: Option<GoogleContent>,
    /// User and model turns
    pub contents: Vec<GoogleContent>,
}

// -- Outbound: conversation -> Gemini wire format --

/// Convert a conversation into Gemini contents
///
/// System messages are folded into a single system instruction. Assistant
/// turns take the `model` role. Tool results become `functionResponse`
/// parts wrapping the result under `content` (and the error text under
/// `error` for a failed invocation).
///
/// # Errors
///
/// Returns an error naming the message and part index for a non-text system
/// part, a tool call in a user message, a tool result in an assistant
/// message, or tool call arguments that are not valid JSON.
pub fn convert_messages(messages: &[Message]) -> Result<GoogleConversation, ConvertError> {
    let mut system_parts = Vec::new();
    let mut contents = Vec::with_capacity(messages.len());

    for (message_index, message) in messages.iter().enumerate() {
        let mut parts = Vec::with_capacity(message.parts.len());

        for (part_index, part) in message.parts.iter().enumerate() {
            match (message.role, part) {
                (Role::System, Part::Text { text }) => system_parts.push(GooglePart::text(text.clone())),
                (Role::System, other) => {
                    return Err(ConvertError::UnsupportedSystemPart {
                        message: message_index,
                        part: part_index,
                        kind: other.kind(),
                    });
                }
                (_, Part::Text { text }) => parts.push(GooglePart::text(text.clone())),
                (Role::Assistant, Part::ToolCall { id, name, input }) => {
                    let args: Value = serde_json::from_str(input).map_err(|source| ConvertError::InvalidToolInput {
                        message: message_index,
                        part: part_index,
                        tool: name.clone(),
                        source,
                    })?;

                    parts.push(GooglePart::function_call(GoogleFunctionCall {
                        id: (!id.is_empty()).then(|| id.clone()),
                        name: name.clone(),
                        args,
                    }));
                }
                (
                    Role::User,
                    Part::ToolResult {
                        tool_call_id,
                        name,
                        result,
                        error,
                    },
                ) => {
                    let mut response = Map::new();
                    response.insert("content".to_owned(), result.clone());
                    if let Some(error) = error {
                        response.insert("error".to_owned(), Value::String(error.clone()));
                    }

                    parts.push(GooglePart::function_response(GoogleFunctionResponse {
                        id: (!tool_call_id.is_empty()).then(|| tool_call_id.clone()),
                        name: name.clone(),
                        response: Value::Object(response),
                    }));
                }
                (role, other) => {
                    return Err(ConvertError::UnsupportedPart {
                        message: message_index,
                        part: part_index,
                        role,
                        kind: other.kind(),
                    });
                }
            }
        }

        let role = match message.role {
            Role::System => continue,
            Role::User => "user",
            Role::Assistant => "model",
        };

        // Gemini rejects contents without parts
        if parts.is_empty() {
            parts.push(GooglePart::text(""));
        }

        contents.push(GoogleContent {
            role: Some(role.to_owned()),
            parts,
        });
    }

    Ok(GoogleConversation {
        system_instruction: (!system_parts.is_empty()).then_some(GoogleContent {
            role: None,
            parts: system_parts,
        }),
        contents,
    })
}

/// Convert tool descriptors into one tool of function declarations
///
/// Schemas pass through unchanged; a null schema declares a function without
/// parameters. No tools yields an empty list.
pub fn convert_tools(tools: &[Arc<dyn Tool>]) -> Vec<GoogleTool> {
    if tools.is_empty() {
        return Vec::new();
    }

    let function_declarations = tools
        .iter()
        .map(|tool| {
            let schema = tool.schema();
            let description = tool.description();

            GoogleFunctionDeclaration {
                name: tool.name().to_owned(),
                description: (!description.is_empty()).then(|| description.to_owned()),
                parameters_json_schema: (!schema.is_null()).then_some(schema),
            }
        })
        .collect();

    vec![GoogleTool { function_declarations }]
}

// -- Inbound: Gemini wire format -> Response --

/// Map a `generateContent` body to a conversation response
///
/// Only the first candidate is read. Adjacent text fragments merge into one
/// text part, thought summaries are skipped, and each function call becomes
/// a tool call part whose arguments are re-encoded as compact JSON.
pub fn decode_response(body: GoogleResponse) -> Response {
    let mut parts = Vec::new();

    if let Some(content) = body.candidates.first().and_then(|candidate| candidate.content.as_ref()) {
        append_parts(&mut parts, &content.parts);
    }

    Response::new(
        body.response_id.clone().unwrap_or_default(),
        ProviderKind::Google,
        parts,
        Some(RawResponse::Google(Box::new(body))),
    )
}

/// Append wire parts to an accumulated part list
///
/// Text extends a trailing text part instead of starting a new one. Calls
/// without an ID are assigned `call-<uuid>`. Returns whether anything was
/// added.
pub(crate) fn append_parts(target: &mut Vec<Part>, parts: &[GooglePart]) -> bool {
    let mut added = false;

    for part in parts {
        if part.thought == Some(true) {
            continue;
        }

        if let Some(text) = part.text.as_deref().filter(|text| !text.is_empty()) {
            if let Some(Part::Text { text: last }) = target.last_mut() {
                last.push_str(text);
            } else {
                target.push(Part::text(text));
            }
            added = true;
        }

        if let Some(call) = &part.function_call {
            let id = call
                .id
                .clone()
                .filter(|id| !id.is_empty())
                .unwrap_or_else(|| format!("call-{}", Uuid::new_v4()));
            let input = if call.args.is_null() {
                "{}".to_owned()
            } else {
                call.args.to_string()
            };

            target.push(Part::tool_call(id, call.name.clone(), input));
            added = true;
        }
    }

    added
}

impl From<&GoogleUsageMetadata> for Usage {
    fn from(usage: &GoogleUsageMetadata) -> Self {
        Self {
            input_tokens: usage.prompt_token_count,
            output_tokens: usage.candidates_token_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    struct Weather;

    impl Tool for Weather {
        fn name(&self) -> &str {
            "get_weather"
        }

        fn description(&self) -> &str {
            "Look up the weather"
        }

        fn schema(&self) -> Value {
            json!({
                "type": "object",
                "properties": {"city": {"type": "string"}},
                "required": ["city"]
            })
        }
    }

    struct Clock;

    impl Tool for Clock {
        fn name(&self) -> &str {
            "now"
        }

        fn description(&self) -> &str {
            ""
        }

        fn schema(&self) -> Value {
            Value::Null
        }
    }

    #[test]
    fn system_messages_become_instruction_and_assistant_is_model() {
        let messages = vec![
            Message::system("Be brief."),
            Message::user("Hi"),
            Message::assistant("Hello"),
            Message::system("Use metric units."),
        ];

        let conversation = convert_messages(&messages).unwrap();

        assert_eq!(
            serde_json::to_value(&conversation.system_instruction).unwrap(),
            json!({"parts": [{"text": "Be brief."}, {"text": "Use metric units."}]})
        );
        assert_eq!(
            serde_json::to_value(&conversation.contents).unwrap(),
            json!([
                {"role": "user", "parts": [{"text": "Hi"}]},
                {"role": "model", "parts": [{"text": "Hello"}]}
            ])
        );
    }

    #[test]
    fn tool_round_trip_uses_function_parts() {
        let messages = vec![
            Message::user("weather in Paris?"),
            Message::new(
                Role::Assistant,
                vec![Part::tool_call("call_1", "get_weather", r#"{"city":"Paris"}"#)],
            ),
            Message::new(
                Role::User,
                vec![
                    Part::tool_result("call_1", "get_weather", json!({"temp": 21})),
                    Part::tool_error("call_2", "get_weather", "timeout"),
                ],
            ),
        ];

        let conversation = convert_messages(&messages).unwrap();

        assert!(conversation.system_instruction.is_none());
        assert_eq!(
            serde_json::to_value(&conversation.contents).unwrap(),
            json!([
                {"role": "user", "parts": [{"text": "weather in Paris?"}]},
                {"role": "model", "parts": [{
                    "functionCall": {"id": "call_1", "name": "get_weather", "args": {"city": "Paris"}}
                }]},
                {"role": "user", "parts": [
                    {"functionResponse": {
                        "id": "call_1",
                        "name": "get_weather",
                        "response": {"content": {"temp": 21}}
                    }},
                    {"functionResponse": {
                        "id": "call_2",
                        "name": "get_weather",
                        "response": {"content": null, "error": "timeout"}
                    }}
                ]}
            ])
        );
    }

    #[test]
    fn unsupported_parts_fail_with_position() {
        let system = vec![Message::new(
            Role::System,
            vec![Part::text("x"), Part::tool_call("c", "now", "{}")],
        )];
        let user = vec![Message::user("hi"), Message::new(Role::User, vec![Part::tool_call("c", "now", "{}")])];
        let assistant = vec![Message::new(
            Role::Assistant,
            vec![Part::tool_result("c", "now", json!("12:00"))],
        )];

        assert_eq!(
            convert_messages(&system).unwrap_err().to_string(),
            "[message 0, part 1] unsupported system message part type: tool_call"
        );
        assert_eq!(
            convert_messages(&user).unwrap_err().to_string(),
            "[message 1, part 0] unsupported user message part type: tool_call"
        );
        assert_eq!(
            convert_messages(&assistant).unwrap_err().to_string(),
            "[message 0, part 0] unsupported assistant message part type: tool_result"
        );
    }

    #[test]
    fn invalid_arguments_fail() {
        let messages = vec![Message::new(
            Role::Assistant,
            vec![Part::tool_call("call_1", "get_weather", "{not json")],
        )];

        assert!(matches!(
            convert_messages(&messages),
            Err(ConvertError::InvalidToolInput { message: 0, part: 0, .. })
        ));
    }

    #[test]
    fn empty_message_gets_placeholder_text() {
        let messages = vec![Message::new(Role::User, Vec::new())];

        let conversation = convert_messages(&messages).unwrap();

        assert_eq!(conversation.contents[0].parts, vec![GooglePart::text("")]);
    }

    #[test]
    fn tools_become_function_declarations() {
        let tools: Vec<Arc<dyn Tool>> = vec![Arc::new(Weather), Arc::new(Clock)];

        let wire = serde_json::to_value(convert_tools(&tools)).unwrap();

        assert_eq!(
            wire,
            json!([{
                "functionDeclarations": [
                    {
                        "name": "get_weather",
                        "description": "Look up the weather",
                        "parametersJsonSchema": {
                            "type": "object",
                            "properties": {"city": {"type": "string"}},
                            "required": ["city"]
                        }
                    },
                    {"name": "now"}
                ]
            }])
        );
        assert!(convert_tools(&[]).is_empty());
    }

    #[test]
    fn decode_merges_text_and_keeps_calls() {
        let body: GoogleResponse = serde_json::from_value(json!({
            "candidates": [{
                "content": {
                    "role": "model",
                    "parts": [
                        {"text": "thinking it over", "thought": true},
                        {"text": "Let me "},
                        {"text": "check."},
                        {"functionCall": {"name": "get_weather", "args": {"city": "Paris"}}, "thoughtSignature": "c2ln"},
                        {"functionCall": {"id": "fc_2", "name": "now"}}
                    ]
                },
                "finishReason": "STOP",
                "index": 0
            }],
            "usageMetadata": {"promptTokenCount": 9, "candidatesTokenCount": 4, "totalTokenCount": 13},
            "modelVersion": "gemini-2.5-flash",
            "responseId": "resp-1"
        }))
        .unwrap();

        let response = decode_response(body);

        assert_eq!(response.id, "resp-1");
        assert_eq!(response.provider, ProviderKind::Google);
        assert_eq!(response.message.parts.len(), 3);
        assert_eq!(response.message.parts[0], Part::text("Let me check."));

        let calls: Vec<_> = response.message.tool_calls().collect();
        assert!(calls[0].id.starts_with("call-"));
        assert_eq!(calls[0].name, "get_weather");
        assert_eq!(calls[0].input, r#"{"city":"Paris"}"#);
        assert_eq!(calls[1].id, "fc_2");
        assert_eq!(calls[1].input, "{}");

        assert_eq!(response.stop_reason(), Some("STOP"));
        assert_eq!(
            response.usage(),
            Some(Usage {
                input_tokens: 9,
                output_tokens: 4
            })
        );
    }

    #[test]
    fn decode_blocked_prompt_is_empty() {
        let body: GoogleResponse =
            serde_json::from_value(json!({"promptFeedback": {"blockReason": "SAFETY"}})).unwrap();

        let response = decode_response(body);

        assert!(response.message.parts.is_empty());
        assert_eq!(response.id, "");
        assert_eq!(response.stop_reason(), None);
    }
}
