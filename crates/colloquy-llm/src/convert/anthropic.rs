//! Conversion between conversation types and the Anthropic wire format

use std::sync::Arc;

use serde_json::{Map, Value};

use super::tool_result_content;
use crate::error::{ConvertError, UnsupportedBlock, UnsupportedBlocks};
use crate::protocol::anthropic::{
    AnthropicContentBlock, AnthropicInputSchema, AnthropicMessage, AnthropicResponse, AnthropicResponseBlock,
    AnthropicRole, AnthropicSystemBlock, AnthropicTool, IndexedBlock,
};
use crate::types::{Message, Part, ProviderKind, RawResponse, Response, Role, Tool};

// -- Outbound: conversation -> Anthropic wire format --

/// Split a conversation into the top-level system prompt and the turn list
///
/// System messages are lifted out in order; they may only hold text.
///
/// # Errors
///
/// Returns an error naming the message and part index when a part has no
/// wire representation or a tool call's stored input is not a JSON object.
pub fn convert_messages(
    messages: &[Message],
) -> Result<(Vec<AnthropicSystemBlock>, Vec<AnthropicMessage>), ConvertError> {
    let mut system = Vec::new();
    let mut turns = Vec::with_capacity(messages.len());

    for (message_index, message) in messages.iter().enumerate() {
        let role = match message.role {
            Role::System => {
                for (part_index, part) in message.parts.iter().enumerate() {
                    let Part::Text { text } = part else {
                        return Err(ConvertError::UnsupportedSystemPart {
                            message: message_index,
                            part: part_index,
                            kind: part.kind(),
                        });
                    };
                    system.push(AnthropicSystemBlock::Text { text: text.clone() });
                }
                continue;
            }
            Role::User => AnthropicRole::User,
            Role::Assistant => AnthropicRole::Assistant,
        };

        let content = message
            .parts
            .iter()
            .enumerate()
            .map(|(part_index, part)| convert_part(message_index, part_index, part))
            .collect::<Result<Vec<_>, _>>()?;

        turns.push(AnthropicMessage { role, content });
    }

    Ok((system, turns))
}

fn convert_part(message: usize, part: usize, value: &Part) -> Result<AnthropicContentBlock, ConvertError> {
    match value {
        Part::Text { text } => Ok(AnthropicContentBlock::Text { text: text.clone() }),
        Part::ToolCall { id, name, input } => {
            let input: Map<String, Value> =
                serde_json::from_str(input).map_err(|source| ConvertError::InvalidToolInput {
                    message,
                    part,
                    tool: name.clone(),
                    source,
                })?;

            Ok(AnthropicContentBlock::ToolUse {
                id: id.clone(),
                name: name.clone(),
                input,
            })
        }
        Part::ToolResult {
            tool_call_id,
            result,
            error,
            ..
        } => Ok(AnthropicContentBlock::ToolResult {
            tool_use_id: tool_call_id.clone(),
            content: tool_result_content(result, error.as_deref()),
            is_error: error.is_some().then_some(true),
        }),
    }
}

/// Convert tool descriptors into Anthropic tool definitions
///
/// A tool whose schema is null is sent as taking an empty object. A missing
/// or malformed `required` list is treated as empty.
///
/// # Errors
///
/// Returns an error if a non-null schema has no `properties` object.
pub fn convert_tools(tools: &[Arc<dyn Tool>]) -> Result<Vec<AnthropicTool>, ConvertError> {
    tools
        .iter()
        .map(|tool| {
            let schema = tool.schema();
            let description = tool.description();

            Ok(AnthropicTool {
                name: tool.name().to_owned(),
                description: (!description.is_empty()).then(|| description.to_owned()),
                input_schema: input_schema(tool.name(), &schema)?,
            })
        })
        .collect()
}

fn input_schema(tool: &str, schema: &Value) -> Result<AnthropicInputSchema, ConvertError> {
    if schema.is_null() {
        return Ok(AnthropicInputSchema {
            schema_type: "object",
            properties: None,
            required: Vec::new(),
        });
    }

    let Some(Value::Object(properties)) = schema.get("properties") else {
        return Err(ConvertError::InvalidSchemaProperties { tool: tool.to_owned() });
    };

    let required = schema
        .get("required")
        .and_then(Value::as_array)
        .map(|names| names.iter().filter_map(Value::as_str).map(str::to_owned).collect())
        .unwrap_or_default();

    Ok(AnthropicInputSchema {
        schema_type: "object",
        properties: Some(properties.clone()),
        required,
    })
}

// -- Inbound: Anthropic wire format -> Response --

/// Map a decoded response envelope to a conversation response
///
/// Text and tool-use blocks become parts. Every other recognized block is
/// listed in the returned [`UnsupportedBlocks`]; the response still holds
/// everything that could be represented.
pub fn decode_response(envelope: AnthropicResponse) -> (Response, Option<UnsupportedBlocks>) {
    let mut parts = Vec::with_capacity(envelope.content.len());
    let mut unsupported = Vec::new();

    for IndexedBlock { index, block } in &envelope.content {
        let index = *index;
        match block {
            AnthropicResponseBlock::Text(block) => parts.push(Part::text(block.text.clone())),
            AnthropicResponseBlock::ToolUse(block) => {
                parts.push(Part::tool_call(block.id.clone(), block.name.clone(), block.input.get()));
            }
            other => unsupported.push(UnsupportedBlock {
                index,
                kind: other.kind(),
            }),
        }
    }

    let response = Response::new(
        envelope.id.clone(),
        ProviderKind::Anthropic,
        parts,
        Some(RawResponse::Anthropic(Box::new(envelope))),
    );

    let unsupported = (!unsupported.is_empty()).then_some(UnsupportedBlocks { blocks: unsupported });
    (response, unsupported)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    struct FixedTool {
        name: &'static str,
        description: &'static str,
        schema: Value,
    }

    impl Tool for FixedTool {
        fn name(&self) -> &str {
            self.name
        }

        fn description(&self) -> &str {
            self.description
        }

        fn schema(&self) -> Value {
            self.schema.clone()
        }
    }

    fn tool(schema: Value) -> Arc<dyn Tool> {
        Arc::new(FixedTool {
            name: "get_weather",
            description: "Get the weather for a location",
            schema,
        })
    }

    #[test]
    fn system_messages_are_lifted_in_order() {
        let messages = vec![Message::system("a"), Message::system("b"), Message::user("c")];

        let (system, turns) = convert_messages(&messages).unwrap();

        assert_eq!(
            system,
            vec![
                AnthropicSystemBlock::Text { text: "a".to_owned() },
                AnthropicSystemBlock::Text { text: "b".to_owned() },
            ]
        );
        assert_eq!(turns.len(), 1);
        assert_eq!(turns[0].role, AnthropicRole::User);
    }

    #[test]
    fn tool_call_in_system_message_fails() {
        let messages = vec![
            Message::user("hi"),
            Message::new(
                Role::System,
                vec![Part::text("be brief"), Part::tool_call("toolu_1", "get_weather", "{}")],
            ),
        ];

        let err = convert_messages(&messages).unwrap_err();

        assert!(matches!(
            err,
            ConvertError::UnsupportedSystemPart {
                message: 1,
                part: 1,
                kind: "tool_call"
            }
        ));
    }

    #[test]
    fn tool_round_trip_maps_to_blocks() {
        let messages = vec![
            Message::user("weather in SF?"),
            Message::new(
                Role::Assistant,
                vec![
                    Part::text("Checking."),
                    Part::tool_call("toolu_1", "get_weather", r#"{"location":"SF"}"#),
                ],
            ),
            Message::new(
                Role::User,
                vec![
                    Part::tool_result("toolu_1", "get_weather", "sunny"),
                    Part::tool_error("toolu_2", "get_weather", "timed out"),
                ],
            ),
        ];

        let (_, turns) = convert_messages(&messages).unwrap();
        let wire = serde_json::to_value(&turns).unwrap();

        assert_eq!(
            wire[1],
            json!({
                "role": "assistant",
                "content": [
                    {"type": "text", "text": "Checking."},
                    {"type": "tool_use", "id": "toolu_1", "name": "get_weather", "input": {"location": "SF"}}
                ]
            })
        );
        assert_eq!(
            wire[2]["content"],
            json!([
                {"type": "tool_result", "tool_use_id": "toolu_1", "content": "sunny"},
                {"type": "tool_result", "tool_use_id": "toolu_2", "content": "timed out", "is_error": true}
            ])
        );
    }

    #[test]
    fn malformed_tool_input_names_the_tool() {
        let messages = vec![Message::new(
            Role::Assistant,
            vec![Part::tool_call("toolu_1", "get_weather", r#"{"location":"#)],
        )];

        let err = convert_messages(&messages).unwrap_err();

        assert!(err.to_string().starts_with(
            "[message 0, part 0] failed to parse tool call input JSON for tool 'get_weather'"
        ));
    }

    #[test]
    fn structured_tool_results_are_json_encoded() {
        assert_eq!(tool_result_content(&json!({"temp": 21}), None), r#"{"temp":21}"#);
        assert_eq!(tool_result_content(&Value::Null, None), "");
    }

    #[test]
    fn tools_keep_type_properties_and_required() {
        let tools = vec![tool(json!({
            "type": "object",
            "properties": {"location": {"type": "string"}},
            "required": ["location"],
            "additionalProperties": false
        }))];

        let wire = serde_json::to_value(convert_tools(&tools).unwrap()).unwrap();

        assert_eq!(
            wire,
            json!([{
                "name": "get_weather",
                "description": "Get the weather for a location",
                "input_schema": {
                    "type": "object",
                    "properties": {"location": {"type": "string"}},
                    "required": ["location"]
                }
            }])
        );
    }

    #[test]
    fn tools_tolerate_missing_required_and_null_schema() {
        let tools = vec![
            tool(json!({"type": "object", "properties": {}, "required": "nope"})),
            tool(Value::Null),
        ];

        let wire = serde_json::to_value(convert_tools(&tools).unwrap()).unwrap();

        assert_eq!(wire[0]["input_schema"], json!({"type": "object", "properties": {}}));
        assert_eq!(wire[1]["input_schema"], json!({"type": "object"}));
    }

    #[test]
    fn non_object_properties_fail() {
        let tools = vec![tool(json!({"type": "object", "properties": ["location"]}))];

        let err = convert_tools(&tools).unwrap_err();

        assert!(matches!(err, ConvertError::InvalidSchemaProperties { tool } if tool == "get_weather"));
    }

    #[test]
    fn schema_without_properties_fails() {
        for schema in [
            json!({"type": "object"}),
            json!({"type": "object", "properties": null}),
            json!("object"),
        ] {
            let err = convert_tools(&[tool(schema.clone())]).unwrap_err();

            assert!(
                matches!(err, ConvertError::InvalidSchemaProperties { .. }),
                "schema {schema} was accepted"
            );
        }
    }

    #[test]
    fn empty_tool_list_is_empty() {
        assert!(convert_tools(&[]).unwrap().is_empty());
    }

    #[test]
    fn decode_keeps_tool_input_bytes() {
        let body = r#"{
            "id": "msg_1",
            "type": "message",
            "role": "assistant",
            "model": "claude-sonnet-4-20250514",
            "content": [
                {"type": "text", "text": "Let me check."},
                {"type": "tool_use", "id": "toolu_1", "name": "get_weather", "input": {"location": "SF",  "units": "c"}}
            ],
            "stop_reason": "tool_use",
            "usage": {"input_tokens": 12, "output_tokens": 30}
        }"#;

        let envelope: AnthropicResponse = serde_json::from_str(body).unwrap();
        let (response, unsupported) = decode_response(envelope);

        assert!(unsupported.is_none());
        assert_eq!(response.id, "msg_1");
        assert_eq!(response.message.role, Role::Assistant);
        assert_eq!(
            response.message.parts,
            vec![
                Part::text("Let me check."),
                Part::tool_call("toolu_1", "get_weather", r#"{"location": "SF",  "units": "c"}"#),
            ]
        );
        assert_eq!(response.stop_reason(), Some("tool_use"));
        assert_eq!(response.usage().map(|u| u.output_tokens), Some(30));
    }

    #[test]
    fn decode_reports_unrepresentable_blocks_and_drops_unknown_ones() {
        let body = r#"{
            "id": "msg_2",
            "type": "message",
            "role": "assistant",
            "content": [
                {"type": "thinking", "thinking": "hmm", "signature": "sig"},
                {"type": "hologram", "payload": 1},
                {"type": "text", "text": "Answer."}
            ]
        }"#;

        let envelope: AnthropicResponse = serde_json::from_str(body).unwrap();
        let (response, unsupported) = decode_response(envelope);

        assert_eq!(response.text(), "Answer.");
        assert_eq!(
            unsupported.unwrap().blocks,
            vec![UnsupportedBlock {
                index: 0,
                kind: "thinking"
            }]
        );
    }

    #[test]
    fn unsupported_block_index_counts_dropped_blocks() {
        let body = r#"{
            "id": "msg_4",
            "type": "message",
            "role": "assistant",
            "content": [
                {"type": "hologram", "payload": 1},
                {"type": "thinking", "thinking": "hmm", "signature": "sig"},
                {"type": "text", "text": "Answer."},
                {"type": "redacted_thinking", "data": "xyz"}
            ]
        }"#;

        let envelope: AnthropicResponse = serde_json::from_str(body).unwrap();
        let (response, unsupported) = decode_response(envelope);

        assert_eq!(response.message.parts, vec![Part::text("Answer.")]);

        let unsupported = unsupported.unwrap();
        assert_eq!(
            unsupported.blocks,
            vec![
                UnsupportedBlock {
                    index: 1,
                    kind: "thinking"
                },
                UnsupportedBlock {
                    index: 3,
                    kind: "redacted_thinking"
                },
            ]
        );
        assert_eq!(
            unsupported.to_string(),
            "unsupported response content block types: [block 1] thinking; [block 3] redacted_thinking;"
        );
    }

    #[test]
    fn malformed_envelope_fails() {
        assert!(serde_json::from_str::<AnthropicResponse>(r#"{"id": 5}"#).is_err());
        assert!(serde_json::from_str::<AnthropicResponse>(r#"{"id": "msg", "content": [{"text": "x"}]}"#).is_err());
    }

    #[test]
    fn text_conversation_survives_conversion_and_decode() {
        let messages = vec![
            Message::system("You are terse."),
            Message::user("Hi"),
            Message::assistant("Hello"),
            Message::user("Bye"),
        ];

        let (system, turns) = convert_messages(&messages).unwrap();
        let users = turns.iter().filter(|m| m.role == AnthropicRole::User).count();
        let assistants = turns.iter().filter(|m| m.role == AnthropicRole::Assistant).count();
        assert_eq!((system.len(), users, assistants), (1, 2, 1));

        let body = json!({
            "id": "msg_3",
            "type": "message",
            "role": "assistant",
            "content": [{"type": "text", "text": "Goodbye"}]
        });
        let (response, unsupported) = decode_response(serde_json::from_str(&body.to_string()).unwrap());

        assert!(unsupported.is_none());
        assert_eq!(response.message, Message::assistant("Goodbye"));
    }
}
