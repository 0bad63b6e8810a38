//! Conversion between conversation types and the `OpenAI` wire format

use std::sync::Arc;

use serde_json::{Map, Value};

use super::tool_result_content;
use crate::error::ConvertError;
use crate::protocol::openai::{
    OpenAiFunction, OpenAiFunctionCall, OpenAiMessage, OpenAiResponse, OpenAiRole, OpenAiTool, OpenAiToolCall,
    OpenAiUsage,
};
use crate::types::{Message, Part, ProviderKind, RawResponse, Response, Role, Tool, Usage};

/// Schema keys forwarded as function parameters
const PARAMETER_KEYS: [&str; 4] = ["type", "properties", "required", "description"];

// -- Outbound: conversation -> OpenAI wire format --

/// Convert a conversation into chat completion messages
///
/// Each message's text parts are concatenated into one wire message.
/// Assistant tool calls ride on the assistant message; tool results become
/// `tool` messages placed right after their turn's own message.
///
/// # Errors
///
/// Returns an error naming the message and part index for a non-text system
/// part, a tool call in a user message, or tool call arguments that are not
/// valid JSON.
pub fn convert_messages(messages: &[Message]) -> Result<Vec<OpenAiMessage>, ConvertError> {
    let mut out = Vec::with_capacity(messages.len());

    for (message_index, message) in messages.iter().enumerate() {
        let mut content = String::new();
        let mut tool_calls = Vec::new();
        let mut results = Vec::new();

        for (part_index, part) in message.parts.iter().enumerate() {
            match (message.role, part) {
                (_, Part::Text { text }) => content.push_str(text),
                (Role::System, other) => {
                    return Err(ConvertError::UnsupportedSystemPart {
                        message: message_index,
                        part: part_index,
                        kind: other.kind(),
                    });
                }
                (Role::Assistant, Part::ToolCall { id, name, input }) => {
                    serde_json::from_str::<Value>(input).map_err(|source| ConvertError::InvalidToolInput {
                        message: message_index,
                        part: part_index,
                        tool: name.clone(),
                        source,
                    })?;

                    tool_calls.push(OpenAiToolCall {
                        id: id.clone(),
                        tool_type: "function".to_owned(),
                        function: OpenAiFunctionCall {
                            name: name.clone(),
                            arguments: input.clone(),
                        },
                    });
                }
                (role @ Role::User, other @ Part::ToolCall { .. }) => {
                    return Err(ConvertError::UnsupportedPart {
                        message: message_index,
                        part: part_index,
                        role,
                        kind: other.kind(),
                    });
                }
                (
                    _,
                    Part::ToolResult {
                        tool_call_id,
                        result,
                        error,
                        ..
                    },
                ) => results.push(OpenAiMessage {
                    role: OpenAiRole::Tool,
                    content: Some(tool_result_content(result, error.as_deref())),
                    tool_calls: Vec::new(),
                    tool_call_id: Some(tool_call_id.clone()),
                }),
            }
        }

        let role = match message.role {
            Role::System => OpenAiRole::System,
            Role::User => OpenAiRole::User,
            Role::Assistant => OpenAiRole::Assistant,
        };

        // A turn made only of tool results has no message of its own
        if !content.is_empty() || !tool_calls.is_empty() || results.is_empty() {
            out.push(OpenAiMessage {
                role,
                content: (!content.is_empty() || tool_calls.is_empty()).then_some(content),
                tool_calls,
                tool_call_id: None,
            });
        }

        out.append(&mut results);
    }

    Ok(out)
}

/// Convert tool descriptors into function definitions
///
/// # Errors
///
/// Returns an error if a tool's schema is null.
pub fn convert_tools(tools: &[Arc<dyn Tool>]) -> Result<Vec<OpenAiTool>, ConvertError> {
    tools
        .iter()
        .map(|tool| {
            let schema = tool.schema();
            if schema.is_null() {
                return Err(ConvertError::MissingSchema {
                    tool: tool.name().to_owned(),
                });
            }

            let parameters: Map<String, Value> = PARAMETER_KEYS
                .iter()
                .filter_map(|key| schema.get(*key).map(|value| ((*key).to_owned(), value.clone())))
                .collect();

            let description = tool.description();

            Ok(OpenAiTool {
                tool_type: "function".to_owned(),
                function: OpenAiFunction {
                    name: tool.name().to_owned(),
                    description: (!description.is_empty()).then(|| description.to_owned()),
                    parameters: Value::Object(parameters),
                },
            })
        })
        .collect()
}

// -- Inbound: OpenAI wire format -> Response --

/// Map a chat completion body to a conversation response
///
/// Only the first choice is read: its text (when non-empty) followed by one
/// tool call part per function call, arguments kept verbatim.
pub fn decode_response(body: OpenAiResponse) -> Response {
    let mut parts = Vec::new();

    if let Some(choice) = body.choices.first() {
        if let Some(text) = choice.message.content.as_deref().filter(|text| !text.is_empty()) {
            parts.push(Part::text(text));
        }

        parts.extend(
            choice
                .message
                .tool_calls
                .iter()
                .filter(|call| call.tool_type == "function")
                .map(|call| Part::tool_call(call.id.clone(), call.function.name.clone(), call.function.arguments.clone())),
        );
    }

    Response::new(
        body.id.clone(),
        ProviderKind::OpenAi,
        parts,
        Some(RawResponse::OpenAi(Box::new(body))),
    )
}

impl From<&OpenAiUsage> for Usage {
    fn from(usage: &OpenAiUsage) -> Self {
        Self {
            input_tokens: usage.prompt_tokens,
            output_tokens: usage.completion_tokens,
        }
    }
}
