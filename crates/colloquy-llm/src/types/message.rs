use serde::{Deserialize, Serialize};

/// Role of a message participant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System instruction
    System,
    /// User turn
    User,
    /// Assistant turn
    Assistant,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::System => f.write_str("system"),
            Self::User => f.write_str("user"),
            Self::Assistant => f.write_str("assistant"),
        }
    }
}

/// Message in a conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Role of the message author
    pub role: Role,
    /// Ordered content parts
    pub parts: Vec<Part>,
}

impl Message {
    /// Create a message from its parts
    pub const fn new(role: Role, parts: Vec<Part>) -> Self {
        Self { role, parts }
    }

    /// Create a message holding a single text part
    pub fn text(role: Role, text: impl Into<String>) -> Self {
        Self::new(role, vec![Part::text(text)])
    }

    /// System message with a single text part
    pub fn system(text: impl Into<String>) -> Self {
        Self::text(Role::System, text)
    }

    /// User message with a single text part
    pub fn user(text: impl Into<String>) -> Self {
        Self::text(Role::User, text)
    }

    /// Assistant message with a single text part
    pub fn assistant(text: impl Into<String>) -> Self {
        Self::text(Role::Assistant, text)
    }

    /// Concatenated text of every text part
    pub fn text_content(&self) -> String {
        self.parts.iter().filter_map(Part::as_text).collect()
    }

    /// Tool calls requested in this message
    pub fn tool_calls(&self) -> impl Iterator<Item = ToolCall<'_>> {
        self.parts.iter().filter_map(|part| match part {
            Part::ToolCall { id, name, input } => Some(ToolCall { id, name, input }),
            Part::Text { .. } | Part::ToolResult { .. } => None,
        })
    }
}

/// One typed fragment of a conversational turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Part {
    /// Plain text
    Text {
        /// The text string
        text: String,
    },
    /// Model-issued request to invoke a tool
    ToolCall {
        /// Provider-issued call identifier
        id: String,
        /// Name of the tool to invoke
        name: String,
        /// JSON-encoded argument object, exactly as received
        input: String,
    },
    /// Outcome of a tool invocation, sent back to the model
    ToolResult {
        /// ID of the tool call this result answers
        tool_call_id: String,
        /// Name of the tool that ran
        name: String,
        /// Result payload
        result: serde_json::Value,
        /// Error message when the invocation failed
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
}

impl Part {
    /// Text part
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    /// Tool call part
    pub fn tool_call(id: impl Into<String>, name: impl Into<String>, input: impl Into<String>) -> Self {
        Self::ToolCall {
            id: id.into(),
            name: name.into(),
            input: input.into(),
        }
    }

    /// Successful tool result part
    pub fn tool_result(
        tool_call_id: impl Into<String>,
        name: impl Into<String>,
        result: impl Into<serde_json::Value>,
    ) -> Self {
        Self::ToolResult {
            tool_call_id: tool_call_id.into(),
            name: name.into(),
            result: result.into(),
            error: None,
        }
    }

    /// Failed tool result part
    pub fn tool_error(tool_call_id: impl Into<String>, name: impl Into<String>, error: impl Into<String>) -> Self {
        Self::ToolResult {
            tool_call_id: tool_call_id.into(),
            name: name.into(),
            result: serde_json::Value::Null,
            error: Some(error.into()),
        }
    }

    /// Short name of the variant, used in error messages
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Text { .. } => "text",
            Self::ToolCall { .. } => "tool_call",
            Self::ToolResult { .. } => "tool_result",
        }
    }

    /// Text content if this is a text part
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text { text } => Some(text),
            Self::ToolCall { .. } | Self::ToolResult { .. } => None,
        }
    }
}

/// Borrowed view of a tool call part
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToolCall<'a> {
    /// Provider-issued call identifier
    pub id: &'a str,
    /// Tool name
    pub name: &'a str,
    /// JSON-encoded arguments
    pub input: &'a str,
}

impl ToolCall<'_> {
    /// Deserialize the arguments into a typed value
    ///
    /// # Errors
    ///
    /// Returns an error if the arguments are not valid JSON for `T`
    pub fn parse_input<T: serde::de::DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_str(self.input)
    }
}
