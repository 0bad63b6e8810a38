//! Anthropic Messages API wire format types

use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;

// -- Request types --

/// Anthropic messages API request
#[derive(Debug, Clone, Serialize)]
pub struct AnthropicRequest {
    /// Model identifier
    pub model: String,
    /// Conversation messages
    pub messages: Vec<AnthropicMessage>,
    /// Maximum tokens to generate (required by Anthropic)
    pub max_tokens: u32,
    /// Stop sequences
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub stop_sequences: Vec<String>,
    /// Set only on streaming requests
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,
    /// System prompt blocks (top-level, not in messages)
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub system: Vec<AnthropicSystemBlock>,
    /// Sampling temperature
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    /// Top-k sampling
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_k: Option<u32>,
    /// Nucleus sampling threshold
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    /// Tool definitions
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<AnthropicTool>,
}

/// Block of the top-level system prompt
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AnthropicSystemBlock {
    /// Text instruction
    Text {
        /// The text string
        text: String,
    },
}

/// Anthropic message
#[derive(Debug, Clone, Serialize)]
pub struct AnthropicMessage {
    /// Turn author
    pub role: AnthropicRole,
    /// Content blocks
    pub content: Vec<AnthropicContentBlock>,
}

/// Roles accepted in the messages array
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AnthropicRole {
    /// User turn
    User,
    /// Assistant turn
    Assistant,
}

/// Content block in a request message
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AnthropicContentBlock {
    /// Text content
    Text {
        /// The text string
        text: String,
    },
    /// Tool use previously requested by the assistant
    ToolUse {
        /// Tool use identifier
        id: String,
        /// Tool name
        name: String,
        /// Tool input object
        input: serde_json::Map<String, serde_json::Value>,
    },
    /// Tool result sent back by the user
    ToolResult {
        /// Tool use ID this result responds to
        tool_use_id: String,
        /// Result content
        content: String,
        /// Set when the tool invocation failed
        #[serde(skip_serializing_if = "Option::is_none")]
        is_error: Option<bool>,
    },
}

/// Anthropic tool definition
#[derive(Debug, Clone, Serialize)]
pub struct AnthropicTool {
    /// Tool name
    pub name: String,
    /// Human-readable description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// JSON Schema for input parameters
    pub input_schema: AnthropicInputSchema,
}

/// Input schema of a tool, always an object
#[derive(Debug, Clone, Serialize)]
pub struct AnthropicInputSchema {
    /// Always `"object"`
    #[serde(rename = "type")]
    pub schema_type: &'static str,
    /// Property schemas keyed by name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<serde_json::Map<String, serde_json::Value>>,
    /// Names of required properties
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<String>,
}

// -- Response types --

/// Anthropic messages API response
///
/// `content` is captured raw and decoded element by element on its `type`
/// tag. Elements with an unrecognized tag are dropped.
#[derive(Debug, Clone, Deserialize)]
#[serde(try_from = "AnthropicEnvelope")]
pub struct AnthropicResponse {
    /// Response identifier
    pub id: String,
    /// Object type (always "message")
    pub response_type: String,
    /// Role (always "assistant")
    pub role: String,
    /// Recognized response content blocks with their wire positions
    pub content: Vec<IndexedBlock>,
    /// Model used
    pub model: String,
    /// Stop reason
    pub stop_reason: Option<String>,
    /// Stop sequence that triggered the stop
    pub stop_sequence: Option<String>,
    /// Token usage
    pub usage: AnthropicUsage,
    /// Code execution container, when one was used
    pub container: Option<AnthropicContainer>,
}

#[derive(Deserialize)]
struct AnthropicEnvelope {
    id: String,
    #[serde(rename = "type", default)]
    response_type: String,
    #[serde(default)]
    role: String,
    #[serde(default)]
    content: Vec<Box<RawValue>>,
    #[serde(default)]
    model: String,
    #[serde(default)]
    stop_reason: Option<String>,
    #[serde(default)]
    stop_sequence: Option<String>,
    #[serde(default)]
    usage: AnthropicUsage,
    #[serde(default)]
    container: Option<AnthropicContainer>,
}

impl TryFrom<AnthropicEnvelope> for AnthropicResponse {
    type Error = serde_json::Error;

    fn try_from(envelope: AnthropicEnvelope) -> Result<Self, Self::Error> {
        let mut content = Vec::with_capacity(envelope.content.len());

        for (index, raw) in envelope.content.iter().enumerate() {
            if let Some(block) = AnthropicResponseBlock::from_raw(raw)? {
                content.push(IndexedBlock { index, block });
            }
        }

        Ok(Self {
            id: envelope.id,
            response_type: envelope.response_type,
            role: envelope.role,
            content,
            model: envelope.model,
            stop_reason: envelope.stop_reason,
            stop_sequence: envelope.stop_sequence,
            usage: envelope.usage,
            container: envelope.container,
        })
    }
}

/// Recognized content block and its position in the wire `content` array
#[derive(Debug, Clone)]
pub struct IndexedBlock {
    /// Position in the `content` array as received, unknown blocks included
    pub index: usize,
    /// Decoded block
    pub block: AnthropicResponseBlock,
}

/// Content block in an Anthropic response, discriminated by `type`
#[derive(Debug, Clone)]
pub enum AnthropicResponseBlock {
    /// `text`
    Text(TextBlock),
    /// `tool_use`
    ToolUse(ToolUseBlock),
    /// `thinking`
    Thinking(ThinkingBlock),
    /// `redacted_thinking`
    RedactedThinking(RedactedThinkingBlock),
    /// `server_tool_use`
    ServerToolUse(ServerToolUseBlock),
    /// `mcp_tool_use`
    McpToolUse(McpToolUseBlock),
    /// `mcp_tool_result`
    McpToolResult(McpToolResultBlock),
    /// `container_upload`
    ContainerUpload(ContainerUploadBlock),
    /// `web_search_tool_result`
    WebSearchToolResult(ServerToolResultBlock),
    /// `web_search_result`
    WebSearchResult(WebSearchResultBlock),
    /// `code_execution_tool_result`
    CodeExecutionToolResult(ServerToolResultBlock),
    /// `code_execution_result`
    CodeExecutionResult(CodeExecutionResultBlock),
    /// `code_execution_output`
    CodeExecutionOutput(CodeExecutionOutputBlock),
}

#[derive(Deserialize)]
struct BlockTag<'a> {
    #[serde(rename = "type", borrow)]
    kind: std::borrow::Cow<'a, str>,
}

impl AnthropicResponseBlock {
    /// Decode one element of the `content` array
    ///
    /// Returns `Ok(None)` for a `type` tag this crate does not know.
    ///
    /// # Errors
    ///
    /// Returns an error if the element has no `type` tag or a recognized
    /// block is missing required fields.
    pub fn from_raw(raw: &RawValue) -> serde_json::Result<Option<Self>> {
        let tag: BlockTag<'_> = serde_json::from_str(raw.get())?;
        let json = raw.get();

        let block = match tag.kind.as_ref() {
            "text" => Self::Text(serde_json::from_str(json)?),
            "tool_use" => Self::ToolUse(serde_json::from_str(json)?),
            "thinking" => Self::Thinking(serde_json::from_str(json)?),
            "redacted_thinking" => Self::RedactedThinking(serde_json::from_str(json)?),
            "server_tool_use" => Self::ServerToolUse(serde_json::from_str(json)?),
            "mcp_tool_use" => Self::McpToolUse(serde_json::from_str(json)?),
            "mcp_tool_result" => Self::McpToolResult(serde_json::from_str(json)?),
            "container_upload" => Self::ContainerUpload(serde_json::from_str(json)?),
            "web_search_tool_result" => Self::WebSearchToolResult(serde_json::from_str(json)?),
            "web_search_result" => Self::WebSearchResult(serde_json::from_str(json)?),
            "code_execution_tool_result" => Self::CodeExecutionToolResult(serde_json::from_str(json)?),
            "code_execution_result" => Self::CodeExecutionResult(serde_json::from_str(json)?),
            "code_execution_output" => Self::CodeExecutionOutput(serde_json::from_str(json)?),
            other => {
                tracing::debug!(block_type = other, "dropping unrecognized Anthropic content block");
                return Ok(None);
            }
        };

        Ok(Some(block))
    }

    /// Wire `type` tag of this block
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Text(_) => "text",
            Self::ToolUse(_) => "tool_use",
            Self::Thinking(_) => "thinking",
            Self::RedactedThinking(_) => "redacted_thinking",
            Self::ServerToolUse(_) => "server_tool_use",
            Self::McpToolUse(_) => "mcp_tool_use",
            Self::McpToolResult(_) => "mcp_tool_result",
            Self::ContainerUpload(_) => "container_upload",
            Self::WebSearchToolResult(_) => "web_search_tool_result",
            Self::WebSearchResult(_) => "web_search_result",
            Self::CodeExecutionToolResult(_) => "code_execution_tool_result",
            Self::CodeExecutionResult(_) => "code_execution_result",
            Self::CodeExecutionOutput(_) => "code_execution_output",
        }
    }
}

/// Text response
#[derive(Debug, Clone, Deserialize)]
pub struct TextBlock {
    /// The text string
    pub text: String,
    /// Source citations attached to the text
    #[serde(default)]
    pub citations: Option<Vec<serde_json::Value>>,
}

/// Tool use request
#[derive(Debug, Clone, Deserialize)]
pub struct ToolUseBlock {
    /// Tool use identifier
    pub id: String,
    /// Tool name
    pub name: String,
    /// Tool input, byte-for-byte as sent
    pub input: Box<RawValue>,
}

/// Extended thinking output
#[derive(Debug, Clone, Deserialize)]
pub struct ThinkingBlock {
    /// Reasoning text
    pub thinking: String,
    /// Integrity signature
    #[serde(default)]
    pub signature: String,
}

/// Thinking withheld by the safety system
#[derive(Debug, Clone, Deserialize)]
pub struct RedactedThinkingBlock {
    /// Encrypted thinking payload
    pub data: String,
}

/// Server-side tool invocation
#[derive(Debug, Clone, Deserialize)]
pub struct ServerToolUseBlock {
    /// Tool use identifier
    pub id: String,
    /// Server tool name (e.g. `web_search`)
    pub name: String,
    /// Tool input
    pub input: serde_json::Value,
}

/// Tool invocation on a remote MCP server
#[derive(Debug, Clone, Deserialize)]
pub struct McpToolUseBlock {
    /// Tool use identifier
    pub id: String,
    /// Tool name
    pub name: String,
    /// MCP server that owns the tool
    pub server_name: String,
    /// Tool input
    pub input: serde_json::Value,
}

/// Result of an MCP tool invocation
#[derive(Debug, Clone, Deserialize)]
pub struct McpToolResultBlock {
    /// Tool use this result answers
    pub tool_use_id: String,
    /// String or array of text blocks
    pub content: serde_json::Value,
    /// Whether the invocation failed
    #[serde(default)]
    pub is_error: bool,
}

/// File uploaded into the code execution container
#[derive(Debug, Clone, Deserialize)]
pub struct ContainerUploadBlock {
    /// Uploaded file identifier
    pub file_id: String,
}

/// Result of a server-side tool (web search, code execution)
#[derive(Debug, Clone, Deserialize)]
pub struct ServerToolResultBlock {
    /// Tool use this result answers
    pub tool_use_id: String,
    /// Result payload or error object
    pub content: serde_json::Value,
}

/// Single web search hit
#[derive(Debug, Clone, Deserialize)]
pub struct WebSearchResultBlock {
    /// Page title
    pub title: String,
    /// Page URL
    pub url: String,
    /// Encrypted page content for citation
    #[serde(default)]
    pub encrypted_content: String,
    /// Reported page age
    #[serde(default)]
    pub page_age: Option<String>,
}

/// Outcome of a code execution run
#[derive(Debug, Clone, Deserialize)]
pub struct CodeExecutionResultBlock {
    /// Captured standard output
    #[serde(default)]
    pub stdout: String,
    /// Captured standard error
    #[serde(default)]
    pub stderr: String,
    /// Process exit code
    #[serde(default)]
    pub return_code: i32,
    /// Files produced by the run
    #[serde(default)]
    pub content: Vec<CodeExecutionOutputBlock>,
}

/// File produced by code execution
#[derive(Debug, Clone, Deserialize)]
pub struct CodeExecutionOutputBlock {
    /// Output file identifier
    pub file_id: String,
}

/// Anthropic token usage
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AnthropicUsage {
    /// Input tokens
    #[serde(default)]
    pub input_tokens: u32,
    /// Output tokens
    #[serde(default)]
    pub output_tokens: u32,
    /// Tokens written to the prompt cache
    #[serde(default)]
    pub cache_creation_input_tokens: Option<u32>,
    /// Tokens read from the prompt cache
    #[serde(default)]
    pub cache_read_input_tokens: Option<u32>,
    /// Cache write breakdown by TTL
    #[serde(default)]
    pub cache_creation: Option<AnthropicCacheCreation>,
    /// Server tool request counts
    #[serde(default)]
    pub server_tool_use: Option<AnthropicServerToolUsage>,
    /// Service tier that handled the request
    #[serde(default)]
    pub service_tier: Option<String>,
}

/// Prompt cache write breakdown
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct AnthropicCacheCreation {
    /// Tokens cached for five minutes
    #[serde(default)]
    pub ephemeral_5m_input_tokens: u32,
    /// Tokens cached for one hour
    #[serde(default)]
    pub ephemeral_1h_input_tokens: u32,
}

/// Server tool request counts
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct AnthropicServerToolUsage {
    /// Web searches performed
    #[serde(default)]
    pub web_search_requests: u32,
}

/// Code execution container
#[derive(Debug, Clone, Deserialize)]
pub struct AnthropicContainer {
    /// Container identifier
    pub id: String,
    /// RFC 3339 expiry timestamp
    pub expires_at: String,
}

// -- Streaming types --

/// Payload of a `message_start` event
#[derive(Debug, Deserialize)]
pub struct MessageStartEvent {
    /// Message envelope with empty content
    pub message: AnthropicResponse,
}

/// Payload of a `content_block_start` event
#[derive(Debug, Deserialize)]
pub struct ContentBlockStartEvent {
    /// Block index
    pub index: u32,
    /// Initial block content
    pub content_block: StreamContentBlock,
}

/// Block announced by `content_block_start`
///
/// Only `text` and `tool_use` are accumulated; other kinds are tracked as
/// open but their deltas are ignored.
#[derive(Debug, Deserialize)]
pub struct StreamContentBlock {
    /// Block type
    #[serde(rename = "type")]
    pub kind: String,
    /// Tool use ID (`tool_use` only)
    #[serde(default)]
    pub id: Option<String>,
    /// Tool name (`tool_use` only)
    #[serde(default)]
    pub name: Option<String>,
}

/// Payload of a `content_block_delta` event
#[derive(Debug, Deserialize)]
pub struct ContentBlockDeltaEvent {
    /// Block index
    pub index: u32,
    /// Delta content
    pub delta: StreamDelta,
}

/// Incremental update to the open block
#[derive(Debug, Deserialize)]
pub struct StreamDelta {
    /// Delta type (`text_delta`, `input_json_delta`, `thinking_delta`, ...)
    #[serde(rename = "type")]
    pub kind: String,
    /// Text fragment (`text_delta`)
    #[serde(default)]
    pub text: Option<String>,
    /// Tool input JSON fragment (`input_json_delta`)
    #[serde(default)]
    pub partial_json: Option<String>,
}

/// Payload of a `content_block_stop` event
#[derive(Debug, Deserialize)]
pub struct ContentBlockStopEvent {
    /// Block index
    pub index: u32,
}

/// Payload of a `message_delta` event
#[derive(Debug, Deserialize)]
pub struct MessageDeltaEvent {
    /// Stop reason and sequence
    pub delta: AnthropicMessageDelta,
    /// Cumulative usage counters
    #[serde(default)]
    pub usage: Option<MessageDeltaUsage>,
}

/// Envelope fields patched by `message_delta`
#[derive(Debug, Deserialize)]
pub struct AnthropicMessageDelta {
    /// Stop reason
    #[serde(default)]
    pub stop_reason: Option<String>,
    /// Stop sequence
    #[serde(default)]
    pub stop_sequence: Option<String>,
}

/// Usage counters in `message_delta`; absent counters keep their value
#[derive(Debug, Deserialize)]
pub struct MessageDeltaUsage {
    /// Input tokens
    #[serde(default)]
    pub input_tokens: Option<u32>,
    /// Output tokens
    #[serde(default)]
    pub output_tokens: Option<u32>,
    /// Tokens written to the prompt cache
    #[serde(default)]
    pub cache_creation_input_tokens: Option<u32>,
    /// Tokens read from the prompt cache
    #[serde(default)]
    pub cache_read_input_tokens: Option<u32>,
    /// Server tool request counts
    #[serde(default)]
    pub server_tool_use: Option<AnthropicServerToolUsage>,
}

/// Payload of an `error` event
#[derive(Debug, Deserialize)]
pub struct ErrorEvent {
    /// Error details
    pub error: AnthropicErrorDetail,
}

/// Anthropic error detail
#[derive(Debug, Deserialize)]
pub struct AnthropicErrorDetail {
    /// Error type (e.g. `overloaded_error`)
    #[serde(rename = "type")]
    pub error_type: String,
    /// Error message
    pub message: String,
}
