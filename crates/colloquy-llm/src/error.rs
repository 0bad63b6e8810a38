use http::StatusCode;
use thiserror::Error;

use crate::types::{ProviderKind, Response, Role};

/// Failure converting a conversation or tool list into a provider request
///
/// Raised before any network I/O; message-level variants always carry the
/// index of the offending message and part.
#[derive(Debug, Error)]
pub enum ConvertError {
    /// System messages may only carry text
    #[error("[message {message}, part {part}] unsupported system message part type: {kind}")]
    UnsupportedSystemPart {
        /// Index of the message in the conversation
        message: usize,
        /// Index of the part within the message
        part: usize,
        /// Offending part type
        kind: &'static str,
    },

    /// Part type has no wire representation for this role
    #[error("[message {message}, part {part}] unsupported {role} message part type: {kind}")]
    UnsupportedPart {
        /// Index of the message in the conversation
        message: usize,
        /// Index of the part within the message
        part: usize,
        /// Role of the message
        role: Role,
        /// Offending part type
        kind: &'static str,
    },

    /// Stored tool call arguments are not a JSON object
    #[error("[message {message}, part {part}] failed to parse tool call input JSON for tool '{tool}': {source}")]
    InvalidToolInput {
        /// Index of the message in the conversation
        message: usize,
        /// Index of the part within the message
        part: usize,
        /// Tool name
        tool: String,
        /// Parse failure
        source: serde_json::Error,
    },

    /// Non-null tool schema whose `properties` is missing or not an object
    #[error("tool '{tool}': schema 'properties' is not an object")]
    InvalidSchemaProperties {
        /// Tool name
        tool: String,
    },

    /// Tool returned a null schema where one is required
    #[error("tool '{tool}' has no schema")]
    MissingSchema {
        /// Tool name
        tool: String,
    },
}

/// Failure while consuming a server-sent event stream
#[derive(Debug, Error)]
pub enum StreamError {
    /// Event payload is not the JSON shape its event type requires
    #[error("failed to unmarshal {event}: {source}")]
    MalformedEvent {
        /// Event type being decoded
        event: String,
        /// Parse failure
        source: serde_json::Error,
    },

    /// Event type outside the recognized set
    #[error("unknown stream event type: {0}")]
    UnknownEvent(String),

    /// Stream ended or sent content before the message envelope
    #[error("no message received in stream")]
    NoMessage,

    /// Upstream reported an error in-band
    #[error("stream error: {message}")]
    Upstream {
        /// Upstream error type (e.g. `overloaded_error`)
        kind: String,
        /// Upstream error message
        message: String,
    },

    /// Reading the underlying byte stream failed
    #[error("error reading stream: {0}")]
    Read(#[source] std::io::Error),

    /// The request context was cancelled
    #[error("stream cancelled")]
    Cancelled,
}

/// A response content block the conversation model cannot represent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsupportedBlock {
    /// Position in the response `content` array as received
    pub index: usize,
    /// Block `type` tag
    pub kind: &'static str,
}

/// Soft decode error listing every unrepresentable content block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsupportedBlocks {
    /// Blocks that were left out of the response
    pub blocks: Vec<UnsupportedBlock>,
}

impl std::fmt::Display for UnsupportedBlocks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("unsupported response content block types:")?;
        for block in &self.blocks {
            write!(f, " [block {}] {};", block.index, block.kind)?;
        }
        Ok(())
    }
}

impl std::error::Error for UnsupportedBlocks {}

/// Errors returned by provider generate calls
///
/// Every variant renders with the provider tag as prefix, e.g.
/// `anthropic: request failed with status 529: ...`.
#[derive(Debug, Error)]
pub enum LlmError {
    /// Conversation could not be converted to the wire format
    #[error("{provider}: failed to convert messages: {source}")]
    ConvertMessages {
        /// Provider tag
        provider: ProviderKind,
        /// Conversion failure
        source: ConvertError,
    },

    /// Tool list could not be converted to the wire format
    #[error("{provider}: failed to convert tools: {source}")]
    ConvertTools {
        /// Provider tag
        provider: ProviderKind,
        /// Conversion failure
        source: ConvertError,
    },

    /// Client settings cannot produce a valid request
    #[error("{provider}: invalid client configuration: {message}")]
    Config {
        /// Provider tag
        provider: ProviderKind,
        /// What is wrong
        message: String,
    },

    /// Request could not be sent or its body could not be read
    #[error("{provider}: request failed: {source}")]
    Transport {
        /// Provider tag
        provider: ProviderKind,
        /// Transport failure
        source: anyhow::Error,
    },

    /// Upstream answered with a non-success status
    #[error("{provider}: request failed with status {}: {body}", .status.as_u16())]
    Status {
        /// Provider tag
        provider: ProviderKind,
        /// HTTP status
        status: StatusCode,
        /// Raw response body
        body: String,
    },

    /// Response envelope is not valid JSON of the expected shape
    #[error("{provider}: failed to decode response body: {source}")]
    Decode {
        /// Provider tag
        provider: ProviderKind,
        /// Parse failure
        source: serde_json::Error,
    },

    /// Response decoded, but some content blocks were left out
    #[error("{provider}: {source}")]
    Partial {
        /// Provider tag
        provider: ProviderKind,
        /// Everything that could be represented
        response: Box<Response>,
        /// Blocks that could not
        source: UnsupportedBlocks,
    },

    /// Streaming protocol failure
    #[error("{provider}: failed to parse stream: {source}")]
    Stream {
        /// Provider tag
        provider: ProviderKind,
        /// Stream failure
        source: StreamError,
    },

    /// The request context was cancelled before a response arrived
    #[error("{provider}: request cancelled")]
    Cancelled {
        /// Provider tag
        provider: ProviderKind,
    },
}

impl LlmError {
    /// Provider the failing call was made against
    pub const fn provider(&self) -> ProviderKind {
        match self {
            Self::ConvertMessages { provider, .. }
            | Self::ConvertTools { provider, .. }
            | Self::Config { provider, .. }
            | Self::Transport { provider, .. }
            | Self::Status { provider, .. }
            | Self::Decode { provider, .. }
            | Self::Partial { provider, .. }
            | Self::Stream { provider, .. }
            | Self::Cancelled { provider } => *provider,
        }
    }

    /// Usable response returned alongside a soft decode error
    pub fn partial_response(&self) -> Option<&Response> {
        match self {
            Self::Partial { response, .. } => Some(response),
            _ => None,
        }
    }

    /// Take the usable response out of a soft decode error
    pub fn into_partial_response(self) -> Option<Response> {
        match self {
            Self::Partial { response, .. } => Some(*response),
            _ => None,
        }
    }

    /// Whether the caller's cancellation signal ended the call
    pub const fn is_cancelled(&self) -> bool {
        matches!(
            self,
            Self::Cancelled { .. }
                | Self::Stream {
                    source: StreamError::Cancelled,
                    ..
                }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errors_carry_provider_prefix() {
        let err = LlmError::Status {
            provider: ProviderKind::Anthropic,
            status: StatusCode::TOO_MANY_REQUESTS,
            body: "slow down".to_owned(),
        };
        assert_eq!(
            err.to_string(),
            "anthropic: request failed with status 429: slow down"
        );

        let err = LlmError::Stream {
            provider: ProviderKind::OpenAi,
            source: StreamError::NoMessage,
        };
        assert_eq!(
            err.to_string(),
            "openai: failed to parse stream: no message received in stream"
        );
    }

    #[test]
    fn convert_errors_identify_message_and_part() {
        let err = ConvertError::UnsupportedSystemPart {
            message: 2,
            part: 1,
            kind: "tool_call",
        };
        assert_eq!(
            err.to_string(),
            "[message 2, part 1] unsupported system message part type: tool_call"
        );
    }

    #[test]
    fn unsupported_blocks_list_every_block() {
        let err = UnsupportedBlocks {
            blocks: vec![
                UnsupportedBlock {
                    index: 0,
                    kind: "thinking",
                },
                UnsupportedBlock {
                    index: 2,
                    kind: "server_tool_use",
                },
            ],
        };
        assert_eq!(
            err.to_string(),
            "unsupported response content block types: [block 0] thinking; [block 2] server_tool_use;"
        );
    }

    #[test]
    fn partial_response_is_reachable() {
        let response = Response::new("msg_1", ProviderKind::Anthropic, Vec::new(), None);
        let err = LlmError::Partial {
            provider: ProviderKind::Anthropic,
            response: Box::new(response),
            source: UnsupportedBlocks { blocks: Vec::new() },
        };

        assert_eq!(err.partial_response().map(|r| r.id.as_str()), Some("msg_1"));
        assert!(!err.is_cancelled());
    }
}
