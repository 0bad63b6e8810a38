use serde::Serialize;

use super::message::{Message, Part, Role};
use crate::protocol::anthropic::AnthropicResponse;
use crate::protocol::google::{GoogleResponse, GoogleStreamSummary};
use crate::protocol::openai::{OpenAiResponse, OpenAiStreamSummary};

/// Provider that produced a response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// Anthropic Messages API
    Anthropic,
    /// OpenAI chat completions API
    OpenAi,
    /// Google Gemini generateContent API
    Google,
}

impl ProviderKind {
    /// Lowercase tag used in logs and error prefixes
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Anthropic => "anthropic",
            Self::OpenAi => "openai",
            Self::Google => "google",
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Provider-native payload retained for inspection
#[derive(Debug, Clone)]
pub enum RawResponse {
    /// Anthropic message envelope (for streams, as patched by `message_delta`)
    Anthropic(Box<AnthropicResponse>),
    /// `OpenAI` chat completion body
    OpenAi(Box<OpenAiResponse>),
    /// Envelope assembled from `OpenAI` stream chunks
    OpenAiStream(Box<OpenAiStreamSummary>),
    /// Gemini `generateContent` body
    Google(Box<GoogleResponse>),
    /// Envelope assembled from Gemini stream chunks
    GoogleStream(Box<GoogleStreamSummary>),
}

/// Token usage reported by the provider
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Usage {
    /// Tokens consumed by the prompt
    pub input_tokens: u32,
    /// Tokens generated in the reply
    pub output_tokens: u32,
}

/// Provider-agnostic reply to a generate call
#[derive(Debug, Clone)]
pub struct Response {
    /// Provider-issued response identifier
    pub id: String,
    /// Generated message (role is always assistant)
    pub message: Message,
    /// Provider that produced this response
    pub provider: ProviderKind,
    /// Original provider payload
    pub raw: Option<RawResponse>,
}

impl Response {
    /// Assistant response with the given parts
    pub fn new(id: impl Into<String>, provider: ProviderKind, parts: Vec<Part>, raw: Option<RawResponse>) -> Self {
        Self {
            id: id.into(),
            message: Message::new(Role::Assistant, parts),
            provider,
            raw,
        }
    }

    /// Concatenated text of the reply
    pub fn text(&self) -> String {
        self.message.text_content()
    }

    /// Why the model stopped, as reported by the provider
    pub fn stop_reason(&self) -> Option<&str> {
        match self.raw.as_ref()? {
            RawResponse::Anthropic(envelope) => envelope.stop_reason.as_deref(),
            RawResponse::OpenAi(body) => body.choices.first()?.finish_reason.as_deref(),
            RawResponse::OpenAiStream(summary) => summary.finish_reason.as_deref(),
            RawResponse::Google(body) => body.candidates.first()?.finish_reason.as_deref(),
            RawResponse::GoogleStream(summary) => summary.finish_reason.as_deref(),
        }
    }

    /// Token usage, when the provider reported it
    pub fn usage(&self) -> Option<Usage> {
        match self.raw.as_ref()? {
            RawResponse::Anthropic(envelope) => Some(Usage {
                input_tokens: envelope.usage.input_tokens,
                output_tokens: envelope.usage.output_tokens,
            }),
            RawResponse::OpenAi(body) => body.usage.as_ref().map(Into::into),
            RawResponse::OpenAiStream(summary) => summary.usage.as_ref().map(Into::into),
            RawResponse::Google(body) => body.usage_metadata.as_ref().map(Into::into),
            RawResponse::GoogleStream(summary) => summary.usage.as_ref().map(Into::into),
        }
    }
}
