//! Anthropic Messages API provider implementation

use std::sync::Arc;

use async_trait::async_trait;
use colloquy_config::ProviderConfig;
use http::header::{ACCEPT, HeaderName};
use secrecy::{ExposeSecret, SecretString};

use super::{GenerationSettings, Provider, dispatch, env_key, post_json, read_to_end, secret_header};
use crate::context::RequestContext;
use crate::convert::anthropic::{convert_messages, convert_tools, decode_response};
use crate::error::LlmError;
use crate::protocol::anthropic::{AnthropicRequest, AnthropicResponse};
use crate::stream::anthropic::AnthropicStream;
use crate::stream::{self, StreamCallback};
use crate::transport::{HttpTransport, Transport};
use crate::types::{Message, ProviderKind, Response, Tool};

/// Default Anthropic API base URL
const DEFAULT_BASE_URL: &str = "https://api.anthropic.com/v1";

/// Anthropic API version header value
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Model used when none is configured
pub const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";

/// Token limit used when none is configured
pub const DEFAULT_MAX_TOKENS: u32 = 10240;

/// Environment variables consulted, in order, when no key is configured
const API_KEY_VARS: [&str; 2] = ["ANTHROPIC_API_KEY", "ANTHROPIC_AUTH_TOKEN"];

const KIND: ProviderKind = ProviderKind::Anthropic;

/// Anthropic Messages API provider
pub struct AnthropicProvider {
    name: String,
    settings: GenerationSettings,
    tools: Vec<Arc<dyn Tool>>,
    messages_url: String,
    api_key: SecretString,
    transport: Arc<dyn Transport>,
}

impl AnthropicProvider {
    /// Create from provider configuration
    ///
    /// Absent fields take the Anthropic defaults; the API key falls back to
    /// `ANTHROPIC_API_KEY`, then `ANTHROPIC_AUTH_TOKEN`.
    ///
    /// # Errors
    ///
    /// Returns `LlmError::Config` if no API key is configured or set in the
    /// environment.
    pub fn new(name: impl Into<String>, config: &ProviderConfig) -> Result<Self, LlmError> {
        let api_key = config
            .api_key
            .clone()
            .or_else(|| env_key(&API_KEY_VARS))
            .ok_or_else(|| LlmError::Config {
                provider: KIND,
                message: format!("no API key configured and none of {} is set", API_KEY_VARS.join(", ")),
            })?;

        let base = config
            .base_url
            .as_ref()
            .map_or(DEFAULT_BASE_URL, url::Url::as_str)
            .trim_end_matches('/');

        Ok(Self {
            name: name.into(),
            settings: GenerationSettings::from_config(config, DEFAULT_MODEL, DEFAULT_MAX_TOKENS),
            tools: Vec::new(),
            messages_url: format!("{base}/messages"),
            api_key,
            transport: Arc::new(HttpTransport::new()),
        })
    }

    /// Offer these tools to the model on every call
    #[must_use]
    pub fn with_tools(mut self, tools: Vec<Arc<dyn Tool>>) -> Self {
        self.tools = tools;
        self
    }

    /// Send requests through a custom transport
    #[must_use]
    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = transport;
        self
    }

    /// Request parameters in effect
    pub const fn settings(&self) -> &GenerationSettings {
        &self.settings
    }

    /// Build the wire request body
    fn wire_request(&self, messages: &[Message], stream: bool) -> Result<AnthropicRequest, LlmError> {
        let (system, messages) =
            convert_messages(messages).map_err(|source| LlmError::ConvertMessages { provider: KIND, source })?;
        let tools = convert_tools(&self.tools).map_err(|source| LlmError::ConvertTools { provider: KIND, source })?;

        Ok(AnthropicRequest {
            model: self.settings.model.clone(),
            messages,
            max_tokens: self.settings.max_tokens,
            stop_sequences: self.settings.stop_sequences.clone(),
            stream: stream.then_some(true),
            system,
            temperature: self.settings.temperature,
            top_k: self.settings.top_k,
            top_p: self.settings.top_p,
            tools,
        })
    }

    fn http_request(&self, messages: &[Message], stream: bool) -> Result<http::Request<Vec<u8>>, LlmError> {
        let body = self.wire_request(messages, stream)?;
        let accept = if stream { "text/event-stream" } else { "application/json" };

        let headers = vec![
            (ACCEPT, http::HeaderValue::from_static(accept)),
            (
                HeaderName::from_static("anthropic-version"),
                http::HeaderValue::from_static(ANTHROPIC_VERSION),
            ),
            (
                HeaderName::from_static("x-api-key"),
                secret_header(KIND, self.api_key.expose_secret())?,
            ),
        ];

        post_json(KIND, &self.messages_url, headers, &body)
    }
}

#[async_trait]
impl Provider for AnthropicProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ProviderKind {
        KIND
    }

    async fn generate(&self, context: &RequestContext, messages: &[Message]) -> Result<Response, LlmError> {
        let request = self.http_request(messages, false)?;

        tracing::debug!(
            provider = %self.name,
            request_id = %context.request_id,
            model = %self.settings.model,
            messages = messages.len(),
            "sending messages request"
        );

        let body = dispatch(self.transport.as_ref(), KIND, &self.name, context, request).await?;
        let body = read_to_end(body, KIND, context).await?;

        let envelope: AnthropicResponse =
            serde_json::from_slice(&body).map_err(|source| LlmError::Decode { provider: KIND, source })?;

        match decode_response(envelope) {
            (response, None) => Ok(response),
            (response, Some(unsupported)) => {
                tracing::warn!(
                    provider = %self.name,
                    request_id = %context.request_id,
                    blocks = unsupported.blocks.len(),
                    "response contains unsupported content blocks"
                );
                Err(LlmError::Partial {
                    provider: KIND,
                    response: Box::new(response),
                    source: unsupported,
                })
            }
        }
    }

    async fn generate_stream(
        &self,
        context: &RequestContext,
        messages: &[Message],
        callback: Option<StreamCallback<'_>>,
    ) -> Result<Response, LlmError> {
        let request = self.http_request(messages, true)?;

        tracing::debug!(
            provider = %self.name,
            request_id = %context.request_id,
            model = %self.settings.model,
            messages = messages.len(),
            "sending streaming messages request"
        );

        let body = dispatch(self.transport.as_ref(), KIND, &self.name, context, request).await?;

        stream::drive(body, &context.cancellation, AnthropicStream::new(), callback)
            .await
            .map_err(|source| {
                tracing::warn!(provider = %self.name, request_id = %context.request_id, error = %source, "stream failed");
                LlmError::Stream { provider: KIND, source }
            })
    }
}
