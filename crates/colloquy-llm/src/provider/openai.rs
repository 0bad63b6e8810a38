//! `OpenAI` chat completions provider implementation

use std::sync::Arc;

use async_trait::async_trait;
use colloquy_config::ProviderConfig;
use http::header::{ACCEPT, AUTHORIZATION};
use secrecy::{ExposeSecret, SecretString};

use super::{GenerationSettings, Provider, dispatch, env_key, post_json, read_to_end, secret_header};
use crate::context::RequestContext;
use crate::convert::openai::{convert_messages, convert_tools, decode_response};
use crate::error::LlmError;
use crate::protocol::openai::{OpenAiRequest, OpenAiResponse, OpenAiStreamOptions};
use crate::stream::openai::OpenAiStream;
use crate::stream::{self, StreamCallback};
use crate::transport::{HttpTransport, Transport};
use crate::types::{Message, ProviderKind, Response, Tool};

/// Default `OpenAI` API base URL
const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Model used when none is configured
pub const DEFAULT_MODEL: &str = "gpt-4o";

/// Token limit used when none is configured
pub const DEFAULT_MAX_TOKENS: u32 = 1024;

const API_KEY_VAR: &str = "OPENAI_API_KEY";

const KIND: ProviderKind = ProviderKind::OpenAi;

/// `OpenAI`-compatible chat completions provider
pub struct OpenAiProvider {
    name: String,
    settings: GenerationSettings,
    tools: Vec<Arc<dyn Tool>>,
    completions_url: String,
    api_key: SecretString,
    transport: Arc<dyn Transport>,
}

impl OpenAiProvider {
    /// Create from provider configuration
    ///
    /// # Errors
    ///
    /// Returns `LlmError::Config` if no API key is configured or set in
    /// `OPENAI_API_KEY`, or if `top_k` is set.
    pub fn new(name: impl Into<String>, config: &ProviderConfig) -> Result<Self, LlmError> {
        if config.top_k.is_some() {
            return Err(LlmError::Config {
                provider: KIND,
                message: "top_k is not supported".to_owned(),
            });
        }

        let api_key = config
            .api_key
            .clone()
            .or_else(|| env_key(&[API_KEY_VAR]))
            .ok_or_else(|| LlmError::Config {
                provider: KIND,
                message: format!("no API key configured and {API_KEY_VAR} is not set"),
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
            completions_url: format!("{base}/chat/completions"),
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

    fn http_request(&self, messages: &[Message], stream: bool) -> Result<http::Request<Vec<u8>>, LlmError> {
        let messages =
            convert_messages(messages).map_err(|source| LlmError::ConvertMessages { provider: KIND, source })?;
        let tools = convert_tools(&self.tools).map_err(|source| LlmError::ConvertTools { provider: KIND, source })?;

        let body = OpenAiRequest {
            model: self.settings.model.clone(),
            messages,
            max_tokens: Some(self.settings.max_tokens),
            temperature: self.settings.temperature,
            top_p: self.settings.top_p,
            stop: self.settings.stop_sequences.clone(),
            stream: stream.then_some(true),
            stream_options: stream.then_some(OpenAiStreamOptions { include_usage: true }),
            tools,
        };

        let accept = if stream { "text/event-stream" } else { "application/json" };
        let bearer = format!("Bearer {}", self.api_key.expose_secret());

        let headers = vec![
            (ACCEPT, http::HeaderValue::from_static(accept)),
            (AUTHORIZATION, secret_header(KIND, &bearer)?),
        ];

        post_json(KIND, &self.completions_url, headers, &body)
    }
}

#[async_trait]
impl Provider for OpenAiProvider {
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
            "sending chat completion request"
        );

        let body = dispatch(self.transport.as_ref(), KIND, &self.name, context, request).await?;
        let body = read_to_end(body, KIND, context).await?;

        let completion: OpenAiResponse =
            serde_json::from_slice(&body).map_err(|source| LlmError::Decode { provider: KIND, source })?;

        Ok(decode_response(completion))
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
            "sending streaming chat completion request"
        );

        let body = dispatch(self.transport.as_ref(), KIND, &self.name, context, request).await?;

        stream::drive(body, &context.cancellation, OpenAiStream::new(), callback)
            .await
            .map_err(|source| {
                tracing::warn!(provider = %self.name, request_id = %context.request_id, error = %source, "stream failed");
                LlmError::Stream { provider: KIND, source }
            })
    }
}
