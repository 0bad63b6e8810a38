//! Google Gemini provider implementation

use std::sync::Arc;

use async_trait::async_trait;
use colloquy_config::ProviderConfig;
use http::header::ACCEPT;
use secrecy::{ExposeSecret, SecretString};

use super::{GenerationSettings, Provider, dispatch, env_key, post_json, read_to_end, secret_header};
use crate::context::RequestContext;
use crate::convert::google::{convert_messages, convert_tools, decode_response};
use crate::error::LlmError;
use crate::protocol::google::{GoogleGenerationConfig, GoogleRequest, GoogleResponse};
use crate::stream::google::GoogleStream;
use crate::stream::{self, StreamCallback};
use crate::transport::{HttpTransport, Transport};
use crate::types::{Message, ProviderKind, Response, Tool};

/// Default Gemini API base URL
const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Model used when none is configured
pub const DEFAULT_MODEL: &str = "gemini-2.5-pro";

/// Token limit used when none is configured
pub const DEFAULT_MAX_TOKENS: u32 = 8192;

/// Key variables, in order of preference
const API_KEY_VARS: [&str; 2] = ["GOOGLE_API_KEY", "GEMINI_API_KEY"];

const API_KEY_HEADER: &str = "x-goog-api-key";

const KIND: ProviderKind = ProviderKind::Google;

/// Gemini `generateContent` provider
pub struct GoogleProvider {
    name: String,
    settings: GenerationSettings,
    tools: Vec<Arc<dyn Tool>>,
    base_url: String,
    api_key: SecretString,
    transport: Arc<dyn Transport>,
}

impl GoogleProvider {
    /// Create from provider configuration
    ///
    /// # Errors
    ///
    /// Returns `LlmError::Config` if no API key is configured or set in
    /// `GOOGLE_API_KEY` or `GEMINI_API_KEY`.
    pub fn new(name: impl Into<String>, config: &ProviderConfig) -> Result<Self, LlmError> {
        let api_key = config
            .api_key
            .clone()
            .or_else(|| env_key(&API_KEY_VARS))
            .ok_or_else(|| LlmError::Config {
                provider: KIND,
                message: format!("no API key configured and neither {} is set", API_KEY_VARS.join(" nor ")),
            })?;

        let base_url = config
            .base_url
            .as_ref()
            .map_or(DEFAULT_BASE_URL, url::Url::as_str)
            .trim_end_matches('/')
            .to_owned();

        Ok(Self {
            name: name.into(),
            settings: GenerationSettings::from_config(config, DEFAULT_MODEL, DEFAULT_MAX_TOKENS),
            tools: Vec::new(),
            base_url,
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
        let conversation =
            convert_messages(messages).map_err(|source| LlmError::ConvertMessages { provider: KIND, source })?;

        let body = GoogleRequest {
            contents: conversation.contents,
            system_instruction: conversation.system_instruction,
            generation_config: Some(GoogleGenerationConfig {
                temperature: self.settings.temperature,
                top_p: self.settings.top_p,
                top_k: self.settings.top_k,
                max_output_tokens: Some(self.settings.max_tokens),
                stop_sequences: self.settings.stop_sequences.clone(),
            }),
            tools: convert_tools(&self.tools),
        };

        let (url, accept) = if stream {
            (
                format!("{}/models/{}:streamGenerateContent?alt=sse", self.base_url, self.settings.model),
                "text/event-stream",
            )
        } else {
            (
                format!("{}/models/{}:generateContent", self.base_url, self.settings.model),
                "application/json",
            )
        };

        let headers = vec![
            (ACCEPT, http::HeaderValue::from_static(accept)),
            (
                http::HeaderName::from_static(API_KEY_HEADER),
                secret_header(KIND, self.api_key.expose_secret())?,
            ),
        ];

        post_json(KIND, &url, headers, &body)
    }
}

#[async_trait]
impl Provider for GoogleProvider {
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
            "sending generateContent request"
        );

        let body = dispatch(self.transport.as_ref(), KIND, &self.name, context, request).await?;
        let body = read_to_end(body, KIND, context).await?;

        let reply: GoogleResponse =
            serde_json::from_slice(&body).map_err(|source| LlmError::Decode { provider: KIND, source })?;

        Ok(decode_response(reply))
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
            "sending streamGenerateContent request"
        );

        let body = dispatch(self.transport.as_ref(), KIND, &self.name, context, request).await?;

        stream::drive(body, &context.cancellation, GoogleStream::new(), callback)
            .await
            .map_err(|source| {
                tracing::warn!(provider = %self.name, request_id = %context.request_id, error = %source, "stream failed");
                LlmError::Stream { provider: KIND, source }
            })
    }
}
