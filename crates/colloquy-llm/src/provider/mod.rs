//! Provider trait and implementations for LLM backends

pub mod anthropic;
pub mod google;
pub mod openai;

use std::sync::Arc;

use async_trait::async_trait;
use colloquy_config::{ProviderConfig, ProviderType};
use http::StatusCode;

use crate::context::RequestContext;
use crate::error::LlmError;
use crate::stream::StreamCallback;
use crate::transport::{ByteStream, Transport, read_body};
use crate::types::{Message, ProviderKind, Response, Tool};

pub use self::anthropic::AnthropicProvider;
pub use self::google::GoogleProvider;
pub use self::openai::OpenAiProvider;

/// Trait implemented by each LLM provider backend
///
/// Implementations hold an immutable configuration snapshot and no per-call
/// state, so one instance can serve concurrent calls.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Configured provider name
    fn name(&self) -> &str;

    /// Wire protocol spoken by this provider
    fn kind(&self) -> ProviderKind;

    /// Send the conversation and wait for the complete reply
    ///
    /// # Errors
    ///
    /// Returns an error if conversion, transport or decoding fails. A reply
    /// holding content blocks that cannot be represented comes back as
    /// [`LlmError::Partial`] carrying everything else.
    async fn generate(&self, context: &RequestContext, messages: &[Message]) -> Result<Response, LlmError>;

    /// Send the conversation and consume the reply as an event stream
    ///
    /// The callback runs on the task reading the stream, so a slow callback
    /// slows consumption.
    ///
    /// # Errors
    ///
    /// Returns an error if conversion or transport fails, the stream breaks
    /// protocol, the provider reports an error in-band, or the context is
    /// cancelled. A callback returning `false` is not an error.
    async fn generate_stream(
        &self,
        context: &RequestContext,
        messages: &[Message],
        callback: Option<StreamCallback<'_>>,
    ) -> Result<Response, LlmError>;
}

/// Request parameters fixed at construction
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationSettings {
    /// Model identifier
    pub model: String,
    /// Maximum tokens to generate
    pub max_tokens: u32,
    /// Sampling temperature
    pub temperature: Option<f64>,
    /// Nucleus sampling threshold
    pub top_p: Option<f64>,
    /// Top-k sampling (rejected by `OpenAI`)
    pub top_k: Option<u32>,
    /// Stop sequences
    pub stop_sequences: Vec<String>,
}

impl GenerationSettings {
    /// Settings from configuration, filling absent fields with defaults
    pub fn from_config(config: &ProviderConfig, default_model: &str, default_max_tokens: u32) -> Self {
        Self {
            model: config.model.clone().unwrap_or_else(|| default_model.to_owned()),
            max_tokens: config.max_tokens.unwrap_or(default_max_tokens),
            temperature: config.temperature,
            top_p: config.top_p,
            top_k: config.top_k,
            stop_sequences: config.stop_sequences.clone(),
        }
    }
}

/// Build a provider from its configuration
///
/// # Errors
///
/// Returns an error if no API key can be resolved or the settings are
/// invalid for the provider type.
pub fn from_config(
    name: &str,
    config: &ProviderConfig,
    tools: Vec<Arc<dyn Tool>>,
) -> Result<Arc<dyn Provider>, LlmError> {
    let provider: Arc<dyn Provider> = match config.provider_type {
        ProviderType::Anthropic => Arc::new(AnthropicProvider::new(name, config)?.with_tools(tools)),
        ProviderType::Openai => Arc::new(OpenAiProvider::new(name, config)?.with_tools(tools)),
        ProviderType::Google => Arc::new(GoogleProvider::new(name, config)?.with_tools(tools)),
    };

    tracing::debug!(provider = %name, kind = %provider.kind(), "provider configured");

    Ok(provider)
}

/// First non-empty environment variable among `names`
fn env_key(names: &[&str]) -> Option<secrecy::SecretString> {
    names
        .iter()
        .find_map(|name| std::env::var(name).ok().filter(|value| !value.is_empty()))
        .map(Into::into)
}

/// Send a request and return the body of a successful response
///
/// Races the context's cancellation token against sending and, for error
/// statuses, against reading the error body.
async fn dispatch(
    transport: &dyn Transport,
    provider: ProviderKind,
    name: &str,
    context: &RequestContext,
    request: http::Request<Vec<u8>>,
) -> Result<ByteStream, LlmError> {
    let sent = tokio::select! {
        biased;
        () = context.cancellation.cancelled() => return Err(LlmError::Cancelled { provider }),
        sent = transport.send(request) => sent,
    };

    let response = sent.map_err(|source| {
        tracing::error!(provider = %name, request_id = %context.request_id, error = %source, "upstream request failed");
        LlmError::Transport { provider, source }
    })?;

    let status = response.status();
    let body = response.into_body();

    if status.is_success() {
        return Ok(body);
    }

    let body = read_to_end(body, provider, context).await?;
    tracing::warn!(
        provider = %name,
        request_id = %context.request_id,
        status = %status,
        "upstream returned error"
    );

    Err(status_error(provider, status, &body))
}

fn status_error(provider: ProviderKind, status: StatusCode, body: &[u8]) -> LlmError {
    LlmError::Status {
        provider,
        status,
        body: String::from_utf8_lossy(body).into_owned(),
    }
}

/// Read a whole body, giving up when the context is cancelled
async fn read_to_end(body: ByteStream, provider: ProviderKind, context: &RequestContext) -> Result<Vec<u8>, LlmError> {
    tokio::select! {
        biased;
        () = context.cancellation.cancelled() => Err(LlmError::Cancelled { provider }),
        read = read_body(body) => read.map_err(|e| LlmError::Transport {
            provider,
            source: anyhow::Error::new(e).context("failed to read response body"),
        }),
    }
}

/// JSON POST request
fn post_json(
    provider: ProviderKind,
    url: &str,
    headers: Vec<(http::header::HeaderName, http::HeaderValue)>,
    body: &impl serde::Serialize,
) -> Result<http::Request<Vec<u8>>, LlmError> {
    let body = serde_json::to_vec(body).map_err(|e| LlmError::Config {
        provider,
        message: format!("failed to encode request body: {e}"),
    })?;

    let mut builder = http::Request::post(url).header(http::header::CONTENT_TYPE, "application/json");
    for (name, value) in headers {
        builder = builder.header(name, value);
    }

    builder.body(body).map_err(|e| LlmError::Config {
        provider,
        message: format!("invalid request for {url}: {e}"),
    })
}

/// Header value holding a credential
fn secret_header(provider: ProviderKind, value: &str) -> Result<http::HeaderValue, LlmError> {
    let mut value = http::HeaderValue::from_str(value).map_err(|_| LlmError::Config {
        provider,
        message: "API key is not a valid header value".to_owned(),
    })?;
    value.set_sensitive(true);
    Ok(value)
}
