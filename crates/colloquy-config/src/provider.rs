use secrecy::SecretString;
use serde::Deserialize;
use url::Url;

/// Configuration for a single provider client
///
/// Every field except `type` is optional; the client fills in
/// provider-specific defaults for whatever is left unset.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderConfig {
    /// Provider protocol type
    #[serde(rename = "type")]
    pub provider_type: ProviderType,
    /// API key for authentication
    #[serde(default)]
    pub api_key: Option<SecretString>,
    /// Base URL override
    #[serde(default)]
    pub base_url: Option<Url>,
    /// Model identifier
    #[serde(default)]
    pub model: Option<String>,
    /// Maximum tokens to generate
    #[serde(default)]
    pub max_tokens: Option<u32>,
    /// Sampling temperature
    #[serde(default)]
    pub temperature: Option<f64>,
    /// Nucleus sampling threshold
    #[serde(default)]
    pub top_p: Option<f64>,
    /// Top-k sampling
    #[serde(default)]
    pub top_k: Option<u32>,
    /// Stop sequences
    #[serde(default)]
    pub stop_sequences: Vec<String>,
}

impl ProviderConfig {
    /// Minimal configuration for the given provider type
    pub const fn new(provider_type: ProviderType) -> Self {
        Self {
            provider_type,
            api_key: None,
            base_url: None,
            model: None,
            max_tokens: None,
            temperature: None,
            top_p: None,
            top_k: None,
            stop_sequences: Vec::new(),
        }
    }
}

/// Supported provider protocols
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderType {
    /// Anthropic Messages API
    Anthropic,
    /// OpenAI-compatible chat completions API
    Openai,
    /// Google Gemini `generateContent` API
    #[serde(alias = "gemini")]
    Google,
}

impl std::fmt::Display for ProviderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Anthropic => f.write_str("anthropic"),
            Self::Openai => f.write_str("openai"),
            Self::Google => f.write_str("google"),
        }
    }
}
