use std::path::Path;

use crate::{Config, ProviderConfig, ProviderType};

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Reads the file, expands `{{ env.VAR }}` placeholders, then
    /// deserializes and validates the result.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, environment variable
    /// expansion fails, TOML parsing fails, or validation fails
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("failed to read config file {}: {e}", path.display()))?;

        Self::parse(&raw)
    }

    /// Parse and validate configuration from TOML text
    ///
    /// # Errors
    ///
    /// Returns an error if expansion, parsing or validation fails
    pub fn parse(raw: &str) -> anyhow::Result<Self> {
        let expanded =
            crate::env::expand_env(raw).map_err(|e| anyhow::anyhow!("config variable expansion failed: {e}"))?;

        let config: Self = toml::from_str(&expanded).map_err(|e| anyhow::anyhow!("failed to parse config: {e}"))?;

        config.validate()?;

        Ok(config)
    }

    /// Validate that the configuration is internally consistent
    ///
    /// # Errors
    ///
    /// Returns an error if no provider is configured or a provider
    /// carries out-of-range sampling parameters
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.providers.is_empty() {
            anyhow::bail!("at least one provider must be configured");
        }

        for (name, provider) in &self.providers {
            validate_provider(name, provider)?;
        }

        Ok(())
    }
}

fn validate_provider(name: &str, provider: &ProviderConfig) -> anyhow::Result<()> {
    if provider.max_tokens == Some(0) {
        anyhow::bail!("provider '{name}': max_tokens must be greater than 0");
    }

    if let Some(temperature) = provider.temperature
        && !(0.0..=2.0).contains(&temperature)
    {
        anyhow::bail!("provider '{name}': temperature must be between 0.0 and 2.0, got {temperature}");
    }

    if let Some(top_p) = provider.top_p
        && !(0.0..=1.0).contains(&top_p)
    {
        anyhow::bail!("provider '{name}': top_p must be between 0.0 and 1.0, got {top_p}");
    }

    if provider.provider_type == ProviderType::Openai && provider.top_k.is_some() {
        anyhow::bail!("provider '{name}': top_k is not supported by openai providers");
    }

    Ok(())
}
