//! Configuration for colloquy provider clients
//!
//! Loaded from TOML with `{{ env.VAR }}` placeholder expansion, then
//! validated before any client is built from it.

#![allow(clippy::must_use_candidate)]

mod env;
mod loader;
pub mod logging;
pub mod provider;

use indexmap::IndexMap;
use serde::Deserialize;

pub use env::ExpandError;
pub use logging::{LogFormat, LoggingConfig};
pub use provider::{ProviderConfig, ProviderType};

/// Top-level colloquy configuration
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Log output configuration
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Provider client configurations keyed by name
    #[serde(default)]
    pub providers: IndexMap<String, ProviderConfig>,
}

impl Config {
    /// Look up a provider by its configured name
    pub fn provider(&self, name: &str) -> Option<&ProviderConfig> {
        self.providers.get(name)
    }
}
