#![allow(dead_code)]

pub mod mock_provider;

use colloquy_config::{ProviderConfig, ProviderType};

/// Provider configuration pointed at a mock backend
pub fn provider_config(provider_type: ProviderType, base_url: &str) -> ProviderConfig {
    ProviderConfig {
        api_key: Some("test-key".into()),
        base_url: Some(base_url.parse().expect("valid URL")),
        ..ProviderConfig::new(provider_type)
    }
}
