//! Log output for colloquy
//!
//! Installs a `tracing-subscriber` registry with an env filter and a text or
//! JSON formatter writing to stderr.

use anyhow::Context;
use colloquy_config::{LogFormat, LoggingConfig};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the global subscriber
///
/// `RUST_LOG` takes precedence over `level_override`, which takes precedence
/// over the configured level.
///
/// # Errors
///
/// Returns an error if the filter does not parse or a global subscriber is
/// already installed.
pub fn init(config: &LoggingConfig, level_override: Option<&str>) -> anyhow::Result<()> {
    let filter = build_filter(config, level_override)?;

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr);

    let registry = tracing_subscriber::registry().with(filter);

    match config.format {
        LogFormat::Text => registry.with(fmt_layer).try_init(),
        LogFormat::Json => registry.with(fmt_layer.json()).try_init(),
    }
    .context("failed to install tracing subscriber")
}

fn build_filter(config: &LoggingConfig, level_override: Option<&str>) -> anyhow::Result<EnvFilter> {
    if let Ok(directives) = std::env::var(EnvFilter::DEFAULT_ENV)
        && !directives.is_empty()
    {
        return EnvFilter::try_new(&directives).with_context(|| format!("invalid {} '{directives}'", EnvFilter::DEFAULT_ENV));
    }

    let level = level_override.unwrap_or(&config.level);
    EnvFilter::try_new(level).with_context(|| format!("invalid log level '{level}'"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(level: &str) -> LoggingConfig {
        LoggingConfig {
            level: level.to_owned(),
            format: LogFormat::Text,
        }
    }

    #[test]
    fn configured_level_is_used() {
        temp_env::with_var_unset("RUST_LOG", || {
            let filter = build_filter(&config("debug"), None).unwrap();
            assert_eq!(filter.to_string(), "debug");
        });
    }

    #[test]
    fn override_beats_config_and_env_beats_both() {
        temp_env::with_var_unset("RUST_LOG", || {
            let filter = build_filter(&config("info"), Some("warn")).unwrap();
            assert_eq!(filter.to_string(), "warn");
        });

        temp_env::with_var("RUST_LOG", Some("colloquy_llm=trace"), || {
            let filter = build_filter(&config("info"), Some("warn")).unwrap();
            assert_eq!(filter.to_string(), "colloquy_llm=trace");
        });
    }

    #[test]
    fn invalid_level_is_rejected() {
        temp_env::with_var_unset("RUST_LOG", || {
            let err = build_filter(&config("colloquy=loud"), None).unwrap_err();
            assert_eq!(err.to_string(), "invalid log level 'colloquy=loud'");
        });
    }
}
