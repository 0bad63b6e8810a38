use std::path::PathBuf;

use clap::Parser;

/// Colloquy command line client
#[derive(Debug, Parser)]
#[command(name = "colloquy", about = "Send a prompt to a configured LLM provider")]
pub struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "colloquy.toml", env = "COLLOQUY_CONFIG")]
    pub config: PathBuf,

    /// Provider name from the configuration (defaults to the first one)
    #[arg(short, long, env = "COLLOQUY_PROVIDER")]
    pub provider: Option<String>,

    /// Print the reply as it is generated
    #[arg(short, long)]
    pub stream: bool,

    /// System prompt
    #[arg(long)]
    pub system: Option<String>,

    /// Override the configured log level
    #[arg(long, env = "COLLOQUY_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Prompt to send
    pub prompt: String,
}
