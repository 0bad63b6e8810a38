#![allow(clippy::must_use_candidate, clippy::missing_errors_doc)]

mod args;

use std::io::Write;

use anyhow::Context;
use args::Args;
use clap::Parser;
use colloquy_config::Config;
use colloquy_llm::{LlmError, Message, Provider, RequestContext, Response, StreamError};
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = Config::load(&args.config)?;
    colloquy_telemetry::init(&config.logging, args.log_level.as_deref())?;

    let (name, provider_config) = match &args.provider {
        Some(name) => config
            .provider(name)
            .map(|provider| (name.as_str(), provider))
            .with_context(|| format!("provider '{name}' is not configured"))?,
        None => config
            .providers
            .first()
            .map(|(name, provider)| (name.as_str(), provider))
            .context("no providers configured")?,
    };

    let provider = colloquy_llm::from_config(name, provider_config, Vec::new())?;

    let mut messages = Vec::with_capacity(2);
    if let Some(system) = &args.system {
        messages.push(Message::system(system.as_str()));
    }
    messages.push(Message::user(args.prompt.as_str()));

    let cancellation = CancellationToken::new();
    let cancel_on_signal = cancellation.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        cancel_on_signal.cancel();
    });

    let context = RequestContext::with_cancellation(cancellation);
    tracing::info!(provider = %name, request_id = %context.request_id, stream = args.stream, "sending prompt");

    if args.stream {
        stream(provider.as_ref(), &context, &messages).await
    } else {
        generate(provider.as_ref(), &context, &messages).await
    }
}

async fn generate(provider: &dyn Provider, context: &RequestContext, messages: &[Message]) -> anyhow::Result<()> {
    let response = match provider.generate(context, messages).await {
        Ok(response) => response,
        Err(err @ LlmError::Partial { .. }) => {
            tracing::warn!(error = %err, "printing partial response");
            err.into_partial_response().context("partial error without response")?
        }
        Err(err) => return Err(err.into()),
    };

    print_reply(&response)
}

async fn stream(provider: &dyn Provider, context: &RequestContext, messages: &[Message]) -> anyhow::Result<()> {
    let mut stdout = std::io::stdout();
    let mut printed = 0;

    let mut on_event = |event: Result<&Response, &StreamError>| {
        let Ok(snapshot) = event else {
            return false;
        };

        let text = snapshot.text();
        let Some(delta) = text.get(printed..) else {
            return true;
        };
        printed = text.len();

        stdout.write_all(delta.as_bytes()).and_then(|()| stdout.flush()).is_ok()
    };

    let response = provider.generate_stream(context, messages, Some(&mut on_event)).await?;
    println!();

    for call in response.message.tool_calls() {
        println!("tool call {}: {}({})", call.id, call.name, call.input);
    }

    if let Some(usage) = response.usage() {
        tracing::info!(input_tokens = usage.input_tokens, output_tokens = usage.output_tokens, "stream complete");
    }

    Ok(())
}

fn print_reply(response: &Response) -> anyhow::Result<()> {
    let mut stdout = std::io::stdout().lock();

    writeln!(stdout, "{}", response.text())?;
    for call in response.message.tool_calls() {
        writeln!(stdout, "tool call {}: {}({})", call.id, call.name, call.input)?;
    }

    if let Some(reason) = response.stop_reason() {
        tracing::info!(stop_reason = reason, "reply complete");
    }

    Ok(())
}

/// Wait for a shutdown signal (`SIGINT` or `SIGTERM`)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }

    tracing::info!("cancelling request");
}
