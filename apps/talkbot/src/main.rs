//! Talkbot - headless session runner.
//!
//! Runs a bot session against the scripted replay transport. Useful for
//! exercising handler manifests, auto-return and reconnect settings without a
//! live voice chat server.

mod config;
mod replay;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use talkbot_core::{bootstrap_session, ConsumerQueues, SessionServices};
use tokio::signal;

use crate::config::AppConfig;
use crate::replay::{load_script, ReplayTransport, SilentPlayback};

/// Talkbot - voice chat bot session runner.
#[derive(Parser, Debug)]
#[command(name = "talkbot")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file (YAML).
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace).
    #[arg(short, long, default_value = "info", env = "TALKBOT_LOG_LEVEL")]
    log_level: log::LevelFilter,

    /// Event script to replay (overrides config file).
    #[arg(short, long, value_name = "FILE", env = "TALKBOT_SCRIPT")]
    script: Option<PathBuf>,

    /// Handler manifest or package directory (overrides config file).
    #[arg(long, value_name = "PATH")]
    handlers: Option<PathBuf>,

    /// Keep running after the script has been replayed.
    #[arg(long)]
    keep_running: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    env_logger::Builder::new()
        .filter_level(args.log_level)
        .format_timestamp_millis()
        .init();

    log::info!("Talkbot v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let mut config =
        AppConfig::load(args.config.as_deref()).context("Failed to load configuration")?;

    // Apply CLI overrides
    if let Some(script) = args.script {
        config.replay.script = Some(script);
    }
    if let Some(handlers) = args.handlers {
        config.session.event_handling.load_event_handlers = true;
        config.session.event_handling.event_handlers_path = Some(handlers);
    }
    if args.keep_running {
        config.replay.exit_when_drained = false;
    }

    let script = match &config.replay.script {
        Some(path) => load_script(path)?,
        None => Vec::new(),
    };
    log::info!(
        "Configuration: username={}, reconnection_attempts={}, script events={}",
        config.session.username,
        config.session.reconnection_attempts,
        script.len()
    );

    let transport = Arc::new(ReplayTransport::new(
        &config.session.username,
        &config.replay,
        script,
    ));
    let drained = transport.drained();

    let services = bootstrap_session(
        &config.session,
        transport,
        Arc::new(SilentPlayback),
        tokio::runtime::Handle::current(),
    )
    .context("Failed to bootstrap session")?;

    let SessionServices {
        mut dispatcher,
        handle,
        queues,
        ..
    } = services;

    let consumers = tokio::spawn(drain_queues(queues));

    // The dispatcher blocks on transport polls and backoff sleeps; keep it
    // off the async workers. A refused first connect is retried there too.
    let mut worker = tokio::task::spawn_blocking(move || {
        dispatcher.connect()?;
        dispatcher.run()
    });
    let exit_when_drained = config.replay.exit_when_drained;

    let result = tokio::select! {
        result = &mut worker => result,
        _ = shutdown_signal() => {
            log::info!("Shutdown signal received, cleaning up...");
            handle.close();
            worker.await
        }
        _ = drained.cancelled(), if exit_when_drained => {
            log::info!("Script replayed, stopping");
            handle.close();
            worker.await
        }
    };

    consumers.abort();

    result.context("Dispatcher thread panicked")?.context("Session terminated")?;

    log::info!("Shutdown complete");
    Ok(())
}

/// Logs everything the dispatcher forwards to the bot's consumers.
async fn drain_queues(mut queues: ConsumerQueues) {
    loop {
        tokio::select! {
            Some(error) = queues.errors.recv() => {
                log::warn!("[Consumer] Server error {}: {}", error.code, error.message);
            }
            Some(command_id) = queues.successes.recv() => {
                log::debug!("[Consumer] Command {} succeeded", command_id);
            }
            Some(message) = queues.text_messages.recv() => {
                log::info!("[Consumer] Message from {}: {}", message.from_username, message.content);
            }
            Some(file) = queues.uploaded_files.recv() => {
                log::info!("[Consumer] Uploaded {} ({} bytes)", file.name, file.size);
            }
            else => break,
        }
    }
}

/// Waits for a shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            log::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                log::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
