//! # parley
//!
//! Terminal front end for the Parley chat client — wires settings, logging,
//! and the session runtime to a line-oriented prompt.
//!
//! Plain lines are sent as chat messages; `/reset` starts a fresh session,
//! `/quit` exits.

#![deny(unsafe_code)]

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing_subscriber::EnvFilter;

use parley_client::manager::ConnectionStatus;
use parley_client::runtime::SessionRuntime;
use parley_core::{Message, Sender, Timeline};
use parley_settings::ParleySettings;

/// Parley terminal chat client.
#[derive(Parser, Debug)]
#[command(name = "parley", about = "Realtime chat client")]
struct Cli {
    /// Base URL of the REST bootstrap interface.
    #[arg(long)]
    api_url: Option<String>,

    /// URL of the realtime WebSocket endpoint.
    #[arg(long)]
    ws_url: Option<String>,

    /// Path to a settings file (defaults to `~/.parley/settings.json`).
    #[arg(long)]
    settings: Option<PathBuf>,
}

/// Merge CLI overrides over loaded settings.
fn resolve_settings(args: &Cli) -> Result<ParleySettings> {
    let mut settings = match &args.settings {
        Some(path) => parley_settings::load_settings_from_path(path)
            .with_context(|| format!("failed to load settings from {}", path.display()))?,
        None => parley_settings::load_settings().context("failed to load settings")?,
    };
    if let Some(api_url) = &args.api_url {
        settings.backend.api_base_url = api_url.clone();
    }
    if let Some(ws_url) = &args.ws_url {
        settings.backend.ws_url = ws_url.clone();
    }
    Ok(settings)
}

/// One printable line per message.
fn render_message(message: &Message) -> String {
    let who = match message.sender {
        Sender::User => "you",
        Sender::Bot => "assistant",
    };
    format!("{who}: {}", message.text)
}

fn render_status(status: ConnectionStatus) -> &'static str {
    match status {
        ConnectionStatus::Disconnected => "[disconnected]",
        ConnectionStatus::Connecting => "[connecting…]",
        ConnectionStatus::Connected => "[connected]",
        ConnectionStatus::Degraded => {
            "[disconnected — reconnect attempts exhausted, restart to retry]"
        }
        ConnectionStatus::Closed => "[closed]",
    }
}

/// Print messages as they land in the timeline.
async fn print_timeline_updates(timeline: Arc<Timeline>) {
    let mut revision = timeline.subscribe();
    let mut printed = 0usize;
    loop {
        let snapshot = timeline.snapshot();
        // A replace can shrink the timeline (reset, history reload).
        if snapshot.len() < printed {
            printed = 0;
            println!("--- conversation reloaded ---");
        }
        for message in &snapshot[printed..] {
            // Messages still streaming are printed once complete.
            if message.is_streaming {
                break;
            }
            println!("{}", render_message(message));
            printed += 1;
        }
        if revision.changed().await.is_err() {
            break;
        }
    }
}

/// Print connection status transitions.
async fn print_status_updates(mut status: watch::Receiver<ConnectionStatus>) {
    loop {
        let current = *status.borrow_and_update();
        eprintln!("{}", render_status(current));
        if current == ConnectionStatus::Closed || status.changed().await.is_err() {
            break;
        }
    }
}

/// Surface bootstrap errors as they are published.
async fn print_bootstrap_errors(mut errors: watch::Receiver<Option<String>>) {
    while errors.changed().await.is_ok() {
        if let Some(message) = errors.borrow_and_update().clone() {
            eprintln!("error: {message}");
        }
    }
}

fn spawn_printers(runtime: &SessionRuntime) -> Vec<JoinHandle<()>> {
    vec![
        tokio::spawn(print_timeline_updates(runtime.timeline().clone())),
        tokio::spawn(print_status_updates(runtime.connection_status())),
        tokio::spawn(print_bootstrap_errors(runtime.bootstrap_errors())),
    ]
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();
    let settings = resolve_settings(&args)?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("PARLEY_LOG")
                .unwrap_or_else(|_| EnvFilter::new(settings.logging.level.as_filter_str())),
        )
        .with_writer(std::io::stderr)
        .init();

    let runtime = SessionRuntime::new(&settings).context("failed to build session runtime")?;

    let session_id = runtime.start().await.context("failed to start session")?;
    tracing::info!(%session_id, "session ready");

    let printers = spawn_printers(&runtime);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("failed to read stdin")? {
        match line.trim() {
            "" => {}
            "/quit" => break,
            "/reset" => {
                if let Err(error) = runtime.reset().await {
                    eprintln!("reset failed: {error}");
                }
            }
            text => runtime.send_message(text).await,
        }
    }

    runtime.shutdown();
    for printer in printers {
        printer.abort();
    }
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
