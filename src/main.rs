//! hotkey-relay: Background daemon reporting presses of one global hotkey
//!
//! Binds the configured combination through the platform backend and
//! writes one JSON notification per keydown/keyup to stdout until it
//! receives a shutdown signal. Logs go to stderr.

use std::io::Write;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use hotkey_relay::backend::PlatformBackend;
use hotkey_relay::config::Config;
use hotkey_relay::events::Notification;
use hotkey_relay::hotkey::Hotkey;
use hotkey_relay::lifecycle::ShutdownSignal;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info"))
        )
        .with_writer(std::io::stderr)
        .init();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "hotkey-relay starting"
    );

    // Load configuration
    let config = Config::load()?;
    let (modifiers, key) = config.combination()?;
    info!(hotkey = %config.hotkey, emit_json = config.emit_json, "configuration loaded");

    let shutdown = ShutdownSignal::new();

    let backend = Arc::new(PlatformBackend::new());
    let mut hotkey = Hotkey::new(backend, modifiers, key);
    let name = hotkey.to_string();

    match hotkey.register() {
        Ok(()) => {
            emit(&config, &Notification::Registered { hotkey: name.clone() })?;
        }
        Err(e) => {
            error!(error = %e, "failed to register hotkey");
            warn!("continuing without hotkey support - check Accessibility permissions");
        }
    }

    // Fetch once; valid for as long as the hotkey stays registered
    let keydown = hotkey.keydown_events();
    let keyup = hotkey.keyup_events();
    let mut presses = 0u64;
    let mut releases = 0u64;

    let shutdown_wait = shutdown.wait();
    tokio::pin!(shutdown_wait);

    info!(hotkey = %name, "daemon initialized, entering main loop");

    loop {
        tokio::select! {
            event = keydown.recv() => {
                if event.is_none() {
                    warn!("keydown channel closed");
                    break;
                }
                presses += 1;
                emit(&config, &Notification::Keydown { hotkey: name.clone(), count: presses })?;
            }

            event = keyup.recv() => {
                if event.is_none() {
                    warn!("keyup channel closed");
                    break;
                }
                releases += 1;
                emit(&config, &Notification::Keyup { hotkey: name.clone(), count: releases })?;
            }

            result = &mut shutdown_wait => {
                if let Err(e) = result {
                    error!(?e, "failed to listen for shutdown signals");
                }
                info!("shutdown signal received");
                break;
            }
        }
    }

    // Cleanup
    info!("shutting down...");

    if hotkey.is_registered() {
        match hotkey.unregister() {
            Ok(()) => emit(&config, &Notification::Unregistered { hotkey: name.clone() })?,
            Err(e) => error!(error = %e, "failed to unregister hotkey"),
        }
    }

    info!(presses, releases, "hotkey-relay stopped");

    Ok(())
}

/// Report a notification as a JSON line on stdout, or as a log line
fn emit(config: &Config, notification: &Notification) -> Result<()> {
    if !config.emit_json {
        info!(%notification, "hotkey event");
        return Ok(());
    }

    let line = serde_json::to_string(notification).context("failed to encode notification")?;
    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{}", line).context("failed to write notification")?;
    stdout.flush().context("failed to flush stdout")?;
    Ok(())
}
