//! OS signal handling.
//!
//! # Responsibilities
//! - SIGHUP: reload the credential store (key + known hosts) in place
//! - SIGTERM / ctrl-c: trigger graceful shutdown
//!
//! # Design Decisions
//! - SIGHUP reloads credentials, never the configuration or the listener;
//!   the outcome is logged and counted, with no other side effect.
//! - Signal tasks run for the life of the process.

use std::sync::Arc;

use crate::credentials::CredentialStore;
use crate::lifecycle::shutdown::Shutdown;
use crate::observability::metrics;

/// Install the process signal handlers.
pub fn spawn_signal_handlers(credentials: Arc<CredentialStore>, shutdown: Shutdown) {
    spawn_reload_handler(credentials);
    spawn_shutdown_handler(shutdown);
}

#[cfg(unix)]
fn spawn_reload_handler(credentials: Arc<CredentialStore>) {
    use tokio::signal::unix::{signal, SignalKind};

    let mut hangup = signal(SignalKind::hangup()).expect("failed to install SIGHUP handler");
    tokio::spawn(async move {
        while hangup.recv().await.is_some() {
            tracing::info!("got SIGHUP, reloading known hosts and key file");
            match credentials.reload().await {
                Ok(version) => {
                    tracing::info!(version, "successfully reloaded");
                    metrics::record_reload("ok");
                }
                Err(err) => {
                    tracing::error!(error = %err, "reload failed");
                    metrics::record_reload("error");
                }
            }
        }
    });
}

#[cfg(not(unix))]
fn spawn_reload_handler(_credentials: Arc<CredentialStore>) {
    tracing::warn!("credential reload on SIGHUP is only available on unix");
}

fn spawn_shutdown_handler(shutdown: Shutdown) {
    tokio::spawn(async move {
        wait_for_termination().await;
        tracing::info!("shutdown signal received");
        shutdown.trigger();
    });
}

#[cfg(unix)]
async fn wait_for_termination() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate =
        signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = terminate.recv() => {}
    }
}

#[cfg(not(unix))]
async fn wait_for_termination() {
    let _ = tokio::signal::ctrl_c().await;
}
