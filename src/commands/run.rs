//! Run the supervision loop.
//!
//! The loop runs until SIGTERM or SIGINT (Ctrl+C elsewhere). On either
//! signal the server is stopped gracefully before the process exits.

use anyhow::{Context, Result};
use natsvisor::config::Config;
use natsvisor::supervisor::NodeSupervisor;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Supervise the server described by `config` until a shutdown signal.
pub async fn execute(config: &Config) -> Result<()> {
    let provider = config.address_provider();
    let endpoints = config.node_endpoints(provider.as_ref());

    let mut supervisor = NodeSupervisor::new(
        config.node_spec(endpoints),
        config.resolver()?,
        config.credential_source(),
        config.supervisor_settings(),
    )
    .context("Failed to set up supervisor")?;

    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        wait_for_shutdown_signal().await;
        signal_cancel.cancel();
    });

    let stats = supervisor.run(cancel).await;
    info!(
        cycles = stats.cycles_started,
        unplanned_exits = stats.unplanned_exits,
        failed_cycles = stats.failed_cycles,
        "Exiting"
    );
    Ok(())
}

/// Wait for SIGTERM or SIGINT (Unix) or Ctrl+C (elsewhere).
async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match (
            signal(SignalKind::terminate()),
            signal(SignalKind::interrupt()),
        ) {
            (Ok(mut sigterm), Ok(mut sigint)) => {
                tokio::select! {
                    _ = sigterm.recv() => {
                        info!("Received SIGTERM");
                    }
                    _ = sigint.recv() => {
                        info!("Received SIGINT");
                    }
                }
                return;
            },
            (Err(e), _) | (_, Err(e)) => {
                tracing::error!(error = %e, "Failed to install signal handlers, using Ctrl+C only");
            },
        }
    }

    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Received Ctrl+C"),
        Err(e) => {
            // Without any signal source, never stop on our own.
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        },
    }
}
