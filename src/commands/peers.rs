//! Print resolved peers.

use anyhow::{Context, Result};
use natsvisor::config::Config;
use natsvisor::discovery::ResolutionOutcome;

/// Resolve peers once and print them with the resolution outcome.
pub async fn execute(config: &Config, json: bool) -> Result<()> {
    let provider = config.address_provider();
    let endpoints = config.node_endpoints(provider.as_ref());
    let own = endpoints
        .cluster_address()
        .context("Invalid cluster address for this node")?;
    let service = natsvisor::endpoints::ServiceIdentity::new(config.node.service.clone());

    let resolution = config.resolver()?.resolve(&service, &own).await;

    if json {
        let outcome = match &resolution.outcome {
            ResolutionOutcome::Resolved { attempt } => serde_json::json!({
                "status": "resolved",
                "attempt": attempt,
            }),
            ResolutionOutcome::FailedOpen {
                attempts,
                last_error,
            } => serde_json::json!({
                "status": "failed_open",
                "attempts": attempts,
                "last_error": last_error,
            }),
        };
        let output = serde_json::json!({
            "service": service.as_str(),
            "self": own.to_string(),
            "peers": resolution.peers.iter().map(ToString::to_string).collect::<Vec<_>>(),
            "malformed": resolution.malformed,
            "outcome": outcome,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!("Service: {service}");
    println!("Self:    {own}");
    match &resolution.outcome {
        ResolutionOutcome::Resolved { attempt } => {
            println!("Status:  resolved (attempt {attempt})");
        },
        ResolutionOutcome::FailedOpen {
            attempts,
            last_error,
        } => {
            println!("Status:  failed open after {attempts} attempts: {last_error}");
        },
    }
    if resolution.malformed > 0 {
        println!("Skipped: {} malformed records", resolution.malformed);
    }
    if resolution.peers.is_empty() {
        println!("\nNo peers; the server would start as a single node.");
    } else {
        println!("\nPeers:");
        for peer in &resolution.peers {
            println!("  {peer}");
        }
    }
    Ok(())
}
