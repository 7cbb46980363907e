//! Print this node's registration payload.

use anyhow::Result;
use natsvisor::config::Config;
use natsvisor::endpoints::EndpointReporter;

/// Print the JSON payload other nodes' resolvers read.
pub fn execute(config: &Config) -> Result<()> {
    let provider = config.address_provider();
    let endpoints = config.node_endpoints(provider.as_ref());
    let reporter = EndpointReporter::new(&endpoints, provider.as_ref());
    println!(
        "{}",
        serde_json::to_string_pretty(&reporter.registration_payload())?
    );
    Ok(())
}
