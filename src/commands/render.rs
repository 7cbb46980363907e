//! Dry-run rendering: discover once and print the configuration.

use anyhow::{Context, Result};
use natsvisor::config::Config;
use natsvisor::render::{RenderContext, Template};

/// Print the configuration the next launch would use.
pub async fn execute(config: &Config) -> Result<()> {
    let provider = config.address_provider();
    let endpoints = config.node_endpoints(provider.as_ref());
    let spec = config.node_spec(endpoints);
    let own = spec
        .endpoints
        .cluster_address()
        .context("Invalid cluster address for this node")?;

    let resolution = config.resolver()?.resolve(&spec.service, &own).await;
    let template = Template::load(&spec.template)?;
    let credentials = config.current_credentials();
    let log_path = spec.paths.log_file();
    let settings = config.supervisor_settings();

    let rendered = template.render(&RenderContext {
        endpoints: &spec.endpoints,
        credentials: &credentials,
        peers: &resolution.peers,
        log_path: &log_path,
        route_scheme: &settings.route_scheme,
    });

    let residual = Template::residual_tokens(&rendered);
    if !residual.is_empty() {
        tracing::warn!(tokens = ?residual, "Rendered text still contains tokens");
    }

    print!("{rendered}");
    Ok(())
}
