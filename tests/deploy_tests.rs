//! Checks that the sample deployment files in `deploy/` stay usable.

use natsvisor::config::{Config, DiscoveryKind};
use natsvisor::render::{RenderContext, Template};
use std::path::PathBuf;

fn deploy_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("deploy")
}

#[test]
fn test_sample_config_validates() {
    let config = Config::load(deploy_dir().join("natsvisor.toml")).unwrap();
    let result = config.validate().unwrap();
    assert!(!result.has_warnings(), "warnings: {:?}", result.warnings);
    assert_eq!(config.discovery.kind, DiscoveryKind::File);
}

#[test]
fn test_sample_template_has_every_token() {
    let template = Template::load(deploy_dir().join("nats.template.conf")).unwrap();
    assert!(template.missing_tokens().is_empty(), "{:?}", template.missing_tokens());
}

#[tokio::test]
async fn test_sample_files_render_cluster_routes() {
    let mut config = Config::load(deploy_dir().join("natsvisor.toml")).unwrap();
    config.node.host = Some("10.0.0.4".to_string());

    let provider = config.address_provider();
    let spec = config.node_spec(config.node_endpoints(provider.as_ref()));
    let own = spec.endpoints.cluster_address().unwrap();

    let resolution = config.resolver().unwrap().resolve(&spec.service, &own).await;
    assert!(!resolution.failed_open());

    let template = Template::load(&spec.template).unwrap();
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

    assert!(Template::residual_tokens(&rendered).is_empty());
    assert!(rendered.contains("listen: 10.0.0.4:4222"));
    assert!(rendered.contains("@10.0.0.5:6222\n"));
    assert!(rendered.contains("@10.0.0.6:6222\n"));
    assert!(!rendered.contains("@10.0.0.4:6222"));
}
