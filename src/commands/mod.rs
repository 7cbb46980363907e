pub mod endpoints;
pub mod peers;
pub mod render;
pub mod run;

use anyhow::{Context, Result};
use natsvisor::config::Config;
use natsvisor::logging::init_logging;
use std::path::Path;
use tracing::Level;

/// Load, override and validate the configuration, then start logging.
pub fn load_config(path: &Path, replica: Option<String>, verbose: bool) -> Result<Config> {
    let mut config = Config::load(path)?;
    if let Some(replica) = replica {
        config.node.replica_id = replica;
    }

    let mut log_config = config.log_config();
    if verbose {
        log_config = log_config.level(Level::DEBUG);
    }
    init_logging(&log_config);

    let validation = config
        .validate()
        .with_context(|| format!("Invalid configuration in {}", path.display()))?;
    for warning in &validation.warnings {
        tracing::warn!("{warning}");
    }

    Ok(config)
}
