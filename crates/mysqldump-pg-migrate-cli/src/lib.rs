//! Pieces shared by the `mysqldump-pg-migrate` and `mysqldump-pg-constraints`
//! executables.

pub mod logging;
pub mod signals;
pub mod summary;

use std::path::Path;

use mysqldump_pg_migrate::{Config, Result, TargetConfig};
use tracing::info;

/// Load the optional config file and apply a `--connection-string` override.
pub fn load_config(path: Option<&Path>, connection_string: Option<&str>) -> Result<Config> {
    let mut config = match path {
        Some(path) => {
            let config = Config::load(path)?;
            info!("Loaded configuration from {:?}", path);
            config
        }
        None => Config::default(),
    };

    if let Some(url) = connection_string {
        config.target = Some(TargetConfig::from_url(url));
    }
    config.validate()?;
    Ok(config)
}
