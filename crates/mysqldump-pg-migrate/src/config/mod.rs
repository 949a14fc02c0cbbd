//! Configuration loading and validation.

mod types;
mod validation;

pub use types::*;

use crate::error::{MigrateError, Result};
use crate::target::tls::SslMode;
use std::path::Path;
use tokio_postgres::Config as PgConfig;

impl Config {
    /// Load configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        validation::validate(self)
    }

    /// The target connection, or a configuration error naming `purpose`.
    pub fn require_target(&self, purpose: &str) -> Result<&TargetConfig> {
        self.target.as_ref().ok_or_else(|| {
            MigrateError::Config(format!(
                "{} requires a warehouse connection (set target in the config file or pass --connection-string)",
                purpose
            ))
        })
    }
}

impl TargetConfig {
    /// Parsed SSL mode.
    pub fn ssl_mode(&self) -> Result<SslMode> {
        SslMode::parse(&self.ssl_mode)
    }

    /// Build a tokio-postgres config, optionally connecting to `database`
    /// instead of the configured one.
    pub fn pg_config(&self, database: Option<&str>) -> Result<PgConfig> {
        let mut pg_config = match &self.url {
            Some(url) => url
                .parse::<PgConfig>()
                .map_err(|e| MigrateError::Config(format!("Invalid connection string: {}", e)))?,
            None => {
                let mut pg_config = PgConfig::new();
                pg_config.host(&self.host);
                pg_config.port(self.port);
                pg_config.dbname(&self.database);
                pg_config.user(&self.user);
                pg_config.password(&self.password);
                pg_config
            }
        };

        if let Some(db) = database {
            pg_config.dbname(db);
        }

        Ok(pg_config)
    }

    /// Human-readable endpoint for logs (never includes the password).
    pub fn describe(&self) -> String {
        match self.pg_config(None) {
            Ok(cfg) => {
                let host = cfg
                    .get_hosts()
                    .first()
                    .map(|h| match h {
                        tokio_postgres::config::Host::Tcp(name) => name.clone(),
                        #[cfg(unix)]
                        tokio_postgres::config::Host::Unix(path) => path.display().to_string(),
                    })
                    .unwrap_or_else(|| "localhost".to_string());
                let port = cfg.get_ports().first().copied().unwrap_or(5432);
                format!("{}:{}/{}", host, port, cfg.get_dbname().unwrap_or(""))
            }
            Err(_) => "<invalid connection string>".to_string(),
        }
    }
}
