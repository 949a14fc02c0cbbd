//! Configuration validation.

use super::Config;
use crate::error::{MigrateError, Result};
use crate::target::tls::SslMode;

/// Validate the configuration.
pub fn validate(config: &Config) -> Result<()> {
    if let Some(target) = &config.target {
        SslMode::parse(&target.ssl_mode)?;

        match &target.url {
            Some(url) if url.trim().is_empty() => {
                return Err(MigrateError::Config("target.url cannot be empty".into()));
            }
            Some(_) => {}
            None => {
                if target.host.is_empty() {
                    return Err(MigrateError::Config(
                        "target.host is required when target.url is not set".into(),
                    ));
                }
                if target.database.is_empty() {
                    return Err(MigrateError::Config("target.database is required".into()));
                }
                if target.user.is_empty() {
                    return Err(MigrateError::Config("target.user is required".into()));
                }
            }
        }

        // Surfaces malformed connection strings at startup
        target.pg_config(None)?;
    }

    if config.migration.workers == 0 {
        return Err(MigrateError::Config(
            "migration.workers must be at least 1".into(),
        ));
    }
    if config.migration.progress_interval == 0 {
        return Err(MigrateError::Config(
            "migration.progress_interval must be at least 1".into(),
        ));
    }
    if let Some(prefix) = &config.migration.schema_prefix {
        crate::core::identifier::validate_identifier(prefix)?;
    }

    Ok(())
}
