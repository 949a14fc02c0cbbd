//! Configuration type definitions.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Warehouse (PostgreSQL) connection. Not needed for scan/preview/dry-run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<TargetConfig>,

    /// Migration behavior configuration.
    #[serde(default)]
    pub migration: MigrationSettings,
}

/// Warehouse (PostgreSQL) connection configuration.
///
/// Either `url` is set, or the discrete host/port/database/user/password
/// fields are used to build the connection.
#[derive(Clone, Serialize, Deserialize)]
pub struct TargetConfig {
    /// Full connection string (`postgres://...` or `host=... user=...`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Database host.
    #[serde(default)]
    pub host: String,

    /// Database port (default: 5432).
    #[serde(default = "default_pg_port")]
    pub port: u16,

    /// Administrative database to connect to (default: "postgres").
    #[serde(default = "default_database")]
    pub database: String,

    /// Username.
    #[serde(default)]
    pub user: String,

    /// Password.
    #[serde(default)]
    pub password: String,

    /// SSL mode (default: "disable").
    #[serde(default = "default_ssl_mode")]
    pub ssl_mode: String,
}

impl TargetConfig {
    /// Target built from an explicit connection string.
    pub fn from_url(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            host: String::new(),
            port: default_pg_port(),
            database: default_database(),
            user: String::new(),
            password: String::new(),
            ssl_mode: default_ssl_mode(),
        }
    }
}

impl fmt::Debug for TargetConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TargetConfig")
            .field("url", &self.url.as_ref().map(|_| "[REDACTED]"))
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .field("ssl_mode", &self.ssl_mode)
            .finish()
    }
}

/// Migration behavior configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationSettings {
    /// Umbrella catalog under which every source database gets a schema.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_prefix: Option<String>,

    /// Tables loaded concurrently within one database (default: 1).
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Extract all requested databases in one pass over the dump.
    #[serde(default)]
    pub single_pass: bool,

    /// Write a reviewable converted-SQL file per database.
    #[serde(default)]
    pub save_sql: bool,

    /// Directory for converted-SQL files.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Data statements per table included in the converted-SQL file.
    #[serde(default = "default_sample_statements")]
    pub sample_statements: usize,

    /// Lines between scanner progress reports.
    #[serde(default = "default_progress_interval")]
    pub progress_interval: u64,
}

impl Default for MigrationSettings {
    fn default() -> Self {
        Self {
            schema_prefix: None,
            workers: default_workers(),
            single_pass: false,
            save_sql: false,
            output_dir: default_output_dir(),
            sample_statements: default_sample_statements(),
            progress_interval: default_progress_interval(),
        }
    }
}

fn default_pg_port() -> u16 {
    5432
}

fn default_database() -> String {
    "postgres".to_string()
}

fn default_ssl_mode() -> String {
    "disable".to_string()
}

fn default_workers() -> usize {
    1
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("converted_sql")
}

fn default_sample_statements() -> usize {
    5
}

fn default_progress_interval() -> u64 {
    100_000
}
