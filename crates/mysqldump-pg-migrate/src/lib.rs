//! # mysqldump-pg-migrate
//!
//! Migrates multi-database mysqldump files into PostgreSQL.
//!
//! Every source database becomes its own schema, optionally under an umbrella
//! catalog (the schema prefix). The library provides:
//!
//! - **Streaming dump extraction** that never loads the whole file
//! - **Two-tier statement conversion**: sqlparser tree rewrite with a regex
//!   fallback, both followed by schema qualification
//! - **Per-table transactions** with failures isolated to the table
//! - **Bounded worker pool** over the tables of a database
//! - **Deferred foreign keys**, attached `NOT VALID` and optionally validated
//! - **Dry-run** through the exact same conversion path
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use mysqldump_pg_migrate::{Config, Migrator, MigratorConfig, PgWarehouse};
//!
//! #[tokio::main]
//! async fn main() -> mysqldump_pg_migrate::Result<()> {
//!     let config = Config::load("config.yaml")?;
//!     let target = config.require_target("migrate")?;
//!     let warehouse = PgWarehouse::connect(target, config.migration.workers).await?;
//!
//!     let run = MigratorConfig::from_settings(
//!         "all-databases.sql",
//!         vec!["finance".into()],
//!         &config.migration,
//!         false,
//!     );
//!     let report = Migrator::new(run, Some(Arc::new(warehouse)))?.run().await?;
//!     println!("Migrated {} rows", report.rows_migrated());
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod constraints;
pub mod convert;
pub mod core;
pub mod dump;
pub mod error;
pub mod orchestrator;
pub mod target;

// Re-exports for convenient access
pub use config::{Config, MigrationSettings, TargetConfig};
pub use constraints::{ConstraintApplier, ConstraintReport, ConstraintStatus};
pub use convert::{ConversionResult, Converter};
pub use crate::core::identifier::TargetSchema;
pub use dump::{DatabaseContent, DumpScanner, TableContent};
pub use error::{MigrateError, Result};
pub use orchestrator::{
    DatabaseMigrationResult, MigrationReport, Migrator, MigratorConfig, TableMigrationResult,
};
pub use target::{ForeignKeyState, PgWarehouse, Warehouse, WarehouseSession};
