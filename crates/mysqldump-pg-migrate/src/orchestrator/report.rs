//! Migration report tree: run → database → table.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::Result;

/// Outcome of migrating one table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableMigrationResult {
    pub table: String,
    pub success: bool,
    /// Rows reported by the warehouse; always zero under dry-run.
    pub rows_migrated: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub duration_seconds: f64,
    /// Conversion warnings, deduplicated, in first-seen order.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl TableMigrationResult {
    pub(crate) fn failed(table: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            success: false,
            rows_migrated: 0,
            error: Some(error.into()),
            duration_seconds: 0.0,
            warnings: Vec::new(),
        }
    }
}

/// Outcome of migrating one source database.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatabaseMigrationResult {
    pub database: String,
    /// Target schema in display form, e.g. `legacy.finance`.
    pub schema: String,
    pub tables: Vec<TableMigrationResult>,
    pub duration_seconds: f64,
    /// Database-level failure that prevented table work (e.g. schema creation).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Skipped data, review-file problems and similar notes.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl DatabaseMigrationResult {
    pub fn success(&self) -> bool {
        self.error.is_none() && self.tables.iter().all(|t| t.success)
    }

    pub fn rows_migrated(&self) -> u64 {
        self.tables.iter().map(|t| t.rows_migrated).sum()
    }

    pub fn failed_tables(&self) -> impl Iterator<Item = &TableMigrationResult> {
        self.tables.iter().filter(|t| !t.success)
    }
}

/// Result of one migrator run.
#[derive(Debug, Clone, Serialize)]
pub struct MigrationReport {
    /// Unique run identifier.
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub dry_run: bool,
    /// The run stopped early on a cancellation request.
    pub cancelled: bool,
    pub databases: Vec<DatabaseMigrationResult>,
    /// Requested databases that are not in the dump.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub skipped_databases: Vec<String>,
}

impl MigrationReport {
    pub(crate) fn new(dry_run: bool) -> Self {
        let now = Utc::now();
        Self {
            run_id: uuid::Uuid::new_v4().to_string(),
            started_at: now,
            completed_at: now,
            dry_run,
            cancelled: false,
            databases: Vec::new(),
            skipped_databases: Vec::new(),
        }
    }

    /// True iff every present database fully succeeded and the run completed.
    pub fn success(&self) -> bool {
        !self.cancelled && self.databases.iter().all(|d| d.success())
    }

    pub fn duration_seconds(&self) -> f64 {
        (self.completed_at - self.started_at).num_milliseconds() as f64 / 1000.0
    }

    pub fn tables_total(&self) -> usize {
        self.databases.iter().map(|d| d.tables.len()).sum()
    }

    pub fn tables_failed(&self) -> usize {
        self.databases.iter().map(|d| d.failed_tables().count()).sum()
    }

    pub fn rows_migrated(&self) -> u64 {
        self.databases.iter().map(|d| d.rows_migrated()).sum()
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
