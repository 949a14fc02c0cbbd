//! Deferred foreign key pass.
//!
//! Tables are loaded in dump order, which need not respect referential
//! dependencies, so foreign keys are stripped during migration and reattached
//! here once all data is in place. Definitions are recovered from the original
//! MySQL `CREATE TABLE` text.
//!
//! Each constraint is attached with `NOT VALID` in its own transaction and,
//! when requested, validated in a second transaction. A constraint left
//! unvalidated by an earlier pass is validated on a later pass that asks for
//! it. A failing constraint is logged and recorded; the pass continues with
//! the next one.

mod extract;

pub use extract::{extract, ForeignKeyDefinition};

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::core::identifier::TargetSchema;
use crate::dump::{DatabaseContent, DumpScanner};
use crate::error::Result;
use crate::target::{ForeignKeyState, Warehouse, WarehouseSession};

/// What happened to one constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstraintStatus {
    /// Attached (and validated, if requested).
    Added,
    /// Already present in the target; nothing was done.
    AlreadyExists,
    /// Already present as `NOT VALID`; validated by this pass.
    Validated,
    Failed,
}

/// Outcome for one foreign key.
#[derive(Debug, Clone, Serialize)]
pub struct ConstraintResult {
    pub database: String,
    pub table: String,
    pub constraint: String,
    pub status: ConstraintStatus,
    pub validated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Outcome of a whole constraint pass.
#[derive(Debug, Clone, Serialize)]
pub struct ConstraintReport {
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub duration_seconds: f64,
    pub validate: bool,
    pub cancelled: bool,
    pub results: Vec<ConstraintResult>,
}

impl ConstraintReport {
    fn count(&self, status: ConstraintStatus) -> usize {
        self.results.iter().filter(|r| r.status == status).count()
    }

    pub fn added(&self) -> usize {
        self.count(ConstraintStatus::Added)
    }

    /// Constraints found in the target, whether or not this pass validated them.
    pub fn already_present(&self) -> usize {
        self.count(ConstraintStatus::AlreadyExists) + self.count(ConstraintStatus::Validated)
    }

    pub fn failed(&self) -> usize {
        self.count(ConstraintStatus::Failed)
    }

    /// True when no constraint failed and the pass ran to completion.
    pub fn success(&self) -> bool {
        self.failed() == 0 && !self.cancelled
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Attach one foreign key through `session`.
///
/// A constraint that is already present is left alone, unless `validate` is
/// set and it is still `NOT VALID`; then only the validation step runs. On
/// failure the open transaction is rolled back.
pub async fn apply(
    session: &mut dyn WarehouseSession,
    definition: &ForeignKeyDefinition,
    target: &TargetSchema,
    validate: bool,
) -> Result<ConstraintStatus> {
    let state = session
        .foreign_key_state(target, &definition.table, &definition.constraint_name)
        .await?;
    match state {
        ForeignKeyState::Absent => {}
        ForeignKeyState::NotValidated if validate => {
            info!(
                "Validating existing constraint {} on {}",
                definition.constraint_name,
                target.qualify(&definition.table)
            );
            in_transaction(session, &definition.validate_sql(target)).await?;
            return Ok(ConstraintStatus::Validated);
        }
        ForeignKeyState::NotValidated | ForeignKeyState::Validated => {
            debug!(
                "Constraint {} already exists on {}",
                definition.constraint_name,
                target.qualify(&definition.table)
            );
            return Ok(ConstraintStatus::AlreadyExists);
        }
    }

    let add = definition.add_sql(target)?;
    in_transaction(session, &add).await?;

    if validate {
        in_transaction(session, &definition.validate_sql(target)).await?;
    }
    Ok(ConstraintStatus::Added)
}

async fn in_transaction(session: &mut dyn WarehouseSession, sql: &str) -> Result<()> {
    session.begin().await?;
    debug!("Executing: {}", sql);
    match session.execute(sql).await {
        Ok(_) => session.commit().await,
        Err(e) => {
            if let Err(rollback_err) = session.rollback().await {
                warn!("Rollback failed: {}", rollback_err);
            }
            Err(e)
        }
    }
}

/// Runs the constraint pass over one or more databases.
pub struct ConstraintApplier {
    warehouse: Arc<dyn Warehouse>,
    schema_prefix: Option<String>,
    validate: bool,
    cancel: CancellationToken,
}

impl ConstraintApplier {
    pub fn new(warehouse: Arc<dyn Warehouse>, schema_prefix: Option<String>) -> Self {
        Self {
            warehouse,
            schema_prefix,
            validate: false,
            cancel: CancellationToken::new(),
        }
    }

    /// Also run the blocking validation step after each attach.
    pub fn with_validation(mut self, validate: bool) -> Self {
        self.validate = validate;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Extract each requested database from the dump and attach its foreign keys.
    ///
    /// Databases absent from the dump are logged and skipped.
    pub async fn run(&self, scanner: &DumpScanner, databases: &[String]) -> Result<ConstraintReport> {
        let started_at = Utc::now();
        let start = Instant::now();
        let available = scanner.run_blocking(|s| s.scan_database_names()).await?;

        let mut results = Vec::new();
        let mut cancelled = false;
        for name in databases {
            if self.cancel.is_cancelled() {
                cancelled = true;
                break;
            }
            if !available.contains(name) {
                warn!("Database {} not found in dump, skipping", name);
                continue;
            }
            let owned = name.clone();
            let content = scanner
                .run_blocking(move |s| s.extract_database(&owned))
                .await?;
            results.extend(self.apply_database(&content).await?);
        }
        cancelled |= self.cancel.is_cancelled();

        let report = ConstraintReport {
            started_at,
            completed_at: Utc::now(),
            duration_seconds: start.elapsed().as_secs_f64(),
            validate: self.validate,
            cancelled,
            results,
        };
        info!(
            "Constraint pass finished: {} added, {} already present, {} failed",
            report.added(),
            report.already_present(),
            report.failed()
        );
        Ok(report)
    }

    /// Attach every foreign key declared in `content`.
    ///
    /// Only session-level problems are returned as errors; individual
    /// constraint failures end up in the results.
    pub async fn apply_database(&self, content: &DatabaseContent) -> Result<Vec<ConstraintResult>> {
        let target = TargetSchema::new(self.schema_prefix.as_deref(), &content.name)?;
        let definitions: Vec<ForeignKeyDefinition> = content
            .tables
            .values()
            .filter_map(|t| t.definition.as_deref().map(|d| extract(d, &t.name)))
            .flatten()
            .collect();

        info!(
            "{}: {} foreign key(s) to attach",
            target,
            definitions.len()
        );
        if definitions.is_empty() {
            return Ok(Vec::new());
        }

        let mut session = self.warehouse.session(&target).await?;
        let mut results = Vec::with_capacity(definitions.len());

        for definition in &definitions {
            if self.cancel.is_cancelled() {
                warn!(
                    "Constraint pass cancelled, {} constraint(s) not attempted",
                    definitions.len() - results.len()
                );
                break;
            }
            let outcome = apply(session.as_mut(), definition, &target, self.validate).await;
            let (status, error) = match outcome {
                Ok(status) => (status, None),
                Err(e) => {
                    error!(
                        database = %content.name,
                        table = %definition.table,
                        constraint = %definition.constraint_name,
                        "Failed to apply constraint: {}",
                        e
                    );
                    (ConstraintStatus::Failed, Some(e.to_string()))
                }
            };
            results.push(ConstraintResult {
                database: content.name.clone(),
                table: definition.table.clone(),
                constraint: definition.constraint_name.clone(),
                status,
                validated: self.validate
                    && matches!(status, ConstraintStatus::Added | ConstraintStatus::Validated),
                error,
            });
        }
        Ok(results)
    }
}
