//! Migration orchestrator - main workflow coordinator.
//!
//! For every requested database that is present in the dump the migrator
//! extracts its tables, optionally writes a review file, ensures the target
//! schema, and then recreates and loads each table in its own transaction.
//! Table failures are recorded and never stop the remaining tables.

mod report;
pub mod review;

pub use report::{DatabaseMigrationResult, MigrationReport, TableMigrationResult};

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use indexmap::{IndexMap, IndexSet};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::MigrationSettings;
use crate::convert::Converter;
use crate::core::identifier::TargetSchema;
use crate::dump::{DatabaseContent, DumpScanner, ProgressCallback};
use crate::error::{MigrateError, Result};
use crate::target::{Warehouse, WarehouseSession};

/// Inputs of one migrator run.
#[derive(Debug, Clone)]
pub struct MigratorConfig {
    pub dump_path: PathBuf,
    /// Databases to migrate, in the order they are processed.
    pub databases: Vec<String>,
    pub schema_prefix: Option<String>,
    pub dry_run: bool,
    pub save_sql: bool,
    pub output_dir: PathBuf,
    pub sample_statements: usize,
    pub workers: usize,
    pub single_pass: bool,
    pub progress_interval: u64,
}

impl MigratorConfig {
    /// Build from file/CLI settings.
    pub fn from_settings(
        dump_path: impl Into<PathBuf>,
        databases: Vec<String>,
        settings: &MigrationSettings,
        dry_run: bool,
    ) -> Self {
        Self {
            dump_path: dump_path.into(),
            databases,
            schema_prefix: settings.schema_prefix.clone(),
            dry_run,
            save_sql: settings.save_sql,
            output_dir: settings.output_dir.clone(),
            sample_statements: settings.sample_statements,
            workers: settings.workers,
            single_pass: settings.single_pass,
            progress_interval: settings.progress_interval,
        }
    }
}

/// Shared state of one database's table jobs.
struct DatabaseJob {
    converter: Arc<Converter>,
    warehouse: Option<Arc<dyn Warehouse>>,
    target: TargetSchema,
    content: DatabaseContent,
}

/// Migration orchestrator.
pub struct Migrator {
    config: MigratorConfig,
    warehouse: Option<Arc<dyn Warehouse>>,
    converter: Arc<Converter>,
    cancel: CancellationToken,
    progress: Option<ProgressCallback>,
}

impl std::fmt::Debug for Migrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Migrator")
            .field("config", &self.config)
            .field("warehouse", &self.warehouse.as_ref().map(|w| w.name()))
            .field("converter", &self.converter)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl Migrator {
    /// Create a migrator.
    ///
    /// A warehouse is required unless `config.dry_run` is set. Under dry-run a
    /// supplied warehouse is never used.
    pub fn new(config: MigratorConfig, warehouse: Option<Arc<dyn Warehouse>>) -> Result<Self> {
        if !config.dry_run && warehouse.is_none() {
            return Err(MigrateError::Config(
                "a target warehouse connection is required unless --dry-run is set".into(),
            ));
        }
        if config.workers == 0 {
            return Err(MigrateError::Config("workers must be at least 1".into()));
        }
        Ok(Self {
            config,
            warehouse,
            converter: Arc::new(Converter::default()),
            cancel: CancellationToken::new(),
            progress: None,
        })
    }

    /// Stop starting new databases and tables once `cancel` fires.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Replace the scanner's progress callback.
    pub fn with_progress(mut self, progress: ProgressCallback) -> Self {
        self.progress = Some(progress);
        self
    }

    fn active_warehouse(&self) -> Option<Arc<dyn Warehouse>> {
        if self.config.dry_run {
            None
        } else {
            self.warehouse.clone()
        }
    }

    /// Run the migration.
    pub async fn run(&self) -> Result<MigrationReport> {
        let mut report = MigrationReport::new(self.config.dry_run);
        info!(
            "Starting migration run {}{}",
            report.run_id,
            if self.config.dry_run { " (dry run)" } else { "" }
        );

        let mut scanner = DumpScanner::new(&self.config.dump_path)?
            .with_progress_interval(self.config.progress_interval);
        if let Some(progress) = &self.progress {
            scanner = scanner.with_progress(progress.clone());
        }

        // Phase 1: Find databases
        info!("Phase 1: Scanning {}", self.config.dump_path.display());
        let available = scanner.run_blocking(|s| s.scan_database_names()).await?;
        let present = self.present_databases(&available, &mut report);

        // Phase 2: Umbrella catalog
        if let (Some(warehouse), Some(prefix)) =
            (self.active_warehouse(), self.config.schema_prefix.as_deref())
        {
            info!("Phase 2: Ensuring schema prefix {}", prefix);
            warehouse.ensure_catalog(prefix).await?;
        }

        // Phase 3: Databases
        let mut prefetched = if self.config.single_pass && present.len() > 1 {
            info!("Extracting {} databases in a single pass", present.len());
            let names = present.clone();
            scanner
                .run_blocking(move |s| s.extract_databases(&names))
                .await?
        } else {
            IndexMap::new()
        };

        for name in &present {
            if self.cancel.is_cancelled() {
                warn!("Cancellation requested, not starting database {}", name);
                report.cancelled = true;
                break;
            }

            let content = match prefetched.shift_remove(name) {
                Some(content) => content,
                None => {
                    let owned = name.clone();
                    scanner
                        .run_blocking(move |s| s.extract_database(&owned))
                        .await?
                }
            };
            let result = self.migrate_database(content).await;
            report.databases.push(result);
        }

        report.cancelled |= self.cancel.is_cancelled();
        report.completed_at = Utc::now();

        info!(
            "Migration {}: {} database(s), {} table(s), {} failed, {} row(s) in {:.1}s",
            if report.success() { "completed" } else { "finished with failures" },
            report.databases.len(),
            report.tables_total(),
            report.tables_failed(),
            report.rows_migrated(),
            report.duration_seconds()
        );
        Ok(report)
    }

    /// Requested databases found in the dump, in request order.
    fn present_databases(
        &self,
        available: &IndexSet<String>,
        report: &mut MigrationReport,
    ) -> Vec<String> {
        let mut present = Vec::new();
        for name in &self.config.databases {
            if available.contains(name) {
                if !present.contains(name) {
                    present.push(name.clone());
                }
            } else {
                warn!("Database {} not found in dump, skipping", name);
                report.skipped_databases.push(name.clone());
            }
        }
        present
    }

    async fn migrate_database(&self, content: DatabaseContent) -> DatabaseMigrationResult {
        let start = Instant::now();
        let mut result = DatabaseMigrationResult {
            database: content.name.clone(),
            schema: content.name.clone(),
            tables: Vec::new(),
            duration_seconds: 0.0,
            error: None,
            warnings: Vec::new(),
        };

        let target = match TargetSchema::new(self.config.schema_prefix.as_deref(), &content.name) {
            Ok(target) => target,
            Err(e) => {
                error!(database = %content.name, "Invalid target schema: {}", e);
                result.error = Some(e.to_string());
                return result;
            }
        };
        result.schema = target.to_string();
        info!(
            "{}: {} table(s), ~{} row(s) -> {}",
            content.name,
            content.table_count(),
            content.total_estimated_rows(),
            target
        );

        for (table, count) in &content.orphaned_statements {
            result.warnings.push(format!(
                "skipped {} data statement(s) for table {} (no table definition seen before them)",
                count, table
            ));
        }

        if self.config.save_sql {
            match review::write(
                &self.config.output_dir,
                &self.converter,
                &target,
                &content,
                self.config.sample_statements,
            ) {
                Ok(path) => info!("Wrote converted SQL for review: {}", path.display()),
                Err(e) => {
                    warn!("Could not write review file for {}: {}", content.name, e);
                    result
                        .warnings
                        .push(format!("review file not written: {}", e));
                }
            }
        }

        let warehouse = self.active_warehouse();
        if let Some(warehouse) = &warehouse {
            if let Err(e) = ensure_schema(warehouse.as_ref(), &target).await {
                error!(database = %content.name, "Failed to create schema {}: {}", target, e);
                result.error = Some(format!("schema creation failed: {}", e));
                result.duration_seconds = start.elapsed().as_secs_f64();
                return result;
            }
        }

        let table_names: Vec<String> = content.tables.keys().cloned().collect();
        let job = Arc::new(DatabaseJob {
            converter: self.converter.clone(),
            warehouse,
            target,
            content,
        });
        result.tables = self.run_tables(job, table_names).await;
        result.duration_seconds = start.elapsed().as_secs_f64();

        info!(
            "{}: {} of {} table(s) migrated, {} row(s) in {:.1}s",
            result.database,
            result.tables.iter().filter(|t| t.success).count(),
            result.tables.len(),
            result.rows_migrated(),
            result.duration_seconds
        );
        result
    }

    /// Run table jobs on a bounded worker pool; results keep dump order.
    async fn run_tables(
        &self,
        job: Arc<DatabaseJob>,
        table_names: Vec<String>,
    ) -> Vec<TableMigrationResult> {
        let workers = self.config.workers.max(1);
        let semaphore = Arc::new(Semaphore::new(workers));
        debug!(
            "Migrating {} table(s) with {} worker(s)",
            table_names.len(),
            workers
        );

        let mut handles = Vec::with_capacity(table_names.len());
        for name in table_names {
            if self.cancel.is_cancelled() {
                info!("Cancellation requested, stopping new table loads");
                break;
            }
            let permit = match semaphore.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => break,
            };
            let job = job.clone();
            let table = name.clone();
            let handle = tokio::spawn(async move {
                let result = migrate_table(&job, &table).await;
                drop(permit);
                result
            });
            handles.push((name, handle));
        }

        let mut results = Vec::with_capacity(handles.len());
        for (name, handle) in handles {
            match handle.await {
                Ok(result) => results.push(result),
                Err(e) => {
                    error!(database = %job.content.name, table = %name, "Table task panicked: {}", e);
                    results.push(TableMigrationResult::failed(
                        name,
                        format!("table task failed: {}", e),
                    ));
                }
            }
        }
        results
    }
}

async fn ensure_schema(warehouse: &dyn Warehouse, target: &TargetSchema) -> Result<()> {
    let mut session = warehouse.session(target).await?;
    session.execute(&target.create_schema_sql()).await?;
    Ok(())
}

/// Collects conversion warnings without repeats.
#[derive(Default)]
struct Warnings(IndexSet<String>);

impl Warnings {
    fn extend(&mut self, warnings: Vec<String>) {
        self.0.extend(warnings);
    }

    fn into_vec(self) -> Vec<String> {
        self.0.into_iter().collect()
    }
}

async fn migrate_table(job: &DatabaseJob, name: &str) -> TableMigrationResult {
    let start = Instant::now();
    let mut warnings = Warnings::default();

    let outcome = load_table(job, name, &mut warnings).await;
    let duration_seconds = start.elapsed().as_secs_f64();

    match outcome {
        Ok(rows) => {
            debug!("{}.{}: {} row(s) in {:.2}s", job.content.name, name, rows, duration_seconds);
            TableMigrationResult {
                table: name.to_string(),
                success: true,
                rows_migrated: rows,
                error: None,
                duration_seconds,
                warnings: warnings.into_vec(),
            }
        }
        Err(message) => {
            error!(
                database = %job.content.name,
                table = %name,
                "Table migration failed: {}",
                message
            );
            TableMigrationResult {
                table: name.to_string(),
                success: false,
                rows_migrated: 0,
                error: Some(message),
                duration_seconds,
                warnings: warnings.into_vec(),
            }
        }
    }
}

/// Convert and (unless dry-run) load one table; returns rows affected.
async fn load_table(
    job: &DatabaseJob,
    name: &str,
    warnings: &mut Warnings,
) -> std::result::Result<u64, String> {
    let table = job
        .content
        .tables
        .get(name)
        .ok_or_else(|| format!("table {} missing from extracted content", name))?;
    let definition = table
        .definition
        .as_deref()
        .ok_or_else(|| "no CREATE TABLE statement found in dump".to_string())?;

    let create = job.converter.convert(definition, &job.target);
    warnings.extend(create.warnings.clone());
    if !create.success {
        return Err(format!(
            "table definition conversion failed: {}",
            create.errors.join("; ")
        ));
    }

    let Some(warehouse) = &job.warehouse else {
        // Dry run: same conversions, nothing sent
        for (index, statement) in table.data_statements.iter().enumerate() {
            let converted = job.converter.convert(statement, &job.target);
            warnings.extend(converted.warnings);
            if !converted.success {
                return Err(data_conversion_error(index, &converted.errors));
            }
        }
        return Ok(0);
    };

    let mut session = warehouse
        .session(&job.target)
        .await
        .map_err(|e| format!("could not open warehouse session: {}", e))?;
    session.begin().await.map_err(|e| e.to_string())?;

    let loaded = load_in_transaction(job, session.as_mut(), table, &create.converted, warnings).await;
    match loaded {
        Ok(rows) => {
            session
                .commit()
                .await
                .map_err(|e| format!("commit failed: {}", e))?;
            Ok(rows)
        }
        Err(message) => {
            if let Err(e) = session.rollback().await {
                warn!("Rollback failed for {}: {}", job.target.qualify(name), e);
            }
            Err(message)
        }
    }
}

async fn load_in_transaction(
    job: &DatabaseJob,
    session: &mut dyn WarehouseSession,
    table: &crate::dump::TableContent,
    create_sql: &str,
    warnings: &mut Warnings,
) -> std::result::Result<u64, String> {
    let drop_sql = format!("DROP TABLE IF EXISTS {} CASCADE", job.target.qualify(&table.name));
    session
        .execute(&drop_sql)
        .await
        .map_err(|e| format!("drop failed: {}", e))?;
    session
        .execute(create_sql)
        .await
        .map_err(|e| format!("create failed: {}", e))?;

    let mut rows = 0u64;
    for (index, statement) in table.data_statements.iter().enumerate() {
        let converted = job.converter.convert(statement, &job.target);
        warnings.extend(converted.warnings);
        if !converted.success {
            return Err(data_conversion_error(index, &converted.errors));
        }
        if converted.converted.is_empty() {
            continue;
        }
        rows += session
            .execute(&converted.converted)
            .await
            .map_err(|e| format!("data statement {} failed: {}", index + 1, e))?;
    }
    Ok(rows)
}

fn data_conversion_error(index: usize, errors: &[String]) -> String {
    format!(
        "data statement {} could not be converted: {}",
        index + 1,
        errors.join("; ")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::target::testing::RecordingWarehouse;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const DUMP: &str = "\
-- MySQL dump 10.13
--
-- Current Database: `finance`
--

USE `finance`;

DROP TABLE IF EXISTS `invoice`;
CREATE TABLE `invoice` (
  `id` int NOT NULL AUTO_INCREMENT,
  `amount` int(10) unsigned DEFAULT NULL,
  PRIMARY KEY (`id`),
  KEY `idx_amount` (`amount`)
) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4;

LOCK TABLES `invoice` WRITE;
INSERT INTO `invoice` VALUES (1,10),(2,20),(3,30);
INSERT INTO `invoice` VALUES (4,40),(5,50);
UNLOCK TABLES;

DROP TABLE IF EXISTS `beta`;
CREATE TABLE `beta` (
  `id` int NOT NULL,
  `kind` enum('a','b') DEFAULT NULL
) ENGINE=InnoDB;
INSERT INTO `beta` VALUES (1,'a'),(2,'b');

DROP TABLE IF EXISTS `gamma`;
CREATE TABLE `gamma` (
  `id` int NOT NULL
) ENGINE=InnoDB;
INSERT INTO `gamma` VALUES (1);

DROP TABLE IF EXISTS `dropped_only`;

--
-- Current Database: `crm`
--

USE `crm`;

INSERT INTO `lost` VALUES (1);
DROP TABLE IF EXISTS `contact`;
CREATE TABLE `contact` (
  `id` int NOT NULL
) ENGINE=InnoDB;
INSERT INTO `contact` VALUES (1),(2);
";

    const INVOICE_ONLY: &str = "\
-- Current Database: `finance`
USE `finance`;
DROP TABLE IF EXISTS `invoice`;
CREATE TABLE `invoice` (
  `id` int NOT NULL AUTO_INCREMENT,
  `amount` int(10) unsigned DEFAULT NULL,
  PRIMARY KEY (`id`),
  KEY `idx_amount` (`amount`)
) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4;
INSERT INTO `invoice` VALUES (1,10),(2,20),(3,30);
INSERT INTO `invoice` VALUES (4,40),(5,50);
";

    fn dump_file(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    fn config(dump: &NamedTempFile, databases: &[&str], dry_run: bool) -> MigratorConfig {
        let settings = MigrationSettings {
            schema_prefix: Some("legacy".into()),
            ..Default::default()
        };
        MigratorConfig::from_settings(
            dump.path(),
            databases.iter().map(|d| d.to_string()).collect(),
            &settings,
            dry_run,
        )
    }

    fn quiet(migrator: Migrator) -> Migrator {
        migrator.with_progress(Arc::new(|_| {}))
    }

    #[tokio::test]
    async fn test_invoice_scenario() {
        let dump = dump_file(INVOICE_ONLY);
        let warehouse = RecordingWarehouse::new();
        let migrator = quiet(
            Migrator::new(
                config(&dump, &["finance"], false),
                Some(Arc::new(warehouse.clone())),
            )
            .unwrap(),
        );

        let report = migrator.run().await.unwrap();
        assert!(report.success());
        let db = &report.databases[0];
        assert_eq!(db.database, "finance");
        assert_eq!(db.schema, "legacy.finance");
        assert_eq!(db.tables.len(), 1);
        assert_eq!(db.tables[0].table, "invoice");
        assert!(db.tables[0].success);
        assert_eq!(db.tables[0].rows_migrated, 5);

        let statements = warehouse.statements();
        assert_eq!(warehouse.state.lock().unwrap().catalogs, vec!["legacy"]);
        assert!(statements.contains(&"CREATE SCHEMA IF NOT EXISTS \"finance\"".to_string()));
        assert!(statements
            .contains(&"DROP TABLE IF EXISTS legacy.\"finance\".\"invoice\" CASCADE".to_string()));
        let create = statements
            .iter()
            .find(|s| s.starts_with("CREATE TABLE"))
            .unwrap();
        assert!(create.starts_with("CREATE TABLE legacy.\"finance\".\"invoice\""));
        assert!(!create.to_uppercase().contains("AUTO_INCREMENT"));
        assert!(!create.to_uppercase().contains("UNSIGNED"));
        assert!(!create.contains("idx_amount"));
    }

    #[tokio::test]
    async fn test_failed_table_does_not_stop_others() {
        let dump = dump_file(DUMP);
        let warehouse = RecordingWarehouse::failing_on("\"beta\" VALUES");
        let migrator = quiet(
            Migrator::new(
                config(&dump, &["finance"], false),
                Some(Arc::new(warehouse.clone())),
            )
            .unwrap(),
        );

        let report = migrator.run().await.unwrap();
        let tables = &report.databases[0].tables;
        let names: Vec<_> = tables.iter().map(|t| t.table.as_str()).collect();
        assert_eq!(names, vec!["invoice", "beta", "gamma", "dropped_only"]);

        assert!(tables[0].success);
        assert_eq!(tables[0].rows_migrated, 5);
        assert!(!tables[1].success);
        assert!(tables[1].error.as_deref().unwrap().contains("data statement 1 failed"));
        assert!(tables[2].success);
        assert_eq!(tables[2].rows_migrated, 1);
        assert_eq!(
            tables[3].error.as_deref(),
            Some("no CREATE TABLE statement found in dump")
        );
        assert!(warehouse.statements().contains(&"ROLLBACK".to_string()));
        assert!(!report.success());
    }

    #[tokio::test]
    async fn test_dry_run_matches_real_run() {
        let dump = dump_file(DUMP);
        let warehouse = RecordingWarehouse::new();

        let real = quiet(
            Migrator::new(
                config(&dump, &["finance", "crm"], false),
                Some(Arc::new(warehouse.clone())),
            )
            .unwrap(),
        )
        .run()
        .await
        .unwrap();

        let idle = RecordingWarehouse::new();
        let dry = quiet(
            Migrator::new(
                config(&dump, &["finance", "crm"], true),
                Some(Arc::new(idle.clone())),
            )
            .unwrap(),
        )
        .run()
        .await
        .unwrap();

        assert!(dry.dry_run);
        assert!(idle.statements().is_empty());
        assert!(idle.state.lock().unwrap().catalogs.is_empty());
        assert_eq!(real.databases.len(), dry.databases.len());
        for (r, d) in real.databases.iter().zip(&dry.databases) {
            assert_eq!(r.database, d.database);
            assert_eq!(r.schema, d.schema);
            assert_eq!(r.warnings, d.warnings);
            assert_eq!(r.tables.len(), d.tables.len());
            for (rt, dt) in r.tables.iter().zip(&d.tables) {
                assert_eq!(rt.table, dt.table);
                assert_eq!(rt.success, dt.success);
                assert_eq!(rt.warnings, dt.warnings);
                assert_eq!(dt.rows_migrated, 0);
            }
        }
        // enum column produces a lossy-type warning in both modes
        assert!(!dry.databases[0].tables[1].warnings.is_empty());
    }

    #[tokio::test]
    async fn test_dry_run_needs_no_warehouse() {
        let dump = dump_file(INVOICE_ONLY);
        let report = quiet(Migrator::new(config(&dump, &["finance"], true), None).unwrap())
            .run()
            .await
            .unwrap();
        assert!(report.success());
        assert_eq!(report.rows_migrated(), 0);
    }

    #[test]
    fn test_real_run_requires_warehouse() {
        let dump = dump_file(INVOICE_ONLY);
        let err = Migrator::new(config(&dump, &["finance"], false), None).unwrap_err();
        assert!(matches!(err, MigrateError::Config(_)));
    }

    #[test]
    fn test_debug_names_warehouse_and_strategies() {
        let dump = dump_file(INVOICE_ONLY);
        let warehouse: Arc<dyn Warehouse> = Arc::new(RecordingWarehouse::new());
        let migrator = Migrator::new(config(&dump, &["finance"], false), Some(warehouse)).unwrap();
        let rendered = format!("{:?}", migrator);
        assert!(rendered.contains("Some(\"recording\")"), "{}", rendered);
        assert!(rendered.contains("primary: \"tree\""), "{}", rendered);
        assert!(rendered.contains("cancelled: false"), "{}", rendered);
    }

    #[tokio::test]
    async fn test_absent_database_is_skipped() {
        let dump = dump_file(INVOICE_ONLY);
        let report = quiet(
            Migrator::new(config(&dump, &["ghost", "finance"], true), None).unwrap(),
        )
        .run()
        .await
        .unwrap();
        assert_eq!(report.skipped_databases, vec!["ghost"]);
        assert_eq!(report.databases.len(), 1);
        assert!(report.success());
    }

    #[tokio::test]
    async fn test_orphaned_statements_are_reported() {
        let dump = dump_file(DUMP);
        let report = quiet(Migrator::new(config(&dump, &["crm"], true), None).unwrap())
            .run()
            .await
            .unwrap();
        let crm = &report.databases[0];
        assert_eq!(crm.warnings.len(), 1);
        assert!(crm.warnings[0].contains("lost"));
        assert!(crm.tables[0].success);
    }

    #[tokio::test]
    async fn test_workers_keep_dump_order() {
        let dump = dump_file(DUMP);
        let mut cfg = config(&dump, &["finance"], false);
        cfg.workers = 4;
        let migrator = quiet(
            Migrator::new(cfg, Some(Arc::new(RecordingWarehouse::new()))).unwrap(),
        );
        let report = migrator.run().await.unwrap();
        let names: Vec<_> = report.databases[0]
            .tables
            .iter()
            .map(|t| t.table.as_str())
            .collect();
        assert_eq!(names, vec!["invoice", "beta", "gamma", "dropped_only"]);
    }

    #[tokio::test]
    async fn test_single_pass_matches_per_database() {
        let dump = dump_file(DUMP);
        let per_db = quiet(Migrator::new(config(&dump, &["crm", "finance"], true), None).unwrap())
            .run()
            .await
            .unwrap();

        let mut cfg = config(&dump, &["crm", "finance"], true);
        cfg.single_pass = true;
        let single = quiet(Migrator::new(cfg, None).unwrap()).run().await.unwrap();

        let summary = |r: &MigrationReport| {
            r.databases
                .iter()
                .map(|d| (d.database.clone(), d.tables.len(), d.warnings.clone()))
                .collect::<Vec<_>>()
        };
        assert_eq!(summary(&per_db), summary(&single));
        assert_eq!(single.databases[0].database, "crm");
    }

    #[tokio::test]
    async fn test_cancelled_run_starts_nothing() {
        let dump = dump_file(DUMP);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let report = quiet(
            Migrator::new(config(&dump, &["finance"], true), None)
                .unwrap()
                .with_cancellation(cancel),
        )
        .run()
        .await
        .unwrap();
        assert!(report.cancelled);
        assert!(report.databases.is_empty());
        assert!(!report.success());
    }

    #[tokio::test]
    async fn test_review_file_written_under_dry_run() {
        let dump = dump_file(DUMP);
        let out = tempfile::tempdir().unwrap();
        let mut cfg = config(&dump, &["finance"], true);
        cfg.save_sql = true;
        cfg.output_dir = out.path().to_path_buf();
        cfg.sample_statements = 1;

        quiet(Migrator::new(cfg, None).unwrap()).run().await.unwrap();
        let review = std::fs::read_to_string(out.path().join("finance_converted.sql")).unwrap();
        assert!(review.contains("CREATE SCHEMA IF NOT EXISTS \"finance\";"));
        assert!(review.contains("-- ... 1 more data statement(s) omitted"));
    }
}
