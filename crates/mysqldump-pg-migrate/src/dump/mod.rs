//! Streaming mysqldump scanner and extractor.
//!
//! The dump is read line by line and never held in memory as a whole. Each
//! public operation is one forward pass over the file:
//!
//! - [`DumpScanner::scan_database_names`] lists the databases present.
//! - [`DumpScanner::summarize`] counts table definitions per database.
//! - [`DumpScanner::extract_database`] extracts one database, stopping as soon
//!   as the dump moves on to another database.
//! - [`DumpScanner::extract_databases`] extracts several databases in a single
//!   pass.

pub mod markers;
pub mod state;
mod types;

pub use state::{ExtractionState, Phase, Scope, Step};
pub use types::{DatabaseContent, DatabaseSummary, DumpLocation, TableContent};

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use indexmap::{IndexMap, IndexSet};
use tracing::{debug, info};

use crate::error::{MigrateError, Result};
use markers::LineMarker;

/// Callback invoked every `progress_interval` lines.
pub type ProgressCallback = Arc<dyn Fn(DumpLocation) + Send + Sync>;

/// Default number of lines between progress reports.
pub const DEFAULT_PROGRESS_INTERVAL: u64 = 100_000;

const READ_BUFFER_SIZE: usize = 256 * 1024;

/// Scanner bound to one dump file.
#[derive(Clone)]
pub struct DumpScanner {
    path: PathBuf,
    progress_interval: u64,
    progress: ProgressCallback,
}

impl std::fmt::Debug for DumpScanner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DumpScanner")
            .field("path", &self.path)
            .field("progress_interval", &self.progress_interval)
            .finish()
    }
}

fn stderr_progress(location: DumpLocation) {
    eprintln!(
        "  ... {} lines scanned ({:.1} MiB)",
        location.line,
        location.byte_offset as f64 / (1024.0 * 1024.0)
    );
}

impl DumpScanner {
    /// Bind to `path`, failing with [`MigrateError::DumpNotFound`] if it does not exist.
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(MigrateError::DumpNotFound(path.to_path_buf()));
        }
        Ok(Self {
            path: path.to_path_buf(),
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
            progress: Arc::new(stderr_progress),
        })
    }

    /// Replace the progress callback.
    pub fn with_progress(mut self, callback: ProgressCallback) -> Self {
        self.progress = callback;
        self
    }

    /// Change how many lines pass between progress reports.
    pub fn with_progress_interval(mut self, interval: u64) -> Self {
        self.progress_interval = interval.max(1);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Distinct database names, in the order they first appear.
    pub fn scan_database_names(&self) -> Result<IndexSet<String>> {
        let mut names = IndexSet::new();
        self.for_each_line(|line| {
            if let Some(name) = markers::database_boundary(line) {
                names.insert(name);
            }
            Step::Continue
        })?;
        info!("Found {} database(s) in {}", names.len(), self.path.display());
        Ok(names)
    }

    /// Table-definition count per database.
    pub fn summarize(&self) -> Result<IndexMap<String, DatabaseSummary>> {
        let mut summary: IndexMap<String, DatabaseSummary> = IndexMap::new();
        let mut current: Option<String> = None;
        self.for_each_line(|line| {
            match markers::classify(line) {
                LineMarker::DatabaseBoundary(name) => {
                    summary.entry(name.clone()).or_default();
                    current = Some(name);
                }
                LineMarker::CreateTable(_) => {
                    if let Some(db) = &current {
                        summary.entry(db.clone()).or_default().table_count += 1;
                    }
                }
                _ => {}
            }
            Step::Continue
        })?;
        Ok(summary)
    }

    /// Extract one database.
    ///
    /// A name absent from the dump yields an empty [`DatabaseContent`].
    pub fn extract_database(&self, name: &str) -> Result<DatabaseContent> {
        let mut databases = self.extract_databases(&[name.to_string()])?;
        Ok(databases
            .shift_remove(name)
            .unwrap_or_else(|| DatabaseContent::new(name)))
    }

    /// Extract several databases in one pass.
    ///
    /// The result holds one entry per requested name, in request order.
    pub fn extract_databases(&self, names: &[String]) -> Result<IndexMap<String, DatabaseContent>> {
        let mut state = ExtractionState::new(names.iter().cloned());
        self.for_each_line(|line| state.feed(line))?;
        let mut found = state.finish();

        let mut ordered = IndexMap::with_capacity(names.len());
        for name in names {
            let content = found
                .shift_remove(name)
                .unwrap_or_else(|| DatabaseContent::new(name.clone()));
            debug!(
                "Extracted {}: {} table(s), ~{} row(s)",
                name,
                content.table_count(),
                content.total_estimated_rows()
            );
            ordered.insert(name.clone(), content);
        }
        Ok(ordered)
    }

    /// Run a scanner operation on tokio's blocking pool.
    pub async fn run_blocking<T, F>(&self, op: F) -> Result<T>
    where
        F: FnOnce(&DumpScanner) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let scanner = self.clone();
        tokio::task::spawn_blocking(move || op(&scanner))
            .await
            .map_err(|e| MigrateError::Extraction(format!("scan task failed: {}", e)))?
    }

    /// Drive `visit` over every line until it returns [`Step::Done`].
    fn for_each_line<F>(&self, mut visit: F) -> Result<()>
    where
        F: FnMut(&str) -> Step,
    {
        let file = File::open(&self.path)?;
        let mut reader = BufReader::with_capacity(READ_BUFFER_SIZE, file);
        let mut raw = Vec::with_capacity(4096);
        let mut location = DumpLocation::default();

        loop {
            raw.clear();
            let read = reader.read_until(b'\n', &mut raw)?;
            if read == 0 {
                break;
            }
            location.line += 1;
            location.byte_offset += read as u64;

            // Dumps may carry binary data in latin1 columns
            let text = String::from_utf8_lossy(&raw);
            let line = text.trim_end_matches(['\n', '\r']);

            if visit(line) == Step::Done {
                debug!("Stopped scanning at line {}", location.line);
                break;
            }
            if location.line % self.progress_interval == 0 {
                (self.progress)(location);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::atomic::{AtomicU64, Ordering};
    use tempfile::NamedTempFile;

    const DUMP: &str = "\
-- MySQL dump 10.13
/*!40101 SET NAMES utf8mb4 */;

--
-- Current Database: `finance`
--

CREATE DATABASE /*!32312 IF NOT EXISTS*/ `finance`;

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

DROP TABLE IF EXISTS `payment`;
CREATE TABLE `payment` (
  `id` int NOT NULL,
  `invoice_id` int NOT NULL,
  CONSTRAINT `fk_payment_invoice` FOREIGN KEY (`invoice_id`) REFERENCES `invoice` (`id`)
) ENGINE=InnoDB;

--
-- Current Database: `crm`
--

USE `crm`;

DROP TABLE IF EXISTS `contact`;
CREATE TABLE `contact` (
  `id` int NOT NULL
) ENGINE=InnoDB;
INSERT INTO `contact` VALUES (1);
";

    fn dump_file(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_missing_dump_is_reported() {
        let err = DumpScanner::new("/definitely/not/here.sql").unwrap_err();
        assert!(matches!(err, MigrateError::DumpNotFound(_)));
    }

    #[test]
    fn test_scan_database_names() {
        let file = dump_file(DUMP);
        let names = DumpScanner::new(file.path()).unwrap().scan_database_names().unwrap();
        assert_eq!(names.into_iter().collect::<Vec<_>>(), vec!["finance", "crm"]);
    }

    #[test]
    fn test_summarize_counts_tables() {
        let file = dump_file(DUMP);
        let summary = DumpScanner::new(file.path()).unwrap().summarize().unwrap();
        assert_eq!(summary["finance"].table_count, 2);
        assert_eq!(summary["crm"].table_count, 1);
    }

    #[test]
    fn test_extract_database() {
        let file = dump_file(DUMP);
        let scanner = DumpScanner::new(file.path()).unwrap();
        let finance = scanner.extract_database("finance").unwrap();

        assert_eq!(finance.name, "finance");
        assert_eq!(
            finance.tables.keys().collect::<Vec<_>>(),
            vec!["invoice", "payment"]
        );
        let invoice = &finance.tables["invoice"];
        assert_eq!(invoice.data_statements.len(), 2);
        assert_eq!(invoice.estimated_rows, 5);
        assert!(invoice
            .definition
            .as_deref()
            .unwrap()
            .ends_with(") ENGINE=InnoDB DEFAULT CHARSET=utf8mb4;"));
        assert_eq!(finance.total_estimated_rows(), 5);
    }

    #[test]
    fn test_extraction_is_idempotent() {
        let file = dump_file(DUMP);
        let scanner = DumpScanner::new(file.path()).unwrap();
        let first = scanner.extract_database("finance").unwrap();
        let second = scanner.extract_database("finance").unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_extract_unknown_database_is_empty() {
        let file = dump_file(DUMP);
        let scanner = DumpScanner::new(file.path()).unwrap();
        let missing = scanner.extract_database("nope").unwrap();
        assert!(missing.is_empty());
    }

    #[test]
    fn test_single_pass_matches_per_name_extraction() {
        let file = dump_file(DUMP);
        let scanner = DumpScanner::new(file.path()).unwrap();
        let names = vec!["crm".to_string(), "finance".to_string()];
        let both = scanner.extract_databases(&names).unwrap();

        assert_eq!(both.keys().collect::<Vec<_>>(), vec!["crm", "finance"]);
        assert_eq!(both["finance"], scanner.extract_database("finance").unwrap());
        assert_eq!(both["crm"], scanner.extract_database("crm").unwrap());
    }

    #[test]
    fn test_progress_callback_fires() {
        let file = dump_file(DUMP);
        let calls = Arc::new(AtomicU64::new(0));
        let seen = calls.clone();
        let scanner = DumpScanner::new(file.path())
            .unwrap()
            .with_progress_interval(10)
            .with_progress(Arc::new(move |_| {
                seen.fetch_add(1, Ordering::SeqCst);
            }));
        scanner.scan_database_names().unwrap();
        let lines = DUMP.lines().count() as u64;
        assert_eq!(calls.load(Ordering::SeqCst), lines / 10);
    }
}
