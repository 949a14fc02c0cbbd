//! Extracted dump content.

use indexmap::IndexMap;
use serde::Serialize;

/// Position in the dump file, used for progress reporting only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DumpLocation {
    /// 1-based number of the last line read.
    pub line: u64,
    /// Bytes consumed so far.
    pub byte_offset: u64,
}

/// One extracted table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableContent {
    /// Table name as written in the dump.
    pub name: String,
    /// Raw `CREATE TABLE` text. `None` when only a drop marker was seen.
    pub definition: Option<String>,
    /// Raw data statements, in dump order.
    pub data_statements: Vec<String>,
    /// Value tuples counted across `data_statements`. Not authoritative.
    pub estimated_rows: u64,
}

impl TableContent {
    /// Empty placeholder registered by a drop marker.
    pub fn placeholder(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn has_definition(&self) -> bool {
        self.definition.is_some()
    }
}

/// One source database's extracted tables.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DatabaseContent {
    /// Source database name.
    pub name: String,
    /// Tables in the order they first appear in the dump.
    pub tables: IndexMap<String, TableContent>,
    /// Data statements skipped because their table was not known yet, by table.
    pub orphaned_statements: IndexMap<String, u64>,
}

impl DatabaseContent {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn table_count(&self) -> usize {
        self.tables.len()
    }

    pub fn total_estimated_rows(&self) -> u64 {
        self.tables.values().map(|t| t.estimated_rows).sum()
    }

    /// Total number of skipped data statements.
    pub fn orphaned_total(&self) -> u64 {
        self.orphaned_statements.values().sum()
    }

    /// True if the database was never seen in the dump.
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty() && self.orphaned_statements.is_empty()
    }
}

/// Per-database result of [`DumpScanner::summarize`](super::DumpScanner::summarize).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DatabaseSummary {
    pub table_count: usize,
}
