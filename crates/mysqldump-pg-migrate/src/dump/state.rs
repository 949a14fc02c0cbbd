//! Extraction state machine.
//!
//! [`ExtractionState`] consumes dump lines one at a time and builds the
//! [`DatabaseContent`] of every requested database. It performs no I/O, so the
//! whole state space can be exercised from plain string slices.
//!
//! The state is a pair of [`Phase`] (what is being buffered) and [`Scope`]
//! (whether the current database was requested).

use indexmap::{IndexMap, IndexSet};
use tracing::{debug, warn};

use super::markers::{self, LineMarker};
use super::types::{DatabaseContent, TableContent};

/// What the machine is currently buffering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    InDefinition,
    InData,
}

/// Whether the current database is one of the requested ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    OutsideTarget,
    InsideTarget,
}

/// Whether the caller should keep feeding lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Continue,
    /// Every requested database has been entered and left.
    Done,
}

/// Line-driven extractor for one or more databases.
#[derive(Debug)]
pub struct ExtractionState {
    phase: Phase,
    scope: Scope,
    targets: IndexSet<String>,
    finished: IndexSet<String>,
    /// Database the scanner is currently in, requested or not.
    current: Option<String>,
    /// Table owning the buffer.
    table: Option<String>,
    buffer: String,
    in_literal: bool,
    databases: IndexMap<String, DatabaseContent>,
}

impl ExtractionState {
    /// Create a machine extracting `targets`.
    pub fn new<I, S>(targets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            phase: Phase::Idle,
            scope: Scope::OutsideTarget,
            targets: targets.into_iter().map(Into::into).collect(),
            finished: IndexSet::new(),
            current: None,
            table: None,
            buffer: String::new(),
            in_literal: false,
            databases: IndexMap::new(),
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn scope(&self) -> Scope {
        self.scope
    }

    /// Feed one line, without its line terminator.
    pub fn feed(&mut self, line: &str) -> Step {
        // Boundaries are honored mid-statement, but never inside a literal
        if !self.in_literal {
            if let Some(name) = markers::database_boundary(line) {
                return self.enter_database(name);
            }
        }

        match self.phase {
            Phase::InDefinition => {
                self.push_line(line);
                if markers::is_definition_end(line) {
                    self.finish_definition();
                }
                return Step::Continue;
            }
            Phase::InData => {
                self.push_line(line);
                self.in_literal = markers::literal_state_after(line, self.in_literal);
                if !self.in_literal && line.trim_end().ends_with(';') {
                    self.finish_data();
                }
                return Step::Continue;
            }
            Phase::Idle => {}
        }

        if self.scope == Scope::OutsideTarget {
            return Step::Continue;
        }

        match markers::classify(line) {
            LineMarker::DropTable(name) => {
                self.ensure_table(&name);
            }
            LineMarker::CreateTable(name) => {
                self.ensure_table(&name);
                self.start(Phase::InDefinition, name, line);
                if markers::is_single_line_definition(line) {
                    self.finish_definition();
                }
            }
            LineMarker::Insert(name) => {
                if self.current_content().tables.contains_key(&name) {
                    self.start(Phase::InData, name, line);
                    self.in_literal = markers::literal_state_after(line, false);
                    if !self.in_literal && line.trim_end().ends_with(';') {
                        self.finish_data();
                    }
                } else {
                    *self
                        .current_content()
                        .orphaned_statements
                        .entry(name)
                        .or_insert(0) += 1;
                }
            }
            LineMarker::DatabaseBoundary(_) | LineMarker::Other => {}
        }

        Step::Continue
    }

    /// Finish at end of input and return the extracted databases.
    ///
    /// A data statement still being buffered is kept; an unterminated
    /// definition is dropped.
    pub fn finish(mut self) -> IndexMap<String, DatabaseContent> {
        self.flush();
        for content in self.databases.values() {
            for (table, count) in &content.orphaned_statements {
                warn!(
                    "Skipped {} data statement(s) for unknown table {}.{}",
                    count, content.name, table
                );
            }
        }
        self.databases
    }

    fn enter_database(&mut self, name: String) -> Step {
        if self.current.as_deref() == Some(name.as_str()) {
            return Step::Continue;
        }
        self.flush();

        if self.scope == Scope::InsideTarget {
            if let Some(left) = self.current.take() {
                debug!("Leaving database {}", left);
                self.finished.insert(left);
            }
            if self.finished.len() == self.targets.len() {
                self.scope = Scope::OutsideTarget;
                return Step::Done;
            }
        }

        if self.targets.contains(&name) && !self.finished.contains(&name) {
            debug!("Entering database {}", name);
            self.scope = Scope::InsideTarget;
            self.databases
                .entry(name.clone())
                .or_insert_with(|| DatabaseContent::new(name.clone()));
        } else {
            self.scope = Scope::OutsideTarget;
        }
        self.current = Some(name);
        Step::Continue
    }

    fn current_content(&mut self) -> &mut DatabaseContent {
        let name = self.current.clone().unwrap_or_default();
        self.databases
            .entry(name.clone())
            .or_insert_with(|| DatabaseContent::new(name))
    }

    fn ensure_table(&mut self, name: &str) {
        self.current_content()
            .tables
            .entry(name.to_string())
            .or_insert_with(|| TableContent::placeholder(name));
    }

    fn start(&mut self, phase: Phase, table: String, line: &str) {
        self.phase = phase;
        self.table = Some(table);
        self.buffer.clear();
        self.buffer.push_str(line);
    }

    fn push_line(&mut self, line: &str) {
        self.buffer.push('\n');
        self.buffer.push_str(line);
    }

    /// Close any in-flight buffer.
    fn flush(&mut self) {
        match self.phase {
            Phase::InData => self.finish_data(),
            Phase::InDefinition => {
                warn!(
                    "Unterminated CREATE TABLE for {}; definition discarded",
                    self.table.as_deref().unwrap_or("?")
                );
                self.reset();
            }
            Phase::Idle => {}
        }
    }

    fn finish_definition(&mut self) {
        let statement = std::mem::take(&mut self.buffer);
        if let Some(table) = self.table.take() {
            if let Some(content) = self.current_content().tables.get_mut(&table) {
                content.definition = Some(statement);
            }
        }
        self.reset();
    }

    fn finish_data(&mut self) {
        let statement = std::mem::take(&mut self.buffer);
        if let Some(table) = self.table.take() {
            if let Some(content) = self.current_content().tables.get_mut(&table) {
                content.estimated_rows += markers::estimate_rows(&statement);
                content.data_statements.push(statement);
            }
        }
        self.reset();
    }

    fn reset(&mut self) {
        self.phase = Phase::Idle;
        self.table = None;
        self.buffer.clear();
        self.in_literal = false;
    }
}
