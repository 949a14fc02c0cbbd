//! Warehouse (target database) access.
//!
//! The migrator and the constraint applier only talk to the warehouse through
//! the [`Warehouse`] and [`WarehouseSession`] traits, so both can be exercised
//! against an in-memory implementation in tests.

mod postgres;
pub mod tls;

pub use postgres::PgWarehouse;

use async_trait::async_trait;

use crate::core::identifier::TargetSchema;
use crate::error::Result;

/// Entry point to the target warehouse.
#[async_trait]
pub trait Warehouse: Send + Sync {
    /// Make sure the umbrella catalog (schema prefix) exists.
    ///
    /// Must be idempotent.
    async fn ensure_catalog(&self, catalog: &str) -> Result<()>;

    /// Open a session in which `target`'s qualified names resolve.
    async fn session(&self, target: &TargetSchema) -> Result<Box<dyn WarehouseSession>>;

    /// Short name for logging.
    fn name(&self) -> &str;
}

/// One connection, used sequentially.
#[async_trait]
pub trait WarehouseSession: Send {
    /// Execute one statement and return the affected row count.
    async fn execute(&mut self, sql: &str) -> Result<u64>;

    /// Start a transaction.
    async fn begin(&mut self) -> Result<()> {
        self.execute("BEGIN").await.map(|_| ())
    }

    /// Commit the open transaction.
    async fn commit(&mut self) -> Result<()> {
        self.execute("COMMIT").await.map(|_| ())
    }

    /// Roll back the open transaction.
    async fn rollback(&mut self) -> Result<()> {
        self.execute("ROLLBACK").await.map(|_| ())
    }

    /// Look up a named foreign key on a table.
    async fn foreign_key_state(
        &mut self,
        target: &TargetSchema,
        table: &str,
        constraint: &str,
    ) -> Result<ForeignKeyState>;
}

/// Presence of a named foreign key in the warehouse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForeignKeyState {
    Absent,
    /// Attached with `NOT VALID` and not validated since.
    NotValidated,
    Validated,
}

#[cfg(test)]
pub(crate) mod testing {
    //! Recording warehouse used by orchestrator and constraint tests.

    use super::*;
    use crate::error::MigrateError;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    /// Foreign keys by (table, constraint), with their validation flag.
    pub type ConstraintMap = HashMap<(String, String), bool>;

    #[derive(Default)]
    pub struct RecordedState {
        pub statements: Vec<String>,
        pub catalogs: Vec<String>,
        pub constraints: ConstraintMap,
    }

    /// Records every statement; fails statements containing a configured needle.
    #[derive(Clone, Default)]
    pub struct RecordingWarehouse {
        pub state: Arc<Mutex<RecordedState>>,
        fail_on: Vec<String>,
    }

    impl RecordingWarehouse {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn failing_on(needle: &str) -> Self {
            Self {
                state: Arc::default(),
                fail_on: vec![needle.to_string()],
            }
        }

        pub fn statements(&self) -> Vec<String> {
            self.state.lock().unwrap().statements.clone()
        }
    }

    #[async_trait]
    impl Warehouse for RecordingWarehouse {
        async fn ensure_catalog(&self, catalog: &str) -> Result<()> {
            self.state.lock().unwrap().catalogs.push(catalog.to_string());
            Ok(())
        }

        async fn session(&self, _target: &TargetSchema) -> Result<Box<dyn WarehouseSession>> {
            Ok(Box::new(RecordingSession {
                state: self.state.clone(),
                fail_on: self.fail_on.clone(),
                pending: Vec::new(),
            }))
        }

        fn name(&self) -> &str {
            "recording"
        }
    }

    pub struct RecordingSession {
        state: Arc<Mutex<RecordedState>>,
        fail_on: Vec<String>,
        pending: Vec<((String, String), bool)>,
    }

    /// Table and constraint named by an `ALTER TABLE ... <clause> "name"` statement.
    fn altered_constraint(sql: &str, clause: &str) -> Option<(String, String)> {
        let (head, rest) = sql.split_once(clause)?;
        let name = rest.trim_start().trim_start_matches('"').split('"').next()?;
        let table = head.rsplit('.').next()?.trim().trim_matches('"');
        Some((table.to_string(), name.to_string()))
    }

    #[async_trait]
    impl WarehouseSession for RecordingSession {
        async fn execute(&mut self, sql: &str) -> Result<u64> {
            match sql {
                "COMMIT" => {
                    let mut state = self.state.lock().unwrap();
                    state.constraints.extend(self.pending.drain(..));
                }
                "ROLLBACK" => self.pending.clear(),
                _ => {}
            }
            self.state.lock().unwrap().statements.push(sql.to_string());

            if self.fail_on.iter().any(|needle| sql.contains(needle.as_str())) {
                return Err(MigrateError::Config(format!("simulated failure: {}", sql)));
            }

            if let Some(key) = altered_constraint(sql, " ADD CONSTRAINT ") {
                self.pending.push((key, !sql.ends_with("NOT VALID")));
            } else if let Some(key) = altered_constraint(sql, " VALIDATE CONSTRAINT ") {
                self.pending.push((key, true));
            }

            // One row per VALUES tuple, approximating PostgreSQL's command tag
            if sql.starts_with("INSERT") {
                return Ok(sql.matches("), (").count() as u64 + 1);
            }
            Ok(0)
        }

        async fn foreign_key_state(
            &mut self,
            _target: &TargetSchema,
            table: &str,
            constraint: &str,
        ) -> Result<ForeignKeyState> {
            let state = self.state.lock().unwrap();
            let key = (table.to_string(), constraint.to_string());
            Ok(match state.constraints.get(&key) {
                None => ForeignKeyState::Absent,
                Some(false) => ForeignKeyState::NotValidated,
                Some(true) => ForeignKeyState::Validated,
            })
        }
    }
}
