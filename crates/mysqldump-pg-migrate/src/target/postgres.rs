//! PostgreSQL warehouse backed by deadpool-postgres.
//!
//! One pool is kept per catalog database. Sessions for a target schema with a
//! catalog connect to that catalog's database, so three-part names such as
//! `legacy."finance"."invoice"` resolve. Catalog creation goes through the
//! administrative database named in the configuration.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use deadpool_postgres::{Manager, ManagerConfig, Object, Pool, RecyclingMethod};
use tokio::sync::Mutex;
use tokio_postgres::error::SqlState;
use tracing::{debug, info, warn};

use super::tls::SslMode;
use super::{ForeignKeyState, Warehouse, WarehouseSession};
use crate::config::TargetConfig;
use crate::core::identifier::{quote_pg, TargetSchema};
use crate::error::{MigrateError, Result};

/// Connection pool timeout.
const POOL_CONNECTION_TIMEOUT: Duration = Duration::from_secs(30);

/// PostgreSQL warehouse.
pub struct PgWarehouse {
    config: TargetConfig,
    ssl_mode: SslMode,
    max_conns: usize,
    /// Pools keyed by catalog; `None` is the administrative database.
    pools: Mutex<HashMap<Option<String>, Pool>>,
}

impl PgWarehouse {
    /// Connect to the administrative database and verify it answers.
    pub async fn connect(config: &TargetConfig, max_conns: usize) -> Result<Self> {
        let ssl_mode = config.ssl_mode()?;
        if !ssl_mode.requires_tls() {
            warn!("PostgreSQL TLS is disabled. Credentials will be transmitted in plaintext.");
        }

        let warehouse = Self {
            config: config.clone(),
            ssl_mode,
            max_conns: max_conns.max(1),
            pools: Mutex::new(HashMap::new()),
        };
        warehouse.pool_for(None).await?;

        info!("Connected to PostgreSQL warehouse: {}", config.describe());
        Ok(warehouse)
    }

    /// Get or lazily create the pool for `catalog`.
    async fn pool_for(&self, catalog: Option<&str>) -> Result<Pool> {
        let key = catalog.map(str::to_string);
        let mut pools = self.pools.lock().await;
        if let Some(pool) = pools.get(&key) {
            return Ok(pool.clone());
        }

        let pool = self.build_pool(catalog)?;
        let database = catalog.unwrap_or(&self.config.database);
        let client = pool.get().await.map_err(|e| {
            MigrateError::pool(e, format!("testing connection to database {}", database))
        })?;
        client.simple_query("SELECT 1").await?;
        debug!("Opened warehouse pool for database {}", database);

        pools.insert(key, pool.clone());
        Ok(pool)
    }

    fn build_pool(&self, catalog: Option<&str>) -> Result<Pool> {
        let mut pg_config = self.config.pg_config(catalog)?;
        pg_config.keepalives(true);
        pg_config.keepalives_idle(Duration::from_secs(30));
        pg_config.connect_timeout(POOL_CONNECTION_TIMEOUT);

        let mgr_config = ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        };

        let mgr = match self.ssl_mode.connector()? {
            Some(tls) => Manager::from_config(pg_config, tls, mgr_config),
            None => Manager::from_config(pg_config, tokio_postgres::NoTls, mgr_config),
        };
        Pool::builder(mgr)
            .max_size(self.max_conns)
            .build()
            .map_err(|e| MigrateError::pool(e, "creating PostgreSQL warehouse pool"))
    }
}

#[async_trait]
impl Warehouse for PgWarehouse {
    async fn ensure_catalog(&self, catalog: &str) -> Result<()> {
        let quoted = quote_pg(catalog)?;
        let pool = self.pool_for(None).await?;
        let client = pool
            .get()
            .await
            .map_err(|e| MigrateError::pool(e, "checking catalog database"))?;

        let exists = client
            .query_opt("SELECT 1 FROM pg_database WHERE datname = $1", &[&catalog])
            .await?
            .is_some();
        if exists {
            debug!("Catalog database {} already exists", catalog);
            return Ok(());
        }

        // CREATE DATABASE has no IF NOT EXISTS; a concurrent creator is fine
        match client
            .batch_execute(&format!("CREATE DATABASE {}", quoted))
            .await
        {
            Ok(()) => {
                info!("Created catalog database {}", catalog);
                Ok(())
            }
            Err(e) if e.code() == Some(&SqlState::DUPLICATE_DATABASE) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn session(&self, target: &TargetSchema) -> Result<Box<dyn WarehouseSession>> {
        let pool = self.pool_for(target.catalog()).await?;
        let client = pool
            .get()
            .await
            .map_err(|e| MigrateError::pool(e, format!("opening session for {}", target)))?;
        Ok(Box::new(PgSession { client }))
    }

    fn name(&self) -> &str {
        "postgres"
    }
}

/// One pooled PostgreSQL connection.
struct PgSession {
    client: Object,
}

#[async_trait]
impl WarehouseSession for PgSession {
    async fn execute(&mut self, sql: &str) -> Result<u64> {
        Ok(self.client.execute(sql, &[]).await?)
    }

    async fn begin(&mut self) -> Result<()> {
        Ok(self.client.batch_execute("BEGIN").await?)
    }

    async fn commit(&mut self) -> Result<()> {
        Ok(self.client.batch_execute("COMMIT").await?)
    }

    async fn rollback(&mut self) -> Result<()> {
        Ok(self.client.batch_execute("ROLLBACK").await?)
    }

    async fn foreign_key_state(
        &mut self,
        target: &TargetSchema,
        table: &str,
        constraint: &str,
    ) -> Result<ForeignKeyState> {
        let row = self
            .client
            .query_opt(
                "SELECT c.convalidated FROM pg_catalog.pg_constraint c \
                 JOIN pg_catalog.pg_class t ON t.oid = c.conrelid \
                 JOIN pg_catalog.pg_namespace n ON n.oid = t.relnamespace \
                 WHERE c.contype = 'f' AND n.nspname = $1 AND t.relname = $2 AND c.conname = $3",
                &[&target.schema(), &table, &constraint],
            )
            .await?;
        Ok(match row.map(|r| r.get::<_, bool>(0)) {
            None => ForeignKeyState::Absent,
            Some(false) => ForeignKeyState::NotValidated,
            Some(true) => ForeignKeyState::Validated,
        })
    }
}
