//! Database client for coachbook
//!
//! A thin wrapper around an `sqlx::Any` pool. Repositories borrow the pool for plain
//! reads and writes; anything that must be atomic runs on a [`DbTransaction`] obtained
//! from [`DbClient::begin`].

use crate::error::DbError;
use coachbook_config::env_vars::config_path_to_env_var;
use coachbook_config::{AppConfig, DatabaseConfig};
use sqlx::pool::PoolOptions;
use sqlx::{Pool, Transaction};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

/// Type alias for a database transaction
pub type DbTransaction<'a> = Transaction<'a, sqlx::Any>;

/// Raw connection type that both pooled connections and transactions dereference to.
pub type DbConnection = sqlx::AnyConnection;

const DEFAULT_MAX_CONNECTIONS: u32 = 5;

/// SQL dialect behind the `Any` pool, detected from the URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Sqlite,
    Postgres,
}

impl Backend {
    fn from_url(db_url: &str) -> Result<Self, DbError> {
        if db_url.starts_with("sqlite:") {
            Ok(Backend::Sqlite)
        } else if db_url.starts_with("postgres:") || db_url.starts_with("postgresql:") {
            Ok(Backend::Postgres)
        } else {
            Err(DbError::UrlError(format!(
                "Unsupported database URL scheme: {}",
                db_url.split(':').next().unwrap_or_default()
            )))
        }
    }
}

/// Database client for coachbook
#[derive(Debug, Clone)]
pub struct DbClient {
    pool: Pool<sqlx::Any>,
    backend: Backend,
}

impl DbClient {
    /// Create a new database client from the `database` section of the app config.
    ///
    /// # Errors
    ///
    /// * The database configuration is missing
    /// * The database URL is empty or unsupported
    /// * The database connection fails
    pub async fn new(config: &Arc<AppConfig>) -> Result<Self, DbError> {
        let db_config = config
            .database
            .as_ref()
            .ok_or_else(|| {
                DbError::ConfigError(format!(
                    "Database configuration is missing, set {}",
                    config_path_to_env_var("database.url")
                ))
            })?;

        Self::from_config(db_config).await
    }

    /// Create a new database client from a database configuration
    pub async fn from_config(db_config: &DatabaseConfig) -> Result<Self, DbError> {
        let db_url = &db_config.url;
        if db_url.is_empty() {
            return Err(DbError::ConfigError("Database URL is empty".to_string()));
        }

        let max_connections = db_config.max_connections.unwrap_or(DEFAULT_MAX_CONNECTIONS);
        Self::connect(db_url, max_connections).await
    }

    /// Create a new database client from a database URL
    pub async fn from_url(db_url: &str) -> Result<Self, DbError> {
        if db_url.is_empty() {
            return Err(DbError::UrlError("Database URL is empty".to_string()));
        }
        Self::connect(db_url, DEFAULT_MAX_CONNECTIONS).await
    }

    async fn connect(db_url: &str, max_connections: u32) -> Result<Self, DbError> {
        let backend = Backend::from_url(db_url)?;
        let pool = Self::create_pool(db_url, max_connections).await?;
        Ok(Self { pool, backend })
    }

    async fn create_pool(db_url: &str, max_connections: u32) -> Result<Pool<sqlx::Any>, DbError> {
        debug!("Creating database pool (max {} connections)", max_connections);

        sqlx::any::install_default_drivers();

        // An in-memory SQLite database lives and dies with its connection, so the pool
        // must never recycle it.
        let in_memory = db_url.contains(":memory:") || db_url.contains("mode=memory");
        let pool_options = if in_memory {
            PoolOptions::new()
                .max_connections(max_connections)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            PoolOptions::new()
                .max_connections(max_connections)
                .acquire_timeout(Duration::from_secs(3))
                .idle_timeout(Duration::from_secs(600))
        };

        if db_url.starts_with("sqlite:") && !in_memory {
            Self::ensure_sqlite_file(db_url)?;
        }

        let pool = pool_options
            .connect_with(sqlx::any::AnyConnectOptions::from_str(db_url)?)
            .await
            .map_err(|e| {
                error!("Failed to create database pool: {}", e);
                DbError::PoolError(e.to_string())
            })?;

        info!("Database pool created successfully");
        Ok(pool)
    }

    /// SQLite will not create a missing file through the `Any` driver, so make sure the
    /// file and its directory exist.
    fn ensure_sqlite_file(db_url: &str) -> Result<(), DbError> {
        let db_path = db_url
            .strip_prefix("sqlite://")
            .or_else(|| db_url.strip_prefix("sqlite:"))
            .unwrap_or(db_url);
        let db_path = db_path.split('?').next().unwrap_or(db_path);
        if db_path.is_empty() {
            return Ok(());
        }

        let path = std::path::Path::new(db_path);
        if let Some(dir) = path.parent() {
            if !dir.as_os_str().is_empty() && !dir.exists() {
                debug!("Creating directory for SQLite database: {:?}", dir);
                std::fs::create_dir_all(dir).map_err(|e| {
                    DbError::PoolError(format!("Failed to create directory: {}", e))
                })?;
            }
        }
        if !path.exists() {
            debug!("Creating empty SQLite database file: {}", db_path);
            std::fs::File::create(path).map_err(|e| {
                DbError::PoolError(format!("Failed to create database file: {}", e))
            })?;
        }
        Ok(())
    }

    pub fn pool(&self) -> &Pool<sqlx::Any> {
        &self.pool
    }

    pub fn backend(&self) -> Backend {
        self.backend
    }

    /// Begin a transaction
    pub async fn begin(&self) -> Result<DbTransaction<'_>, DbError> {
        self.pool
            .begin()
            .await
            .map_err(|e| DbError::TransactionError(e.to_string()))
    }

    /// Begin a transaction that is going to write.
    ///
    /// SQLite takes the write lock up front (`BEGIN IMMEDIATE`), so a competing
    /// writer waits on the busy timeout instead of failing with `SQLITE_BUSY`
    /// when it tries to upgrade a read lock halfway through.
    pub async fn begin_write(&self) -> Result<DbTransaction<'_>, DbError> {
        let tx = match self.backend {
            Backend::Sqlite => self.pool.begin_with("BEGIN IMMEDIATE").await,
            Backend::Postgres => self.pool.begin().await,
        };
        tx.map_err(|e| DbError::TransactionError(e.to_string()))
    }

    /// Execute a statement that returns no rows, yielding the number of rows affected
    pub async fn execute(&self, query: &str) -> Result<u64, DbError> {
        sqlx::query(query)
            .execute(&self.pool)
            .await
            .map(|r| r.rows_affected())
            .map_err(|e| DbError::QueryError(e.to_string()))
    }

    /// Check if the database answers a trivial query
    pub async fn is_healthy(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }
}

impl std::fmt::Display for DbClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "DbClient({:?})", self.backend)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_is_detected_from_scheme() {
        assert_eq!(Backend::from_url("sqlite::memory:").unwrap(), Backend::Sqlite);
        assert_eq!(Backend::from_url("sqlite://data/x.db").unwrap(), Backend::Sqlite);
        assert_eq!(Backend::from_url("postgres://u@h/db").unwrap(), Backend::Postgres);
        assert!(matches!(Backend::from_url("mysql://h/db"), Err(DbError::UrlError(_))));
    }

    #[tokio::test]
    async fn in_memory_client_is_healthy() {
        let client = DbClient::from_config(&DatabaseConfig {
            url: "sqlite::memory:".to_string(),
            max_connections: Some(1),
        })
        .await
        .expect("in-memory pool");
        assert!(client.is_healthy().await);
        assert_eq!(client.backend(), Backend::Sqlite);
    }

    #[tokio::test]
    async fn empty_url_is_a_config_error() {
        let err = DbClient::from_config(&DatabaseConfig::default()).await.unwrap_err();
        assert!(matches!(err, DbError::ConfigError(_)));
    }
}
