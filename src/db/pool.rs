//! Database connection pool
//!
//! [`Database`] holds either a SQLite or a MySQL pool. Repositories see it as
//! a [`DynDatabasePool`] and pick their SQL dialect from
//! [`DatabasePool::driver`].

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{
    mysql::{MySqlPool, MySqlPoolOptions},
    sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions},
};
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use crate::config::{DatabaseConfig, DatabaseDriver};

const SQLITE_MAX_CONNECTIONS: u32 = 20;
const MYSQL_MAX_CONNECTIONS: u32 = 30;

/// Driver-agnostic access to the connection pool
#[async_trait]
pub trait DatabasePool: Send + Sync {
    fn driver(&self) -> DatabaseDriver;

    fn as_sqlite(&self) -> Option<&SqlitePool>;

    fn as_mysql(&self) -> Option<&MySqlPool>;

    /// Run a statement that returns no rows; yields the affected row count
    async fn execute(&self, statement: &str) -> Result<u64>;

    /// Round-trip a trivial query
    async fn ping(&self) -> Result<()>;

    /// The SQLite pool, or an error on MySQL
    fn sqlite(&self) -> Result<&SqlitePool> {
        self.as_sqlite()
            .ok_or_else(|| anyhow::anyhow!("Expected a SQLite pool, driver is {:?}", self.driver()))
    }

    /// The MySQL pool, or an error on SQLite
    fn mysql(&self) -> Result<&MySqlPool> {
        self.as_mysql()
            .ok_or_else(|| anyhow::anyhow!("Expected a MySQL pool, driver is {:?}", self.driver()))
    }
}

/// Shared handle used by every repository
pub type DynDatabasePool = Arc<dyn DatabasePool>;

/// Connected pool for one of the supported drivers
#[derive(Debug, Clone)]
pub enum Database {
    Sqlite(SqlitePool),
    Mysql(MySqlPool),
}

impl Database {
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        match config.driver {
            DatabaseDriver::Sqlite => Self::connect_sqlite(&config.url).await,
            DatabaseDriver::Mysql => Self::connect_mysql(&config.url).await,
        }
    }

    async fn connect_sqlite(url: &str) -> Result<Self> {
        let target = SqliteTarget::parse(url);
        if let Some(dir) = &target.directory {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create database directory: {:?}", dir))?;
        }

        let options = SqliteConnectOptions::from_str(&target.url)
            .with_context(|| format!("Invalid SQLite URL: {}", url))?
            .create_if_missing(true)
            .foreign_keys(true);

        // Every connection to `:memory:` opens its own database.
        let max_connections = if target.in_memory { 1 } else { SQLITE_MAX_CONNECTIONS };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .with_context(|| format!("Failed to open SQLite database: {}", url))?;
        Ok(Database::Sqlite(pool))
    }

    async fn connect_mysql(url: &str) -> Result<Self> {
        let url = if url.starts_with("mysql://") {
            url.to_string()
        } else {
            format!("mysql://{}", url)
        };
        let pool = MySqlPoolOptions::new()
            .max_connections(MYSQL_MAX_CONNECTIONS)
            .connect(&url)
            .await
            .context("Failed to connect to MySQL")?;
        Ok(Database::Mysql(pool))
    }
}

#[async_trait]
impl DatabasePool for Database {
    fn driver(&self) -> DatabaseDriver {
        match self {
            Database::Sqlite(_) => DatabaseDriver::Sqlite,
            Database::Mysql(_) => DatabaseDriver::Mysql,
        }
    }

    fn as_sqlite(&self) -> Option<&SqlitePool> {
        match self {
            Database::Sqlite(pool) => Some(pool),
            Database::Mysql(_) => None,
        }
    }

    fn as_mysql(&self) -> Option<&MySqlPool> {
        match self {
            Database::Mysql(pool) => Some(pool),
            Database::Sqlite(_) => None,
        }
    }

    async fn execute(&self, statement: &str) -> Result<u64> {
        let affected = match self {
            Database::Sqlite(pool) => sqlx::query(statement).execute(pool).await?.rows_affected(),
            Database::Mysql(pool) => sqlx::query(statement).execute(pool).await?.rows_affected(),
        };
        Ok(affected)
    }

    async fn ping(&self) -> Result<()> {
        match self {
            Database::Sqlite(pool) => {
                sqlx::query("SELECT 1").execute(pool).await?;
            }
            Database::Mysql(pool) => {
                sqlx::query("SELECT 1").execute(pool).await?;
            }
        }
        Ok(())
    }
}

/// Where a configured SQLite location actually points
#[derive(Debug, PartialEq, Eq)]
struct SqliteTarget {
    url: String,
    /// Directory to create before opening a file database
    directory: Option<PathBuf>,
    in_memory: bool,
}

impl SqliteTarget {
    /// Accepts bare paths, `sqlite:` URLs and `:memory:`
    fn parse(raw: &str) -> Self {
        if raw == ":memory:" || raw.starts_with("sqlite::memory:") {
            return Self {
                url: "sqlite::memory:".to_string(),
                directory: None,
                in_memory: true,
            };
        }

        let path = raw.strip_prefix("sqlite:").unwrap_or(raw);
        let path = path.trim_start_matches("//");
        let file = path.split('?').next().unwrap_or(path);
        let directory = std::path::Path::new(file)
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(PathBuf::from);

        Self {
            url: if raw.starts_with("sqlite:") {
                raw.to_string()
            } else {
                format!("sqlite:{}", raw)
            },
            directory,
            in_memory: false,
        }
    }
}

/// Connect using `config`
pub async fn create_pool(config: &DatabaseConfig) -> Result<DynDatabasePool> {
    let database = Database::connect(config).await?;
    tracing::debug!(driver = ?database.driver(), "Database pool ready");
    Ok(Arc::new(database))
}

/// Private in-memory SQLite database
pub async fn create_test_pool() -> Result<DynDatabasePool> {
    create_pool(&DatabaseConfig {
        driver: DatabaseDriver::Sqlite,
        url: ":memory:".to_string(),
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sqlite_target_forms() {
        let memory = SqliteTarget::parse(":memory:");
        assert!(memory.in_memory);
        assert_eq!(memory.url, "sqlite::memory:");
        assert!(memory.directory.is_none());

        let bare = SqliteTarget::parse("data/coursehub.db");
        assert!(!bare.in_memory);
        assert_eq!(bare.url, "sqlite:data/coursehub.db");
        assert_eq!(bare.directory, Some(PathBuf::from("data")));

        let url = SqliteTarget::parse("sqlite:var/app.db?mode=rwc");
        assert_eq!(url.url, "sqlite:var/app.db?mode=rwc");
        assert_eq!(url.directory, Some(PathBuf::from("var")));

        assert!(SqliteTarget::parse("app.db").directory.is_none());
    }

    #[tokio::test]
    async fn test_memory_pool_is_sqlite() {
        let pool = create_test_pool().await.unwrap();
        assert_eq!(pool.driver(), DatabaseDriver::Sqlite);
        assert!(pool.sqlite().is_ok());
        assert!(pool.mysql().is_err());
        pool.ping().await.unwrap();
    }

    #[tokio::test]
    async fn test_memory_pool_keeps_state_between_statements() {
        let pool = create_test_pool().await.unwrap();
        pool.execute("CREATE TABLE t (id INTEGER PRIMARY KEY, v TEXT)")
            .await
            .unwrap();
        assert_eq!(pool.execute("INSERT INTO t (v) VALUES ('a')").await.unwrap(), 1);
        assert_eq!(pool.execute("DELETE FROM t").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_file_database_creates_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a").join("b").join("test.db");
        let pool = create_pool(&DatabaseConfig {
            driver: DatabaseDriver::Sqlite,
            url: path.to_string_lossy().to_string(),
        })
        .await
        .unwrap();
        pool.ping().await.unwrap();
        assert!(path.exists());
    }

    #[tokio::test]
    #[ignore = "needs a MySQL server in MYSQL_TEST_URL"]
    async fn test_mysql_ping() {
        let url = std::env::var("MYSQL_TEST_URL").unwrap_or_default();
        let pool = create_pool(&DatabaseConfig {
            driver: DatabaseDriver::Mysql,
            url,
        })
        .await
        .unwrap();
        assert!(pool.as_mysql().is_some());
        pool.ping().await.unwrap();
    }
}
