//! Database layer
//!
//! Storage for users, sessions, courses, enrollments and file metadata.
//! Supports:
//! - SQLite (default, for single-binary deployment)
//! - MySQL (for larger deployments)
//!
//! The driver is selected from configuration. Repositories take a
//! [`DynDatabasePool`] and branch on [`DatabasePool::driver`].
//!
//! # Usage
//!
//! ```ignore
//! use coursehub::config::DatabaseConfig;
//! use coursehub::db::{create_pool, migrations};
//!
//! let pool = create_pool(&DatabaseConfig::default()).await?;
//! migrations::run_migrations(&pool).await?;
//! pool.ping().await?;
//! ```

pub mod filter;
pub mod migrations;
pub mod pool;
pub mod repositories;

pub use filter::{ColumnFilter, FilterValue};
pub use pool::{create_pool, create_test_pool, Database, DatabasePool, DynDatabasePool};

/// True when the error chain holds a database unique-constraint violation
pub fn is_unique_violation(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        matches!(
            cause.downcast_ref::<sqlx::Error>(),
            Some(sqlx::Error::Database(db_err)) if db_err.is_unique_violation()
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_errors_are_not_unique_violations() {
        assert!(!is_unique_violation(&anyhow::anyhow!("boom")));
        let wrapped = anyhow::Error::from(sqlx::Error::RowNotFound).context("lookup");
        assert!(!is_unique_violation(&wrapped));
    }
}
