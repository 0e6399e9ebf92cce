//! Database migrations
//!
//! Migrations are embedded as SQL strings (one variant per driver) and tracked
//! in the `_migrations` table, so the binary carries its own schema.
//!
//! ```ignore
//! let pool = create_pool(&config).await?;
//! migrations::run_migrations(&pool).await?;
//! ```

use anyhow::{Context, Result};
use chrono::Utc;
use std::collections::BTreeSet;

use super::DynDatabasePool;
use crate::config::DatabaseDriver;

/// A database migration with SQL for both SQLite and MySQL
#[derive(Debug, Clone)]
pub struct Migration {
    /// Migration version number (unique, applied in ascending order)
    pub version: i32,
    /// Human-readable migration name
    pub name: &'static str,
    /// SQL statements for SQLite
    pub up_sqlite: &'static str,
    /// SQL statements for MySQL
    pub up_mysql: &'static str,
}

pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "create_users",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                email VARCHAR(255) NOT NULL UNIQUE,
                password_hash VARCHAR(255) NOT NULL,
                full_name VARCHAR(255) NOT NULL,
                role VARCHAR(20) NOT NULL DEFAULT 'regular',
                avatar TEXT,
                bio TEXT,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            );
            CREATE INDEX IF NOT EXISTS idx_users_email ON users(email);
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS users (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                email VARCHAR(255) NOT NULL UNIQUE,
                password_hash VARCHAR(255) NOT NULL,
                full_name VARCHAR(255) NOT NULL,
                role VARCHAR(20) NOT NULL DEFAULT 'regular',
                avatar TEXT,
                bio TEXT,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP ON UPDATE CURRENT_TIMESTAMP
            );
        "#,
    },
    Migration {
        version: 2,
        name: "create_sessions",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS sessions (
                id VARCHAR(64) PRIMARY KEY,
                user_id INTEGER NOT NULL,
                expires_at TIMESTAMP NOT NULL,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
            );
            CREATE INDEX IF NOT EXISTS idx_sessions_user_id ON sessions(user_id);
            CREATE INDEX IF NOT EXISTS idx_sessions_expires_at ON sessions(expires_at);
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS sessions (
                id VARCHAR(64) PRIMARY KEY,
                user_id BIGINT NOT NULL,
                expires_at TIMESTAMP NOT NULL,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
            );
            CREATE INDEX idx_sessions_user_id ON sessions(user_id);
            CREATE INDEX idx_sessions_expires_at ON sessions(expires_at);
        "#,
    },
    Migration {
        version: 3,
        name: "create_courses",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS courses (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title VARCHAR(255) NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                price INTEGER NOT NULL DEFAULT 0,
                category VARCHAR(100) NOT NULL DEFAULT '',
                is_published INTEGER NOT NULL DEFAULT 0,
                instructor_id INTEGER NOT NULL,
                thumbnail TEXT,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                FOREIGN KEY (instructor_id) REFERENCES users(id) ON DELETE CASCADE
            );
            CREATE INDEX IF NOT EXISTS idx_courses_instructor_id ON courses(instructor_id);
            CREATE INDEX IF NOT EXISTS idx_courses_category ON courses(category);
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS courses (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                title VARCHAR(255) NOT NULL,
                description TEXT NOT NULL,
                price BIGINT NOT NULL DEFAULT 0,
                category VARCHAR(100) NOT NULL DEFAULT '',
                is_published BOOLEAN NOT NULL DEFAULT FALSE,
                instructor_id BIGINT NOT NULL,
                thumbnail TEXT,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP ON UPDATE CURRENT_TIMESTAMP,
                FOREIGN KEY (instructor_id) REFERENCES users(id) ON DELETE CASCADE
            );
            CREATE INDEX idx_courses_instructor_id ON courses(instructor_id);
            CREATE INDEX idx_courses_category ON courses(category);
        "#,
    },
    Migration {
        version: 4,
        name: "create_enrollments",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS enrollments (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                course_id INTEGER NOT NULL,
                user_id INTEGER NOT NULL,
                enrolled_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                UNIQUE (course_id, user_id),
                FOREIGN KEY (course_id) REFERENCES courses(id) ON DELETE CASCADE,
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
            );
            CREATE INDEX IF NOT EXISTS idx_enrollments_course_id ON enrollments(course_id);
            CREATE INDEX IF NOT EXISTS idx_enrollments_user_id ON enrollments(user_id);
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS enrollments (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                course_id BIGINT NOT NULL,
                user_id BIGINT NOT NULL,
                enrolled_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                UNIQUE KEY uq_enrollments_course_user (course_id, user_id),
                FOREIGN KEY (course_id) REFERENCES courses(id) ON DELETE CASCADE,
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
            );
            CREATE INDEX idx_enrollments_user_id ON enrollments(user_id);
        "#,
    },
    Migration {
        version: 5,
        name: "create_file_metadata",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS file_metadata (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                course_id INTEGER NOT NULL,
                bucket_id VARCHAR(100) NOT NULL,
                file_name VARCHAR(255) NOT NULL,
                original_name VARCHAR(255) NOT NULL,
                mime_type VARCHAR(255) NOT NULL,
                file_size INTEGER NOT NULL,
                uploaded_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                is_active INTEGER NOT NULL DEFAULT 1,
                UNIQUE (bucket_id, file_name),
                FOREIGN KEY (course_id) REFERENCES courses(id) ON DELETE CASCADE
            );
            CREATE INDEX IF NOT EXISTS idx_file_metadata_course_id ON file_metadata(course_id);
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS file_metadata (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                course_id BIGINT NOT NULL,
                bucket_id VARCHAR(100) NOT NULL,
                file_name VARCHAR(255) NOT NULL,
                original_name VARCHAR(255) NOT NULL,
                mime_type VARCHAR(255) NOT NULL,
                file_size BIGINT NOT NULL,
                uploaded_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                is_active BOOLEAN NOT NULL DEFAULT TRUE,
                UNIQUE KEY uq_file_metadata_object (bucket_id, file_name),
                FOREIGN KEY (course_id) REFERENCES courses(id) ON DELETE CASCADE
            );
            CREATE INDEX idx_file_metadata_course_id ON file_metadata(course_id);
        "#,
    },
];

impl Migration {
    fn sql(&self, driver: DatabaseDriver) -> &'static str {
        match driver {
            DatabaseDriver::Sqlite => self.up_sqlite,
            DatabaseDriver::Mysql => self.up_mysql,
        }
    }

    /// Individual statements of the driver's script, comment-only fragments dropped
    fn statements(&self, driver: DatabaseDriver) -> impl Iterator<Item = &'static str> {
        self.sql(driver)
            .split(';')
            .map(str::trim)
            .filter(|s| !s.is_empty() && !is_comment_only(s))
    }
}

fn is_comment_only(fragment: &str) -> bool {
    fragment
        .lines()
        .map(str::trim)
        .all(|line| line.is_empty() || line.starts_with("--"))
}

const TRACKING_TABLE: &str = "CREATE TABLE IF NOT EXISTS _migrations (
    version BIGINT PRIMARY KEY,
    name VARCHAR(255) NOT NULL,
    applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
)";

/// Apply every migration not yet recorded, in version order.
/// Returns the number applied.
pub async fn run_migrations(pool: &DynDatabasePool) -> Result<usize> {
    let pending = pending_migrations(pool).await?;
    if pending.is_empty() {
        tracing::debug!("Schema is up to date");
        return Ok(0);
    }

    for migration in &pending {
        tracing::info!(version = migration.version, "Applying migration {}", migration.name);
        apply(pool, migration)
            .await
            .with_context(|| format!("Migration {} ({}) failed", migration.version, migration.name))?;
    }
    tracing::info!("Applied {} migration(s)", pending.len());
    Ok(pending.len())
}

/// Migrations that have not been recorded yet
pub async fn pending_migrations(pool: &DynDatabasePool) -> Result<Vec<&'static Migration>> {
    pool.execute(TRACKING_TABLE)
        .await
        .context("Failed to create migration tracking table")?;

    let applied: BTreeSet<i64> = match pool.driver() {
        DatabaseDriver::Sqlite => sqlx::query_scalar("SELECT version FROM _migrations")
            .fetch_all(pool.sqlite()?)
            .await?
            .into_iter()
            .collect(),
        DatabaseDriver::Mysql => sqlx::query_scalar("SELECT version FROM _migrations")
            .fetch_all(pool.mysql()?)
            .await?
            .into_iter()
            .collect(),
    };

    Ok(MIGRATIONS
        .iter()
        .filter(|m| !applied.contains(&i64::from(m.version)))
        .collect())
}

async fn apply(pool: &DynDatabasePool, migration: &Migration) -> Result<()> {
    let driver = pool.driver();
    for statement in migration.statements(driver) {
        pool.execute(statement).await.with_context(|| {
            let head: String = statement.chars().take(80).collect();
            format!("Statement failed: {}", head)
        })?;
    }

    let record = "INSERT INTO _migrations (version, name, applied_at) VALUES (?, ?, ?)";
    match driver {
        DatabaseDriver::Sqlite => {
            sqlx::query(record)
                .bind(i64::from(migration.version))
                .bind(migration.name)
                .bind(Utc::now())
                .execute(pool.sqlite()?)
                .await?;
        }
        DatabaseDriver::Mysql => {
            sqlx::query(record)
                .bind(i64::from(migration.version))
                .bind(migration.name)
                .bind(Utc::now())
                .execute(pool.mysql()?)
                .await?;
        }
    }
    Ok(())
}
