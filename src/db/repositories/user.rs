//! User repository
//!
//! - `UserRepository` trait defining user data access
//! - `SqlxUserRepository` implementing it for SQLite and MySQL

use crate::config::DatabaseDriver;
use crate::db::filter::{bind_mysql, bind_sqlite, build_where, ColumnFilter, FilterValue};
use crate::db::DynDatabasePool;
use crate::models::{User, UserRole};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::str::FromStr;
use std::sync::Arc;

/// User repository trait
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Create a new user
    async fn create(&self, user: &User) -> Result<User>;

    /// Get user by ID
    async fn get_by_id(&self, id: i64) -> Result<Option<User>>;

    /// Get user by email
    async fn get_by_email(&self, email: &str) -> Result<Option<User>>;

    /// Update a user
    async fn update(&self, user: &User) -> Result<User>;

    /// Delete a user
    async fn delete(&self, id: i64) -> Result<()>;

    /// Count total users
    async fn count(&self) -> Result<i64>;

    /// All users matching the filters, ordered by id
    async fn list(&self, filters: &[ColumnFilter]) -> Result<Vec<User>>;
}

/// SQLx-based user repository implementation
pub struct SqlxUserRepository {
    pool: DynDatabasePool,
}

impl SqlxUserRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn UserRepository> {
        Arc::new(Self::new(pool))
    }
}

const USER_COLUMNS: &str =
    "id, email, password_hash, full_name, role, avatar, bio, created_at, updated_at";

const INSERT_USER: &str = r#"
    INSERT INTO users (email, password_hash, full_name, role, avatar, bio, created_at, updated_at)
    VALUES (?, ?, ?, ?, ?, ?, ?, ?)
"#;

const UPDATE_USER: &str = r#"
    UPDATE users
    SET email = ?, password_hash = ?, full_name = ?, role = ?, avatar = ?, bio = ?, updated_at = ?
    WHERE id = ?
"#;

#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: i64,
    email: String,
    password_hash: String,
    full_name: String,
    role: String,
    avatar: Option<String>,
    bio: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = anyhow::Error;

    fn try_from(row: UserRow) -> Result<Self> {
        let role = UserRole::from_str(&row.role)
            .with_context(|| format!("Invalid role in database: {}", row.role))?;
        Ok(User {
            id: row.id,
            email: row.email,
            password_hash: row.password_hash,
            full_name: row.full_name,
            role,
            avatar: row.avatar,
            bio: row.bio,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[async_trait]
impl UserRepository for SqlxUserRepository {
    async fn create(&self, user: &User) -> Result<User> {
        let now = Utc::now();
        let role = user.role.to_string();

        let id = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(INSERT_USER)
                .bind(&user.email)
                .bind(&user.password_hash)
                .bind(&user.full_name)
                .bind(&role)
                .bind(&user.avatar)
                .bind(&user.bio)
                .bind(now)
                .bind(now)
                .execute(self.pool.sqlite()?)
                .await
                .context("Failed to create user")?
                .last_insert_rowid(),
            DatabaseDriver::Mysql => sqlx::query(INSERT_USER)
                .bind(&user.email)
                .bind(&user.password_hash)
                .bind(&user.full_name)
                .bind(&role)
                .bind(&user.avatar)
                .bind(&user.bio)
                .bind(now)
                .bind(now)
                .execute(self.pool.mysql()?)
                .await
                .context("Failed to create user")?
                .last_insert_id() as i64,
        };

        Ok(User {
            id,
            created_at: now,
            updated_at: now,
            ..user.clone()
        })
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<User>> {
        let users = self
            .list(&[ColumnFilter::equals("id", FilterValue::Integer(id))])
            .await
            .context("Failed to get user by ID")?;
        Ok(users.into_iter().next())
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<User>> {
        let users = self
            .list(&[ColumnFilter::equals(
                "email",
                FilterValue::Text(email.to_string()),
            )])
            .await
            .context("Failed to get user by email")?;
        Ok(users.into_iter().next())
    }

    async fn update(&self, user: &User) -> Result<User> {
        let now = Utc::now();
        let role = user.role.to_string();

        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query(UPDATE_USER)
                    .bind(&user.email)
                    .bind(&user.password_hash)
                    .bind(&user.full_name)
                    .bind(&role)
                    .bind(&user.avatar)
                    .bind(&user.bio)
                    .bind(now)
                    .bind(user.id)
                    .execute(self.pool.sqlite()?)
                    .await
                    .map(|_| ())
            }
            DatabaseDriver::Mysql => {
                sqlx::query(UPDATE_USER)
                    .bind(&user.email)
                    .bind(&user.password_hash)
                    .bind(&user.full_name)
                    .bind(&role)
                    .bind(&user.avatar)
                    .bind(&user.bio)
                    .bind(now)
                    .bind(user.id)
                    .execute(self.pool.mysql()?)
                    .await
                    .map(|_| ())
            }
        }
        .context("Failed to update user")?;

        self.get_by_id(user.id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("User not found after update"))
    }

    async fn delete(&self, id: i64) -> Result<()> {
        let sql = "DELETE FROM users WHERE id = ?";
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query(sql).bind(id).execute(self.pool.sqlite()?).await?;
            }
            DatabaseDriver::Mysql => {
                sqlx::query(sql).bind(id).execute(self.pool.mysql()?).await?;
            }
        }
        Ok(())
    }

    async fn count(&self) -> Result<i64> {
        let sql = "SELECT COUNT(*) FROM users";
        let count: i64 = match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query_scalar(sql).fetch_one(self.pool.sqlite()?).await
            }
            DatabaseDriver::Mysql => sqlx::query_scalar(sql).fetch_one(self.pool.mysql()?).await,
        }
        .context("Failed to count users")?;
        Ok(count)
    }

    async fn list(&self, filters: &[ColumnFilter]) -> Result<Vec<User>> {
        let clause = build_where(filters);
        let sql = format!("SELECT {} FROM users{} ORDER BY id", USER_COLUMNS, clause.sql);

        let rows = match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                bind_sqlite(sqlx::query_as::<_, UserRow>(&sql), &clause.binds)
                    .fetch_all(self.pool.sqlite()?)
                    .await
            }
            DatabaseDriver::Mysql => {
                bind_mysql(sqlx::query_as::<_, UserRow>(&sql), &clause.binds)
                    .fetch_all(self.pool.mysql()?)
                    .await
            }
        }
        .context("Failed to list users")?;

        rows.into_iter().map(User::try_from).collect()
    }
}
