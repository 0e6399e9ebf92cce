//! File metadata repository
//!
//! Holds the description of stored objects. The bytes themselves live in the
//! storage service; `file_type` is derived on load rather than stored.

use crate::config::DatabaseDriver;
use crate::db::filter::{bind_mysql, bind_sqlite, build_where, ColumnFilter, FilterValue};
use crate::db::DynDatabasePool;
use crate::models::{file_type_of, FileMetadata};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// File metadata repository trait
#[async_trait]
pub trait FileRepository: Send + Sync {
    async fn create(&self, file: &FileMetadata) -> Result<FileMetadata>;

    async fn get_by_id(&self, id: i64) -> Result<Option<FileMetadata>>;

    /// Update the mutable fields (`original_name`, `is_active`)
    async fn update(&self, file: &FileMetadata) -> Result<FileMetadata>;

    async fn delete(&self, id: i64) -> Result<()>;

    /// All file records matching the filters, ordered by id
    async fn list(&self, filters: &[ColumnFilter]) -> Result<Vec<FileMetadata>>;
}

/// SQLx-based file metadata repository implementation
pub struct SqlxFileRepository {
    pool: DynDatabasePool,
}

impl SqlxFileRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn FileRepository> {
        Arc::new(Self::new(pool))
    }
}

const FILE_COLUMNS: &str = "id, course_id, bucket_id, file_name, original_name, mime_type, \
     file_size, uploaded_at, is_active";

const INSERT_FILE: &str = r#"
    INSERT INTO file_metadata (course_id, bucket_id, file_name, original_name, mime_type, file_size, uploaded_at, is_active)
    VALUES (?, ?, ?, ?, ?, ?, ?, ?)
"#;

const UPDATE_FILE: &str =
    "UPDATE file_metadata SET original_name = ?, is_active = ? WHERE id = ?";

#[derive(Debug, sqlx::FromRow)]
struct FileRow {
    id: i64,
    course_id: i64,
    bucket_id: String,
    file_name: String,
    original_name: String,
    mime_type: String,
    file_size: i64,
    uploaded_at: DateTime<Utc>,
    is_active: bool,
}

impl From<FileRow> for FileMetadata {
    fn from(row: FileRow) -> Self {
        FileMetadata {
            id: row.id,
            course_id: row.course_id,
            bucket_id: row.bucket_id,
            file_name: row.file_name,
            file_type: file_type_of(&row.original_name),
            original_name: row.original_name,
            mime_type: row.mime_type,
            file_size: row.file_size,
            uploaded_at: row.uploaded_at,
            is_active: row.is_active,
        }
    }
}

#[async_trait]
impl FileRepository for SqlxFileRepository {
    async fn create(&self, file: &FileMetadata) -> Result<FileMetadata> {
        let id = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(INSERT_FILE)
                .bind(file.course_id)
                .bind(&file.bucket_id)
                .bind(&file.file_name)
                .bind(&file.original_name)
                .bind(&file.mime_type)
                .bind(file.file_size)
                .bind(file.uploaded_at)
                .bind(file.is_active)
                .execute(self.pool.sqlite()?)
                .await
                .context("Failed to create file metadata")?
                .last_insert_rowid(),
            DatabaseDriver::Mysql => sqlx::query(INSERT_FILE)
                .bind(file.course_id)
                .bind(&file.bucket_id)
                .bind(&file.file_name)
                .bind(&file.original_name)
                .bind(&file.mime_type)
                .bind(file.file_size)
                .bind(file.uploaded_at)
                .bind(file.is_active)
                .execute(self.pool.mysql()?)
                .await
                .context("Failed to create file metadata")?
                .last_insert_id() as i64,
        };

        Ok(FileMetadata {
            id,
            file_type: file_type_of(&file.original_name),
            ..file.clone()
        })
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<FileMetadata>> {
        let found = self
            .list(&[ColumnFilter::equals("id", FilterValue::Integer(id))])
            .await
            .context("Failed to get file metadata by ID")?;
        Ok(found.into_iter().next())
    }

    async fn update(&self, file: &FileMetadata) -> Result<FileMetadata> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(UPDATE_FILE)
                .bind(&file.original_name)
                .bind(file.is_active)
                .bind(file.id)
                .execute(self.pool.sqlite()?)
                .await
                .map(|_| ()),
            DatabaseDriver::Mysql => sqlx::query(UPDATE_FILE)
                .bind(&file.original_name)
                .bind(file.is_active)
                .bind(file.id)
                .execute(self.pool.mysql()?)
                .await
                .map(|_| ()),
        }
        .context("Failed to update file metadata")?;

        self.get_by_id(file.id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("File metadata not found after update"))
    }

    async fn delete(&self, id: i64) -> Result<()> {
        let sql = "DELETE FROM file_metadata WHERE id = ?";
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

    async fn list(&self, filters: &[ColumnFilter]) -> Result<Vec<FileMetadata>> {
        let clause = build_where(filters);
        let sql = format!(
            "SELECT {} FROM file_metadata{} ORDER BY id",
            FILE_COLUMNS, clause.sql
        );

        let rows = match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                bind_sqlite(sqlx::query_as::<_, FileRow>(&sql), &clause.binds)
                    .fetch_all(self.pool.sqlite()?)
                    .await
            }
            DatabaseDriver::Mysql => {
                bind_mysql(sqlx::query_as::<_, FileRow>(&sql), &clause.binds)
                    .fetch_all(self.pool.mysql()?)
                    .await
            }
        }
        .context("Failed to list file metadata")?;

        Ok(rows.into_iter().map(FileMetadata::from).collect())
    }
}
