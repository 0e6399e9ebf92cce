//! Course repository

use crate::config::DatabaseDriver;
use crate::db::filter::{bind_mysql, bind_sqlite, build_where, ColumnFilter, FilterValue};
use crate::db::DynDatabasePool;
use crate::models::Course;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Course repository trait
#[async_trait]
pub trait CourseRepository: Send + Sync {
    async fn create(&self, course: &Course) -> Result<Course>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Course>>;

    async fn update(&self, course: &Course) -> Result<Course>;

    async fn delete(&self, id: i64) -> Result<()>;

    /// All courses matching the filters, ordered by id
    async fn list(&self, filters: &[ColumnFilter]) -> Result<Vec<Course>>;
}

/// SQLx-based course repository implementation
pub struct SqlxCourseRepository {
    pool: DynDatabasePool,
}

impl SqlxCourseRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn CourseRepository> {
        Arc::new(Self::new(pool))
    }
}

const COURSE_COLUMNS: &str = "id, title, description, price, category, is_published, \
     instructor_id, thumbnail, created_at, updated_at";

const INSERT_COURSE: &str = r#"
    INSERT INTO courses (title, description, price, category, is_published, instructor_id, thumbnail, created_at, updated_at)
    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
"#;

const UPDATE_COURSE: &str = r#"
    UPDATE courses
    SET title = ?, description = ?, price = ?, category = ?, is_published = ?, thumbnail = ?, updated_at = ?
    WHERE id = ?
"#;

#[derive(Debug, sqlx::FromRow)]
struct CourseRow {
    id: i64,
    title: String,
    description: String,
    price: i64,
    category: String,
    is_published: bool,
    instructor_id: i64,
    thumbnail: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<CourseRow> for Course {
    fn from(row: CourseRow) -> Self {
        Course {
            id: row.id,
            title: row.title,
            description: row.description,
            price: row.price,
            category: row.category,
            is_published: row.is_published,
            instructor_id: row.instructor_id,
            thumbnail: row.thumbnail,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[async_trait]
impl CourseRepository for SqlxCourseRepository {
    async fn create(&self, course: &Course) -> Result<Course> {
        let now = Utc::now();

        let id = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(INSERT_COURSE)
                .bind(&course.title)
                .bind(&course.description)
                .bind(course.price)
                .bind(&course.category)
                .bind(course.is_published)
                .bind(course.instructor_id)
                .bind(&course.thumbnail)
                .bind(now)
                .bind(now)
                .execute(self.pool.sqlite()?)
                .await
                .context("Failed to create course")?
                .last_insert_rowid(),
            DatabaseDriver::Mysql => sqlx::query(INSERT_COURSE)
                .bind(&course.title)
                .bind(&course.description)
                .bind(course.price)
                .bind(&course.category)
                .bind(course.is_published)
                .bind(course.instructor_id)
                .bind(&course.thumbnail)
                .bind(now)
                .bind(now)
                .execute(self.pool.mysql()?)
                .await
                .context("Failed to create course")?
                .last_insert_id() as i64,
        };

        Ok(Course {
            id,
            created_at: now,
            updated_at: now,
            ..course.clone()
        })
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Course>> {
        let courses = self
            .list(&[ColumnFilter::equals("id", FilterValue::Integer(id))])
            .await
            .context("Failed to get course by ID")?;
        Ok(courses.into_iter().next())
    }

    async fn update(&self, course: &Course) -> Result<Course> {
        let now = Utc::now();

        match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(UPDATE_COURSE)
                .bind(&course.title)
                .bind(&course.description)
                .bind(course.price)
                .bind(&course.category)
                .bind(course.is_published)
                .bind(&course.thumbnail)
                .bind(now)
                .bind(course.id)
                .execute(self.pool.sqlite()?)
                .await
                .map(|_| ()),
            DatabaseDriver::Mysql => sqlx::query(UPDATE_COURSE)
                .bind(&course.title)
                .bind(&course.description)
                .bind(course.price)
                .bind(&course.category)
                .bind(course.is_published)
                .bind(&course.thumbnail)
                .bind(now)
                .bind(course.id)
                .execute(self.pool.mysql()?)
                .await
                .map(|_| ()),
        }
        .context("Failed to update course")?;

        self.get_by_id(course.id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Course not found after update"))
    }

    async fn delete(&self, id: i64) -> Result<()> {
        let sql = "DELETE FROM courses WHERE id = ?";
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

    async fn list(&self, filters: &[ColumnFilter]) -> Result<Vec<Course>> {
        let clause = build_where(filters);
        let sql = format!("SELECT {} FROM courses{} ORDER BY id", COURSE_COLUMNS, clause.sql);

        let rows = match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                bind_sqlite(sqlx::query_as::<_, CourseRow>(&sql), &clause.binds)
                    .fetch_all(self.pool.sqlite()?)
                    .await
            }
            DatabaseDriver::Mysql => {
                bind_mysql(sqlx::query_as::<_, CourseRow>(&sql), &clause.binds)
                    .fetch_all(self.pool.mysql()?)
                    .await
            }
        }
        .context("Failed to list courses")?;

        Ok(rows.into_iter().map(Course::from).collect())
    }
}
