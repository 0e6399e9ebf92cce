//! Enrollment repository

use crate::config::DatabaseDriver;
use crate::db::filter::{bind_mysql, bind_sqlite, build_where, ColumnFilter, FilterValue};
use crate::db::DynDatabasePool;
use crate::models::Enrollment;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Enrollment repository trait
#[async_trait]
pub trait EnrollmentRepository: Send + Sync {
    /// Insert an enrollment. A second enrollment of the same user in the same
    /// course fails with a unique violation (see [`crate::db::is_unique_violation`]).
    async fn create(&self, enrollment: &Enrollment) -> Result<Enrollment>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Enrollment>>;

    /// Enrollment of `user_id` in `course_id`, if any
    async fn find(&self, course_id: i64, user_id: i64) -> Result<Option<Enrollment>>;

    async fn delete(&self, id: i64) -> Result<()>;

    /// All enrollments matching the filters, ordered by id
    async fn list(&self, filters: &[ColumnFilter]) -> Result<Vec<Enrollment>>;
}

/// SQLx-based enrollment repository implementation
pub struct SqlxEnrollmentRepository {
    pool: DynDatabasePool,
}

impl SqlxEnrollmentRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn EnrollmentRepository> {
        Arc::new(Self::new(pool))
    }
}

const INSERT_ENROLLMENT: &str =
    "INSERT INTO enrollments (course_id, user_id, enrolled_at) VALUES (?, ?, ?)";

#[derive(Debug, sqlx::FromRow)]
struct EnrollmentRow {
    id: i64,
    course_id: i64,
    user_id: i64,
    enrolled_at: DateTime<Utc>,
}

impl From<EnrollmentRow> for Enrollment {
    fn from(row: EnrollmentRow) -> Self {
        Enrollment {
            id: row.id,
            course_id: row.course_id,
            user_id: row.user_id,
            enrolled_at: row.enrolled_at,
        }
    }
}

#[async_trait]
impl EnrollmentRepository for SqlxEnrollmentRepository {
    async fn create(&self, enrollment: &Enrollment) -> Result<Enrollment> {
        let id = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(INSERT_ENROLLMENT)
                .bind(enrollment.course_id)
                .bind(enrollment.user_id)
                .bind(enrollment.enrolled_at)
                .execute(self.pool.sqlite()?)
                .await
                .context("Failed to create enrollment")?
                .last_insert_rowid(),
            DatabaseDriver::Mysql => sqlx::query(INSERT_ENROLLMENT)
                .bind(enrollment.course_id)
                .bind(enrollment.user_id)
                .bind(enrollment.enrolled_at)
                .execute(self.pool.mysql()?)
                .await
                .context("Failed to create enrollment")?
                .last_insert_id() as i64,
        };

        Ok(Enrollment {
            id,
            ..enrollment.clone()
        })
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Enrollment>> {
        let found = self
            .list(&[ColumnFilter::equals("id", FilterValue::Integer(id))])
            .await
            .context("Failed to get enrollment by ID")?;
        Ok(found.into_iter().next())
    }

    async fn find(&self, course_id: i64, user_id: i64) -> Result<Option<Enrollment>> {
        let found = self
            .list(&[
                ColumnFilter::equals("course_id", FilterValue::Integer(course_id)),
                ColumnFilter::equals("user_id", FilterValue::Integer(user_id)),
            ])
            .await?;
        Ok(found.into_iter().next())
    }

    async fn delete(&self, id: i64) -> Result<()> {
        let sql = "DELETE FROM enrollments WHERE id = ?";
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

    async fn list(&self, filters: &[ColumnFilter]) -> Result<Vec<Enrollment>> {
        let clause = build_where(filters);
        let sql = format!(
            "SELECT id, course_id, user_id, enrolled_at FROM enrollments{} ORDER BY id",
            clause.sql
        );

        let rows = match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                bind_sqlite(sqlx::query_as::<_, EnrollmentRow>(&sql), &clause.binds)
                    .fetch_all(self.pool.sqlite()?)
                    .await
            }
            DatabaseDriver::Mysql => {
                bind_mysql(sqlx::query_as::<_, EnrollmentRow>(&sql), &clause.binds)
                    .fetch_all(self.pool.mysql()?)
                    .await
            }
        }
        .context("Failed to list enrollments")?;

        Ok(rows.into_iter().map(Enrollment::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{
        CourseRepository, SqlxCourseRepository, SqlxUserRepository, UserRepository,
    };
    use crate::db::{create_test_pool, is_unique_violation, migrations};
    use crate::models::{Course, CreateCourseInput, User, UserRole};

    async fn setup() -> (SqlxEnrollmentRepository, i64, i64) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool).await.expect("Failed to run migrations");

        let users = SqlxUserRepository::new(pool.clone());
        let tutor = users
            .create(&User::new("t@example.com".into(), "h".into(), "T".into(), UserRole::Instructor))
            .await
            .unwrap();
        let student = users
            .create(&User::new("s@example.com".into(), "h".into(), "S".into(), UserRole::Regular))
            .await
            .unwrap();

        let input: CreateCourseInput = serde_json::from_str(r#"{"title":"Course"}"#).unwrap();
        let course = SqlxCourseRepository::new(pool.clone())
            .create(&Course::new(input, tutor.id))
            .await
            .unwrap();

        (SqlxEnrollmentRepository::new(pool), course.id, student.id)
    }

    #[tokio::test]
    async fn test_create_and_find() {
        let (repo, course_id, user_id) = setup().await;

        let created = repo.create(&Enrollment::new(course_id, user_id)).await.unwrap();
        assert!(created.id > 0);

        let found = repo.find(course_id, user_id).await.unwrap().unwrap();
        assert_eq!(found.id, created.id);
        assert!(repo.find(course_id, user_id + 100).await.unwrap().is_none());

        repo.delete(created.id).await.unwrap();
        assert!(repo.get_by_id(created.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_enrollment_is_unique_violation() {
        let (repo, course_id, user_id) = setup().await;
        repo.create(&Enrollment::new(course_id, user_id)).await.unwrap();

        let err = repo.create(&Enrollment::new(course_id, user_id)).await.unwrap_err();
        assert!(is_unique_violation(&err));
        assert_eq!(repo.list(&[]).await.unwrap().len(), 1);
    }
}
