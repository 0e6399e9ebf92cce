//! Course service
//!
//! Course CRUD with ownership checks, the catalog, checkout (self-enrollment),
//! course content with the caller's enrollment flag, and statistics folded
//! from enrollment snapshots.

use crate::db::repositories::{CourseRepository, EnrollmentRepository, FileRepository};
use crate::db::{is_unique_violation, ColumnFilter, FilterValue};
use crate::models::{
    Capability, Course, CreateCourseInput, Enrollment, FileMetadata, UpdateCourseInput, User,
};
use crate::services::document::DocumentServiceError;
use crate::services::storage::{can_manage, StorageService};
use crate::validation::FieldErrors;
use crate::views::{self, ContentCategory, CourseStats, InstructorStats};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A course page: the course, whether the caller is enrolled, and the active
/// files that pass the search/category filter.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseContent {
    pub course: Course,
    pub user_enrolled: bool,
    pub files: Vec<FileMetadata>,
}

/// Course service
pub struct CourseService {
    courses: Arc<dyn CourseRepository>,
    enrollments: Arc<dyn EnrollmentRepository>,
    files: Arc<dyn FileRepository>,
    storage: Arc<StorageService>,
}

impl CourseService {
    pub fn new(
        courses: Arc<dyn CourseRepository>,
        enrollments: Arc<dyn EnrollmentRepository>,
        files: Arc<dyn FileRepository>,
        storage: Arc<StorageService>,
    ) -> Self {
        Self {
            courses,
            enrollments,
            files,
            storage,
        }
    }

    /// A course the caller may see: published, owned, or any for admins.
    /// Hidden courses are reported as missing.
    pub async fn get_visible(&self, caller: &User, id: i64) -> Result<Course, DocumentServiceError> {
        let course = self
            .courses
            .get_by_id(id)
            .await
            .context("Failed to get course")?
            .filter(|c| is_visible(caller, c))
            .ok_or_else(|| DocumentServiceError::NotFound(format!("Course {} not found", id)))?;
        Ok(course)
    }

    /// Courses matching `filters` that the caller may see
    pub async fn list_visible(
        &self,
        caller: &User,
        filters: &[ColumnFilter],
    ) -> Result<Vec<Course>, DocumentServiceError> {
        let courses = self
            .courses
            .list(filters)
            .await
            .context("Failed to list courses")?;
        Ok(courses.into_iter().filter(|c| is_visible(caller, c)).collect())
    }

    /// Published courses in any of the selected categories (all when empty)
    pub async fn catalog(&self, categories: &[String]) -> Result<Vec<Course>, DocumentServiceError> {
        let published = self
            .courses
            .list(&[ColumnFilter::equals("is_published", FilterValue::Boolean(true))])
            .await
            .context("Failed to list published courses")?;
        Ok(views::filter_by_categories(&published, categories)
            .into_iter()
            .cloned()
            .collect())
    }

    /// Create a course owned by the caller
    pub async fn create(
        &self,
        caller: &User,
        input: CreateCourseInput,
    ) -> Result<Course, DocumentServiceError> {
        if !caller.can(Capability::CreateCourse) {
            return Err(DocumentServiceError::PermissionDenied(
                "Only instructors can create courses".to_string(),
            ));
        }
        let mut errors = FieldErrors::new();
        check_title(&mut errors, Some(&input.title));
        check_price(&mut errors, Some(input.price));
        errors.into_result().map_err(DocumentServiceError::Validation)?;

        let created = self
            .courses
            .create(&Course::new(input, caller.id))
            .await
            .context("Failed to create course")?;
        tracing::info!(course_id = created.id, instructor_id = caller.id, "Created course");
        Ok(created)
    }

    pub async fn update(
        &self,
        caller: &User,
        id: i64,
        input: UpdateCourseInput,
    ) -> Result<Course, DocumentServiceError> {
        let mut course = self.managed(caller, id).await?;

        let mut errors = FieldErrors::new();
        check_title(&mut errors, input.title.as_deref());
        check_price(&mut errors, input.price);
        errors.into_result().map_err(DocumentServiceError::Validation)?;

        course.apply(input);
        let updated = self
            .courses
            .update(&course)
            .await
            .context("Failed to update course")?;
        Ok(updated)
    }

    /// Delete a course, its stored files, and (by cascade) its enrollments
    /// and file metadata
    pub async fn delete(&self, caller: &User, id: i64) -> Result<(), DocumentServiceError> {
        let course = self.managed(caller, id).await?;
        self.storage.remove_course_objects(course.id).await?;
        self.courses
            .delete(course.id)
            .await
            .context("Failed to delete course")?;
        tracing::info!(course_id = course.id, "Deleted course");
        Ok(())
    }

    /// Checkout: enroll the caller in a published course
    pub async fn enroll(&self, caller: &User, course_id: i64) -> Result<Enrollment, DocumentServiceError> {
        let course = self.get_visible(caller, course_id).await?;
        if !course.is_published {
            let mut errors = FieldErrors::new();
            errors.add("courseId", "Course is not open for enrollment");
            return Err(DocumentServiceError::Validation(errors));
        }
        if !caller.can(Capability::Enroll) {
            return Err(DocumentServiceError::PermissionDenied(
                "Enrollment is not allowed".to_string(),
            ));
        }

        if self.is_enrolled(caller.id, course.id).await? {
            return Err(already_enrolled());
        }

        match self
            .enrollments
            .create(&Enrollment::new(course.id, caller.id))
            .await
        {
            Ok(enrollment) => {
                tracing::info!(course_id = course.id, user_id = caller.id, "New enrollment");
                Ok(enrollment)
            }
            Err(e) if is_unique_violation(&e) => Err(already_enrolled()),
            Err(e) => Err(e.context("Failed to create enrollment").into()),
        }
    }

    pub async fn is_enrolled(&self, user_id: i64, course_id: i64) -> Result<bool, DocumentServiceError> {
        let found = self
            .enrollments
            .find(course_id, user_id)
            .await
            .context("Failed to check enrollment")?;
        Ok(found.is_some())
    }

    /// The course page for the caller
    pub async fn content(
        &self,
        caller: &User,
        course_id: i64,
        search: &str,
        category: ContentCategory,
    ) -> Result<CourseContent, DocumentServiceError> {
        let course = self.get_visible(caller, course_id).await?;

        let (user_enrolled, files) = tokio::try_join!(
            self.is_enrolled(caller.id, course.id),
            self.active_files(course.id)
        )?;

        let files = views::filter_content(&files, search, category)
            .into_iter()
            .cloned()
            .collect();
        Ok(CourseContent {
            course,
            user_enrolled,
            files,
        })
    }

    /// Enrollment count and revenue of one course; owner or admin only
    pub async fn stats(&self, caller: &User, course_id: i64) -> Result<CourseStats, DocumentServiceError> {
        let course = self.managed(caller, course_id).await?;
        let enrollments = self
            .enrollments
            .list(&[ColumnFilter::equals("course_id", FilterValue::Integer(course.id))])
            .await
            .context("Failed to list enrollments")?;
        Ok(views::course_stats(&course, &enrollments))
    }

    /// Instructor dashboard totals: the caller's courses, or all for admins
    pub async fn dashboard(&self, caller: &User) -> Result<InstructorStats, DocumentServiceError> {
        if !caller.can(Capability::ViewInstructorDashboard) {
            return Err(DocumentServiceError::PermissionDenied(
                "Instructor access required".to_string(),
            ));
        }

        let (courses, enrollments) =
            tokio::try_join!(self.courses.list(&[]), self.enrollments.list(&[]))
                .context("Failed to load dashboard data")?;

        let scoped = views::scope_courses(&courses, caller.id, caller.role);
        Ok(views::instructor_stats(&scoped, &enrollments))
    }

    /// Ids of the courses `user_id` teaches
    pub async fn taught_course_ids(&self, user_id: i64) -> Result<Vec<i64>, DocumentServiceError> {
        let courses = self
            .courses
            .list(&[ColumnFilter::equals("instructor_id", FilterValue::Integer(user_id))])
            .await
            .context("Failed to list taught courses")?;
        Ok(courses.into_iter().map(|c| c.id).collect())
    }

    async fn active_files(&self, course_id: i64) -> Result<Vec<FileMetadata>, DocumentServiceError> {
        let files = self
            .files
            .list(&[
                ColumnFilter::equals("course_id", FilterValue::Integer(course_id)),
                ColumnFilter::equals("is_active", FilterValue::Boolean(true)),
            ])
            .await
            .context("Failed to list course files")?;
        Ok(files)
    }

    async fn managed(&self, caller: &User, id: i64) -> Result<Course, DocumentServiceError> {
        let course = self.get_visible(caller, id).await?;
        if !can_manage(caller, &course) {
            return Err(DocumentServiceError::PermissionDenied(
                "Only the course owner can do that".to_string(),
            ));
        }
        Ok(course)
    }
}

fn is_visible(caller: &User, course: &Course) -> bool {
    course.is_published || can_manage(caller, course)
}

fn already_enrolled() -> DocumentServiceError {
    DocumentServiceError::Conflict("Already enrolled in this course".to_string())
}

fn check_title(errors: &mut FieldErrors, title: Option<&str>) {
    if let Some(title) = title {
        if title.trim().is_empty() {
            errors.add("title", "Title is required");
        }
    }
}

fn check_price(errors: &mut FieldErrors, price: Option<i64>) {
    if matches!(price, Some(p) if p < 0) {
        errors.add("price", "Price cannot be negative");
    }
}
