//! View loads: fetch snapshots, then derive view state with [`crate::views`]

use std::future::Future;
use tokio::sync::watch;

use super::documents::{DocumentClient, Filters};
use super::error::ClientError;
use super::scope::TaskScope;
use crate::models::{Course, UserProfile, UserRole};
use crate::services::CourseContent;
use crate::views::{self, ContentCategory, InstructorStats};

/// Progress of a view load
#[derive(Debug, Clone, PartialEq)]
pub enum LoadState<T> {
    Loading,
    Ready(T),
    Failed(ClientError),
}

impl<T> LoadState<T> {
    pub fn is_loading(&self) -> bool {
        matches!(self, LoadState::Loading)
    }
}

/// Run `load` inside `scope` and publish its result. After the scope is
/// disposed the receiver stays on its last value.
pub fn load_into<T, F>(scope: &TaskScope, load: F) -> watch::Receiver<LoadState<T>>
where
    T: Send + Sync + 'static,
    F: Future<Output = Result<T, ClientError>> + Send + 'static,
{
    let (tx, rx) = watch::channel(LoadState::Loading);
    scope.spawn(load, move |result| {
        let state = match result {
            Ok(value) => LoadState::Ready(value),
            Err(e) => {
                tracing::warn!("View load failed: {}", e);
                LoadState::Failed(e)
            }
        };
        let _ = tx.send(state);
    });
    rx
}

/// Dashboard totals for `viewer`, derived locally from the course and
/// enrollment collections fetched side by side
pub async fn load_instructor_stats(
    documents: &DocumentClient,
    viewer: &UserProfile,
) -> Result<InstructorStats, ClientError> {
    if !viewer.role.is_instructor() {
        return Err(ClientError::PermissionDenied(
            "Instructor access required".to_string(),
        ));
    }

    let course_filters = match viewer.role {
        UserRole::Admin => Filters::new(),
        _ => Filters::new().eq("instructorId", viewer.id),
    };
    let all_enrollments = Filters::new();
    let (courses, enrollments) = tokio::try_join!(
        documents.courses(&course_filters),
        documents.enrollments(&all_enrollments)
    )?;

    let scoped = views::scope_courses(&courses, viewer.id, viewer.role);
    Ok(views::instructor_stats(&scoped, &enrollments))
}

/// Published courses in the selected categories
pub async fn load_catalog(
    documents: &DocumentClient,
    categories: &[String],
) -> Result<Vec<Course>, ClientError> {
    let published = documents
        .courses(&Filters::new().eq("isPublished", true))
        .await?;
    Ok(views::filter_by_categories(&published, categories)
        .into_iter()
        .cloned()
        .collect())
}

/// Course page for `viewer`: the course, the enrollment signal and the
/// active files passing the search and category filter
pub async fn load_course_page(
    documents: &DocumentClient,
    viewer_id: i64,
    course_id: i64,
    search: &str,
    category: ContentCategory,
) -> Result<CourseContent, ClientError> {
    let enrollment_filters = Filters::new()
        .eq("courseId", course_id)
        .eq("userId", viewer_id);
    let file_filters = Filters::new()
        .eq("courseId", course_id)
        .eq("isActive", true);

    let (course, enrollments, files) = tokio::try_join!(
        documents.course(course_id),
        documents.enrollments(&enrollment_filters),
        documents.files(&file_filters)
    )?;

    Ok(CourseContent {
        course,
        user_enrolled: !enrollments.is_empty(),
        files: views::filter_content(&files, search, category)
            .into_iter()
            .cloned()
            .collect(),
    })
}
