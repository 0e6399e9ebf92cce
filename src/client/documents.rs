//! Document query layer, client side
//!
//! Typed access to the collection endpoints plus the course-scoped helpers.
//! Filters are sent as query pairs; a membership filter over an empty set
//! cannot be expressed on the wire and is answered locally with no records.

use reqwest::Method;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::fmt::Display;

use super::backend::BackendClient;
use super::error::ClientError;
use crate::models::{Collection, Course, CreateCourseInput, Enrollment, FileMetadata, UpdateCourseInput, UserProfile};
use crate::services::{CourseContent, DownloadReference};
use crate::views::{ContentCategory, CourseStats, InstructorStats};

/// Equality and membership predicates over named fields
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filters {
    pairs: Vec<(String, String)>,
    matches_nothing: bool,
}

impl Filters {
    pub fn new() -> Self {
        Self::default()
    }

    /// `field == value`
    pub fn eq(mut self, field: &str, value: impl Display) -> Self {
        self.pairs.push((field.to_string(), value.to_string()));
        self
    }

    /// `field ∈ values`; an empty set matches nothing
    pub fn one_of<I>(mut self, field: &str, values: I) -> Self
    where
        I: IntoIterator,
        I::Item: Display,
    {
        let before = self.pairs.len();
        self.pairs
            .extend(values.into_iter().map(|v| (field.to_string(), v.to_string())));
        if self.pairs.len() == before {
            self.matches_nothing = true;
        }
        self
    }

    pub fn matches_nothing(&self) -> bool {
        self.matches_nothing
    }

    pub fn pairs(&self) -> &[(String, String)] {
        &self.pairs
    }
}

#[derive(Debug, Deserialize)]
struct ListResponse<T> {
    documents: Vec<T>,
}

/// Collection CRUD and course helpers
#[derive(Debug, Clone)]
pub struct DocumentClient {
    client: BackendClient,
}

impl DocumentClient {
    pub fn new(client: BackendClient) -> Self {
        Self { client }
    }

    fn documents_path(collection: Collection) -> String {
        format!("/collections/{}/documents", collection)
    }

    fn document_path(collection: Collection, id: i64) -> String {
        format!("/collections/{}/documents/{}", collection, id)
    }

    /// Every record matching `filters`, ordered by id
    pub async fn list<T: DeserializeOwned>(
        &self,
        collection: Collection,
        filters: &Filters,
    ) -> Result<Vec<T>, ClientError> {
        if filters.matches_nothing() {
            return Ok(Vec::new());
        }
        let response: ListResponse<T> = self
            .client
            .get_with_query(&Self::documents_path(collection), filters.pairs())
            .await?;
        Ok(response.documents)
    }

    pub async fn get<T: DeserializeOwned>(&self, collection: Collection, id: i64) -> Result<T, ClientError> {
        self.client.get(&Self::document_path(collection, id)).await
    }

    pub async fn create<B, T>(&self, collection: Collection, body: &B) -> Result<T, ClientError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.client.post(&Self::documents_path(collection), body).await
    }

    pub async fn update<B, T>(&self, collection: Collection, id: i64, body: &B) -> Result<T, ClientError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.client.put(&Self::document_path(collection, id), body).await
    }

    pub async fn delete(&self, collection: Collection, id: i64) -> Result<(), ClientError> {
        self.client.delete(&Self::document_path(collection, id)).await
    }

    pub async fn users(&self, filters: &Filters) -> Result<Vec<UserProfile>, ClientError> {
        self.list(Collection::Users, filters).await
    }

    pub async fn courses(&self, filters: &Filters) -> Result<Vec<Course>, ClientError> {
        self.list(Collection::Courses, filters).await
    }

    pub async fn enrollments(&self, filters: &Filters) -> Result<Vec<Enrollment>, ClientError> {
        self.list(Collection::Enrollments, filters).await
    }

    pub async fn files(&self, filters: &Filters) -> Result<Vec<FileMetadata>, ClientError> {
        self.list(Collection::FileMetadata, filters).await
    }

    pub async fn course(&self, id: i64) -> Result<Course, ClientError> {
        self.get(Collection::Courses, id).await
    }

    pub async fn create_course(&self, input: &CreateCourseInput) -> Result<Course, ClientError> {
        self.create(Collection::Courses, input).await
    }

    pub async fn update_course(&self, id: i64, input: &UpdateCourseInput) -> Result<Course, ClientError> {
        self.update(Collection::Courses, id, input).await
    }

    /// Published courses in any of `categories` (all when empty)
    pub async fn catalog(&self, categories: &[String]) -> Result<Vec<Course>, ClientError> {
        let query: Vec<(String, String)> = categories
            .iter()
            .map(|c| ("category".to_string(), c.clone()))
            .collect();
        self.client.get_with_query("/courses", &query).await
    }

    /// Checkout
    pub async fn enroll(&self, course_id: i64) -> Result<Enrollment, ClientError> {
        let request = self
            .client
            .request(Method::POST, &format!("/courses/{}/enroll", course_id))?;
        self.client.send_json(request).await
    }

    pub async fn course_content(
        &self,
        course_id: i64,
        search: &str,
        category: ContentCategory,
    ) -> Result<CourseContent, ClientError> {
        let query = vec![
            ("search".to_string(), search.to_string()),
            ("category".to_string(), category.to_string()),
        ];
        self.client
            .get_with_query(&format!("/courses/{}/content", course_id), &query)
            .await
    }

    pub async fn course_stats(&self, course_id: i64) -> Result<CourseStats, ClientError> {
        self.client.get(&format!("/courses/{}/stats", course_id)).await
    }

    /// Dashboard totals computed by the server
    pub async fn dashboard_stats(&self) -> Result<InstructorStats, ClientError> {
        self.client.get("/dashboard/stats").await
    }

    /// Locator for downloading a file; the file store checks access
    pub async fn download_reference(
        &self,
        bucket_id: &str,
        file_id: i64,
    ) -> Result<DownloadReference, ClientError> {
        let path = format!(
            "/storage/buckets/{}/files/{}/reference",
            urlencoding::encode(bucket_id),
            file_id
        );
        self.client.get(&path).await
    }

    /// Download locator for a file listed on a course page. Viewers who are
    /// neither enrolled nor the course owner are turned away without a call;
    /// the file store still makes its own check.
    pub async fn page_download_reference(
        &self,
        page: &CourseContent,
        viewer_id: i64,
        file: &FileMetadata,
    ) -> Result<DownloadReference, ClientError> {
        if !page.user_enrolled && page.course.instructor_id != viewer_id {
            return Err(ClientError::PermissionDenied(
                "Enroll in this course to download its files".to_string(),
            ));
        }
        self.download_reference(&file.bucket_id, file.id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::backend::BackendConfig;

    #[test]
    fn test_filters_build_query_pairs() {
        let filters = Filters::new().eq("instructorId", 3).one_of("courseId", [1, 2]);
        assert_eq!(
            filters.pairs(),
            &[
                ("instructorId".to_string(), "3".to_string()),
                ("courseId".to_string(), "1".to_string()),
                ("courseId".to_string(), "2".to_string()),
            ]
        );
        assert!(!filters.matches_nothing());
    }

    #[test]
    fn test_empty_membership_matches_nothing() {
        let filters = Filters::new().one_of("courseId", Vec::<i64>::new());
        assert!(filters.matches_nothing());
    }

    fn page(user_enrolled: bool) -> (CourseContent, FileMetadata) {
        let input: CreateCourseInput = serde_json::from_value(serde_json::json!({
            "title": "Rust",
            "description": "",
            "price": 100,
            "category": "programming",
            "isPublished": true
        }))
        .unwrap();
        let file = FileMetadata::new(1, "course-content", "stored.pdf", "Notes.pdf", "application/pdf", 10);
        let content = CourseContent {
            course: Course::new(input, 7),
            user_enrolled,
            files: vec![file.clone()],
        };
        (content, file)
    }

    #[tokio::test]
    async fn test_download_gate_skips_backend_when_not_enrolled() {
        // No endpoint configured: a call that gets past the gate fails with NotConfigured.
        let documents = DocumentClient::new(BackendClient::new(BackendConfig::default()).unwrap());

        let (content, file) = page(false);
        let err = documents.page_download_reference(&content, 3, &file).await.unwrap_err();
        assert!(matches!(err, ClientError::PermissionDenied(_)));

        let owner = documents.page_download_reference(&content, 7, &file).await.unwrap_err();
        assert_eq!(owner, ClientError::NotConfigured("COURSEHUB_ENDPOINT"));

        let (content, file) = page(true);
        let enrolled = documents.page_download_reference(&content, 3, &file).await.unwrap_err();
        assert_eq!(enrolled, ClientError::NotConfigured("COURSEHUB_ENDPOINT"));
    }

    #[tokio::test]
    async fn test_empty_membership_skips_the_backend() {
        // No endpoint configured: any real call would fail.
        let documents = DocumentClient::new(BackendClient::new(BackendConfig::default()).unwrap());
        let filters = Filters::new().one_of("courseId", Vec::<i64>::new());
        let enrollments = documents.enrollments(&filters).await.unwrap();
        assert!(enrollments.is_empty());
    }
}
