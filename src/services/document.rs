//! Document query layer
//!
//! Collection-addressed access to users, courses, enrollments and file
//! metadata. Filters arrive as `field=value` pairs; a field given once is an
//! equality test and a repeated field is a membership test. Every operation
//! runs the caller's role through [`crate::models::UserRole::can`] before
//! touching a repository.

use crate::db::repositories::{EnrollmentRepository, FileRepository, UserRepository};
use crate::db::{ColumnFilter, FilterValue};
use crate::models::{
    Capability, Collection, CreateCourseInput, CreateEnrollmentInput, Document, UpdateCourseInput,
    UpdateFileInput, UpdateUserInput, User,
};
use crate::services::course::CourseService;
use crate::services::storage::StorageService;
use crate::validation::FieldErrors;
use anyhow::Context;
use serde::de::DeserializeOwned;
use std::sync::Arc;

/// Error types for document, course and storage operations
#[derive(Debug, thiserror::Error)]
pub enum DocumentServiceError {
    /// Unknown collection or record
    #[error("Not found: {0}")]
    NotFound(String),

    /// The caller's role does not allow the operation
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Bad filter, body or field value
    #[error("Validation failed: {0}")]
    Validation(FieldErrors),

    /// Uniqueness rule broken (e.g. enrolling twice)
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

impl From<crate::models::UnknownCollection> for DocumentServiceError {
    fn from(err: crate::models::UnknownCollection) -> Self {
        DocumentServiceError::NotFound(err.to_string())
    }
}

fn validation(field: &str, message: impl Into<String>) -> DocumentServiceError {
    let mut errors = FieldErrors::new();
    errors.add(field, message);
    DocumentServiceError::Validation(errors)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FieldKind {
    Integer,
    Text,
    Boolean,
}

/// A filterable field: wire name, column and value type
#[derive(Debug, Clone, Copy)]
pub struct FilterField {
    pub name: &'static str,
    pub column: &'static str,
    kind: FieldKind,
}

const fn field(name: &'static str, column: &'static str, kind: FieldKind) -> FilterField {
    FilterField { name, column, kind }
}

const USER_FIELDS: &[FilterField] = &[
    field("id", "id", FieldKind::Integer),
    field("email", "email", FieldKind::Text),
    field("role", "role", FieldKind::Text),
];

const COURSE_FIELDS: &[FilterField] = &[
    field("id", "id", FieldKind::Integer),
    field("instructorId", "instructor_id", FieldKind::Integer),
    field("isPublished", "is_published", FieldKind::Boolean),
    field("category", "category", FieldKind::Text),
];

const ENROLLMENT_FIELDS: &[FilterField] = &[
    field("id", "id", FieldKind::Integer),
    field("courseId", "course_id", FieldKind::Integer),
    field("userId", "user_id", FieldKind::Integer),
];

const FILE_FIELDS: &[FilterField] = &[
    field("id", "id", FieldKind::Integer),
    field("courseId", "course_id", FieldKind::Integer),
    field("bucketId", "bucket_id", FieldKind::Text),
    field("isActive", "is_active", FieldKind::Boolean),
    field("mimeType", "mime_type", FieldKind::Text),
];

/// Filterable fields of a collection
pub fn filter_fields(collection: Collection) -> &'static [FilterField] {
    match collection {
        Collection::Users => USER_FIELDS,
        Collection::Courses => COURSE_FIELDS,
        Collection::Enrollments => ENROLLMENT_FIELDS,
        Collection::FileMetadata => FILE_FIELDS,
    }
}

fn parse_value(field: &FilterField, raw: &str) -> Result<FilterValue, DocumentServiceError> {
    match field.kind {
        FieldKind::Integer => raw
            .trim()
            .parse()
            .map(FilterValue::Integer)
            .map_err(|_| validation(field.name, format!("Expected an integer, got '{}'", raw))),
        FieldKind::Boolean => match raw.trim() {
            "true" | "1" => Ok(FilterValue::Boolean(true)),
            "false" | "0" => Ok(FilterValue::Boolean(false)),
            _ => Err(validation(field.name, format!("Expected true or false, got '{}'", raw))),
        },
        FieldKind::Text => Ok(FilterValue::Text(raw.to_string())),
    }
}

/// Turn query pairs into column filters. Fields keep the order they first
/// appear in; a repeated field becomes a membership filter.
pub fn parse_filters(
    collection: Collection,
    params: &[(String, String)],
) -> Result<Vec<ColumnFilter>, DocumentServiceError> {
    let fields = filter_fields(collection);
    let mut grouped: Vec<(&FilterField, Vec<FilterValue>)> = Vec::new();

    for (name, raw) in params {
        let spec = fields
            .iter()
            .find(|f| f.name == name.as_str())
            .ok_or_else(|| validation(name, format!("Unknown filter field for {}", collection)))?;
        let value = parse_value(spec, raw)?;

        match grouped.iter_mut().find(|(f, _)| f.name == spec.name) {
            Some((_, values)) => values.push(value),
            None => grouped.push((spec, vec![value])),
        }
    }

    Ok(grouped
        .into_iter()
        .map(|(spec, mut values)| {
            if values.len() == 1 {
                ColumnFilter::equals(spec.column, values.remove(0))
            } else {
                ColumnFilter::one_of(spec.column, values)
            }
        })
        .collect())
}

fn parse_body<T: DeserializeOwned>(body: serde_json::Value) -> Result<T, DocumentServiceError> {
    serde_json::from_value(body).map_err(|e| validation("body", e.to_string()))
}

/// Document service
pub struct DocumentService {
    users: Arc<dyn UserRepository>,
    enrollments: Arc<dyn EnrollmentRepository>,
    files: Arc<dyn FileRepository>,
    courses: Arc<CourseService>,
    storage: Arc<StorageService>,
}

impl DocumentService {
    pub fn new(
        users: Arc<dyn UserRepository>,
        enrollments: Arc<dyn EnrollmentRepository>,
        files: Arc<dyn FileRepository>,
        courses: Arc<CourseService>,
        storage: Arc<StorageService>,
    ) -> Self {
        Self {
            users,
            enrollments,
            files,
            courses,
            storage,
        }
    }

    /// All records of `collection` matching `params` that the caller may read,
    /// ordered by id
    pub async fn list(
        &self,
        caller: &User,
        collection: Collection,
        params: &[(String, String)],
    ) -> Result<Vec<Document>, DocumentServiceError> {
        let mut filters = parse_filters(collection, params)?;

        let documents = match collection {
            Collection::Users => {
                if !caller.can(Capability::ListAllUsers) {
                    filters.push(ColumnFilter::equals("id", FilterValue::Integer(caller.id)));
                }
                self.users
                    .list(&filters)
                    .await
                    .context("Failed to list users")?
                    .into_iter()
                    .map(|u| Document::User(u.profile()))
                    .collect()
            }
            Collection::Courses => self
                .courses
                .list_visible(caller, &filters)
                .await?
                .into_iter()
                .map(Document::Course)
                .collect(),
            Collection::Enrollments => {
                let enrollments = self
                    .enrollments
                    .list(&filters)
                    .await
                    .context("Failed to list enrollments")?;
                let taught = if caller.can(Capability::ReadAllEnrollments) {
                    Vec::new()
                } else {
                    self.courses.taught_course_ids(caller.id).await?
                };
                enrollments
                    .into_iter()
                    .filter(|e| {
                        caller.can(Capability::ReadAllEnrollments)
                            || e.user_id == caller.id
                            || taught.contains(&e.course_id)
                    })
                    .map(Document::Enrollment)
                    .collect()
            }
            Collection::FileMetadata => self
                .files
                .list(&filters)
                .await
                .context("Failed to list file metadata")?
                .into_iter()
                .map(Document::File)
                .collect(),
        };
        Ok(documents)
    }

    /// One record by id
    pub async fn get(
        &self,
        caller: &User,
        collection: Collection,
        id: i64,
    ) -> Result<Document, DocumentServiceError> {
        match collection {
            Collection::Users => {
                if id != caller.id && !caller.can(Capability::ListAllUsers) {
                    return Err(DocumentServiceError::PermissionDenied(
                        "You can only view your own profile".to_string(),
                    ));
                }
                let user = self.user(id).await?;
                Ok(Document::User(user.profile()))
            }
            Collection::Courses => Ok(Document::Course(self.courses.get_visible(caller, id).await?)),
            Collection::Enrollments => {
                let enrollment = self
                    .enrollments
                    .get_by_id(id)
                    .await
                    .context("Failed to get enrollment")?
                    .ok_or_else(|| not_found(collection, id))?;
                let allowed = caller.can(Capability::ReadAllEnrollments)
                    || enrollment.user_id == caller.id
                    || self
                        .courses
                        .taught_course_ids(caller.id)
                        .await?
                        .contains(&enrollment.course_id);
                if !allowed {
                    return Err(DocumentServiceError::PermissionDenied(
                        "You cannot view this enrollment".to_string(),
                    ));
                }
                Ok(Document::Enrollment(enrollment))
            }
            Collection::FileMetadata => {
                let file = self
                    .files
                    .get_by_id(id)
                    .await
                    .context("Failed to get file metadata")?
                    .ok_or_else(|| not_found(collection, id))?;
                Ok(Document::File(file))
            }
        }
    }

    /// Create a record from a JSON body
    pub async fn create(
        &self,
        caller: &User,
        collection: Collection,
        body: serde_json::Value,
    ) -> Result<Document, DocumentServiceError> {
        match collection {
            Collection::Users => Err(DocumentServiceError::PermissionDenied(
                "Users are created through registration".to_string(),
            )),
            Collection::Courses => {
                let input: CreateCourseInput = parse_body(body)?;
                Ok(Document::Course(self.courses.create(caller, input).await?))
            }
            Collection::Enrollments => {
                let input: CreateEnrollmentInput = parse_body(body)?;
                Ok(Document::Enrollment(
                    self.courses.enroll(caller, input.course_id).await?,
                ))
            }
            Collection::FileMetadata => Err(DocumentServiceError::PermissionDenied(
                "File metadata is created by uploading a file".to_string(),
            )),
        }
    }

    /// Apply a partial update from a JSON body
    pub async fn update(
        &self,
        caller: &User,
        collection: Collection,
        id: i64,
        body: serde_json::Value,
    ) -> Result<Document, DocumentServiceError> {
        match collection {
            Collection::Users => {
                let input: UpdateUserInput = parse_body(body)?;
                Ok(Document::User(self.update_user(caller, id, input).await?.profile()))
            }
            Collection::Courses => {
                let input: UpdateCourseInput = parse_body(body)?;
                Ok(Document::Course(self.courses.update(caller, id, input).await?))
            }
            Collection::Enrollments => Err(DocumentServiceError::PermissionDenied(
                "Enrollments cannot be modified".to_string(),
            )),
            Collection::FileMetadata => {
                let input: UpdateFileInput = parse_body(body)?;
                Ok(Document::File(
                    self.storage.update_metadata(caller, id, input).await?,
                ))
            }
        }
    }

    pub async fn delete(
        &self,
        caller: &User,
        collection: Collection,
        id: i64,
    ) -> Result<(), DocumentServiceError> {
        match collection {
            Collection::Users => {
                if !caller.can(Capability::EditAnyUser) {
                    return Err(DocumentServiceError::PermissionDenied(
                        "Only admins can delete users".to_string(),
                    ));
                }
                let user = self.user(id).await?;
                for course_id in self.courses.taught_course_ids(user.id).await? {
                    self.storage.remove_course_objects(course_id).await?;
                }
                self.users
                    .delete(user.id)
                    .await
                    .context("Failed to delete user")?;
                tracing::info!(user_id = user.id, "Deleted user");
                Ok(())
            }
            Collection::Courses => self.courses.delete(caller, id).await,
            Collection::Enrollments => {
                let enrollment = self
                    .enrollments
                    .get_by_id(id)
                    .await
                    .context("Failed to get enrollment")?
                    .ok_or_else(|| not_found(collection, id))?;
                if enrollment.user_id != caller.id && !caller.can(Capability::ManageAnyCourse) {
                    return Err(DocumentServiceError::PermissionDenied(
                        "You can only cancel your own enrollments".to_string(),
                    ));
                }
                self.enrollments
                    .delete(enrollment.id)
                    .await
                    .context("Failed to delete enrollment")?;
                Ok(())
            }
            Collection::FileMetadata => self.storage.delete_file(caller, id).await,
        }
    }

    async fn user(&self, id: i64) -> Result<User, DocumentServiceError> {
        self.users
            .get_by_id(id)
            .await
            .context("Failed to get user")?
            .ok_or_else(|| not_found(Collection::Users, id))
    }

    async fn update_user(
        &self,
        caller: &User,
        id: i64,
        input: UpdateUserInput,
    ) -> Result<User, DocumentServiceError> {
        let admin = caller.can(Capability::EditAnyUser);
        if id != caller.id && !admin {
            return Err(DocumentServiceError::PermissionDenied(
                "You can only edit your own profile".to_string(),
            ));
        }
        if input.role.is_some() && !admin {
            return Err(DocumentServiceError::PermissionDenied(
                "Only admins can change roles".to_string(),
            ));
        }

        let mut user = self.user(id).await?;
        if let Some(name) = input.name {
            if name.trim().is_empty() {
                return Err(validation("name", "Name cannot be empty"));
            }
            user.full_name = name.trim().to_string();
        }
        if let Some(avatar) = input.avatar {
            user.avatar = Some(avatar).filter(|a| !a.trim().is_empty());
        }
        if let Some(bio) = input.bio {
            user.bio = Some(bio).filter(|b| !b.trim().is_empty());
        }
        if let Some(role) = input.role {
            user.role = role;
        }

        let updated = self
            .users
            .update(&user)
            .await
            .context("Failed to update user")?;
        Ok(updated)
    }
}

fn not_found(collection: Collection, id: i64) -> DocumentServiceError {
    DocumentServiceError::NotFound(format!("No document {} in {}", id, collection))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UserRole;
    use crate::services::fixtures::Fixture;
    use serde_json::json;

    fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
        items
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_parse_filters_equality_and_membership() {
        let filters = parse_filters(
            Collection::FileMetadata,
            &pairs(&[("courseId", "1"), ("isActive", "true"), ("courseId", "2")]),
        )
        .unwrap();

        assert_eq!(
            filters,
            vec![
                ColumnFilter::one_of(
                    "course_id",
                    vec![FilterValue::Integer(1), FilterValue::Integer(2)]
                ),
                ColumnFilter::equals("is_active", FilterValue::Boolean(true)),
            ]
        );
    }

    #[test]
    fn test_parse_filters_rejects_unknown_and_malformed() {
        match parse_filters(Collection::Users, &pairs(&[("passwordHash", "x")])) {
            Err(DocumentServiceError::Validation(errors)) => assert!(errors.contains("passwordHash")),
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(
            parse_filters(Collection::Courses, &pairs(&[("instructorId", "abc")])),
            Err(DocumentServiceError::Validation(_))
        ));
        assert!(parse_filters(Collection::Courses, &[]).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_users_read_scope() {
        let fx = Fixture::new().await;

        let own = fx.documents.list(&fx.student, Collection::Users, &[]).await.unwrap();
        assert_eq!(own.len(), 1);
        assert_eq!(own[0].id(), fx.student.id);

        let all = fx.documents.list(&fx.admin, Collection::Users, &[]).await.unwrap();
        assert_eq!(all.len(), 3);

        assert!(matches!(
            fx.documents.get(&fx.student, Collection::Users, fx.admin.id).await,
            Err(DocumentServiceError::PermissionDenied(_))
        ));
    }

    #[tokio::test]
    async fn test_user_writes() {
        let fx = Fixture::new().await;

        assert!(matches!(
            fx.documents.create(&fx.admin, Collection::Users, json!({})).await,
            Err(DocumentServiceError::PermissionDenied(_))
        ));

        let updated = fx
            .documents
            .update(&fx.student, Collection::Users, fx.student.id, json!({"bio": "Learning"}))
            .await
            .unwrap();
        assert!(matches!(updated, Document::User(ref p) if p.bio.as_deref() == Some("Learning")));

        assert!(matches!(
            fx.documents
                .update(&fx.student, Collection::Users, fx.student.id, json!({"role": "admin"}))
                .await,
            Err(DocumentServiceError::PermissionDenied(_))
        ));

        let promoted = fx
            .documents
            .update(&fx.admin, Collection::Users, fx.student.id, json!({"role": "instructor"}))
            .await
            .unwrap();
        assert!(matches!(promoted, Document::User(ref p) if p.role == UserRole::Instructor));

        assert!(matches!(
            fx.documents.delete(&fx.instructor, Collection::Users, fx.student.id).await,
            Err(DocumentServiceError::PermissionDenied(_))
        ));
        fx.documents.delete(&fx.admin, Collection::Users, fx.student.id).await.unwrap();
        assert!(matches!(
            fx.documents.get(&fx.admin, Collection::Users, fx.student.id).await,
            Err(DocumentServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_enrollment_scope_and_conflict() {
        let fx = Fixture::new().await;
        let course = fx
            .documents
            .create(&fx.instructor, Collection::Courses, json!({"title": "Rust", "isPublished": true, "price": 100}))
            .await
            .unwrap();

        let body = json!({"courseId": course.id()});
        let enrollment = fx
            .documents
            .create(&fx.student, Collection::Enrollments, body.clone())
            .await
            .unwrap();
        assert!(matches!(
            fx.documents.create(&fx.student, Collection::Enrollments, body).await,
            Err(DocumentServiceError::Conflict(_))
        ));

        let tutor_view = fx.documents.list(&fx.instructor, Collection::Enrollments, &[]).await.unwrap();
        assert_eq!(tutor_view.len(), 1);

        let other = fx.register("other@example.com").await;
        let other_view = fx.documents.list(&other, Collection::Enrollments, &[]).await.unwrap();
        assert!(other_view.is_empty());
        assert!(matches!(
            fx.documents.get(&other, Collection::Enrollments, enrollment.id()).await,
            Err(DocumentServiceError::PermissionDenied(_))
        ));

        assert!(matches!(
            fx.documents.delete(&other, Collection::Enrollments, enrollment.id()).await,
            Err(DocumentServiceError::PermissionDenied(_))
        ));
        fx.documents.delete(&fx.student, Collection::Enrollments, enrollment.id()).await.unwrap();
    }

    #[tokio::test]
    async fn test_list_filters_and_membership() {
        let fx = Fixture::new().await;
        let mut ids = Vec::new();
        for title in ["A", "B", "C"] {
            let doc = fx
                .documents
                .create(&fx.instructor, Collection::Courses, json!({"title": title, "isPublished": true}))
                .await
                .unwrap();
            ids.push(doc.id());
        }

        let (first, last) = (ids[0].to_string(), ids[2].to_string());
        let params = pairs(&[("id", first.as_str()), ("id", last.as_str())]);
        let listed = fx.documents.list(&fx.student, Collection::Courses, &params).await.unwrap();
        let got: Vec<i64> = listed.iter().map(Document::id).collect();
        assert_eq!(got, vec![ids[0], ids[2]]);
    }

    #[tokio::test]
    async fn test_file_metadata_writes() {
        let fx = Fixture::new().await;
        let course = fx
            .documents
            .create(&fx.instructor, Collection::Courses, json!({"title": "A", "isPublished": true}))
            .await
            .unwrap();
        let file = fx.upload(&fx.instructor, course.id(), "notes.pdf", "application/pdf").await;

        assert!(matches!(
            fx.documents.create(&fx.instructor, Collection::FileMetadata, json!({})).await,
            Err(DocumentServiceError::PermissionDenied(_))
        ));
        assert!(matches!(
            fx.documents
                .update(&fx.student, Collection::FileMetadata, file.id, json!({"isActive": false}))
                .await,
            Err(DocumentServiceError::PermissionDenied(_))
        ));

        let hidden = fx
            .documents
            .update(&fx.instructor, Collection::FileMetadata, file.id, json!({"isActive": false}))
            .await
            .unwrap();
        assert!(matches!(hidden, Document::File(ref f) if !f.is_active));

        let listed = fx
            .documents
            .list(&fx.student, Collection::FileMetadata, &pairs(&[("isActive", "false")]))
            .await
            .unwrap();
        assert_eq!(listed.len(), 1);

        fx.documents.delete(&fx.instructor, Collection::FileMetadata, file.id).await.unwrap();
        assert!(!fx.storage_root().join(&file.bucket_id).join(&file.file_name).exists());
    }

    #[tokio::test]
    async fn test_bad_body_is_validation_error() {
        let fx = Fixture::new().await;
        let result = fx
            .documents
            .create(&fx.instructor, Collection::Courses, json!({"title": "A", "instructorId": 5}))
            .await;
        assert!(matches!(result, Err(DocumentServiceError::Validation(_))));
    }
}
