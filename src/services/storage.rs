//! File store
//!
//! `FileStore` keeps object bytes on disk at `<root>/<bucket>/<file_name>`.
//! `StorageService` sits on top of it and the file metadata collection: it
//! handles uploads and metadata edits by course owners, and it is the
//! authoritative check (enrolled, owner or admin) before a download
//! reference is issued or bytes are served.

use crate::config::StorageConfig;
use crate::db::repositories::{CourseRepository, EnrollmentRepository, FileRepository};
use crate::models::{file_type_of, Capability, Course, FileMetadata, UpdateFileInput, User};
use crate::services::document::DocumentServiceError;
use crate::validation::FieldErrors;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use uuid::Uuid;

/// Raw object storage on the local filesystem
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn object_path(&self, bucket: &str, file_name: &str) -> Result<PathBuf> {
        for segment in [bucket, file_name] {
            if segment.is_empty()
                || segment == "."
                || segment == ".."
                || segment.contains(['/', '\\'])
            {
                anyhow::bail!("Invalid object path segment: {:?}", segment);
            }
        }
        Ok(self.root.join(bucket).join(file_name))
    }

    /// Write an object, creating the bucket directory if needed
    pub async fn put(&self, bucket: &str, file_name: &str, bytes: &[u8]) -> Result<()> {
        let path = self.object_path(bucket, file_name)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create bucket directory: {:?}", parent))?;
        }
        fs::write(&path, bytes)
            .await
            .with_context(|| format!("Failed to write object: {:?}", path))
    }

    pub async fn get(&self, bucket: &str, file_name: &str) -> Result<Vec<u8>> {
        let path = self.object_path(bucket, file_name)?;
        fs::read(&path)
            .await
            .with_context(|| format!("Failed to read object: {:?}", path))
    }

    /// Remove an object. Missing objects are not an error.
    pub async fn remove(&self, bucket: &str, file_name: &str) -> Result<()> {
        let path = self.object_path(bucket, file_name)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("Failed to remove object: {:?}", path)),
        }
    }
}

/// An uploaded file before it is stored
#[derive(Debug, Clone)]
pub struct UploadInput {
    pub original_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

/// Locator for downloading a stored file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadReference {
    pub url: String,
    pub file_name: String,
    pub mime_type: String,
    pub file_size: i64,
}

/// Upload, access control and download of course files
pub struct StorageService {
    files: Arc<dyn FileRepository>,
    courses: Arc<dyn CourseRepository>,
    enrollments: Arc<dyn EnrollmentRepository>,
    store: Arc<FileStore>,
    config: StorageConfig,
    app_base_url: String,
}

impl StorageService {
    pub fn new(
        files: Arc<dyn FileRepository>,
        courses: Arc<dyn CourseRepository>,
        enrollments: Arc<dyn EnrollmentRepository>,
        store: Arc<FileStore>,
        config: StorageConfig,
        app_base_url: impl Into<String>,
    ) -> Self {
        Self {
            files,
            courses,
            enrollments,
            store,
            config,
            app_base_url: app_base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    /// Store a file for a course. Only the course owner or an admin may upload.
    pub async fn upload(
        &self,
        caller: &User,
        course_id: i64,
        input: UploadInput,
    ) -> Result<FileMetadata, DocumentServiceError> {
        let course = self.course(course_id).await?;
        if !can_manage(caller, &course) {
            return Err(DocumentServiceError::PermissionDenied(
                "Only the course owner can upload content".to_string(),
            ));
        }

        let mut errors = FieldErrors::new();
        if input.original_name.trim().is_empty() {
            errors.add("file", "File name is required");
        } else if !self.config.is_type_allowed(&input.mime_type) {
            errors.add("file", format!("File type not allowed: {}", input.mime_type));
        } else if input.bytes.len() as u64 > self.config.max_file_size {
            errors.add(
                "file",
                format!(
                    "File too large. Maximum size: {} MB",
                    self.config.max_file_size / 1024 / 1024
                ),
            );
        }
        errors.into_result().map_err(DocumentServiceError::Validation)?;

        let bucket = self.config.default_bucket.clone();
        let file_name = stored_name(&input.original_name);
        self.store
            .put(&bucket, &file_name, &input.bytes)
            .await
            .context("Failed to store uploaded file")?;

        let metadata = FileMetadata::new(
            course.id,
            bucket,
            file_name,
            input.original_name.trim(),
            input.mime_type,
            input.bytes.len() as i64,
        );
        let created = self
            .files
            .create(&metadata)
            .await
            .context("Failed to record file metadata")?;

        tracing::info!(
            course_id = course.id,
            file_id = created.id,
            size = created.file_size,
            "Stored course file"
        );
        Ok(created)
    }

    /// Issue a download locator after checking access
    pub async fn reference(
        &self,
        caller: &User,
        bucket: &str,
        file_id: i64,
    ) -> Result<DownloadReference, DocumentServiceError> {
        let file = self.accessible_file(caller, bucket, file_id).await?;
        Ok(DownloadReference {
            url: format!(
                "{}/api/v1/storage/buckets/{}/files/{}/download",
                self.app_base_url,
                urlencoding::encode(&file.bucket_id),
                file.id
            ),
            file_name: file.original_name,
            mime_type: file.mime_type,
            file_size: file.file_size,
        })
    }

    /// Metadata and bytes of a file after checking access
    pub async fn download(
        &self,
        caller: &User,
        bucket: &str,
        file_id: i64,
    ) -> Result<(FileMetadata, Vec<u8>), DocumentServiceError> {
        let file = self.accessible_file(caller, bucket, file_id).await?;
        let bytes = self
            .store
            .get(&file.bucket_id, &file.file_name)
            .await
            .context("Failed to read stored file")?;
        Ok((file, bytes))
    }

    /// Edit `originalName` / `isActive`; course owner or admin only
    pub async fn update_metadata(
        &self,
        caller: &User,
        file_id: i64,
        input: UpdateFileInput,
    ) -> Result<FileMetadata, DocumentServiceError> {
        let (mut file, course) = self.managed_file(caller, file_id).await?;

        if let Some(name) = input.original_name {
            if name.trim().is_empty() {
                let mut errors = FieldErrors::new();
                errors.add("originalName", "File name cannot be empty");
                return Err(DocumentServiceError::Validation(errors));
            }
            file.original_name = name.trim().to_string();
        }
        if let Some(is_active) = input.is_active {
            file.is_active = is_active;
        }

        let updated = self
            .files
            .update(&file)
            .await
            .context("Failed to update file metadata")?;
        tracing::debug!(course_id = course.id, file_id, "Updated file metadata");
        Ok(updated)
    }

    /// Delete bytes and metadata; course owner or admin only
    pub async fn delete_file(&self, caller: &User, file_id: i64) -> Result<(), DocumentServiceError> {
        let (file, _) = self.managed_file(caller, file_id).await?;
        self.store
            .remove(&file.bucket_id, &file.file_name)
            .await
            .context("Failed to remove stored file")?;
        self.files
            .delete(file.id)
            .await
            .context("Failed to delete file metadata")?;
        Ok(())
    }

    /// Remove the stored bytes of every file attached to a course.
    /// The metadata rows go with the course.
    pub async fn remove_course_objects(&self, course_id: i64) -> Result<(), DocumentServiceError> {
        let files = self
            .files
            .list(&[crate::db::ColumnFilter::equals(
                "course_id",
                crate::db::FilterValue::Integer(course_id),
            )])
            .await
            .context("Failed to list course files")?;
        for file in files {
            if let Err(e) = self.store.remove(&file.bucket_id, &file.file_name).await {
                tracing::warn!(file_id = file.id, "Failed to remove stored file: {:#}", e);
            }
        }
        Ok(())
    }

    async fn course(&self, course_id: i64) -> Result<Course, DocumentServiceError> {
        self.courses
            .get_by_id(course_id)
            .await
            .context("Failed to get course")?
            .ok_or_else(|| DocumentServiceError::NotFound(format!("Course {} not found", course_id)))
    }

    async fn file(&self, file_id: i64) -> Result<FileMetadata, DocumentServiceError> {
        self.files
            .get_by_id(file_id)
            .await
            .context("Failed to get file metadata")?
            .ok_or_else(|| DocumentServiceError::NotFound(format!("File {} not found", file_id)))
    }

    async fn managed_file(
        &self,
        caller: &User,
        file_id: i64,
    ) -> Result<(FileMetadata, Course), DocumentServiceError> {
        let file = self.file(file_id).await?;
        let course = self.course(file.course_id).await?;
        if !can_manage(caller, &course) {
            return Err(DocumentServiceError::PermissionDenied(
                "Only the course owner can change its files".to_string(),
            ));
        }
        Ok((file, course))
    }

    /// The file, if `caller` is enrolled in its course, owns it or is an
    /// admin. Inactive files are only visible to managers.
    async fn accessible_file(
        &self,
        caller: &User,
        bucket: &str,
        file_id: i64,
    ) -> Result<FileMetadata, DocumentServiceError> {
        let file = self.file(file_id).await?;
        if file.bucket_id != bucket {
            return Err(DocumentServiceError::NotFound(format!(
                "File {} not found in bucket {}",
                file_id, bucket
            )));
        }

        let course = self.course(file.course_id).await?;
        if can_manage(caller, &course) {
            return Ok(file);
        }
        if !file.is_active {
            return Err(DocumentServiceError::NotFound(format!("File {} not found", file_id)));
        }

        let enrolled = self
            .enrollments
            .find(course.id, caller.id)
            .await
            .context("Failed to check enrollment")?
            .is_some();
        if !enrolled {
            return Err(DocumentServiceError::PermissionDenied(
                "Enroll in this course to access its content".to_string(),
            ));
        }
        Ok(file)
    }
}

/// Course owner or a user who may manage any course
pub fn can_manage(user: &User, course: &Course) -> bool {
    course.is_owned_by(user.id) || user.can(Capability::ManageAnyCourse)
}

/// Unique object name keeping the original extension
fn stored_name(original_name: &str) -> String {
    let ext = file_type_of(original_name);
    if ext.is_empty() || ext.len() >= 10 {
        format!("{}.bin", Uuid::new_v4())
    } else {
        format!("{}.{}", Uuid::new_v4(), ext)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_get_remove() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let store = FileStore::new(dir.path());

        store.put("course-content", "a.txt", b"hello").await.unwrap();
        assert!(dir.path().join("course-content").join("a.txt").exists());
        assert_eq!(store.get("course-content", "a.txt").await.unwrap(), b"hello");

        store.remove("course-content", "a.txt").await.unwrap();
        store.remove("course-content", "a.txt").await.unwrap();
        assert!(store.get("course-content", "a.txt").await.is_err());
    }

    #[tokio::test]
    async fn test_rejects_path_traversal() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let store = FileStore::new(dir.path());

        assert!(store.put("..", "x", b"").await.is_err());
        assert!(store.put("bucket", "../x", b"").await.is_err());
        assert!(store.get("bucket", "").await.is_err());
    }

    #[test]
    fn test_stored_name_keeps_extension() {
        assert!(stored_name("Slides.PDF").ends_with(".pdf"));
        assert!(stored_name("Makefile").ends_with(".bin"));
        assert_ne!(stored_name("a.mp4"), stored_name("a.mp4"));
    }
}
