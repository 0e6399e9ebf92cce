//! Services layer - Business logic
//!
//! Services implement the rules on top of the repositories:
//! - `auth`: identity provider (registration, login, sessions, profile)
//! - `document`: collection-addressed CRUD with role checks
//! - `course`: catalog, checkout, course content and statistics
//! - `storage`: file bytes, uploads and download authorization

pub mod auth;
pub mod course;
pub mod document;
pub mod password;
pub mod storage;

#[cfg(test)]
pub(crate) mod fixtures;

pub use auth::{AuthService, AuthServiceError, LoginInput, ProfileInput, RegisterInput, SignedIn};
pub use course::{CourseContent, CourseService};
pub use document::{parse_filters, DocumentService, DocumentServiceError};
pub use password::{hash_password, verify_password};
pub use storage::{DownloadReference, FileStore, StorageService, UploadInput};

use crate::config::Config;
use crate::db::repositories::{
    SqlxCourseRepository, SqlxEnrollmentRepository, SqlxFileRepository, SqlxSessionRepository,
    SqlxUserRepository,
};
use crate::db::DynDatabasePool;
use std::sync::Arc;

/// Every service, wired to one database pool
#[derive(Clone)]
pub struct Services {
    pub auth: Arc<AuthService>,
    pub courses: Arc<CourseService>,
    pub storage: Arc<StorageService>,
    pub documents: Arc<DocumentService>,
}

impl Services {
    pub fn new(pool: DynDatabasePool, config: &Config) -> Self {
        let users = SqlxUserRepository::boxed(pool.clone());
        let sessions = SqlxSessionRepository::boxed(pool.clone());
        let courses = SqlxCourseRepository::boxed(pool.clone());
        let enrollments = SqlxEnrollmentRepository::boxed(pool.clone());
        let files = SqlxFileRepository::boxed(pool);

        let auth = Arc::new(AuthService::with_session_lifetime(
            users.clone(),
            sessions,
            config.session.lifetime_days,
        ));
        let storage = Arc::new(StorageService::new(
            files.clone(),
            courses.clone(),
            enrollments.clone(),
            Arc::new(FileStore::new(config.storage.path.clone())),
            config.storage.clone(),
            config.site.app_base_url.clone(),
        ));
        let course_service = Arc::new(CourseService::new(
            courses,
            enrollments.clone(),
            files.clone(),
            storage.clone(),
        ));
        let documents = Arc::new(DocumentService::new(
            users,
            enrollments,
            files,
            course_service.clone(),
            storage.clone(),
        ));

        Self {
            auth,
            courses: course_service,
            storage,
            documents,
        }
    }
}
