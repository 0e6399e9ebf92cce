//! Shared setup for service tests: an in-memory database, a temporary file
//! store and three signed-up users (admin, instructor, student).

use super::*;
use crate::db::repositories::UserRepository;
use crate::db::{create_test_pool, migrations};
use crate::models::{FileMetadata, User, UserRole};
use std::path::PathBuf;
use tempfile::TempDir;

pub(crate) struct Fixture {
    pub pool: DynDatabasePool,
    pub config: Config,
    pub auth: Arc<AuthService>,
    pub courses: Arc<CourseService>,
    pub storage: Arc<StorageService>,
    pub documents: Arc<DocumentService>,
    pub admin: User,
    pub instructor: User,
    pub student: User,
    _dir: TempDir,
}

impl Fixture {
    pub async fn new() -> Self {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        let mut config = Config::default();
        config.storage.path = dir.path().join("storage");
        let services = Services::new(pool.clone(), &config);

        let mut fixture = Self {
            pool,
            config,
            auth: services.auth,
            courses: services.courses,
            storage: services.storage,
            documents: services.documents,
            admin: placeholder(),
            instructor: placeholder(),
            student: placeholder(),
            _dir: dir,
        };

        fixture.admin = fixture.register("admin@example.com").await;
        let instructor = fixture.register("tutor@example.com").await;
        fixture.instructor = fixture.set_role(instructor, UserRole::Instructor).await;
        fixture.student = fixture.register("student@example.com").await;
        fixture
    }

    /// Register an account through the identity service
    pub async fn register(&self, email: &str) -> User {
        self.auth
            .register(RegisterInput::new(email, "Secret123", "Secret123", "Test User"))
            .await
            .expect("Failed to register")
            .user
    }

    pub async fn set_role(&self, mut user: User, role: UserRole) -> User {
        user.role = role;
        SqlxUserRepository::new(self.pool.clone())
            .update(&user)
            .await
            .expect("Failed to update role")
    }

    /// Upload a small file as `caller`
    pub async fn upload(&self, caller: &User, course_id: i64, name: &str, mime: &str) -> FileMetadata {
        self.storage
            .upload(
                caller,
                course_id,
                UploadInput {
                    original_name: name.to_string(),
                    mime_type: mime.to_string(),
                    bytes: format!("contents of {}", name).into_bytes(),
                },
            )
            .await
            .expect("Failed to upload")
    }

    pub fn storage_root(&self) -> PathBuf {
        self.config.storage.path.clone()
    }
}

fn placeholder() -> User {
    User::new(String::new(), String::new(), String::new(), UserRole::Regular)
}
