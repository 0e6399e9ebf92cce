//! Data models
//!
//! Entities shared by the server, the repositories and the client:
//! users and their roles, sessions, courses, enrollments, file metadata and
//! the collection/document wrapper used by the document layer.

mod course;
mod document;
mod enrollment;
mod file;
mod session;
mod user;

pub use course::{Course, CreateCourseInput, UpdateCourseInput};
pub use document::{Collection, Document, UnknownCollection};
pub use enrollment::{CreateEnrollmentInput, Enrollment};
pub use file::{file_type_of, FileMetadata, UpdateFileInput};
pub use session::Session;
pub use user::{Capability, UpdateUserInput, User, UserProfile, UserRole};
