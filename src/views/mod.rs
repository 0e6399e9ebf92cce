//! Derived view state
//!
//! Pure functions over snapshots of records: dashboard statistics, course
//! content filtering and catalog category filtering. Used by the server
//! endpoints and by the client.

pub mod catalog;
pub mod content;
pub mod stats;

pub use catalog::{filter_by_categories, matches_categories, Categorized};
pub use content::{filter_content, matches_content, ContentCategory};
pub use stats::{course_stats, instructor_stats, scope_courses, CourseStats, InstructorStats};
