//! Enrollment model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Links a user to a course. Its existence grants content access and is the
/// unit of revenue accounting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Enrollment {
    pub id: i64,
    pub course_id: i64,
    pub user_id: i64,
    pub enrolled_at: DateTime<Utc>,
}

impl Enrollment {
    pub fn new(course_id: i64, user_id: i64) -> Self {
        Self {
            id: 0,
            course_id,
            user_id,
            enrolled_at: Utc::now(),
        }
    }
}

/// Input for creating an enrollment through the document layer.
/// The enrolled user is always the caller.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CreateEnrollmentInput {
    pub course_id: i64,
}
