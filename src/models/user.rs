//! User model
//!
//! Defines the User entity, its closed role set and the capability check every
//! authorization decision goes through.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// User entity as stored server-side.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Unique identifier
    pub id: i64,
    /// Email address (unique, login identity)
    pub email: String,
    /// Password hash (argon2)
    #[serde(skip_serializing)]
    pub password_hash: String,
    /// Display name
    pub full_name: String,
    pub role: UserRole,
    pub avatar: Option<String>,
    pub bio: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Create a new User. The password must already be hashed.
    pub fn new(email: String, password_hash: String, full_name: String, role: UserRole) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            email,
            password_hash,
            full_name,
            role,
            avatar: None,
            bio: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Check a capability against this user's role
    pub fn can(&self, capability: Capability) -> bool {
        self.role.can(capability)
    }

    /// Instructors and admins both count as instructors
    pub fn is_instructor(&self) -> bool {
        self.role.is_instructor()
    }

    /// Public profile view of this user
    pub fn profile(&self) -> UserProfile {
        UserProfile::from(self.clone())
    }
}

/// User role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    /// Learner
    #[default]
    Regular,
    /// Creates and sells courses
    Instructor,
    /// Full access
    Admin,
}

impl UserRole {
    pub fn is_instructor(self) -> bool {
        matches!(self, UserRole::Instructor | UserRole::Admin)
    }

    /// The single capability table for the whole application.
    pub fn can(self, capability: Capability) -> bool {
        match capability {
            Capability::ListAllUsers
            | Capability::EditAnyUser
            | Capability::ManageAnyCourse
            | Capability::ReadAllEnrollments => self == UserRole::Admin,
            Capability::CreateCourse | Capability::ViewInstructorDashboard => self.is_instructor(),
            Capability::Enroll => true,
        }
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UserRole::Regular => write!(f, "regular"),
            UserRole::Instructor => write!(f, "instructor"),
            UserRole::Admin => write!(f, "admin"),
        }
    }
}

impl FromStr for UserRole {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "regular" => Ok(UserRole::Regular),
            "instructor" => Ok(UserRole::Instructor),
            "admin" => Ok(UserRole::Admin),
            _ => Err(anyhow::anyhow!("Invalid user role: {}", s)),
        }
    }
}

/// Things a role may be allowed to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    /// See every user profile
    ListAllUsers,
    /// Edit any user's profile or role, delete users
    EditAnyUser,
    /// Create a course owned by oneself
    CreateCourse,
    /// Update/delete courses and content owned by others
    ManageAnyCourse,
    /// See every enrollment
    ReadAllEnrollments,
    /// Open the instructor dashboard
    ViewInstructorDashboard,
    /// Enroll oneself in a published course
    Enroll,
}

/// Public user profile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: i64,
    pub email: String,
    pub name: String,
    pub role: UserRole,
    pub avatar: Option<String>,
    pub bio: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<User> for UserProfile {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            name: user.full_name,
            role: user.role,
            avatar: user.avatar,
            bio: user.bio,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

/// Profile changes; `None` leaves a field untouched, an empty string clears it.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpdateUserInput {
    pub name: Option<String>,
    pub avatar: Option<String>,
    pub bio: Option<String>,
    /// Admin only
    pub role: Option<UserRole>,
}
