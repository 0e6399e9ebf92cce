//! Course model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A course owned by an instructor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    pub id: i64,
    pub title: String,
    pub description: String,
    /// Price in minor currency units
    pub price: i64,
    /// Catalog category
    pub category: String,
    pub is_published: bool,
    pub instructor_id: i64,
    pub thumbnail: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Course {
    /// New course owned by `instructor_id`, published only if the input says so
    pub fn new(input: CreateCourseInput, instructor_id: i64) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            title: input.title.trim().to_string(),
            description: input.description,
            price: input.price,
            category: input.category.trim().to_string(),
            is_published: input.is_published,
            instructor_id,
            thumbnail: input.thumbnail,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_owned_by(&self, user_id: i64) -> bool {
        self.instructor_id == user_id
    }

    /// Apply an update in place
    pub fn apply(&mut self, input: UpdateCourseInput) {
        if let Some(title) = input.title {
            self.title = title.trim().to_string();
        }
        if let Some(description) = input.description {
            self.description = description;
        }
        if let Some(price) = input.price {
            self.price = price;
        }
        if let Some(category) = input.category {
            self.category = category.trim().to_string();
        }
        if let Some(is_published) = input.is_published {
            self.is_published = is_published;
        }
        if let Some(thumbnail) = input.thumbnail {
            self.thumbnail = if thumbnail.trim().is_empty() {
                None
            } else {
                Some(thumbnail)
            };
        }
    }
}

/// Input for creating a course
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CreateCourseInput {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub price: i64,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub is_published: bool,
    #[serde(default)]
    pub thumbnail: Option<String>,
}

/// Input for updating a course
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpdateCourseInput {
    pub title: Option<String>,
    pub description: Option<String>,
    pub price: Option<i64>,
    pub category: Option<String>,
    pub is_published: Option<bool>,
    pub thumbnail: Option<String>,
}
