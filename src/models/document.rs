//! Collections exposed through the document layer and the records they hold.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::{Course, Enrollment, FileMetadata, UserProfile};

/// Named collection in the document store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Users,
    Courses,
    Enrollments,
    FileMetadata,
}

impl Collection {
    pub const ALL: [Collection; 4] = [
        Collection::Users,
        Collection::Courses,
        Collection::Enrollments,
        Collection::FileMetadata,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Collection::Users => "users",
            Collection::Courses => "courses",
            Collection::Enrollments => "enrollments",
            Collection::FileMetadata => "file-metadata",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Returned when a collection name is not known
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Collection not found: {0}")]
pub struct UnknownCollection(pub String);

impl FromStr for Collection {
    type Err = UnknownCollection;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Collection::ALL
            .into_iter()
            .find(|c| c.name() == s)
            .ok_or_else(|| UnknownCollection(s.to_string()))
    }
}

/// A normalized record from any collection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Document {
    User(UserProfile),
    Course(Course),
    Enrollment(Enrollment),
    File(FileMetadata),
}

impl Document {
    pub fn id(&self) -> i64 {
        match self {
            Document::User(u) => u.id,
            Document::Course(c) => c.id,
            Document::Enrollment(e) => e.id,
            Document::File(f) => f.id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collection_names_round_trip() {
        for collection in Collection::ALL {
            assert_eq!(collection.name().parse::<Collection>().unwrap(), collection);
        }
        assert_eq!(
            "lessons".parse::<Collection>(),
            Err(UnknownCollection("lessons".to_string()))
        );
    }

    #[test]
    fn test_document_serializes_without_tag() {
        let enrollment = Enrollment::new(4, 5);
        let json = serde_json::to_value(Document::Enrollment(enrollment)).unwrap();
        assert_eq!(json["courseId"], 4);
        assert!(json.get("Enrollment").is_none());
    }
}
