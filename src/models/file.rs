//! File metadata model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Describes a stored object without holding its bytes.
/// The bytes are addressed by `(bucket_id, file_name)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileMetadata {
    pub id: i64,
    pub course_id: i64,
    pub bucket_id: String,
    /// Stored object name
    pub file_name: String,
    /// Name the uploader gave the file
    pub original_name: String,
    pub mime_type: String,
    pub file_size: i64,
    pub uploaded_at: DateTime<Utc>,
    pub is_active: bool,
    /// Lower-cased extension of `original_name`
    #[serde(default)]
    pub file_type: String,
}

impl FileMetadata {
    pub fn new(
        course_id: i64,
        bucket_id: impl Into<String>,
        file_name: impl Into<String>,
        original_name: impl Into<String>,
        mime_type: impl Into<String>,
        file_size: i64,
    ) -> Self {
        let original_name = original_name.into();
        Self {
            id: 0,
            course_id,
            bucket_id: bucket_id.into(),
            file_name: file_name.into(),
            file_type: file_type_of(&original_name),
            original_name,
            mime_type: mime_type.into(),
            file_size,
            uploaded_at: Utc::now(),
            is_active: true,
        }
    }
}

/// Lower-cased extension of a file name, empty when there is none
pub fn file_type_of(name: &str) -> String {
    std::path::Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .unwrap_or_default()
}

/// Changes allowed on file metadata
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpdateFileInput {
    pub original_name: Option<String>,
    pub is_active: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_type_derived_from_original_name() {
        let file = FileMetadata::new(1, "b", "x.bin", "Quarterly Report.PDF", "application/pdf", 10);
        assert_eq!(file.file_type, "pdf");
        assert!(file.is_active);
        assert_eq!(file_type_of("README"), "");
        assert_eq!(file_type_of("clip.tar.gz"), "gz");
    }
}
