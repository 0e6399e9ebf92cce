//! Course content search and category filter

use crate::models::FileMetadata;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Content tab on the course page
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentCategory {
    #[default]
    All,
    Documents,
    Images,
    Videos,
}

impl ContentCategory {
    /// Whether a MIME type belongs to this category
    pub fn matches(self, mime_type: &str) -> bool {
        let mime = mime_type.to_ascii_lowercase();
        match self {
            ContentCategory::All => true,
            ContentCategory::Images => mime.starts_with("image/"),
            ContentCategory::Videos => mime.starts_with("video/"),
            ContentCategory::Documents => mime.contains("pdf") || mime.contains("document"),
        }
    }
}

impl fmt::Display for ContentCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ContentCategory::All => "all",
            ContentCategory::Documents => "documents",
            ContentCategory::Images => "images",
            ContentCategory::Videos => "videos",
        };
        f.write_str(s)
    }
}

impl FromStr for ContentCategory {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "all" => Ok(ContentCategory::All),
            "documents" => Ok(ContentCategory::Documents),
            "images" => Ok(ContentCategory::Images),
            "videos" => Ok(ContentCategory::Videos),
            other => Err(anyhow::anyhow!("Unknown content category: {}", other)),
        }
    }
}

/// Whether `file` matches the search term (name or type, case-insensitive)
/// and the category.
pub fn matches_content(file: &FileMetadata, search: &str, category: ContentCategory) -> bool {
    let term = search.to_lowercase();
    let name_hit = term.is_empty()
        || file.original_name.to_lowercase().contains(&term)
        || file.file_type.to_lowercase().contains(&term);
    name_hit && category.matches(&file.mime_type)
}

/// Files that pass [`matches_content`], in input order
pub fn filter_content<'a>(
    files: &'a [FileMetadata],
    search: &str,
    category: ContentCategory,
) -> Vec<&'a FileMetadata> {
    files
        .iter()
        .filter(|f| matches_content(f, search, category))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn file(name: &str, mime: &str) -> FileMetadata {
        FileMetadata::new(1, "course-content", format!("stored-{}", name), name, mime, 1)
    }

    fn library() -> Vec<FileMetadata> {
        vec![
            file("Lecture 1.mp4", "video/mp4"),
            file("Quarterly REPORT.pdf", "application/pdf"),
            file("diagram.png", "image/png"),
            file("report-notes.docx", "application/vnd.openxmlformats-officedocument.wordprocessingml.document"),
            file("clip.webm", "video/webm"),
        ]
    }

    #[test]
    fn test_videos_without_search() {
        let files = library();
        let names: Vec<_> = filter_content(&files, "", ContentCategory::Videos)
            .iter()
            .map(|f| f.original_name.as_str())
            .collect();
        assert_eq!(names, vec!["Lecture 1.mp4", "clip.webm"]);
    }

    #[test]
    fn test_search_is_case_insensitive() {
        let files = library();
        let names: Vec<_> = filter_content(&files, "report", ContentCategory::All)
            .iter()
            .map(|f| f.original_name.as_str())
            .collect();
        assert_eq!(names, vec!["Quarterly REPORT.pdf", "report-notes.docx"]);
    }

    #[test]
    fn test_search_by_file_type() {
        let files = library();
        assert_eq!(filter_content(&files, "PNG", ContentCategory::All).len(), 1);
        assert_eq!(filter_content(&files, "", ContentCategory::Documents).len(), 2);
        assert_eq!(filter_content(&files, "", ContentCategory::Images).len(), 1);
    }

    #[test]
    fn test_whitespace_is_part_of_the_term() {
        let files = library();
        let names: Vec<_> = filter_content(&files, " ", ContentCategory::All)
            .iter()
            .map(|f| f.original_name.as_str())
            .collect();
        assert_eq!(names, vec!["Lecture 1.mp4", "Quarterly REPORT.pdf"]);
    }

    #[test]
    fn test_parse_category() {
        assert_eq!("".parse::<ContentCategory>().unwrap(), ContentCategory::All);
        assert_eq!("Videos".parse::<ContentCategory>().unwrap(), ContentCategory::Videos);
        assert!("audio".parse::<ContentCategory>().is_err());
        assert_eq!(ContentCategory::Documents.to_string(), "documents");
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(20))]

        #[test]
        fn filter_only_removes(search in "[a-zA-Z.]{0,6}", which in 0usize..4) {
            let category = [
                ContentCategory::All,
                ContentCategory::Documents,
                ContentCategory::Images,
                ContentCategory::Videos,
            ][which];
            let files = library();
            let kept = filter_content(&files, &search, category);
            prop_assert!(kept.len() <= files.len());
            for f in kept {
                prop_assert!(category.matches(&f.mime_type));
            }
            prop_assert_eq!(filter_content(&files, "", ContentCategory::All).len(), files.len());
        }
    }
}
