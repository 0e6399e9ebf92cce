//! Catalog category filter

use crate::models::Course;

/// Anything the catalog can filter by category
pub trait Categorized {
    fn category(&self) -> &str;
}

impl Categorized for Course {
    fn category(&self) -> &str {
        &self.category
    }
}

/// True when `category` is selected. An empty selection selects everything.
pub fn matches_categories(category: &str, selected: &[String]) -> bool {
    selected.is_empty() || selected.iter().any(|s| s == category)
}

pub fn filter_by_categories<'a, T: Categorized>(items: &'a [T], selected: &[String]) -> Vec<&'a T> {
    items
        .iter()
        .filter(|item| matches_categories(item.category(), selected))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Item(&'static str);

    impl Categorized for Item {
        fn category(&self) -> &str {
            self.0
        }
    }

    #[test]
    fn test_empty_selection_keeps_everything() {
        let items = [Item("design"), Item("programming")];
        assert_eq!(filter_by_categories(&items, &[]).len(), 2);
    }

    #[test]
    fn test_selection_is_membership() {
        let items = [Item("design"), Item("programming"), Item("music"), Item("design")];
        let selected = vec!["design".to_string(), "music".to_string()];
        let kept: Vec<_> = filter_by_categories(&items, &selected).iter().map(|i| i.0).collect();
        assert_eq!(kept, vec!["design", "music", "design"]);
        assert!(!matches_categories("Design", &selected));
    }
}
