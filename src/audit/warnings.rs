//! Ordered, de-duplicating warning collection.

use indexmap::IndexSet;
use serde::Serialize;

/// Warnings in first-seen order, deduplicated by exact text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct WarningSet {
    items: IndexSet<String>,
}

impl WarningSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a warning; returns `false` if the exact text was already present.
    pub fn insert(&mut self, warning: impl Into<String>) -> bool {
        self.items.insert(warning.into())
    }

    pub fn contains(&self, warning: &str) -> bool {
        self.items.contains(warning)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.items.iter().map(String::as_str)
    }
}

impl Extend<String> for WarningSet {
    fn extend<T: IntoIterator<Item = String>>(&mut self, iter: T) {
        self.items.extend(iter);
    }
}

impl<'a> IntoIterator for &'a WarningSet {
    type Item = &'a String;
    type IntoIter = indexmap::set::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_insertion_order_and_drops_duplicates() {
        let mut set = WarningSet::new();
        assert!(set.insert("Ethernet 2: Power saving enabled (can cause dropouts)"));
        assert!(set.insert("Wi-Fi: WiFi adapter is ENABLED"));
        assert!(!set.insert("Ethernet 2: Power saving enabled (can cause dropouts)"));
        assert!(set.insert("ethernet 2: power saving enabled (can cause dropouts)"));

        let items: Vec<&str> = set.iter().collect();
        assert_eq!(
            items,
            vec![
                "Ethernet 2: Power saving enabled (can cause dropouts)",
                "Wi-Fi: WiFi adapter is ENABLED",
                "ethernet 2: power saving enabled (can cause dropouts)",
            ]
        );
    }

    #[test]
    fn serializes_as_plain_list() {
        let mut set = WarningSet::new();
        set.extend(vec!["b".to_string(), "a".to_string(), "b".to_string()]);
        assert_eq!(serde_json::to_string(&set).unwrap(), r#"["b","a"]"#);
    }
}
