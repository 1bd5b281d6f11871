//! Ordered category → class index table.
//!
//! One instance is loaded with the configuration and handed by reference to
//! the normalizer, exporter and validator so that label indices never drift
//! between stages.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryVocabulary {
    /// Bumped whenever the ordering or membership changes.
    pub version: u32,
    /// Category names; position is the class index.
    pub names: Vec<String>,
    /// Class assigned to annotations whose category is unknown.
    pub default_class: usize,
}

impl Default for CategoryVocabulary {
    fn default() -> Self {
        Self {
            version: 1,
            names: ["steel", "aluminum", "copper", "brass"]
                .into_iter()
                .map(String::from)
                .collect(),
            default_class: 0,
        }
    }
}

impl CategoryVocabulary {
    pub fn new(version: u32, names: Vec<String>, default_class: usize) -> Self {
        Self {
            version,
            names,
            default_class,
        }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Case-insensitive lookup of a category name.
    pub fn class_id(&self, name: &str) -> Option<usize> {
        let name = name.trim();
        self.names.iter().position(|n| n.eq_ignore_ascii_case(name))
    }

    pub fn name(&self, class_id: usize) -> Option<&str> {
        self.names.get(class_id).map(String::as_str)
    }

    pub fn contains_index(&self, class_id: usize) -> bool {
        class_id < self.names.len()
    }

    /// Class index for `name`, falling back to the default class.
    /// The flag is `false` when the fallback was used.
    pub fn resolve(&self, name: &str) -> (usize, bool) {
        match self.class_id(name) {
            Some(id) => (id, true),
            None => (self.default_class, false),
        }
    }

    pub fn names_by_index(&self) -> BTreeMap<usize, String> {
        self.names.iter().cloned().enumerate().collect()
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.names.is_empty() {
            return Err("Vocabulary must name at least one category".to_string());
        }
        for (i, name) in self.names.iter().enumerate() {
            if name.trim().is_empty() {
                return Err(format!("Vocabulary entry {i} is empty"));
            }
            if self.class_id(name) != Some(i) {
                return Err(format!("Vocabulary entry '{name}' is duplicated"));
            }
        }
        if !self.contains_index(self.default_class) {
            return Err(format!(
                "Default class {} is outside the vocabulary (size {})",
                self.default_class,
                self.names.len()
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_vocabulary_order() {
        let vocab = CategoryVocabulary::default();
        assert_eq!(vocab.class_id("steel"), Some(0));
        assert_eq!(vocab.class_id("Copper"), Some(2));
        assert_eq!(vocab.name(3), Some("brass"));
        assert_eq!(vocab.name(4), None);
    }

    #[test]
    fn unknown_category_resolves_to_default() {
        let vocab = CategoryVocabulary::new(2, vec!["a".into(), "b".into()], 1);
        assert_eq!(vocab.resolve("a"), (0, true));
        assert_eq!(vocab.resolve("zinc"), (1, false));
    }

    #[test]
    fn validation_rejects_duplicates_and_bad_default() {
        let dup = CategoryVocabulary::new(1, vec!["a".into(), "A".into()], 0);
        assert!(dup.validate().is_err());

        let bad_default = CategoryVocabulary::new(1, vec!["a".into()], 3);
        assert!(bad_default.validate().is_err());

        assert!(CategoryVocabulary::default().validate().is_ok());
    }
}
