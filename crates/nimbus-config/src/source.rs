//! Named configuration sources and the ordered list that holds them
//!
//! A [`ConfigSource`] is a named, ordered set of key/value entries produced
//! by some resolution mechanism (a file, the process environment, a remote
//! config server). [`PropertySources`] keeps them in a meaningful sequence:
//! later sources override earlier ones when a key is looked up, so the
//! positional operations here are the primitives the merge engine builds on.
//!
//! None of these operations are safe for unsynchronized concurrent callers;
//! the refresher serializes access around them.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use crate::{RefreshError, Result};

/// A named configuration source: an ordered key→value mapping
///
/// Identity is by name. Two sources with the same name are "the same slot"
/// in a [`PropertySources`] list. Instances are immutable value objects from
/// the merge engine's point of view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigSource {
    name: String,
    values: IndexMap<String, Value>,
}

impl ConfigSource {
    /// Create an empty source with the given name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            values: IndexMap::new(),
        }
    }

    /// Builder-style entry insertion
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Entries in insertion order
    pub fn entries(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// An ordered, name-unique sequence of configuration sources
///
/// Insertion order is semantically meaningful: when a key appears in more
/// than one source, the source later in the list wins. The merge engine
/// relies on `replace` preserving the original index and on `add_after` /
/// `add_first` for anchor-based positioning.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PropertySources {
    sources: IndexMap<String, ConfigSource>,
}

impl PropertySources {
    pub fn new() -> Self {
        Self::default()
    }

    /// O(1) containment check by name
    pub fn contains(&self, name: &str) -> bool {
        self.sources.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&ConfigSource> {
        self.sources.get(name)
    }

    /// Replace the source occupying `source.name()`'s slot, preserving its
    /// position in the list
    pub fn replace(&mut self, source: ConfigSource) -> Result<()> {
        match self.sources.get_mut(source.name()) {
            Some(slot) => {
                *slot = source;
                Ok(())
            }
            None => Err(RefreshError::source_not_found(source.name())),
        }
    }

    /// Insert `source` immediately after the source named `anchor`
    ///
    /// Fails with [`RefreshError::AnchorNotFound`] if the anchor is absent;
    /// callers are expected to have verified the anchor beforehand.
    pub fn add_after(&mut self, anchor: &str, source: ConfigSource) -> Result<()> {
        if self.contains(source.name()) {
            return Err(RefreshError::duplicate_source(source.name()));
        }
        let index = self
            .sources
            .get_index_of(anchor)
            .ok_or_else(|| RefreshError::anchor_not_found(anchor))?;
        self.sources
            .shift_insert(index + 1, source.name().to_string(), source);
        Ok(())
    }

    /// Insert `source` at the head of the list
    pub fn add_first(&mut self, source: ConfigSource) -> Result<()> {
        if self.contains(source.name()) {
            return Err(RefreshError::duplicate_source(source.name()));
        }
        self.sources
            .shift_insert(0, source.name().to_string(), source);
        Ok(())
    }

    /// Append `source` at the tail of the list
    pub fn add_last(&mut self, source: ConfigSource) -> Result<()> {
        if self.contains(source.name()) {
            return Err(RefreshError::duplicate_source(source.name()));
        }
        self.sources.insert(source.name().to_string(), source);
        Ok(())
    }

    /// Remove a source by name, preserving the order of the rest
    pub fn remove(&mut self, name: &str) -> Option<ConfigSource> {
        self.sources.shift_remove(name)
    }

    /// Sources in list order
    pub fn iter(&self) -> impl Iterator<Item = &ConfigSource> {
        self.sources.values()
    }

    /// Source names in list order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.sources.keys().map(|k| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Effective value of `key`: the entry from the last source containing it
    pub fn get_value(&self, key: &str) -> Option<&Value> {
        self.sources.values().rev().find_map(|s| s.get(key))
    }

    /// Flatten the list into its effective key→value view
    ///
    /// Later sources override earlier ones, matching [`get_value`].
    ///
    /// [`get_value`]: PropertySources::get_value
    pub fn effective_values(&self) -> HashMap<String, Value> {
        let mut flattened = HashMap::new();
        for source in self.sources.values() {
            for (key, value) in source.entries() {
                flattened.insert(key.to_string(), value.clone());
            }
        }
        flattened
    }
}

impl FromIterator<ConfigSource> for PropertySources {
    fn from_iter<I: IntoIterator<Item = ConfigSource>>(iter: I) -> Self {
        let mut sources = Self::new();
        for source in iter {
            // last one wins on a duplicate name, keeping names unique
            if sources.contains(source.name()) {
                let _ = sources.replace(source);
            } else {
                let _ = sources.add_last(source);
            }
        }
        sources
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn named(name: &str) -> ConfigSource {
        ConfigSource::new(name).with("origin", name)
    }

    fn order(sources: &PropertySources) -> Vec<&str> {
        sources.names().collect()
    }

    #[test]
    fn test_replace_preserves_index() {
        let mut sources: PropertySources =
            [named("a"), named("b"), named("c")].into_iter().collect();

        let replacement = ConfigSource::new("b").with("origin", "b2");
        sources.replace(replacement).unwrap();

        assert_eq!(order(&sources), vec!["a", "b", "c"]);
        assert_eq!(sources.get("b").unwrap().get("origin"), Some(&json!("b2")));
    }

    #[test]
    fn test_replace_missing_fails() {
        let mut sources: PropertySources = [named("a")].into_iter().collect();
        let err = sources.replace(named("ghost")).unwrap_err();
        assert!(matches!(err, RefreshError::SourceNotFound { name } if name == "ghost"));
    }

    #[test]
    fn test_add_after() {
        let mut sources: PropertySources = [named("a"), named("c")].into_iter().collect();
        sources.add_after("a", named("b")).unwrap();
        assert_eq!(order(&sources), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_add_after_missing_anchor() {
        let mut sources: PropertySources = [named("a")].into_iter().collect();
        let err = sources.add_after("ghost", named("b")).unwrap_err();
        assert!(matches!(err, RefreshError::AnchorNotFound { name } if name == "ghost"));
        assert_eq!(order(&sources), vec!["a"]);
    }

    #[test]
    fn test_add_first() {
        let mut sources: PropertySources = [named("a"), named("b")].into_iter().collect();
        sources.add_first(named("head")).unwrap();
        assert_eq!(order(&sources), vec!["head", "a", "b"]);
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let mut sources: PropertySources = [named("a"), named("b")].into_iter().collect();
        assert!(matches!(
            sources.add_first(named("a")),
            Err(RefreshError::DuplicateSource { .. })
        ));
        assert!(matches!(
            sources.add_after("a", named("b")),
            Err(RefreshError::DuplicateSource { .. })
        ));
        assert_eq!(sources.len(), 2);
    }

    #[test]
    fn test_remove_keeps_order() {
        let mut sources: PropertySources =
            [named("a"), named("b"), named("c")].into_iter().collect();
        let removed = sources.remove("b").unwrap();
        assert_eq!(removed.name(), "b");
        assert_eq!(order(&sources), vec!["a", "c"]);
        assert!(sources.remove("b").is_none());
    }

    #[test]
    fn test_later_source_overrides_earlier() {
        let early = ConfigSource::new("early").with("port", 8080).with("host", "a");
        let late = ConfigSource::new("late").with("port", 9090);
        let sources: PropertySources = [early, late].into_iter().collect();

        assert_eq!(sources.get_value("port"), Some(&json!(9090)));
        assert_eq!(sources.get_value("host"), Some(&json!("a")));
        assert_eq!(sources.get_value("missing"), None);
    }

    #[test]
    fn test_effective_values_matches_lookup() {
        let sources: PropertySources = [
            ConfigSource::new("one").with("a", 1).with("b", 1),
            ConfigSource::new("two").with("b", 2),
        ]
        .into_iter()
        .collect();

        let flat = sources.effective_values();
        assert_eq!(flat.get("a"), Some(&json!(1)));
        assert_eq!(flat.get("b"), Some(&json!(2)));
        assert_eq!(flat.len(), 2);
    }
}
