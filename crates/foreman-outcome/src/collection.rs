//! Keyed error collection.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashMap;
use std::fmt;

use crate::record::{ErrorCategory, ErrorRecord};

/// A set of [`ErrorRecord`]s keyed by [`ErrorRecord::key`].
///
/// Iteration follows first-insertion order. Re-adding a key replaces the
/// record in its original position.
#[derive(Clone, Default, PartialEq)]
pub struct ErrorCollection {
    records: Vec<ErrorRecord>,
    index: HashMap<String, usize>,
}

impl ErrorCollection {
    /// Creates an empty collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a record, returning the record it replaced, if any.
    pub fn add(&mut self, record: ErrorRecord) -> Option<ErrorRecord> {
        let key = record.key();
        match self.index.get(&key) {
            Some(&position) => Some(std::mem::replace(&mut self.records[position], record)),
            None => {
                self.index.insert(key, self.records.len());
                self.records.push(record);
                None
            }
        }
    }

    /// Adds a record and returns a reference to it as stored.
    pub fn upsert(&mut self, record: ErrorRecord) -> &mut ErrorRecord {
        let key = record.key();
        let position = match self.index.get(&key) {
            Some(&position) => {
                self.records[position] = record;
                position
            }
            None => {
                let position = self.records.len();
                self.index.insert(key, position);
                self.records.push(record);
                position
            }
        };
        &mut self.records[position]
    }

    /// Adds every record from an iterator.
    pub fn extend<I>(&mut self, records: I)
    where
        I: IntoIterator<Item = ErrorRecord>,
    {
        for record in records {
            self.add(record);
        }
    }

    /// Looks up a record by key.
    pub fn get(&self, key: &str) -> Option<&ErrorRecord> {
        self.index.get(key).map(|&position| &self.records[position])
    }

    /// Looks up a record by key for in-place modification.
    ///
    /// The record's category, path and symbol must not be changed through
    /// this reference; they make up its key.
    pub fn get_mut(&mut self, key: &str) -> Option<&mut ErrorRecord> {
        match self.index.get(key) {
            Some(&position) => self.records.get_mut(position),
            None => None,
        }
    }

    /// Returns true if a record with this key exists.
    pub fn contains_key(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    /// Returns true if any record has this symbol.
    pub fn has_symbol(&self, symbol: &str) -> bool {
        self.records.iter().any(|r| r.symbol == symbol)
    }

    /// Returns all records with this symbol.
    pub fn with_symbol<'a>(&'a self, symbol: &'a str) -> impl Iterator<Item = &'a ErrorRecord> {
        self.records.iter().filter(move |r| r.symbol == symbol)
    }

    /// Returns all records of a category.
    pub fn by_category(&self, category: ErrorCategory) -> impl Iterator<Item = &ErrorRecord> {
        self.records.iter().filter(move |r| r.category == category)
    }

    /// Returns true if any record of this category exists.
    pub fn has_category(&self, category: ErrorCategory) -> bool {
        self.records.iter().any(|r| r.category == category)
    }

    /// Returns true if any record is fatal.
    pub fn has_fatal(&self) -> bool {
        self.records.iter().any(|r| r.is_fatal)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ErrorRecord> {
        self.records.iter()
    }

    /// Returns the keys in insertion order.
    pub fn keys(&self) -> Vec<String> {
        self.records.iter().map(ErrorRecord::key).collect()
    }

    /// Returns the messages in insertion order.
    pub fn messages(&self) -> Vec<&str> {
        self.records.iter().map(|r| r.message.as_str()).collect()
    }

    /// Consumes the collection, returning the records in insertion order.
    pub fn into_vec(self) -> Vec<ErrorRecord> {
        self.records
    }
}

impl fmt::Debug for ErrorCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.records.iter()).finish()
    }
}

impl fmt::Display for ErrorCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, record) in self.records.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{}", record)?;
        }
        Ok(())
    }
}

impl std::error::Error for ErrorCollection {}

impl FromIterator<ErrorRecord> for ErrorCollection {
    fn from_iter<I: IntoIterator<Item = ErrorRecord>>(iter: I) -> Self {
        let mut collection = ErrorCollection::new();
        collection.extend(iter);
        collection
    }
}

impl IntoIterator for ErrorCollection {
    type Item = ErrorRecord;
    type IntoIter = std::vec::IntoIter<ErrorRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.into_iter()
    }
}

impl<'a> IntoIterator for &'a ErrorCollection {
    type Item = &'a ErrorRecord;
    type IntoIter = std::slice::Iter<'a, ErrorRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

impl Serialize for ErrorCollection {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.records.iter())
    }
}

impl<'de> Deserialize<'de> for ErrorCollection {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let records = Vec::<ErrorRecord>::deserialize(deserializer)?;
        Ok(records.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_key_overwrites() {
        let mut errors = ErrorCollection::new();
        assert!(errors.add(ErrorRecord::runtime("warn", "first")).is_none());
        let replaced = errors.add(ErrorRecord::runtime("warn", "second"));

        assert_eq!(replaced.map(|r| r.message), Some("first".to_string()));
        assert_eq!(errors.len(), 1);
        assert_eq!(errors.messages(), vec!["second"]);
    }

    #[test]
    fn test_overwrite_keeps_position() {
        let mut errors = ErrorCollection::new();
        errors.add(ErrorRecord::runtime("a", "1"));
        errors.add(ErrorRecord::runtime("b", "2"));
        errors.add(ErrorRecord::runtime("a", "3"));

        assert_eq!(errors.messages(), vec!["3", "2"]);
    }

    #[test]
    fn test_upsert_returns_stored_record() {
        let mut errors = ErrorCollection::new();
        errors.add(ErrorRecord::runtime("warn", "first"));
        errors
            .upsert(ErrorRecord::runtime("warn", "second"))
            .insert_context("attempt", 2);

        assert_eq!(errors.len(), 1);
        let record = errors.get("runtime..warn").unwrap();
        assert_eq!(record.message, "second");
        assert_eq!(record.context["attempt"], 2);
    }

    #[test]
    fn test_different_paths_are_distinct() {
        let mut errors = ErrorCollection::new();
        errors.add(ErrorRecord::data(vec!["a".into()], "cannot_cast", "x"));
        errors.add(ErrorRecord::data(vec!["b".into()], "cannot_cast", "x"));
        errors.add(ErrorRecord::runtime("cannot_cast", "x"));

        assert_eq!(errors.len(), 3);
        assert_eq!(errors.with_symbol("cannot_cast").count(), 3);
        assert_eq!(errors.by_category(ErrorCategory::Data).count(), 2);
    }

    #[test]
    fn test_lookup_by_key() {
        let mut errors = ErrorCollection::new();
        errors.add(ErrorRecord::data(vec!["age".into()], "invalid_age", "x"));

        assert!(errors.contains_key("data.age.invalid_age"));
        assert!(errors.get("data.age.invalid_age").is_some());
        assert!(errors.get("runtime..invalid_age").is_none());

        if let Some(record) = errors.get_mut("data.age.invalid_age") {
            record.insert_context("value", -1);
        }
        assert_eq!(errors.get("data.age.invalid_age").unwrap().context["value"], -1);
    }

    #[test]
    fn test_serializes_as_array() {
        let errors: ErrorCollection = vec![
            ErrorRecord::runtime("a", "1"),
            ErrorRecord::runtime("b", "2"),
        ]
        .into_iter()
        .collect();

        let value = serde_json::to_value(&errors).unwrap();
        assert!(value.is_array());
        assert_eq!(value.as_array().unwrap().len(), 2);

        let back: ErrorCollection = serde_json::from_value(value).unwrap();
        assert_eq!(back, errors);
    }

    #[test]
    fn test_has_fatal() {
        let mut errors = ErrorCollection::new();
        errors.add(ErrorRecord::runtime("warn", "careful"));
        assert!(!errors.has_fatal());
        errors.add(ErrorRecord::runtime("stop", "halt").fatal());
        assert!(errors.has_fatal());
    }

    #[test]
    fn test_display_joins_records() {
        let errors: ErrorCollection = vec![
            ErrorRecord::runtime("a", "first"),
            ErrorRecord::runtime("b", "second"),
        ]
        .into_iter()
        .collect();
        assert_eq!(
            errors.to_string(),
            "[runtime] a: first; [runtime] b: second"
        );
    }
}
