//! The stored, multi-valued record kept in the search index.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::EvalResult;
use crate::value::Value;

use super::{Record, RecordMut};

/// A multi-valued key/value record.
///
/// Single-valued observables read their first-added value; later values of
/// the same observable are kept as alternates (search aliases, for example).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Classifier {
    #[serde(default)]
    identifier: Option<String>,
    #[serde(rename = "type")]
    type_tag: String,
    /// Nested-set range `(left, right)` in the containment tree.
    #[serde(default)]
    index: Option<(i64, i64)>,
    /// Search aliases.
    #[serde(default)]
    names: Vec<String>,
    /// Packed probability parameters.
    #[serde(default)]
    parameters: Option<Vec<u8>>,
    #[serde(default)]
    values: BTreeMap<String, Vec<Value>>,
}

impl Classifier {
    pub fn new(type_tag: impl Into<String>) -> Self {
        Self {
            type_tag: type_tag.into(),
            ..Default::default()
        }
    }

    pub fn with_identifier(mut self, identifier: impl Into<String>) -> Self {
        self.identifier = Some(identifier.into());
        self
    }

    pub fn identifier(&self) -> Option<&str> {
        self.identifier.as_deref()
    }

    /// Assign an identifier if there is none yet, and return it.
    ///
    /// Idempotent: later calls return the identifier assigned first.
    pub fn identify(&mut self) -> &str {
        self.identifier
            .get_or_insert_with(|| format!("urn:uuid:{}", uuid::Uuid::new_v4()))
    }

    pub fn type_tag(&self) -> &str {
        &self.type_tag
    }

    /// Add a value; adding a value already present is a no-op.
    pub fn add(&mut self, observable: &str, value: Value) {
        let values = self.values.entry(observable.to_string()).or_default();
        if !values.contains(&value) {
            values.push(value);
        }
    }

    pub fn add_name(&mut self, name: impl Into<String>) {
        let name = name.into();
        if !self.names.contains(&name) {
            self.names.push(name);
        }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn set_index(&mut self, left: i64, right: i64) {
        self.index = Some((left, right));
    }

    pub fn index(&self) -> Option<(i64, i64)> {
        self.index
    }

    /// Whether `other` lies strictly inside this classifier's subtree.
    pub fn contains(&self, other: &Classifier) -> bool {
        match (self.index, other.index) {
            (Some((left, right)), Some((l, r))) => left < l && r <= right,
            _ => false,
        }
    }

    pub fn parameters(&self) -> Option<&[u8]> {
        self.parameters.as_deref()
    }

    pub fn set_parameters(&mut self, parameters: Vec<u8>) {
        self.parameters = Some(parameters);
    }

    /// Observable ids that carry at least one value.
    pub fn observables(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }
}

impl Record for Classifier {
    fn values_of(&self, observable: &str) -> Vec<Value> {
        self.values.get(observable).cloned().unwrap_or_default()
    }

    fn has(&self, observable: &str) -> bool {
        self.values.get(observable).is_some_and(|v| !v.is_empty())
    }
}

impl RecordMut for Classifier {
    fn set_values(&mut self, observable: &str, values: Vec<Value>) -> EvalResult<()> {
        if values.is_empty() {
            self.values.remove(observable);
        } else {
            self.values.insert(observable.to_string(), values);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identify_is_idempotent() {
        let mut c = Classifier::new("Taxon");
        let first = c.identify().to_string();
        let second = c.identify().to_string();
        assert_eq!(first, second);
        assert_eq!(c.identifier(), Some(first.as_str()));
    }

    #[test]
    fn explicit_identifier_is_kept() {
        let mut c = Classifier::new("Taxon").with_identifier("t1");
        assert_eq!(c.identify(), "t1");
    }

    #[test]
    fn primary_value_is_first_added() {
        let mut c = Classifier::new("Taxon");
        c.add("scientificName", Value::from("Acacia dealbata"));
        c.add("scientificName", Value::from("Acacia decurrens var. dealbata"));
        c.add("scientificName", Value::from("Acacia dealbata"));
        assert_eq!(c.text_of("scientificName").as_deref(), Some("Acacia dealbata"));
        assert_eq!(c.values_of("scientificName").len(), 2);
    }

    #[test]
    fn nested_set_containment() {
        let mut genus = Classifier::new("Taxon");
        genus.set_index(2, 9);
        let mut species = Classifier::new("Taxon");
        species.set_index(3, 4);
        assert!(genus.contains(&species));
        assert!(!species.contains(&genus));
        assert!(!genus.contains(&genus));
    }

    #[test]
    fn clearing_removes_observable() {
        let mut c = Classifier::new("Taxon");
        c.add("genus", Value::from("Acacia"));
        c.clear("genus").unwrap();
        assert!(!c.has("genus"));
        assert_eq!(c.observables().count(), 0);
    }
}
