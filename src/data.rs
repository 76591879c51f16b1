//! Caller-supplied data: the data dictionary and the optional field mapping.
//!
//! Both are backed by `BTreeMap` so iteration order, and therefore every
//! tie-break in the substitutor, is independent of how the JSON object was
//! ordered on the wire.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracing::debug;

/// A scalar data value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Bool(bool),
    Number(serde_json::Number),
    Text(String),
}

impl Scalar {
    /// Trimmed string form, or `None` when that form is empty.
    ///
    /// Empty values never replace a placeholder.
    pub fn substitution_text(&self) -> Option<String> {
        let s = self.to_string();
        let trimmed = s.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Bool(b) => write!(f, "{b}"),
            Scalar::Number(n) => write!(f, "{n}"),
            Scalar::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for Scalar {
    fn from(s: &str) -> Self {
        Scalar::Text(s.to_string())
    }
}

impl From<String> for Scalar {
    fn from(s: String) -> Self {
        Scalar::Text(s)
    }
}

impl From<bool> for Scalar {
    fn from(b: bool) -> Self {
        Scalar::Bool(b)
    }
}

impl From<i64> for Scalar {
    fn from(n: i64) -> Self {
        Scalar::Number(n.into())
    }
}

/// Business field name → value, supplied per request.
///
/// Deserialises from any JSON object; `null`, arrays and nested objects are
/// dropped because they have no sensible single-string rendering.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(from = "BTreeMap<String, serde_json::Value>")]
pub struct DataDictionary {
    entries: BTreeMap<String, Scalar>,
}

impl DataDictionary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Scalar>) {
        self.entries.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Scalar> {
        self.entries.get(key)
    }

    /// Trimmed, non-empty value for `key`.
    pub fn text(&self, key: &str) -> Option<String> {
        self.entries.get(key).and_then(Scalar::substitution_text)
    }

    /// Entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Scalar)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl From<BTreeMap<String, serde_json::Value>> for DataDictionary {
    fn from(map: BTreeMap<String, serde_json::Value>) -> Self {
        let mut entries = BTreeMap::new();
        for (key, value) in map {
            let scalar = match value {
                serde_json::Value::String(s) => Scalar::Text(s),
                serde_json::Value::Number(n) => Scalar::Number(n),
                serde_json::Value::Bool(b) => Scalar::Bool(b),
                other => {
                    debug!("Dropping non-scalar data value for '{}': {}", key, other);
                    continue;
                }
            };
            entries.insert(key, scalar);
        }
        Self { entries }
    }
}

impl<K: Into<String>, V: Into<Scalar>> FromIterator<(K, V)> for DataDictionary {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// Template placeholder key → data dictionary key.
///
/// Used when the artwork names a slot differently from the business field,
/// e.g. a layer called `headline` fed from the `title` field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldMapping {
    entries: BTreeMap<String, String>,
}

impl FieldMapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, placeholder_key: impl Into<String>, data_key: impl Into<String>) {
        self.entries.insert(placeholder_key.into(), data_key.into());
    }

    /// `(placeholder_key, data_key)` pairs in placeholder-key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for FieldMapping {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}
