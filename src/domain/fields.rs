// ============================================================
// Layer 3 — Fields
// ============================================================
// A field is a `Name: value` line inside a record whose name
// belongs to a fixed, case-sensitive set (the FieldSchema).
//
//   Title: [JDK-8319973] AArch64: Save and restore FPCR
//   ^^^^^  ^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^
//   name   value (the `AArch64:` inside is NOT a field)
//
// Matching is case-sensitive: "type: something" in prose is
// not the `Type` field.

use indexmap::IndexMap;
use serde::Serialize;

use crate::domain::traits::FieldSource;

/// Field names recognized when no policy overrides them.
pub const DEFAULT_FIELD_NAMES: &[&str] =
    &["Title", "Priority", "Type", "Component", "Description", "OS"];

// ─── FieldSchema ──────────────────────────────────────────────────────────────
/// The closed, ordered set of recognized field names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSchema {
    names: Vec<String>,
}

impl FieldSchema {
    /// Build a schema, dropping repeated names but keeping first-seen order.
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut schema = Self { names: Vec::new() };
        for name in names {
            schema.insert(name);
        }
        schema
    }

    /// Add a name if it is not already recognized. Returns true when added.
    pub fn insert(&mut self, name: impl Into<String>) -> bool {
        let name = name.into();
        if self.contains(&name) {
            return false;
        }
        self.names.push(name);
        true
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// If `line` opens a recognized field, return its name and the
    /// value on that line.
    ///
    /// The value is everything after the first `:`, with one leading
    /// space removed and trailing whitespace (including the line
    /// terminator) trimmed.
    pub fn match_line<'a>(&'a self, line: &'a str) -> Option<(&'a str, &'a str)> {
        let (name, value) = split_field_line(line)?;
        let name = self.names.iter().find(|n| n.as_str() == name)?;
        Some((name.as_str(), value))
    }
}

/// Split `Name: value` at the first colon, whatever the name.
pub fn split_field_line(line: &str) -> Option<(&str, &str)> {
    let (name, rest) = line.split_once(':')?;
    Some((name, rest.strip_prefix(' ').unwrap_or(rest).trim_end()))
}

/// The text before the first colon of a line, if it has one.
pub fn line_key(line: &str) -> Option<&str> {
    line.split_once(':').map(|(key, _)| key)
}

impl Default for FieldSchema {
    fn default() -> Self {
        Self::new(DEFAULT_FIELD_NAMES.iter().copied())
    }
}

// ─── FieldMap ─────────────────────────────────────────────────────────────────
/// Field name -> value, in order of first appearance. Keys are unique.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FieldMap {
    entries: IndexMap<String, String>,
}

impl FieldMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a value unless the name is already present.
    /// The first occurrence of a field wins; returns false on a repeat.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) -> bool {
        let name = name.into();
        if self.entries.contains_key(&name) {
            return false;
        }
        self.entries.insert(name, value.into());
        true
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries.get(name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl FieldSource for FieldMap {
    fn field(&self, name: &str) -> Option<&str> {
        self.get(name)
    }
}

impl<K, V> FromIterator<(K, V)> for FieldMap
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = FieldMap::new();
        for (k, v) in iter {
            map.insert(k, v);
        }
        map
    }
}
