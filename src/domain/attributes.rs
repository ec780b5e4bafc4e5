// ============================================================
// Layer 3 — Canonical Attributes
// ============================================================
// Every surviving record is described by the same fixed set of
// normalized dimensions (release, feature area, compatibility
// type, impact scope, status, ...). Each dimension is declared
// up front with:
//
//   domain      closed list of allowed values (omit for open)
//   aliases     raw spelling -> canonical spelling
//   from_field  record field copied through when no rule fires
//   context     caller-supplied value used when the record
//               itself carries no signal (e.g. release version)
//
// A value that is not in the domain is a DomainViolation. The
// literal `unknown` is always allowed.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::domain::errors::RecordError;
use crate::domain::fold_case;

/// Fallback value for any attribute nothing could derive.
pub const UNKNOWN: &str = "unknown";

// ─── AttributeSpec ────────────────────────────────────────────────────────────
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AttributeSpec {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub aliases: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_field: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

impl AttributeSpec {
    /// An open attribute with no field or context source.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name:       name.into(),
            domain:     None,
            aliases:    BTreeMap::new(),
            from_field: None,
            context:    None,
        }
    }

    pub fn with_domain<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.domain = Some(values.into_iter().map(Into::into).collect());
        self
    }

    pub fn from_field(mut self, field: impl Into<String>) -> Self {
        self.from_field = Some(field.into());
        self
    }

    pub fn with_context(mut self, key: impl Into<String>) -> Self {
        self.context = Some(key.into());
        self
    }

    pub fn with_alias(mut self, raw: impl Into<String>, canonical: impl Into<String>) -> Self {
        self.aliases.insert(raw.into(), canonical.into());
        self
    }

    /// Map a raw value onto this attribute's canonical spelling.
    ///
    /// Steps: trim, collapse to one line, apply aliases, then match
    /// the domain case-insensitively and adopt the domain spelling.
    /// Values outside a closed domain are reported, never coerced.
    pub fn normalize(&self, raw: &str) -> Result<String, RecordError> {
        let value = raw.split_whitespace().collect::<Vec<_>>().join(" ");
        if value.is_empty() || fold_case(&value) == UNKNOWN {
            return Ok(UNKNOWN.to_string());
        }

        let folded = fold_case(&value);
        let value = self
            .aliases
            .iter()
            .find(|(from, _)| fold_case(from) == folded)
            .map(|(_, to)| to.clone())
            .unwrap_or(value);

        let Some(domain) = &self.domain else {
            return Ok(value);
        };
        let folded = fold_case(&value);
        domain
            .iter()
            .find(|member| fold_case(member) == folded)
            .cloned()
            .ok_or_else(|| RecordError::DomainViolation {
                attribute: self.name.clone(),
                value,
            })
    }

    /// True when `value` is `unknown` or a member of the domain.
    pub fn admits(&self, value: &str) -> bool {
        if value == UNKNOWN {
            return true;
        }
        match &self.domain {
            Some(domain) => domain.iter().any(|m| m == value),
            None => !value.trim().is_empty(),
        }
    }
}

// ─── AttributeSchema ──────────────────────────────────────────────────────────
/// Declared attributes, in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttributeSchema {
    attributes: Vec<AttributeSpec>,
}

impl AttributeSchema {
    pub fn new(attributes: Vec<AttributeSpec>) -> Self {
        Self { attributes }
    }

    pub fn get(&self, name: &str) -> Option<&AttributeSpec> {
        self.attributes.iter().find(|a| a.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &AttributeSpec> {
        self.attributes.iter()
    }

    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }
}

// ─── CanonicalAttributeSet ────────────────────────────────────────────────────
/// The classified attributes of one record, in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CanonicalAttributeSet {
    values: IndexMap<String, String>,
}

impl CanonicalAttributeSet {
    pub(crate) fn from_values(values: IndexMap<String, String>) -> Self {
        Self { values }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Validation pass: every declared attribute is present and every
    /// value is `unknown` or a member of its domain.
    pub fn validate(&self, schema: &AttributeSchema) -> Result<(), RecordError> {
        for spec in schema.iter() {
            let value = self.get(&spec.name).ok_or_else(|| RecordError::MissingAttribute {
                attribute: spec.name.clone(),
            })?;
            if !spec.admits(value) {
                return Err(RecordError::DomainViolation {
                    attribute: spec.name.clone(),
                    value:     value.to_string(),
                });
            }
        }
        Ok(())
    }
}

// ─── ClassificationContext ────────────────────────────────────────────────────
/// Values the caller knows about the whole corpus, such as the
/// release declared by the source document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassificationContext {
    values: BTreeMap<String, String>,
}

impl ClassificationContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }
}
