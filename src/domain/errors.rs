// ============================================================
// Layer 3 — Domain Errors
// ============================================================
// Two families of failure exist in the engine:
//
//   RecordError  - something is wrong with ONE record. The run
//                  keeps going and the record is listed in the
//                  run summary.
//   ConfigError  - the policy itself is broken. Raised while
//                  compiling the policy, before any record is
//                  touched.
//
// Both are plain thiserror enums so the application layer can
// match on them, and anyhow can wrap them at the CLI boundary.

use thiserror::Error;

/// Per-record failure. Never aborts the whole run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordError {
    /// The block holds no recognized `Name: value` line at all.
    #[error("block #{position} has no recognized fields")]
    StructuralParse { position: usize },

    /// A classifier produced a value outside the attribute's domain.
    #[error("attribute '{attribute}' got '{value}', which is outside its domain")]
    DomainViolation { attribute: String, value: String },

    /// A classified attribute set is missing a declared attribute.
    #[error("attribute '{attribute}' is missing from the classified set")]
    MissingAttribute { attribute: String },

    /// The upserter could not find the anchor line.
    #[error("anchor field '{anchor}' not found")]
    AnchorNotFound { anchor: String },
}

impl RecordError {
    /// Short, stable label used in summaries and reports.
    pub fn kind(&self) -> &'static str {
        match self {
            RecordError::StructuralParse { .. } => "structural-parse",
            RecordError::DomainViolation { .. } => "domain-violation",
            RecordError::MissingAttribute { .. } => "missing-attribute",
            RecordError::AnchorNotFound { .. } => "anchor-not-found",
        }
    }
}

/// A malformed policy. Fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("delimiter must not be empty")]
    EmptyDelimiter,

    #[error("identifier pattern '{pattern}' is invalid: {source}")]
    InvalidIdPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("field '{field}' is declared more than once")]
    DuplicateField { field: String },

    #[error("title field '{field}' is not a recognized field")]
    UnknownTitleField { field: String },

    #[error("attribute '{attribute}' is declared more than once")]
    DuplicateAttribute { attribute: String },

    #[error("attribute '{attribute}' reads unknown field '{field}'")]
    UnknownSourceField { attribute: String, field: String },

    #[error("metadata anchor '{anchor}' is not a recognized field")]
    UnknownAnchor { anchor: String },

    #[error("metadata line '{key}' refers to unknown attribute '{attribute}'")]
    UnknownMetadataAttribute { key: String, attribute: String },

    #[error("metadata key '{key}' appears more than once")]
    DuplicateMetadataKey { key: String },

    #[error("rule '{rule}' selects no fields")]
    EmptySelector { rule: String },

    #[error("rule '{rule}' selects unknown field '{field}'")]
    UnknownField { rule: String, field: String },

    #[error("rule '{rule}' sets unknown attribute '{attribute}'")]
    UnknownAttribute { rule: String, attribute: String },

    #[error("rule '{rule}' sets '{attribute}' to '{value}', which is outside its domain")]
    InvalidAttributeValue {
        rule: String,
        attribute: String,
        value: String,
    },

    #[error("rule '{rule}' has an invalid pattern: {source}")]
    InvalidPattern {
        rule: String,
        #[source]
        source: regex::Error,
    },

    #[error("rule '{rule}' has an empty matcher")]
    EmptyMatcher { rule: String },

    #[error("rule id '{rule}' is used more than once")]
    DuplicateRuleId { rule: String },

    #[error(
        "attribute '{attribute}' is assigned by both family '{first}' and family '{second}'; \
         independent families cannot share an attribute"
    )]
    SharedAttribute {
        attribute: String,
        first: String,
        second: String,
    },
}
