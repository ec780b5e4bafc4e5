// ============================================================
// Layer 3 — Policy Description
// ============================================================
// A policy bundles everything one classification run needs:
// the record layout (delimiter, recognized fields, ID pattern),
// the attribute declarations, the metadata block template and
// the ordered rule families.
//
// This is the serialisable form. engine::policy::Policy is the
// validated, compiled form the pipeline actually runs.

use serde::{Deserialize, Serialize};

use crate::domain::attributes::AttributeSpec;
use crate::domain::fields::DEFAULT_FIELD_NAMES;
use crate::domain::rules::RuleFamily;

pub const DEFAULT_DELIMITER: &str = "-----";
pub const DEFAULT_ID_PATTERN: &str = r"JDK-\d+";
pub const DEFAULT_TITLE_FIELD: &str = "Title";
pub const DEFAULT_ANNOTATION_KEY: &str = "Excluded";

/// One `Key: value` line of the metadata block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MetadataLineSpec {
    pub key: String,
    pub attribute: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MetadataSpec {
    /// Field whose line anchors the block (the title).
    #[serde(default = "default_title_field")]
    pub anchor: String,

    /// Lines in the exact order they are written.
    pub lines: Vec<MetadataLineSpec>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PolicySpec {
    pub name: String,

    #[serde(default = "default_delimiter")]
    pub delimiter: String,

    #[serde(default = "default_id_pattern")]
    pub id_pattern: String,

    #[serde(default = "default_title_field")]
    pub title_field: String,

    #[serde(default = "default_fields")]
    pub fields: Vec<String>,

    /// Key of the line written into excluded records on rewrite.
    #[serde(default = "default_annotation_key")]
    pub annotation_key: String,

    #[serde(default)]
    pub attributes: Vec<AttributeSpec>,

    pub metadata: MetadataSpec,

    #[serde(default)]
    pub families: Vec<RuleFamily>,
}

fn default_delimiter() -> String {
    DEFAULT_DELIMITER.to_string()
}

fn default_id_pattern() -> String {
    DEFAULT_ID_PATTERN.to_string()
}

fn default_title_field() -> String {
    DEFAULT_TITLE_FIELD.to_string()
}

fn default_fields() -> Vec<String> {
    DEFAULT_FIELD_NAMES.iter().map(|s| s.to_string()).collect()
}

fn default_annotation_key() -> String {
    DEFAULT_ANNOTATION_KEY.to_string()
}

impl PolicySpec {
    /// A policy with default layout and no attributes, metadata or rules.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name:           name.into(),
            delimiter:      default_delimiter(),
            id_pattern:     default_id_pattern(),
            title_field:    default_title_field(),
            fields:         default_fields(),
            annotation_key: default_annotation_key(),
            attributes:     Vec::new(),
            metadata:       MetadataSpec { anchor: default_title_field(), lines: Vec::new() },
            families:       Vec::new(),
        }
    }

    pub fn with_attribute(mut self, attribute: AttributeSpec) -> Self {
        self.attributes.push(attribute);
        self
    }

    pub fn with_metadata_line(mut self, key: impl Into<String>, attribute: impl Into<String>) -> Self {
        self.metadata.lines.push(MetadataLineSpec { key: key.into(), attribute: attribute.into() });
        self
    }

    pub fn with_family(mut self, family: RuleFamily) -> Self {
        self.families.push(family);
        self
    }

    pub fn rule_count(&self) -> usize {
        self.families.iter().map(|f| f.rules.len()).sum()
    }
}
