// ============================================================
// Layer 3 — Rules as Data
// ============================================================
// Rules are declared in a policy file, not compiled into the
// binary, so different classification policies can be swapped
// without code changes. A rule is:
//
//   fields   which record fields the predicate reads
//   match    how those fields are tested (tagged by `kind`)
//   negate   invert the test (absent fields still never match)
//   action   `exclude`, or `set_attribute` with a value
//
// Example (YAML):
//
//   - id: not-a-bug
//     fields: [Type]
//     match: { kind: equals, value: Bug }
//     negate: true
//     action: { kind: exclude }

use serde::{Deserialize, Serialize};

/// How the selected field text is tested. All comparisons are
/// case-insensitive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Matcher {
    /// Whole (trimmed) value equals `value`.
    Equals { value: String },
    /// Whole (trimmed) value equals one of `values`.
    OneOf { values: Vec<String> },
    /// Value contains `value` as a substring.
    Contains { value: String },
    /// Regular expression search.
    Pattern { regex: String },
    /// Value splits on `[,/;\s]+` into tokens that all start with
    /// one of `prefixes`.
    AllTokensStartWith { prefixes: Vec<String> },
}

/// What a matching rule does.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RuleAction {
    Exclude,
    SetAttribute { attribute: String, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleSpec {
    pub id: String,

    pub fields: Vec<String>,

    #[serde(rename = "match")]
    pub matcher: Matcher,

    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub negate: bool,

    pub action: RuleAction,

    /// Exclusion reason. `{value}` is replaced by the matched text.
    /// Defaults to the rule id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl RuleSpec {
    pub fn exclude<I, S>(id: impl Into<String>, fields: I, matcher: Matcher) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            id:      id.into(),
            fields:  fields.into_iter().map(Into::into).collect(),
            matcher,
            negate:  false,
            action:  RuleAction::Exclude,
            reason:  None,
        }
    }

    pub fn set<I, S>(
        id:        impl Into<String>,
        fields:    I,
        matcher:   Matcher,
        attribute: impl Into<String>,
        value:     impl Into<String>,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            id:      id.into(),
            fields:  fields.into_iter().map(Into::into).collect(),
            matcher,
            negate:  false,
            action:  RuleAction::SetAttribute {
                attribute: attribute.into(),
                value:     value.into(),
            },
            reason:  None,
        }
    }

    pub fn negated(mut self) -> Self {
        self.negate = true;
        self
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}

/// An ordered list of rules evaluated as one independent pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleFamily {
    pub name: String,
    #[serde(default)]
    pub rules: Vec<RuleSpec>,
}

impl RuleFamily {
    pub fn new(name: impl Into<String>, rules: Vec<RuleSpec>) -> Self {
        Self { name: name.into(), rules }
    }
}

// ─── Evaluation results ───────────────────────────────────────────────────────

/// Why a record was dropped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Exclusion {
    pub family: String,
    pub rule_id: String,
    pub reason: String,
}

/// One attribute value produced by a rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Derivation {
    pub attribute: String,
    pub value: String,
    pub rule_id: String,
}

/// Outcome of running rules over one record's fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Excluded(Exclusion),
    Classified(Vec<Derivation>),
}

impl Verdict {
    pub fn is_excluded(&self) -> bool {
        matches!(self, Verdict::Excluded(_))
    }

    pub fn derivations(&self) -> &[Derivation] {
        match self {
            Verdict::Excluded(_) => &[],
            Verdict::Classified(d) => d,
        }
    }
}
