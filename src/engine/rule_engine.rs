// ============================================================
// Layer 5 — Rule Engine
// ============================================================
// Evaluates one family of rules against a record's fields.
//
//   RuleFamily (data, from the policy file)
//       │  compile: check fields/attributes, build regexes,
//       │           fold literals once
//       ▼
//   RuleSet (immutable, Send + Sync)
//       │  evaluate(fields)
//       ▼
//   Verdict::Excluded(..) | Verdict::Classified(derivations)
//
// Evaluation order is the declaration order and nothing else:
//   - the first matching `exclude` rule ends the pass
//   - the first rule to set an attribute keeps it
//
// Predicates see the newline-joined values of the selected
// fields. A field that is absent (or holds the literal
// `unknown`) contributes nothing; if no selected field has a
// value the rule does not fire, negated or not.
//
// Reference: Rust Book §6 (Enums and Pattern Matching)
//            Rust Book §13 (Iterators and Closures)

use regex::{Regex, RegexBuilder};
use std::collections::HashSet;

use crate::domain::attributes::{AttributeSchema, UNKNOWN};
use crate::domain::errors::ConfigError;
use crate::domain::fields::FieldSchema;
use crate::domain::fold_case;
use crate::domain::rules::{
    Derivation, Exclusion, Matcher, RuleAction, RuleFamily, RuleSpec, Verdict,
};
use crate::domain::traits::FieldSource;

/// Placeholder replaced by the matched field text in a reason template.
pub const VALUE_PLACEHOLDER: &str = "{value}";

// ─── Compiled matcher ─────────────────────────────────────────────────────────
#[derive(Debug, Clone)]
enum CompiledMatcher {
    Equals(String),
    OneOf(Vec<String>),
    Contains(String),
    Pattern(Regex),
    AllTokensStartWith(Vec<String>),
}

impl CompiledMatcher {
    fn compile(rule: &str, matcher: &Matcher) -> Result<Self, ConfigError> {
        let empty = || ConfigError::EmptyMatcher { rule: rule.to_string() };
        let fold_all = |items: &[String]| -> Result<Vec<String>, ConfigError> {
            let folded: Vec<String> = items
                .iter()
                .map(|s| fold_case(s.trim()))
                .filter(|s| !s.is_empty())
                .collect();
            if folded.is_empty() { Err(empty()) } else { Ok(folded) }
        };

        Ok(match matcher {
            Matcher::Equals { value } => {
                let value = fold_case(value.trim());
                if value.is_empty() {
                    return Err(empty());
                }
                CompiledMatcher::Equals(value)
            }
            Matcher::OneOf { values } => CompiledMatcher::OneOf(fold_all(values)?),
            Matcher::Contains { value } => {
                let value = fold_case(value);
                if value.is_empty() {
                    return Err(empty());
                }
                CompiledMatcher::Contains(value)
            }
            Matcher::Pattern { regex } => {
                if regex.is_empty() {
                    return Err(empty());
                }
                let re = RegexBuilder::new(regex)
                    .case_insensitive(true)
                    .build()
                    .map_err(|source| ConfigError::InvalidPattern {
                        rule: rule.to_string(),
                        source,
                    })?;
                CompiledMatcher::Pattern(re)
            }
            Matcher::AllTokensStartWith { prefixes } => {
                CompiledMatcher::AllTokensStartWith(fold_all(prefixes)?)
            }
        })
    }

    fn matches(&self, text: &str) -> bool {
        match self {
            CompiledMatcher::Equals(value) => fold_case(text.trim()) == *value,
            CompiledMatcher::OneOf(values) => {
                let text = fold_case(text.trim());
                values.iter().any(|v| *v == text)
            }
            CompiledMatcher::Contains(value) => fold_case(text).contains(value.as_str()),
            CompiledMatcher::Pattern(re) => re.is_match(text),
            CompiledMatcher::AllTokensStartWith(prefixes) => {
                let tokens = tokenize(text);
                !tokens.is_empty()
                    && tokens
                        .iter()
                        .all(|t| prefixes.iter().any(|p| t.starts_with(p.as_str())))
            }
        }
    }
}

/// Folded tokens split on commas, slashes, semicolons and whitespace.
fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| matches!(c, ',' | '/' | ';') || c.is_whitespace())
        .filter(|t| !t.is_empty())
        .map(fold_case)
        .collect()
}

// ─── Compiled rule ────────────────────────────────────────────────────────────
#[derive(Debug, Clone)]
struct CompiledRule {
    id:      String,
    fields:  Vec<String>,
    matcher: CompiledMatcher,
    negate:  bool,
    action:  RuleAction,
    reason:  Option<String>,
}

impl CompiledRule {
    fn compile(
        spec:       &RuleSpec,
        fields:     &FieldSchema,
        attributes: &AttributeSchema,
    ) -> Result<Self, ConfigError> {
        if spec.fields.is_empty() {
            return Err(ConfigError::EmptySelector { rule: spec.id.clone() });
        }
        if let Some(unknown) = spec.fields.iter().find(|f| !fields.contains(f)) {
            return Err(ConfigError::UnknownField {
                rule:  spec.id.clone(),
                field: unknown.clone(),
            });
        }

        let action = match &spec.action {
            RuleAction::Exclude => RuleAction::Exclude,
            RuleAction::SetAttribute { attribute, value } => {
                let attr = attributes.get(attribute).ok_or_else(|| ConfigError::UnknownAttribute {
                    rule:      spec.id.clone(),
                    attribute: attribute.clone(),
                })?;
                // stored in the domain's spelling so derivations never need re-checking
                let value = attr
                    .normalize(value)
                    .ok()
                    .filter(|v| v != UNKNOWN)
                    .ok_or_else(|| ConfigError::InvalidAttributeValue {
                        rule:      spec.id.clone(),
                        attribute: attribute.clone(),
                        value:     value.clone(),
                    })?;
                RuleAction::SetAttribute { attribute: attribute.clone(), value }
            }
        };

        Ok(Self {
            id:      spec.id.clone(),
            fields:  spec.fields.clone(),
            matcher: CompiledMatcher::compile(&spec.id, &spec.matcher)?,
            negate:  spec.negate,
            action,
            reason:  spec.reason.clone(),
        })
    }

    /// The selected text when the rule fires, None otherwise.
    fn fire<S: FieldSource + ?Sized>(&self, source: &S) -> Option<String> {
        let values: Vec<&str> = self
            .fields
            .iter()
            .filter_map(|f| source.non_empty(f))
            .filter(|v| fold_case(v) != UNKNOWN)
            .collect();
        if values.is_empty() {
            return None;
        }
        let text = values.join("\n");
        (self.matcher.matches(&text) != self.negate).then_some(text)
    }

    fn reason_for(&self, matched: &str) -> String {
        match &self.reason {
            Some(template) => {
                let value = matched.split_whitespace().collect::<Vec<_>>().join(" ");
                template.replace(VALUE_PLACEHOLDER, &value)
            }
            None => self.id.clone(),
        }
    }
}

// ─── RuleSet ──────────────────────────────────────────────────────────────────
/// One compiled rule family.
#[derive(Debug, Clone)]
pub struct RuleSet {
    family: String,
    rules:  Vec<CompiledRule>,
}

impl RuleSet {
    /// Validate a family against the recognized fields and declared
    /// attributes, compiling its matchers.
    pub fn compile(
        family:     &RuleFamily,
        fields:     &FieldSchema,
        attributes: &AttributeSchema,
    ) -> Result<Self, ConfigError> {
        let mut seen = HashSet::new();
        let mut rules = Vec::with_capacity(family.rules.len());
        for spec in &family.rules {
            if !seen.insert(spec.id.as_str()) {
                return Err(ConfigError::DuplicateRuleId { rule: spec.id.clone() });
            }
            rules.push(CompiledRule::compile(spec, fields, attributes)?);
        }
        Ok(Self { family: family.name.clone(), rules })
    }

    pub fn family(&self) -> &str {
        &self.family
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn rule_ids(&self) -> impl Iterator<Item = &str> {
        self.rules.iter().map(|r| r.id.as_str())
    }

    /// Attributes this family can assign, in first-rule order.
    pub fn assigned_attributes(&self) -> Vec<&str> {
        let mut out: Vec<&str> = Vec::new();
        for rule in &self.rules {
            if let RuleAction::SetAttribute { attribute, .. } = &rule.action {
                if !out.contains(&attribute.as_str()) {
                    out.push(attribute);
                }
            }
        }
        out
    }

    pub fn evaluate<S: FieldSource + ?Sized>(&self, source: &S) -> Verdict {
        self.evaluate_with(source, true)
    }

    /// Evaluate the family. With `apply_exclusions` false the
    /// `exclude` rules are skipped and the pass always classifies.
    pub fn evaluate_with<S: FieldSource + ?Sized>(&self, source: &S, apply_exclusions: bool) -> Verdict {
        let mut derivations: Vec<Derivation> = Vec::new();

        for rule in &self.rules {
            match &rule.action {
                RuleAction::Exclude => {
                    if !apply_exclusions {
                        continue;
                    }
                    if let Some(matched) = rule.fire(source) {
                        tracing::debug!("[{}] rule '{}' excludes the record", self.family, rule.id);
                        return Verdict::Excluded(Exclusion {
                            family:  self.family.clone(),
                            rule_id: rule.id.clone(),
                            reason:  rule.reason_for(&matched),
                        });
                    }
                }
                RuleAction::SetAttribute { attribute, value } => {
                    if derivations.iter().any(|d| d.attribute == *attribute) {
                        continue;
                    }
                    if rule.fire(source).is_some() {
                        tracing::debug!(
                            "[{}] rule '{}' sets {} = {}",
                            self.family, rule.id, attribute, value
                        );
                        derivations.push(Derivation {
                            attribute: attribute.clone(),
                            value:     value.clone(),
                            rule_id:   rule.id.clone(),
                        });
                    }
                }
            }
        }

        Verdict::Classified(derivations)
    }
}

/// Evaluate a single rule set.
pub fn evaluate<S: FieldSource + ?Sized>(source: &S, rules: &RuleSet) -> Verdict {
    rules.evaluate(source)
}

/// Run independent families in order. The first exclusion ends
/// evaluation; otherwise the derivations of all passes are merged.
pub fn evaluate_families<S: FieldSource + ?Sized>(
    source:           &S,
    families:         &[RuleSet],
    apply_exclusions: bool,
) -> Verdict {
    let mut merged = Vec::new();
    for family in families {
        match family.evaluate_with(source, apply_exclusions) {
            Verdict::Excluded(exclusion) => return Verdict::Excluded(exclusion),
            Verdict::Classified(derivations) => merged.extend(derivations),
        }
    }
    Verdict::Classified(merged)
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::attributes::AttributeSpec;
    use crate::domain::fields::FieldMap;

    fn attributes() -> AttributeSchema {
        AttributeSchema::new(vec![
            AttributeSpec::new("status").with_domain(["regression", "backport", "fix"]),
            AttributeSpec::new("impact_scope").with_domain(["windows", "all_platforms", "platform_specific"]),
        ])
    }

    fn compile(rules: Vec<RuleSpec>) -> RuleSet {
        RuleSet::compile(&RuleFamily::new("test", rules), &FieldSchema::default(), &attributes()).unwrap()
    }

    fn fields(pairs: &[(&str, &str)]) -> FieldMap {
        pairs.iter().copied().collect()
    }

    fn equals(v: &str) -> Matcher {
        Matcher::Equals { value: v.into() }
    }

    fn pattern(re: &str) -> Matcher {
        Matcher::Pattern { regex: re.into() }
    }

    #[test]
    fn test_negated_equals_excludes_non_bugs() {
        let rules = compile(vec![RuleSpec::exclude("not-bug", ["Type"], equals("Bug")).negated()]);
        assert!(evaluate(&fields(&[("Type", "Enhancement")]), &rules).is_excluded());
        assert!(!rules.evaluate(&fields(&[("Type", "bug ")])).is_excluded());
    }

    #[test]
    fn test_absent_field_never_matches_even_when_negated() {
        let rules = compile(vec![RuleSpec::exclude("not-bug", ["Type"], equals("Bug")).negated()]);
        assert_eq!(rules.evaluate(&fields(&[("Title", "T")])), Verdict::Classified(vec![]));
        // the literal `unknown` is treated as absent
        assert!(!rules.evaluate(&fields(&[("Type", "unknown")])).is_excluded());
    }

    #[test]
    fn test_pattern_is_case_insensitive_over_joined_fields() {
        let rules = compile(vec![RuleSpec::exclude("crash", ["Title", "Description"], pattern(r"\bcrash|\bhang\b"))]);
        assert!(rules.evaluate(&fields(&[("Title", "T"), ("Description", "JVM may HANG on exit")])).is_excluded());
        assert!(!rules.evaluate(&fields(&[("Title", "Change handling")])).is_excluded());
    }

    #[test]
    fn test_first_matching_exclusion_wins() {
        let rules = compile(vec![
            RuleSpec::exclude("a", ["Description"], Matcher::Contains { value: "x".into() }),
            RuleSpec::exclude("b", ["Description"], Matcher::Contains { value: "x".into() }),
        ]);
        match rules.evaluate(&fields(&[("Description", "xx")])) {
            Verdict::Excluded(e) => assert_eq!(e.rule_id, "a"),
            other => panic!("expected exclusion, got {other:?}"),
        }
    }

    #[test]
    fn test_first_rule_to_set_an_attribute_wins() {
        let rules = compile(vec![
            RuleSpec::set("reg", ["Title"], pattern(r"\bregression\b"), "status", "regression"),
            RuleSpec::set("fix", ["Type"], equals("Bug"), "status", "fix"),
        ]);
        let verdict = rules.evaluate(&fields(&[("Title", "Regression in javac"), ("Type", "Bug")]));
        assert_eq!(verdict.derivations().len(), 1);
        assert_eq!(verdict.derivations()[0].value, "regression");
        assert_eq!(verdict.derivations()[0].rule_id, "reg");
    }

    #[test]
    fn test_all_tokens_start_with() {
        let rules = compile(vec![RuleSpec::exclude(
            "non-windows",
            ["OS"],
            Matcher::AllTokensStartWith { prefixes: vec!["linux".into(), "os_x".into()] },
        )]);
        assert!(rules.evaluate(&fields(&[("OS", "linux, os_x")])).is_excluded());
        assert!(rules.evaluate(&fields(&[("OS", "Linux_x64/OS_X")])).is_excluded());
        assert!(!rules.evaluate(&fields(&[("OS", "linux, windows")])).is_excluded());
        assert!(!rules.evaluate(&fields(&[("OS", " , ")])).is_excluded());
    }

    #[test]
    fn test_reason_template_gets_matched_value() {
        let rules = compile(vec![RuleSpec::exclude(
            "non-bug",
            ["Type"],
            Matcher::OneOf { values: vec!["Enhancement".into(), "Task".into()] },
        )
        .with_reason("non-bug type '{value}'")]);
        match rules.evaluate(&fields(&[("Type", "Task")])) {
            Verdict::Excluded(e) => assert_eq!(e.reason, "non-bug type 'Task'"),
            other => panic!("expected exclusion, got {other:?}"),
        }
    }

    #[test]
    fn test_reason_defaults_to_rule_id() {
        let rules = compile(vec![RuleSpec::exclude("meta", ["Title"], Matcher::Contains { value: "bump".into() })]);
        match rules.evaluate(&fields(&[("Title", "Bump update version")])) {
            Verdict::Excluded(e) => assert_eq!(e.reason, "meta"),
            other => panic!("expected exclusion, got {other:?}"),
        }
    }

    #[test]
    fn test_exclusions_can_be_switched_off() {
        let rules = compile(vec![
            RuleSpec::exclude("not-bug", ["Type"], equals("Bug")).negated(),
            RuleSpec::set("win", ["OS"], Matcher::Contains { value: "windows".into() }, "impact_scope", "windows"),
        ]);
        let record = fields(&[("Type", "Task"), ("OS", "windows")]);
        assert!(rules.evaluate(&record).is_excluded());
        let verdict = rules.evaluate_with(&record, false);
        assert_eq!(verdict.derivations()[0].value, "windows");
    }

    #[test]
    fn test_families_run_as_independent_passes() {
        let exclusions = compile(vec![RuleSpec::exclude("not-bug", ["Type"], equals("Bug")).negated()]);
        let status = compile(vec![RuleSpec::set("fix", ["Type"], equals("Bug"), "status", "fix")]);
        let sets = [exclusions, status];

        let kept = evaluate_families(&fields(&[("Type", "Bug")]), &sets, true);
        assert_eq!(kept.derivations()[0].attribute, "status");
        assert!(evaluate_families(&fields(&[("Type", "Task")]), &sets, true).is_excluded());
    }

    #[test]
    fn test_derived_values_adopt_domain_spelling() {
        let rules = compile(vec![RuleSpec::set("fix", ["Type"], equals("Bug"), "status", "FIX")]);
        assert_eq!(rules.evaluate(&fields(&[("Type", "Bug")])).derivations()[0].value, "fix");
    }

    #[test]
    fn test_compile_rejects_bad_rules() {
        let schema = FieldSchema::default();
        let attrs = attributes();
        let check = |rule: RuleSpec| RuleSet::compile(&RuleFamily::new("f", vec![rule]), &schema, &attrs).unwrap_err();

        assert!(matches!(
            check(RuleSpec::exclude("r", ["Severity"], equals("x"))),
            ConfigError::UnknownField { .. }
        ));
        assert!(matches!(
            check(RuleSpec::exclude("r", Vec::<String>::new(), equals("x"))),
            ConfigError::EmptySelector { .. }
        ));
        assert!(matches!(check(RuleSpec::exclude("r", ["Title"], pattern("(unclosed"))), ConfigError::InvalidPattern { .. }));
        assert!(matches!(check(RuleSpec::exclude("r", ["Title"], equals("  "))), ConfigError::EmptyMatcher { .. }));
        assert!(matches!(
            check(RuleSpec::set("r", ["Title"], equals("x"), "severity", "high")),
            ConfigError::UnknownAttribute { .. }
        ));
        assert!(matches!(
            check(RuleSpec::set("r", ["Title"], equals("x"), "status", "wontfix")),
            ConfigError::InvalidAttributeValue { .. }
        ));
    }

    #[test]
    fn test_duplicate_rule_ids_are_rejected() {
        let family = RuleFamily::new(
            "f",
            vec![
                RuleSpec::exclude("dup", ["Title"], equals("a")),
                RuleSpec::exclude("dup", ["Title"], equals("b")),
            ],
        );
        let err = RuleSet::compile(&family, &FieldSchema::default(), &attributes()).unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateRuleId { .. }));
    }
}
