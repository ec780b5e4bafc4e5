// ============================================================
// Layer 5 — Compiled Policy
// ============================================================
// A PolicySpec is plain data straight from YAML/JSON. Before a
// single record is read it is compiled into a Policy:
//
//   PolicySpec ──compile──▶ Policy
//                              ├── RecordLayout   (fields, title, id regex)
//                              ├── AttributeSchema
//                              ├── Vec<RuleSet>   (one per family, in order)
//                              └── Upserter       (anchor + metadata lines)
//
// Every problem with the policy surfaces here as a ConfigError.
// The compiled Policy is immutable and can be shared across
// threads.

use regex::Regex;
use std::collections::{HashMap, HashSet};

use crate::data::extractor::RecordLayout;
use crate::domain::attributes::AttributeSchema;
use crate::domain::errors::ConfigError;
use crate::domain::fields::FieldSchema;
use crate::domain::policy::PolicySpec;
use crate::engine::rule_engine::RuleSet;
use crate::engine::upserter::{MetadataLine, Upserter};

#[derive(Debug, Clone)]
pub struct Policy {
    name:       String,
    delimiter:  String,
    layout:     RecordLayout,
    attributes: AttributeSchema,
    families:   Vec<RuleSet>,
    upserter:   Upserter,
}

impl Policy {
    pub fn compile(spec: PolicySpec) -> Result<Self, ConfigError> {
        if spec.delimiter.trim().is_empty() {
            return Err(ConfigError::EmptyDelimiter);
        }
        let id_pattern = Regex::new(&spec.id_pattern).map_err(|source| ConfigError::InvalidIdPattern {
            pattern: spec.id_pattern.clone(),
            source,
        })?;

        // Fields the rules may select.
        let mut fields = FieldSchema::new(Vec::<String>::new());
        for name in &spec.fields {
            if !fields.insert(name.as_str()) {
                return Err(ConfigError::DuplicateField { field: name.clone() });
            }
        }
        if !fields.contains(&spec.title_field) {
            return Err(ConfigError::UnknownTitleField { field: spec.title_field.clone() });
        }

        let mut attribute_names = HashSet::new();
        for attr in &spec.attributes {
            if !attribute_names.insert(attr.name.as_str()) {
                return Err(ConfigError::DuplicateAttribute { attribute: attr.name.clone() });
            }
            if let Some(field) = &attr.from_field {
                if !fields.contains(field) {
                    return Err(ConfigError::UnknownSourceField {
                        attribute: attr.name.clone(),
                        field:     field.clone(),
                    });
                }
            }
        }
        let attributes = AttributeSchema::new(spec.attributes.clone());

        let upserter = compile_metadata(&spec, &fields, &attributes)?;

        let mut families = Vec::with_capacity(spec.families.len());
        let mut rule_ids = HashSet::new();
        let mut owners: HashMap<String, String> = HashMap::new();
        for family in &spec.families {
            let set = RuleSet::compile(family, &fields, &attributes)?;
            for id in set.rule_ids() {
                if !rule_ids.insert(id.to_string()) {
                    return Err(ConfigError::DuplicateRuleId { rule: id.to_string() });
                }
            }
            for attribute in set.assigned_attributes() {
                if let Some(first) = owners.get(attribute) {
                    return Err(ConfigError::SharedAttribute {
                        attribute: attribute.to_string(),
                        first:     first.clone(),
                        second:    family.name.clone(),
                    });
                }
                owners.insert(attribute.to_string(), family.name.clone());
            }
            families.push(set);
        }

        // Managed keys are fields only in the run under the anchor.
        let layout = RecordLayout::new(fields, spec.title_field.clone(), id_pattern)
            .with_metadata(upserter.anchor(), upserter.managed_keys());

        tracing::debug!(
            "Compiled policy '{}': {} families, {} rules, {} attributes",
            spec.name,
            families.len(),
            spec.rule_count(),
            attributes.len()
        );

        Ok(Self {
            name: spec.name,
            delimiter: spec.delimiter,
            layout,
            attributes,
            families,
            upserter,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn delimiter(&self) -> &str {
        &self.delimiter
    }

    pub fn layout(&self) -> &RecordLayout {
        &self.layout
    }

    pub fn attributes(&self) -> &AttributeSchema {
        &self.attributes
    }

    pub fn families(&self) -> &[RuleSet] {
        &self.families
    }

    pub fn upserter(&self) -> &Upserter {
        &self.upserter
    }

    pub fn rule_count(&self) -> usize {
        self.families.iter().map(RuleSet::len).sum()
    }
}

fn compile_metadata(
    spec:       &PolicySpec,
    fields:     &FieldSchema,
    attributes: &AttributeSchema,
) -> Result<Upserter, ConfigError> {
    let anchor = &spec.metadata.anchor;
    if !fields.contains(anchor) {
        return Err(ConfigError::UnknownAnchor { anchor: anchor.clone() });
    }

    let mut keys: HashSet<&str> = HashSet::new();
    keys.insert(anchor);
    keys.insert(&spec.annotation_key);
    if spec.annotation_key == *anchor {
        return Err(ConfigError::DuplicateMetadataKey { key: spec.annotation_key.clone() });
    }

    let mut lines = Vec::with_capacity(spec.metadata.lines.len());
    for line in &spec.metadata.lines {
        if !keys.insert(&line.key) {
            return Err(ConfigError::DuplicateMetadataKey { key: line.key.clone() });
        }
        if !attributes.contains(&line.attribute) {
            return Err(ConfigError::UnknownMetadataAttribute {
                key:       line.key.clone(),
                attribute: line.attribute.clone(),
            });
        }
        lines.push(MetadataLine::new(line.key.clone(), line.attribute.clone()));
    }

    Ok(Upserter::new(anchor.clone(), fields.clone(), lines, spec.annotation_key.clone()))
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::attributes::AttributeSpec;
    use crate::domain::rules::{Matcher, RuleFamily, RuleSpec};

    fn base() -> PolicySpec {
        PolicySpec::new("test")
            .with_attribute(AttributeSpec::new("type").from_field("Type"))
            .with_attribute(AttributeSpec::new("status").with_domain(["fix", "regression"]))
            .with_metadata_line("Type", "type")
            .with_metadata_line("Status", "status")
    }

    fn set_status(id: &str, value: &str) -> RuleSpec {
        RuleSpec::set(id, ["Type"], Matcher::Equals { value: "Bug".into() }, "status", value)
    }

    #[test]
    fn test_compiles_and_exposes_parts() {
        let policy = Policy::compile(
            base().with_family(RuleFamily::new("status", vec![set_status("fix", "fix")])),
        )
        .unwrap();
        assert_eq!(policy.name(), "test");
        assert_eq!(policy.delimiter(), "-----");
        assert_eq!(policy.rule_count(), 1);
        // written keys are not general fields
        assert!(!policy.layout().schema().contains("Status"));
        assert!(!policy.layout().schema().contains("Excluded"));
    }

    #[test]
    fn test_shared_attribute_between_families_is_rejected() {
        let spec = base()
            .with_family(RuleFamily::new("a", vec![set_status("r1", "fix")]))
            .with_family(RuleFamily::new("b", vec![set_status("r2", "regression")]));
        match Policy::compile(spec).unwrap_err() {
            ConfigError::SharedAttribute { attribute, first, second } => {
                assert_eq!(attribute, "status");
                assert_eq!(first, "a");
                assert_eq!(second, "b");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_rule_ids_are_unique_across_families() {
        let spec = base()
            .with_family(RuleFamily::new("a", vec![RuleSpec::exclude("r", ["Type"], Matcher::Contains { value: "x".into() })]))
            .with_family(RuleFamily::new("b", vec![RuleSpec::exclude("r", ["Type"], Matcher::Contains { value: "y".into() })]));
        assert!(matches!(Policy::compile(spec), Err(ConfigError::DuplicateRuleId { .. })));
    }

    #[test]
    fn test_structural_errors() {
        let mut spec = base();
        spec.delimiter = "  ".into();
        assert!(matches!(Policy::compile(spec), Err(ConfigError::EmptyDelimiter)));

        let mut spec = base();
        spec.id_pattern = "JDK-(".into();
        assert!(matches!(Policy::compile(spec), Err(ConfigError::InvalidIdPattern { .. })));

        let mut spec = base();
        spec.fields.push("Title".into());
        assert!(matches!(Policy::compile(spec), Err(ConfigError::DuplicateField { .. })));

        let spec = base().with_attribute(AttributeSpec::new("type"));
        assert!(matches!(Policy::compile(spec), Err(ConfigError::DuplicateAttribute { .. })));

        let spec = base().with_attribute(AttributeSpec::new("sev").from_field("Severity"));
        assert!(matches!(Policy::compile(spec), Err(ConfigError::UnknownSourceField { .. })));

        let mut spec = base();
        spec.title_field = "Summary".into();
        assert!(matches!(Policy::compile(spec), Err(ConfigError::UnknownTitleField { .. })));
    }

    #[test]
    fn test_metadata_errors() {
        let mut spec = base();
        spec.metadata.anchor = "Summary".into();
        assert!(matches!(Policy::compile(spec), Err(ConfigError::UnknownAnchor { .. })));

        let spec = base().with_metadata_line("Severity", "severity");
        assert!(matches!(Policy::compile(spec), Err(ConfigError::UnknownMetadataAttribute { .. })));

        let spec = base().with_metadata_line("Type", "status");
        assert!(matches!(Policy::compile(spec), Err(ConfigError::DuplicateMetadataKey { .. })));

        let spec = base().with_metadata_line("Excluded", "status");
        assert!(matches!(Policy::compile(spec), Err(ConfigError::DuplicateMetadataKey { .. })));
    }

    #[test]
    fn test_policy_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Policy>();
    }
}
