// ============================================================
// Layer 5 — Canonical Classifier
// ============================================================
// Maps a surviving record onto the full set of declared
// attributes. For each attribute, in declaration order, the
// first available source wins:
//
//   1. a rule derivation        (feature_area ← `security-component`)
//   2. the attribute's field    (priority ← `Priority: P3`)
//   3. the caller's context     (release ← `21.0.6` from the file name)
//   4. the literal `unknown`
//
// Whatever is picked is normalized against the attribute's
// aliases and domain. A value outside the domain is reported,
// never coerced.

use indexmap::IndexMap;

use crate::domain::attributes::{
    AttributeSchema, CanonicalAttributeSet, ClassificationContext, UNKNOWN,
};
use crate::domain::errors::RecordError;
use crate::domain::rules::Derivation;
use crate::domain::traits::FieldSource;

pub fn classify<S: FieldSource + ?Sized>(
    source:      &S,
    derivations: &[Derivation],
    context:     &ClassificationContext,
    schema:      &AttributeSchema,
) -> Result<CanonicalAttributeSet, RecordError> {
    let mut values = IndexMap::with_capacity(schema.len());

    for spec in schema.iter() {
        let derived = derivations
            .iter()
            .find(|d| d.attribute == spec.name)
            .map(|d| d.value.as_str());
        let raw = derived
            .or_else(|| spec.from_field.as_deref().and_then(|f| source.non_empty(f)))
            .or_else(|| spec.context.as_deref().and_then(|k| context.get(k)));

        let value = match raw {
            Some(raw) => spec.normalize(raw)?,
            None => UNKNOWN.to_string(),
        };
        values.insert(spec.name.clone(), value);
    }

    Ok(CanonicalAttributeSet::from_values(values))
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::attributes::AttributeSpec;
    use crate::domain::fields::FieldMap;

    fn schema() -> AttributeSchema {
        AttributeSchema::new(vec![
            AttributeSpec::new("priority")
                .from_field("Priority")
                .with_domain(["P1", "P2", "P3", "P4", "P5"]),
            AttributeSpec::new("type")
                .from_field("Type")
                .with_domain(["Bug", "Sub-task"])
                .with_alias("Sub-Task", "Sub-task"),
            AttributeSpec::new("component").from_field("Component"),
            AttributeSpec::new("release").with_context("release"),
            AttributeSpec::new("status").with_domain(["fix", "regression"]),
        ])
    }

    fn derivation(attribute: &str, value: &str) -> Derivation {
        Derivation { attribute: attribute.into(), value: value.into(), rule_id: "r".into() }
    }

    #[test]
    fn test_every_declared_attribute_is_present() {
        let fields: FieldMap = [("Type", "Bug")].into_iter().collect();
        let set = classify(&fields, &[], &ClassificationContext::new(), &schema()).unwrap();

        assert_eq!(set.len(), 5);
        assert_eq!(set.get("priority"), Some(UNKNOWN));
        assert_eq!(set.get("type"), Some("Bug"));
        assert_eq!(set.get("component"), Some(UNKNOWN));
        assert_eq!(set.get("release"), Some(UNKNOWN));
        assert!(set.validate(&schema()).is_ok());
    }

    #[test]
    fn test_precedence_derivation_then_field_then_context() {
        let fields: FieldMap = [("Priority", "p2"), ("Component", "hotspot")].into_iter().collect();
        let ctx = ClassificationContext::new().with("release", "21.0.6");
        let set = classify(&fields, &[derivation("status", "regression")], &ctx, &schema()).unwrap();

        assert_eq!(set.get("priority"), Some("P2"));
        assert_eq!(set.get("component"), Some("hotspot"));
        assert_eq!(set.get("release"), Some("21.0.6"));
        assert_eq!(set.get("status"), Some("regression"));
    }

    #[test]
    fn test_derivation_overrides_field() {
        let fields: FieldMap = [("Priority", "P4")].into_iter().collect();
        let set = classify(&fields, &[derivation("priority", "P1")], &ClassificationContext::new(), &schema()).unwrap();
        assert_eq!(set.get("priority"), Some("P1"));
    }

    #[test]
    fn test_aliases_apply_before_domain_check() {
        let fields: FieldMap = [("Type", "Sub-Task")].into_iter().collect();
        let set = classify(&fields, &[], &ClassificationContext::new(), &schema()).unwrap();
        assert_eq!(set.get("type"), Some("Sub-task"));
    }

    #[test]
    fn test_out_of_domain_field_value_is_a_violation() {
        let fields: FieldMap = [("Priority", "urgent")].into_iter().collect();
        let err = classify(&fields, &[], &ClassificationContext::new(), &schema()).unwrap_err();
        assert_eq!(
            err,
            RecordError::DomainViolation { attribute: "priority".into(), value: "urgent".into() }
        );
    }

    #[test]
    fn test_any_field_source_can_be_classified() {
        let mut map = std::collections::HashMap::new();
        map.insert("Component".to_string(), "core-libs".to_string());
        let set = classify(&map, &[], &ClassificationContext::new(), &schema()).unwrap();
        assert_eq!(set.get("component"), Some("core-libs"));
    }
}
