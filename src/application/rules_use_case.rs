// ============================================================
// Layer 2 — RulesUseCase
// ============================================================
// `check-rules`: compile a policy without touching any input
// and describe what it will do. Optionally writes the policy
// back out (YAML or JSON), which is the easiest way to start a
// custom policy from the built-in one.

use anyhow::Result;
use std::path::{Path, PathBuf};

use crate::domain::attributes::AttributeSpec;
use crate::engine::policy::Policy;
use crate::infra::policy_store::{load_spec, save_spec};

/// One rule family as listed by check-rules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FamilyOverview {
    pub name:       String,
    pub rules:      Vec<String>,
    pub attributes: Vec<String>,
}

/// Human-oriented description of a compiled policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyOverview {
    pub name:          String,
    pub delimiter:     String,
    pub anchor:        String,
    pub metadata_keys: Vec<String>,
    pub attributes:    Vec<AttributeSpec>,
    pub families:      Vec<FamilyOverview>,
}

impl PolicyOverview {
    pub fn rule_count(&self) -> usize {
        self.families.iter().map(|f| f.rules.len()).sum()
    }
}

pub struct RulesUseCase {
    policy_path: Option<PathBuf>,
}

impl RulesUseCase {
    pub fn new(policy_path: Option<PathBuf>) -> Self {
        Self { policy_path }
    }

    /// Load and compile the policy, failing on any ConfigError.
    pub fn check(&self) -> Result<PolicyOverview> {
        let spec = load_spec(self.policy_path.as_deref())?;
        let policy = Policy::compile(spec.clone())?;

        let families = policy
            .families()
            .iter()
            .map(|set| FamilyOverview {
                name:       set.family().to_string(),
                rules:      set.rule_ids().map(str::to_string).collect(),
                attributes: set.assigned_attributes().into_iter().map(str::to_string).collect(),
            })
            .collect();

        Ok(PolicyOverview {
            name:          policy.name().to_string(),
            delimiter:     policy.delimiter().to_string(),
            anchor:        policy.upserter().anchor().to_string(),
            metadata_keys: policy.upserter().managed_keys().map(str::to_string).collect(),
            attributes:    spec.attributes,
            families,
        })
    }

    /// Check the policy, then write it to `dest`.
    pub fn export(&self, dest: &Path) -> Result<PolicyOverview> {
        let overview = self.check()?;
        let spec = load_spec(self.policy_path.as_deref())?;
        save_spec(dest, &spec)?;
        tracing::info!("Policy '{}' exported to {}", spec.name, dest.display());
        Ok(overview)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_overview() {
        let overview = RulesUseCase::new(None).check().unwrap();
        assert_eq!(overview.name, "jdk-windows-sow");
        assert_eq!(overview.anchor, "Title");
        assert_eq!(overview.metadata_keys.last().map(String::as_str), Some("Excluded"));

        let exclusions = &overview.families[0];
        assert_eq!(
            exclusions.rules,
            vec![
                "non-bug-type",
                "doc-or-test-only",
                "performance-only",
                "jvm-stability",
                "non-windows-platform",
                "meta-change",
            ]
        );
        assert!(exclusions.attributes.is_empty());
        assert_eq!(overview.families[1].attributes, vec!["feature_area"]);
    }

    #[test]
    fn test_export_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("policy.yaml");
        let original = RulesUseCase::new(None).export(&dest).unwrap();
        let reloaded = RulesUseCase::new(Some(dest)).check().unwrap();
        assert_eq!(original, reloaded);
    }
}
