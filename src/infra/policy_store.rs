// ============================================================
// Layer 6 — Policy Store
// ============================================================
// Loads and saves triage policies.
//
// A policy is a YAML or JSON file (chosen by extension):
//
//   rules/
//     jdk-default.yaml   ← built into the binary
//     my-team.yaml       ← passed with --policy
//
// Loading has two stages with separate failure modes:
//   1. parse    — serde rejects syntax errors and unknown keys
//   2. compile  — Policy::compile rejects semantic errors
//                 (unknown fields, bad regexes, shared attributes…)
// Both happen before any record is read.
//
// Reference: Rust Book §9 (Error Handling)

use anyhow::{Context, Result};
use std::{fs, path::Path};

use crate::domain::policy::PolicySpec;
use crate::engine::policy::Policy;

/// The JDK Windows SOW policy shipped with the tool.
pub const DEFAULT_POLICY_YAML: &str = include_str!("../../rules/jdk-default.yaml");

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyFormat {
    Yaml,
    Json,
}

impl PolicyFormat {
    /// `.json` means JSON; anything else is read as YAML.
    pub fn for_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => PolicyFormat::Json,
            _ => PolicyFormat::Yaml,
        }
    }
}

pub fn parse_spec(text: &str, format: PolicyFormat) -> Result<PolicySpec> {
    let spec = match format {
        PolicyFormat::Yaml => serde_yaml::from_str(text).context("Invalid YAML policy")?,
        PolicyFormat::Json => serde_json::from_str(text).context("Invalid JSON policy")?,
    };
    Ok(spec)
}

/// Policy spec from `path`, or the built-in default when None.
pub fn load_spec(path: Option<&Path>) -> Result<PolicySpec> {
    match path {
        None => parse_spec(DEFAULT_POLICY_YAML, PolicyFormat::Yaml)
            .context("Built-in policy is invalid"),
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("Cannot read policy '{}'", path.display()))?;
            parse_spec(&text, PolicyFormat::for_path(path))
                .with_context(|| format!("Cannot parse policy '{}'", path.display()))
        }
    }
}

/// Load and compile a policy. Any error here is fatal for the run.
pub fn load_policy(path: Option<&Path>) -> Result<Policy> {
    let spec = load_spec(path)?;
    let origin = path.map_or_else(|| "built-in".to_string(), |p| p.display().to_string());
    let name = spec.name.clone();
    let policy = Policy::compile(spec)
        .with_context(|| format!("Policy '{name}' ({origin}) is malformed"))?;
    tracing::info!(
        "Loaded policy '{}' from {} ({} families, {} rules)",
        policy.name(),
        origin,
        policy.families().len(),
        policy.rule_count()
    );
    Ok(policy)
}

/// Write a policy spec, picking the format from the extension.
pub fn save_spec(path: &Path, spec: &PolicySpec) -> Result<()> {
    let text = match PolicyFormat::for_path(path) {
        PolicyFormat::Yaml => serde_yaml::to_string(spec)?,
        PolicyFormat::Json => serde_json::to_string_pretty(spec)?,
    };
    fs::write(path, text)
        .with_context(|| format!("Cannot write policy to '{}'", path.display()))?;
    tracing::debug!("Saved policy '{}' to '{}'", spec.name, path.display());
    Ok(())
}
