// ============================================================
// Layer 2 — TriageUseCase
// ============================================================
// Runs the pipeline over one issue-list file:
//
//   Step 1: Load + compile the policy      (Layer 6 - infra)
//   Step 2: Read the input file            (Layer 4 - data)
//   Step 3: Build the classification context
//           (--release, --context, or the version in the file name)
//   Step 4: extract / rewrite              (Layer 2 - pipeline)
//   Step 5: Write output, backup, report   (Layer 6 - infra)
//
// `dry-run` stops before step 5 and returns a unified diff
// instead.

use anyhow::{Context, Result};
use std::path::PathBuf;

use crate::application::pipeline::{Pipeline, PipelineOutput};
use crate::data::loader::{infer_release, TextFileSource};
use crate::domain::attributes::ClassificationContext;
use crate::domain::traits::TextSource;
use crate::engine::policy::Policy;
use crate::infra::{
    diff::{change_counts, unified_diff},
    file_writer::write_output,
    policy_store::load_policy,
    report::write_excluded_report,
};

/// Context key filled from `--release` or the input file name.
pub const RELEASE_CONTEXT_KEY: &str = "release";

// ─── Run Configuration ───────────────────────────────────────────────────────
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub input:            PathBuf,
    /// Where to write the result. None means stdout for extract and
    /// the input file itself for rewrite.
    pub output:           Option<PathBuf>,
    /// None means the built-in policy.
    pub policy:           Option<PathBuf>,
    pub release:          Option<String>,
    pub context:          Vec<(String, String)>,
    pub apply_exclusions: bool,
    pub excluded_report:  Option<PathBuf>,
    pub backup:           bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            input:            PathBuf::from("issues.txt"),
            output:           None,
            policy:           None,
            release:          None,
            context:          Vec::new(),
            apply_exclusions: true,
            excluded_report:  None,
            backup:           true,
        }
    }
}

/// What a run produced, for the CLI to present.
#[derive(Debug, Clone)]
pub struct TriageReport {
    pub output:  PipelineOutput,
    /// File the result was written to, if any.
    pub written: Option<PathBuf>,
    /// Unified diff, only for dry runs. Empty when nothing changes.
    pub diff:    Option<String>,
}

// ─── TriageUseCase ────────────────────────────────────────────────────────────
pub struct TriageUseCase {
    config: RunConfig,
    policy: Policy,
}

impl TriageUseCase {
    pub fn new(config: RunConfig) -> Result<Self> {
        let policy = load_policy(config.policy.as_deref())?;
        Ok(Self { config, policy })
    }

    pub fn context(&self) -> ClassificationContext {
        let mut ctx = ClassificationContext::new();
        let release = self
            .config
            .release
            .clone()
            .or_else(|| infer_release(&self.config.input));
        if let Some(release) = release {
            tracing::info!("Release context: {}", release);
            ctx.insert(RELEASE_CONTEXT_KEY, release);
        }
        for (key, value) in &self.config.context {
            ctx.insert(key.clone(), value.clone());
        }
        ctx
    }

    fn pipeline(&self) -> Pipeline<'_> {
        Pipeline::new(&self.policy, self.context()).with_exclusions(self.config.apply_exclusions)
    }

    fn read_input(&self) -> Result<String> {
        let source = TextFileSource::new(&self.config.input);
        tracing::info!("Reading {}", source.label());
        source.read_text()
    }

    fn write_report(&self, output: &PipelineOutput) -> Result<()> {
        if let Some(path) = &self.config.excluded_report {
            write_excluded_report(path, &output.excluded_entries())?;
        }
        Ok(())
    }

    /// Drop excluded records. Writes to `output` when configured;
    /// otherwise the caller prints `report.output.text`.
    pub fn extract(&self) -> Result<TriageReport> {
        let text = self.read_input()?;
        let output = self.pipeline().extract(&text);
        self.write_report(&output)?;

        let written = match &self.config.output {
            Some(path) => {
                write_output(path, &output.text, self.config.backup)
                    .with_context(|| format!("Cannot write extract output to '{}'", path.display()))?;
                Some(path.clone())
            }
            None => None,
        };
        Ok(TriageReport { output, written, diff: None })
    }

    /// Annotate excluded records and upsert metadata, in place
    /// unless an output path is configured.
    pub fn rewrite(&self) -> Result<TriageReport> {
        let text = self.read_input()?;
        let output = self.pipeline().rewrite(&text);
        self.write_report(&output)?;

        let target = self.config.output.clone().unwrap_or_else(|| self.config.input.clone());
        if output.text == text && target == self.config.input {
            tracing::info!("{} is already up to date", target.display());
            return Ok(TriageReport { output, written: None, diff: None });
        }
        write_output(&target, &output.text, self.config.backup)
            .with_context(|| format!("Cannot write rewrite output to '{}'", target.display()))?;
        tracing::info!("Wrote {}", target.display());
        Ok(TriageReport { output, written: Some(target), diff: None })
    }

    /// Show what `rewrite` would change without writing anything.
    pub fn dry_run(&self) -> Result<TriageReport> {
        let text = self.read_input()?;
        let output = self.pipeline().rewrite(&text);
        let label = self
            .config
            .input
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("input");
        let diff = unified_diff(&text, &output.text, label);
        let (added, removed) = change_counts(&text, &output.text);
        tracing::info!("dry-run: {} line(s) added, {} removed", added, removed);
        Ok(TriageReport { output, written: None, diff: Some(diff) })
    }
}
