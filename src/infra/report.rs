// ============================================================
// Layer 6 — Run Report
// ============================================================
// Records what a run did and writes it somewhere a human can
// check it.
//
// Counts recorded per run:
//   - processed: non-empty blocks seen
//   - kept:      records in the output without an exclusion
//   - excluded:  records removed (extract) or annotated (rewrite)
//   - flagged:   records with a per-record error
//
// Optional excluded-records report (tab-separated):
//   id<TAB>reason<TAB>title
//   JDK-8330000	non-bug type 'Enhancement'	Add jcmd option
//
// Reference: Rust Book §9 (Error Handling)
//            Rust Book §12 (I/O and File Handling)

use anyhow::{Context, Result};
use serde::Serialize;
use std::{fmt, fs, path::Path};

use crate::domain::errors::RecordError;

/// One record that hit a per-record error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlaggedRecord {
    /// Identifier, or `#<position>` when the record has none.
    pub label:   String,
    pub kind:    &'static str,
    pub message: String,
}

impl FlaggedRecord {
    pub fn new(label: impl Into<String>, error: &RecordError) -> Self {
        Self {
            label:   label.into(),
            kind:    error.kind(),
            message: error.to_string(),
        }
    }
}

/// One excluded record, as listed in the excluded report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExcludedEntry {
    pub id:     String,
    pub reason: String,
    pub title:  String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub processed: usize,
    pub kept:      usize,
    pub excluded:  usize,
    pub flagged:   Vec<FlaggedRecord>,
}

impl RunSummary {
    pub fn flag(&mut self, label: impl Into<String>, error: &RecordError) {
        self.flagged.push(FlaggedRecord::new(label, error));
    }

    pub fn has_flagged(&self) -> bool {
        !self.flagged.is_empty()
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "processed: {}  kept: {}  excluded: {}  flagged: {}",
            self.processed,
            self.kept,
            self.excluded,
            self.flagged.len()
        )?;
        for flagged in &self.flagged {
            write!(f, "\n  [{}] {}: {}", flagged.kind, flagged.label, flagged.message)?;
        }
        Ok(())
    }
}

fn tsv_cell(value: &str) -> String {
    value
        .split(['\t', '\r', '\n'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Render the excluded report, header line included.
pub fn render_excluded_tsv(entries: &[ExcludedEntry]) -> String {
    let mut out = String::from("id\treason\ttitle\n");
    for entry in entries {
        out.push_str(&format!(
            "{}\t{}\t{}\n",
            tsv_cell(&entry.id),
            tsv_cell(&entry.reason),
            tsv_cell(&entry.title)
        ));
    }
    out
}

pub fn write_excluded_report(path: &Path, entries: &[ExcludedEntry]) -> Result<()> {
    fs::write(path, render_excluded_tsv(entries))
        .with_context(|| format!("Cannot write excluded report to '{}'", path.display()))?;
    tracing::info!("Excluded report: {} entries → {}", entries.len(), path.display());
    Ok(())
}
