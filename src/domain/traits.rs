// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================
// The engine never assumes fields come from line-based text.
// Anything that can answer "what is the value of field X?"
// can be classified: the extracted FieldMap, a plain HashMap,
// or an adapter over a tree-shaped document.
//
// Reference: Rust Book §10 (Traits: Defining Shared Behaviour)

use anyhow::Result;
use std::collections::{BTreeMap, HashMap};

// ─── FieldSource ──────────────────────────────────────────────────────────────
/// Optional lookup of a field value by its recognized name.
///
/// Absence is a first-class answer: rules treat a missing field
/// as "does not match" and the classifier falls back to `unknown`.
pub trait FieldSource {
    /// Raw value of `name`, if the source has it.
    fn field(&self, name: &str) -> Option<&str>;

    /// Trimmed value, with empty strings treated as absent.
    fn non_empty(&self, name: &str) -> Option<&str> {
        self.field(name).map(str::trim).filter(|v| !v.is_empty())
    }
}

impl FieldSource for HashMap<String, String> {
    fn field(&self, name: &str) -> Option<&str> {
        self.get(name).map(String::as_str)
    }
}

impl FieldSource for BTreeMap<String, String> {
    fn field(&self, name: &str) -> Option<&str> {
        self.get(name).map(String::as_str)
    }
}

// ─── TextSource ───────────────────────────────────────────────────────────────
/// Anything that can hand the pipeline a raw text corpus.
///
/// Implementations:
///   - TextFileSource -> a UTF-8 file on disk
pub trait TextSource {
    /// Read the whole corpus.
    fn read_text(&self) -> Result<String>;

    /// Human-readable origin, used in logs and reports.
    fn label(&self) -> String;
}
