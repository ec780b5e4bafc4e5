// ============================================================
// Layer 4 — Text Loader
// ============================================================
// Reads issue lists from disk.
//
// An issue list is a plain UTF-8 file such as
// `jdk-21.0.6-issues.txt`. The release number is often only
// present in the file name, so the loader can recover it for
// use as classification context.
//
// Reference: Rust Book §9 (Error Handling)
//            Rust Book §12 (An I/O Project)

use anyhow::{Context, Result};
use regex::Regex;
use std::{
    fs,
    path::{Path, PathBuf},
    sync::OnceLock,
};

use crate::domain::traits::TextSource;

/// A single issue-list file on disk.
/// Implements the TextSource trait from Layer 3.
#[derive(Debug, Clone)]
pub struct TextFileSource {
    path: PathBuf,
}

impl TextFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// File name only, used to group search results by source.
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("unknown")
            .to_string()
    }
}

impl TextSource for TextFileSource {
    fn read_text(&self) -> Result<String> {
        let text = fs::read_to_string(&self.path)
            .with_context(|| format!("Cannot read '{}'", self.path.display()))?;
        tracing::debug!("Loaded: {} ({} bytes)", self.path.display(), text.len());
        Ok(text)
    }

    fn label(&self) -> String {
        self.path.display().to_string()
    }
}

static RELEASE: OnceLock<Option<Regex>> = OnceLock::new();

/// Dotted version number in the file name, e.g. `21.0.6` from
/// `jdk-21.0.6-issues.txt`. None when the name carries no version.
pub fn infer_release(path: &Path) -> Option<String> {
    let name = path.file_name()?.to_str()?;
    let re = RELEASE.get_or_init(|| Regex::new(r"\d+(?:\.\d+)+").ok()).as_ref()?;
    re.find(name).map(|m| m.as_str().to_string())
}
