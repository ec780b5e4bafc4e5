// ============================================================
// Layer 6 — Dry-Run Diff
// ============================================================
// Renders what a rewrite would change as a unified diff, so
// `dry-run` can show the edits without touching the file.

use similar::{ChangeTag, TextDiff};

/// Lines of context around each hunk.
pub const CONTEXT_LINES: usize = 3;

/// Unified diff of `old` → `new`; empty when nothing changes.
pub fn unified_diff(old: &str, new: &str, label: &str) -> String {
    if old == new {
        return String::new();
    }
    TextDiff::from_lines(old, new)
        .unified_diff()
        .context_radius(CONTEXT_LINES)
        .header(&format!("a/{label}"), &format!("b/{label}"))
        .to_string()
}

/// Count of (inserted, deleted) lines.
pub fn change_counts(old: &str, new: &str) -> (usize, usize) {
    let diff = TextDiff::from_lines(old, new);
    diff.iter_all_changes()
        .fold((0, 0), |(ins, del), change| match change.tag() {
            ChangeTag::Insert => (ins + 1, del),
            ChangeTag::Delete => (ins, del + 1),
            ChangeTag::Equal => (ins, del),
        })
}
