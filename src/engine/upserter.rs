// ============================================================
// Layer 5 — Metadata Upserter
// ============================================================
// Writes canonical metadata lines into a record's own text.
//
//   Title: [JDK-3] Sample3         ← anchor (first `Title:` line)
//   Priority: unknown   ┐
//   Type: Bug           │ managed block: inserted right after
//   Component: unknown  ┘ the anchor, or replaced in place
//   Description: ...               ← untouched
//
// Finding the existing block: the anchor field ends at the
// first blank line, recognized field or managed line. From
// there, skip blank lines and take the contiguous run of lines
// whose key is managed. A non-empty run is replaced; otherwise
// the block goes directly below the anchor field. A metadata key
// that also opens a recognized field further down (a stray
// `Priority: P3` in the body) is folded into the block, so every
// key appears once. Running the upsert twice with the same
// attributes therefore changes nothing the second time.
//
// Line endings follow the anchor line. A final line without a
// terminator stays without one.

use std::ops::Range;

use crate::data::extractor::locate_head;
use crate::domain::attributes::{CanonicalAttributeSet, UNKNOWN};
use crate::domain::errors::RecordError;
use crate::domain::fields::{line_key, FieldSchema};

/// One `Key: value` line of the metadata block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataLine {
    pub key:       String,
    pub attribute: String,
}

impl MetadataLine {
    pub fn new(key: impl Into<String>, attribute: impl Into<String>) -> Self {
        Self { key: key.into(), attribute: attribute.into() }
    }
}

#[derive(Debug, Clone)]
pub struct Upserter {
    anchor:         String,
    fields:         FieldSchema,
    lines:          Vec<MetadataLine>,
    annotation_key: String,
}

impl Upserter {
    /// `fields` are the record's recognized field names; they bound
    /// the anchor field's value.
    pub fn new(
        anchor:         impl Into<String>,
        fields:         FieldSchema,
        lines:          Vec<MetadataLine>,
        annotation_key: impl Into<String>,
    ) -> Self {
        Self {
            anchor: anchor.into(),
            fields,
            lines,
            annotation_key: annotation_key.into(),
        }
    }

    pub fn anchor(&self) -> &str {
        &self.anchor
    }

    /// Metadata keys followed by the annotation key.
    pub fn managed_keys(&self) -> impl Iterator<Item = &str> {
        self.lines
            .iter()
            .map(|l| l.key.as_str())
            .chain(std::iter::once(self.annotation_key.as_str()))
    }

    /// The metadata block for `attributes`, one line per declared key.
    pub fn render(&self, attributes: &CanonicalAttributeSet) -> Vec<String> {
        self.lines
            .iter()
            .map(|l| format_line(&l.key, attributes.get(&l.attribute).unwrap_or(UNKNOWN)))
            .collect()
    }

    /// Insert or replace the metadata block. Any stale exclusion
    /// annotation in the managed run is dropped.
    pub fn upsert(&self, text: &str, attributes: &CanonicalAttributeSet) -> Result<String, RecordError> {
        let block = self.render(attributes);
        self.splice(text, &block, |key| self.is_managed(key), true)
    }

    /// Insert or replace the `Excluded: <reason>` annotation.
    pub fn annotate(&self, text: &str, reason: &str) -> Result<String, RecordError> {
        let block = [format_line(&self.annotation_key, reason)];
        self.splice(text, &block, |key| key == self.annotation_key, false)
    }

    fn is_managed(&self, key: &str) -> bool {
        self.managed_keys().any(|k| k == key)
    }

    /// Replace the lines of `text` selected by `replaced` inside the
    /// managed run with `block`. With `fold_fields`, metadata keys
    /// that open a recognized field elsewhere are removed as well.
    fn splice<F>(&self, text: &str, block: &[String], replaced: F, fold_fields: bool) -> Result<String, RecordError>
    where
        F: Fn(&str) -> bool,
    {
        let lines: Vec<&str> = text.split_inclusive('\n').collect();
        let head = locate_head(&lines, &self.anchor, &self.fields, |key| self.is_managed(key))
            .ok_or_else(|| RecordError::AnchorNotFound { anchor: self.anchor.clone() })?;

        let eol = line_ending(lines[head.anchor])
            .or_else(|| lines.iter().find_map(|l| line_ending(l)))
            .unwrap_or("\n");

        let mut dropped = vec![false; lines.len()];
        for i in head.run.clone() {
            dropped[i] = line_key(lines[i]).is_some_and(&replaced);
        }
        if fold_fields {
            let head_lines = head.anchor..head.run.end.max(head.title_end);
            for range in self.stray_fields(&lines, &head_lines) {
                range.for_each(|i| dropped[i] = true);
            }
        }

        let at = head.insertion_point();
        let mut out = String::with_capacity(text.len() + block.iter().map(|l| l.len() + 2).sum::<usize>());
        for (i, line) in lines.iter().enumerate() {
            if i == at {
                block.iter().for_each(|l| push_line(&mut out, l, eol, true));
            }
            if !dropped[i] {
                push_line(&mut out, line, eol, false);
            }
        }
        if at == lines.len() {
            block.iter().for_each(|l| push_line(&mut out, l, eol, true));
        }

        if line_ending(text).is_none() {
            let trimmed = out.trim_end_matches(['\r', '\n']).len();
            out.truncate(trimmed);
        }
        Ok(out)
    }

    /// Line ranges of metadata keys that open a recognized field
    /// outside `head_lines`, each with its non-blank continuation.
    fn stray_fields(&self, lines: &[&str], head_lines: &Range<usize>) -> Vec<Range<usize>> {
        let metadata = |line: &str| {
            self.fields
                .match_line(line)
                .is_some_and(|(name, _)| self.lines.iter().any(|l| l.key == name))
        };
        let mut found = Vec::new();
        let mut i = 0;
        while i < lines.len() {
            if head_lines.contains(&i) || !metadata(lines[i]) {
                i += 1;
                continue;
            }
            let start = i;
            i += 1;
            while i < lines.len()
                && !head_lines.contains(&i)
                && !lines[i].trim().is_empty()
                && self.fields.match_line(lines[i]).is_none()
            {
                i += 1;
            }
            found.push(start..i);
        }
        found
    }
}

/// `Key: value` with the value folded onto a single line.
pub fn format_line(key: &str, value: &str) -> String {
    let value = value
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    format!("{key}: {value}")
}

/// Append `line`, first closing an unterminated last line.
fn push_line(out: &mut String, line: &str, eol: &str, terminate: bool) {
    if !out.is_empty() && !out.ends_with('\n') {
        out.push_str(eol);
    }
    out.push_str(line);
    if terminate {
        out.push_str(eol);
    }
}

fn line_ending(line: &str) -> Option<&'static str> {
    if line.ends_with("\r\n") {
        Some("\r\n")
    } else if line.ends_with('\n') {
        Some("\n")
    } else {
        None
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;

    fn upserter() -> Upserter {
        Upserter::new(
            "Title",
            FieldSchema::default(),
            vec![
                MetadataLine::new("Priority", "priority"),
                MetadataLine::new("Type", "type"),
                MetadataLine::new("Component", "component"),
            ],
            "Excluded",
        )
    }

    fn attrs(priority: &str, ty: &str, component: &str) -> CanonicalAttributeSet {
        let mut values = IndexMap::new();
        values.insert("priority".to_string(), priority.to_string());
        values.insert("type".to_string(), ty.to_string());
        values.insert("component".to_string(), component.to_string());
        CanonicalAttributeSet::from_values(values)
    }

    #[test]
    fn test_inserts_block_under_title_replacing_managed_fields() {
        let text = "Title: [JDK-3] Sample3\nType: Bug\nDescription: Fix NPE in parser\n";
        let out = upserter().upsert(text, &attrs(UNKNOWN, "Bug", UNKNOWN)).unwrap();
        assert_eq!(
            out,
            "Title: [JDK-3] Sample3\nPriority: unknown\nType: Bug\nComponent: unknown\nDescription: Fix NPE in parser\n"
        );
    }

    #[test]
    fn test_upsert_is_idempotent() {
        let u = upserter();
        let a = attrs("P3", "Bug", "hotspot");
        let once = u.upsert("Title: T\n\nDescription: body\n", &a).unwrap();
        let twice = u.upsert(&once, &a).unwrap();
        assert_eq!(once, twice);
        assert_eq!(once, "Title: T\nPriority: P3\nType: Bug\nComponent: hotspot\n\nDescription: body\n");
    }

    #[test]
    fn test_new_values_replace_previous_block() {
        let u = upserter();
        let first = u.upsert("Title: T\nDescription: d\n", &attrs("P3", "Bug", "hotspot")).unwrap();
        let second = u.upsert(&first, &attrs("P2", "Bug", "core-libs")).unwrap();
        assert_eq!(second, "Title: T\nPriority: P2\nType: Bug\nComponent: core-libs\nDescription: d\n");
    }

    #[test]
    fn test_block_after_blank_line_is_replaced_in_place() {
        let text = "Title: T\n\nPriority: P5\nDescription: d\n";
        let out = upserter().upsert(text, &attrs("P4", "Bug", "x")).unwrap();
        assert_eq!(out, "Title: T\n\nPriority: P4\nType: Bug\nComponent: x\nDescription: d\n");
    }

    #[test]
    fn test_crlf_is_preserved() {
        let text = "Title: T\r\nDescription: d\r\n";
        let out = upserter().upsert(text, &attrs("P1", "Bug", "c")).unwrap();
        assert_eq!(out, "Title: T\r\nPriority: P1\r\nType: Bug\r\nComponent: c\r\nDescription: d\r\n");
    }

    #[test]
    fn test_unterminated_title_only_record() {
        let u = upserter();
        let a = attrs("P1", "Bug", "c");
        let out = u.upsert("Title: T", &a).unwrap();
        assert_eq!(out, "Title: T\nPriority: P1\nType: Bug\nComponent: c");
        assert_eq!(u.upsert(&out, &a).unwrap(), out);
    }

    #[test]
    fn test_missing_anchor_is_reported() {
        let err = upserter().upsert("Description: no title\n", &attrs("P1", "Bug", "c")).unwrap_err();
        assert_eq!(err, RecordError::AnchorNotFound { anchor: "Title".into() });
    }

    #[test]
    fn test_title_text_containing_colons_is_untouched() {
        let text = "Title: [JDK-8319973] AArch64: Save FPCR\nDescription: d\n";
        let out = upserter().upsert(text, &attrs("P3", "Bug", "hotspot")).unwrap();
        assert!(out.starts_with("Title: [JDK-8319973] AArch64: Save FPCR\nPriority: P3\n"));
    }

    #[test]
    fn test_annotation_is_idempotent_and_cleared_by_upsert() {
        let u = upserter();
        let annotated = u.annotate("Title: T\nType: Task\n", "non-bug type 'Task'").unwrap();
        assert_eq!(annotated, "Title: T\nExcluded: non-bug type 'Task'\nType: Task\n");
        assert_eq!(u.annotate(&annotated, "non-bug type 'Task'").unwrap(), annotated);

        let kept = u.upsert(&annotated, &attrs("P3", "Bug", "c")).unwrap();
        assert!(!kept.contains("Excluded:"));
    }

    #[test]
    fn test_multi_line_values_are_flattened() {
        assert_eq!(format_line("Excluded", "a\n  b\n"), "Excluded: a b");
    }

    #[test]
    fn test_metadata_field_further_down_is_replaced_not_duplicated() {
        let u = upserter();
        let text = "Title: T\nOS: windows\nPriority: P3\nType: Bug\n";
        let out = u.upsert(text, &attrs("P2", "Bug", "c")).unwrap();
        assert_eq!(out, "Title: T\nPriority: P2\nType: Bug\nComponent: c\nOS: windows\n");
        assert_eq!(out.matches("Priority:").count(), 1);
        assert_eq!(u.upsert(&out, &attrs("P2", "Bug", "c")).unwrap(), out);
    }

    #[test]
    fn test_managed_key_inside_prose_is_left_alone() {
        let u = Upserter::new(
            "Title",
            FieldSchema::default(),
            vec![MetadataLine::new("Impact", "impact")],
            "Excluded",
        );
        let mut values = IndexMap::new();
        values.insert("impact".to_string(), "windows".to_string());
        let set = CanonicalAttributeSet::from_values(values);

        let text = "Title: T\nDescription: see notes\nImpact: minor\n";
        let out = u.upsert(text, &set).unwrap();
        assert_eq!(out, "Title: T\nImpact: windows\nDescription: see notes\nImpact: minor\n");
        assert_eq!(u.upsert(&out, &set).unwrap(), out);
    }

    #[test]
    fn test_block_goes_below_multi_line_title() {
        let u = upserter();
        let a = attrs("P3", "Bug", "c");
        let text = "Title: Wrong alias picked\nregression in keystore lookup\n\nDescription: d\n";
        let out = u.upsert(text, &a).unwrap();
        assert_eq!(
            out,
            "Title: Wrong alias picked\nregression in keystore lookup\nPriority: P3\nType: Bug\nComponent: c\n\nDescription: d\n"
        );
        assert_eq!(u.upsert(&out, &a).unwrap(), out);
    }

    #[test]
    fn test_unterminated_metadata_line_is_replaced() {
        let out = upserter().upsert("Title: T\nType: Bug", &attrs("P1", "Bug", "c")).unwrap();
        assert_eq!(out, "Title: T\nPriority: P1\nType: Bug\nComponent: c");
    }
}
