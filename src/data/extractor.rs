// ============================================================
// Layer 4 — Field Extractor
// ============================================================
// Turns one record block into a FieldMap.
//
//   Title: [JDK-1] Sample            → Title
//   Description: first line          → Description = "first line
//   second line                                       second line
//   Note: not a recognized name                       Note: not a ..."
//   OS: windows                      → OS
//
// Rules:
//   - a field starts at a line opening with a recognized name
//   - following lines belong to it until the next recognized name
//   - unrecognized `Name: x` lines are kept in the previous value
//   - missing fields are simply absent (no defaults here)
//   - lines before the first field are preamble and belong to no field
//
// The metadata lines this tool writes are only fields where it
// writes them: in the run of managed lines right after the title.
//
//   Title: [JDK-6] Wrong alias       ← anchor
//   regression in keystore lookup    ← still the title
//   Impact: windows      ┐ managed run: each line is a field
//   Status: regression   ┘
//   Description: see notes
//   Impact: minor                    ← prose, part of Description
//
// Reference: Rust Book §8 (Strings), §9 (Error Handling)

use regex::Regex;
use std::ops::Range;

use crate::domain::errors::RecordError;
use crate::domain::fields::{line_key, split_field_line, FieldMap, FieldSchema};
use crate::domain::record::Record;

/// Everything needed to read records of one policy.
#[derive(Debug, Clone)]
pub struct RecordLayout {
    schema:       FieldSchema,
    title_field:  String,
    id_pattern:   Regex,
    anchor:       String,
    managed_keys: Vec<String>,
}

impl RecordLayout {
    /// A layout whose metadata anchor is the title and which manages
    /// no keys.
    pub fn new(schema: FieldSchema, title_field: impl Into<String>, id_pattern: Regex) -> Self {
        let title_field = title_field.into();
        Self {
            schema,
            anchor: title_field.clone(),
            title_field,
            id_pattern,
            managed_keys: Vec::new(),
        }
    }

    /// Recognize the metadata run written under `anchor`.
    pub fn with_metadata<I, S>(mut self, anchor: impl Into<String>, managed_keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.anchor = anchor.into();
        self.managed_keys = managed_keys.into_iter().map(Into::into).collect();
        self
    }

    pub fn schema(&self) -> &FieldSchema {
        &self.schema
    }

    pub fn title_field(&self) -> &str {
        &self.title_field
    }

    /// First ID-pattern match inside the title, if any.
    pub fn identifier(&self, fields: &FieldMap) -> Option<String> {
        let title = fields.get(&self.title_field)?;
        self.id_pattern.find(title).map(|m| m.as_str().to_string())
    }
}

// ─── Record head ──────────────────────────────────────────────────────────────
/// Line indices of a record's anchor and the managed run below it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordHead {
    /// The anchor line.
    pub anchor:    usize,
    /// One past the anchor field's last continuation line.
    pub title_end: usize,
    /// Consecutive managed lines after the title, blank lines in
    /// between allowed. Empty (at `title_end`) when there are none.
    pub run:       Range<usize>,
}

impl RecordHead {
    /// Where a fresh metadata block goes.
    pub fn insertion_point(&self) -> usize {
        if self.run.is_empty() { self.title_end } else { self.run.start }
    }
}

/// Find the anchor line and the managed run that follows the anchor
/// field's full value.
///
/// The title continues over non-blank lines that open neither a
/// recognized field nor a managed key.
pub fn locate_head<F>(lines: &[&str], anchor: &str, schema: &FieldSchema, is_managed: F) -> Option<RecordHead>
where
    F: Fn(&str) -> bool,
{
    let managed = |line: &str| line_key(line).is_some_and(&is_managed);
    let anchor_at = lines.iter().position(|l| line_key(l) == Some(anchor))?;

    let mut title_end = anchor_at + 1;
    while title_end < lines.len() {
        let line = lines[title_end];
        if is_blank(line) || schema.match_line(line).is_some() || managed(line) {
            break;
        }
        title_end += 1;
    }

    let mut start = title_end;
    while start < lines.len() && is_blank(lines[start]) {
        start += 1;
    }
    let mut end = start;
    while end < lines.len() && managed(lines[end]) {
        end += 1;
    }
    let run = if end > start { start..end } else { title_end..title_end };

    Some(RecordHead { anchor: anchor_at, title_end, run })
}

fn is_blank(line: &str) -> bool {
    line.trim().is_empty()
}

/// Extract the recognized fields of `block`.
pub fn extract(block: &str, schema: &FieldSchema) -> FieldMap {
    let lines: Vec<&str> = block.lines().collect();
    extract_lines(&lines, schema, 0..0)
}

/// Like `extract`, but every line inside `run` opens a field of its
/// own key, recognized or not.
fn extract_lines(lines: &[&str], schema: &FieldSchema, run: Range<usize>) -> FieldMap {
    let mut fields  = FieldMap::new();
    let mut current: Option<(&str, String)> = None;

    for (i, &line) in lines.iter().enumerate() {
        let opened = if run.contains(&i) {
            split_field_line(line)
        } else {
            schema.match_line(line)
        };
        if let Some((name, value)) = opened {
            if let Some((prev, acc)) = current.take() {
                store(&mut fields, prev, acc);
            }
            current = Some((name, value.to_string()));
        } else if let Some((_, acc)) = current.as_mut() {
            acc.push('\n');
            acc.push_str(line.trim_end());
        }
    }
    if let Some((prev, acc)) = current.take() {
        store(&mut fields, prev, acc);
    }

    fields
}

fn store(fields: &mut FieldMap, name: &str, value: String) {
    let value = value.trim_end();
    if !fields.insert(name, value) {
        tracing::debug!("Repeated field '{}' ignored, first occurrence kept", name);
    }
}

/// Parse a block into a Record.
///
/// Fails with StructuralParse when the block holds no recognized
/// field at all (blank block, pure prose).
pub fn parse_record(position: usize, block: &str, layout: &RecordLayout) -> Result<Record, RecordError> {
    let lines: Vec<&str> = block.lines().collect();
    let run = locate_head(&lines, &layout.anchor, &layout.schema, |key| {
        layout.managed_keys.iter().any(|k| k == key)
    })
    .map_or(0..0, |head| head.run);
    let fields = extract_lines(&lines, &layout.schema, run);
    if fields.is_empty() {
        return Err(RecordError::StructuralParse { position });
    }
    let identifier = layout.identifier(&fields);
    Ok(Record::new(position, block, fields, identifier))
}
