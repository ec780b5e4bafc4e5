// ============================================================
// Layer 3 — Record Domain Type
// ============================================================
// One delimiter-bounded text block describing a single tracked
// change. The raw text is kept verbatim: it is what the
// upserter rewrites and what gets written back out. The field
// map is derived from that text by the extractor.

use serde::Serialize;

use crate::domain::fields::FieldMap;
use crate::domain::traits::FieldSource;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Record {
    /// Position among the non-empty blocks of the source (0-based).
    /// This is what ties a record back to its place in the file.
    position: usize,

    /// The block exactly as it appeared between delimiter lines.
    #[serde(skip)]
    raw_text: String,

    fields: FieldMap,

    /// e.g. `JDK-8319973`, pulled out of the title.
    identifier: Option<String>,
}

impl Record {
    pub fn new(
        position:   usize,
        raw_text:   impl Into<String>,
        fields:     FieldMap,
        identifier: Option<String>,
    ) -> Self {
        Self {
            position,
            raw_text: raw_text.into(),
            fields,
            identifier,
        }
    }

    pub fn raw_text(&self) -> &str {
        &self.raw_text
    }

    pub fn fields(&self) -> &FieldMap {
        &self.fields
    }

    pub fn identifier(&self) -> Option<&str> {
        self.identifier.as_deref()
    }

    /// Identifier when present, otherwise `#<1-based position>`.
    pub fn label(&self) -> String {
        record_label(self.position, self.identifier.as_deref())
    }

    /// Title text with a leading `[ID]` marker removed.
    pub fn display_title(&self, title_field: &str) -> &str {
        let title = self.fields.non_empty(title_field).unwrap_or("");
        match (title.strip_prefix('['), title.find(']')) {
            (Some(_), Some(end)) => title[end + 1..].trim(),
            _ => title,
        }
    }
}

impl FieldSource for Record {
    fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name)
    }
}

/// Label used wherever a record must be named, even before it parsed.
pub fn record_label(position: usize, identifier: Option<&str>) -> String {
    match identifier {
        Some(id) => id.to_string(),
        None => format!("#{}", position + 1),
    }
}
