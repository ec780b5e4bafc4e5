// ============================================================
// Layer 4 — Record Query
// ============================================================
// Read-only lookups over parsed records, spanning one or more
// issue-list files:
//
//   - AND filters on field values (case-insensitive equality)
//   - keyword search over a chosen set of fields
//   - lookup by identifier, with or without its prefix
//   - per-field tallies, sorting and grouping of the hits
//
// Nothing here touches the rule engine; search works on the
// fields exactly as they were extracted.
//
// Reference: Rust Book §13 (Iterators and Closures)

use indexmap::IndexMap;
use std::cmp::Ordering;

use crate::domain::fold_case;
use crate::domain::record::Record;
use crate::domain::traits::FieldSource;

/// Placeholder used when a tallied or grouped field is absent.
pub const UNSPECIFIED: &str = "(unspecified)";

/// Fields searched by a keyword query unless the caller names others.
pub const DEFAULT_KEYWORD_FIELDS: &[&str] = &["Title", "Description", "Component"];

/// A record together with the file it came from.
#[derive(Debug, Clone)]
pub struct Hit {
    pub source: String,
    pub record: Record,
}

impl Hit {
    pub fn new(source: impl Into<String>, record: Record) -> Self {
        Self { source: source.into(), record }
    }
}

// ─── RecordQuery ──────────────────────────────────────────────────────────────
/// Conjunction of all configured conditions. An empty query matches
/// every record.
#[derive(Debug, Clone, Default)]
pub struct RecordQuery {
    filters:        Vec<(String, String)>,
    keyword:        Option<String>,
    keyword_fields: Vec<String>,
    id:             Option<String>,
}

impl RecordQuery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Require `field` to equal `value`, ignoring case and surrounding space.
    pub fn with_filter(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.filters.push((field.into(), value.into()));
        self
    }

    /// Require `keyword` to occur in at least one of `fields`.
    /// An empty field list means DEFAULT_KEYWORD_FIELDS.
    pub fn with_keyword(mut self, keyword: impl Into<String>, fields: Vec<String>) -> Self {
        self.keyword = Some(keyword.into());
        self.keyword_fields = if fields.is_empty() {
            DEFAULT_KEYWORD_FIELDS.iter().map(|f| f.to_string()).collect()
        } else {
            fields
        };
        self
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty() && self.keyword.is_none() && self.id.is_none()
    }

    pub fn matches(&self, record: &Record) -> bool {
        if let Some(id) = &self.id {
            if !id_matches(record.identifier(), id) {
                return false;
            }
        }

        let filters_hold = self.filters.iter().all(|(field, wanted)| {
            record
                .non_empty(field)
                .is_some_and(|v| fold_case(v) == fold_case(wanted.trim()))
        });
        if !filters_hold {
            return false;
        }

        match &self.keyword {
            None => true,
            Some(keyword) => {
                let needle = fold_case(keyword);
                self.keyword_fields
                    .iter()
                    .filter_map(|f| record.field(f))
                    .any(|v| fold_case(v).contains(&needle))
            }
        }
    }

    /// Keep the hits that satisfy the query, preserving their order.
    pub fn apply(&self, hits: Vec<Hit>) -> Vec<Hit> {
        hits.into_iter().filter(|h| self.matches(&h.record)).collect()
    }
}

/// `JDK-8320192` matches `JDK-8320192`, `jdk-8320192` and `8320192`.
pub fn id_matches(identifier: Option<&str>, wanted: &str) -> bool {
    let Some(identifier) = identifier else {
        return false;
    };
    let wanted = fold_case(wanted.trim());
    let identifier = fold_case(identifier);
    identifier == wanted
        || identifier
            .rsplit_once('-')
            .is_some_and(|(_, number)| number == wanted)
}

// ─── Tallies, sorting, grouping ───────────────────────────────────────────────
/// Ordering rank for priority-like values (`P1` < `P2` < ... < other).
pub fn priority_rank(value: &str) -> u32 {
    value
        .trim()
        .strip_prefix(['P', 'p'])
        .and_then(|n| n.parse::<u32>().ok())
        .unwrap_or(u32::MAX)
}

fn value_of<'a>(record: &'a Record, field: &str) -> &'a str {
    record.non_empty(field).unwrap_or(UNSPECIFIED)
}

/// Count records per value of `field`, most frequent first.
/// Priority values are listed in P1..P5 order instead.
pub fn tally<'a, I>(records: I, field: &str) -> Vec<(String, usize)>
where
    I: IntoIterator<Item = &'a Record>,
{
    let mut counts: IndexMap<String, usize> = IndexMap::new();
    for record in records {
        *counts.entry(value_of(record, field).to_string()).or_default() += 1;
    }
    let mut counts: Vec<(String, usize)> = counts.into_iter().collect();
    counts.sort_by(|a, b| compare_groups(&a.0, a.1, &b.0, b.1));
    counts
}

fn compare_groups(a_key: &str, a_len: usize, b_key: &str, b_len: usize) -> Ordering {
    let (ra, rb) = (priority_rank(a_key), priority_rank(b_key));
    if ra != u32::MAX || rb != u32::MAX {
        return ra.cmp(&rb).then_with(|| a_key.cmp(b_key));
    }
    match (a_key == UNSPECIFIED, b_key == UNSPECIFIED) {
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        _ => b_len.cmp(&a_len).then_with(|| a_key.cmp(b_key)),
    }
}

/// Stable sort of hits by a field. Priority-like values sort by
/// rank, everything else case-insensitively; absent values go last.
pub fn sort_by_field(hits: &mut [Hit], field: &str) {
    hits.sort_by(|a, b| {
        let (va, vb) = (a.record.non_empty(field), b.record.non_empty(field));
        match (va, vb) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Greater,
            (Some(_), None) => Ordering::Less,
            (Some(x), Some(y)) => priority_rank(x)
                .cmp(&priority_rank(y))
                .then_with(|| fold_case(x).cmp(&fold_case(y))),
        }
    });
}

/// What to group hits by.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupKey {
    Field(String),
    Source,
}

/// Group hits, keeping each group's hits in input order. Groups are
/// ordered by priority rank when the keys look like priorities,
/// otherwise by size.
pub fn group_by<'a>(hits: &'a [Hit], key: &GroupKey) -> Vec<(String, Vec<&'a Hit>)> {
    let mut groups: IndexMap<String, Vec<&Hit>> = IndexMap::new();
    for hit in hits {
        let name = match key {
            GroupKey::Field(field) => value_of(&hit.record, field).to_string(),
            GroupKey::Source => hit.source.clone(),
        };
        groups.entry(name).or_default().push(hit);
    }
    let mut groups: Vec<(String, Vec<&Hit>)> = groups.into_iter().collect();
    if *key != GroupKey::Source {
        groups.sort_by(|a, b| compare_groups(&a.0, a.1.len(), &b.0, b.1.len()));
    }
    groups
}

/// Up to `before`/`after` bytes of text around the first
/// case-insensitive occurrence of `keyword`, on one line.
pub fn keyword_context(text: &str, keyword: &str, before: usize, after: usize) -> Option<String> {
    let re = regex::RegexBuilder::new(&regex::escape(keyword))
        .case_insensitive(true)
        .build()
        .ok()?;
    let found = re.find(text)?;

    let mut start = found.start().saturating_sub(before);
    while !text.is_char_boundary(start) {
        start -= 1;
    }
    let mut end = (found.end() + after).min(text.len());
    while !text.is_char_boundary(end) {
        end += 1;
    }
    Some(text[start..end].replace(['\r', '\n'], " "))
}
