// ============================================================
// Layer 2 — SearchUseCase
// ============================================================
// Read-only lookups across one or more issue-list files:
//
//   Step 1: Load + compile the policy      (Layer 6 - infra)
//   Step 2: Parse every file into Records  (Layer 4 - data)
//   Step 3: Apply the query                (Layer 4 - query)
//   Step 4: Sort, tally, limit
//
// Search never runs the rule engine and never writes files.

use anyhow::Result;
use std::path::PathBuf;

use crate::data::extractor::parse_record;
use crate::data::loader::TextFileSource;
use crate::data::query::{sort_by_field, tally, GroupKey, Hit, RecordQuery};
use crate::data::splitter::split;
use crate::domain::traits::TextSource;
use crate::engine::policy::Policy;
use crate::infra::policy_store::load_policy;

/// Fields tallied by `--stats`.
pub const STAT_FIELDS: &[&str] = &["Priority", "Type", "Component", "OS"];

// ─── Search Configuration ────────────────────────────────────────────────────
#[derive(Debug, Clone, Default)]
pub struct SearchConfig {
    pub files:          Vec<PathBuf>,
    pub policy:         Option<PathBuf>,
    /// (field, value) pairs, all of which must hold.
    pub filters:        Vec<(String, String)>,
    pub keyword:        Option<String>,
    /// Fields searched for the keyword; empty means the defaults.
    pub keyword_fields: Vec<String>,
    pub id:             Option<String>,
    pub sort_by:        Option<String>,
    pub group_by:       Option<GroupKey>,
    pub limit:          Option<usize>,
    pub stats:          bool,
}

impl SearchConfig {
    pub fn query(&self) -> RecordQuery {
        let mut query = RecordQuery::new();
        for (field, value) in &self.filters {
            query = query.with_filter(field.clone(), value.clone());
        }
        if let Some(keyword) = &self.keyword {
            query = query.with_keyword(keyword.clone(), self.keyword_fields.clone());
        }
        if let Some(id) = &self.id {
            query = query.with_id(id.clone());
        }
        query
    }
}

#[derive(Debug, Clone)]
pub struct SearchResults {
    /// Matching records, sorted and limited.
    pub hits:    Vec<Hit>,
    /// Matches before the limit was applied.
    pub matched: usize,
    /// Records read across all files.
    pub scanned: usize,
    /// Per-field tallies over all matches, when requested.
    pub stats:   Vec<(String, Vec<(String, usize)>)>,
}

// ─── SearchUseCase ────────────────────────────────────────────────────────────
pub struct SearchUseCase {
    config: SearchConfig,
    policy: Policy,
}

impl SearchUseCase {
    pub fn new(config: SearchConfig) -> Result<Self> {
        if config.files.is_empty() {
            anyhow::bail!("No input files given");
        }
        let policy = load_policy(config.policy.as_deref())?;
        Ok(Self { config, policy })
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    pub fn title_field(&self) -> &str {
        self.policy.layout().title_field()
    }

    /// Parse every configured file. A file that cannot be read is
    /// an error; blocks that do not parse are skipped.
    fn load_hits(&self) -> Result<Vec<Hit>> {
        let mut hits = Vec::new();
        for path in &self.config.files {
            let source = TextFileSource::new(path);
            let text = source.read_text()?;
            let name = source.file_name();

            let before = hits.len();
            for (position, block) in split(&text, self.policy.delimiter()).into_iter().enumerate() {
                match parse_record(position, block, self.policy.layout()) {
                    Ok(record) => hits.push(Hit::new(name.clone(), record)),
                    Err(e) => tracing::debug!("{}: skipping block: {}", name, e),
                }
            }
            tracing::info!("Loaded {} records from {}", hits.len() - before, source.label());
        }
        Ok(hits)
    }

    pub fn execute(&self) -> Result<SearchResults> {
        let all = self.load_hits()?;
        let scanned = all.len();

        let query = self.config.query();
        let mut hits = query.apply(all);
        let matched = hits.len();
        tracing::info!("{} of {} records match", matched, scanned);

        let stats = if self.config.stats {
            STAT_FIELDS
                .iter()
                .map(|field| (field.to_string(), tally(hits.iter().map(|h| &h.record), field)))
                .collect()
        } else {
            Vec::new()
        };

        if let Some(field) = &self.config.sort_by {
            sort_by_field(&mut hits, field);
        }
        if let Some(limit) = self.config.limit {
            hits.truncate(limit);
        }

        Ok(SearchResults { hits, matched, scanned, stats })
    }
}
