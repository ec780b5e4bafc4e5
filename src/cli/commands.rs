// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Defines the subcommands and all their configurable flags:
//
//   extract      print the ids of kept records; write or print their text
//   rewrite      annotate exclusions + upsert metadata in place
//   dry-run      show the rewrite as a unified diff
//   search       filter / keyword / ID lookup across files
//   check-rules  validate a policy and list its rules
//
// clap's derive macros automatically generate:
//   - help text (--help)
//   - error messages for missing args
//   - type conversion (string → PathBuf, usize, enums)
//
// Reference: Rust Book §12 (Building a CLI Program)

use clap::{Args, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::application::search_use_case::SearchConfig;
use crate::application::triage_use_case::RunConfig;
use crate::data::query::GroupKey;

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Remove excluded records and upsert metadata into the survivors
    Extract(ExtractArgs),

    /// Annotate excluded records and upsert metadata, in place
    Rewrite(RewriteArgs),

    /// Print the diff `rewrite` would apply, without writing
    DryRun(DryRunArgs),

    /// Search records by field, keyword or identifier
    Search(SearchArgs),

    /// Validate a policy and list its families and rules
    CheckRules(CheckRulesArgs),
}

/// Flags shared by extract, rewrite and dry-run.
#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Issue-list file (records separated by the policy's delimiter)
    pub input: PathBuf,

    /// Policy file (.yaml/.yml or .json); the built-in JDK policy if omitted
    #[arg(long)]
    pub policy: Option<PathBuf>,

    /// Release used for the `release` attribute
    /// (default: the version in the input file name, e.g. 21.0.6)
    #[arg(long)]
    pub release: Option<String>,

    /// Extra classification context, repeatable
    #[arg(long = "context", value_name = "KEY=VALUE", value_parser = parse_key_value)]
    pub context: Vec<(String, String)>,

    /// Skip exclusion rules; every record is classified and kept
    #[arg(long)]
    pub no_excludes: bool,

    /// Write excluded records as TSV (id, reason, title)
    #[arg(long, value_name = "PATH")]
    pub excluded_report: Option<PathBuf>,
}

impl From<RunArgs> for RunConfig {
    fn from(a: RunArgs) -> Self {
        RunConfig {
            input:            a.input,
            policy:           a.policy,
            release:          a.release,
            context:          a.context,
            apply_exclusions: !a.no_excludes,
            excluded_report:  a.excluded_report,
            ..RunConfig::default()
        }
    }
}

#[derive(Args, Debug)]
pub struct ExtractArgs {
    #[command(flatten)]
    pub run: RunArgs,

    /// Write the kept records here
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Print the kept records' text instead of their identifiers
    #[arg(long, conflicts_with = "output")]
    pub text: bool,
}

impl From<ExtractArgs> for RunConfig {
    fn from(a: ExtractArgs) -> Self {
        RunConfig {
            output: a.output,
            // extract only ever writes to a separate file
            backup: false,
            ..a.run.into()
        }
    }
}

#[derive(Args, Debug)]
pub struct RewriteArgs {
    #[command(flatten)]
    pub run: RunArgs,

    /// Write here instead of rewriting the input in place
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Do not copy the original to `<file>.bak` first
    #[arg(long)]
    pub no_backup: bool,
}

impl From<RewriteArgs> for RunConfig {
    fn from(a: RewriteArgs) -> Self {
        RunConfig {
            output: a.output,
            backup: !a.no_backup,
            ..a.run.into()
        }
    }
}

#[derive(Args, Debug)]
pub struct DryRunArgs {
    #[command(flatten)]
    pub run: RunArgs,
}

impl From<DryRunArgs> for RunConfig {
    fn from(a: DryRunArgs) -> Self {
        a.run.into()
    }
}

/// What `search --group-by` groups on.
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum GroupByArg {
    Priority,
    Type,
    Component,
    Os,
    File,
}

impl From<GroupByArg> for GroupKey {
    fn from(g: GroupByArg) -> Self {
        match g {
            GroupByArg::Priority  => GroupKey::Field("Priority".into()),
            GroupByArg::Type      => GroupKey::Field("Type".into()),
            GroupByArg::Component => GroupKey::Field("Component".into()),
            GroupByArg::Os        => GroupKey::Field("OS".into()),
            GroupByArg::File      => GroupKey::Source,
        }
    }
}

#[derive(Args, Debug)]
pub struct SearchArgs {
    /// Issue-list files to search
    #[arg(short, long = "file", num_args = 1.., required = true)]
    pub files: Vec<PathBuf>,

    /// Policy file; only its layout (delimiter, fields, ID pattern) is used
    #[arg(long)]
    pub policy: Option<PathBuf>,

    /// Issue ID, with or without prefix (JDK-8320192 or 8320192)
    #[arg(short, long)]
    pub id: Option<String>,

    /// Keyword searched in --search-fields
    #[arg(short, long)]
    pub search: Option<String>,

    /// Fields searched for the keyword (default: Title Description Component)
    #[arg(long, num_args = 1..)]
    pub search_fields: Vec<String>,

    #[arg(short, long)]
    pub priority: Option<String>,

    #[arg(short = 't', long = "type")]
    pub issue_type: Option<String>,

    #[arg(short, long)]
    pub component: Option<String>,

    #[arg(short, long)]
    pub os: Option<String>,

    /// Any other field filter, repeatable
    #[arg(long = "where", value_name = "FIELD=VALUE", value_parser = parse_key_value)]
    pub filters: Vec<(String, String)>,

    /// Sort results by a field (priorities sort P1..P5)
    #[arg(long, value_name = "FIELD")]
    pub sort_by: Option<String>,

    #[arg(short, long, value_enum)]
    pub group_by: Option<GroupByArg>,

    /// Show at most this many results
    #[arg(long)]
    pub limit: Option<usize>,

    /// Print per-field statistics of the matches
    #[arg(long)]
    pub stats: bool,

    /// Show every field and keyword context for each hit
    #[arg(short, long)]
    pub verbose: bool,
}

impl From<SearchArgs> for SearchConfig {
    fn from(a: SearchArgs) -> Self {
        let named = [
            ("Priority", a.priority),
            ("Type", a.issue_type),
            ("Component", a.component),
            ("OS", a.os),
        ];
        let mut filters: Vec<(String, String)> = named
            .into_iter()
            .filter_map(|(field, value)| value.map(|v| (field.to_string(), v)))
            .collect();
        filters.extend(a.filters);

        SearchConfig {
            files:          a.files,
            policy:         a.policy,
            filters,
            keyword:        a.search,
            keyword_fields: a.search_fields,
            id:             a.id,
            sort_by:        a.sort_by,
            group_by:       a.group_by.map(Into::into),
            limit:          a.limit,
            stats:          a.stats,
        }
    }
}

#[derive(Args, Debug)]
pub struct CheckRulesArgs {
    /// Policy file to check; the built-in policy if omitted
    #[arg(long)]
    pub policy: Option<PathBuf>,

    /// Also write the policy to this file (.yaml or .json)
    #[arg(long, value_name = "PATH")]
    pub export: Option<PathBuf>,
}

/// `key=value` → (key, value). Used for --context and --where.
pub fn parse_key_value(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{s}'"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty key in '{s}'"));
    }
    Ok((key.to_string(), value.trim().to_string()))
}
