// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// This is the entry point for all user interaction.
// It uses the `clap` crate to parse command line arguments.
// All business logic is delegated to Layer 2 (application).
//
// Output conventions:
//   stdout — the product (records, identifiers, diffs, hits)
//   stderr — the run summary (processed / kept / excluded / flagged)
//
// Exit status: 0 on success, 2 when any record was flagged.
// A malformed policy or unreadable file is an error (status 1).
//
// Reference: Rust Book §7 (Modules), §12 (CLI programs)

pub mod commands;

use anyhow::Result;
use clap::Parser;
use std::process::ExitCode;

use crate::application::pipeline::PipelineOutput;
use crate::application::rules_use_case::{PolicyOverview, RulesUseCase};
use crate::application::search_use_case::{SearchConfig, SearchResults, SearchUseCase};
use crate::application::triage_use_case::{TriageReport, TriageUseCase};
use crate::data::query::{group_by, keyword_context, Hit, UNSPECIFIED};
use crate::domain::traits::FieldSource;
use commands::{CheckRulesArgs, Commands, DryRunArgs, ExtractArgs, RewriteArgs, SearchArgs};

/// Exit status when the run finished but some records were flagged.
pub const FLAGGED_EXIT: u8 = 2;

/// Characters of description shown for an ID lookup in verbose mode.
const DESCRIPTION_PREVIEW: usize = 500;

#[derive(Parser, Debug)]
#[command(
    name = "issue-triage",
    version,
    about = "Classify, filter and annotate delimiter-separated issue records."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Match on the subcommand and dispatch to the correct use case.
    pub fn run(self) -> Result<ExitCode> {
        match self.command {
            Commands::Extract(args)    => run_extract(args),
            Commands::Rewrite(args)    => run_rewrite(args),
            Commands::DryRun(args)     => run_dry_run(args),
            Commands::Search(args)     => run_search(args),
            Commands::CheckRules(args) => run_check_rules(args),
        }
    }
}

fn exit_for(output: &PipelineOutput) -> ExitCode {
    eprintln!("{}", output.summary);
    if output.summary.has_flagged() {
        ExitCode::from(FLAGGED_EXIT)
    } else {
        ExitCode::SUCCESS
    }
}

fn run_extract(args: ExtractArgs) -> Result<ExitCode> {
    let print_text = args.text;
    let use_case = TriageUseCase::new(args.into())?;
    let TriageReport { output, written, .. } = use_case.extract()?;

    if print_text {
        print!("{}", output.text);
    } else {
        for label in output.kept_labels() {
            println!("{label}");
        }
    }
    if let Some(path) = &written {
        eprintln!("Wrote {}", path.display());
    }
    Ok(exit_for(&output))
}

fn run_rewrite(args: RewriteArgs) -> Result<ExitCode> {
    let use_case = TriageUseCase::new(args.into())?;
    let TriageReport { output, written, .. } = use_case.rewrite()?;
    match &written {
        Some(path) => eprintln!("Wrote {}", path.display()),
        None => eprintln!("Nothing to change"),
    }
    Ok(exit_for(&output))
}

fn run_dry_run(args: DryRunArgs) -> Result<ExitCode> {
    let use_case = TriageUseCase::new(args.into())?;
    let TriageReport { output, diff, .. } = use_case.dry_run()?;
    match diff.as_deref() {
        Some("") | None => eprintln!("No changes"),
        Some(diff) => print!("{diff}"),
    }
    Ok(exit_for(&output))
}

fn run_check_rules(args: CheckRulesArgs) -> Result<ExitCode> {
    let use_case = RulesUseCase::new(args.policy);
    let overview = match &args.export {
        Some(dest) => use_case.export(dest)?,
        None => use_case.check()?,
    };
    print_overview(&overview);
    if let Some(dest) = &args.export {
        eprintln!("Exported to {}", dest.display());
    }
    Ok(ExitCode::SUCCESS)
}

fn print_overview(overview: &PolicyOverview) {
    println!("Policy: {} (OK)", overview.name);
    println!("  delimiter: {}", overview.delimiter);
    println!("  metadata under '{}': {}", overview.anchor, overview.metadata_keys.join(", "));
    println!("\nAttributes:");
    for attr in &overview.attributes {
        let domain = attr
            .domain
            .as_ref()
            .map_or_else(|| "(open)".to_string(), |d| d.join(" | "));
        let source = match (&attr.from_field, &attr.context) {
            (Some(field), _) => format!(" ← field {field}"),
            (None, Some(key)) => format!(" ← context {key}"),
            (None, None) => String::new(),
        };
        println!("  {}{}: {}", attr.name, source, domain);
    }
    println!("\nFamilies ({} rules):", overview.rule_count());
    for (i, family) in overview.families.iter().enumerate() {
        let sets = if family.attributes.is_empty() {
            String::new()
        } else {
            format!(" → {}", family.attributes.join(", "))
        };
        println!("  {}. {}{}", i + 1, family.name, sets);
        for rule in &family.rules {
            println!("       - {rule}");
        }
    }
}

fn run_search(args: SearchArgs) -> Result<ExitCode> {
    let verbose = args.verbose;
    let config: SearchConfig = args.into();
    let use_case = SearchUseCase::new(config)?;
    let results = use_case.execute()?;
    let config = use_case.config();
    let title_field = use_case.title_field();

    if config.stats {
        print_stats(&results);
    }

    match &config.group_by {
        Some(key) => {
            for (name, hits) in group_by(&results.hits, key) {
                println!("\n== {} ({}) ==", name, hits.len());
                for (i, hit) in hits.iter().enumerate() {
                    print_hit(i, hit, title_field, config, verbose);
                }
            }
        }
        None => {
            for (i, hit) in results.hits.iter().enumerate() {
                print_hit(i, hit, title_field, config, verbose);
            }
        }
    }

    if results.hits.len() < results.matched {
        eprintln!("\nTotal: {} (showing {})", results.matched, results.hits.len());
    } else {
        eprintln!("\nTotal: {}", results.matched);
    }
    Ok(ExitCode::SUCCESS)
}

fn print_stats(results: &SearchResults) {
    println!("Records: {} matched of {} scanned", results.matched, results.scanned);
    for (field, counts) in &results.stats {
        println!("\n{field}:");
        for (value, count) in counts {
            println!("  {value}: {count}");
        }
    }
    println!();
}

fn print_hit(index: usize, hit: &Hit, title_field: &str, config: &SearchConfig, verbose: bool) {
    let record = &hit.record;
    let title = record.non_empty(title_field).unwrap_or(UNSPECIFIED);
    if !verbose {
        println!("  - {}  {}", record.label(), title);
        return;
    }

    println!("\n{}. {}  [{}]", index + 1, title, hit.source);
    for (name, value) in record.fields().iter() {
        if name == title_field || name == "Description" {
            continue;
        }
        println!("   {name}: {value}");
    }

    let Some(description) = record.non_empty("Description") else {
        return;
    };
    if let Some(keyword) = &config.keyword {
        if let Some(snippet) = keyword_context(description, keyword, 60, 80) {
            println!("   Context: ...{snippet}...");
        }
    } else if config.id.is_some() {
        let preview: String = description.chars().take(DESCRIPTION_PREVIEW).collect();
        println!("\n{preview}");
        let rest = description.chars().count().saturating_sub(DESCRIPTION_PREVIEW);
        if rest > 0 {
            println!("... ({rest} more characters)");
        }
    }
}
