// ============================================================
// Layer 2 — Triage Pipeline
// ============================================================
// Runs one corpus through every stage, record by record:
//
//   Step 1: Split at delimiter lines        (Layer 4 - data)
//   Step 2: Extract fields → Record         (Layer 4 - data)
//   Step 3: Rule families → Verdict         (Layer 5 - engine)
//   Step 4: Classify survivors              (Layer 5 - engine)
//   Step 5: Upsert metadata / annotation    (Layer 5 - engine)
//   Step 6: Reassemble the output text
//
// Two entry points share steps 1-5:
//
//   extract — excluded records are dropped from the output
//   rewrite — excluded records stay, annotated `Excluded: <reason>`,
//             and everything outside the records is kept byte-for-byte
//
// A per-record error never stops the run: the record is passed
// through unmodified and listed in the summary.
//
// Reference: Rust Book §13 (Iterators and Closures)

use crate::data::extractor::parse_record;
use crate::data::splitter::{join, SplitDocument};
use crate::domain::attributes::{CanonicalAttributeSet, ClassificationContext};
use crate::domain::errors::RecordError;
use crate::domain::record::{record_label, Record};
use crate::domain::rules::{Exclusion, Verdict};
use crate::engine::classifier::classify;
use crate::engine::policy::Policy;
use crate::engine::rule_engine::evaluate_families;
use crate::infra::report::{ExcludedEntry, RunSummary};

/// What happened to one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordOutcome {
    /// Position among the non-empty blocks (0-based).
    pub position:   usize,
    pub label:      String,
    pub title:      String,
    pub exclusion:  Option<Exclusion>,
    pub attributes: Option<CanonicalAttributeSet>,
    pub error:      Option<RecordError>,
    /// Text to emit for this record.
    pub text:       String,
}

impl RecordOutcome {
    pub fn is_excluded(&self) -> bool {
        self.exclusion.is_some()
    }

    pub fn is_flagged(&self) -> bool {
        self.error.is_some()
    }

    pub fn is_kept(&self) -> bool {
        !self.is_excluded() && !self.is_flagged()
    }
}

/// Result of one pipeline run over one corpus.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub text:     String,
    pub outcomes: Vec<RecordOutcome>,
    pub summary:  RunSummary,
}

impl PipelineOutput {
    /// Labels of records that were kept (neither excluded nor
    /// flagged), in input order.
    pub fn kept_labels(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|o| o.is_kept())
            .map(|o| o.label.as_str())
            .collect()
    }

    pub fn excluded_labels(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|o| o.is_excluded())
            .map(|o| o.label.as_str())
            .collect()
    }

    pub fn excluded_entries(&self) -> Vec<ExcludedEntry> {
        self.outcomes
            .iter()
            .filter_map(|o| {
                o.exclusion.as_ref().map(|e| ExcludedEntry {
                    id:     o.label.clone(),
                    reason: e.reason.clone(),
                    title:  o.title.clone(),
                })
            })
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Extract,
    Rewrite,
}

/// Borrowed view of a compiled policy plus run options. Cheap to
/// build; several pipelines may share one Policy across threads.
#[derive(Debug, Clone)]
pub struct Pipeline<'p> {
    policy:           &'p Policy,
    context:          ClassificationContext,
    apply_exclusions: bool,
}

impl<'p> Pipeline<'p> {
    pub fn new(policy: &'p Policy, context: ClassificationContext) -> Self {
        Self { policy, context, apply_exclusions: true }
    }

    /// With `false`, exclusion rules are skipped and every record
    /// is classified.
    pub fn with_exclusions(mut self, apply: bool) -> Self {
        self.apply_exclusions = apply;
        self
    }

    /// Excluded records are omitted from the output.
    pub fn extract(&self, text: &str) -> PipelineOutput {
        let blocks: Vec<&str> = SplitDocument::parse(text, self.policy.delimiter())
            .blocks()
            .into_iter()
            .map(|(_, block)| block)
            .collect();
        let outcomes = self.process_all(&blocks, Mode::Extract);

        let emitted: Vec<&str> = outcomes
            .iter()
            .filter(|o| !o.is_excluded())
            .map(|o| o.text.as_str())
            .collect();
        let text = join(&emitted, self.policy.delimiter());

        let summary = summarize(&outcomes);
        tracing::info!("extract: {}", summary);
        PipelineOutput { text, outcomes, summary }
    }

    /// Every record is kept; excluded ones carry an annotation.
    /// Text outside the records is reproduced byte-for-byte.
    pub fn rewrite(&self, text: &str) -> PipelineOutput {
        let doc = SplitDocument::parse(text, self.policy.delimiter());
        let blocks: Vec<&str> = doc.blocks().into_iter().map(|(_, block)| block).collect();
        let outcomes = self.process_all(&blocks, Mode::Rewrite);

        let mut rewritten = outcomes.iter().map(|o| o.text.clone());
        let text = doc.reassemble(|_, block| rewritten.next().unwrap_or_else(|| block.to_string()));

        let summary = summarize(&outcomes);
        tracing::info!("rewrite: {}", summary);
        PipelineOutput { text, outcomes, summary }
    }

    fn process_all(&self, blocks: &[&str], mode: Mode) -> Vec<RecordOutcome> {
        blocks
            .iter()
            .enumerate()
            .map(|(position, block)| self.process(position, block, mode))
            .collect()
    }

    fn process(&self, position: usize, block: &str, mode: Mode) -> RecordOutcome {
        let record = match parse_record(position, block, self.policy.layout()) {
            Ok(record) => record,
            Err(error) => return flagged(position, None, "", block, error),
        };
        let label = record.label();
        let title = record.display_title(self.policy.layout().title_field()).to_string();
        let upserter = self.policy.upserter();

        match evaluate_families(&record, self.policy.families(), self.apply_exclusions) {
            Verdict::Excluded(exclusion) => {
                tracing::debug!("{} excluded by '{}': {}", label, exclusion.rule_id, exclusion.reason);
                let (text, error) = match mode {
                    Mode::Extract => (block.to_string(), None),
                    Mode::Rewrite => match upserter.annotate(block, &exclusion.reason) {
                        Ok(text) => (text, None),
                        Err(error) => (block.to_string(), Some(error)),
                    },
                };
                RecordOutcome {
                    position,
                    label,
                    title,
                    exclusion: Some(exclusion),
                    attributes: None,
                    error,
                    text,
                }
            }
            Verdict::Classified(derivations) => {
                let schema = self.policy.attributes();
                let attributes = match classify(&record, &derivations, &self.context, schema)
                    .and_then(|attributes| attributes.validate(schema).map(|()| attributes))
                {
                    Ok(attributes) => attributes,
                    Err(error) => return flagged(position, Some(&record), &title, block, error),
                };
                match upserter.upsert(record.raw_text(), &attributes) {
                    Ok(text) => RecordOutcome {
                        position,
                        label,
                        title,
                        exclusion: None,
                        attributes: Some(attributes),
                        error: None,
                        text,
                    },
                    Err(error) => {
                        let mut outcome = flagged(position, Some(&record), &title, block, error);
                        outcome.attributes = Some(attributes);
                        outcome
                    }
                }
            }
        }
    }
}

fn flagged(
    position: usize,
    record:   Option<&Record>,
    title:    &str,
    block:    &str,
    error:    RecordError,
) -> RecordOutcome {
    let label = record_label(position, record.and_then(Record::identifier));
    tracing::warn!("{} flagged ({}): {}", label, error.kind(), error);
    RecordOutcome {
        position,
        label,
        title: title.to_string(),
        exclusion: None,
        attributes: None,
        error: Some(error),
        text: block.to_string(),
    }
}

fn summarize(outcomes: &[RecordOutcome]) -> RunSummary {
    let mut summary = RunSummary { processed: outcomes.len(), ..Default::default() };
    for outcome in outcomes {
        if outcome.is_excluded() {
            summary.excluded += 1;
        }
        if outcome.is_kept() {
            summary.kept += 1;
        }
        if let Some(error) = &outcome.error {
            summary.flag(outcome.label.clone(), error);
        }
    }
    summary
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::splitter::split;
    use crate::domain::attributes::{AttributeSpec, UNKNOWN};
    use crate::domain::policy::PolicySpec;
    use crate::domain::rules::{Matcher, RuleFamily, RuleSpec};
    use crate::infra::policy_store::load_policy;

    const SCENARIO: &str = "\
Title: Sample
Type: Enhancement
OS: linux
Description: adds option
-----
Title: Sample2
Type: Bug
OS: windows_11
Description: fixes crash
-----
Title: Sample3
Type: Bug
OS: generic
Description: changes default timeout behavior
";

    fn scenario_spec(families: Vec<RuleFamily>) -> PolicySpec {
        let mut spec = PolicySpec::new("scenario")
            .with_attribute(AttributeSpec::new("priority").from_field("Priority").with_domain(["P1", "P2", "P3", "P4", "P5"]))
            .with_attribute(AttributeSpec::new("type").from_field("Type").with_domain(["Bug", "Enhancement"]))
            .with_attribute(AttributeSpec::new("component").from_field("Component"))
            .with_metadata_line("Priority", "priority")
            .with_metadata_line("Type", "type")
            .with_metadata_line("Component", "component");
        spec.families = families;
        spec
    }

    fn scenario_rules() -> Vec<RuleSpec> {
        vec![
            RuleSpec::exclude("not-bug", ["Type"], Matcher::Equals { value: "Bug".into() })
                .negated()
                .with_reason("type '{value}'"),
            RuleSpec::exclude("crash-or-hang", ["Description"], Matcher::Pattern { regex: r"\b(crash|hang)\b".into() }),
        ]
    }

    fn scenario_policy() -> Policy {
        Policy::compile(scenario_spec(vec![RuleFamily::new("exclusions", scenario_rules())])).unwrap()
    }

    #[test]
    fn test_example_scenario_extract() {
        let policy = scenario_policy();
        let out = Pipeline::new(&policy, ClassificationContext::new()).extract(SCENARIO);

        let excluded: Vec<_> = out
            .outcomes
            .iter()
            .filter_map(|o| o.exclusion.as_ref().map(|e| e.rule_id.as_str()))
            .collect();
        assert_eq!(excluded, vec!["not-bug", "crash-or-hang"]);
        assert_eq!(
            out.text,
            "Title: Sample3\nPriority: unknown\nType: Bug\nComponent: unknown\nOS: generic\nDescription: changes default timeout behavior\n"
        );
        assert_eq!((out.summary.processed, out.summary.kept, out.summary.excluded), (3, 1, 2));
        assert!(!out.summary.has_flagged());
    }

    #[test]
    fn test_example_scenario_rewrite_annotates_exclusions() {
        let policy = scenario_policy();
        let out = Pipeline::new(&policy, ClassificationContext::new()).rewrite(SCENARIO);

        let blocks = split(&out.text, "-----");
        assert_eq!(blocks.len(), 3);
        assert!(blocks[0].starts_with("Title: Sample\nExcluded: type 'Enhancement'\n"));
        assert!(blocks[1].starts_with("Title: Sample2\nExcluded: crash-or-hang\n"));
        assert!(blocks[2].starts_with("Title: Sample3\nPriority: unknown\nType: Bug\nComponent: unknown\n"));
    }

    #[test]
    fn test_rewrite_is_idempotent() {
        let policy = load_policy(None).unwrap();
        let ctx = ClassificationContext::new().with("release", "21.0.6");
        let pipeline = Pipeline::new(&policy, ctx);

        let once = pipeline.rewrite(SCENARIO).text;
        let twice = pipeline.rewrite(&once).text;
        assert_eq!(once, twice);

        let extracted = pipeline.extract(SCENARIO).text;
        assert_eq!(pipeline.extract(&extracted).text, extracted);
    }

    #[test]
    fn test_metadata_key_in_description_does_not_hide_text_from_rules() {
        let policy = load_policy(None).unwrap();
        let text = "Title: [JDK-5] Fix lookup\nType: Bug\nOS: windows\nDescription: see notes\nImpact: minor\nthe JVM may crash on exit\n";
        let out = Pipeline::new(&policy, ClassificationContext::new()).extract(text);
        let rule = out.outcomes[0].exclusion.as_ref().map(|e| e.rule_id.as_str());
        assert_eq!(rule, Some("jvm-stability"));
        assert_eq!(out.summary.kept, 0);
    }

    #[test]
    fn test_rewrite_with_multi_line_title_is_idempotent() {
        let policy = load_policy(None).unwrap();
        let pipeline = Pipeline::new(&policy, ClassificationContext::new());
        let text = "Title: [JDK-6] Wrong alias picked\nregression in keystore lookup\nType: Bug\nOS: windows\nDescription: the lookup picks the wrong alias\n";

        let once = pipeline.rewrite(text).text;
        assert!(once.starts_with("Title: [JDK-6] Wrong alias picked\nregression in keystore lookup\nPriority: unknown\n"));
        assert!(once.contains("Feature-Area: security\n"));
        assert!(once.contains("Status: regression\n"));
        assert_eq!(once.matches("Type: ").count(), 1);

        let twice = pipeline.rewrite(&once).text;
        assert_eq!(once, twice);
    }

    #[test]
    fn test_unmodified_rewrite_round_trips_bytes() {
        // no metadata lines and no rules → nothing to change
        let policy = Policy::compile(PolicySpec::new("noop")).unwrap();
        let text = "\n-----\nTitle: A\r\nbody\r\n-----\n\n-----\nTitle: B";
        let out = Pipeline::new(&policy, ClassificationContext::new()).rewrite(text);
        assert_eq!(out.text, text);
        assert_eq!(out.summary.processed, 2);
    }

    #[test]
    fn test_rule_order_changes_results() {
        let forward = scenario_policy();
        let mut reversed_rules = scenario_rules();
        reversed_rules.reverse();
        let reversed = Policy::compile(scenario_spec(vec![RuleFamily::new("exclusions", reversed_rules)])).unwrap();

        // Enhancement that also mentions a crash: whichever rule runs first wins
        let text = "Title: X\nType: Enhancement\nDescription: avoid crash\n";
        let first = |policy: &Policy| {
            Pipeline::new(policy, ClassificationContext::new()).extract(text).outcomes[0]
                .exclusion
                .clone()
                .map(|e| e.rule_id)
        };
        assert_eq!(first(&forward).as_deref(), Some("not-bug"));
        assert_eq!(first(&reversed).as_deref(), Some("crash-or-hang"));
    }

    #[test]
    fn test_classified_records_are_complete() {
        let policy = load_policy(None).unwrap();
        let out = Pipeline::new(&policy, ClassificationContext::new())
            .with_exclusions(false)
            .extract(SCENARIO);

        assert_eq!(out.summary.kept, 3);
        for outcome in &out.outcomes {
            let attrs = outcome.attributes.as_ref().unwrap();
            assert_eq!(attrs.len(), policy.attributes().len());
            assert!(attrs.validate(policy.attributes()).is_ok());
        }
        assert_eq!(out.outcomes[0].attributes.as_ref().unwrap().get("release"), Some(UNKNOWN));
    }

    #[test]
    fn test_exclusion_is_deterministic() {
        let policy = load_policy(None).unwrap();
        let pipeline = Pipeline::new(&policy, ClassificationContext::new());
        let a = pipeline.extract(SCENARIO);
        let b = pipeline.extract(SCENARIO);
        assert_eq!(a.excluded_labels(), b.excluded_labels());
        assert_eq!(a.text, b.text);
    }

    #[test]
    fn test_per_record_errors_do_not_stop_the_run() {
        let policy = scenario_policy();
        let text = "just prose\n-----\nDescription: no title here\nType: Bug\n-----\nTitle: [JDK-9] ok\nType: Bug\n-----\nTitle: bad\nType: Bug\nPriority: P9\n";
        let out = Pipeline::new(&policy, ClassificationContext::new()).rewrite(text);

        let kinds: Vec<_> = out.summary.flagged.iter().map(|f| f.kind).collect();
        assert_eq!(kinds, vec!["structural-parse", "anchor-not-found", "domain-violation"]);
        assert_eq!(out.summary.kept, 1);
        assert_eq!(out.kept_labels(), vec!["JDK-9"]);
        // flagged records pass through untouched
        assert!(out.text.starts_with("just prose\n-----\nDescription: no title here\nType: Bug\n-----\n"));
    }

    #[test]
    fn test_excluded_entries_for_report() {
        let policy = scenario_policy();
        let out = Pipeline::new(&policy, ClassificationContext::new()).extract(SCENARIO);
        let entries = out.excluded_entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].id, "#1");
        assert_eq!(entries[0].reason, "type 'Enhancement'");
        assert_eq!(entries[0].title, "Sample");
    }

    #[test]
    fn test_policy_can_be_shared_across_threads() {
        let policy = load_policy(None).unwrap();
        let inputs = [SCENARIO, "Title: [JDK-1] Lone\nType: Bug\nOS: windows\n"];

        let results: Vec<String> = std::thread::scope(|scope| {
            let handles: Vec<_> = inputs
                .iter()
                .map(|text| {
                    let policy = &policy;
                    scope.spawn(move || Pipeline::new(policy, ClassificationContext::new()).rewrite(text).text)
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        let pipeline = Pipeline::new(&policy, ClassificationContext::new());
        assert_eq!(results[0], pipeline.rewrite(inputs[0]).text);
        assert_eq!(results[1], pipeline.rewrite(inputs[1]).text);
    }
}
