// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Handles all cross-cutting concerns that don't belong in
// any specific business layer:
//
//   policy_store.rs — Policy persistence
//                     Reads YAML/JSON policies (or the built-in
//                     default) and compiles them. Can also write
//                     a policy out for editing.
//
//   file_writer.rs  — Output files
//                     Atomic in-place replacement with an
//                     optional `.bak` copy of the original.
//
//   diff.rs         — Dry-run diffs
//                     Unified diff of original vs. rewritten text.
//
//   report.rs       — Run summary and excluded-records report
//                     Counts processed/kept/excluded/flagged and
//                     writes the TSV list of excluded records.
//
// The engine (Layer 5) never does I/O; everything that touches
// the filesystem lives here.
//
// Reference: Rust Book §7 (Modules)
//            Rust Book §9 (Error Handling with anyhow)

/// Policy loading, compiling, and saving
pub mod policy_store;

/// Atomic writes and backups
pub mod file_writer;

/// Unified diffs for dry runs
pub mod diff;

/// Run summary and excluded TSV report
pub mod report;
