// ============================================================
// Layer 5 — Classification Engine
// ============================================================
// Everything that decides what happens to a record lives here.
// The layer is pure: no file I/O, no clocks, no randomness.
// The same policy and the same input always give the same output.
//
// What's in this layer:
//
//   policy.rs      — PolicySpec → Policy compilation
//                    All ConfigErrors are raised here, before
//                    any record is processed
//
//   rule_engine.rs — Ordered rule families
//                    Exclusion (first match wins) and attribute
//                    derivation (first setter wins)
//
//   classifier.rs  — Derivations + fields + context
//                    → one value for every declared attribute
//
//   upserter.rs    — Idempotent insert/replace of the metadata
//                    block inside the record's own text
//
// Reference: Rust Book §6 (Enums and Pattern Matching)
//            Rust Book §16 (Send and Sync)

/// PolicySpec → immutable, shareable Policy
pub mod policy;

/// Rule families: exclusion and attribute derivation
pub mod rule_engine;

/// Canonical attribute assignment
pub mod classifier;

/// Metadata block insert/replace
pub mod upserter;
