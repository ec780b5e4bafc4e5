// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// This layer handles everything from a raw issue-list file
// up to typed Record values.
//
// The pipeline flows in this order:
//
//   issue-list .txt files
//       │
//       ▼
//   TextFileSource    → reads the file, infers the release
//       │
//       ▼
//   Splitter          → cuts the text at delimiter lines
//       │
//       ▼
//   Extractor         → recognized `Name: value` fields → Record
//       │
//       ▼
//   RecordQuery       → filters / keyword search for `search`
//
// Each module is responsible for exactly one step.
// The rule engine (Layer 5) picks the Records up from here.
//
// Reference: Rust Book §13 (Iterators and Closures)

/// Reads issue lists from disk
pub mod loader;

/// Cuts a corpus into delimiter-separated blocks
pub mod splitter;

/// Turns a block into recognized fields and a Record
pub mod extractor;

/// Search, tallies and grouping over parsed records
pub mod query;
