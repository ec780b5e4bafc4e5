// ============================================================
// Layer 2 — Application / Use Cases
// ============================================================
// This layer orchestrates all the other layers to accomplish
// a specific goal (triaging a file, searching, checking rules).
//
// Rules for this layer:
//   - No rule evaluation or parsing code here
//   - No UI or printing here (that's Layer 1)
//   - No direct file access (that's Layer 4 and 6)
//   - Only workflow coordination
//
// Reference: Clean Architecture pattern
//            Rust Book §7 (Module System)

// Split → extract → rules → classify → upsert, for one corpus
pub mod pipeline;

// extract / rewrite / dry-run over a file
pub mod triage_use_case;

// Multi-file search, tallies and grouping
pub mod search_use_case;

// Policy validation and export
pub mod rules_use_case;
