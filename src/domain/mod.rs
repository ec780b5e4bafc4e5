// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Plain data types and traits describing records, fields,
// canonical attributes, rules and policies.
//
// Rules for this layer:
//   - NO file I/O
//   - NO regex compilation or rule evaluation (that's Layer 5)
//   - Only structs, enums, traits and their invariants
//
// Reference: Rust Book §5 (Structs), §6 (Enums), §10 (Traits)

/// Canonical attribute declarations, sets and caller context
pub mod attributes;

/// RecordError and ConfigError
pub mod errors;

/// Recognized field names and extracted field maps
pub mod fields;

/// Serialisable policy (layout + attributes + metadata + rules)
pub mod policy;

/// A single delimiter-bounded record
pub mod record;

/// Rules, actions and evaluation verdicts
pub mod rules;

/// FieldSource and TextSource abstractions
pub mod traits;

/// Case folding used by every case-insensitive comparison.
///
/// `str::to_lowercase` follows the Unicode tables only, so the result
/// never depends on the process locale.
pub fn fold_case(text: &str) -> String {
    text.to_lowercase()
}
