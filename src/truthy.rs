//! Coercion of loosely-typed boolean flags.
//!
//! Engaged-lead stage flags arrive through several ingestion paths (CSV
//! imports, enrichment webhooks, manual sheet edits) and show up as booleans,
//! numbers, or strings depending on the path. Every flag read in the crate
//! goes through [`parse_truthy`] so the coercion policy lives in one place.

use serde_json::Value;

/// Interpret a persisted boolean-like value.
///
/// Truthy forms: `true`, any non-zero number, and the case-insensitive
/// strings `"1"`, `"true"`, `"yes"`, `"y"`. Everything else (null, empty
/// string, unrecognized text, zero) is false.
pub fn parse_truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                i != 0
            } else {
                n.as_f64().map(|f| f != 0.0).unwrap_or(false)
            }
        }
        Value::String(s) => {
            matches!(s.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "y")
        }
        _ => false,
    }
}
