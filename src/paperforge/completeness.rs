//! Completeness scoring for collected research information.
//!
//! A pure function over the collected-info mapping and the fixed required
//! set; no backends, no side effects, cheap enough to run on every turn.
//! Only six of the twelve extractable fields are required; the rest are
//! collected opportunistically but never gate generation.

use serde_json::{Map, Value};

use crate::paperforge::extraction::{
    FIELD_BACKGROUND, FIELD_DATA_SOURCE, FIELD_FINDINGS, FIELD_METHOD, FIELD_OBJECTIVE,
    FIELD_TOPIC,
};

/// Fields that must be present and non-empty before generation starts.
/// Order matters: missing fields are reported in this order.
pub const REQUIRED_FIELDS: [&str; 6] = [
    FIELD_TOPIC,
    FIELD_BACKGROUND,
    FIELD_OBJECTIVE,
    FIELD_METHOD,
    FIELD_DATA_SOURCE,
    FIELD_FINDINGS,
];

/// Result of scoring a collected-info mapping.
#[derive(Clone, Debug)]
pub struct Completeness {
    pub is_complete: bool,
    /// Absent or empty required fields, in [`REQUIRED_FIELDS`] order.
    pub missing_info: Vec<String>,
    /// `(required - missing) / required`, in `[0.0, 1.0]`.
    pub completeness_rate: f64,
}

/// Score `collected_info` against the required-field set.
pub fn check_completeness(collected_info: &Map<String, Value>) -> Completeness {
    let mut missing_info = Vec::new();
    for field in REQUIRED_FIELDS.iter() {
        let present = collected_info.get(*field).map(has_content).unwrap_or(false);
        if !present {
            missing_info.push((*field).to_string());
        }
    }

    let required = REQUIRED_FIELDS.len();
    Completeness {
        is_complete: missing_info.is_empty(),
        completeness_rate: (required - missing_info.len()) as f64 / required as f64,
        missing_info,
    }
}

/// Whether a stored value counts as filled in.
fn has_content(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::String(s) => !s.trim().is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(entries) => !entries.is_empty(),
        Value::Number(_) => true,
    }
}
