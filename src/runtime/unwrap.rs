/// Result unwrapping between node outputs and input slots
///
/// Scalar outputs pass through unchanged. Structured outputs are narrowed to
/// the field named by the edge's source slot, or to the first conventional
/// field present, so single-output and multi-output node types can be wired
/// together without per-type knowledge.

use serde_json::{Map, Value};

/// Conventional field names, in priority order
pub const FALLBACK_FIELDS: [&str; 4] = ["value", "response", "text", "output"];

/// Normalize a settled value into what an inbound slot expects
pub fn unwrap_slot(settled: &Value, source_slot: &str) -> Value {
    match settled {
        Value::Object(record) => record
            .get(source_slot)
            .or_else(|| representative(record))
            .unwrap_or(settled)
            .clone(),
        scalar => scalar.clone(),
    }
}

/// The field that stands for a structured record as a whole
pub fn representative(record: &Map<String, Value>) -> Option<&Value> {
    FALLBACK_FIELDS.iter().find_map(|field| record.get(*field))
}

/// Text shown on an edge for a value
pub fn display_label(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
