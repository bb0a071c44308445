//! Source identifiers from backend location objects

use serde_json::Value;

/// Location kinds the backend may report, paired with the field holding the identifier
const LOCATION_KINDS: [(&str, &str); 5] = [
    ("s3Location", "uri"),
    ("webLocation", "url"),
    ("confluenceLocation", "url"),
    ("salesforceLocation", "url"),
    ("sharePointLocation", "url"),
];

/// Turn a `location` field into a source identifier.
///
/// The proxy normally flattens locations to a string already; structured
/// location objects are unpacked here. Unknown shapes fall back to their
/// JSON text so the passage still carries something matchable.
pub fn extract_location(location: &Value) -> String {
    match location {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        Value::Object(map) => {
            for (kind, field) in LOCATION_KINDS {
                if let Some(inner) = map.get(kind) {
                    return inner
                        .get(field)
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string();
                }
            }
            location.to_string()
        }
        other => other.to_string(),
    }
}
