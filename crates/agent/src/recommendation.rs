//! Turning a recommendation tool call into a [`Recommendation`].
//!
//! The argument bag comes straight from the model. Parsing is best effort:
//! missing or mistyped fields fall back to defaults and never fail the batch.

use adpilot_core::decision::{Confidence, Recommendation};
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

/// Keys with a dedicated field; everything else is a parameter.
const RESERVED_KEYS: &[&str] = &[
    "platform",
    "entity_type",
    "entity_id",
    "entity_name",
    "parameters",
    "justification",
    "reason",
    "rationale",
    "predicted_impact",
    "confidence",
];

/// Id keys accepted when `entity_id` is absent, paired with the entity type
/// they imply.
const ID_FALLBACKS: &[(&str, &str)] = &[
    ("campaign_id", "campaign"),
    ("ad_set_id", "ad_set"),
    ("ad_id", "ad"),
];

pub fn parse_recommendation(tool_name: &str, arguments: &Value, now: DateTime<Utc>) -> Recommendation {
    let empty = Map::new();
    let bag = arguments.as_object().unwrap_or(&empty);

    let (entity_id, implied_type) = entity_id(bag);
    let entity_type = text(bag, "entity_type")
        .or(implied_type.map(String::from))
        .unwrap_or_else(|| inferred_entity_type(tool_name).to_string());
    let entity_name = text(bag, "entity_name").unwrap_or_else(|| entity_id.clone());

    let parameters = match bag.get("parameters") {
        Some(Value::Object(params)) => params.clone(),
        _ => bag
            .iter()
            .filter(|(key, _)| !RESERVED_KEYS.contains(&key.as_str()))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect(),
    };

    let justification = ["justification", "reason", "rationale"]
        .iter()
        .find_map(|key| text(bag, key))
        .unwrap_or_default();

    let confidence = bag
        .get("confidence")
        .and_then(Value::as_str)
        .and_then(Confidence::parse)
        .unwrap_or_default();

    Recommendation {
        tool_name: tool_name.to_string(),
        platform: text(bag, "platform").unwrap_or_else(|| "unknown".into()),
        entity_type,
        entity_id,
        entity_name,
        parameters,
        justification,
        predicted_impact: bag.get("predicted_impact").and_then(number),
        confidence,
        created_at: now,
    }
}

fn entity_id(bag: &Map<String, Value>) -> (String, Option<&'static str>) {
    if let Some(id) = bag.get("entity_id").and_then(id_text) {
        return (id, None);
    }
    ID_FALLBACKS
        .iter()
        .find_map(|(key, ty)| bag.get(*key).and_then(id_text).map(|id| (id, Some(*ty))))
        .unwrap_or_default()
}

fn inferred_entity_type(tool_name: &str) -> &'static str {
    match tool_name {
        "set_budget" => "campaign",
        name if name.contains("audience") => "ad_set",
        _ => "unknown",
    }
}

/// Non-blank string value.
fn text(bag: &Map<String, Value>, key: &str) -> Option<String> {
    bag.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
}

fn id_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
        _ => None,
    }
}
