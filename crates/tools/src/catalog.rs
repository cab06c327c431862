//! The built-in tool catalog.
//!
//! Exploration tools marked `"*"` work against every connector; the rest are
//! scoped to the platform whose API exposes the underlying data.

use adpilot_core::error::ToolError;
use adpilot_core::tool::{ToolCatalog, ToolClass, ToolSchema};
use serde_json::{json, Value};

/// Connector identifiers understood by the built-in catalog.
pub const CONNECTORS: &[&str] = &["meta", "google_ads", "tiktok"];

/// Build the default scoped catalog.
pub fn default_catalog() -> Result<ToolCatalog, ToolError> {
    let mut tools = exploration_tools();
    tools.extend(recommendation_tools());
    ToolCatalog::new(tools)
}

fn date_range() -> Value {
    json!({
        "type": "object",
        "description": "Inclusive ISO-8601 date range",
        "properties": {
            "start": { "type": "string", "format": "date" },
            "end": { "type": "string", "format": "date" }
        },
        "required": ["start", "end"]
    })
}

fn exploration_tools() -> Vec<ToolSchema> {
    vec![
        ToolSchema::new(
            "query_metrics",
            "Query aggregated performance metrics (spend, impressions, clicks, conversions, \
             revenue, ROAS, CPA) for a platform, optionally grouped by campaign or ad set.",
            json!({
                "type": "object",
                "properties": {
                    "platform": { "type": "string", "description": "Connector to query" },
                    "metrics": {
                        "type": "array",
                        "items": { "type": "string" },
                        "description": "Metric names, e.g. [\"spend\", \"roas\"]"
                    },
                    "group_by": {
                        "type": "string",
                        "enum": ["platform", "campaign", "ad_set", "ad", "day"]
                    },
                    "date_range": date_range(),
                    "limit": { "type": "integer", "default": 50 }
                },
                "required": ["metrics", "date_range"]
            }),
            ToolClass::Exploration,
        ),
        ToolSchema::new(
            "compare_periods",
            "Compare metrics between two date ranges and report absolute and relative change.",
            json!({
                "type": "object",
                "properties": {
                    "platform": { "type": "string" },
                    "metrics": { "type": "array", "items": { "type": "string" } },
                    "current": date_range(),
                    "previous": date_range(),
                    "group_by": { "type": "string", "enum": ["platform", "campaign", "ad_set"] }
                },
                "required": ["metrics", "current", "previous"]
            }),
            ToolClass::Exploration,
        ),
        ToolSchema::new(
            "list_campaigns",
            "List campaigns with status, objective and current daily budget.",
            json!({
                "type": "object",
                "properties": {
                    "platform": { "type": "string" },
                    "status": { "type": "string", "enum": ["active", "paused", "all"], "default": "active" }
                }
            }),
            ToolClass::Exploration,
        ),
        ToolSchema::new(
            "get_campaign_details",
            "Fetch configuration and recent performance for one campaign, including its ad sets.",
            json!({
                "type": "object",
                "properties": {
                    "platform": { "type": "string" },
                    "campaign_id": { "type": "string" }
                },
                "required": ["platform", "campaign_id"]
            }),
            ToolClass::Exploration,
        ),
        ToolSchema::new(
            "meta_audience_breakdown",
            "Break down Meta ad set performance by age, gender, placement or region.",
            json!({
                "type": "object",
                "properties": {
                    "ad_set_id": { "type": "string" },
                    "dimension": { "type": "string", "enum": ["age", "gender", "placement", "region"] },
                    "date_range": date_range()
                },
                "required": ["dimension", "date_range"]
            }),
            ToolClass::Exploration,
        )
        .scoped(["meta"]),
        ToolSchema::new(
            "google_search_terms",
            "List Google Ads search terms that triggered ads, with cost and conversions.",
            json!({
                "type": "object",
                "properties": {
                    "campaign_id": { "type": "string" },
                    "date_range": date_range(),
                    "min_cost": { "type": "number" }
                },
                "required": ["date_range"]
            }),
            ToolClass::Exploration,
        )
        .scoped(["google_ads"]),
        ToolSchema::new(
            "tiktok_creative_performance",
            "Rank TikTok creatives by watch time, CTR and conversions.",
            json!({
                "type": "object",
                "properties": {
                    "campaign_id": { "type": "string" },
                    "date_range": date_range(),
                    "limit": { "type": "integer", "default": 20 }
                },
                "required": ["date_range"]
            }),
            ToolClass::Exploration,
        )
        .scoped(["tiktok"]),
    ]
}

/// Fields every recommendation tool accepts, plus tool-specific parameters.
fn recommendation_schema(parameters: Value, required_parameters: &[&str]) -> Value {
    json!({
        "type": "object",
        "properties": {
            "platform": { "type": "string", "description": "Connector the entity lives on" },
            "entity_type": { "type": "string", "enum": ["campaign", "ad_set", "ad"] },
            "entity_id": { "type": "string" },
            "entity_name": { "type": "string" },
            "parameters": {
                "type": "object",
                "properties": parameters,
                "required": required_parameters
            },
            "justification": {
                "type": "string",
                "description": "Evidence from exploration that supports this action"
            },
            "predicted_impact": {
                "type": "number",
                "description": "Expected change in weekly revenue, in account currency"
            },
            "confidence": { "type": "string", "enum": ["low", "medium", "high"] }
        },
        "required": ["platform", "entity_id", "justification"]
    })
}

fn recommendation_tools() -> Vec<ToolSchema> {
    vec![
        ToolSchema::new(
            "set_budget",
            "Recommend a new daily budget for a campaign or ad set.",
            recommendation_schema(
                json!({
                    "new_daily_budget": { "type": "number" },
                    "current_daily_budget": { "type": "number" }
                }),
                &["new_daily_budget"],
            ),
            ToolClass::Recommendation,
        ),
        ToolSchema::new(
            "pause_entity",
            "Recommend pausing a campaign, ad set or ad.",
            recommendation_schema(json!({}), &[]),
            ToolClass::Recommendation,
        ),
        ToolSchema::new(
            "enable_entity",
            "Recommend re-enabling a paused campaign, ad set or ad.",
            recommendation_schema(json!({}), &[]),
            ToolClass::Recommendation,
        ),
        ToolSchema::new(
            "update_audience",
            "Recommend audience targeting changes for an ad set.",
            recommendation_schema(
                json!({
                    "add": { "type": "array", "items": { "type": "string" } },
                    "remove": { "type": "array", "items": { "type": "string" } },
                    "age_min": { "type": "integer" },
                    "age_max": { "type": "integer" }
                }),
                &[],
            ),
            ToolClass::Recommendation,
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use adpilot_core::tool::{Classification, ManifestOptions};

    #[test]
    fn default_catalog_builds() {
        let catalog = default_catalog().unwrap();
        assert_eq!(catalog.len(), 11);
        assert_eq!(catalog.classify("query_metrics"), Classification::Exploration);
        assert_eq!(catalog.classify("set_budget"), Classification::Recommendation);
        assert_eq!(catalog.classify("update_audience"), Classification::Recommendation);
    }

    #[test]
    fn scoped_tools_follow_connectors() {
        let catalog = default_catalog().unwrap();
        let manifest = catalog.manifest(&ManifestOptions {
            connectors: vec!["meta".into()],
            ..ManifestOptions::default()
        });
        let names: Vec<_> = manifest.iter().map(|t| t.name.as_str()).collect();
        assert!(names.contains(&"meta_audience_breakdown"));
        assert!(!names.contains(&"google_search_terms"));
        assert!(!names.contains(&"tiktok_creative_performance"));
        assert!(names.contains(&"set_budget"));
    }

    #[test]
    fn every_scope_is_a_known_connector() {
        let catalog = default_catalog().unwrap();
        for name in catalog.names() {
            let tool = catalog.get(name).unwrap();
            for scope in &tool.scopes {
                assert!(scope == "*" || CONNECTORS.contains(&scope.as_str()), "{name}: {scope}");
            }
        }
    }

    #[test]
    fn recommendation_schemas_require_justification() {
        let catalog = default_catalog().unwrap();
        let budget = catalog.get("set_budget").unwrap();
        let required = budget.input_schema["required"].as_array().unwrap();
        assert!(required.iter().any(|v| v == "justification"));
        assert_eq!(
            budget.input_schema["properties"]["parameters"]["required"][0],
            "new_daily_budget"
        );
    }
}
