//! Tool catalog and executor abstractions.
//!
//! Every tool the model may call is registered once in a [`ToolCatalog`]
//! and belongs to exactly one [`ToolClass`]:
//! - **exploration** tools are read-only and uncapped; they are forwarded to a
//!   [`ToolExecutor`]
//! - **recommendation** tools express an intended mutation; the loop caps and
//!   persists them itself and never forwards them
//!
//! Tools are scoped to connectors (ad platforms). A scope of `"*"` means the
//! tool applies to every connector.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::ToolError;
use crate::scope::OrgScope;

/// Scope value matching every connector.
pub const ANY_SCOPE: &str = "*";

/// The capability class of a catalogued tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolClass {
    Exploration,
    Recommendation,
}

/// Result of classifying a tool name against the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Exploration,
    Recommendation,
    Unknown,
}

impl From<ToolClass> for Classification {
    fn from(class: ToolClass) -> Self {
        match class {
            ToolClass::Exploration => Classification::Exploration,
            ToolClass::Recommendation => Classification::Recommendation,
        }
    }
}

/// A tool definition sent to the model so it knows what it can call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSchema {
    /// The tool name
    pub name: String,

    /// Description of what the tool does
    pub description: String,

    /// JSON Schema describing the tool's input
    pub input_schema: serde_json::Value,

    /// Capability class
    pub class: ToolClass,

    /// Connectors this tool applies to
    #[serde(default = "any_scope")]
    pub scopes: Vec<String>,
}

fn any_scope() -> Vec<String> {
    vec![ANY_SCOPE.to_string()]
}

impl ToolSchema {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: serde_json::Value,
        class: ToolClass,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema,
            class,
            scopes: any_scope(),
        }
    }

    /// Restrict this tool to the given connectors.
    pub fn scoped<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scopes = scopes.into_iter().map(Into::into).collect();
        self
    }

    /// Whether this tool applies to any of the given connectors.
    pub fn applies_to(&self, connectors: &[String]) -> bool {
        self.scopes.iter().any(|scope| {
            scope == ANY_SCOPE || connectors.iter().any(|c| c.eq_ignore_ascii_case(scope))
        })
    }
}

/// Which tools to advertise to the model.
#[derive(Debug, Clone)]
pub struct ManifestOptions {
    pub include_exploration: bool,
    pub include_recommendations: bool,
    /// Connected platforms; empty means every scope
    pub connectors: Vec<String>,
}

impl Default for ManifestOptions {
    fn default() -> Self {
        Self {
            include_exploration: true,
            include_recommendations: true,
            connectors: Vec::new(),
        }
    }
}

/// An immutable registry of tool schemas.
///
/// Built once at process start and shared by reference; lookups preserve
/// insertion order so the manifest is deterministic.
#[derive(Debug, Clone, Default)]
pub struct ToolCatalog {
    tools: Vec<ToolSchema>,
    index: HashMap<String, usize>,
}

impl ToolCatalog {
    /// Build a catalog. Duplicate names are rejected.
    pub fn new(tools: Vec<ToolSchema>) -> Result<Self, ToolError> {
        let mut index = HashMap::with_capacity(tools.len());
        for (i, tool) in tools.iter().enumerate() {
            if index.insert(tool.name.clone(), i).is_some() {
                return Err(ToolError::DuplicateTool(tool.name.clone()));
            }
        }
        Ok(Self { tools, index })
    }

    /// Build a catalog from the older fixed enumeration of tool names.
    ///
    /// Each tool gets a permissive object schema and the `"*"` scope.
    pub fn legacy(exploration: &[&str], recommendation: &[&str]) -> Result<Self, ToolError> {
        let permissive = serde_json::json!({ "type": "object" });
        let tools = exploration
            .iter()
            .map(|name| (name, ToolClass::Exploration))
            .chain(recommendation.iter().map(|name| (name, ToolClass::Recommendation)))
            .map(|(name, class)| ToolSchema::new(*name, *name, permissive.clone(), class))
            .collect();
        Self::new(tools)
    }

    /// Classify a tool name. Pure; unknown names are never an exploration tool.
    pub fn classify(&self, name: &str) -> Classification {
        self.get(name)
            .map(|tool| tool.class.into())
            .unwrap_or(Classification::Unknown)
    }

    /// Look up a tool by name.
    pub fn get(&self, name: &str) -> Option<&ToolSchema> {
        self.index.get(name).map(|&i| &self.tools[i])
    }

    /// The tools to send to the model, in catalog order.
    pub fn manifest(&self, options: &ManifestOptions) -> Vec<ToolSchema> {
        self.tools
            .iter()
            .filter(|tool| match tool.class {
                ToolClass::Exploration => options.include_exploration,
                ToolClass::Recommendation => options.include_recommendations,
            })
            .filter(|tool| options.connectors.is_empty() || tool.applies_to(&options.connectors))
            .cloned()
            .collect()
    }

    /// All tool names in catalog order.
    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

/// The outcome of an exploration tool execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolOutcome {
    /// Whether the tool executed successfully
    pub success: bool,

    /// Structured result data
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,

    /// Failure description when `success` is false
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolOutcome {
    pub fn ok(data: serde_json::Value) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
        }
    }
}

impl From<ToolError> for ToolOutcome {
    fn from(err: ToolError) -> Self {
        Self::failed(err.to_string())
    }
}

/// Executes exploration tools against an organization's data.
///
/// Implementations must represent every failure in the returned
/// [`ToolOutcome`]; there is no error channel.
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    /// A short name for logs (e.g., "http", "fixtures").
    fn name(&self) -> &str;

    /// Execute a tool for the given organization.
    async fn execute(
        &self,
        tool_name: &str,
        arguments: &serde_json::Value,
        org: &OrgScope,
    ) -> ToolOutcome;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_catalog() -> ToolCatalog {
        ToolCatalog::new(vec![
            ToolSchema::new("query_metrics", "Query metrics", json!({"type": "object"}), ToolClass::Exploration),
            ToolSchema::new("meta_breakdown", "Meta breakdown", json!({"type": "object"}), ToolClass::Exploration)
                .scoped(["meta"]),
            ToolSchema::new("set_budget", "Change a budget", json!({"type": "object"}), ToolClass::Recommendation),
        ])
        .unwrap()
    }

    #[test]
    fn classify_known_and_unknown() {
        let catalog = sample_catalog();
        assert_eq!(catalog.classify("query_metrics"), Classification::Exploration);
        assert_eq!(catalog.classify("set_budget"), Classification::Recommendation);
        assert_eq!(catalog.classify("drop_tables"), Classification::Unknown);
    }

    #[test]
    fn classify_is_stable() {
        let catalog = sample_catalog();
        for name in ["query_metrics", "set_budget", "nope"] {
            assert_eq!(catalog.classify(name), catalog.classify(name));
        }
    }

    #[test]
    fn duplicate_names_rejected() {
        let err = ToolCatalog::new(vec![
            ToolSchema::new("a", "", json!({}), ToolClass::Exploration),
            ToolSchema::new("a", "", json!({}), ToolClass::Recommendation),
        ])
        .unwrap_err();
        assert!(matches!(err, ToolError::DuplicateTool(name) if name == "a"));
    }

    #[test]
    fn manifest_exploration_only() {
        let catalog = sample_catalog();
        let manifest = catalog.manifest(&ManifestOptions {
            include_recommendations: false,
            ..ManifestOptions::default()
        });
        let names: Vec<_> = manifest.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["query_metrics", "meta_breakdown"]);
    }

    #[test]
    fn manifest_filters_by_connector() {
        let catalog = sample_catalog();
        let manifest = catalog.manifest(&ManifestOptions {
            connectors: vec!["google_ads".into()],
            ..ManifestOptions::default()
        });
        let names: Vec<_> = manifest.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["query_metrics", "set_budget"]);

        let meta = catalog.manifest(&ManifestOptions {
            connectors: vec!["META".into()],
            ..ManifestOptions::default()
        });
        assert_eq!(meta.len(), 3);
    }

    #[test]
    fn legacy_catalog_is_unscoped() {
        let catalog = ToolCatalog::legacy(&["get_campaigns"], &["pause_entity"]).unwrap();
        assert_eq!(catalog.classify("get_campaigns"), Classification::Exploration);
        assert_eq!(catalog.classify("pause_entity"), Classification::Recommendation);
        assert!(catalog.get("get_campaigns").unwrap().applies_to(&["tiktok".into()]));
    }

    #[test]
    fn outcome_from_tool_error() {
        let outcome: ToolOutcome = ToolError::InvalidArguments("missing 'metric'".into()).into();
        assert!(!outcome.success);
        assert!(outcome.error.unwrap().contains("metric"));
    }
}
