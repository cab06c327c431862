//! Fixture executor for offline replays.
//!
//! A fixture file is a JSON object mapping tool names to the payload that
//! tool should return. A payload of the form `{"error": "..."}` is replayed
//! as a failed call.

use adpilot_core::error::ToolError;
use adpilot_core::scope::OrgScope;
use adpilot_core::tool::{ToolExecutor, ToolOutcome};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

pub struct FixtureToolExecutor {
    fixtures: HashMap<String, serde_json::Value>,
}

impl FixtureToolExecutor {
    pub fn new(fixtures: HashMap<String, serde_json::Value>) -> Self {
        Self { fixtures }
    }

    /// Load fixtures from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, ToolError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ToolError::InvalidArguments(format!("Cannot read fixtures {}: {e}", path.display()))
        })?;
        let fixtures = serde_json::from_str(&content).map_err(|e| {
            ToolError::InvalidArguments(format!("Invalid fixtures {}: {e}", path.display()))
        })?;
        Ok(Self::new(fixtures))
    }

    pub fn len(&self) -> usize {
        self.fixtures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fixtures.is_empty()
    }
}

#[async_trait]
impl ToolExecutor for FixtureToolExecutor {
    fn name(&self) -> &str {
        "fixtures"
    }

    async fn execute(
        &self,
        tool_name: &str,
        _arguments: &serde_json::Value,
        org: &OrgScope,
    ) -> ToolOutcome {
        debug!(tool = tool_name, org = %org, "Replaying fixture");
        match self.fixtures.get(tool_name) {
            Some(payload) => match payload.get("error").and_then(|e| e.as_str()) {
                Some(error) => ToolOutcome::failed(error),
                None => ToolOutcome::ok(payload.clone()),
            },
            None => ToolError::ExecutionFailed {
                tool_name: tool_name.to_string(),
                reason: "no fixture recorded".into(),
            }
            .into(),
        }
    }
}
