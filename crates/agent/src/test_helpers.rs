//! Shared test doubles for loop and dispatch tests.

use adpilot_core::decision::{DecisionStore, PersistedDecision, Recommendation};
use adpilot_core::error::{ModelError, StoreError};
use adpilot_core::model::{ModelClient, ModelRequest, ModelTurn, StopSignal, Usage};
use adpilot_core::scope::OrgScope;
use adpilot_core::tool::{ToolCatalog, ToolClass, ToolExecutor, ToolOutcome, ToolSchema};
use adpilot_core::transcript::{ContentItem, ToolInvocation};
use serde_json::{json, Value};
use std::collections::{HashSet, VecDeque};
use std::sync::Mutex;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// A model client that replays scripted turns in order.
///
/// Once the script is exhausted it repeats the `repeat` turn if one was
/// given, and panics otherwise.
pub struct ScriptedModelClient {
    script: Mutex<VecDeque<Result<ModelTurn, ModelError>>>,
    repeat: Option<ModelTurn>,
    requests: Mutex<Vec<ModelRequest>>,
}

impl ScriptedModelClient {
    pub fn new(turns: Vec<ModelTurn>) -> Self {
        Self::with_results(turns.into_iter().map(Ok).collect())
    }

    pub fn with_results(script: Vec<Result<ModelTurn, ModelError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            repeat: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Return `turn` forever.
    pub fn repeating(turn: ModelTurn) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            repeat: Some(turn),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<ModelRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl ModelClient for ScriptedModelClient {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn next_turn(&self, request: ModelRequest) -> Result<ModelTurn, ModelError> {
        let call = {
            let mut requests = self.requests.lock().unwrap();
            requests.push(request);
            requests.len()
        };
        let next = self.script.lock().unwrap().pop_front();
        match (next, &self.repeat) {
            (Some(result), _) => result,
            (None, Some(turn)) => Ok(turn.clone()),
            (None, None) => panic!("ScriptedModelClient: no more turns (call #{call})"),
        }
    }
}

/// A model turn with text only.
pub fn text_turn(text: &str) -> ModelTurn {
    ModelTurn {
        items: vec![ContentItem::Text { text: text.into() }],
        stop: StopSignal::EndTurn,
        usage: Some(Usage { input_tokens: 10, output_tokens: 5 }),
        model: "scripted".into(),
    }
}

/// A model turn with optional text followed by the given invocations.
pub fn tool_turn(text: &str, invocations: Vec<ToolInvocation>) -> ModelTurn {
    let mut items = Vec::new();
    if !text.is_empty() {
        items.push(ContentItem::Text { text: text.into() });
    }
    items.extend(invocations.into_iter().map(ContentItem::ToolInvocation));
    ModelTurn {
        items,
        stop: StopSignal::ToolUse,
        usage: Some(Usage { input_tokens: 20, output_tokens: 10 }),
        model: "scripted".into(),
    }
}

pub fn invocation(id: &str, name: &str, arguments: Value) -> ToolInvocation {
    ToolInvocation {
        id: id.into(),
        name: name.into(),
        arguments,
    }
}

/// A small catalog covering both classes and one scoped tool.
pub fn test_catalog() -> ToolCatalog {
    let schema = json!({ "type": "object" });
    ToolCatalog::new(vec![
        ToolSchema::new("query_metrics", "Query metrics", schema.clone(), ToolClass::Exploration),
        ToolSchema::new("compare_periods", "Compare periods", schema.clone(), ToolClass::Exploration),
        ToolSchema::new("meta_audience_breakdown", "Meta breakdown", schema.clone(), ToolClass::Exploration)
            .scoped(["meta"]),
        ToolSchema::new("set_budget", "Set budget", schema.clone(), ToolClass::Recommendation),
        ToolSchema::new("pause_entity", "Pause", schema.clone(), ToolClass::Recommendation),
        ToolSchema::new("enable_entity", "Enable", schema, ToolClass::Recommendation),
    ])
    .unwrap()
}

/// An executor that records every call and echoes the tool name back.
pub struct RecordingExecutor {
    calls: Mutex<Vec<(String, String)>>,
    failing: HashSet<String>,
    cancel_on: Option<(String, CancellationToken)>,
}

impl RecordingExecutor {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            failing: HashSet::new(),
            cancel_on: None,
        }
    }

    /// Cancel `token` while executing `tool`.
    pub fn cancelling_on(mut self, tool: &str, token: CancellationToken) -> Self {
        self.cancel_on = Some((tool.into(), token));
        self
    }

    /// Make calls to `tool` fail.
    pub fn with_failure(mut self, tool: &str) -> Self {
        self.failing.insert(tool.into());
        self
    }

    /// `(tool_name, org)` pairs in call order.
    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl ToolExecutor for RecordingExecutor {
    fn name(&self) -> &str {
        "recording"
    }

    async fn execute(&self, tool_name: &str, arguments: &Value, org: &OrgScope) -> ToolOutcome {
        self.calls
            .lock()
            .unwrap()
            .push((tool_name.to_string(), org.as_str().to_string()));
        if let Some((tool, token)) = &self.cancel_on {
            if tool == tool_name {
                token.cancel();
            }
        }
        if self.failing.contains(tool_name) {
            ToolOutcome::failed(format!("{tool_name} backend unavailable"))
        } else {
            ToolOutcome::ok(json!({ "tool": tool_name, "arguments": arguments }))
        }
    }
}

/// A store whose writes always fail.
pub struct FailingStore;

#[async_trait::async_trait]
impl DecisionStore for FailingStore {
    fn name(&self) -> &str {
        "failing"
    }

    async fn persist(
        &self,
        _org: &OrgScope,
        _recommendation: &Recommendation,
        _run_id: &str,
    ) -> Result<String, StoreError> {
        Err(StoreError::Storage("disk full".into()))
    }

    async fn recent(
        &self,
        _org: &OrgScope,
        _limit: usize,
    ) -> Result<Vec<PersistedDecision>, StoreError> {
        Ok(vec![])
    }
}

/// An in-memory store that waits `parameters.delay_ms` before each write.
pub struct DelayedStore {
    pub inner: adpilot_store::InMemoryDecisionStore,
}

impl DelayedStore {
    pub fn new() -> Self {
        Self {
            inner: adpilot_store::InMemoryDecisionStore::new(),
        }
    }
}

#[async_trait::async_trait]
impl DecisionStore for DelayedStore {
    fn name(&self) -> &str {
        "delayed"
    }

    async fn persist(
        &self,
        org: &OrgScope,
        recommendation: &Recommendation,
        run_id: &str,
    ) -> Result<String, StoreError> {
        let delay = recommendation
            .parameters
            .get("delay_ms")
            .and_then(Value::as_u64)
            .unwrap_or(0);
        tokio::time::sleep(Duration::from_millis(delay)).await;
        self.inner.persist(org, recommendation, run_id).await
    }

    async fn recent(
        &self,
        org: &OrgScope,
        limit: usize,
    ) -> Result<Vec<PersistedDecision>, StoreError> {
        self.inner.recent(org, limit).await
    }
}
