//! The recommendation loop controller.

use adpilot_core::decision::{DecisionStore, PersistedDecision, Recommendation};
use adpilot_core::error::Result;
use adpilot_core::event::{EventBus, LoopEvent};
use adpilot_core::model::{ModelClient, ModelRequest, ModelTurn, ToolChoice};
use adpilot_core::scope::OrgScope;
use adpilot_core::tool::{ManifestOptions, ToolCatalog, ToolExecutor, ToolSchema};
use adpilot_core::transcript::{ContentItem, ToolInvocation, Transcript, Turn};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::context::{
    build_seed_transcript, build_system_prompt, final_summary_prompt, PromptInputs, SeedContext,
};
use crate::dispatch::{plan_batch, Dispatcher, RunState};

/// Loop limits and feature flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopSettings {
    /// Inclusive cap on accepted recommendations per run
    pub max_recommendations: usize,

    /// Model turns allowed before the run is cut off
    pub max_iterations: u32,

    pub enable_exploration: bool,

    /// When false the run is exploration-only
    pub enable_recommendations: bool,
}

impl Default for LoopSettings {
    fn default() -> Self {
        Self {
            max_recommendations: 4,
            max_iterations: 200,
            enable_exploration: true,
            enable_recommendations: true,
        }
    }
}

/// Why a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    NoToolCalls,
    MaxRecommendations,
    MaxIterations,
}

impl StopReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoToolCalls => "no_tool_calls",
            Self::MaxRecommendations => "max_recommendations",
            Self::MaxIterations => "max_iterations",
        }
    }
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The controller's state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Running,
    AwaitingFinalSummary,
    Done(StopReason),
}

/// One run's inputs.
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub org: OrgScope,

    /// Correlation id of the originating analysis run
    pub run_id: String,

    pub seed: SeedContext,

    pub business_context: Option<String>,

    /// Earlier decisions to digest into the system prompt
    pub prior_decisions: Vec<PersistedDecision>,

    /// Connectors the organization has linked; empty offers every tool
    pub connected_platforms: Vec<String>,

    /// Checked before each model call
    pub deadline: Option<Instant>,
}

impl RunRequest {
    pub fn new(org: OrgScope, run_id: impl Into<String>, seed: SeedContext) -> Self {
        Self {
            org,
            run_id: run_id.into(),
            seed,
            business_context: None,
            prior_decisions: Vec::new(),
            connected_platforms: Vec::new(),
            deadline: None,
        }
    }

    pub fn with_business_context(mut self, context: impl Into<String>) -> Self {
        self.business_context = Some(context.into());
        self
    }

    pub fn with_prior_decisions(mut self, decisions: Vec<PersistedDecision>) -> Self {
        self.prior_decisions = decisions;
        self
    }

    pub fn with_connected_platforms(mut self, platforms: Vec<String>) -> Self {
        self.connected_platforms = platforms;
        self
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }
}

/// The result of a finished run.
#[derive(Debug, Clone, Serialize)]
pub struct LoopOutput {
    pub final_summary: String,

    /// Every accepted recommendation, including any whose persistence failed
    pub recommendations: Vec<Recommendation>,

    /// Model calls made, including the final summary call
    pub turns_taken: u32,

    pub stop_reason: StopReason,

    /// Whether cancellation or the deadline ended the run
    pub interrupted: bool,

    pub transcript_len: usize,
}

/// Drives one bounded conversation with the model per run.
///
/// The controller holds only shared, immutable collaborators; each call to
/// [`run`](Self::run) owns its transcript and run state.
pub struct LoopController {
    model: Arc<dyn ModelClient>,
    catalog: Arc<ToolCatalog>,
    executor: Arc<dyn ToolExecutor>,
    store: Arc<dyn DecisionStore>,
    settings: LoopSettings,
    event_bus: Arc<EventBus>,
    model_name: String,
    temperature: f32,
    max_tokens: Option<u32>,
}

impl LoopController {
    pub fn new(
        model: Arc<dyn ModelClient>,
        catalog: Arc<ToolCatalog>,
        executor: Arc<dyn ToolExecutor>,
        store: Arc<dyn DecisionStore>,
        settings: LoopSettings,
    ) -> Self {
        Self {
            model,
            catalog,
            executor,
            store,
            settings,
            event_bus: Arc::new(EventBus::default()),
            model_name: "claude-sonnet-4-20250514".into(),
            temperature: 0.2,
            max_tokens: Some(4096),
        }
    }

    /// Publish loop events on a shared bus.
    pub fn with_event_bus(mut self, event_bus: Arc<EventBus>) -> Self {
        self.event_bus = event_bus;
        self
    }

    /// Set the model name and sampling parameters sent on every request.
    pub fn with_model_params(
        mut self,
        model: impl Into<String>,
        temperature: f32,
        max_tokens: Option<u32>,
    ) -> Self {
        self.model_name = model.into();
        self.temperature = temperature;
        self.max_tokens = max_tokens;
        self
    }

    pub fn settings(&self) -> &LoopSettings {
        &self.settings
    }

    /// Run the loop to completion.
    pub async fn run(&self, request: &RunRequest) -> Result<LoopOutput> {
        self.run_with_cancel(request, CancellationToken::new()).await
    }

    /// Run the loop, stopping early if `cancel` fires or the deadline passes.
    ///
    /// Both are checked before each model call, never mid-batch. An
    /// interrupted run ends as `max_iterations` with the seed summary.
    pub async fn run_with_cancel(
        &self,
        request: &RunRequest,
        cancel: CancellationToken,
    ) -> Result<LoopOutput> {
        let manifest = self.catalog.manifest(&ManifestOptions {
            include_exploration: self.settings.enable_exploration,
            include_recommendations: self.settings.enable_recommendations,
            connectors: request.connected_platforms.clone(),
        });
        // Tools left out of the manifest are unknown for this run
        let offered = ToolCatalog::new(manifest.clone())?;
        let available_tools: Vec<String> = offered.names().into_iter().map(String::from).collect();

        // Expired decisions no longer bias the model
        let now = Utc::now();
        let prior_decisions: Vec<PersistedDecision> = request
            .prior_decisions
            .iter()
            .filter(|decision| !decision.is_expired_at(now))
            .cloned()
            .collect();
        let base_prompt = build_system_prompt(&PromptInputs {
            max_recommendations: self.settings.max_recommendations,
            recommendations_enabled: self.settings.enable_recommendations,
            exploration_enabled: self.settings.enable_exploration,
            business_context: request.business_context.as_deref(),
            prior_decisions: &prior_decisions,
        });

        let dispatcher = Dispatcher {
            executor: self.executor.as_ref(),
            store: self.store.as_ref(),
            event_bus: &self.event_bus,
            org: &request.org,
            run_id: &request.run_id,
            max_recommendations: self.settings.max_recommendations,
            available_tools: &available_tools,
        };

        let mut transcript = build_seed_transcript(&request.run_id, &request.seed);
        let mut run_state = RunState::new(self.settings.max_recommendations);
        let mut state = LoopState::Running;
        let mut iterations: u32 = 0;
        let mut turns_taken: u32 = 0;
        let mut interrupted = false;
        let mut final_summary = String::new();

        info!(
            run_id = %request.run_id,
            org = %request.org,
            tools = manifest.len(),
            max_recommendations = self.settings.max_recommendations,
            max_iterations = self.settings.max_iterations,
            "Starting recommendation loop"
        );

        loop {
            state = match state {
                LoopState::Done(_) => break,

                _ if self.interrupted(request, &cancel) => {
                    warn!(run_id = %request.run_id, turns = turns_taken, "Loop interrupted");
                    interrupted = true;
                    final_summary = request.seed.summary.clone();
                    LoopState::Done(StopReason::MaxIterations)
                }

                LoopState::Running if iterations >= self.settings.max_iterations => {
                    warn!(
                        run_id = %request.run_id,
                        iterations,
                        "Iteration ceiling reached, returning seed summary"
                    );
                    final_summary = request.seed.summary.clone();
                    LoopState::Done(StopReason::MaxIterations)
                }

                LoopState::Running => {
                    iterations += 1;
                    let turn = self
                        .next_turn(&base_prompt, &transcript, &manifest, ToolChoice::Auto)
                        .await?;
                    turns_taken += 1;

                    let invocations: Vec<ToolInvocation> =
                        turn.invocations().into_iter().cloned().collect();
                    self.publish_turn(&request.run_id, turns_taken, &turn, invocations.len());
                    let text = turn.text();
                    transcript.push(turn.into_turn());

                    if invocations.is_empty() {
                        final_summary = non_empty_or(text, &request.seed.summary);
                        LoopState::Done(StopReason::NoToolCalls)
                    } else {
                        debug!(
                            run_id = %request.run_id,
                            turn = turns_taken,
                            invocations = invocations.len(),
                            "Dispatching tool batch"
                        );
                        let planned = plan_batch(&offered, &invocations, &mut run_state, Utc::now());
                        let results = dispatcher.resolve_batch(&planned).await;
                        transcript.push(Turn::results(results));

                        if run_state.cap_reached() {
                            info!(
                                run_id = %request.run_id,
                                recommendations = run_state.accepted().len(),
                                "Recommendation cap reached, requesting final summary"
                            );
                            LoopState::AwaitingFinalSummary
                        } else {
                            LoopState::Running
                        }
                    }
                }

                LoopState::AwaitingFinalSummary => {
                    let prompt = final_summary_prompt(&base_prompt, self.settings.max_recommendations);
                    let turn = self
                        .next_turn(&prompt, &transcript, &manifest, ToolChoice::None)
                        .await?;
                    turns_taken += 1;
                    self.publish_turn(&request.run_id, turns_taken, &turn, 0);

                    let text = turn.text();
                    if !turn.invocations().is_empty() {
                        warn!(run_id = %request.run_id, "Ignoring tool calls in final summary turn");
                    }
                    // Only the text is kept so the transcript stays well-formed
                    transcript.push(Turn::model(vec![ContentItem::Text { text: text.clone() }]));
                    final_summary = non_empty_or(text, &request.seed.summary);
                    LoopState::Done(StopReason::MaxRecommendations)
                }
            };
        }

        let stop_reason = match state {
            LoopState::Done(reason) => reason,
            // The loop only breaks out of Done
            _ => StopReason::MaxIterations,
        };

        self.event_bus.publish(LoopEvent::LoopFinished {
            run_id: request.run_id.clone(),
            stop_reason: stop_reason.to_string(),
            turns: turns_taken,
            recommendations: run_state.accepted().len(),
            timestamp: Utc::now(),
        });

        info!(
            run_id = %request.run_id,
            stop_reason = %stop_reason,
            turns = turns_taken,
            recommendations = run_state.accepted().len(),
            interrupted,
            "Recommendation loop finished"
        );

        Ok(LoopOutput {
            final_summary,
            recommendations: run_state.into_accepted(),
            turns_taken,
            stop_reason,
            interrupted,
            transcript_len: transcript.len(),
        })
    }

    fn interrupted(&self, request: &RunRequest, cancel: &CancellationToken) -> bool {
        cancel.is_cancelled() || request.deadline.is_some_and(|d| Instant::now() >= d)
    }

    async fn next_turn(
        &self,
        system_prompt: &str,
        transcript: &Transcript,
        tools: &[ToolSchema],
        tool_choice: ToolChoice,
    ) -> Result<ModelTurn> {
        transcript.verify_tail()?;

        let request = ModelRequest {
            model: self.model_name.clone(),
            system_prompt: system_prompt.to_string(),
            turns: transcript.turns.clone(),
            tools: tools.to_vec(),
            tool_choice,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        Ok(self.model.next_turn(request).await?)
    }

    fn publish_turn(&self, run_id: &str, turn: u32, model_turn: &ModelTurn, invocations: usize) {
        self.event_bus.publish(LoopEvent::TurnCompleted {
            run_id: run_id.to_string(),
            turn,
            invocations,
            tokens_used: model_turn.usage.map(|u| u.total()).unwrap_or(0),
            timestamp: Utc::now(),
        });
    }
}

fn non_empty_or(text: String, fallback: &str) -> String {
    if text.trim().is_empty() {
        fallback.to_string()
    } else {
        text
    }
}
