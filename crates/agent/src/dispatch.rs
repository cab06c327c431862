//! Routing a batch of tool invocations.
//!
//! Dispatch happens in two steps. [`plan_batch`] walks the invocations in
//! order and decides what each one becomes; this is where the cap is
//! enforced, so the decision never depends on execution timing.
//! [`Dispatcher::resolve_batch`] then performs the side effects and returns
//! one result per invocation, in invocation order. Executor calls run
//! concurrently; persistence runs sequentially alongside them.

use adpilot_core::decision::{DecisionStore, Recommendation};
use adpilot_core::event::{EventBus, LoopEvent};
use adpilot_core::scope::OrgScope;
use adpilot_core::tool::{Classification, ToolCatalog, ToolClass, ToolExecutor};
use adpilot_core::transcript::{ToolInvocation, ToolResultItem};
use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde_json::json;
use std::time::Instant;
use tracing::{debug, warn};

use crate::recommendation::parse_recommendation;

/// Per-run bookkeeping of accepted recommendations.
#[derive(Debug, Clone)]
pub struct RunState {
    max_recommendations: usize,
    accepted: Vec<Recommendation>,
    cap_reached: bool,
}

impl RunState {
    pub fn new(max_recommendations: usize) -> Self {
        Self {
            max_recommendations,
            accepted: Vec::new(),
            cap_reached: false,
        }
    }

    pub fn max_recommendations(&self) -> usize {
        self.max_recommendations
    }

    pub fn accepted(&self) -> &[Recommendation] {
        &self.accepted
    }

    pub fn cap_reached(&self) -> bool {
        self.cap_reached
    }

    pub fn into_accepted(self) -> Vec<Recommendation> {
        self.accepted
    }

    /// Accept a recommendation if there is headroom, returning the running count.
    fn try_accept(&mut self, recommendation: &Recommendation) -> Option<usize> {
        if self.accepted.len() >= self.max_recommendations {
            self.cap_reached = true;
            return None;
        }
        self.accepted.push(recommendation.clone());
        if self.accepted.len() >= self.max_recommendations {
            self.cap_reached = true;
        }
        Some(self.accepted.len())
    }
}

/// What one invocation resolves to.
#[derive(Debug, Clone, PartialEq)]
pub enum Planned {
    /// Not in the offered catalog
    Unknown { invocation_id: String, tool_name: String },
    /// Forward to the executor
    Explore {
        invocation_id: String,
        tool_name: String,
        arguments: serde_json::Value,
    },
    /// Accepted; persist and report the running count
    Accept {
        invocation_id: String,
        recommendation: Recommendation,
        count: usize,
    },
    /// Refused because the cap was already reached
    Skip { invocation_id: String, tool_name: String },
}

impl Planned {
    pub fn invocation_id(&self) -> &str {
        match self {
            Planned::Unknown { invocation_id, .. }
            | Planned::Explore { invocation_id, .. }
            | Planned::Accept { invocation_id, .. }
            | Planned::Skip { invocation_id, .. } => invocation_id,
        }
    }
}

/// Classify every invocation of a batch, in order, updating `state`.
pub fn plan_batch(
    catalog: &ToolCatalog,
    invocations: &[ToolInvocation],
    state: &mut RunState,
    now: DateTime<Utc>,
) -> Vec<Planned> {
    invocations
        .iter()
        .map(|inv| match catalog.classify(&inv.name) {
            Classification::Unknown => Planned::Unknown {
                invocation_id: inv.id.clone(),
                tool_name: inv.name.clone(),
            },
            Classification::Exploration => Planned::Explore {
                invocation_id: inv.id.clone(),
                tool_name: inv.name.clone(),
                arguments: inv.arguments.clone(),
            },
            Classification::Recommendation => {
                let recommendation = parse_recommendation(&inv.name, &inv.arguments, now);
                match state.try_accept(&recommendation) {
                    Some(count) => Planned::Accept {
                        invocation_id: inv.id.clone(),
                        recommendation,
                        count,
                    },
                    None => Planned::Skip {
                        invocation_id: inv.id.clone(),
                        tool_name: inv.name.clone(),
                    },
                }
            }
        })
        .collect()
}

/// Collaborators and run identity needed to resolve a batch.
pub struct Dispatcher<'a> {
    pub executor: &'a dyn ToolExecutor,
    pub store: &'a dyn DecisionStore,
    pub event_bus: &'a EventBus,
    pub org: &'a OrgScope,
    pub run_id: &'a str,
    pub max_recommendations: usize,
    /// Tool names offered this run, echoed back on unknown calls
    pub available_tools: &'a [String],
}

impl Dispatcher<'_> {
    /// Resolve a planned batch; results keep plan order.
    ///
    /// Exploration and bookkeeping items run concurrently. Accepted
    /// recommendations are persisted one at a time in invocation order, so
    /// stores number them in the order the model emitted them.
    pub async fn resolve_batch(&self, planned: &[Planned]) -> Vec<ToolResultItem> {
        let concurrent = join_all(planned.iter().map(|item| async move {
            match item {
                Planned::Accept { .. } => None,
                _ => Some(self.resolve(item).await),
            }
        }));
        let persisted = async {
            let mut results = Vec::new();
            for item in planned.iter().filter(|item| matches!(item, Planned::Accept { .. })) {
                results.push(self.resolve(item).await);
            }
            results
        };

        let (concurrent, persisted) = futures::join!(concurrent, persisted);
        let mut persisted = persisted.into_iter();
        concurrent
            .into_iter()
            .filter_map(|result| result.or_else(|| persisted.next()))
            .collect()
    }

    /// Resolve one planned item into its tool result.
    pub async fn resolve(&self, planned: &Planned) -> ToolResultItem {
        match planned {
            Planned::Unknown { invocation_id, tool_name } => {
                warn!(run_id = self.run_id, tool = %tool_name, "Model called an unknown tool");
                ToolResultItem::error(
                    invocation_id.clone(),
                    json!({
                        "error": format!("unknown tool '{tool_name}'"),
                        "available_tools": self.available_tools,
                    }),
                )
            }
            Planned::Explore { invocation_id, tool_name, arguments } => {
                let start = Instant::now();
                let outcome = self.executor.execute(tool_name, arguments, self.org).await;
                let duration_ms = start.elapsed().as_millis() as u64;

                self.event_bus.publish(LoopEvent::ToolDispatched {
                    run_id: self.run_id.to_string(),
                    tool_name: tool_name.clone(),
                    class: ToolClass::Exploration,
                    success: outcome.success,
                    duration_ms,
                    timestamp: Utc::now(),
                });

                if outcome.success {
                    debug!(run_id = self.run_id, tool = %tool_name, duration_ms, "Exploration call succeeded");
                    ToolResultItem::ok(invocation_id.clone(), outcome.data.unwrap_or_else(|| json!({})))
                } else {
                    let error = outcome.error.unwrap_or_else(|| "tool execution failed".into());
                    warn!(run_id = self.run_id, tool = %tool_name, error = %error, "Exploration call failed");
                    ToolResultItem::error(
                        invocation_id.clone(),
                        json!({ "error": error, "tool": tool_name }),
                    )
                }
            }
            Planned::Accept { invocation_id, recommendation, count } => {
                let persisted = self.store.persist(self.org, recommendation, self.run_id).await;

                self.event_bus.publish(LoopEvent::RecommendationLogged {
                    run_id: self.run_id.to_string(),
                    tool_name: recommendation.tool_name.clone(),
                    decision_id: persisted.as_ref().ok().cloned(),
                    count: *count,
                    timestamp: Utc::now(),
                });

                match persisted {
                    Ok(decision_id) => {
                        debug!(
                            run_id = self.run_id,
                            tool = %recommendation.tool_name,
                            decision_id = %decision_id,
                            count,
                            "Recommendation logged"
                        );
                        ToolResultItem::ok(
                            invocation_id.clone(),
                            json!({
                                "status": "logged",
                                "decision_id": decision_id,
                                "recommendation_count": count,
                                "max_recommendations": self.max_recommendations,
                            }),
                        )
                    }
                    Err(e) => {
                        // Still counts against the cap
                        warn!(
                            run_id = self.run_id,
                            tool = %recommendation.tool_name,
                            error = %e,
                            "Failed to persist recommendation"
                        );
                        ToolResultItem::error(
                            invocation_id.clone(),
                            json!({
                                "status": "persist_failed",
                                "error": e.to_string(),
                                "recommendation_count": count,
                                "max_recommendations": self.max_recommendations,
                            }),
                        )
                    }
                }
            }
            Planned::Skip { invocation_id, tool_name } => {
                debug!(run_id = self.run_id, tool = %tool_name, "Recommendation skipped, cap reached");
                self.event_bus.publish(LoopEvent::RecommendationSkipped {
                    run_id: self.run_id.to_string(),
                    tool_name: tool_name.clone(),
                    timestamp: Utc::now(),
                });
                ToolResultItem::ok(
                    invocation_id.clone(),
                    json!({
                        "status": "skipped",
                        "reason": "max_recommendations reached",
                        "max_recommendations": self.max_recommendations,
                    }),
                )
            }
        }
    }
}
