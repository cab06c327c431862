//! Recommendations and the DecisionStore trait.
//!
//! A recommendation is created when the loop accepts a recommendation-class
//! tool call, persisted once with a fixed expiry horizon, and never mutated
//! afterwards by the loop.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::scope::OrgScope;

/// Default expiry horizon for persisted decisions.
pub const DEFAULT_EXPIRY_DAYS: i64 = 7;

/// How sure the model is about a recommendation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    Low,
    #[default]
    Medium,
    High,
}

impl Confidence {
    /// Lenient parse; anything unrecognised is `None`.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "low" => Some(Self::Low),
            "medium" | "med" => Some(Self::Medium),
            "high" => Some(Self::High),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

/// A structured, actionable recommendation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    /// The recommendation tool that produced it (e.g., "set_budget")
    pub tool_name: String,

    /// Target ad platform (e.g., "meta", "google_ads")
    pub platform: String,

    /// Kind of entity acted on (campaign, ad_set, ...)
    pub entity_type: String,

    pub entity_id: String,

    pub entity_name: String,

    /// Free-form action parameters
    pub parameters: serde_json::Map<String, serde_json::Value>,

    /// Human-readable justification
    pub justification: String,

    /// Predicted numeric impact, if the model gave one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub predicted_impact: Option<f64>,

    #[serde(default)]
    pub confidence: Confidence,

    pub created_at: DateTime<Utc>,
}

/// Lifecycle status of a persisted decision.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecisionStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
    Expired,
}

impl DecisionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Expired => "expired",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(Self::Pending),
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            "expired" => Some(Self::Expired),
            _ => None,
        }
    }
}

/// A recommendation as stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedDecision {
    pub id: String,
    pub org: OrgScope,
    /// Correlation id of the originating analysis run
    pub run_id: String,
    pub recommendation: Recommendation,
    pub status: DecisionStatus,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl PersistedDecision {
    /// Whether the decision is expired at `now`, regardless of stored status.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.status == DecisionStatus::Expired || now >= self.expires_at
    }
}

/// Compute the expiry timestamp for a decision created at `created_at`.
pub fn expiry_for(created_at: DateTime<Utc>, horizon_days: i64) -> DateTime<Utc> {
    created_at + Duration::days(horizon_days)
}

/// Durable storage for accepted recommendations.
///
/// Implementations: SQLite, in-memory (for testing).
#[async_trait]
pub trait DecisionStore: Send + Sync {
    /// The backend name (e.g., "sqlite", "in_memory").
    fn name(&self) -> &str;

    /// Persist an accepted recommendation and return its new id.
    async fn persist(
        &self,
        org: &OrgScope,
        recommendation: &Recommendation,
        run_id: &str,
    ) -> Result<String, StoreError>;

    /// Most recent decisions for an organization, newest first.
    async fn recent(
        &self,
        org: &OrgScope,
        limit: usize,
    ) -> Result<Vec<PersistedDecision>, StoreError>;
}
