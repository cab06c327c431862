//! In-memory decision store, used in tests and for dry runs.

use adpilot_core::decision::{
    expiry_for, DecisionStatus, DecisionStore, PersistedDecision, Recommendation,
    DEFAULT_EXPIRY_DAYS,
};
use adpilot_core::error::StoreError;
use adpilot_core::scope::OrgScope;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// A decision store that keeps persisted decisions in a Vec.
pub struct InMemoryDecisionStore {
    decisions: Arc<RwLock<Vec<PersistedDecision>>>,
    expiry_days: i64,
}

impl InMemoryDecisionStore {
    pub fn new() -> Self {
        Self {
            decisions: Arc::new(RwLock::new(Vec::new())),
            expiry_days: DEFAULT_EXPIRY_DAYS,
        }
    }

    /// Override the expiry horizon.
    pub fn with_expiry_days(mut self, days: i64) -> Self {
        self.expiry_days = days;
        self
    }

    /// Every stored decision, in persistence order.
    pub async fn all(&self) -> Vec<PersistedDecision> {
        self.decisions.read().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.decisions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.decisions.read().await.is_empty()
    }

    /// Change the status of a stored decision.
    ///
    /// Review happens outside the loop; this exists so loop behaviour over
    /// approved or rejected history can be exercised.
    pub async fn set_status(&self, id: &str, status: DecisionStatus) -> Result<(), StoreError> {
        let mut decisions = self.decisions.write().await;
        let decision = decisions
            .iter_mut()
            .find(|d| d.id == id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        decision.status = status;
        Ok(())
    }
}

impl Default for InMemoryDecisionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DecisionStore for InMemoryDecisionStore {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn persist(
        &self,
        org: &OrgScope,
        recommendation: &Recommendation,
        run_id: &str,
    ) -> Result<String, StoreError> {
        let id = Uuid::new_v4().to_string();
        let created_at = recommendation.created_at;
        self.decisions.write().await.push(PersistedDecision {
            id: id.clone(),
            org: org.clone(),
            run_id: run_id.to_string(),
            recommendation: recommendation.clone(),
            status: DecisionStatus::Pending,
            created_at,
            expires_at: expiry_for(created_at, self.expiry_days),
        });
        Ok(id)
    }

    async fn recent(
        &self,
        org: &OrgScope,
        limit: usize,
    ) -> Result<Vec<PersistedDecision>, StoreError> {
        let decisions = self.decisions.read().await;
        // Persistence order is chronological, so newest first is a reverse walk
        Ok(decisions
            .iter()
            .rev()
            .filter(|d| &d.org == org)
            .take(limit)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use adpilot_core::decision::Confidence;
    use chrono::Utc;

    fn make_recommendation(tool: &str, entity_id: &str) -> Recommendation {
        Recommendation {
            tool_name: tool.into(),
            platform: "meta".into(),
            entity_type: "campaign".into(),
            entity_id: entity_id.into(),
            entity_name: format!("Campaign {entity_id}"),
            parameters: serde_json::Map::new(),
            justification: "ROAS below target".into(),
            predicted_impact: Some(120.0),
            confidence: Confidence::High,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn persist_sets_pending_and_expiry() {
        let store = InMemoryDecisionStore::new();
        let org = OrgScope::new("org_1");
        let id = store
            .persist(&org, &make_recommendation("set_budget", "c1"), "run_1")
            .await
            .unwrap();

        let all = store.all().await;
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].id, id);
        assert_eq!(all[0].status, DecisionStatus::Pending);
        assert_eq!(all[0].run_id, "run_1");
        assert_eq!((all[0].expires_at - all[0].created_at).num_days(), 7);
    }

    #[tokio::test]
    async fn recent_is_newest_first_and_org_scoped() {
        let store = InMemoryDecisionStore::new().with_expiry_days(3);
        let org = OrgScope::new("org_1");
        let other = OrgScope::new("org_2");
        store.persist(&org, &make_recommendation("set_budget", "c1"), "r").await.unwrap();
        store.persist(&other, &make_recommendation("set_budget", "x"), "r").await.unwrap();
        store.persist(&org, &make_recommendation("pause_entity", "c2"), "r").await.unwrap();

        let recent = store.recent(&org, 10).await.unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].recommendation.entity_id, "c2");
        assert_eq!(recent[1].recommendation.entity_id, "c1");
        assert_eq!((recent[0].expires_at - recent[0].created_at).num_days(), 3);

        assert_eq!(store.recent(&org, 1).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn set_status_updates_and_reports_missing() {
        let store = InMemoryDecisionStore::new();
        let org = OrgScope::new("org_1");
        let id = store
            .persist(&org, &make_recommendation("set_budget", "c1"), "r")
            .await
            .unwrap();

        store.set_status(&id, DecisionStatus::Rejected).await.unwrap();
        assert_eq!(store.all().await[0].status, DecisionStatus::Rejected);

        let err = store.set_status("missing", DecisionStatus::Approved).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }
}
