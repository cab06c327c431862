//! SQLite decision store.
//!
//! One table, `decisions`, holds every accepted recommendation. Parameters
//! are stored as a JSON string; timestamps as RFC 3339 text.

use adpilot_core::decision::{
    expiry_for, Confidence, DecisionStatus, DecisionStore, PersistedDecision, Recommendation,
    DEFAULT_EXPIRY_DAYS,
};
use adpilot_core::error::StoreError;
use adpilot_core::scope::OrgScope;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// A SQLite-backed decision store.
pub struct SqliteDecisionStore {
    pool: SqlitePool,
    expiry_days: i64,
}

impl SqliteDecisionStore {
    /// Open (or create) the store at `path`.
    ///
    /// Pass `"sqlite::memory:"` for an ephemeral database.
    pub async fn new(path: &str) -> Result<Self, StoreError> {
        let in_memory = path.contains(":memory:");
        if !in_memory {
            if let Some(parent) = Path::new(path.trim_start_matches("sqlite://")).parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent).map_err(|e| {
                        StoreError::Storage(format!("Failed to create {}: {e}", parent.display()))
                    })?;
                }
            }
        }

        let options = SqliteConnectOptions::from_str(path)
            .map_err(|e| StoreError::Storage(format!("Invalid SQLite path: {e}")))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);

        // Each connection to an in-memory database sees its own database
        let max_connections = if in_memory { 1 } else { 4 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .map_err(|e| StoreError::Storage(format!("Failed to open SQLite: {e}")))?;

        let store = Self::from_pool(pool).await?;
        info!("SQLite decision store initialized at {path}");
        Ok(store)
    }

    /// Create from an existing pool.
    pub async fn from_pool(pool: SqlitePool) -> Result<Self, StoreError> {
        let store = Self {
            pool,
            expiry_days: DEFAULT_EXPIRY_DAYS,
        };
        store.run_migrations().await?;
        Ok(store)
    }

    /// Override the expiry horizon.
    pub fn with_expiry_days(mut self, days: i64) -> Self {
        self.expiry_days = days;
        self
    }

    async fn run_migrations(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS decisions (
                iid              INTEGER PRIMARY KEY AUTOINCREMENT,
                id               TEXT UNIQUE NOT NULL,
                org              TEXT NOT NULL,
                run_id           TEXT NOT NULL,
                tool_name        TEXT NOT NULL,
                platform         TEXT NOT NULL,
                entity_type      TEXT NOT NULL,
                entity_id        TEXT NOT NULL,
                entity_name      TEXT NOT NULL,
                parameters       TEXT NOT NULL DEFAULT '{}',
                justification    TEXT NOT NULL,
                predicted_impact REAL,
                confidence       TEXT NOT NULL,
                status           TEXT NOT NULL DEFAULT 'pending',
                created_at       TEXT NOT NULL,
                expires_at       TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("decisions table: {e}")))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_decisions_org_created ON decisions(org, iid DESC)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("org index: {e}")))?;

        debug!("SQLite decision migrations complete");
        Ok(())
    }

    /// Change the status of a stored decision.
    pub async fn set_status(&self, id: &str, status: DecisionStatus) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE decisions SET status = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("update status: {e}")))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(id.to_string()));
        }
        Ok(())
    }

    fn row_to_decision(row: &sqlx::sqlite::SqliteRow) -> Result<PersistedDecision, StoreError> {
        let get_text = |col: &str| -> Result<String, StoreError> {
            row.try_get::<String, _>(col)
                .map_err(|e| StoreError::QueryFailed(format!("column {col}: {e}")))
        };

        let parameters = match serde_json::from_str(&get_text("parameters")?) {
            Ok(serde_json::Value::Object(map)) => map,
            _ => serde_json::Map::new(),
        };
        let status_raw = get_text("status")?;
        let status = DecisionStatus::parse(&status_raw).unwrap_or_else(|| {
            warn!(status = %status_raw, "Unknown decision status, treating as pending");
            DecisionStatus::Pending
        });
        let created_at = parse_timestamp(&get_text("created_at")?)?;
        let expires_at = parse_timestamp(&get_text("expires_at")?)?;
        let predicted_impact: Option<f64> = row
            .try_get("predicted_impact")
            .map_err(|e| StoreError::QueryFailed(format!("column predicted_impact: {e}")))?;

        Ok(PersistedDecision {
            id: get_text("id")?,
            org: OrgScope::new(get_text("org")?),
            run_id: get_text("run_id")?,
            recommendation: Recommendation {
                tool_name: get_text("tool_name")?,
                platform: get_text("platform")?,
                entity_type: get_text("entity_type")?,
                entity_id: get_text("entity_id")?,
                entity_name: get_text("entity_name")?,
                parameters,
                justification: get_text("justification")?,
                predicted_impact,
                confidence: Confidence::parse(&get_text("confidence")?).unwrap_or_default(),
                created_at,
            },
            status,
            created_at,
            expires_at,
        })
    }
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::QueryFailed(format!("bad timestamp '{raw}': {e}")))
}

#[async_trait]
impl DecisionStore for SqliteDecisionStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn persist(
        &self,
        org: &OrgScope,
        recommendation: &Recommendation,
        run_id: &str,
    ) -> Result<String, StoreError> {
        let id = Uuid::new_v4().to_string();
        let created_at = recommendation.created_at;
        let expires_at = expiry_for(created_at, self.expiry_days);
        let parameters = serde_json::to_string(&recommendation.parameters)
            .map_err(|e| StoreError::Storage(format!("parameters: {e}")))?;

        sqlx::query(
            r#"
            INSERT INTO decisions (
                id, org, run_id, tool_name, platform, entity_type, entity_id,
                entity_name, parameters, justification, predicted_impact,
                confidence, status, created_at, expires_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(org.as_str())
        .bind(run_id)
        .bind(&recommendation.tool_name)
        .bind(&recommendation.platform)
        .bind(&recommendation.entity_type)
        .bind(&recommendation.entity_id)
        .bind(&recommendation.entity_name)
        .bind(parameters)
        .bind(&recommendation.justification)
        .bind(recommendation.predicted_impact)
        .bind(recommendation.confidence.as_str())
        .bind(DecisionStatus::Pending.as_str())
        .bind(created_at.to_rfc3339())
        .bind(expires_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(format!("insert decision: {e}")))?;

        debug!(id = %id, org = %org, tool = %recommendation.tool_name, "Decision persisted");
        Ok(id)
    }

    async fn recent(
        &self,
        org: &OrgScope,
        limit: usize,
    ) -> Result<Vec<PersistedDecision>, StoreError> {
        let rows = sqlx::query("SELECT * FROM decisions WHERE org = ? ORDER BY iid DESC LIMIT ?")
            .bind(org.as_str())
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("recent decisions: {e}")))?;

        rows.iter().map(Self::row_to_decision).collect()
    }
}
