//! HTTP exploration executor.
//!
//! Forwards each exploration call to a data service as
//! `POST <endpoint>/tools/<name>` with body
//! `{"tool": .., "arguments": .., "organization": ..}` and returns the JSON
//! response as the tool payload.

use adpilot_core::error::ToolError;
use adpilot_core::scope::OrgScope;
use adpilot_core::tool::{ToolExecutor, ToolOutcome};
use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, warn};

const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Serialize)]
struct ToolCallBody<'a> {
    tool: &'a str,
    arguments: &'a serde_json::Value,
    organization: &'a str,
}

/// Executes exploration tools against a remote data service.
pub struct HttpToolExecutor {
    endpoint: String,
    timeout_secs: u64,
    client: reqwest::Client,
}

impl HttpToolExecutor {
    pub fn new(endpoint: impl Into<String>) -> Result<Self, ToolError> {
        Self::with_timeout(endpoint, DEFAULT_TIMEOUT_SECS)
    }

    pub fn with_timeout(endpoint: impl Into<String>, timeout_secs: u64) -> Result<Self, ToolError> {
        let endpoint = endpoint.into();
        if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
            return Err(ToolError::InvalidArguments(format!(
                "Tool endpoint must start with http:// or https://, got '{endpoint}'"
            )));
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| ToolError::ExecutionFailed {
                tool_name: "http".into(),
                reason: format!("HTTP client: {e}"),
            })?;

        Ok(Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            timeout_secs,
            client,
        })
    }

    fn url_for(&self, tool_name: &str) -> String {
        format!("{}/tools/{}", self.endpoint, tool_name)
    }

    async fn call(
        &self,
        tool_name: &str,
        arguments: &serde_json::Value,
        org: &OrgScope,
    ) -> Result<serde_json::Value, ToolError> {
        let body = ToolCallBody {
            tool: tool_name,
            arguments,
            organization: org.as_str(),
        };

        let response = self
            .client
            .post(self.url_for(tool_name))
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ToolError::Timeout {
                        tool_name: tool_name.to_string(),
                        timeout_secs: self.timeout_secs,
                    }
                } else {
                    ToolError::ExecutionFailed {
                        tool_name: tool_name.to_string(),
                        reason: e.to_string(),
                    }
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ToolError::ExecutionFailed {
                tool_name: tool_name.to_string(),
                reason: format!("HTTP {}: {}", status.as_u16(), text),
            });
        }

        response
            .json::<serde_json::Value>()
            .await
            .map_err(|e| ToolError::ExecutionFailed {
                tool_name: tool_name.to_string(),
                reason: format!("invalid JSON response: {e}"),
            })
    }
}

#[async_trait]
impl ToolExecutor for HttpToolExecutor {
    fn name(&self) -> &str {
        "http"
    }

    async fn execute(
        &self,
        tool_name: &str,
        arguments: &serde_json::Value,
        org: &OrgScope,
    ) -> ToolOutcome {
        debug!(tool = tool_name, org = %org, "Forwarding exploration call");
        match self.call(tool_name, arguments, org).await {
            Ok(data) => ToolOutcome::ok(data),
            Err(e) => {
                warn!(tool = tool_name, org = %org, error = %e, "Exploration call failed");
                e.into()
            }
        }
    }
}
