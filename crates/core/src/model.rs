//! The ModelClient trait over the remote tool-calling model.
//!
//! A client takes a system prompt, the transcript so far, and a tools
//! manifest, and returns the model's next turn.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ModelError;
use crate::tool::ToolSchema;
use crate::transcript::{ContentItem, ToolInvocation, Turn};

/// Whether the model may call tools on this request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolChoice {
    /// The model decides
    #[default]
    Auto,
    /// Tools stay visible but the model must answer in text
    None,
}

/// One request for the model's next turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelRequest {
    /// The model to use (e.g., "claude-sonnet-4-20250514")
    pub model: String,

    /// System prompt
    pub system_prompt: String,

    /// Transcript turns so far
    pub turns: Vec<Turn>,

    /// Tools the model can call
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolSchema>,

    #[serde(default)]
    pub tool_choice: ToolChoice,

    /// Temperature (0.0 = deterministic)
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens to generate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

fn default_temperature() -> f32 {
    0.2
}

/// Why the model stopped generating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopSignal {
    EndTurn,
    ToolUse,
    MaxTokens,
    StopSequence,
    Other,
}

impl StopSignal {
    /// Map a wire-level stop reason string.
    pub fn from_wire(reason: Option<&str>) -> Self {
        match reason {
            Some("end_turn") => Self::EndTurn,
            Some("tool_use") => Self::ToolUse,
            Some("max_tokens") => Self::MaxTokens,
            Some("stop_sequence") => Self::StopSequence,
            _ => Self::Other,
        }
    }
}

/// Token usage information.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl Usage {
    pub fn total(&self) -> u32 {
        self.input_tokens.saturating_add(self.output_tokens)
    }
}

/// The model's next turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelTurn {
    /// Text blocks and tool invocations, in emission order
    pub items: Vec<ContentItem>,

    pub stop: StopSignal,

    pub usage: Option<Usage>,

    /// Which model actually responded
    pub model: String,
}

impl ModelTurn {
    /// Tool invocations in emission order.
    pub fn invocations(&self) -> Vec<&ToolInvocation> {
        self.items
            .iter()
            .filter_map(|item| match item {
                ContentItem::ToolInvocation(inv) => Some(inv),
                _ => None,
            })
            .collect()
    }

    /// Narrative text joined by newlines.
    pub fn text(&self) -> String {
        self.items
            .iter()
            .filter_map(|item| match item {
                ContentItem::Text { text } if !text.trim().is_empty() => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Convert into a transcript turn.
    pub fn into_turn(self) -> Turn {
        Turn::model(self.items)
    }
}

/// The core ModelClient trait.
///
/// Failures are fatal to a loop run; retry policy, if any, lives inside the
/// implementation.
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// A human-readable name for this client (e.g., "anthropic").
    fn name(&self) -> &str;

    /// Request the model's next turn.
    async fn next_turn(&self, request: ModelRequest) -> Result<ModelTurn, ModelError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn stop_signal_from_wire() {
        assert_eq!(StopSignal::from_wire(Some("tool_use")), StopSignal::ToolUse);
        assert_eq!(StopSignal::from_wire(Some("end_turn")), StopSignal::EndTurn);
        assert_eq!(StopSignal::from_wire(Some("refusal")), StopSignal::Other);
        assert_eq!(StopSignal::from_wire(None), StopSignal::Other);
    }

    #[test]
    fn model_turn_splits_text_and_invocations() {
        let turn = ModelTurn {
            items: vec![
                ContentItem::Text { text: "Checking spend".into() },
                ContentItem::ToolInvocation(ToolInvocation {
                    id: "toolu_1".into(),
                    name: "query_metrics".into(),
                    arguments: json!({"metric": "spend"}),
                }),
            ],
            stop: StopSignal::ToolUse,
            usage: Some(Usage { input_tokens: 100, output_tokens: 20 }),
            model: "mock".into(),
        };
        assert_eq!(turn.text(), "Checking spend");
        assert_eq!(turn.invocations()[0].id, "toolu_1");
        assert_eq!(turn.usage.unwrap().total(), 120);
        assert_eq!(turn.into_turn().invocations().len(), 1);
    }

    #[test]
    fn usage_total_saturates() {
        let usage = Usage { input_tokens: u32::MAX, output_tokens: 10 };
        assert_eq!(usage.total(), u32::MAX);
    }

    #[test]
    fn tool_choice_defaults_to_auto() {
        let request: ModelRequest = serde_json::from_value(json!({
            "model": "m",
            "system_prompt": "s",
            "turns": []
        }))
        .unwrap();
        assert_eq!(request.tool_choice, ToolChoice::Auto);
        assert!((request.temperature - 0.2).abs() < f32::EPSILON);
    }
}
