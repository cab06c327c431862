//! Transcript domain types.
//!
//! A transcript is the ordered record of turns exchanged with the model.
//! Model turns may carry tool invocations; the caller turn that follows
//! must answer every one of them, in order, before the model speaks again.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ProtocolError;

/// Who authored a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The loop controller (seed context, tool results)
    Caller,
    /// The remote language model
    Model,
}

/// A structured tool call emitted by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInvocation {
    /// Model-generated id, unique within its turn
    pub id: String,

    /// Name of the tool to invoke
    pub name: String,

    /// Arguments as a JSON value
    pub arguments: serde_json::Value,
}

/// The answer to one [`ToolInvocation`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResultItem {
    /// The invocation this result answers
    pub invocation_id: String,

    /// Structured payload returned to the model
    pub payload: serde_json::Value,

    /// Whether the payload describes a failure
    #[serde(default)]
    pub is_error: bool,
}

impl ToolResultItem {
    pub fn ok(invocation_id: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            invocation_id: invocation_id.into(),
            payload,
            is_error: false,
        }
    }

    pub fn error(invocation_id: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            invocation_id: invocation_id.into(),
            payload,
            is_error: true,
        }
    }
}

/// One item of turn content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentItem {
    Text { text: String },
    ToolInvocation(ToolInvocation),
    ToolResult(ToolResultItem),
}

/// A single exchange unit in the transcript.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    /// Unique turn ID
    pub id: String,

    /// Who authored this turn
    pub role: Role,

    /// Ordered content items
    pub items: Vec<ContentItem>,

    /// Timestamp
    pub timestamp: DateTime<Utc>,
}

impl Turn {
    fn with(role: Role, items: Vec<ContentItem>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            items,
            timestamp: Utc::now(),
        }
    }

    /// A caller turn holding plain text.
    pub fn caller_text(text: impl Into<String>) -> Self {
        Self::with(Role::Caller, vec![ContentItem::Text { text: text.into() }])
    }

    /// A model turn with the given items.
    pub fn model(items: Vec<ContentItem>) -> Self {
        Self::with(Role::Model, items)
    }

    /// A caller turn bundling a batch of tool results.
    pub fn results(results: Vec<ToolResultItem>) -> Self {
        Self::with(
            Role::Caller,
            results.into_iter().map(ContentItem::ToolResult).collect(),
        )
    }

    /// All narrative text in this turn, joined by newlines.
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

    /// Tool invocations in the order the model emitted them.
    pub fn invocations(&self) -> Vec<&ToolInvocation> {
        self.items
            .iter()
            .filter_map(|item| match item {
                ContentItem::ToolInvocation(inv) => Some(inv),
                _ => None,
            })
            .collect()
    }

    /// Tool results in reply order.
    pub fn tool_results(&self) -> Vec<&ToolResultItem> {
        self.items
            .iter()
            .filter_map(|item| match item {
                ContentItem::ToolResult(res) => Some(res),
                _ => None,
            })
            .collect()
    }
}

/// The ordered record of one loop run's conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transcript {
    /// Correlation id of the originating analysis run
    pub run_id: String,

    /// Ordered turns
    pub turns: Vec<Turn>,

    /// When this transcript was created
    pub created_at: DateTime<Utc>,

    /// When the last turn was added
    pub updated_at: DateTime<Utc>,
}

impl Transcript {
    pub fn new(run_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            run_id: run_id.into(),
            turns: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Append a turn.
    pub fn push(&mut self, turn: Turn) {
        self.updated_at = Utc::now();
        self.turns.push(turn);
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    /// The most recent model-authored turn.
    pub fn last_model_turn(&self) -> Option<&Turn> {
        self.turns.iter().rev().find(|turn| turn.role == Role::Model)
    }

    /// Check that `reply` answers every invocation of `model_turn` exactly
    /// once and in invocation order.
    pub fn verify_reply(model_turn: &Turn, reply: &Turn) -> Result<(), ProtocolError> {
        if reply.role != Role::Caller {
            return Err(ProtocolError::WrongAuthor);
        }

        let expected: Vec<&str> = model_turn
            .invocations()
            .iter()
            .map(|inv| inv.id.as_str())
            .collect();
        let actual: Vec<&str> = reply
            .tool_results()
            .iter()
            .map(|res| res.invocation_id.as_str())
            .collect();

        if let Some(orphan) = actual.iter().find(|id| !expected.contains(id)) {
            return Err(ProtocolError::OrphanResult((*orphan).to_string()));
        }

        let missing: Vec<String> = expected
            .iter()
            .filter(|id| !actual.contains(id))
            .map(|id| (*id).to_string())
            .collect();
        if !missing.is_empty() || actual.len() != expected.len() {
            return Err(ProtocolError::IncompleteBatch { missing });
        }

        if let Some(position) = expected.iter().zip(&actual).position(|(e, a)| e != a) {
            return Err(ProtocolError::OutOfOrder { position });
        }

        Ok(())
    }

    /// Check that the transcript is ready for the next model turn: the most
    /// recent model invocations, if any, have been answered in full.
    pub fn verify_tail(&self) -> Result<(), ProtocolError> {
        match self.turns.as_slice() {
            [.., last] if last.role == Role::Model && !last.invocations().is_empty() => {
                Err(ProtocolError::IncompleteBatch {
                    missing: last.invocations().iter().map(|inv| inv.id.clone()).collect(),
                })
            }
            [.., model, reply] if model.role == Role::Model && !model.invocations().is_empty() => {
                Self::verify_reply(model, reply)
            }
            _ => Ok(()),
        }
    }
}
