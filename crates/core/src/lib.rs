//! # adpilot core
//!
//! Domain types, collaborator traits, and error definitions for the adpilot
//! recommendation loop. This crate performs no I/O; it defines the domain
//! model that all other crates implement against.
//!
//! ## Collaborators
//!
//! The loop controller talks to three external collaborators, each defined
//! as a trait here:
//! - [`ModelClient`]: the remote tool-calling model
//! - [`ToolExecutor`]: read-only data exploration
//! - [`DecisionStore`]: durable storage for accepted recommendations

pub mod decision;
pub mod error;
pub mod event;
pub mod model;
pub mod scope;
pub mod tool;
pub mod transcript;

// Re-export key types at crate root for ergonomics
pub use decision::{Confidence, DecisionStatus, DecisionStore, PersistedDecision, Recommendation};
pub use error::{Error, ModelError, ProtocolError, Result, StoreError, ToolError};
pub use event::{EventBus, LoopEvent};
pub use model::{ModelClient, ModelRequest, ModelTurn, StopSignal, ToolChoice, Usage};
pub use scope::OrgScope;
pub use tool::{
    Classification, ManifestOptions, ToolCatalog, ToolClass, ToolExecutor, ToolOutcome, ToolSchema,
};
pub use transcript::{ContentItem, Role, ToolInvocation, ToolResultItem, Transcript, Turn};
