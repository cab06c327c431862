//! Model client implementations for adpilot.
//!
//! All clients implement the `adpilot_core::ModelClient` trait.

pub mod anthropic;

pub use anthropic::AnthropicClient;
