//! The recommendation loop for adpilot.
//!
//! A run follows a bounded **explore → recommend → summarize** cycle:
//!
//! 1. **Seed** the transcript with the prior analytical summary
//! 2. **Ask the model** for its next turn, offering the scoped tool manifest
//! 3. **Dispatch** every invocation in the turn: exploration calls go to the
//!    executor, recommendation calls are capped and persisted here
//! 4. **Reply** with one result per invocation, in order, and loop to step 2
//! 5. **Stop** when the model answers in text, the recommendation cap is
//!    reached (after one final summary call), or the iteration ceiling hits

pub mod context;
pub mod dispatch;
pub mod loop_runner;
pub mod recommendation;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use context::{
    build_seed_transcript, build_system_prompt, final_summary_prompt, format_decision_digest,
    PromptInputs, SeedContext,
};
pub use dispatch::{plan_batch, Dispatcher, Planned, RunState};
pub use loop_runner::{LoopController, LoopOutput, LoopSettings, LoopState, RunRequest, StopReason};
pub use recommendation::parse_recommendation;
