//! Decision store implementations for adpilot.

pub mod in_memory;

#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use in_memory::InMemoryDecisionStore;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDecisionStore;
