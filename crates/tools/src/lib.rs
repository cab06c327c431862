//! Built-in tools for adpilot.
//!
//! Two concerns live here: the built-in scoped [`ToolCatalog`] the model is
//! offered, and the [`ToolExecutor`] implementations that answer its
//! exploration calls. Recommendation tools are never executed here; the
//! loop records them itself.
//!
//! [`ToolCatalog`]: adpilot_core::tool::ToolCatalog
//! [`ToolExecutor`]: adpilot_core::tool::ToolExecutor

pub mod catalog;
pub mod fixtures;
pub mod http;

pub use catalog::{default_catalog, CONNECTORS};
pub use fixtures::FixtureToolExecutor;
pub use http::HttpToolExecutor;
