//! Tool inventory and indexing.
//!
//! - [`ToolRegistry`]: refreshes the unified catalog from connected upstreams
//! - [`ToolIndex`]: immutable public-name index published by each refresh

pub mod index;
pub mod registry;
pub mod types;

pub use index::ToolIndex;
pub use registry::ToolRegistry;
pub use types::{NameCollision, RefreshReport, RegisteredTool, ToolTarget};
