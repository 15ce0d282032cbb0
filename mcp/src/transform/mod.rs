//! Tool rewriting for the unified catalog.
//!
//! Every upstream tool passes through [`ToolTransformer`] on its way into the
//! index: the name is namespaced, the description is cut down to its first
//! sentence (or replaced by a configured override) and property-level
//! documentation is stripped from the input schema.

mod transformer;

pub use transformer::{ToolTransformer, MAX_DESCRIPTION_CHARS};
