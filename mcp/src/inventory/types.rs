//! Core types for the tool inventory.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::config::Tool;

/// Where a public tool name routes to: `upstream` + the tool's original name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ToolTarget {
    pub upstream: String,
    pub original_name: String,
}

impl ToolTarget {
    pub fn new(upstream: impl Into<String>, original_name: impl Into<String>) -> Self {
        Self {
            upstream: upstream.into(),
            original_name: original_name.into(),
        }
    }
}

impl fmt::Display for ToolTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.upstream, self.original_name)
    }
}

/// A tool as it appears on the unified surface, plus its route back.
#[derive(Debug, Clone)]
pub struct RegisteredTool {
    /// Public descriptor: namespaced name, compressed description and schema
    pub tool: Tool,
    pub target: ToolTarget,
}

impl RegisteredTool {
    pub fn new(tool: Tool, target: ToolTarget) -> Self {
        Self { tool, target }
    }

    pub fn public_name(&self) -> &str {
        &self.tool.name
    }

    pub fn upstream(&self) -> &str {
        &self.target.upstream
    }

    pub fn original_name(&self) -> &str {
        &self.target.original_name
    }
}

/// Two upstreams produced the same public name during one refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameCollision {
    pub public_name: String,
    /// Upstream whose entry was replaced
    pub replaced: String,
    /// Upstream that now owns the name
    pub winner: String,
}

/// Outcome of one catalog refresh.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefreshReport {
    /// Tools in the published index
    pub total_tools: usize,
    /// `(upstream, registered, offered)` for every upstream that answered
    pub upstreams: Vec<(String, usize, usize)>,
    /// Upstreams without a connected client
    pub skipped: Vec<String>,
    /// Upstreams whose catalog could not be fetched
    pub failed: Vec<String>,
    pub collisions: Vec<NameCollision>,
}

impl RefreshReport {
    pub fn registered_from(&self, upstream: &str) -> usize {
        self.upstreams
            .iter()
            .find(|(name, _, _)| name == upstream)
            .map(|(_, registered, _)| *registered)
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use std::{borrow::Cow, sync::Arc};

    use super::*;

    #[test]
    fn test_target_display() {
        let target = ToolTarget::new("fs", "read_file");
        assert_eq!(target.to_string(), "fs:read_file");
    }

    #[test]
    fn test_registered_tool_accessors() {
        let tool = Tool {
            name: Cow::Borrowed("fs__read_file"),
            title: None,
            description: None,
            input_schema: Arc::new(serde_json::Map::new()),
            output_schema: None,
            annotations: None,
            icons: None,
        };
        let entry = RegisteredTool::new(tool, ToolTarget::new("fs", "read_file"));
        assert_eq!(entry.public_name(), "fs__read_file");
        assert_eq!(entry.upstream(), "fs");
        assert_eq!(entry.original_name(), "read_file");
    }

    #[test]
    fn test_report_lookup_defaults_to_zero() {
        let report = RefreshReport {
            upstreams: vec![("fs".to_string(), 2, 5)],
            ..Default::default()
        };
        assert_eq!(report.registered_from("fs"), 2);
        assert_eq!(report.registered_from("missing"), 0);
    }
}
