//! Public-name index over registered tools.
//!
//! An index is built once per refresh and then only read. Entries keep their
//! insertion order; re-inserting an existing public name replaces the entry
//! in place.

use std::collections::HashMap;

use super::types::{RegisteredTool, ToolTarget};
use crate::core::config::Tool;

#[derive(Debug, Clone, Default)]
pub struct ToolIndex {
    entries: Vec<RegisteredTool>,
    positions: HashMap<String, usize>,
}

impl ToolIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an entry under its public name.
    ///
    /// Returns the entry it replaced, if any.
    pub fn insert(&mut self, entry: RegisteredTool) -> Option<RegisteredTool> {
        match self.positions.get(entry.public_name()) {
            Some(&pos) => Some(std::mem::replace(&mut self.entries[pos], entry)),
            None => {
                self.positions
                    .insert(entry.public_name().to_string(), self.entries.len());
                self.entries.push(entry);
                None
            }
        }
    }

    pub fn get(&self, public_name: &str) -> Option<&RegisteredTool> {
        self.positions
            .get(public_name)
            .and_then(|&pos| self.entries.get(pos))
    }

    pub fn resolve(&self, public_name: &str) -> Option<ToolTarget> {
        self.get(public_name).map(|entry| entry.target.clone())
    }

    /// Public descriptors in insertion order.
    pub fn tools(&self) -> Vec<Tool> {
        self.entries.iter().map(|entry| entry.tool.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
