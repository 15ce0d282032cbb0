//! Routing of `tools/list` and `tools/call` onto upstreams.
//!
//! The dispatcher never returns an error to its caller. Routing misses and
//! upstream faults all come back as `CallToolResult` values with `is_error`
//! set and a single text block describing what went wrong.

use std::sync::Arc;

use tracing::{debug, error, warn};

use super::{
    config::{CallToolResult, Content, JsonObject, Tool},
    manager::UpstreamManager,
};
use crate::inventory::{RefreshReport, ToolRegistry};

pub struct Dispatcher {
    manager: Arc<UpstreamManager>,
    registry: Arc<ToolRegistry>,
}

impl Dispatcher {
    pub fn new(manager: Arc<UpstreamManager>, registry: Arc<ToolRegistry>) -> Self {
        Self { manager, registry }
    }

    /// Build the whole stack over `manager`.
    pub fn from_manager(manager: Arc<UpstreamManager>) -> Self {
        let registry = Arc::new(ToolRegistry::new(Arc::clone(&manager)));
        Self::new(manager, registry)
    }

    /// Connect every upstream, then build the first catalog.
    pub async fn start(&self) -> RefreshReport {
        self.manager.connect_all().await;
        self.registry.refresh_tools().await
    }

    pub async fn shutdown(&self) {
        self.manager.disconnect_all().await;
    }

    pub fn list_tools(&self) -> Vec<Tool> {
        self.registry.get_tools()
    }

    pub async fn call_tool(&self, name: &str, args: Option<JsonObject>) -> CallToolResult {
        let Some(target) = self.registry.resolve_tool_name(name) else {
            warn!("Unknown tool requested: '{}'", name);
            return error_result(format!("Unknown tool: {}", name));
        };

        let client = match self.manager.get_client(&target.upstream) {
            Some(client) if client.is_connected() => client,
            _ => {
                warn!(
                    "Tool '{}' routes to unavailable upstream '{}'",
                    name, target.upstream
                );
                return error_result(format!("Upstream {} is not available", target.upstream));
            }
        };

        debug!(
            "Routing '{}' to '{}' as '{}'",
            name, target.upstream, target.original_name
        );
        match client
            .call_tool(&target.original_name, args.unwrap_or_default())
            .await
        {
            Ok(result) => result,
            Err(e) => {
                error!("Tool call '{}' on '{}' failed: {}", name, target.upstream, e);
                error_result(format!("Tool call failed: {}", e))
            }
        }
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    pub fn manager(&self) -> &Arc<UpstreamManager> {
        &self.manager
    }
}

fn error_result(message: String) -> CallToolResult {
    CallToolResult::error(vec![Content::text(message)])
}
