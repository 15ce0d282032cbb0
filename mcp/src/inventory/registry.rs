//! Unified tool registry.
//!
//! Builds the externally visible catalog from every connected upstream:
//! filter by allow-list, rewrite through [`ToolTransformer`], then index by
//! public name. Each refresh builds a fresh [`ToolIndex`] and publishes it
//! with a single pointer swap, so readers see either the old catalog or the
//! new one.

use std::sync::Arc;

use arc_swap::ArcSwap;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use super::{
    index::ToolIndex,
    types::{NameCollision, RefreshReport, RegisteredTool, ToolTarget},
};
use crate::{
    core::{config::Tool, manager::UpstreamManager},
    transform::ToolTransformer,
};

pub struct ToolRegistry {
    manager: Arc<UpstreamManager>,
    index: ArcSwap<ToolIndex>,
    refresh_lock: Mutex<()>,
}

impl ToolRegistry {
    pub fn new(manager: Arc<UpstreamManager>) -> Self {
        Self {
            manager,
            index: ArcSwap::from_pointee(ToolIndex::new()),
            refresh_lock: Mutex::new(()),
        }
    }

    /// Rebuild the catalog from scratch and publish it.
    ///
    /// Upstreams are visited in configuration order. One that is not
    /// connected, or whose catalog cannot be fetched, contributes nothing.
    /// When namespacing is off a later upstream overwrites an earlier one's
    /// tool of the same name.
    pub async fn refresh_tools(&self) -> RefreshReport {
        let _guard = self.refresh_lock.lock().await;

        let config = self.manager.config();
        let namespacing = &config.proxy.namespacing;
        let mut index = ToolIndex::new();
        let mut report = RefreshReport::default();

        for upstream in &config.upstreams {
            let client = match self.manager.get_client(&upstream.name) {
                Some(client) if client.is_connected() => client,
                _ => {
                    warn!("Upstream '{}' is not connected, skipping", upstream.name);
                    report.skipped.push(upstream.name.clone());
                    continue;
                }
            };

            let offered = match client.list_tools().await {
                Ok(tools) => tools,
                Err(e) => {
                    error!("Failed to list tools from '{}': {}", upstream.name, e);
                    report.failed.push(upstream.name.clone());
                    continue;
                }
            };

            let mut registered = 0;
            for tool in offered.iter().filter(|t| upstream.allows_tool(&t.name)) {
                let public = ToolTransformer::transform(tool, upstream, namespacing);
                let entry = RegisteredTool::new(
                    public,
                    ToolTarget::new(upstream.name.as_str(), tool.name.to_string()),
                );
                if let Some(previous) = index.insert(entry) {
                    if previous.upstream() != upstream.name {
                        warn!(
                            "Tool '{}' from '{}' replaces the one from '{}'",
                            previous.public_name(),
                            upstream.name,
                            previous.upstream()
                        );
                        report.collisions.push(NameCollision {
                            public_name: previous.public_name().to_string(),
                            replaced: previous.upstream().to_string(),
                            winner: upstream.name.clone(),
                        });
                    } else {
                        debug!(
                            "Upstream '{}' listed '{}' more than once",
                            upstream.name,
                            previous.original_name()
                        );
                    }
                }
                registered += 1;
            }

            info!(
                "Registered {}/{} tools from '{}'",
                registered,
                offered.len(),
                upstream.name
            );
            report
                .upstreams
                .push((upstream.name.clone(), registered, offered.len()));
        }

        report.total_tools = index.len();
        self.index.store(Arc::new(index));
        info!("Total registered tools: {}", report.total_tools);
        report
    }

    /// Every public descriptor in the current catalog.
    pub fn get_tools(&self) -> Vec<Tool> {
        self.index.load().tools()
    }

    pub fn resolve_tool_name(&self, public_name: &str) -> Option<ToolTarget> {
        self.index.load().resolve(public_name)
    }

    pub fn manager(&self) -> &Arc<UpstreamManager> {
        &self.manager
    }
}
