//! MCP tool gateway core.
//!
//! ## Modules
//!
//! - [`core`]: upstream clients, connection manager, dispatcher, config types
//! - [`inventory`]: unified tool catalog and public-name resolution
//! - [`transform`]: description and schema compression, namespacing

pub mod error;
pub mod transform;

pub mod core;
pub mod inventory;

pub use core::{config, manager};
pub use core::{
    CallToolResult, ConnectionState, Content, Dispatcher, GatewayConfig, HttpUpstream,
    JsonObject, NamespacingConfig, ProxyConfig, StdioUpstream, Tool, TransportFactory,
    UpstreamClient, UpstreamConfig, UpstreamFactory, UpstreamManager, UpstreamTransport,
};
pub use error::{McpError, McpResult};
pub use inventory::{
    NameCollision, RefreshReport, RegisteredTool, ToolIndex, ToolRegistry, ToolTarget,
};
pub use transform::ToolTransformer;
