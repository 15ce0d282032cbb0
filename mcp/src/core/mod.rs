//! Core gateway infrastructure.

pub mod client;
pub mod config;
pub mod dispatcher;
pub mod manager;
pub mod transport;

pub use client::{ConnectionState, UpstreamClient};
pub use config::{
    CallToolResult, Content, GatewayConfig, JsonObject, NamespacingConfig, ProxyConfig, Tool,
    UpstreamConfig, UpstreamTransport,
};
pub use dispatcher::Dispatcher;
pub use manager::UpstreamManager;
pub use transport::{HttpUpstream, StdioUpstream, TransportFactory, UpstreamFactory};
