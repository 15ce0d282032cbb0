//! Gateway configuration.
//!
//! The config types themselves live in the core crate; this module turns a
//! YAML file into one of them.

pub mod error;
pub mod loader;

pub use error::ConfigError;
pub use gateway_mcp::config::{
    GatewayConfig, NamespacingConfig, ProxyConfig, UpstreamConfig, UpstreamTransport,
};
pub use loader::{expand_env_vars, load_config, DEFAULT_CONFIG_PATH};
