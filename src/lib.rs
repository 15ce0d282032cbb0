//! MCP proxy gateway.
//!
//! Loads the gateway config, sets up logging and serves the unified tool
//! catalog from [`gateway_mcp`] over stdio.

pub mod config;
pub mod logging;
pub mod server;

pub use server::{run, Gateway, ProxyServer};
