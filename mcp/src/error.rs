//! Gateway error types.
//!
//! Defines error variants raised by upstream clients and the manager.
//! Routing misses (unknown tool, unavailable upstream) are not errors: the
//! dispatcher turns them into `isError` results directly.

use std::time::Duration;

use thiserror::Error;

pub type McpResult<T> = Result<T, McpError>;

#[derive(Debug, Error)]
pub enum McpError {
    #[error("Upstream {0} is not connected")]
    NotConnected(String),

    #[error("Connection to upstream {upstream} timed out after {}ms", timeout.as_millis())]
    ConnectionTimeout { upstream: String, timeout: Duration },

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Tool execution failed: {0}")]
    ToolExecution(String),
}

impl McpError {
    /// True for faults that mean the upstream could not be reached at all.
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            McpError::NotConnected(_)
                | McpError::ConnectionTimeout { .. }
                | McpError::ConnectionFailed(_)
                | McpError::Transport(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_message_names_upstream_and_bound() {
        let err = McpError::ConnectionTimeout {
            upstream: "fs".to_string(),
            timeout: Duration::from_secs(10),
        };
        assert_eq!(
            err.to_string(),
            "Connection to upstream fs timed out after 10000ms"
        );
        assert!(err.is_connection_error());
    }

    #[test]
    fn test_tool_execution_is_not_connection_error() {
        let err = McpError::ToolExecution("boom".to_string());
        assert!(!err.is_connection_error());
        assert_eq!(err.to_string(), "Tool execution failed: boom");
    }
}
