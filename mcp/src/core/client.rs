//! Upstream client capability.
//!
//! Every backend, whatever its transport, is driven through [`UpstreamClient`].
//! The transports in [`super::transport`] only differ in how they open the
//! rmcp session; state tracking, teardown and the list/call paths are shared
//! through [`UpstreamSession`].

use std::{borrow::Cow, fmt, future::Future, time::Duration};

use async_trait::async_trait;
use parking_lot::RwLock;
use rmcp::{
    model::{CallToolRequestParam, ClientInfo},
    service::{Peer, RunningService},
    RoleClient,
};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::config::{CallToolResult, JsonObject, Tool};
use crate::error::{McpError, McpResult};

/// Running rmcp client session for one upstream
pub(crate) type McpService = RunningService<RoleClient, ClientInfo>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
        };
        f.write_str(s)
    }
}

/// Uniform capability set over one backend tool provider.
#[async_trait]
pub trait UpstreamClient: Send + Sync {
    /// Upstream name as configured.
    fn name(&self) -> &str;

    /// Establish the connection. Calling it on a connected client is a no-op.
    async fn connect(&self) -> McpResult<()>;

    /// Release the connection. Safe to call in any state, any number of times.
    async fn disconnect(&self) -> McpResult<()>;

    /// Current catalog of the backend. Fails with `NotConnected` when idle.
    async fn list_tools(&self) -> McpResult<Vec<Tool>>;

    /// Invoke a backend tool by its original name.
    ///
    /// A tool that reports failure comes back as `Ok` with `is_error` set.
    async fn call_tool(&self, name: &str, args: JsonObject) -> McpResult<CallToolResult>;

    fn state(&self) -> ConnectionState;

    fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }
}

/// Build the identity an upstream connection announces during the handshake.
pub(crate) fn client_info(proxy_name: &str, proxy_version: &str, upstream: &str) -> ClientInfo {
    let mut info = ClientInfo::default();
    info.client_info.name = format!("{}-{}", proxy_name, upstream);
    info.client_info.version = proxy_version.to_string();
    info
}

/// Connection bookkeeping shared by every transport.
pub(crate) struct UpstreamSession {
    name: String,
    state: RwLock<ConnectionState>,
    service: Mutex<Option<McpService>>,
}

impl UpstreamSession {
    pub(crate) fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: RwLock::new(ConnectionState::Disconnected),
            service: Mutex::new(None),
        }
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn state(&self) -> ConnectionState {
        *self.state.read()
    }

    fn set_state(&self, state: ConnectionState) {
        *self.state.write() = state;
    }

    /// Run `open` under `timeout` unless a session is already live.
    ///
    /// The open future owns the half-built transport, so on timeout it is
    /// dropped together with any child process it spawned.
    pub(crate) async fn connect_with<F, Fut>(&self, timeout: Duration, open: F) -> McpResult<()>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = McpResult<McpService>>,
    {
        let mut slot = self.service.lock().await;
        if slot.is_some() && self.state() == ConnectionState::Connected {
            debug!("Upstream '{}' already connected", self.name);
            return Ok(());
        }

        self.set_state(ConnectionState::Connecting);
        match tokio::time::timeout(timeout, open()).await {
            Ok(Ok(service)) => {
                *slot = Some(service);
                self.set_state(ConnectionState::Connected);
                Ok(())
            }
            Ok(Err(e)) => {
                self.set_state(ConnectionState::Disconnected);
                Err(e)
            }
            Err(_) => {
                self.set_state(ConnectionState::Disconnected);
                Err(McpError::ConnectionTimeout {
                    upstream: self.name.clone(),
                    timeout,
                })
            }
        }
    }

    pub(crate) async fn disconnect(&self) -> McpResult<()> {
        let service = self.service.lock().await.take();
        self.set_state(ConnectionState::Disconnected);

        let Some(service) = service else {
            return Ok(());
        };
        service.cancel().await.map_err(|e| {
            warn!("Error closing session for '{}': {}", self.name, e);
            McpError::Transport(format!("close session for {}: {}", self.name, e))
        })?;
        Ok(())
    }

    async fn peer(&self) -> McpResult<Peer<RoleClient>> {
        if self.state() != ConnectionState::Connected {
            return Err(McpError::NotConnected(self.name.clone()));
        }
        self.service
            .lock()
            .await
            .as_ref()
            .map(|service| service.peer().clone())
            .ok_or_else(|| McpError::NotConnected(self.name.clone()))
    }

    pub(crate) async fn list_tools(&self) -> McpResult<Vec<Tool>> {
        let peer = self.peer().await?;
        peer.list_all_tools()
            .await
            .map_err(|e| McpError::Transport(format!("list tools from {}: {}", self.name, e)))
    }

    pub(crate) async fn call_tool(
        &self,
        name: &str,
        args: JsonObject,
    ) -> McpResult<CallToolResult> {
        let peer = self.peer().await?;
        let request = CallToolRequestParam {
            name: Cow::Owned(name.to_string()),
            arguments: Some(args),
        };
        peer.call_tool(request)
            .await
            .map_err(|e| McpError::ToolExecution(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_info_identity() {
        let info = client_info("mcp-proxy-gateway", "1.0.0", "fs");
        assert_eq!(info.client_info.name, "mcp-proxy-gateway-fs");
        assert_eq!(info.client_info.version, "1.0.0");
    }

    #[tokio::test]
    async fn test_session_starts_disconnected() {
        let session = UpstreamSession::new("fs");
        assert_eq!(session.state(), ConnectionState::Disconnected);
        assert_eq!(session.name(), "fs");
    }

    #[tokio::test]
    async fn test_list_and_call_require_connection() {
        let session = UpstreamSession::new("fs");

        let err = session.list_tools().await.unwrap_err();
        assert!(matches!(err, McpError::NotConnected(ref n) if n == "fs"));

        let err = session.call_tool("read_file", JsonObject::new()).await.unwrap_err();
        assert!(matches!(err, McpError::NotConnected(_)));
    }

    #[tokio::test]
    async fn test_disconnect_without_connect_is_noop() {
        let session = UpstreamSession::new("fs");
        session.disconnect().await.unwrap();
        session.disconnect().await.unwrap();
        assert_eq!(session.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_failed_open_leaves_session_disconnected() {
        let session = UpstreamSession::new("broken");
        let err = session
            .connect_with(Duration::from_secs(1), || async {
                Err(McpError::ConnectionFailed("refused".to_string()))
            })
            .await
            .unwrap_err();

        assert!(matches!(err, McpError::ConnectionFailed(_)));
        assert_eq!(session.state(), ConnectionState::Disconnected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_exceeding_bound_times_out() {
        let session = UpstreamSession::new("slow");
        let err = session
            .connect_with(Duration::from_secs(10), || async {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Err(McpError::ConnectionFailed("unreachable".to_string()))
            })
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            McpError::ConnectionTimeout { ref upstream, timeout }
                if upstream == "slow" && timeout == Duration::from_secs(10)
        ));
        assert_eq!(session.state(), ConnectionState::Disconnected);
    }
}
