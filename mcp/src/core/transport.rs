//! Concrete upstream transports.
//!
//! - [`StdioUpstream`]: spawns the server as a child process and speaks MCP
//!   over its stdin/stdout.
//! - [`HttpUpstream`]: streamable HTTP session against a URL.
//!
//! Both bound the handshake with the configured connect timeout.

use std::{collections::HashMap, sync::Arc, time::Duration};

use async_trait::async_trait;
use rmcp::{
    model::ClientInfo,
    transport::{
        streamable_http_client::StreamableHttpClientTransportConfig, ConfigureCommandExt,
        StreamableHttpClientTransport, TokioChildProcess,
    },
    ServiceExt,
};
use tracing::info;

use super::{
    client::{client_info, ConnectionState, McpService, UpstreamClient, UpstreamSession},
    config::{CallToolResult, GatewayConfig, JsonObject, Tool, UpstreamConfig, UpstreamTransport},
};
use crate::error::{McpError, McpResult};

/// Creates the client object for one configured upstream.
///
/// The manager only sees this seam, so tests can hand it scripted clients.
pub trait UpstreamFactory: Send + Sync {
    fn create(&self, upstream: &UpstreamConfig) -> Arc<dyn UpstreamClient>;
}

/// Default factory: picks the transport from the `type` discriminator.
#[derive(Debug, Clone)]
pub struct TransportFactory {
    proxy_name: String,
    proxy_version: String,
    connect_timeout: Duration,
}

impl TransportFactory {
    pub fn new(
        proxy_name: impl Into<String>,
        proxy_version: impl Into<String>,
        connect_timeout: Duration,
    ) -> Self {
        Self {
            proxy_name: proxy_name.into(),
            proxy_version: proxy_version.into(),
            connect_timeout,
        }
    }

    pub fn from_config(config: &GatewayConfig) -> Self {
        Self::new(
            config.proxy.name.clone(),
            config.proxy.version.clone(),
            config.connect_timeout(),
        )
    }
}

impl UpstreamFactory for TransportFactory {
    fn create(&self, upstream: &UpstreamConfig) -> Arc<dyn UpstreamClient> {
        let info = client_info(&self.proxy_name, &self.proxy_version, &upstream.name);
        match &upstream.transport {
            UpstreamTransport::Stdio { command, args, env } => Arc::new(StdioUpstream::new(
                &upstream.name,
                command.clone(),
                args.clone(),
                env.clone(),
                info,
                self.connect_timeout,
            )),
            UpstreamTransport::Http { url, token } => Arc::new(HttpUpstream::new(
                &upstream.name,
                url.clone(),
                token.clone(),
                info,
                self.connect_timeout,
            )),
        }
    }
}

pub struct StdioUpstream {
    session: UpstreamSession,
    command: String,
    args: Vec<String>,
    env: HashMap<String, String>,
    client_info: ClientInfo,
    connect_timeout: Duration,
}

impl StdioUpstream {
    pub fn new(
        name: &str,
        command: String,
        args: Vec<String>,
        env: HashMap<String, String>,
        client_info: ClientInfo,
        connect_timeout: Duration,
    ) -> Self {
        Self {
            session: UpstreamSession::new(name),
            command,
            args,
            env,
            client_info,
            connect_timeout,
        }
    }

    async fn open(&self) -> McpResult<McpService> {
        info!(
            "Connecting to stdio upstream '{}': {} {:?}",
            self.session.name(),
            self.command,
            self.args
        );

        let command = tokio::process::Command::new(&self.command).configure(|cmd| {
            cmd.args(&self.args)
                .envs(self.env.iter())
                .stderr(std::process::Stdio::inherit())
                .kill_on_drop(true);
        });
        let transport = TokioChildProcess::new(command)
            .map_err(|e| McpError::Transport(format!("create stdio transport: {}", e)))?;

        let service = self.client_info.clone().serve(transport).await.map_err(|e| {
            McpError::ConnectionFailed(format!("initialize stdio client: {}", e))
        })?;

        info!("Connected to stdio upstream '{}'", self.session.name());
        Ok(service)
    }
}

#[async_trait]
impl UpstreamClient for StdioUpstream {
    fn name(&self) -> &str {
        self.session.name()
    }

    async fn connect(&self) -> McpResult<()> {
        self.session
            .connect_with(self.connect_timeout, || self.open())
            .await
    }

    async fn disconnect(&self) -> McpResult<()> {
        self.session.disconnect().await
    }

    async fn list_tools(&self) -> McpResult<Vec<Tool>> {
        self.session.list_tools().await
    }

    async fn call_tool(&self, name: &str, args: JsonObject) -> McpResult<CallToolResult> {
        self.session.call_tool(name, args).await
    }

    fn state(&self) -> ConnectionState {
        self.session.state()
    }
}

pub struct HttpUpstream {
    session: UpstreamSession,
    url: String,
    token: Option<String>,
    client_info: ClientInfo,
    connect_timeout: Duration,
}

impl HttpUpstream {
    pub fn new(
        name: &str,
        url: String,
        token: Option<String>,
        client_info: ClientInfo,
        connect_timeout: Duration,
    ) -> Self {
        Self {
            session: UpstreamSession::new(name),
            url,
            token,
            client_info,
            connect_timeout,
        }
    }

    async fn open(&self) -> McpResult<McpService> {
        info!(
            "Connecting to HTTP upstream '{}' at {}",
            self.session.name(),
            self.url
        );

        let transport = if let Some(tok) = &self.token {
            let mut cfg = StreamableHttpClientTransportConfig::with_uri(self.url.as_str());
            cfg.auth_header = Some(tok.to_string());
            StreamableHttpClientTransport::from_config(cfg)
        } else {
            StreamableHttpClientTransport::from_uri(self.url.as_str())
        };

        let service = self.client_info.clone().serve(transport).await.map_err(|e| {
            McpError::ConnectionFailed(format!("initialize streamable client: {}", e))
        })?;

        info!(
            "Connected to HTTP upstream '{}' at {}",
            self.session.name(),
            self.url
        );
        Ok(service)
    }
}

#[async_trait]
impl UpstreamClient for HttpUpstream {
    fn name(&self) -> &str {
        self.session.name()
    }

    async fn connect(&self) -> McpResult<()> {
        self.session
            .connect_with(self.connect_timeout, || self.open())
            .await
    }

    async fn disconnect(&self) -> McpResult<()> {
        self.session.disconnect().await
    }

    async fn list_tools(&self) -> McpResult<Vec<Tool>> {
        self.session.list_tools().await
    }

    async fn call_tool(&self, name: &str, args: JsonObject) -> McpResult<CallToolResult> {
        self.session.call_tool(name, args).await
    }

    fn state(&self) -> ConnectionState {
        self.session.state()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn factory() -> TransportFactory {
        TransportFactory::new("gw", "0.1.0", Duration::from_millis(500))
    }

    #[test]
    fn test_factory_dispatches_on_transport_kind() {
        let factory = factory();

        let stdio = factory.create(&UpstreamConfig::stdio("local", "mcp-server"));
        assert_eq!(stdio.name(), "local");
        assert_eq!(stdio.state(), ConnectionState::Disconnected);

        let http = factory.create(&UpstreamConfig::http("remote", "http://127.0.0.1:1/mcp"));
        assert_eq!(http.name(), "remote");
        assert!(!http.is_connected());
    }

    #[test]
    fn test_factory_from_config_uses_proxy_settings() {
        let mut config = GatewayConfig::default();
        config.proxy.connect_timeout_secs = 3;
        let factory = TransportFactory::from_config(&config);
        assert_eq!(factory.connect_timeout, Duration::from_secs(3));
        assert_eq!(factory.proxy_name, "mcp-proxy-gateway");
    }

    #[tokio::test]
    async fn test_stdio_spawn_failure_stays_disconnected() {
        let client = factory().create(&UpstreamConfig::stdio(
            "ghost",
            "/nonexistent/definitely-not-an-mcp-server",
        ));

        let err = client.connect().await.unwrap_err();
        assert!(err.is_connection_error());
        assert!(!client.is_connected());

        // disconnect after a failed connect is still fine
        client.disconnect().await.unwrap();
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_stdio_handshake_timeout_kills_child() {
        let dir = tempfile::tempdir().unwrap();
        let pid_file = dir.path().join("child.pid");
        // records its pid, then never answers initialize
        let client = StdioUpstream::new(
            "mute",
            "sh".to_string(),
            vec![
                "-c".to_string(),
                "echo $$ > \"$0\"; exec sleep 30".to_string(),
                pid_file.display().to_string(),
            ],
            HashMap::new(),
            client_info("gw", "0.1.0", "mute"),
            Duration::from_millis(500),
        );

        let err = client.connect().await.unwrap_err();
        assert!(matches!(
            err,
            McpError::ConnectionTimeout { ref upstream, .. } if upstream == "mute"
        ));
        assert!(!client.is_connected());

        let pid = std::fs::read_to_string(&pid_file).unwrap();
        let stat = format!("/proc/{}/stat", pid.trim());
        let mut exited = false;
        for _ in 0..50 {
            match std::fs::read_to_string(&stat) {
                Err(_) => {
                    exited = true;
                    break;
                }
                Ok(line) if line.contains(") Z ") => {
                    exited = true;
                    break;
                }
                Ok(_) => tokio::time::sleep(Duration::from_millis(100)).await,
            }
        }
        assert!(exited, "child {} outlived the handshake timeout", pid.trim());
    }

    #[tokio::test]
    async fn test_idle_client_rejects_calls() {
        let client = factory().create(&UpstreamConfig::http("remote", "http://127.0.0.1:1/mcp"));
        let err = client
            .call_tool("anything", JsonObject::new())
            .await
            .unwrap_err();
        assert!(matches!(err, McpError::NotConnected(_)));
    }
}
