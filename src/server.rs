//! MCP server face of the gateway and its process lifecycle.
//!
//! [`ProxyServer`] answers `tools/list` and `tools/call` from the
//! [`Dispatcher`]. [`Gateway`] drives the three phases: starting (connect all
//! upstreams, build the catalog), serving (until the client goes away or a
//! shutdown is requested) and shutting down (disconnect all upstreams, once).

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use anyhow::Context;
use gateway_mcp::{Dispatcher, GatewayConfig, ProxyConfig, RefreshReport, UpstreamManager};
use rmcp::{
    model::{
        CallToolRequestParam, CallToolResult, Implementation, ListToolsResult,
        PaginatedRequestParam, ServerCapabilities, ServerInfo,
    },
    service::RequestContext,
    transport::{io::stdio, IntoTransport},
    ErrorData, RoleServer, ServerHandler, ServiceExt,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// rmcp handler exposing the unified catalog.
#[derive(Clone)]
pub struct ProxyServer {
    dispatcher: Arc<Dispatcher>,
    name: String,
    version: String,
}

impl ProxyServer {
    pub fn new(dispatcher: Arc<Dispatcher>, proxy: &ProxyConfig) -> Self {
        Self {
            dispatcher,
            name: proxy.name.clone(),
            version: proxy.version.clone(),
        }
    }
}

impl ServerHandler for ProxyServer {
    fn get_info(&self) -> ServerInfo {
        let mut server_info = Implementation::from_build_env();
        server_info.name = self.name.clone();
        server_info.version = self.version.clone();

        ServerInfo {
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info,
            ..Default::default()
        }
    }

    async fn list_tools(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, ErrorData> {
        let tools = self.dispatcher.list_tools();
        debug!("Listing {} tools", tools.len());
        Ok(ListToolsResult {
            tools,
            ..Default::default()
        })
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParam,
        _context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, ErrorData> {
        Ok(self
            .dispatcher
            .call_tool(&request.name, request.arguments)
            .await)
    }
}

pub struct Gateway {
    dispatcher: Arc<Dispatcher>,
    proxy: ProxyConfig,
    stopped: AtomicBool,
}

impl Gateway {
    pub fn new(dispatcher: Arc<Dispatcher>, proxy: ProxyConfig) -> Self {
        Self {
            dispatcher,
            proxy,
            stopped: AtomicBool::new(false),
        }
    }

    /// Gateway over the real stdio/HTTP upstream transports.
    pub fn from_config(config: GatewayConfig) -> Self {
        let proxy = config.proxy.clone();
        let manager = Arc::new(UpstreamManager::with_transports(Arc::new(config)));
        Self::new(Arc::new(Dispatcher::from_manager(manager)), proxy)
    }

    /// Starting phase: connect every upstream, then build the catalog.
    pub async fn start(&self) -> RefreshReport {
        info!(
            "Starting {} v{} with upstreams: {}",
            self.proxy.name,
            self.proxy.version,
            self.dispatcher.manager().client_names().join(", ")
        );
        let report = self.dispatcher.start().await;
        info!(
            "Gateway ready: {}/{} upstreams connected, {} tools registered",
            self.dispatcher.manager().connected_count(),
            self.dispatcher.manager().config().upstreams.len(),
            report.total_tools
        );
        report
    }

    pub fn server(&self) -> ProxyServer {
        ProxyServer::new(Arc::clone(&self.dispatcher), &self.proxy)
    }

    /// Starting phase, abandoned as soon as `shutdown` is cancelled.
    ///
    /// Returns `None` when cancelled; upstreams are disconnected by then.
    pub async fn start_unless_cancelled(
        &self,
        shutdown: &CancellationToken,
    ) -> Option<RefreshReport> {
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => {
                info!("Shutdown requested while starting");
                self.shutdown().await;
                None
            }
            report = self.start() => Some(report),
        }
    }

    /// Serving phase over `transport`, followed by shutdown.
    ///
    /// Returns when the client disconnects or `shutdown` is cancelled, also
    /// while still waiting for the client to initialize. Upstreams are
    /// disconnected on every exit path, before the transport is closed.
    pub async fn serve<T, E, A>(
        &self,
        transport: T,
        shutdown: CancellationToken,
    ) -> anyhow::Result<()>
    where
        T: IntoTransport<RoleServer, E, A>,
        E: std::error::Error + Send + Sync + 'static,
    {
        let service = tokio::select! {
            biased;
            _ = shutdown.cancelled() => {
                info!("Shutdown requested before the MCP client initialized");
                self.shutdown().await;
                return Ok(());
            }
            started = self.server().serve(transport) => match started {
                Ok(service) => service,
                Err(e) => {
                    error!("MCP client failed to initialize: {}", e);
                    self.shutdown().await;
                    return Err(e).context("Failed to start MCP service");
                }
            },
        };
        info!("Serving MCP on the external transport");

        // The service cancels its transport when dropped, so it lives in its
        // own task until the upstreams are gone.
        let transport_token = service.cancellation_token();
        let mut serving = tokio::spawn(service.waiting());
        tokio::select! {
            quit = &mut serving => {
                match quit {
                    Ok(Ok(reason)) => info!("MCP client disconnected: {:?}", reason),
                    Ok(Err(e)) | Err(e) => warn!("MCP service task ended abnormally: {}", e),
                }
                self.shutdown().await;
            }
            _ = shutdown.cancelled() => {
                self.shutdown().await;
                info!("Closing MCP transport");
                transport_token.cancel();
                if let Err(e) = serving.await {
                    warn!("MCP service task ended abnormally: {}", e);
                }
            }
        }
        Ok(())
    }

    /// Shutting-down phase. Only the first call does any work.
    pub async fn shutdown(&self) {
        if self.stopped.swap(true, Ordering::SeqCst) {
            debug!("Shutdown already performed");
            return;
        }
        info!("Shutting down, disconnecting upstreams");
        self.dispatcher.shutdown().await;
        info!("Shutdown complete");
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }
}

/// Cancel `token` on SIGINT or SIGTERM.
pub fn spawn_signal_listener(token: CancellationToken) {
    let sigint_token = token.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Received SIGINT, initiating graceful shutdown");
                sigint_token.cancel();
            }
            Err(e) => error!("Failed to listen for SIGINT: {}", e),
        }
    });

    #[cfg(unix)]
    tokio::spawn(async move {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
                info!("Received SIGTERM, initiating graceful shutdown");
                token.cancel();
            }
            Err(e) => error!("Failed to listen for SIGTERM: {}", e),
        }
    });
}

/// Full process lifecycle over stdio.
pub async fn run(config: GatewayConfig) -> anyhow::Result<()> {
    let shutdown = CancellationToken::new();
    spawn_signal_listener(shutdown.clone());

    let gateway = Gateway::from_config(config);
    if gateway.start_unless_cancelled(&shutdown).await.is_none() {
        return Ok(());
    }

    gateway.serve(stdio(), shutdown).await
}
