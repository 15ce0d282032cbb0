//! Upstream connection management.
//!
//! Owns one [`UpstreamClient`] per configured upstream. Connects and
//! disconnects fan out concurrently and a failing upstream never affects the
//! others: it is logged and left registered in the disconnected state.

use std::sync::Arc;

use dashmap::DashMap;
use futures::future::join_all;
use tracing::{debug, error, info, info_span, warn, Instrument};

use super::{
    client::UpstreamClient,
    config::{GatewayConfig, UpstreamConfig},
    transport::{TransportFactory, UpstreamFactory},
};

pub struct UpstreamManager {
    config: Arc<GatewayConfig>,
    factory: Arc<dyn UpstreamFactory>,
    clients: DashMap<String, Arc<dyn UpstreamClient>>,
}

impl UpstreamManager {
    pub fn new(config: Arc<GatewayConfig>, factory: Arc<dyn UpstreamFactory>) -> Self {
        Self {
            config,
            factory,
            clients: DashMap::new(),
        }
    }

    /// Manager backed by the real stdio/HTTP transports.
    pub fn with_transports(config: Arc<GatewayConfig>) -> Self {
        let factory = Arc::new(TransportFactory::from_config(&config));
        Self::new(config, factory)
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Create and connect every configured upstream concurrently.
    ///
    /// Never fails as a whole. Clients that could not connect stay in the map
    /// so that lookups still find them. Returns the number of connected
    /// upstreams.
    pub async fn connect_all(&self) -> usize {
        let clients: Vec<Arc<dyn UpstreamClient>> = self
            .config
            .upstreams
            .iter()
            .map(|upstream| {
                let client = self
                    .clients
                    .entry(upstream.name.clone())
                    .or_insert_with(|| self.factory.create(upstream));
                Arc::clone(client.value())
            })
            .collect();

        let attempts = clients.into_iter().map(|client| {
            let span = info_span!("upstream", name = %client.name());
            async move {
                match client.connect().await {
                    Ok(()) => {
                        info!("Connected to upstream '{}'", client.name());
                        true
                    }
                    Err(e) => {
                        error!("Failed to connect to upstream '{}': {}", client.name(), e);
                        false
                    }
                }
            }
            .instrument(span)
        });

        let connected = join_all(attempts).await.into_iter().filter(|ok| *ok).count();
        info!(
            "Connected {}/{} upstreams",
            connected,
            self.config.upstreams.len()
        );
        connected
    }

    /// Disconnect every client concurrently, then forget them.
    pub async fn disconnect_all(&self) {
        let clients: Vec<Arc<dyn UpstreamClient>> = self
            .clients
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();

        let closes = clients.into_iter().map(|client| {
            let span = info_span!("upstream", name = %client.name());
            async move {
                if let Err(e) = client.disconnect().await {
                    warn!("Error disconnecting from upstream '{}': {}", client.name(), e);
                } else {
                    debug!("Disconnected from upstream '{}'", client.name());
                }
            }
            .instrument(span)
        });

        join_all(closes).await;
        self.clients.clear();
        info!("All upstreams disconnected");
    }

    pub fn get_client(&self, name: &str) -> Option<Arc<dyn UpstreamClient>> {
        self.clients.get(name).map(|c| Arc::clone(c.value()))
    }

    pub fn get_upstream_config(&self, name: &str) -> Option<&UpstreamConfig> {
        self.config.upstream(name)
    }

    /// Names of registered clients, in configuration order.
    pub fn client_names(&self) -> Vec<String> {
        self.config
            .upstreams
            .iter()
            .filter(|u| self.clients.contains_key(&u.name))
            .map(|u| u.name.clone())
            .collect()
    }

    pub fn connected_count(&self) -> usize {
        self.clients
            .iter()
            .filter(|entry| entry.value().is_connected())
            .count()
    }
}
