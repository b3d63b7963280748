//! Accept loop for the caching proxy.
//!
//! # Responsibilities
//! - Accept client connections from a bounded [`Listener`]
//! - Spawn one task per connection running the state machine
//! - Stop accepting on shutdown and drain in-flight connections

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tracing::Instrument;

use crate::cache::CacheStore;
use crate::config::ProxyConfig;
use crate::net::{ConnectionTracker, Listener, ListenerError};
use crate::proxy::handler::{handle_connection, SharedState};

/// The caching proxy server.
pub struct ProxyServer {
    shared: SharedState,
    tracker: ConnectionTracker,
}

impl ProxyServer {
    /// Create a server with an empty cache.
    pub fn new(config: ProxyConfig) -> Self {
        Self::with_cache(config, Arc::new(CacheStore::new()))
    }

    /// Create a server backed by an existing cache.
    pub fn with_cache(config: ProxyConfig, cache: Arc<CacheStore>) -> Self {
        Self {
            shared: SharedState::new(Arc::new(config), cache),
            tracker: ConnectionTracker::new(),
        }
    }

    pub fn cache(&self) -> Arc<CacheStore> {
        Arc::clone(&self.shared.cache)
    }

    pub fn config(&self) -> &ProxyConfig {
        &self.shared.config
    }

    pub fn tracker(&self) -> &ConnectionTracker {
        &self.tracker
    }

    /// Accept connections until `shutdown` fires, then wait for in-flight
    /// connections for at most `timeouts.shutdown_grace_secs`.
    pub async fn run(
        self,
        listener: Listener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), ListenerError> {
        let address = listener.local_addr().map_err(ListenerError::Accept)?;
        tracing::info!(
            address = %address,
            target = %self.shared.config.target_address(),
            default_ttl = self.shared.config.cache.ttl,
            "Proxy server starting"
        );

        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    tracing::info!("Shutdown signal received, no longer accepting");
                    break;
                }
                accepted = listener.accept() => {
                    let (stream, peer, permit) = match accepted {
                        Ok(conn) => conn,
                        Err(ListenerError::Accept(e)) => {
                            tracing::warn!(error = %e, "Accept failed");
                            continue;
                        }
                        Err(e) => return Err(e),
                    };

                    let guard = self.tracker.track();
                    let id = guard.id();
                    let shared = self.shared.clone();
                    let span = tracing::info_span!("connection", id = %id, peer = %peer);

                    tokio::spawn(
                        async move {
                            let _permit = permit;
                            let _guard = guard;
                            handle_connection(id, stream, shared).await;
                        }
                        .instrument(span),
                    );
                }
            }
        }

        // Drop the accept socket before draining
        drop(listener);
        self.drain().await;
        Ok(())
    }

    async fn drain(&self) {
        let active = self.tracker.active_count();
        if active == 0 {
            tracing::info!("Proxy server stopped");
            return;
        }

        let grace = Duration::from_secs(self.shared.config.timeouts.shutdown_grace_secs);
        tracing::info!(active, grace_secs = grace.as_secs(), "Draining connections");
        match tokio::time::timeout(grace, self.tracker.wait_until_idle()).await {
            Ok(()) => tracing::info!("Proxy server stopped"),
            Err(_) => tracing::warn!(
                remaining = self.tracker.active_count(),
                "Shutdown grace period elapsed with connections still open"
            ),
        }
    }
}
