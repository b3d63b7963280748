//! Startup orchestration.
//!
//! Order: metrics endpoint, listening socket, signal handler, accept loop.
//! Any failure before the accept loop starts is fatal.

use std::net::SocketAddr;

use crate::config::ProxyConfig;
use crate::lifecycle::signals::spawn_signal_listener;
use crate::lifecycle::Shutdown;
use crate::net::{Listener, ListenerError};
use crate::observability::metrics;
use crate::proxy::ProxyServer;

/// Start the proxy and run until a termination signal has been handled.
pub async fn run(config: ProxyConfig) -> Result<(), ListenerError> {
    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse::<SocketAddr>() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    if config.socket.non_blocking == 0 {
        tracing::warn!("socket.non_blocking = 0 is ignored; sockets are always non-blocking");
    }

    tracing::info!(
        listen = %config.listen_address(),
        target = %config.target_address(),
        fds_count = config.poll.fds_count,
        cache_ttl = config.cache.ttl,
        "Configuration loaded"
    );

    let listener = Listener::bind(&config).await?;

    let shutdown = Shutdown::new();
    let signals = spawn_signal_listener(shutdown.clone());

    let server = ProxyServer::new(config);
    let result = server.run(listener, shutdown.subscribe()).await;

    signals.abort();
    result
}
