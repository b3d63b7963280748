//! Socket setup: the listening socket and upstream connections.

use std::io;
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};

use crate::config::ProxyConfig;

/// Resolve and bind the configured listen address.
///
/// The first resolved address that binds wins. The socket is switched to
/// non-blocking mode before being handed to the runtime.
pub async fn prepare_listening_socket(config: &ProxyConfig) -> io::Result<TcpListener> {
    let address = config.listen_address();
    let mut last_error = None;

    for addr in tokio::net::lookup_host(&address).await? {
        match std::net::TcpListener::bind(addr) {
            Ok(listener) => {
                set_non_blocking(&listener)?;
                return TcpListener::from_std(listener);
            }
            Err(e) => {
                tracing::debug!(address = %addr, error = %e, "Bind attempt failed");
                last_error = Some(e);
            }
        }
    }

    Err(last_error.unwrap_or_else(|| {
        io::Error::new(
            io::ErrorKind::AddrNotAvailable,
            format!("{} did not resolve to any address", address),
        )
    }))
}

/// Open a fresh connection to the fixed upstream target.
pub async fn connect_to_target(config: &ProxyConfig, limit: Option<Duration>) -> io::Result<TcpStream> {
    let address = config.target_address();
    let stream = match limit {
        None => TcpStream::connect(&address).await?,
        Some(after) => tokio::time::timeout(after, TcpStream::connect(&address))
            .await
            .map_err(|_| {
                io::Error::new(
                    io::ErrorKind::TimedOut,
                    format!("connect to {} timed out after {:?}", address, after),
                )
            })??,
    };

    stream.set_nodelay(true)?;
    tracing::debug!(target_address = %address, "Connected to upstream");
    Ok(stream)
}

/// Put a std listener into non-blocking mode.
pub fn set_non_blocking(listener: &std::net::TcpListener) -> io::Result<()> {
    listener.set_nonblocking(true)
}
