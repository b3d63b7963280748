//! Shared utilities for integration and load testing.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

use cachr::config::ProxyConfig;
use cachr::lifecycle::Shutdown;
use cachr::net::{Listener, ListenerError};
use cachr::{CacheStore, ProxyServer};

/// A mock upstream that records every request it receives.
#[derive(Clone)]
pub struct MockUpstream {
    pub addr: SocketAddr,
    connections: Arc<AtomicUsize>,
    requests: Arc<Mutex<Vec<Vec<u8>>>>,
}

impl MockUpstream {
    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<Vec<u8>> {
        self.requests.lock().unwrap().clone()
    }

    pub fn last_request(&self) -> String {
        let requests = self.requests();
        String::from_utf8(requests.last().cloned().unwrap_or_default()).unwrap()
    }
}

/// Start a mock upstream that answers every request with `response` and closes.
pub async fn start_mock_upstream(response: impl Into<Vec<u8>>) -> MockUpstream {
    let response: Arc<[u8]> = response.into().into();
    start_programmable_upstream(move |_| response.to_vec()).await
}

/// Start a mock upstream whose reply is computed from the raw request.
pub async fn start_programmable_upstream<F>(respond: F) -> MockUpstream
where
    F: Fn(&[u8]) -> Vec<u8> + Send + Sync + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let upstream = MockUpstream {
        addr: listener.local_addr().unwrap(),
        connections: Arc::new(AtomicUsize::new(0)),
        requests: Arc::new(Mutex::new(Vec::new())),
    };
    let respond = Arc::new(respond);

    let state = upstream.clone();
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            state.connections.fetch_add(1, Ordering::SeqCst);
            let state = state.clone();
            let respond = Arc::clone(&respond);
            tokio::spawn(async move {
                let request = read_request(&mut socket).await;
                state.requests.lock().unwrap().push(request.clone());
                let _ = socket.write_all(&respond(&request)).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    upstream
}

/// Read one request head plus a `Content-Length` body, if any.
async fn read_request(socket: &mut TcpStream) -> Vec<u8> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    loop {
        let n = socket.read(&mut chunk).await.unwrap_or(0);
        if n == 0 {
            return buf;
        }
        buf.extend_from_slice(&chunk[..n]);

        let Some(head_end) = find(&buf, b"\r\n\r\n").map(|i| i + 4) else {
            continue;
        };
        let head = String::from_utf8_lossy(&buf[..head_end]).to_ascii_lowercase();
        let body_len = head
            .lines()
            .find_map(|line| line.strip_prefix("content-length:"))
            .and_then(|v| v.trim().parse::<usize>().ok())
            .unwrap_or(0);
        if buf.len() >= head_end + body_len {
            return buf;
        }
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Address that refuses connections.
pub fn refused_addr() -> SocketAddr {
    let reserved = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    reserved.local_addr().unwrap()
}

/// Proxy config pointing at `target`.
pub fn config_for(target: SocketAddr) -> ProxyConfig {
    let mut config = ProxyConfig::default();
    config.target.host = target.ip().to_string();
    config.target.port = target.port();
    config.listen.host = "127.0.0.1".into();
    config.listen.port = 0;
    config
}

/// A proxy running on an ephemeral port.
pub struct RunningProxy {
    pub addr: SocketAddr,
    pub cache: Arc<CacheStore>,
    pub shutdown: Shutdown,
    pub handle: JoinHandle<Result<(), ListenerError>>,
}

impl RunningProxy {
    pub async fn stop(self) {
        self.shutdown.trigger();
        self.handle.await.unwrap().unwrap();
    }
}

pub async fn start_proxy(config: ProxyConfig) -> RunningProxy {
    let tcp = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let listener = Listener::from_tcp(tcp, config.poll.fds_count).unwrap();
    let addr = listener.local_addr().unwrap();

    let server = ProxyServer::new(config);
    let cache = server.cache();
    let shutdown = Shutdown::new();
    let handle = tokio::spawn(server.run(listener, shutdown.subscribe()));

    RunningProxy {
        addr,
        cache,
        shutdown,
        handle,
    }
}

/// Send raw bytes to `addr` and collect everything until the proxy closes.
pub async fn send_raw(addr: SocketAddr, request: &[u8]) -> Vec<u8> {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(request).await.unwrap();
    let mut reply = Vec::new();
    let _ = stream.read_to_end(&mut reply).await;
    reply
}
