//! Caching HTTP/1.x reverse proxy.
//!
//! Clients connect to the listener; each request is fingerprinted and
//! either answered from the in-memory cache or rewritten and forwarded to a
//! single fixed upstream target. Upstream responses are stored for their
//! freshness lifetime and relayed byte-for-byte.

// Core subsystems
pub mod cache;
pub mod config;
pub mod http;
pub mod net;
pub mod proxy;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;
pub mod resilience;

pub use cache::{CacheStore, Fingerprint};
pub use config::ProxyConfig;
pub use lifecycle::Shutdown;
pub use proxy::ProxyServer;
