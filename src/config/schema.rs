//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the caching proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// The single upstream every cache miss is forwarded to.
    pub target: TargetConfig,

    /// Listener configuration (bind host and port).
    pub listen: ListenConfig,

    /// Concurrency limits.
    pub poll: PollConfig,

    /// Socket mode flags.
    pub socket: SocketConfig,

    /// Response cache settings.
    pub cache: CacheConfig,

    /// Receive buffer limits.
    pub limits: LimitsConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl ProxyConfig {
    /// Address the listener binds to, as `host:port`.
    pub fn listen_address(&self) -> String {
        join_host_port(&self.listen.host, self.listen.port)
    }

    /// Address upstream connections are opened to, as `host:port`.
    pub fn target_address(&self) -> String {
        join_host_port(&self.target.host, self.target.port)
    }

    /// Value written into the `Host` header of forwarded requests.
    pub fn target_authority(&self) -> String {
        if self.target.port == 80 {
            self.target.host.clone()
        } else {
            join_host_port(&self.target.host, self.target.port)
        }
    }
}

fn join_host_port(host: &str, port: u16) -> String {
    if host.contains(':') && !host.starts_with('[') {
        format!("[{}]:{}", host, port)
    } else {
        format!("{}:{}", host, port)
    }
}

/// Upstream target.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TargetConfig {
    /// Upstream host name or IP address.
    pub host: String,

    /// Upstream port.
    pub port: u16,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
        }
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenConfig {
    /// Bind host (e.g., "0.0.0.0").
    pub host: String,

    /// Bind port. Port 0 asks the OS for an ephemeral port.
    pub port: u16,
}

impl Default for ListenConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

/// Concurrency limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PollConfig {
    /// Maximum concurrent connections (backpressure).
    pub fds_count: usize,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self { fds_count: 100 }
    }
}

/// Socket mode flags.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SocketConfig {
    /// 1 for non-blocking sockets, 0 otherwise.
    pub non_blocking: u8,
}

impl Default for SocketConfig {
    fn default() -> Self {
        Self { non_blocking: 1 }
    }
}

/// Response cache settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Default TTL in seconds, used when neither request nor response
    /// carries a caching directive. 0 disables caching by default.
    pub ttl: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { ttl: 60 }
    }
}

/// Receive buffer limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Starting capacity of each receive buffer in bytes.
    pub initial_buffer_size: usize,

    /// Upper bound the receive buffer may double up to.
    pub max_message_size: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            initial_buffer_size: 4096,
            max_message_size: 8 * 1024 * 1024, // 8MB
        }
    }
}

/// Timeout configuration. A value of 0 means no deadline.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Upstream connection establishment timeout in seconds.
    pub connect_secs: u64,

    /// Deadline for a single socket read in seconds.
    pub read_secs: u64,

    /// Deadline for writing a whole message in seconds.
    pub write_secs: u64,

    /// How long in-flight connections may drain on shutdown.
    pub shutdown_grace_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 0,
            read_secs: 0,
            write_secs: 0,
            shutdown_grace_secs: 10,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_sectioned_toml() {
        let config: ProxyConfig = toml::from_str(
            r#"
            [target]
            host = "backend.local"
            port = 5000

            [listen]
            host = "127.0.0.1"
            port = 9000

            [poll]
            fds_count = 16

            [cache]
            ttl = 30
            "#,
        )
        .unwrap();

        assert_eq!(config.target_address(), "backend.local:5000");
        assert_eq!(config.listen_address(), "127.0.0.1:9000");
        assert_eq!(config.poll.fds_count, 16);
        assert_eq!(config.cache.ttl, 30);
        // Untouched sections keep their defaults
        assert_eq!(config.socket.non_blocking, 1);
        assert_eq!(config.limits.initial_buffer_size, 4096);
    }

    #[test]
    fn authority_omits_default_port() {
        let mut config = ProxyConfig::default();
        config.target.host = "example.com".into();
        config.target.port = 80;
        assert_eq!(config.target_authority(), "example.com");

        config.target.port = 8000;
        assert_eq!(config.target_authority(), "example.com:8000");
    }

    #[test]
    fn ipv6_hosts_are_bracketed() {
        let mut config = ProxyConfig::default();
        config.target.host = "::1".into();
        config.target.port = 8000;
        assert_eq!(config.target_address(), "[::1]:8000");
    }
}
