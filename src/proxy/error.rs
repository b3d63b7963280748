//! Connection-level failures.
//!
//! Every variant ends the connection that raised it and nothing else; the
//! cache store is never touched on an error path.

use std::collections::TryReserveError;
use std::time::Duration;

use crate::http::FramingError;

/// Which side of the proxy a socket faces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Peer {
    Client,
    Upstream,
}

impl std::fmt::Display for Peer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Peer::Client => write!(f, "client"),
            Peer::Upstream => write!(f, "upstream"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    /// Hard socket error (reset, broken pipe, ...).
    #[error("{peer} I/O error: {source}")]
    Io {
        peer: Peer,
        #[source]
        source: std::io::Error,
    },

    /// Malformed or truncated message.
    #[error("{peer} sent a bad message: {source}")]
    Framing {
        peer: Peer,
        #[source]
        source: FramingError,
    },

    /// Peer closed before sending a single byte.
    #[error("{0} closed the connection without sending data")]
    Closed(Peer),

    #[error("message exceeds the {limit} byte limit")]
    MessageTooLarge { limit: usize },

    #[error("failed to grow receive buffer: {0}")]
    BufferGrowth(#[from] TryReserveError),

    #[error("upstream {address} unreachable: {source}")]
    UpstreamUnreachable {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{operation} timed out after {after:?}")]
    Timeout {
        operation: &'static str,
        after: Duration,
    },
}

impl HandlerError {
    /// Short label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            HandlerError::Io { .. } => "io",
            HandlerError::Framing {
                source: FramingError::Truncated,
                ..
            } => "truncated",
            HandlerError::Framing { .. } => "malformed",
            HandlerError::Closed(_) => "closed",
            HandlerError::MessageTooLarge { .. } => "too_large",
            HandlerError::BufferGrowth(_) => "buffer_growth",
            HandlerError::UpstreamUnreachable { .. } => "upstream_unreachable",
            HandlerError::Timeout { .. } => "timeout",
        }
    }

    /// A client that connects and leaves without a request is routine.
    pub fn is_idle_disconnect(&self) -> bool {
        matches!(self, HandlerError::Closed(Peer::Client))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_distinguish_truncation() {
        let truncated = HandlerError::Framing {
            peer: Peer::Upstream,
            source: FramingError::Truncated,
        };
        let malformed = HandlerError::Framing {
            peer: Peer::Client,
            source: FramingError::InvalidChunk("x"),
        };
        assert_eq!(truncated.kind(), "truncated");
        assert_eq!(malformed.kind(), "malformed");
    }

    #[test]
    fn messages_name_the_peer() {
        let err = HandlerError::Io {
            peer: Peer::Upstream,
            source: std::io::Error::from(std::io::ErrorKind::ConnectionReset),
        };
        assert!(err.to_string().starts_with("upstream I/O error"));
        assert!(HandlerError::Closed(Peer::Client).is_idle_disconnect());
        assert!(!HandlerError::Closed(Peer::Upstream).is_idle_disconnect());
    }
}
