//! Timeout enforcement.
//!
//! Deadlines are opt-in: a configured value of 0 leaves the operation
//! unbounded, and a hung peer then keeps its connection task alive.

use std::future::Future;
use std::time::Duration;

use crate::config::TimeoutConfig;
use crate::proxy::error::HandlerError;

/// Per-connection deadlines derived from configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Deadlines {
    pub connect: Option<Duration>,
    pub read: Option<Duration>,
    pub write: Option<Duration>,
}

impl Deadlines {
    pub fn from_config(config: &TimeoutConfig) -> Self {
        Self {
            connect: seconds(config.connect_secs),
            read: seconds(config.read_secs),
            write: seconds(config.write_secs),
        }
    }
}

fn seconds(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}

/// Run `fut`, failing with [`HandlerError::Timeout`] if `limit` elapses first.
pub async fn with_deadline<F, T>(
    operation: &'static str,
    limit: Option<Duration>,
    fut: F,
) -> Result<T, HandlerError>
where
    F: Future<Output = Result<T, HandlerError>>,
{
    match limit {
        None => fut.await,
        Some(after) => tokio::time::timeout(after, fut)
            .await
            .map_err(|_| HandlerError::Timeout { operation, after })?,
    }
}
