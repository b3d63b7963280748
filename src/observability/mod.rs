//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Connection tasks and the cache produce:
//!     → logging.rs (structured tracing events, one span per connection)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → stdout (fmt layer)
//!     → Metrics endpoint (Prometheus scrape, optional)
//! ```

pub mod logging;
pub mod metrics;
