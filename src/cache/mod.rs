//! Response cache subsystem.
//!
//! # Data Flow
//! ```text
//! Raw request bytes
//!     → fingerprint.rs (64-bit rolling hash, the cache key)
//!     → store.rs lookup (hit: serve payload, stale: evict)
//!
//! Upstream response complete
//!     → policy.rs (Cache-Control / Pragma → effective TTL)
//!     → store.rs insert (skipped when TTL is 0)
//! ```
//!
//! # Design Decisions
//! - One store per process, passed to every connection as `Arc<CacheStore>`
//! - A single mutex guards every check-and-evict and every insert
//! - Entries are immutable; replacing is the only way to change one
//! - No request coalescing: concurrent misses each go upstream

pub mod fingerprint;
pub mod policy;
pub mod store;

pub use fingerprint::Fingerprint;
pub use store::{unix_now, CacheEntry, CacheStore, Timestamp};
