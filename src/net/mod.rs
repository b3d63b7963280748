//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (accept loop, connection limits)
//!     → connection.rs (id + lifetime tracking)
//!     → Hand off to the proxy state machine
//!
//! Cache miss
//!     → socket.rs (fresh connection to the fixed target)
//! ```
//!
//! # Design Decisions
//! - Bounded accept: a semaphore permit per live connection
//! - Each connection tracked for graceful shutdown
//! - Upstream connections are never pooled; one per miss

pub mod connection;
pub mod listener;
pub mod socket;

pub use connection::{ConnectionId, ConnectionTracker};
pub use listener::{Listener, ListenerError};
