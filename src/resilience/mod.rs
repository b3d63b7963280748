//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Upstream connect / socket read / socket write
//!     → timeouts.rs (optional deadline per operation)
//!     → On expiry: HandlerError::Timeout, connection ends at DONE
//! ```
//!
//! # Design Decisions
//! - Deadlines default to off; unbounded waits are the baseline contract
//! - Read deadlines apply per read, write deadlines per whole message

pub mod timeouts;

pub use timeouts::{with_deadline, Deadlines};
