//! Caching proxy subsystem.
//!
//! # Data Flow
//! ```text
//! server.rs (accept loop, one task per connection)
//!     → handler.rs (request/response state machine)
//!         → transport.rs (framed reads, full writes)
//!         → cache (fingerprint lookup / insert)
//!         → upstream target (fresh connection per miss)
//! ```

pub mod error;
pub mod handler;
pub mod server;
pub mod transport;

pub use error::{HandlerError, Peer};
pub use handler::{handle_connection, Outcome, SharedState, State};
pub use server::ProxyServer;
