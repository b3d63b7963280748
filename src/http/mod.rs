//! HTTP/1.x protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! Accumulated socket bytes
//!     → parse.rs (httparse tokenizer: incomplete / complete / malformed)
//!     → framing.rs (is the whole message here yet?)
//!     → rewrite.rs (request copy sent upstream: Host swap, Connection: close)
//! ```
//!
//! Messages are handled as raw bytes end to end; the proxy never re-encodes
//! a response, so the cached payload is exactly what upstream sent.

pub mod framing;
pub mod parse;
pub mod rewrite;

pub use framing::{FramingError, MessageFramer, Progress, RequestFramer, ResponseFramer};
pub use parse::{Header, HeaderList, MalformedMessage, Parsed, RequestHead, ResponseHead};
pub use rewrite::rewrite_request;
