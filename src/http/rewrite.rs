//! Upstream request rewriting.
//!
//! The forwarded request keeps the client's method, path, version, headers
//! and body, except:
//! - `Host` names the configured target
//! - hop-by-hop connection headers are dropped and `Connection: close` is
//!   appended, so upstream closes after one response

use crate::http::parse::RequestHead;

/// Headers that only describe the client's own connection.
const HOP_BY_HOP: [&str; 3] = ["connection", "keep-alive", "proxy-connection"];

/// Build the byte stream sent upstream for `head`, whose raw bytes are `original`.
///
/// Pure function: the same inputs always give the same bytes.
pub fn rewrite_request(original: &[u8], head: &RequestHead, target_host: &str) -> Vec<u8> {
    let body = original.get(head.header_len..).unwrap_or_default();
    let mut out = Vec::with_capacity(original.len() + target_host.len() + 32);

    out.extend_from_slice(head.method.as_bytes());
    out.push(b' ');
    out.extend_from_slice(head.path.as_bytes());
    out.extend_from_slice(format!(" HTTP/1.{}\r\n", head.version).as_bytes());

    let mut host_written = false;
    for header in &head.headers {
        if header.is("host") {
            if !host_written {
                push_header(&mut out, "Host", target_host.as_bytes());
                host_written = true;
            }
        } else if !HOP_BY_HOP.iter().any(|h| header.is(h)) {
            push_header(&mut out, &header.name, &header.value);
        }
    }
    if !host_written {
        push_header(&mut out, "Host", target_host.as_bytes());
    }
    push_header(&mut out, "Connection", b"close");

    out.extend_from_slice(b"\r\n");
    out.extend_from_slice(body);
    out
}

fn push_header(out: &mut Vec<u8>, name: &str, value: &[u8]) {
    out.extend_from_slice(name.as_bytes());
    out.extend_from_slice(b": ");
    out.extend_from_slice(value);
    out.extend_from_slice(b"\r\n");
}
