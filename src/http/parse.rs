//! HTTP/1.x head tokenizer.
//!
//! Thin wrapper over `httparse` that turns a borrowed parse into owned
//! heads the connection state machine can keep across reads.

use httparse::Status;

/// Maximum number of headers accepted in one message head.
pub const MAX_HEADERS: usize = 64;

/// The head could not be tokenized.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("malformed message head: {0}")]
pub struct MalformedMessage(pub String);

impl From<httparse::Error> for MalformedMessage {
    fn from(err: httparse::Error) -> Self {
        Self(err.to_string())
    }
}

/// Outcome of feeding accumulated bytes to the tokenizer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Parsed<T> {
    /// More bytes are needed before the head ends.
    Incomplete,
    /// The head is complete.
    Complete(T),
}

/// A single header, name as sent and raw value bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub name: String,
    pub value: Vec<u8>,
}

impl Header {
    pub fn new(name: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    /// Value as text, if it is valid UTF-8.
    pub fn value_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.value).ok()
    }

    pub fn is(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }
}

/// Ordered header list with case-insensitive lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderList(Vec<Header>);

impl HeaderList {
    pub fn new(headers: Vec<Header>) -> Self {
        Self(headers)
    }

    /// First value of `name` as text.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.iter().find(|h| h.is(name)).and_then(Header::value_str)
    }

    /// Every textual value of `name`, in order.
    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.0.iter().filter(move |h| h.is(name)).filter_map(Header::value_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.iter().any(|h| h.is(name))
    }

    /// Whether any comma-separated element of any `name` value equals `token`.
    pub fn contains_token(&self, name: &str, token: &str) -> bool {
        self.get_all(name)
            .flat_map(|v| v.split(','))
            .any(|part| part.trim().eq_ignore_ascii_case(token))
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Header> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<'a> IntoIterator for &'a HeaderList {
    type Item = &'a Header;
    type IntoIter = std::slice::Iter<'a, Header>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

fn collect_headers(raw: &[httparse::Header<'_>]) -> HeaderList {
    HeaderList(
        raw.iter()
            .map(|h| Header::new(h.name, h.value))
            .collect(),
    )
}

/// Parsed request line and headers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestHead {
    pub method: String,
    pub path: String,
    /// Minor HTTP version: 0 for HTTP/1.0, 1 for HTTP/1.1.
    pub version: u8,
    pub headers: HeaderList,
    /// Length of the head in bytes, including the blank line.
    pub header_len: usize,
}

impl RequestHead {
    pub fn is_head(&self) -> bool {
        self.method.eq_ignore_ascii_case("HEAD")
    }
}

/// Parsed status line and headers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseHead {
    pub status: u16,
    pub reason: String,
    pub version: u8,
    pub headers: HeaderList,
    pub header_len: usize,
}

/// Tokenize a request head from the start of `buf`.
pub fn parse_request(buf: &[u8]) -> Result<Parsed<RequestHead>, MalformedMessage> {
    let mut storage = [httparse::EMPTY_HEADER; MAX_HEADERS];
    let mut req = httparse::Request::new(&mut storage);

    match req.parse(buf)? {
        Status::Partial => Ok(Parsed::Incomplete),
        Status::Complete(header_len) => {
            let method = req.method.ok_or_else(|| MalformedMessage("missing method".into()))?;
            let path = req.path.ok_or_else(|| MalformedMessage("missing path".into()))?;
            let version = req.version.ok_or_else(|| MalformedMessage("missing version".into()))?;
            Ok(Parsed::Complete(RequestHead {
                method: method.to_string(),
                path: path.to_string(),
                version,
                headers: collect_headers(req.headers),
                header_len,
            }))
        }
    }
}

/// Tokenize a response head from the start of `buf`.
pub fn parse_response(buf: &[u8]) -> Result<Parsed<ResponseHead>, MalformedMessage> {
    let mut storage = [httparse::EMPTY_HEADER; MAX_HEADERS];
    let mut resp = httparse::Response::new(&mut storage);

    match resp.parse(buf)? {
        Status::Partial => Ok(Parsed::Incomplete),
        Status::Complete(header_len) => {
            let status = resp.code.ok_or_else(|| MalformedMessage("missing status code".into()))?;
            let version = resp.version.ok_or_else(|| MalformedMessage("missing version".into()))?;
            Ok(Parsed::Complete(ResponseHead {
                status,
                reason: resp.reason.unwrap_or_default().to_string(),
                version,
                headers: collect_headers(resp.headers),
                header_len,
            }))
        }
    }
}
