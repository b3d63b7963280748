//! Incremental message framing.
//!
//! A framer is fed the whole receive buffer after every read and answers
//! whether the message in it is complete. Once the head parses, the body
//! length is decided in this order:
//!
//! 1. bodiless messages (responses to HEAD, `204`, `304`) end at the head
//! 2. `Transfer-Encoding` ending in `chunked` is decoded chunk by chunk;
//!    any other final coding falls through to rule 4
//! 3. `Content-Length` counts body bytes
//! 4. otherwise a request has no body and a response runs until upstream
//!    closes the connection

use crate::http::parse::{
    parse_request, parse_response, HeaderList, MalformedMessage, Parsed, RequestHead, ResponseHead,
};

/// Longest chunk-size or trailer line accepted.
const MAX_CHUNK_LINE: usize = 4096;

/// Framing failure. Every variant aborts the connection.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FramingError {
    #[error(transparent)]
    Malformed(#[from] MalformedMessage),
    #[error("invalid Content-Length: {0}")]
    InvalidContentLength(String),
    #[error("invalid chunk: {0}")]
    InvalidChunk(&'static str),
    #[error("connection closed before the message was complete")]
    Truncated,
}

/// Whether the bytes seen so far hold a whole message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    Incomplete,
    Complete,
}

/// How the end of the body is found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BodyFraming {
    Empty,
    ContentLength(usize),
    Chunked(ChunkedDecoder),
    UntilClose,
}

/// Behaviour that differs between request and response heads.
pub trait MessageHead: Sized {
    fn parse(buf: &[u8]) -> Result<Parsed<Self>, MalformedMessage>;
    fn header_len(&self) -> usize;
    fn headers(&self) -> &HeaderList;
    /// Framing used when the head carries no length information.
    fn unframed() -> BodyFraming;
    /// Message has no body regardless of its headers.
    fn is_bodiless(&self) -> bool {
        false
    }
    /// An interim head that precedes the real one (`1xx` responses).
    fn is_interim(&self) -> bool {
        false
    }
}

impl MessageHead for RequestHead {
    fn parse(buf: &[u8]) -> Result<Parsed<Self>, MalformedMessage> {
        parse_request(buf)
    }

    fn header_len(&self) -> usize {
        self.header_len
    }

    fn headers(&self) -> &HeaderList {
        &self.headers
    }

    fn unframed() -> BodyFraming {
        BodyFraming::Empty
    }
}

impl MessageHead for ResponseHead {
    fn parse(buf: &[u8]) -> Result<Parsed<Self>, MalformedMessage> {
        parse_response(buf)
    }

    fn header_len(&self) -> usize {
        self.header_len
    }

    fn headers(&self) -> &HeaderList {
        &self.headers
    }

    fn unframed() -> BodyFraming {
        BodyFraming::UntilClose
    }

    fn is_bodiless(&self) -> bool {
        self.status == 204 || self.status == 304
    }

    fn is_interim(&self) -> bool {
        (100..200).contains(&self.status) && self.status != 101
    }
}

/// Detects the end of one HTTP message in an accumulating buffer.
#[derive(Debug, Clone)]
pub struct MessageFramer<H> {
    head: Option<H>,
    /// Offset of the final head; non-zero after interim responses.
    head_start: usize,
    body: BodyFraming,
    bodiless: bool,
}

pub type RequestFramer = MessageFramer<RequestHead>;
pub type ResponseFramer = MessageFramer<ResponseHead>;

impl<H: MessageHead> Default for MessageFramer<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H: MessageHead> MessageFramer<H> {
    pub fn new() -> Self {
        Self {
            head: None,
            head_start: 0,
            body: BodyFraming::Empty,
            bodiless: false,
        }
    }

    /// Treat the message as having no body (a response to `HEAD`).
    pub fn without_body(mut self) -> Self {
        self.bodiless = true;
        self
    }

    /// The parsed head, once available.
    pub fn head(&self) -> Option<&H> {
        self.head.as_ref()
    }

    pub fn into_head(self) -> Option<H> {
        self.head
    }

    /// Offset where the body starts, once the head is parsed.
    pub fn body_start(&self) -> Option<usize> {
        self.head.as_ref().map(|h| self.head_start + h.header_len())
    }

    /// Re-examine `buf` after a read that returned data.
    pub fn advance(&mut self, buf: &[u8]) -> Result<Progress, FramingError> {
        while self.head.is_none() {
            match H::parse(&buf[self.head_start..])? {
                Parsed::Incomplete => return Ok(Progress::Incomplete),
                Parsed::Complete(head) if head.is_interim() => {
                    self.head_start += head.header_len();
                }
                Parsed::Complete(head) => {
                    self.body = self.select_framing(&head)?;
                    self.head = Some(head);
                }
            }
        }

        let start = self.body_start().unwrap_or(buf.len());
        let body = &buf[start.min(buf.len())..];
        match &mut self.body {
            BodyFraming::Empty => Ok(Progress::Complete),
            BodyFraming::ContentLength(len) if body.len() >= *len => Ok(Progress::Complete),
            BodyFraming::ContentLength(_) => Ok(Progress::Incomplete),
            BodyFraming::Chunked(decoder) => decoder.advance(body),
            BodyFraming::UntilClose => Ok(Progress::Incomplete),
        }
    }

    /// Re-examine `buf` after the peer closed its side.
    pub fn finish(&mut self, buf: &[u8]) -> Result<Progress, FramingError> {
        match self.advance(buf)? {
            Progress::Complete => Ok(Progress::Complete),
            Progress::Incomplete if matches!(self.body, BodyFraming::UntilClose) && self.head.is_some() => {
                Ok(Progress::Complete)
            }
            Progress::Incomplete => Err(FramingError::Truncated),
        }
    }

    /// Length of the complete message within `buf`; bytes past it are not
    /// part of this exchange.
    pub fn message_len(&self, buf: &[u8]) -> usize {
        let Some(start) = self.body_start() else {
            return buf.len();
        };
        let end = match &self.body {
            BodyFraming::Empty => start,
            BodyFraming::ContentLength(len) => start.saturating_add(*len),
            BodyFraming::Chunked(decoder) => start + decoder.consumed(),
            BodyFraming::UntilClose => buf.len(),
        };
        end.min(buf.len())
    }

    fn select_framing(&self, head: &H) -> Result<BodyFraming, FramingError> {
        if self.bodiless || head.is_bodiless() {
            return Ok(BodyFraming::Empty);
        }

        let headers = head.headers();
        if is_chunked(headers) {
            return Ok(BodyFraming::Chunked(ChunkedDecoder::new()));
        }
        if headers.contains("transfer-encoding") {
            return Ok(H::unframed());
        }

        match content_length(headers)? {
            Some(len) => Ok(BodyFraming::ContentLength(len)),
            None => Ok(H::unframed()),
        }
    }
}

/// Whether `chunked` is the final transfer coding applied.
pub fn is_chunked(headers: &HeaderList) -> bool {
    headers
        .get_all("transfer-encoding")
        .flat_map(|v| v.split(','))
        .map(str::trim)
        .filter(|coding| !coding.is_empty())
        .last()
        .is_some_and(|coding| coding.eq_ignore_ascii_case("chunked"))
}

/// Declared body length. Repeated headers must agree.
pub fn content_length(headers: &HeaderList) -> Result<Option<usize>, FramingError> {
    let mut declared = None;
    for value in headers.get_all("content-length").flat_map(|v| v.split(',')) {
        let value = value.trim();
        let len: usize = value
            .parse()
            .map_err(|_| FramingError::InvalidContentLength(value.to_string()))?;
        match declared {
            Some(prev) if prev != len => {
                return Err(FramingError::InvalidContentLength(format!("{} != {}", prev, len)));
            }
            _ => declared = Some(len),
        }
    }
    if declared.is_none() && headers.contains("content-length") {
        return Err(FramingError::InvalidContentLength("non UTF-8 value".into()));
    }
    Ok(declared)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChunkState {
    Size,
    Data(usize),
    DataEnd,
    Trailer,
    Done,
}

/// Incremental scanner for a chunked body.
///
/// Keeps its position between calls so each byte is examined once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkedDecoder {
    pos: usize,
    state: ChunkState,
}

impl Default for ChunkedDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl ChunkedDecoder {
    pub fn new() -> Self {
        Self {
            pos: 0,
            state: ChunkState::Size,
        }
    }

    /// Body bytes consumed so far, including chunk framing.
    pub fn consumed(&self) -> usize {
        self.pos
    }

    /// Scan `body` (everything after the head) from where the last call stopped.
    pub fn advance(&mut self, body: &[u8]) -> Result<Progress, FramingError> {
        loop {
            match self.state {
                ChunkState::Size => {
                    let Some(line) = self.next_line(body)? else {
                        return Ok(Progress::Incomplete);
                    };
                    let size = parse_chunk_size(&body[line.0..line.1])?;
                    self.state = if size == 0 {
                        ChunkState::Trailer
                    } else {
                        ChunkState::Data(size)
                    };
                }
                ChunkState::Data(remaining) => {
                    let available = body.len() - self.pos;
                    if available < remaining {
                        self.pos += available;
                        self.state = ChunkState::Data(remaining - available);
                        return Ok(Progress::Incomplete);
                    }
                    self.pos += remaining;
                    self.state = ChunkState::DataEnd;
                }
                ChunkState::DataEnd => {
                    if body.len() - self.pos < 2 {
                        return Ok(Progress::Incomplete);
                    }
                    if &body[self.pos..self.pos + 2] != b"\r\n" {
                        return Err(FramingError::InvalidChunk("missing CRLF after chunk data"));
                    }
                    self.pos += 2;
                    self.state = ChunkState::Size;
                }
                ChunkState::Trailer => {
                    let Some((start, end)) = self.next_line(body)? else {
                        return Ok(Progress::Incomplete);
                    };
                    if start == end {
                        self.state = ChunkState::Done;
                    }
                }
                ChunkState::Done => return Ok(Progress::Complete),
            }
        }
    }

    /// Consume the next CRLF-terminated line, returning its bounds without the CRLF.
    fn next_line(&mut self, body: &[u8]) -> Result<Option<(usize, usize)>, FramingError> {
        let rest = &body[self.pos..];
        match rest.windows(2).position(|w| w == b"\r\n") {
            Some(len) if len > MAX_CHUNK_LINE => Err(FramingError::InvalidChunk("line too long")),
            Some(len) => {
                let start = self.pos;
                self.pos += len + 2;
                Ok(Some((start, start + len)))
            }
            None if rest.len() > MAX_CHUNK_LINE => Err(FramingError::InvalidChunk("line too long")),
            None => Ok(None),
        }
    }
}

fn parse_chunk_size(line: &[u8]) -> Result<usize, FramingError> {
    let size = line.split(|&b| b == b';').next().unwrap_or_default();
    let size = std::str::from_utf8(size)
        .map_err(|_| FramingError::InvalidChunk("non-ASCII chunk size"))?
        .trim_matches(|c| c == ' ' || c == '\t');

    if size.is_empty() || !size.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(FramingError::InvalidChunk("chunk size is not hexadecimal"));
    }
    usize::from_str_radix(size, 16).map_err(|_| FramingError::InvalidChunk("chunk size overflows"))
}
