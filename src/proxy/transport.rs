//! Socket read and write loops shared by both sides of a connection.

use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::config::LimitsConfig;
use crate::http::framing::{MessageFramer, MessageHead, Progress};
use crate::proxy::error::{HandlerError, Peer};
use crate::resilience::with_deadline;

/// Growable receive buffer for one in-flight message.
///
/// Capacity doubles whenever the buffer is full, up to `limit`.
#[derive(Debug)]
pub struct ReceiveBuffer {
    bytes: Vec<u8>,
    limit: usize,
}

impl ReceiveBuffer {
    pub fn new(limits: &LimitsConfig) -> Result<Self, HandlerError> {
        let mut bytes = Vec::new();
        bytes.try_reserve_exact(limits.initial_buffer_size.min(limits.max_message_size))?;
        Ok(Self {
            bytes,
            limit: limits.max_message_size,
        })
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.bytes.capacity()
    }

    pub fn truncate(&mut self, len: usize) {
        self.bytes.truncate(len);
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.bytes
    }

    /// Make room for the next read. Returns `false` when the buffer already
    /// holds `limit` bytes and cannot grow.
    fn ensure_spare_capacity(&mut self) -> Result<bool, HandlerError> {
        if self.bytes.len() < self.bytes.capacity() {
            return Ok(true);
        }
        let len = self.bytes.len();
        if len >= self.limit {
            return Ok(false);
        }
        let target = len.saturating_mul(2).max(1).min(self.limit);
        self.bytes.try_reserve_exact(target - len)?;
        tracing::trace!(capacity = self.bytes.capacity(), "Receive buffer grown");
        Ok(true)
    }

    /// Read once from `reader` into the spare capacity. Returns 0 at end of stream.
    ///
    /// `Vec`'s own growth never kicks in because spare room is ensured first.
    /// A full buffer still gets one single-byte read: end of stream means the
    /// message ended exactly at the limit, any data means it is too large.
    pub async fn fill_from<R>(&mut self, reader: &mut R, peer: Peer) -> Result<usize, HandlerError>
    where
        R: AsyncRead + Unpin,
    {
        if !self.ensure_spare_capacity()? {
            let mut scratch = [0u8; 1];
            let n = reader
                .read(&mut scratch)
                .await
                .map_err(|source| HandlerError::Io { peer, source })?;
            return match n {
                0 => Ok(0),
                _ => Err(HandlerError::MessageTooLarge { limit: self.limit }),
            };
        }
        reader
            .read_buf(&mut self.bytes)
            .await
            .map_err(|source| HandlerError::Io { peer, source })
    }
}

/// Read from `reader` until `framer` reports a complete message.
///
/// Bytes past the end of the message are dropped.
pub async fn read_message<R, H>(
    reader: &mut R,
    framer: &mut MessageFramer<H>,
    buffer: &mut ReceiveBuffer,
    peer: Peer,
    read_deadline: Option<Duration>,
) -> Result<(), HandlerError>
where
    R: AsyncRead + Unpin,
    H: MessageHead,
{
    loop {
        let n = with_deadline("read", read_deadline, buffer.fill_from(reader, peer)).await?;
        if n == 0 && buffer.is_empty() {
            return Err(HandlerError::Closed(peer));
        }

        let progress = if n == 0 {
            framer.finish(buffer.as_slice())
        } else {
            framer.advance(buffer.as_slice())
        }
        .map_err(|source| HandlerError::Framing { peer, source })?;

        tracing::trace!(%peer, read = n, buffered = buffer.len(), ?progress, "Read iteration");

        if progress == Progress::Complete {
            let len = framer.message_len(buffer.as_slice());
            buffer.truncate(len);
            return Ok(());
        }
    }
}

/// Write all of `bytes`, retrying partial writes until done or a hard error.
pub async fn write_message<W>(
    writer: &mut W,
    bytes: &[u8],
    peer: Peer,
    write_deadline: Option<Duration>,
) -> Result<(), HandlerError>
where
    W: AsyncWrite + Unpin,
{
    with_deadline("write", write_deadline, async {
        writer
            .write_all(bytes)
            .await
            .map_err(|source| HandlerError::Io { peer, source })?;
        writer
            .flush()
            .await
            .map_err(|source| HandlerError::Io { peer, source })
    })
    .await
}
