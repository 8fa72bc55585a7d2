//! Length-prefixed RPC frames with size limits.
//!
//! Frame layout: 4-byte big-endian body length, then the body.
//!
//! The send limit is checked against the body length before anything is
//! written. The receive limit is checked against the length prefix before
//! the body is read. Both failures use the same texts a gRPC transport
//! produces, so text arriving from a remote side classifies the same way as
//! errors raised here.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::limits::SizeLimit;

/// Marker text of a send-direction overflow.
pub const SEND_OVERFLOW_SIGNAL: &str = "Sent message larger than max";

/// Marker text of a receive-direction overflow.
pub const RECEIVE_OVERFLOW_SIGNAL: &str = "Received message larger than max";

/// Which way a transport failure went wrong.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    /// This client tried to send more than its send limit.
    SendLimitExceeded,
    /// A receive limit rejected the incoming message.
    ReceiveLimitExceeded,
    /// Anything else: connect, TLS, I/O, malformed frames.
    Other,
}

impl TransportErrorKind {
    /// Classify transport error text. The only place text is inspected.
    pub fn classify(message: &str) -> Self {
        if message.contains(SEND_OVERFLOW_SIGNAL) {
            TransportErrorKind::SendLimitExceeded
        } else if message.contains(RECEIVE_OVERFLOW_SIGNAL) {
            TransportErrorKind::ReceiveLimitExceeded
        } else {
            TransportErrorKind::Other
        }
    }
}

impl std::fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportErrorKind::SendLimitExceeded => f.write_str("send limit exceeded"),
            TransportErrorKind::ReceiveLimitExceeded => f.write_str("receive limit exceeded"),
            TransportErrorKind::Other => f.write_str("transport error"),
        }
    }
}

/// A classified transport failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{detail}")]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub detail: String,
}

impl TransportError {
    /// Wrap foreign error text, classifying it.
    pub fn from_message(message: impl Into<String>) -> Self {
        let detail = message.into();
        Self {
            kind: TransportErrorKind::classify(&detail),
            detail,
        }
    }

    pub fn other(detail: impl Into<String>) -> Self {
        Self {
            kind: TransportErrorKind::Other,
            detail: detail.into(),
        }
    }

    pub fn send_limit(len: usize, limit: SizeLimit) -> Self {
        Self {
            kind: TransportErrorKind::SendLimitExceeded,
            detail: format!("{SEND_OVERFLOW_SIGNAL} ({len} vs. {limit})"),
        }
    }

    pub fn receive_limit(len: usize, limit: SizeLimit) -> Self {
        Self {
            kind: TransportErrorKind::ReceiveLimitExceeded,
            detail: format!("{RECEIVE_OVERFLOW_SIGNAL} ({len} vs. {limit})"),
        }
    }

    pub fn io(context: &str, err: std::io::Error) -> Self {
        Self::from_message(format!("{context}: {err}"))
    }
}

/// Fail fast if a body of `len` bytes may not be sent.
pub fn check_outbound(len: usize, limit: SizeLimit) -> Result<(), TransportError> {
    if limit.allows(len) {
        Ok(())
    } else {
        Err(TransportError::send_limit(len, limit))
    }
}

/// Write one frame.
pub async fn write_frame<W>(writer: &mut W, body: &[u8], limit: SizeLimit) -> Result<(), TransportError>
where
    W: AsyncWrite + Unpin,
{
    check_outbound(body.len(), limit)?;
    let len = u32::try_from(body.len())
        .map_err(|_| TransportError::send_limit(body.len(), SizeLimit::Bytes(u32::MAX as usize)))?;
    writer
        .write_all(&len.to_be_bytes())
        .await
        .map_err(|e| TransportError::io("write frame header", e))?;
    writer
        .write_all(body)
        .await
        .map_err(|e| TransportError::io("write frame body", e))?;
    writer
        .flush()
        .await
        .map_err(|e| TransportError::io("flush frame", e))?;
    Ok(())
}

/// Read the length prefix of the next frame.
pub async fn read_frame_len<R>(reader: &mut R) -> Result<usize, TransportError>
where
    R: AsyncRead + Unpin,
{
    let mut header = [0u8; 4];
    reader
        .read_exact(&mut header)
        .await
        .map_err(|e| TransportError::io("read frame header", e))?;
    Ok(u32::from_be_bytes(header) as usize)
}

/// Read a body of `len` bytes announced by a prefix.
pub async fn read_frame_body<R>(reader: &mut R, len: usize) -> Result<Vec<u8>, TransportError>
where
    R: AsyncRead + Unpin,
{
    let mut body = vec![0u8; len];
    reader
        .read_exact(&mut body)
        .await
        .map_err(|e| TransportError::io("read frame body", e))?;
    Ok(body)
}

/// Read one frame, rejecting it before the body is read if it is too big.
pub async fn read_frame<R>(reader: &mut R, limit: SizeLimit) -> Result<Vec<u8>, TransportError>
where
    R: AsyncRead + Unpin,
{
    let len = read_frame_len(reader).await?;
    if !limit.allows(len) {
        return Err(TransportError::receive_limit(len, limit));
    }
    read_frame_body(reader, len).await
}

/// Consume and drop a body of `len` bytes.
pub async fn discard_frame_body<R>(reader: &mut R, len: usize) -> Result<(), TransportError>
where
    R: AsyncRead + Unpin,
{
    let mut limited = reader.take(len as u64);
    tokio::io::copy(&mut limited, &mut tokio::io::sink())
        .await
        .map_err(|e| TransportError::io("discard frame body", e))?;
    Ok(())
}
