//! Length-prefixed message framing shared by the client protocol and the
//! replication wire protocol (spec §6).
//!
//! Grounded on the teacher's `network/server.rs` connection loop, which
//! reads a fixed-size buffer per connection; this rewrite replaces the
//! bincode-request read with an explicit 4-byte big-endian length prefix
//! so a message's size is known before the payload is read, matching the
//! "reads up to a configured maximum" contract in the distilled spec.

use crate::error::{DbError, Result};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

const LENGTH_PREFIX_BYTES: usize = 4;

/// Reads one length-prefixed frame, enforcing `max_size` on the payload.
///
/// A payload that would exactly fill `max_size` is rejected per spec
/// ("a message that fills the buffer exactly is rejected as `small
/// buffer size`") — this guards against a client whose message was
/// truncated because it hit the limit rather than ending naturally.
/// Leading zero bytes are trimmed; an entirely empty message is an error.
/// This trimming is specific to the line-oriented client protocol; binary
/// payloads (replication) must use [`read_frame_raw`] instead, since a
/// bincode-encoded integer may legitimately start with a zero byte.
pub async fn read_frame<R: AsyncReadExt + Unpin>(
    reader: &mut R,
    max_size: usize,
) -> Result<Vec<u8>> {
    let buf = read_frame_raw(reader, max_size).await?;
    let trimmed_start = buf.iter().position(|&b| b != 0).unwrap_or(buf.len());
    let buf = buf[trimmed_start..].to_vec();
    if buf.is_empty() {
        return Err(DbError::InvalidSyntax("query cannot be empty".to_string()));
    }
    Ok(buf)
}

/// Reads one length-prefixed frame verbatim, with no zero-trimming —
/// the framing used by the binary replication protocol.
pub async fn read_frame_raw<R: AsyncReadExt + Unpin>(
    reader: &mut R,
    max_size: usize,
) -> Result<Vec<u8>> {
    let mut len_buf = [0u8; LENGTH_PREFIX_BYTES];
    reader.read_exact(&mut len_buf).await?;
    let len = u32::from_be_bytes(len_buf) as usize;

    if len >= max_size {
        return Err(DbError::SmallBufferSize);
    }
    if len == 0 {
        return Err(DbError::InvalidSyntax("query cannot be empty".to_string()));
    }

    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf).await?;
    Ok(buf)
}

/// Writes one length-prefixed frame.
pub async fn write_frame<W: AsyncWriteExt + Unpin>(writer: &mut W, payload: &[u8]) -> Result<()> {
    let len = payload.len() as u32;
    writer.write_all(&len.to_be_bytes()).await?;
    writer.write_all(payload).await?;
    writer.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[tokio::test]
    async fn round_trips_a_frame() {
        let mut buf = Vec::new();
        write_frame(&mut buf, b"get foo").await.unwrap();
        let mut cursor = Cursor::new(buf);
        let payload = read_frame(&mut cursor, 4096).await.unwrap();
        assert_eq!(payload, b"get foo");
    }

    #[tokio::test]
    async fn rejects_message_filling_the_buffer_exactly() {
        let mut buf = Vec::new();
        write_frame(&mut buf, &vec![1u8; 16]).await.unwrap();
        let mut cursor = Cursor::new(buf);
        let err = read_frame(&mut cursor, 16).await.unwrap_err();
        assert!(matches!(err, DbError::SmallBufferSize));
    }

    #[tokio::test]
    async fn rejects_empty_message() {
        let mut buf = Vec::new();
        write_frame(&mut buf, b"").await.unwrap();
        let mut cursor = Cursor::new(buf);
        let err = read_frame(&mut cursor, 4096).await.unwrap_err();
        assert!(matches!(err, DbError::InvalidSyntax(_)));
    }

    #[tokio::test]
    async fn raw_frame_preserves_leading_zero_bytes() {
        let mut buf = Vec::new();
        write_frame(&mut buf, &[0u8, 7u8]).await.unwrap();
        let mut cursor = Cursor::new(buf);
        let out = read_frame_raw(&mut cursor, 4096).await.unwrap();
        assert_eq!(out, vec![0u8, 7u8]);
    }

    #[tokio::test]
    async fn trims_leading_zero_bytes() {
        let mut payload = vec![0u8, 0u8, 0u8];
        payload.extend_from_slice(b"hello");
        let mut buf = Vec::new();
        write_frame(&mut buf, &payload).await.unwrap();
        let mut cursor = Cursor::new(buf);
        let out = read_frame(&mut cursor, 4096).await.unwrap();
        assert_eq!(out, b"hello");
    }
}
