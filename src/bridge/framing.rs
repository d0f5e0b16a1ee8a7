//! Native-messaging framing: a 4-byte little-endian length, then UTF-8 JSON.

use std::io;

use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Largest inbound frame accepted.
pub const MAX_FRAME_LEN: usize = 1024 * 1024;

/// Framing errors.
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("frame I/O failed: {0}")]
    Io(#[from] io::Error),

    #[error("frame of {len} bytes exceeds limit of {max}")]
    TooLarge { len: usize, max: usize },

    #[error("invalid frame JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Reads one frame. Returns `Ok(None)` on a clean end of stream.
///
/// A frame is a little-endian `u32` length followed by that many bytes of
/// UTF-8 JSON.
///
/// # Errors
///
/// Fails on I/O errors, truncated frames, oversize frames and bad JSON. An
/// oversize frame is consumed so the stream stays aligned.
pub async fn read_frame<R, T>(reader: &mut R) -> Result<Option<T>, FrameError>
where
    R: AsyncRead + Unpin,
    T: DeserializeOwned,
{
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }

    let len = usize::try_from(u32::from_le_bytes(len_buf)).unwrap_or(usize::MAX);
    if len > MAX_FRAME_LEN {
        let skip = u64::from(u32::from_le_bytes(len_buf));
        let mut discarded = (&mut *reader).take(skip);
        tokio::io::copy(&mut discarded, &mut tokio::io::sink()).await?;
        return Err(FrameError::TooLarge {
            len,
            max: MAX_FRAME_LEN,
        });
    }

    let mut body = vec![0u8; len];
    reader.read_exact(&mut body).await?;
    Ok(Some(serde_json::from_slice(&body)?))
}

/// Writes one frame and flushes. Outbound frames share the inbound limit.
///
/// # Errors
///
/// Fails on serialization errors, oversize messages and I/O errors.
pub async fn write_frame<W, T>(writer: &mut W, message: &T) -> Result<(), FrameError>
where
    W: AsyncWrite + Unpin,
    T: Serialize + ?Sized,
{
    let body = serde_json::to_vec(message)?;
    if body.len() > MAX_FRAME_LEN {
        return Err(FrameError::TooLarge {
            len: body.len(),
            max: MAX_FRAME_LEN,
        });
    }
    let len = u32::try_from(body.len()).map_err(|_| FrameError::TooLarge {
        len: body.len(),
        max: MAX_FRAME_LEN,
    })?;
    writer.write_all(&len.to_le_bytes()).await?;
    writer.write_all(&body).await?;
    writer.flush().await?;
    Ok(())
}

/// True if the error means the stream can no longer be read.
#[must_use]
pub fn is_fatal(error: &FrameError) -> bool {
    matches!(error, FrameError::Io(_))
}
