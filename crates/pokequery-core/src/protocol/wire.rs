//! Length-prefixed frame codec
//!
//! Each frame is a big-endian `u32` body length followed by the `bincode`
//! encoded body. Lengths above the configured maximum are rejected before
//! the body is read.

use std::io;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::ChannelError;

// ----------------------------------------------------------------------------
// Constants
// ----------------------------------------------------------------------------

/// Size of the length prefix
pub const FRAME_HEADER_SIZE: usize = 4;

// ----------------------------------------------------------------------------
// Frame Functions
// ----------------------------------------------------------------------------

/// Encode and write one frame, flushing the writer
pub async fn write_frame<W, T>(
    writer: &mut W,
    frame: &T,
    max_frame_size: usize,
) -> Result<(), ChannelError>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let body = bincode::serialize(frame)?;
    let too_large = || ChannelError::FrameTooLarge {
        size: body.len(),
        max_size: max_frame_size,
    };
    if body.len() > max_frame_size {
        return Err(too_large());
    }
    let length = u32::try_from(body.len()).map_err(|_| too_large())?;

    let mut bytes = Vec::with_capacity(FRAME_HEADER_SIZE + body.len());
    bytes.extend_from_slice(&length.to_be_bytes());
    bytes.extend_from_slice(&body);
    writer.write_all(&bytes).await?;
    writer.flush().await?;
    Ok(())
}

/// Read one frame
///
/// Returns `Ok(None)` when the peer closed the stream between frames; a
/// stream that ends partway through a header is an I/O error. A
/// `Codec` error leaves the stream positioned at the next frame.
pub async fn read_frame<R, T>(
    reader: &mut R,
    max_frame_size: usize,
) -> Result<Option<T>, ChannelError>
where
    R: AsyncRead + Unpin,
    T: DeserializeOwned,
{
    let mut header = [0u8; FRAME_HEADER_SIZE];
    let mut filled = 0;
    while filled < FRAME_HEADER_SIZE {
        let read = reader.read(&mut header[filled..]).await?;
        if read == 0 {
            if filled == 0 {
                return Ok(None);
            }
            return Err(ChannelError::NetworkIo(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "stream ended inside a frame header",
            )));
        }
        filled += read;
    }

    let length = u32::from_be_bytes(header) as usize;
    if length > max_frame_size {
        return Err(ChannelError::FrameTooLarge {
            size: length,
            max_size: max_frame_size,
        });
    }

    let mut body = vec![0u8; length];
    reader.read_exact(&mut body).await?;
    Ok(Some(bincode::deserialize(&body)?))
}

// ----------------------------------------------------------------------------
// Framed Halves
// ----------------------------------------------------------------------------

/// Reading half of a framed stream
#[derive(Debug)]
pub struct FrameReader<R> {
    inner: R,
    max_frame_size: usize,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    pub fn new(inner: R, max_frame_size: usize) -> Self {
        Self {
            inner,
            max_frame_size,
        }
    }

    pub async fn read_frame<T: DeserializeOwned>(&mut self) -> Result<Option<T>, ChannelError> {
        read_frame(&mut self.inner, self.max_frame_size).await
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

/// Writing half of a framed stream
#[derive(Debug)]
pub struct FrameWriter<W> {
    inner: W,
    max_frame_size: usize,
}

impl<W: AsyncWrite + Unpin> FrameWriter<W> {
    pub fn new(inner: W, max_frame_size: usize) -> Self {
        Self {
            inner,
            max_frame_size,
        }
    }

    pub async fn write_frame<T: Serialize>(&mut self, frame: &T) -> Result<(), ChannelError> {
        write_frame(&mut self.inner, frame, self.max_frame_size).await
    }

    /// Flush and close the write direction
    pub async fn shutdown(&mut self) -> Result<(), ChannelError> {
        self.inner.shutdown().await?;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}
