//! Client side of the control channel
//!
//! [`ControlChannel`] drives one request at a time over a framed stream. The
//! caller is responsible for never having two requests outstanding; the
//! runtime enforces that with its exclusion mutex.

use tokio::io::{AsyncRead, AsyncWrite, ReadHalf, WriteHalf};
use tracing::{debug, trace};

use crate::protocol::frame::{ClientFrame, ServerFrame};
use crate::protocol::wire::{FrameReader, FrameWriter};
use crate::{Category, ChannelError, PokequeryError, Record, RecordCodec};

// ----------------------------------------------------------------------------
// Query Response
// ----------------------------------------------------------------------------

/// A complete three-part answer to a category request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryResponse {
    pub category: Category,
    /// Record lines joined by the record separator
    pub payload: String,
    /// Record count announced by the server
    pub count: u64,
}

impl QueryResponse {
    /// Decode every record in the payload
    ///
    /// All-or-nothing: a single malformed line fails the whole response.
    pub fn into_records(self, codec: &RecordCodec) -> Result<Vec<Record>, PokequeryError> {
        let lines = codec.split_payload(&self.payload);
        if lines.len() as u64 != self.count {
            return Err(ChannelError::CountMismatch {
                expected: self.count,
                actual: lines.len() as u64,
            }
            .into());
        }
        lines
            .into_iter()
            .map(|line| codec.decode(line).map_err(PokequeryError::from))
            .collect()
    }
}

// ----------------------------------------------------------------------------
// Control Channel
// ----------------------------------------------------------------------------

/// Framed connection to a query server
pub struct ControlChannel<S> {
    reader: FrameReader<ReadHalf<S>>,
    writer: FrameWriter<WriteHalf<S>>,
}

impl<S: AsyncRead + AsyncWrite> ControlChannel<S> {
    pub fn new(stream: S, max_frame_size: usize) -> Self {
        let (read_half, write_half) = tokio::io::split(stream);
        Self {
            reader: FrameReader::new(read_half, max_frame_size),
            writer: FrameWriter::new(write_half, max_frame_size),
        }
    }

    /// Send one frame
    pub async fn send(&mut self, frame: &ClientFrame) -> Result<(), ChannelError> {
        trace!("Sending {} frame", frame.kind());
        self.writer.write_frame(frame).await
    }

    /// Receive one frame; a closed stream is an error here
    pub async fn recv(&mut self) -> Result<ServerFrame, ChannelError> {
        let frame: ServerFrame = self.reader.read_frame().await?.ok_or(ChannelError::Closed)?;
        trace!("Received {} frame", frame.kind());
        match frame {
            ServerFrame::Failure { reason } => Err(ChannelError::Remote { reason }),
            frame => Ok(frame),
        }
    }

    /// Perform one full category round trip
    pub async fn request_category(
        &mut self,
        category: Category,
    ) -> Result<QueryResponse, ChannelError> {
        self.send(&ClientFrame::CategoryRequest { category }).await?;

        let announced = match self.recv().await? {
            ServerFrame::SizeHeader { bytes } => bytes,
            other => return Err(unexpected("size-header", &other)),
        };
        let payload = match self.recv().await? {
            ServerFrame::Payload { records } => records,
            other => return Err(unexpected("payload", &other)),
        };
        if payload.len() as u64 != announced {
            return Err(ChannelError::LengthMismatch {
                expected: announced,
                actual: payload.len() as u64,
            });
        }
        let count = match self.recv().await? {
            ServerFrame::CountHeader { count } => count,
            other => return Err(unexpected("count-header", &other)),
        };

        debug!("Received {} {} record(s), {} bytes", count, category, announced);
        Ok(QueryResponse {
            category,
            payload,
            count,
        })
    }

    /// Ask the server to suspend scanning; returns whether a scan was paused
    pub async fn pause(&mut self) -> Result<bool, ChannelError> {
        self.send(&ClientFrame::Pause).await?;
        match self.recv().await? {
            ServerFrame::PauseAck { applied } => Ok(applied),
            other => Err(unexpected("pause-ack", &other)),
        }
    }

    /// Ask the server to resume scanning; returns whether anything was paused
    pub async fn unpause(&mut self) -> Result<bool, ChannelError> {
        self.send(&ClientFrame::Unpause).await?;
        match self.recv().await? {
            ServerFrame::UnpauseAck { resumed } => Ok(resumed),
            other => Err(unexpected("unpause-ack", &other)),
        }
    }

    /// Terminate the session and close the write direction
    pub async fn stop(&mut self) -> Result<(), ChannelError> {
        self.send(&ClientFrame::Stop).await?;
        self.writer.shutdown().await
    }
}

fn unexpected(expected: &'static str, actual: &ServerFrame) -> ChannelError {
    ChannelError::UnexpectedFrame {
        expected,
        actual: actual.kind(),
    }
}
