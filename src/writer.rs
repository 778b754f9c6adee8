//! Dedicated writer task for outbound frames.
//!
//! All outbound frames go through a single task that owns the write
//! half of the transport and receives frames via an mpsc channel.
//! This keeps frame boundaries intact without a mutex around the
//! socket: the payload forwarder, the dispatcher, and cancel-on-drop
//! guards all hold cheap clones of [`WriterHandle`].

use bytes::Bytes;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::{Result, WirecallError};
use crate::protocol::{FrameType, Header, DEFAULT_MAX_BODY_SIZE, HEADER_SIZE};

/// Default channel capacity for the frame queue.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 64;

/// A frame ready to be written to the transport.
#[derive(Debug)]
pub struct OutboundFrame {
    /// Pre-encoded header (14 bytes).
    pub header: [u8; HEADER_SIZE],
    /// Metadata bytes (may be empty).
    pub metadata: Bytes,
    /// Data bytes (may be empty).
    pub data: Bytes,
}

impl OutboundFrame {
    /// Create a new outbound frame.
    ///
    /// Applies the same body-size limit as the inbound parser, so a
    /// body too large for the length fields is rejected here instead
    /// of corrupting framing with a truncated length.
    pub fn new(
        stream_id: u32,
        frame_type: FrameType,
        flags: u8,
        metadata: Bytes,
        data: Bytes,
    ) -> Result<Self> {
        let body_length = metadata.len() as u64 + data.len() as u64;
        if body_length > u64::from(DEFAULT_MAX_BODY_SIZE) {
            return Err(WirecallError::Protocol(format!(
                "Frame body size {} exceeds maximum {}",
                body_length, DEFAULT_MAX_BODY_SIZE
            )));
        }
        let header = Header::new(
            stream_id,
            frame_type,
            flags,
            metadata.len() as u32,
            data.len() as u32,
        );
        Ok(Self {
            header: header.encode(),
            metadata,
            data,
        })
    }

    /// Create a new outbound frame with an empty body.
    pub fn empty(stream_id: u32, frame_type: FrameType, flags: u8) -> Self {
        let header = Header::new(stream_id, frame_type, flags, 0, 0);
        Self {
            header: header.encode(),
            metadata: Bytes::new(),
            data: Bytes::new(),
        }
    }

    /// Total size of this frame (header + body).
    #[inline]
    pub fn size(&self) -> usize {
        HEADER_SIZE + self.metadata.len() + self.data.len()
    }
}

/// Handle for sending frames to the writer task.
///
/// Cheaply cloneable.
#[derive(Clone)]
pub struct WriterHandle {
    tx: mpsc::Sender<OutboundFrame>,
}

impl WriterHandle {
    /// Send a frame to the writer task, waiting for queue space.
    pub async fn send(&self, frame: OutboundFrame) -> Result<()> {
        self.tx
            .send(frame)
            .await
            .map_err(|_| WirecallError::ConnectionClosed)
    }

    /// Try to send a frame without waiting.
    ///
    /// Used from non-async contexts (cancel-on-drop). A full queue or a
    /// closed connection returns `Err(ConnectionClosed)`.
    pub fn try_send(&self, frame: OutboundFrame) -> Result<()> {
        self.tx
            .try_send(frame)
            .map_err(|_| WirecallError::ConnectionClosed)
    }
}

/// Spawn the writer task and return a handle for sending frames.
///
/// The task runs until every [`WriterHandle`] is dropped, then shuts
/// down cleanly.
pub fn spawn_writer_task<W>(writer: W) -> (WriterHandle, JoinHandle<Result<()>>)
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, rx) = mpsc::channel(DEFAULT_CHANNEL_CAPACITY);
    let task = tokio::spawn(writer_loop(rx, writer));
    (WriterHandle { tx }, task)
}

/// Main writer loop - receives frames and writes them to the transport.
async fn writer_loop<W>(mut rx: mpsc::Receiver<OutboundFrame>, mut writer: W) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(frame) = rx.recv().await {
        writer.write_all(&frame.header).await?;
        if !frame.metadata.is_empty() {
            writer.write_all(&frame.metadata).await?;
        }
        if !frame.data.is_empty() {
            writer.write_all(&frame.data).await?;
        }
        writer.flush().await?;
    }
    // Channel closed, clean shutdown
    Ok(())
}
