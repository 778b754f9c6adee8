//! Protocol client: the [`MessagingClient`] seam and the bundled
//! [`WireClient`].
//!
//! The dispatcher only knows the trait; the wire client is one
//! implementation of it. Lifecycle:
//! 1. Connect the transport
//! 2. Spawn the writer task and the read loop
//! 3. Send the SETUP handshake (stream 0, JSON)
//! 4. Multiplex requests over monotonically allocated stream IDs
//!
//! Cancellation is drop-based: dropping a response stream before it
//! completes deregisters the stream and sends a CANCEL frame. For
//! RequestChannel this cancels the inbound side only; the outbound
//! payload forwarder runs until its source completes.

use std::collections::HashMap;
use std::pin::Pin;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::task::{Context, Poll};

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{BoxStream, Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::{Result, WirecallError};
use crate::metadata::COMPOSITE_MIME;
use crate::payload::{Payload, PayloadStream};
use crate::protocol::{flags, Frame, FrameBuffer, FrameType, SETUP_STREAM_ID};
use crate::transport::{self, ConnectTarget};
use crate::writer::{spawn_writer_task, OutboundFrame, WriterHandle};

/// Protocol version announced in the setup handshake.
pub const PROTOCOL_VERSION: &str = "0.1";

/// Default data MIME type.
pub const OCTET_STREAM_MIME: &str = "application/octet-stream";

/// Channel capacity for inbound response elements, per stream.
const RESPONSE_CHANNEL_CAPACITY: usize = 32;

/// Stream of raw response elements.
pub type ResponseStream = BoxStream<'static, Result<Bytes>>;

/// Connection setup document, sent as JSON on stream 0.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Setup {
    /// Protocol version.
    pub version: String,
    /// MIME type of payload data.
    pub data_mime_type: String,
    /// MIME type of payload metadata.
    pub metadata_mime_type: String,
}

impl Default for Setup {
    fn default() -> Self {
        Self {
            version: PROTOCOL_VERSION.to_string(),
            data_mime_type: OCTET_STREAM_MIME.to_string(),
            metadata_mime_type: COMPOSITE_MIME.to_string(),
        }
    }
}

/// One operation per interaction variant.
///
/// Dropping a returned [`ResponseStream`] before it completes is the
/// cancellation signal; implementations must stop producing elements
/// for that stream.
#[async_trait]
pub trait MessagingClient: Send + Sync {
    /// Single request, single response element.
    async fn request_response(&self, payload: Payload) -> Result<Bytes>;

    /// Single request, streamed response elements.
    async fn request_stream(&self, payload: Payload) -> Result<ResponseStream>;

    /// Bidirectional exchange: outbound payload stream, inbound
    /// response stream, independently terminated.
    async fn request_channel(&self, payloads: PayloadStream) -> Result<ResponseStream>;

    /// Single request, no response.
    async fn fire_and_forget(&self, payload: Payload) -> Result<()>;
}

/// Inbound routes, keyed by stream ID.
type RouteMap = HashMap<u32, mpsc::Sender<Result<Bytes>>>;

/// Shared registry of live inbound routes.
type Registry = Arc<Mutex<RouteMap>>;

fn lock(registry: &Registry) -> std::sync::MutexGuard<'_, RouteMap> {
    registry.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A connected wire client.
pub struct WireClient {
    writer: WriterHandle,
    registry: Registry,
    next_stream_id: AtomicU32,
    _read_task: JoinHandle<()>,
    _writer_task: JoinHandle<Result<()>>,
}

impl WireClient {
    /// Connect to a remote endpoint and perform the setup handshake.
    pub async fn connect(target: &ConnectTarget, setup: Setup) -> Result<Self> {
        let io = transport::connect(target).await?;
        Self::from_transport(io, setup).await
    }

    /// Build a client over an already-connected transport.
    ///
    /// Split out from [`connect`](Self::connect) so tests can drive the
    /// client over an in-memory duplex.
    pub async fn from_transport<S>(io: S, setup: Setup) -> Result<Self>
    where
        S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
    {
        let (reader, write_half) = tokio::io::split(io);
        let (writer, writer_task) = spawn_writer_task(write_half);

        let registry: Registry = Arc::new(Mutex::new(HashMap::new()));
        let read_registry = registry.clone();
        let read_task = tokio::spawn(async move {
            if let Err(e) = Self::read_loop(reader, &read_registry).await {
                tracing::error!("Read loop error: {}", e);
            }
            // Connection gone: every stream still live gets a terminal
            // error. The send must not be dropped when the stream's
            // channel is full of buffered elements, so each one waits
            // for space on its own task.
            let senders: Vec<_> = lock(&read_registry).drain().collect();
            for (_, tx) in senders {
                tokio::spawn(async move {
                    let _ = tx.send(Err(WirecallError::ConnectionClosed)).await;
                });
            }
        });

        let setup_json = serde_json::to_vec(&setup)?;
        let client = Self {
            writer,
            registry,
            next_stream_id: AtomicU32::new(1),
            _read_task: read_task,
            _writer_task: writer_task,
        };
        client
            .writer
            .send(OutboundFrame::new(
                SETUP_STREAM_ID,
                FrameType::Setup,
                0,
                Bytes::new(),
                Bytes::from(setup_json),
            )?)
            .await?;

        Ok(client)
    }

    /// Main read loop - reads frames and routes them by stream ID.
    async fn read_loop<R: AsyncRead + Unpin>(mut reader: R, registry: &Registry) -> Result<()> {
        let mut frame_buffer = FrameBuffer::new();
        let mut buf = vec![0u8; 64 * 1024];

        loop {
            let n = match reader.read(&mut buf).await {
                Ok(0) => return Ok(()), // Connection closed
                Ok(n) => n,
                Err(e) => return Err(WirecallError::Io(e)),
            };

            let frames = frame_buffer.push(&buf[..n])?;
            for frame in frames {
                Self::route_frame(frame, registry).await;
            }
        }
    }

    /// Route a single inbound frame to its stream.
    async fn route_frame(frame: Frame, registry: &Registry) {
        let stream_id = frame.stream_id();
        match frame.frame_type() {
            Some(FrameType::Payload) => {
                let sender = lock(registry).get(&stream_id).cloned();
                let Some(tx) = sender else {
                    tracing::debug!(stream_id, "Payload for unknown stream");
                    return;
                };
                if frame.is_next() {
                    // Awaiting the send is the backpressure path: a slow
                    // pipeline slows the read loop.
                    if tx.send(Ok(frame.data.clone())).await.is_err() {
                        lock(registry).remove(&stream_id);
                        return;
                    }
                }
                if frame.is_complete() {
                    // Dropping the sender completes the stream.
                    lock(registry).remove(&stream_id);
                }
            }
            Some(FrameType::Error) => {
                let sender = lock(registry).remove(&stream_id);
                if let Some(tx) = sender {
                    let message = String::from_utf8_lossy(&frame.data).into_owned();
                    let _ = tx.send(Err(WirecallError::Remote(message))).await;
                }
            }
            other => {
                tracing::warn!(stream_id, frame_type = ?other, "Unexpected inbound frame");
            }
        }
    }

    /// Allocate a stream ID and register an inbound route for it.
    fn register(&self, capacity: usize) -> (u32, mpsc::Receiver<Result<Bytes>>) {
        let stream_id = self.next_stream_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(capacity);
        lock(&self.registry).insert(stream_id, tx);
        (stream_id, rx)
    }

    fn inbound_stream(&self, stream_id: u32, rx: mpsc::Receiver<Result<Bytes>>) -> ResponseStream {
        WireStream {
            rx,
            _guard: CancelGuard {
                stream_id,
                writer: self.writer.clone(),
                registry: self.registry.clone(),
            },
        }
        .boxed()
    }
}

/// Build the frame that carries a payload (requests and channel elements).
fn payload_frame(
    stream_id: u32,
    frame_type: FrameType,
    payload: &Payload,
) -> Result<OutboundFrame> {
    let mut frame_flags = flags::NEXT;
    let metadata = match &payload.metadata {
        Some(m) => {
            frame_flags |= flags::METADATA;
            m.bytes.clone()
        }
        None => Bytes::new(),
    };
    OutboundFrame::new(
        stream_id,
        frame_type,
        frame_flags,
        metadata,
        payload.data.clone(),
    )
}

/// Build the Error frame carrying a failure message for a stream.
fn error_frame(stream_id: u32, message: &str) -> OutboundFrame {
    // An error message can never trip the body-size guard; an empty
    // body is the fallback either way.
    OutboundFrame::new(
        stream_id,
        FrameType::Error,
        0,
        Bytes::new(),
        Bytes::copy_from_slice(message.as_bytes()),
    )
    .unwrap_or_else(|_| OutboundFrame::empty(stream_id, FrameType::Error, 0))
}

#[async_trait]
impl MessagingClient for WireClient {
    async fn request_response(&self, payload: Payload) -> Result<Bytes> {
        let (stream_id, mut rx) = self.register(1);
        let frame = match payload_frame(stream_id, FrameType::RequestResponse, &payload) {
            Ok(frame) => frame,
            Err(e) => {
                lock(&self.registry).remove(&stream_id);
                return Err(e);
            }
        };
        self.writer.send(frame).await?;

        let result = match rx.recv().await {
            Some(Ok(bytes)) => Ok(bytes),
            Some(Err(e)) => Err(e),
            None => Err(WirecallError::Protocol(
                "Response completed without a payload".to_string(),
            )),
        };
        lock(&self.registry).remove(&stream_id);
        result
    }

    async fn request_stream(&self, payload: Payload) -> Result<ResponseStream> {
        let (stream_id, rx) = self.register(RESPONSE_CHANNEL_CAPACITY);
        let frame = match payload_frame(stream_id, FrameType::RequestStream, &payload) {
            Ok(frame) => frame,
            Err(e) => {
                lock(&self.registry).remove(&stream_id);
                return Err(e);
            }
        };
        self.writer.send(frame).await?;
        Ok(self.inbound_stream(stream_id, rx))
    }

    /// Inbound-only cancellation: dropping the returned stream sends
    /// CANCEL for this stream ID, but the outbound forwarder keeps
    /// sending until the payload source completes.
    async fn request_channel(&self, mut payloads: PayloadStream) -> Result<ResponseStream> {
        let (stream_id, rx) = self.register(RESPONSE_CHANNEL_CAPACITY);
        self.writer
            .send(OutboundFrame::empty(stream_id, FrameType::RequestChannel, 0))
            .await?;

        let writer = self.writer.clone();
        tokio::spawn(async move {
            while let Some(item) = payloads.next().await {
                let built = item
                    .and_then(|payload| payload_frame(stream_id, FrameType::Payload, &payload));
                match built {
                    Ok(frame) => {
                        if writer.send(frame).await.is_err() {
                            return;
                        }
                    }
                    Err(e) => {
                        tracing::warn!(stream_id, error = %e, "Outbound payload source failed");
                        let _ = writer.send(error_frame(stream_id, &e.to_string())).await;
                        return;
                    }
                }
            }
            let _ = writer
                .send(OutboundFrame::empty(
                    stream_id,
                    FrameType::Payload,
                    flags::COMPLETE,
                ))
                .await;
        });

        Ok(self.inbound_stream(stream_id, rx))
    }

    async fn fire_and_forget(&self, payload: Payload) -> Result<()> {
        let stream_id = self.next_stream_id.fetch_add(1, Ordering::Relaxed);
        self.writer
            .send(payload_frame(stream_id, FrameType::FireForget, &payload)?)
            .await
    }
}

/// Inbound response stream with cancel-on-drop semantics.
struct WireStream {
    rx: mpsc::Receiver<Result<Bytes>>,
    _guard: CancelGuard,
}

impl Stream for WireStream {
    type Item = Result<Bytes>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().rx.poll_recv(cx)
    }
}

/// Sends CANCEL if the stream is dropped while still registered.
///
/// On natural completion or a terminal error the read loop has already
/// deregistered the stream, so no CANCEL goes out.
struct CancelGuard {
    stream_id: u32,
    writer: WriterHandle,
    registry: Registry,
}

impl Drop for CancelGuard {
    fn drop(&mut self) {
        let was_live = lock(&self.registry).remove(&self.stream_id).is_some();
        if was_live {
            tracing::debug!(stream_id = self.stream_id, "Cancelling in-flight stream");
            let _ = self
                .writer
                .try_send(OutboundFrame::empty(self.stream_id, FrameType::Cancel, 0));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::build_frame_with_flags;
    use std::collections::VecDeque;
    use std::time::Duration;
    use tokio::io::{duplex, AsyncWriteExt, DuplexStream};

    /// Remote end of the duplex, speaking raw frames.
    struct FakeServer {
        io: DuplexStream,
        buffer: FrameBuffer,
        pending: VecDeque<Frame>,
    }

    impl FakeServer {
        fn new(io: DuplexStream) -> Self {
            Self {
                io,
                buffer: FrameBuffer::new(),
                pending: VecDeque::new(),
            }
        }

        async fn next_frame(&mut self) -> Frame {
            loop {
                if let Some(frame) = self.pending.pop_front() {
                    return frame;
                }
                let mut buf = vec![0u8; 4096];
                let n = self.io.read(&mut buf).await.unwrap();
                assert!(n > 0, "server side closed unexpectedly");
                self.pending.extend(self.buffer.push(&buf[..n]).unwrap());
            }
        }

        async fn send(&mut self, bytes: &[u8]) {
            self.io.write_all(bytes).await.unwrap();
        }
    }

    async fn connected_client() -> (WireClient, FakeServer) {
        let (client_io, server_io) = duplex(64 * 1024);
        let client = WireClient::from_transport(client_io, Setup::default())
            .await
            .unwrap();

        let mut server = FakeServer::new(server_io);
        let setup = server.next_frame().await;
        assert_eq!(setup.frame_type(), Some(FrameType::Setup));
        (client, server)
    }

    #[tokio::test]
    async fn test_setup_handshake_sent_on_connect() {
        let (client_io, server_io) = duplex(64 * 1024);
        let _client = WireClient::from_transport(client_io, Setup::default())
            .await
            .unwrap();

        let mut server = FakeServer::new(server_io);
        let frame = server.next_frame().await;

        assert_eq!(frame.frame_type(), Some(FrameType::Setup));
        assert_eq!(frame.stream_id(), SETUP_STREAM_ID);

        let setup: Setup = serde_json::from_slice(&frame.data).unwrap();
        assert_eq!(setup.version, PROTOCOL_VERSION);
        assert_eq!(setup.data_mime_type, OCTET_STREAM_MIME);
        assert_eq!(setup.metadata_mime_type, COMPOSITE_MIME);
    }

    #[tokio::test]
    async fn test_request_response_roundtrip() {
        let (client, mut server) = connected_client().await;

        let server_task = tokio::spawn(async move {
            let request = server.next_frame().await;
            assert_eq!(request.frame_type(), Some(FrameType::RequestResponse));
            assert_eq!(&request.data[..], b"ping");

            let reply = build_frame_with_flags(
                request.stream_id(),
                FrameType::Payload,
                flags::NEXT | flags::COMPLETE,
                b"",
                b"pong",
            );
            server.send(&reply).await;
            server
        });

        let response = client
            .request_response(Payload::new(Bytes::from_static(b"ping"), None))
            .await
            .unwrap();
        assert_eq!(&response[..], b"pong");
        server_task.await.unwrap();
    }

    #[tokio::test]
    async fn test_request_response_carries_metadata() {
        let (client, mut server) = connected_client().await;

        let metadata = crate::metadata::compose(&[crate::metadata::MetadataEntry::route(
            "orders.get",
        )])
        .unwrap();
        let payload = Payload::new(Bytes::from_static(b"ping"), metadata);

        let server_task = tokio::spawn(async move {
            let request = server.next_frame().await;
            assert!(request.has_metadata());
            assert_eq!(&request.metadata[..], b"orders.get");

            let reply = build_frame_with_flags(
                request.stream_id(),
                FrameType::Payload,
                flags::NEXT | flags::COMPLETE,
                b"",
                b"pong",
            );
            server.send(&reply).await;
        });

        client.request_response(payload).await.unwrap();
        server_task.await.unwrap();
    }

    #[tokio::test]
    async fn test_request_stream_elements_then_completion() {
        let (client, mut server) = connected_client().await;

        let server_task = tokio::spawn(async move {
            let request = server.next_frame().await;
            assert_eq!(request.frame_type(), Some(FrameType::RequestStream));
            let id = request.stream_id();

            for body in [&b"one"[..], b"two", b"three"] {
                let frame = build_frame_with_flags(id, FrameType::Payload, flags::NEXT, b"", body);
                server.send(&frame).await;
            }
            let complete =
                build_frame_with_flags(id, FrameType::Payload, flags::COMPLETE, b"", b"");
            server.send(&complete).await;
            server
        });

        let stream = client
            .request_stream(Payload::new(Bytes::from_static(b"go"), None))
            .await
            .unwrap();
        let elements: Vec<_> = stream.map(|e| e.unwrap()).collect().await;

        assert_eq!(elements.len(), 3);
        assert_eq!(&elements[0][..], b"one");
        assert_eq!(&elements[2][..], b"three");
        server_task.await.unwrap();
    }

    #[tokio::test]
    async fn test_request_stream_remote_error_surfaces() {
        let (client, mut server) = connected_client().await;

        let server_task = tokio::spawn(async move {
            let request = server.next_frame().await;
            let frame = build_frame_with_flags(
                request.stream_id(),
                FrameType::Error,
                0,
                b"",
                b"no such route",
            );
            server.send(&frame).await;
            server
        });

        let mut stream = client
            .request_stream(Payload::new(Bytes::from_static(b"go"), None))
            .await
            .unwrap();

        let first = stream.next().await.unwrap();
        match first {
            Err(WirecallError::Remote(message)) => assert_eq!(message, "no such route"),
            other => panic!("expected remote error, got {:?}", other.map(|b| b.len())),
        }
        assert!(stream.next().await.is_none());
        server_task.await.unwrap();
    }

    #[tokio::test]
    async fn test_cancel_frame_sent_on_early_drop() {
        let (client, mut server) = connected_client().await;

        let request = {
            let mut stream = client
                .request_stream(Payload::new(Bytes::from_static(b"go"), None))
                .await
                .unwrap();
            let request = server.next_frame().await;

            // One element arrives, then the consumer loses interest.
            let frame = build_frame_with_flags(
                request.stream_id(),
                FrameType::Payload,
                flags::NEXT,
                b"",
                b"one",
            );
            server.send(&frame).await;

            let first = stream.next().await.unwrap().unwrap();
            assert_eq!(&first[..], b"one");
            request
            // stream dropped here
        };

        let cancel = server.next_frame().await;
        assert_eq!(cancel.frame_type(), Some(FrameType::Cancel));
        assert_eq!(cancel.stream_id(), request.stream_id());
    }

    #[tokio::test]
    async fn test_request_channel_forwards_payloads_in_order() {
        let (client, mut server) = connected_client().await;

        let payloads: PayloadStream = futures::stream::iter(vec![
            Ok(Payload::new(Bytes::from_static(b"a"), None)),
            Ok(Payload::new(Bytes::from_static(b"b"), None)),
        ])
        .boxed();

        let mut inbound = client.request_channel(payloads).await.unwrap();

        let open = server.next_frame().await;
        assert_eq!(open.frame_type(), Some(FrameType::RequestChannel));
        let id = open.stream_id();

        let first = server.next_frame().await;
        assert_eq!(first.frame_type(), Some(FrameType::Payload));
        assert!(first.is_next());
        assert_eq!(&first.data[..], b"a");

        let second = server.next_frame().await;
        assert_eq!(&second.data[..], b"b");

        let complete = server.next_frame().await;
        assert!(complete.is_complete());
        assert!(!complete.is_next());

        // Remote completes the inbound side independently.
        let reply = build_frame_with_flags(
            id,
            FrameType::Payload,
            flags::NEXT | flags::COMPLETE,
            b"",
            b"done",
        );
        server.send(&reply).await;

        let element = inbound.next().await.unwrap().unwrap();
        assert_eq!(&element[..], b"done");
        assert!(inbound.next().await.is_none());
    }

    #[tokio::test]
    async fn test_fire_and_forget_sends_single_frame() {
        let (client, mut server) = connected_client().await;

        client
            .fire_and_forget(Payload::new(Bytes::from_static(b"event"), None))
            .await
            .unwrap();

        let frame = server.next_frame().await;
        assert_eq!(frame.frame_type(), Some(FrameType::FireForget));
        assert!(frame.is_next());
        assert_eq!(&frame.data[..], b"event");
    }

    #[tokio::test]
    async fn test_connection_loss_fails_live_stream() {
        let (client, mut server) = connected_client().await;

        let mut stream = client
            .request_stream(Payload::new(Bytes::from_static(b"go"), None))
            .await
            .unwrap();
        let _request = server.next_frame().await;

        drop(server);
        tokio::time::sleep(Duration::from_millis(20)).await;

        let item = stream.next().await.unwrap();
        assert!(matches!(item, Err(WirecallError::ConnectionClosed)));
    }

    #[tokio::test]
    async fn test_connection_loss_with_full_channel_still_errors() {
        let (client, mut server) = connected_client().await;

        let mut stream = client
            .request_stream(Payload::new(Bytes::from_static(b"go"), None))
            .await
            .unwrap();
        let request = server.next_frame().await;
        let id = request.stream_id();

        // Fill the per-stream channel exactly, with no COMPLETE.
        for _ in 0..RESPONSE_CHANNEL_CAPACITY {
            let frame = build_frame_with_flags(id, FrameType::Payload, flags::NEXT, b"", b"x");
            server.send(&frame).await;
        }
        drop(server);

        // Let the read task buffer everything and observe the EOF
        // before the consumer starts draining.
        tokio::time::sleep(Duration::from_millis(50)).await;

        let mut delivered = 0usize;
        loop {
            match stream.next().await {
                Some(Ok(bytes)) => {
                    assert_eq!(&bytes[..], b"x");
                    delivered += 1;
                }
                Some(Err(e)) => {
                    assert!(matches!(e, WirecallError::ConnectionClosed));
                    break;
                }
                None => panic!(
                    "connection died without COMPLETE but the stream ended cleanly \
                     after {delivered} elements"
                ),
            }
        }
        assert_eq!(delivered, RESPONSE_CHANNEL_CAPACITY);
        assert!(stream.next().await.is_none());
    }
}
