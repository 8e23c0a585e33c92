//! Per-connection handler and the outbound encode path.
//!
//! A [`ConnectionHandler`] represents exactly one live connection. The read
//! half of the stream is owned by the connection's I/O task; the handler
//! keeps the write half behind an async mutex so the message processor can
//! produce outbound frames during dispatch. Termination is signalled by a
//! cancellation token: cancelling it unblocks the decode loop at its next
//! poll, after which the task runs the close observer and deregisters the
//! handler.

use bytes::BytesMut;
use std::fmt;
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::core::codec::FrameCodec;
use crate::core::frame::Frame;
use crate::error::{ProtocolError, Result};
use crate::protocol::ServerProtocol;
use crate::service::registry::ConnectionId;

/// One live, accepted connection.
pub struct ConnectionHandler<P: ServerProtocol> {
    id: ConnectionId,
    peer_addr: SocketAddr,
    state: P::State,
    protocol: Arc<P>,
    writer: Mutex<OwnedWriteHalf>,
    shutdown: CancellationToken,
    connected: AtomicBool,
    max_frame_size: usize,
}

impl<P: ServerProtocol> fmt::Debug for ConnectionHandler<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionHandler")
            .field("id", &self.id)
            .field("peer_addr", &self.peer_addr)
            .field("connected", &self.connected.load(Ordering::SeqCst))
            .field("max_frame_size", &self.max_frame_size)
            .finish_non_exhaustive()
    }
}

impl<P: ServerProtocol> ConnectionHandler<P> {
    pub(crate) fn new(
        peer_addr: SocketAddr,
        state: P::State,
        protocol: Arc<P>,
        write_half: OwnedWriteHalf,
        max_frame_size: usize,
    ) -> Self {
        Self {
            id: ConnectionId::next(),
            peer_addr,
            state,
            protocol,
            writer: Mutex::new(write_half),
            shutdown: CancellationToken::new(),
            connected: AtomicBool::new(true),
            max_frame_size,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    /// The opaque application state created for this connection.
    pub fn state(&self) -> &P::State {
        &self.state
    }

    /// Whether the connection is still open from the handler's point of
    /// view. Goes false on close, force-close, or an observed I/O failure.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Forcibly terminate this connection, recording a human-readable
    /// reason. The decode loop unblocks at its next poll.
    pub fn close(&self, reason: &str) {
        info!(connection = %self.id, peer = %self.peer_addr, reason, "closing connection");
        self.connected.store(false, Ordering::SeqCst);
        self.shutdown.cancel();
    }

    /// Start an outbound frame. Bytes written to the returned writer are
    /// buffered until [`FrameWriter::finish`] encodes and sends them.
    pub fn create_writer(&self) -> FrameWriter<'_, P> {
        FrameWriter {
            handler: self,
            buf: BytesMut::new(),
        }
    }

    /// Send one payload as a single frame.
    pub async fn send(&self, payload: &[u8]) -> Result<()> {
        let mut writer = self.create_writer();
        io::Write::write_all(&mut writer, payload)?;
        writer.finish().await
    }

    pub(crate) fn force_close(&self) {
        debug!(connection = %self.id, "force-closing connection");
        self.connected.store(false, Ordering::SeqCst);
        self.shutdown.cancel();
    }

    pub(crate) fn mark_disconnected(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }

    pub(crate) fn shutdown_token(&self) -> &CancellationToken {
        &self.shutdown
    }

    pub(crate) fn writer_half(&self) -> &Mutex<OwnedWriteHalf> {
        &self.writer
    }

    /// End-of-life: mark disconnected and send FIN on the write half.
    pub(crate) async fn shutdown_writer(&self) {
        self.connected.store(false, Ordering::SeqCst);
        let mut writer = self.writer.lock().await;
        let _ = writer.shutdown().await;
    }
}

/// Scoped writer for one outbound frame.
///
/// Buffers payload bytes through `std::io::Write`; nothing reaches the
/// socket until [`finish`](FrameWriter::finish) applies the length-prefix
/// encoder and writes the wire bytes under the connection's write lock.
pub struct FrameWriter<'a, P: ServerProtocol> {
    handler: &'a ConnectionHandler<P>,
    buf: BytesMut,
}

impl<P: ServerProtocol> FrameWriter<'_, P> {
    /// Bytes buffered so far.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Encode the buffered payload and write it to the connection.
    ///
    /// Finalizing an empty buffer is a usage error and writes nothing. An
    /// I/O failure is reported to the server-level error observer, since
    /// at this point the failure may not be attributable to the read
    /// loop's connection state, and is also returned to the caller.
    pub async fn finish(self) -> Result<()> {
        if self.buf.is_empty() {
            return Err(ProtocolError::EmptyPayload);
        }
        if !self.handler.is_connected() {
            return Err(ProtocolError::ConnectionClosed);
        }

        let mut codec = FrameCodec::new(self.handler.max_frame_size);
        let frame = Frame {
            payload: self.buf.freeze(),
        };
        let mut wire = BytesMut::with_capacity(Frame::prefix_len(frame.len()) + frame.len());
        tokio_util::codec::Encoder::encode(&mut codec, frame, &mut wire)?;

        let mut writer = self.handler.writer.lock().await;
        let io_result = match writer.write_all(&wire).await {
            Ok(()) => writer.flush().await,
            Err(e) => Err(e),
        };
        drop(writer);

        match io_result {
            Ok(()) => Ok(()),
            Err(e) => {
                let err = ProtocolError::Io(e);
                self.handler.mark_disconnected();
                self.handler.protocol.on_error(&err);
                Err(err)
            }
        }
    }
}

impl<P: ServerProtocol> io::Write for FrameWriter<'_, P> {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
