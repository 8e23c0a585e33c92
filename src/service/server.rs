//! Listening server: lifecycle state machine and accept loop.
//!
//! One background task accepts connections; every admitted connection gets
//! its own task for handshake and decode loop. Shutdown is a cancellation
//! token in the accept `select!` (the async equivalent of closing the
//! listening socket out from under a blocked accept), with a `stopping`
//! flag distinguishing clean shutdown from a real accept failure.

use futures::StreamExt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::net::tcp::OwnedReadHalf;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::codec::FramedRead;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::ServerConfig;
use crate::core::codec::FrameCodec;
use crate::error::{ProtocolError, Result};
use crate::protocol::handshake::{self, ChallengeSource, CHALLENGE_LEN};
use crate::protocol::ServerProtocol;
use crate::service::handler::ConnectionHandler;
use crate::service::registry::ClientRegistry;
use crate::utils::timeout::with_timeout;

enum Lifecycle {
    Idle,
    Running {
        local_addr: SocketAddr,
        shutdown: CancellationToken,
        accept_task: JoinHandle<()>,
    },
    Stopped,
}

/// A framing server bound to one listening endpoint.
///
/// Constructed with an application [`ServerProtocol`]; started with
/// [`start`](Server::start) and torn down with [`stop`](Server::stop).
/// Restarting a stopped server is allowed.
pub struct Server<P: ServerProtocol> {
    protocol: Arc<P>,
    config: ServerConfig,
    registry: Arc<ClientRegistry<P>>,
    challenges: Arc<ChallengeSource>,
    stopping: Arc<AtomicBool>,
    lifecycle: Mutex<Lifecycle>,
}

impl<P: ServerProtocol> Server<P> {
    pub fn new(protocol: P, config: ServerConfig) -> Self {
        Self {
            protocol: Arc::new(protocol),
            config,
            registry: Arc::new(ClientRegistry::new()),
            challenges: Arc::new(ChallengeSource::new()),
            stopping: Arc::new(AtomicBool::new(false)),
            lifecycle: Mutex::new(Lifecycle::Idle),
        }
    }

    /// Bind the listening endpoint and begin accepting in the background.
    ///
    /// Port 0 picks an ephemeral port; the bound address is available from
    /// [`local_addr`](Server::local_addr) afterwards. Starting a running
    /// server fails with [`ProtocolError::AlreadyStarted`]; a bind failure
    /// is returned directly without invoking any observer.
    pub async fn start(&self, port: u16) -> Result<()> {
        let listener = TcpListener::bind(("0.0.0.0", port)).await?;
        let local_addr = listener.local_addr()?;

        // bind -> open observer -> accept loop
        self.protocol.on_open();

        let shutdown = CancellationToken::new();
        {
            let mut lifecycle = self.lock_lifecycle();
            if matches!(*lifecycle, Lifecycle::Running { .. }) {
                return Err(ProtocolError::AlreadyStarted);
            }
            self.stopping.store(false, Ordering::SeqCst);
            let accept_task = tokio::spawn(accept_loop(
                listener,
                self.protocol.clone(),
                self.registry.clone(),
                self.challenges.clone(),
                self.config.clone(),
                self.stopping.clone(),
                shutdown.clone(),
            ));
            *lifecycle = Lifecycle::Running {
                local_addr,
                shutdown,
                accept_task,
            };
        }

        info!(address = %local_addr, "server listening");
        Ok(())
    }

    /// Stop accepting, force-close every live connection, and wait for the
    /// accept loop to finish its sweep.
    pub async fn stop(&self) -> Result<()> {
        let (shutdown, accept_task) = {
            let mut lifecycle = self.lock_lifecycle();
            match std::mem::replace(&mut *lifecycle, Lifecycle::Stopped) {
                Lifecycle::Running {
                    shutdown,
                    accept_task,
                    ..
                } => (shutdown, accept_task),
                other => {
                    *lifecycle = other;
                    return Err(ProtocolError::NotRunning);
                }
            }
        };

        // Flag first, then cancel: the accept loop reads the flag to tell
        // clean shutdown apart from an endpoint failure.
        self.stopping.store(true, Ordering::SeqCst);
        shutdown.cancel();
        if let Err(e) = accept_task.await {
            warn!(error = %e, "accept task did not shut down cleanly");
        }
        Ok(())
    }

    /// Whether the listening endpoint is currently bound and accepting.
    pub fn is_online(&self) -> bool {
        matches!(*self.lock_lifecycle(), Lifecycle::Running { .. })
    }

    /// Bound address, while running.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        match *self.lock_lifecycle() {
            Lifecycle::Running { local_addr, .. } => Some(local_addr),
            _ => None,
        }
    }

    /// Bound port, while running.
    pub fn local_port(&self) -> Option<u16> {
        self.local_addr().map(|addr| addr.port())
    }

    /// Number of currently registered connections.
    pub fn connection_count(&self) -> usize {
        self.registry.len()
    }

    /// The application protocol this server was constructed with.
    pub fn protocol(&self) -> &P {
        &self.protocol
    }

    fn lock_lifecycle(&self) -> std::sync::MutexGuard<'_, Lifecycle> {
        self.lifecycle.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[allow(clippy::too_many_arguments)]
async fn accept_loop<P: ServerProtocol>(
    listener: TcpListener,
    protocol: Arc<P>,
    registry: Arc<ClientRegistry<P>>,
    challenges: Arc<ChallengeSource>,
    config: ServerConfig,
    stopping: Arc<AtomicBool>,
    shutdown: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                debug!("accept loop shutting down");
                break;
            }
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    if registry.len() >= config.max_connections {
                        warn!(peer = %peer, limit = config.max_connections,
                              "connection limit reached, dropping connection");
                        continue;
                    }
                    if !protocol.should_accept(peer) {
                        debug!(peer = %peer, "connection rejected by admission policy");
                        continue;
                    }

                    let state = protocol.create_state();
                    let (read_half, write_half) = stream.into_split();
                    let handler = Arc::new(ConnectionHandler::new(
                        peer,
                        state,
                        protocol.clone(),
                        write_half,
                        config.max_frame_size,
                    ));
                    // Registered before the task starts: registered <=>
                    // task live or about to be.
                    registry.insert(handler.clone());
                    let challenge = challenges.next_challenge();
                    tokio::spawn(run_connection(
                        handler,
                        read_half,
                        protocol.clone(),
                        registry.clone(),
                        challenge,
                        config.clone(),
                    ));
                }
                Err(e) => {
                    if stopping.load(Ordering::SeqCst) || shutdown.is_cancelled() {
                        debug!("listener closed during shutdown");
                    } else {
                        let err = ProtocolError::Io(e);
                        error!(error = %err, "accept failed");
                        protocol.on_error(&err);
                    }
                    break;
                }
            }
        }
    }

    protocol.on_close();
    registry.close_all();
}

async fn run_connection<P: ServerProtocol>(
    handler: Arc<ConnectionHandler<P>>,
    mut read_half: OwnedReadHalf,
    protocol: Arc<P>,
    registry: Arc<ClientRegistry<P>>,
    challenge: [u8; CHALLENGE_LEN],
    config: ServerConfig,
) {
    let verified = {
        let mut writer = handler.writer_half().lock().await;
        let exchange = handshake::verify_peer(&mut read_half, &mut *writer, &challenge);
        tokio::select! {
            _ = handler.shutdown_token().cancelled() => Ok(false),
            result = with_timeout(exchange, config.handshake_timeout) => result,
        }
    };

    match verified {
        Ok(true) => {
            protocol.on_handler_open(&handler);
            decode_loop(&handler, read_half, &protocol, config.max_frame_size).await;
        }
        Ok(false) => {
            // Silent rejection: no observer may distinguish it from any
            // other early close.
            debug!(peer = %handler.peer_addr(), "address verification failed");
        }
        Err(err) => {
            handler.mark_disconnected();
            protocol.on_handler_error(&handler, &err);
        }
    }

    handler.shutdown_writer().await;
    protocol.on_handler_close(&handler);
    registry.remove(handler.id());
}

async fn decode_loop<P: ServerProtocol>(
    handler: &Arc<ConnectionHandler<P>>,
    read_half: OwnedReadHalf,
    protocol: &Arc<P>,
    max_frame_size: usize,
) {
    let mut frames = FramedRead::new(read_half, FrameCodec::new(max_frame_size));
    loop {
        tokio::select! {
            _ = handler.shutdown_token().cancelled() => break,
            next = frames.next() => match next {
                // Clean end-of-stream before a prefix byte.
                None => break,
                Some(Ok(frame)) => {
                    if let Err(err) = protocol.process(frame, handler).await {
                        // Processor failures close this connection only;
                        // the task still exits through the normal cleanup
                        // path below.
                        error!(connection = %handler.id(), error = %err,
                               "message processor failed, closing connection");
                        break;
                    }
                }
                Some(Err(err)) => {
                    handler.mark_disconnected();
                    protocol.on_handler_error(handler, &err);
                    break;
                }
            }
        }
    }
}
