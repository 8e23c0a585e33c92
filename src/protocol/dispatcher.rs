//! The application-facing protocol trait.
//!
//! A [`Server`](crate::service::server::Server) is constructed with one
//! value implementing [`ServerProtocol`]; the trait bundles everything the
//! server core delegates outward:
//!
//! - **admission**: [`should_accept`](ServerProtocol::should_accept) is
//!   consulted once per raw connection, before any state or handler exists
//! - **state factory**: [`create_state`](ServerProtocol::create_state)
//!   builds the opaque per-connection value the application wants carried
//!   alongside the socket
//! - **message processor**: [`process`](ServerProtocol::process) receives
//!   every decoded frame, synchronously on the connection's task, and may
//!   call back into the handler's outbound path while running
//! - **lifecycle observers**: server-level and per-connection callbacks,
//!   all defaulting to no-ops
//!
//! The trait is consumed generically; it is not object-safe and is not
//! meant to be boxed.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use crate::core::frame::Frame;
use crate::error::{ProtocolError, Result};
use crate::service::handler::ConnectionHandler;

pub trait ServerProtocol: Send + Sync + Sized + 'static {
    /// Opaque per-connection application state, created at accept time and
    /// reachable from every callback via
    /// [`ConnectionHandler::state`](crate::service::handler::ConnectionHandler::state).
    type State: Send + Sync + 'static;

    /// Build the state object for a newly admitted connection.
    fn create_state(&self) -> Self::State;

    /// Admission policy, consulted before a handler exists. Rejected
    /// connections are dropped without any further callback.
    fn should_accept(&self, peer: SocketAddr) -> bool {
        let _ = peer;
        true
    }

    /// Handle one decoded frame.
    ///
    /// Runs on the connection's own task; an `Err` closes this connection
    /// (with a diagnostic log) but never affects other connections or the
    /// accept loop.
    fn process(
        &self,
        frame: Frame,
        handler: &Arc<ConnectionHandler<Self>>,
    ) -> impl Future<Output = Result<()>> + Send;

    /// The server has bound its listening endpoint.
    fn on_open(&self) {}

    /// The accept loop or an outbound write failed; `stop()` does not
    /// take this path.
    fn on_error(&self, error: &ProtocolError) {
        let _ = error;
    }

    /// The accept loop has exited, cleanly or not.
    fn on_close(&self) {}

    /// A connection passed address verification and is about to enter its
    /// decode loop.
    fn on_handler_open(&self, handler: &Arc<ConnectionHandler<Self>>) {
        let _ = handler;
    }

    /// A connection's decode loop or handshake hit an I/O failure.
    fn on_handler_error(&self, handler: &Arc<ConnectionHandler<Self>>, error: &ProtocolError) {
        let _ = (handler, error);
    }

    /// A connection terminated, for any reason. Fires exactly once per
    /// connection that had a handler, right before deregistration.
    fn on_handler_close(&self, handler: &Arc<ConnectionHandler<Self>>) {
        let _ = handler;
    }
}
