//! # netframe
//!
//! Length-prefixed TCP framing and connection lifecycle core.
//!
//! The crate owns the two pieces of a framed TCP server that are easy to
//! get subtly wrong: the variable-length framing codec (a three-tier
//! length prefix that must stay bit-exact between encoder and decoder)
//! and the connection lifecycle state machine (handshake, decode loop,
//! registry bookkeeping, concurrent shutdown). What the frames *mean* is
//! the application's business, supplied through the [`ServerProtocol`]
//! trait.
//!
//! ## Quick tour
//! - [`core`]: [`Frame`] and the [`FrameCodec`] wire format
//! - [`protocol`]: the [`ServerProtocol`] trait and the
//!   address-verification handshake
//! - [`service`]: [`Server`], [`ConnectionHandler`], the client registry
//! - [`config`]: tunables for the connection cap, frame-size cap, and handshake
//!   deadline
//!
//! ## Minimal server
//! ```no_run
//! use netframe::{Frame, Result, Server, ServerConfig, ServerProtocol};
//! use netframe::service::ConnectionHandler;
//! use std::sync::Arc;
//!
//! struct Echo;
//!
//! impl ServerProtocol for Echo {
//!     type State = ();
//!
//!     fn create_state(&self) {}
//!
//!     async fn process(&self, frame: Frame, handler: &Arc<ConnectionHandler<Self>>) -> Result<()> {
//!         handler.send(&frame.payload).await
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let server = Server::new(Echo, ServerConfig::default());
//!     server.start(9000).await?;
//!     // ... run until shutdown ...
//!     server.stop().await
//! }
//! ```

pub mod config;
pub mod core;
pub mod error;
pub mod protocol;
pub mod service;
pub mod utils;

pub use config::ServerConfig;
pub use core::codec::FrameCodec;
pub use core::frame::Frame;
pub use error::{ProtocolError, Result};
pub use protocol::ServerProtocol;
pub use service::{ConnectionHandler, Server};
