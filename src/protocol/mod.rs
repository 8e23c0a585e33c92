//! # Protocol Components
//!
//! The application-facing protocol surface and the connection-start
//! handshake.
//!
//! ## Components
//! - **Dispatcher**: the [`ServerProtocol`] trait a server is constructed
//!   with: admission, per-connection state, lifecycle observers, and the
//!   message processor
//! - **Handshake**: the one-shot address-verification exchange run before
//!   any frame is processed

pub mod dispatcher;
pub mod handshake;

pub use dispatcher::ServerProtocol;
