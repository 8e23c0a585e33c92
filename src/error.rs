//! # Error Types
//!
//! Error handling for the framing protocol and server lifecycle.
//!
//! This module defines all error variants that can occur during protocol
//! operations, from low-level I/O failures to lifecycle misuse.
//!
//! ## Error Categories
//! - **I/O Errors**: socket read/write/bind failures
//! - **Framing Errors**: empty or oversized frames
//! - **Lifecycle Errors**: invalid server state transitions
//!
//! Usage errors (`EmptyPayload`, `AlreadyStarted`, `NotRunning`) signal a bug
//! in the calling code and are never swallowed by the crate; everything else
//! is handled by closing the affected connection and continuing to serve.

use std::io;
use thiserror::Error;

/// Primary error type for all protocol and server operations.
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Empty frames are not supported")]
    EmptyPayload,

    #[error("Frame too large: {0} bytes")]
    OversizedFrame(usize),

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Operation timed out")]
    Timeout,

    #[error("Server already started")]
    AlreadyStarted,

    #[error("Server is not running")]
    NotRunning,

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Type alias for Results using ProtocolError
pub type Result<T> = std::result::Result<T, ProtocolError>;
