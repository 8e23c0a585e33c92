//! # Core Framing Components
//!
//! Low-level frame handling and the length-prefix codec.
//!
//! This module provides the foundation for the protocol, handling frame
//! framing, encoding/decoding, and the wire format.
//!
//! ## Components
//! - **Frame**: one non-empty payload delivered or sent as a unit
//! - **Codec**: Tokio codec for framing over byte streams
//!
//! ## Wire Format
//! ```text
//! L in [1, 254]      [L-1] [Payload(L)]
//! L in [255, 65536]  [254] [u16 LE of L-1] [Payload(L)]
//! L  >  65536        [255] [u32 LE of L]   [Payload(L)]
//! ```
//!
//! ## Security
//! - Claimed lengths are validated against the configured maximum before
//!   any allocation
//! - Zero-length frames are rejected on both paths

pub mod codec;
pub mod frame;
