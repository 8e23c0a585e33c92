//! One length-prefixed unit of the wire protocol.
//!
//! A `Frame` carries an opaque, non-empty payload. What the bytes mean is
//! entirely the application's business; the frame layer only guarantees the
//! payload arrives as one unit, exactly as sent.

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{ProtocolError, Result};

/// Largest payload length encodable with a single prefix byte.
pub const MAX_SINGLE_BYTE: usize = 254;

/// Largest payload length encodable with the 2-byte extension.
pub const MAX_DOUBLE_BYTE: usize = 65536;

/// First prefix byte announcing a 2-byte length extension.
pub const MARKER_U16: u8 = 254;

/// First prefix byte announcing a 4-byte length extension.
pub const MARKER_U32: u8 = 255;

/// One decoded or to-be-encoded frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub payload: Bytes,
}

impl Frame {
    /// Build a frame from a payload, rejecting empty payloads.
    pub fn new(payload: impl Into<Bytes>) -> Result<Self> {
        let payload = payload.into();
        if payload.is_empty() {
            return Err(ProtocolError::EmptyPayload);
        }
        Ok(Self { payload })
    }

    /// Payload length in bytes.
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    /// Number of prefix bytes (tier marker included) the payload length
    /// selects on the wire.
    pub fn prefix_len(payload_len: usize) -> usize {
        if payload_len <= MAX_SINGLE_BYTE {
            1
        } else if payload_len <= MAX_DOUBLE_BYTE {
            3
        } else {
            5
        }
    }

    /// Write the wire prefix for `payload_len` into `dst`.
    ///
    /// The caller is responsible for having rejected zero-length payloads;
    /// the tier split below is the fixed wire contract, including the
    /// 4-byte tier carrying the length itself rather than length minus one.
    pub(crate) fn put_prefix(payload_len: usize, dst: &mut BytesMut) {
        if payload_len <= MAX_SINGLE_BYTE {
            dst.put_u8((payload_len - 1) as u8);
        } else if payload_len <= MAX_DOUBLE_BYTE {
            dst.put_u8(MARKER_U16);
            dst.put_u16_le((payload_len - 1) as u16);
        } else {
            dst.put_u8(MARKER_U32);
            dst.put_u32_le(payload_len as u32);
        }
    }

    /// Serialize prefix plus payload into a standalone byte vector.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = BytesMut::with_capacity(Self::prefix_len(self.len()) + self.len());
        Self::put_prefix(self.len(), &mut buf);
        buf.extend_from_slice(&self.payload);
        buf.to_vec()
    }
}

impl AsRef<[u8]> for Frame {
    fn as_ref(&self) -> &[u8] {
        &self.payload
    }
}
