//! Tokio codec for the three-tier length prefix.
//!
//! Stateless apart from the configured size cap: tier selection on decode
//! depends solely on the first prefix byte, and the encoder always emits
//! the canonical tier for a given payload length. Claimed lengths are
//! checked against the cap before any payload allocation.

use bytes::{Buf, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::config::MAX_FRAME_SIZE;
use crate::core::frame::{Frame, MARKER_U16, MARKER_U32};
use crate::error::ProtocolError;

/// Encoder/decoder for length-prefixed frames.
#[derive(Debug, Clone)]
pub struct FrameCodec {
    max_frame_size: usize,
}

impl FrameCodec {
    pub fn new(max_frame_size: usize) -> Self {
        Self { max_frame_size }
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new(MAX_FRAME_SIZE)
    }
}

impl Decoder for FrameCodec {
    type Item = Frame;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Frame>, ProtocolError> {
        if src.is_empty() {
            return Ok(None);
        }

        let (prefix_len, payload_len) = match src[0] {
            MARKER_U16 => {
                if src.len() < 3 {
                    return Ok(None);
                }
                let ext = u16::from_le_bytes([src[1], src[2]]) as usize;
                (3, ext + 1)
            }
            MARKER_U32 => {
                if src.len() < 5 {
                    return Ok(None);
                }
                let ext = u32::from_le_bytes([src[1], src[2], src[3], src[4]]) as usize;
                // The 4-byte tier carries the length itself; zero would
                // denote an empty frame, which the protocol forbids.
                if ext == 0 {
                    return Err(ProtocolError::EmptyPayload);
                }
                (5, ext)
            }
            direct => (1, direct as usize + 1),
        };

        if payload_len > self.max_frame_size {
            return Err(ProtocolError::OversizedFrame(payload_len));
        }

        if src.len() < prefix_len + payload_len {
            src.reserve(prefix_len + payload_len - src.len());
            return Ok(None);
        }

        src.advance(prefix_len);
        let payload = src.split_to(payload_len).freeze();
        Ok(Some(Frame { payload }))
    }
}

impl Encoder<Frame> for FrameCodec {
    type Error = ProtocolError;

    fn encode(&mut self, frame: Frame, dst: &mut BytesMut) -> Result<(), ProtocolError> {
        let len = frame.len();
        if len == 0 {
            return Err(ProtocolError::EmptyPayload);
        }
        if len > self.max_frame_size {
            return Err(ProtocolError::OversizedFrame(len));
        }

        dst.reserve(Frame::prefix_len(len) + len);
        Frame::put_prefix(len, dst);
        dst.extend_from_slice(&frame.payload);
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn roundtrip(len: usize) {
        let payload: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();
        let mut codec = FrameCodec::default();
        let mut buf = BytesMut::new();
        codec
            .encode(Frame::new(payload.clone()).unwrap(), &mut buf)
            .unwrap();
        assert_eq!(buf.len(), Frame::prefix_len(len) + len);

        let decoded = codec.decode(&mut buf).unwrap().expect("complete frame");
        assert_eq!(&decoded.payload[..], &payload[..]);
        assert!(buf.is_empty(), "decoder must consume exactly one frame");
    }

    #[test]
    fn roundtrip_all_tiers() {
        for len in [1, 2, 254, 255, 256, 65536, 65537, 100_000] {
            roundtrip(len);
        }
    }

    #[test]
    fn partial_prefix_preserves_buffer() {
        let mut codec = FrameCodec::default();

        let mut buf = BytesMut::from(&[MARKER_U16, 0x10][..]);
        assert!(codec.decode(&mut buf).unwrap().is_none());
        assert_eq!(buf.len(), 2);

        let mut buf = BytesMut::from(&[MARKER_U32, 0, 0, 1][..]);
        assert!(codec.decode(&mut buf).unwrap().is_none());
        assert_eq!(buf.len(), 4);
    }

    #[test]
    fn partial_payload_preserves_buffer() {
        let mut codec = FrameCodec::default();
        let mut buf = BytesMut::from(&[4u8, 1, 2, 3][..]); // prefix says 5 bytes
        assert!(codec.decode(&mut buf).unwrap().is_none());
        assert_eq!(buf.len(), 4);
    }

    #[test]
    fn incremental_fill_decodes_exactly_at_completion() {
        let payload = vec![7u8; 300];
        let wire = Frame::new(payload.clone()).unwrap().to_bytes();

        let mut codec = FrameCodec::default();
        let mut buf = BytesMut::new();
        for (i, byte) in wire.iter().enumerate() {
            buf.extend_from_slice(&[*byte]);
            let result = codec.decode(&mut buf).unwrap();
            if i < wire.len() - 1 {
                assert!(result.is_none());
            } else {
                assert_eq!(result.unwrap().payload, payload);
                assert!(buf.is_empty());
            }
        }
    }

    #[test]
    fn multiple_frames_in_one_buffer() {
        let mut codec = FrameCodec::default();
        let mut buf = BytesMut::new();
        codec
            .encode(Frame::new(vec![1, 2, 3]).unwrap(), &mut buf)
            .unwrap();
        codec
            .encode(Frame::new(vec![4; 300]).unwrap(), &mut buf)
            .unwrap();

        let first = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(&first.payload[..], &[1, 2, 3]);
        let second = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(second.payload.len(), 300);
        assert!(buf.is_empty());
    }

    #[test]
    fn encode_rejects_empty_and_writes_nothing() {
        let mut codec = FrameCodec::default();
        let mut buf = BytesMut::new();
        let frame = Frame {
            payload: bytes::Bytes::new(),
        };
        assert!(matches!(
            codec.encode(frame, &mut buf),
            Err(ProtocolError::EmptyPayload)
        ));
        assert!(buf.is_empty());
    }

    #[test]
    fn oversized_claim_rejected_before_allocation() {
        let mut codec = FrameCodec::new(1024);
        // 4-byte tier claiming 1 MiB against a 1 KiB cap.
        let mut buf = BytesMut::from(&[MARKER_U32, 0, 0, 0x10, 0][..]);
        assert!(matches!(
            codec.decode(&mut buf),
            Err(ProtocolError::OversizedFrame(1_048_576))
        ));
    }

    #[test]
    fn zero_quad_extension_rejected() {
        let mut codec = FrameCodec::default();
        let mut buf = BytesMut::from(&[MARKER_U32, 0, 0, 0, 0][..]);
        assert!(matches!(
            codec.decode(&mut buf),
            Err(ProtocolError::EmptyPayload)
        ));
    }

    #[test]
    fn non_canonical_double_byte_encoding_decodes_by_first_byte() {
        // Marker 254 with a small extension is never produced by the
        // encoder but is a valid decoder input: tier selection depends
        // solely on the first byte.
        let mut codec = FrameCodec::default();
        let mut buf = BytesMut::new();
        buf.extend_from_slice(&[MARKER_U16, 2, 0]); // ext = 2 -> payload of 3
        buf.extend_from_slice(&[9, 9, 9]);
        let frame = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(&frame.payload[..], &[9, 9, 9]);
        assert!(buf.is_empty());
    }

    #[test]
    fn tier_boundaries_use_expected_prefix_width() {
        let mut codec = FrameCodec::default();
        for (len, prefix) in [(254, 1), (255, 3), (65536, 3), (65537, 5)] {
            let mut buf = BytesMut::new();
            codec
                .encode(Frame::new(vec![0u8; len]).unwrap(), &mut buf)
                .unwrap();
            assert_eq!(buf.len() - len, prefix, "payload length {len}");
        }
    }
}
