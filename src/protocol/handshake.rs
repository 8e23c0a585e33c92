//! Address-verification handshake.
//!
//! Run once per connection before any framed message is processed: the
//! server writes 8 pseudo-random bytes and expects the peer to echo them
//! back verbatim. This is a deliberately weak heuristic: it proves only that
//! something at the claimed address can receive and return bytes over the
//! established connection, defeating trivial source-address spoofing where
//! the attacker never sees the challenge. It is not authentication.
//!
//! The byte source is deliberately not security-grade; challenges gate
//! nothing beyond the echo itself.

use rand::rngs::SmallRng;
use rand::{RngCore, SeedableRng};
use std::io;
use std::sync::Mutex;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::trace;

use crate::error::Result;

/// Challenge size in bytes.
pub const CHALLENGE_LEN: usize = 8;

/// Shared pseudo-random challenge source.
///
/// One source serves every connection's handshake; generation is
/// serialized behind a mutex so concurrent handshakes can draw from it.
#[derive(Debug)]
pub struct ChallengeSource {
    rng: Mutex<SmallRng>,
}

impl ChallengeSource {
    pub fn new() -> Self {
        Self {
            rng: Mutex::new(SmallRng::from_os_rng()),
        }
    }

    /// Source with a fixed seed, for reproducible tests.
    pub fn from_seed(seed: u64) -> Self {
        Self {
            rng: Mutex::new(SmallRng::seed_from_u64(seed)),
        }
    }

    /// Draw the next challenge.
    pub fn next_challenge(&self) -> [u8; CHALLENGE_LEN] {
        let mut challenge = [0u8; CHALLENGE_LEN];
        let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
        rng.fill_bytes(&mut challenge);
        challenge
    }
}

impl Default for ChallengeSource {
    fn default() -> Self {
        Self::new()
    }
}

/// Run the challenge-echo exchange over an established connection.
///
/// Writes the challenge, reads exactly [`CHALLENGE_LEN`] bytes back and
/// compares. Returns `Ok(false)` on a mismatch or when the peer closes the
/// stream before echoing; both are the same silent rejection from the
/// caller's point of view. Other I/O failures propagate.
pub async fn verify_peer<R, W>(
    reader: &mut R,
    writer: &mut W,
    challenge: &[u8; CHALLENGE_LEN],
) -> Result<bool>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    writer.write_all(challenge).await?;
    writer.flush().await?;

    let mut echoed = [0u8; CHALLENGE_LEN];
    match reader.read_exact(&mut echoed).await {
        Ok(_) => {}
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
            trace!("peer closed before echoing challenge");
            return Ok(false);
        }
        Err(e) => return Err(e.into()),
    }

    Ok(&echoed == challenge)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn challenges_vary() {
        let source = ChallengeSource::new();
        let a = source.next_challenge();
        let b = source.next_challenge();
        let c = source.next_challenge();
        assert!(a != b || b != c);
    }

    #[test]
    fn seeded_source_is_reproducible() {
        let first = ChallengeSource::from_seed(42).next_challenge();
        let second = ChallengeSource::from_seed(42).next_challenge();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn exact_echo_verifies() {
        let (mut server_side, mut peer_side) = tokio::io::duplex(64);
        let challenge = *b"\x01\x02\x03\x04\x05\x06\x07\x08";

        let peer = tokio::spawn(async move {
            let mut buf = [0u8; CHALLENGE_LEN];
            peer_side.read_exact(&mut buf).await.unwrap();
            peer_side.write_all(&buf).await.unwrap();
        });

        let (mut read, mut write) = tokio::io::split(&mut server_side);
        let verified = verify_peer(&mut read, &mut write, &challenge).await.unwrap();
        assert!(verified);
        peer.await.unwrap();
    }

    #[tokio::test]
    async fn single_flipped_byte_rejects() {
        let (mut server_side, mut peer_side) = tokio::io::duplex(64);
        let challenge = *b"\x01\x02\x03\x04\x05\x06\x07\x08";

        let peer = tokio::spawn(async move {
            let mut buf = [0u8; CHALLENGE_LEN];
            peer_side.read_exact(&mut buf).await.unwrap();
            buf[3] ^= 0xFF;
            peer_side.write_all(&buf).await.unwrap();
        });

        let (mut read, mut write) = tokio::io::split(&mut server_side);
        let verified = verify_peer(&mut read, &mut write, &challenge).await.unwrap();
        assert!(!verified);
        peer.await.unwrap();
    }

    #[tokio::test]
    async fn peer_hangup_counts_as_rejection() {
        let (mut server_side, mut peer_side) = tokio::io::duplex(64);
        let challenge = *b"\x01\x02\x03\x04\x05\x06\x07\x08";

        let peer = tokio::spawn(async move {
            let mut buf = [0u8; CHALLENGE_LEN];
            peer_side.read_exact(&mut buf).await.unwrap();
            // hang up without echoing
        });

        let (mut read, mut write) = tokio::io::split(&mut server_side);
        let verified = verify_peer(&mut read, &mut write, &challenge).await.unwrap();
        assert!(!verified);
        peer.await.unwrap();
    }
}
