//! Complex handshake digests
//!
//! The complex handshake hides a 32-byte HMAC-SHA256 digest inside C1, S1 and
//! S2. The digest authenticates the whole 1536-byte packet except its own
//! 32-byte window, so it is computed over the bytes left of the window
//! followed by the bytes right of it.
//!
//! ```text
//!  0            offset        offset+32                 1536
//!  |--- left ------|== digest ==|--------- right ---------|
//!        MAC input:  left || right
//! ```
//!
//! The window position is derived from the packet itself: four bytes at a
//! scheme-specific base are summed, reduced modulo 728 and shifted past the
//! base.

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::{HandshakeError, Result};
use crate::protocol::constants::*;

type HmacSha256 = Hmac<Sha256>;

fn new_mac(key: &[u8]) -> HmacSha256 {
    HmacSha256::new_from_slice(key).expect("HMAC accepts any key length")
}

/// HMAC-SHA256 of `buf` with `buf[offset..offset + 32]` left out of the input
///
/// The left part is fed before the right part. A window running past the end
/// of the buffer simply contributes no right part.
pub fn make_digest_without_window(
    buf: &[u8],
    offset: usize,
    key: &[u8],
    out: &mut [u8; DIGEST_SIZE],
) {
    let mut mac = new_mac(key);

    let left = &buf[..offset.min(buf.len())];
    if !left.is_empty() {
        mac.update(left);
    }
    if let Some(right) = buf.get(offset + DIGEST_SIZE..) {
        if !right.is_empty() {
            mac.update(right);
        }
    }

    out.copy_from_slice(&mac.finalize().into_bytes());
}

/// Plain HMAC-SHA256 of `data`
pub fn make_digest(data: &[u8], key: &[u8]) -> [u8; DIGEST_SIZE] {
    let mut mac = new_mac(key);
    mac.update(data);

    let mut out = [0u8; DIGEST_SIZE];
    out.copy_from_slice(&mac.finalize().into_bytes());
    out
}

/// Position of the digest window for a given scheme base
///
/// Returns `None` if the four accumulator bytes or the window itself would
/// fall outside `buf`.
pub fn digest_offset(buf: &[u8], base: usize) -> Option<usize> {
    let acc = buf.get(base..base + 4)?;
    let sum: usize = acc.iter().map(|&b| b as usize).sum();
    let offset = sum % DIGEST_OFFSET_MODULO + base + 4;

    if offset + DIGEST_SIZE > buf.len() {
        return None;
    }
    Some(offset)
}

/// Locate and validate a digest in a 1536-byte C1/S1 packet
///
/// Returns the window offset if the 32 bytes stored there match the digest
/// recomputed with `key`.
pub fn find_digest(packet: &[u8], base: usize, key: &[u8]) -> Option<usize> {
    let offset = digest_offset(packet, base)?;

    let mut expected = [0u8; DIGEST_SIZE];
    make_digest_without_window(packet, offset, key, &mut expected);

    if packet[offset..offset + DIGEST_SIZE] == expected {
        Some(offset)
    } else {
        None
    }
}

/// Compute the digest for the window at `offset` and write it in place
///
/// Returns false, leaving `packet` untouched, if the window does not fit.
pub fn embed_digest(packet: &mut [u8], offset: usize, key: &[u8]) -> bool {
    let end = match offset.checked_add(DIGEST_SIZE) {
        Some(end) if end <= packet.len() => end,
        _ => return false,
    };

    let mut digest = [0u8; DIGEST_SIZE];
    make_digest_without_window(packet, offset, key, &mut digest);
    packet[offset..end].copy_from_slice(&digest);
    true
}

/// Parse the client challenge carried in C0C1
///
/// Returns `Ok(None)` for a simple handshake, `Ok(Some(key))` with the S2
/// response key when a client digest validates. An unrecognized digest
/// layout falls back to simple mode; only a bad version byte is an error.
pub fn parse_challenge(c0c1: &[u8; C0C1_SIZE]) -> Result<Option<[u8; DIGEST_SIZE]>> {
    if c0c1[0] != RTMP_VERSION {
        return Err(HandshakeError::InvalidVersion(c0c1[0]).into());
    }

    let version = u32::from_be_bytes([c0c1[5], c0c1[6], c0c1[7], c0c1[8]]);
    if version == 0 {
        tracing::debug!("Handshake simple mode");
        return Ok(None);
    }

    let c1 = &c0c1[1..];
    let client_key = &CLIENT_KEY[..CLIENT_PARTIAL_KEY_LEN];
    let offset = find_digest(c1, CLIENT_DIGEST_BASE_KEY_FIRST, client_key)
        .or_else(|| find_digest(c1, CLIENT_DIGEST_BASE_DIGEST_FIRST, client_key));

    let Some(offset) = offset else {
        tracing::warn!(
            client_version = version,
            "Client digest not found, falling back to simple handshake"
        );
        return Ok(None);
    };

    tracing::debug!(digest_offset = offset, "Handshake complex mode");
    let client_digest = &c1[offset..offset + DIGEST_SIZE];
    Ok(Some(make_digest(
        client_digest,
        &SERVER_KEY[..SERVER_FULL_KEY_LEN],
    )))
}
