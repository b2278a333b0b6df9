//! RTMP handshake implementation
//!
//! The RTMP handshake consists of three legs:
//!
//! ```text
//! Client                                   Server
//!   |                                        |
//!   |------- C0 (1 byte: version) --------->|
//!   |------- C1 (1536 bytes: time+random) ->|
//!   |                                        |
//!   |<------ S0 (1 byte: version) ----------|
//!   |<------ S1 (1536 bytes: time+random) --|
//!   |<------ S2 (1536 bytes: echo C1) ------|
//!   |                                        |
//!   |------- C2 (1536 bytes: echo S2) ----->|
//!   |                                        |
//!   |          [Handshake Complete]          |
//! ```
//!
//! The server understands both the simple handshake and the complex one,
//! where C1, S1 and S2 carry HMAC-SHA256 digests (see [`super::digest`]).
//! The client always speaks the simple handshake and sends the received S2
//! back unchanged as C2.
//!
//! Each packet is read in full before it is looked at. A short read is a
//! transport error, never a partially parsed packet.

use std::time::{SystemTime, UNIX_EPOCH};

use bytes::{BufMut, Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{Error, HandshakeError, Result};
use crate::protocol::constants::*;
use crate::protocol::digest::{digest_offset, embed_digest, parse_challenge};

/// Handshake role (client or server)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeRole {
    Client,
    Server,
}

/// Handshake flavour negotiated by the server
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeMode {
    /// No digests
    Simple,
    /// HMAC-SHA256 digests in S1 and S2
    Complex,
}

/// Client side of the handshake
#[derive(Debug)]
pub struct HandshakeClient {
    timestamp: u32,
    /// Received S2, sent back as C2
    c2: Option<Bytes>,
}

impl HandshakeClient {
    /// Create a client stamping C1 with the current time
    pub fn new() -> Self {
        Self::with_timestamp(now_millis())
    }

    /// Create a client stamping C1 with a fixed time
    pub fn with_timestamp(timestamp: u32) -> Self {
        Self {
            timestamp,
            c2: None,
        }
    }

    pub fn role(&self) -> HandshakeRole {
        HandshakeRole::Client
    }

    /// Build C0+C1
    ///
    /// Format (1537 bytes):
    /// - Byte 0: RTMP version
    /// - Bytes 1-4: Timestamp (32-bit, big-endian)
    /// - Bytes 5-8: Zero (simple handshake)
    /// - Bytes 9-1536: Random data
    pub fn c0c1(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(C0C1_SIZE);
        buf.put_u8(RTMP_VERSION);
        buf.put_u32(self.timestamp);
        buf.put_u32(0);

        let mut random = [0u8; HANDSHAKE_SIZE - 8];
        fill_random(&mut random, self.timestamp);
        buf.put_slice(&random);

        buf.freeze()
    }

    /// Consume S0+S1+S2, keeping S2 as our C2
    pub fn process_s0s1s2(&mut self, s0s1s2: &[u8; S0S1S2_SIZE]) -> Result<()> {
        if s0s1s2[0] != RTMP_VERSION {
            return Err(HandshakeError::InvalidVersion(s0s1s2[0]).into());
        }

        self.c2 = Some(Bytes::copy_from_slice(&s0s1s2[1 + HANDSHAKE_SIZE..]));
        Ok(())
    }

    /// C2 to send, available once S0S1S2 has been consumed
    pub fn c2(&self) -> Result<Bytes> {
        self.c2
            .clone()
            .ok_or_else(|| HandshakeError::InvalidState("C2 before S0S1S2").into())
    }

    pub async fn write_c0c1<W>(&self, writer: &mut W) -> Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        write_packet(writer, &self.c0c1()).await?;
        tracing::debug!(timestamp = self.timestamp, "Handshake C0+C1 sent");
        Ok(())
    }

    pub async fn read_s0s1s2<R>(&mut self, reader: &mut R) -> Result<()>
    where
        R: AsyncRead + Unpin,
    {
        let mut s0s1s2 = [0u8; S0S1S2_SIZE];
        read_packet(reader, &mut s0s1s2).await?;
        tracing::debug!("Handshake S0+S1+S2 received");
        self.process_s0s1s2(&s0s1s2)
    }

    pub async fn write_c2<W>(&self, writer: &mut W) -> Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        write_packet(writer, &self.c2()?).await?;
        tracing::debug!("Handshake C2 sent");
        Ok(())
    }
}

impl Default for HandshakeClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Server side of the handshake
#[derive(Debug, Default)]
pub struct HandshakeServer {
    mode: Option<HandshakeMode>,
    s0s1s2: Option<Bytes>,
    done: bool,
}

impl HandshakeServer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn role(&self) -> HandshakeRole {
        HandshakeRole::Server
    }

    /// Mode chosen while parsing C0C1
    pub fn mode(&self) -> Option<HandshakeMode> {
        self.mode
    }

    /// Check if C2 has been received
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Consume C0+C1 and prepare S0+S1+S2
    pub fn process_c0c1(&mut self, c0c1: &[u8; C0C1_SIZE]) -> Result<()> {
        self.process_c0c1_at(c0c1, now_millis())
    }

    fn process_c0c1_at(&mut self, c0c1: &[u8; C0C1_SIZE], now: u32) -> Result<()> {
        let response_key = parse_challenge(c0c1)?;
        let mode = if response_key.is_some() {
            HandshakeMode::Complex
        } else {
            HandshakeMode::Simple
        };
        let c1_time = u32::from_be_bytes([c0c1[1], c0c1[2], c0c1[3], c0c1[4]]);

        let mut buf = BytesMut::with_capacity(S0S1S2_SIZE);
        let mut random = [0u8; HANDSHAKE_SIZE - 8];

        // S0: Version
        buf.put_u8(RTMP_VERSION);

        // S1: Time + zero or version marker + random
        buf.put_u32(now);
        match mode {
            HandshakeMode::Simple => buf.put_u32(0),
            HandshakeMode::Complex => buf.put_slice(&SERVER_VERSION),
        }
        fill_random(&mut random, now);
        buf.put_slice(&random);

        // S2: Echo C1 time + our time + random
        buf.put_u32(c1_time);
        buf.put_u32(now);
        fill_random(&mut random, now ^ c1_time);
        buf.put_slice(&random);

        if let Some(key) = response_key {
            let s1 = &mut buf[1..1 + HANDSHAKE_SIZE];
            let offset = digest_offset(s1, S1_DIGEST_BASE)
                .ok_or(HandshakeError::InvalidState("S1 digest offset"))?;
            if !embed_digest(s1, offset, &SERVER_KEY[..SERVER_PARTIAL_KEY_LEN]) {
                return Err(HandshakeError::InvalidState("S1 digest window").into());
            }

            let s2 = &mut buf[1 + HANDSHAKE_SIZE..];
            if !embed_digest(s2, HANDSHAKE_SIZE - DIGEST_SIZE, &key) {
                return Err(HandshakeError::InvalidState("S2 digest window").into());
            }
        }

        self.mode = Some(mode);
        self.s0s1s2 = Some(buf.freeze());
        Ok(())
    }

    /// S0+S1+S2 built by [`Self::process_c0c1`]
    pub fn s0s1s2(&self) -> Result<Bytes> {
        self.s0s1s2
            .clone()
            .ok_or_else(|| HandshakeError::InvalidState("S0S1S2 before C0C1").into())
    }

    /// Consume C2
    ///
    /// C2 is not validated; receiving all 1536 bytes completes the handshake.
    pub fn process_c2(&mut self, _c2: &[u8; C2_SIZE]) -> Result<()> {
        if self.s0s1s2.is_none() {
            return Err(HandshakeError::InvalidState("C2 before C0C1").into());
        }
        self.done = true;
        Ok(())
    }

    pub async fn read_c0c1<R>(&mut self, reader: &mut R) -> Result<()>
    where
        R: AsyncRead + Unpin,
    {
        let mut c0c1 = [0u8; C0C1_SIZE];
        read_packet(reader, &mut c0c1).await?;
        tracing::debug!("Handshake C0+C1 received");
        self.process_c0c1(&c0c1)
    }

    pub async fn write_s0s1s2<W>(&self, writer: &mut W) -> Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        write_packet(writer, &self.s0s1s2()?).await?;
        tracing::debug!(mode = ?self.mode, "Handshake S0+S1+S2 sent");
        Ok(())
    }

    pub async fn read_c2<R>(&mut self, reader: &mut R) -> Result<()>
    where
        R: AsyncRead + Unpin,
    {
        let mut c2 = [0u8; C2_SIZE];
        read_packet(reader, &mut c2).await?;
        tracing::debug!("Handshake C2 received");
        self.process_c2(&c2)
    }
}

/// Run the server side of the handshake over `io`
pub async fn server_handshake<S>(io: &mut S) -> Result<HandshakeMode>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut handshake = HandshakeServer::new();
    handshake.read_c0c1(io).await?;
    handshake.write_s0s1s2(io).await?;
    handshake.read_c2(io).await?;

    handshake
        .mode()
        .ok_or_else(|| HandshakeError::InvalidState("handshake mode").into())
}

/// Run the client side of the handshake over `io`
pub async fn client_handshake<S>(io: &mut S) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut handshake = HandshakeClient::new();
    handshake.write_c0c1(io).await?;
    handshake.read_s0s1s2(io).await?;
    handshake.write_c2(io).await
}

async fn read_packet<R>(reader: &mut R, buf: &mut [u8]) -> Result<()>
where
    R: AsyncRead + Unpin,
{
    match reader.read_exact(buf).await {
        Ok(_) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Err(Error::ConnectionClosed),
        Err(e) => Err(e.into()),
    }
}

async fn write_packet<W>(writer: &mut W, packet: &[u8]) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(packet).await?;
    writer.flush().await?;
    Ok(())
}

/// Milliseconds since the epoch, truncated to 32 bits
fn now_millis() -> u32 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u32)
        .unwrap_or(0)
}

/// Fill the random part of a packet
///
/// Simple PRNG seeded with the timestamp. Not cryptographically secure, the
/// handshake doesn't require it.
fn fill_random(out: &mut [u8], seed: u32) {
    let mut state = seed as u64;
    for chunk in out.chunks_mut(8) {
        state = state.wrapping_mul(6364136223846793005).wrapping_add(1);
        let bytes = state.to_le_bytes();
        let len = chunk.len().min(8);
        chunk[..len].copy_from_slice(&bytes[..len]);
    }
}
