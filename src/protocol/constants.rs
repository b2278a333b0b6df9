//! RTMP handshake constants
//!
//! Packet sizes and key material are fixed by the protocol.

/// RTMP protocol version carried in C0/S0
pub const RTMP_VERSION: u8 = 3;

/// Default RTMP port
pub const DEFAULT_PORT: u16 = 1935;

/// Size of C1, C2, S1 and S2
pub const HANDSHAKE_SIZE: usize = 1536;

/// C0 + C1
pub const C0C1_SIZE: usize = 1 + HANDSHAKE_SIZE;

/// S0 + S1 + S2
pub const S0S1S2_SIZE: usize = 1 + HANDSHAKE_SIZE * 2;

/// C2
pub const C2_SIZE: usize = HANDSHAKE_SIZE;

/// HMAC-SHA256 output length, also the digest window width
pub const DIGEST_SIZE: usize = 32;

/// Modulus applied to the offset accumulator when locating a digest
pub const DIGEST_OFFSET_MODULO: usize = 728;

/// Digest search base for the key-first C1 layout
pub const CLIENT_DIGEST_BASE_KEY_FIRST: usize = 764 + 8;

/// Digest search base for the digest-first C1 layout
pub const CLIENT_DIGEST_BASE_DIGEST_FIRST: usize = 8;

/// Scheme base the server uses for the S1 digest window
pub const S1_DIGEST_BASE: usize = 8;

/// Version marker the server puts in S1 bytes 4-7 for complex handshakes
pub const SERVER_VERSION: [u8; 4] = [0x0D, 0x0E, 0x0A, 0x0D];

/// Length of the "Genuine Adobe Flash Player 001" prefix
pub const CLIENT_PARTIAL_KEY_LEN: usize = 30;

/// Length of the "Genuine Adobe Flash Media Server 001" prefix
pub const SERVER_PARTIAL_KEY_LEN: usize = 36;

/// Length of the full server key
pub const SERVER_FULL_KEY_LEN: usize = 68;

/// Client key: 30 ASCII bytes followed by 32 constant bytes
pub const CLIENT_KEY: [u8; 62] = [
    b'G', b'e', b'n', b'u', b'i', b'n', b'e', b' ', b'A', b'd', b'o', b'b', b'e', b' ', b'F',
    b'l', b'a', b's', b'h', b' ', b'P', b'l', b'a', b'y', b'e', b'r', b' ', b'0', b'0', b'1',
    0xF0, 0xEE, 0xC2, 0x4A, 0x80, 0x68, 0xBE, 0xE8, 0x2E, 0x00, 0xD0, 0xD1, 0x02, 0x9E, 0x7E,
    0x57, 0x6E, 0xEC, 0x5D, 0x2D, 0x29, 0x80, 0x6F, 0xAB, 0x93, 0xB8, 0xE6, 0x36, 0xCF, 0xEB,
    0x31, 0xAE,
];

/// Server key: 36 ASCII bytes followed by 32 constant bytes
pub const SERVER_KEY: [u8; 68] = [
    b'G', b'e', b'n', b'u', b'i', b'n', b'e', b' ', b'A', b'd', b'o', b'b', b'e', b' ', b'F',
    b'l', b'a', b's', b'h', b' ', b'M', b'e', b'd', b'i', b'a', b' ', b'S', b'e', b'r', b'v',
    b'e', b'r', b' ', b'0', b'0', b'1', 0xF0, 0xEE, 0xC2, 0x4A, 0x80, 0x68, 0xBE, 0xE8, 0x2E,
    0x00, 0xD0, 0xD1, 0x02, 0x9E, 0x7E, 0x57, 0x6E, 0xEC, 0x5D, 0x2D, 0x29, 0x80, 0x6F, 0xAB,
    0x93, 0xB8, 0xE6, 0x36, 0xCF, 0xEB, 0x31, 0xAE,
];
