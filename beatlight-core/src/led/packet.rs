//! Index-addressed RGB update packets (WARLS).
//!
//! ## Wire format
//!
//! ```text
//! byte 0:   0x01            protocol id (WARLS)
//! byte 1:   0x02            index-addressed RGB; WLED also reads this as
//!                           the realtime-mode timeout in seconds
//! repeated: index  u8 (1)
//!           r g b  u8 (3)
//! ```
//!
//! No sequence numbers and no acknowledgement: each datagram stands on
//! its own and a lost one is repaired by the next diff that touches the
//! same pixels.

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::SyncError;
use crate::led::pixel::Rgb;

// ── Constants ────────────────────────────────────────────────────

pub const PROTOCOL_ID: u8 = 0x01;
pub const INDEXED_RGB: u8 = 0x02;
pub const HEADER: [u8; 2] = [PROTOCOL_ID, INDEXED_RGB];
pub const HEADER_LEN: usize = HEADER.len();
/// Bytes per pixel entry: index + r + g + b.
pub const ENTRY_LEN: usize = 4;
/// One-byte index → pixels 0..=255.
pub const MAX_ADDRESSABLE_PIXELS: usize = 256;
pub const DEFAULT_MAX_PIXELS_PER_PACKET: usize = 126;
/// UDP port WLED listens on for realtime data.
pub const DEFAULT_UDP_PORT: u16 = 21324;

// ── UpdatePacket ─────────────────────────────────────────────────

/// One datagram worth of `(index, colour)` entries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdatePacket {
    entries: Vec<(u8, Rgb)>,
}

impl UpdatePacket {
    pub fn with_capacity(n: usize) -> Self {
        Self {
            entries: Vec::with_capacity(n),
        }
    }

    pub fn push(&mut self, index: u8, color: Rgb) {
        self.entries.push((index, color));
    }

    pub fn entries(&self) -> &[(u8, Rgb)] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Size of the encoded datagram.
    pub fn encoded_len(&self) -> usize {
        HEADER_LEN + self.entries.len() * ENTRY_LEN
    }

    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.encoded_len());
        self.encode_into(&mut buf);
        buf.freeze()
    }

    pub fn encode_into(&self, buf: &mut BytesMut) {
        buf.reserve(self.encoded_len());
        buf.put_slice(&HEADER);
        for &(index, c) in &self.entries {
            buf.put_u8(index);
            buf.put_slice(&c.to_bytes());
        }
    }

    /// Parse a datagram back into entries.
    pub fn decode(data: &[u8]) -> Result<Self, SyncError> {
        if data.len() < HEADER_LEN {
            return Err(SyncError::PacketTooShort(data.len()));
        }
        if data[..HEADER_LEN] != HEADER {
            return Err(SyncError::InvalidHeader(data[0], data[1]));
        }
        let body = &data[HEADER_LEN..];
        let trailing = body.len() % ENTRY_LEN;
        if trailing != 0 {
            return Err(SyncError::TruncatedEntry(trailing));
        }
        let entries = body
            .chunks_exact(ENTRY_LEN)
            .map(|e| (e[0], Rgb::new(e[1], e[2], e[3])))
            .collect();
        Ok(Self { entries })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_header_and_entries() {
        let mut p = UpdatePacket::default();
        p.push(0, Rgb::new(1, 2, 3));
        p.push(255, Rgb::new(4, 5, 6));
        let bytes = p.encode();
        assert_eq!(&bytes[..], &[0x01, 0x02, 0, 1, 2, 3, 255, 4, 5, 6]);
        assert_eq!(bytes.len(), p.encoded_len());
        assert_eq!(UpdatePacket::decode(&bytes).unwrap(), p);
    }

    #[test]
    fn decode_rejects_bad_input() {
        assert!(matches!(
            UpdatePacket::decode(&[0x01]),
            Err(SyncError::PacketTooShort(1))
        ));
        assert!(matches!(
            UpdatePacket::decode(&[0x02, 0x02, 0, 0, 0, 0]),
            Err(SyncError::InvalidHeader(0x02, 0x02))
        ));
        assert!(matches!(
            UpdatePacket::decode(&[0x01, 0x02, 7, 1, 2]),
            Err(SyncError::TruncatedEntry(3))
        ));
    }

    #[test]
    fn empty_packet_is_header_only() {
        let p = UpdatePacket::default();
        assert_eq!(&p.encode()[..], &HEADER);
        assert!(UpdatePacket::decode(&HEADER).unwrap().is_empty());
    }
}
