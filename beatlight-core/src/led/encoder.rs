//! Pixel-level delta encoding.
//!
//! Compares the current buffer with the last one actually sent and emits
//! only the pixels that differ, chunked into [`UpdatePacket`]s of at most
//! `max_pixels_per_packet` entries. Order is preserved: packets, and the
//! entries inside them, ascend by pixel index.

use crate::error::SyncError;
use crate::led::packet::{MAX_ADDRESSABLE_PIXELS, UpdatePacket};
use crate::led::pixel::PixelBuffer;

/// Stateless diff → packet transform.
#[derive(Debug, Clone, Copy)]
pub struct DeltaEncoder {
    max_pixels_per_packet: usize,
}

impl DeltaEncoder {
    /// `max_pixels_per_packet` must be within `1..=256`.
    pub fn new(max_pixels_per_packet: usize) -> Result<Self, SyncError> {
        if !(1..=MAX_ADDRESSABLE_PIXELS).contains(&max_pixels_per_packet) {
            return Err(SyncError::InvalidConfig(format!(
                "max pixels per packet must be 1..={MAX_ADDRESSABLE_PIXELS}, got {max_pixels_per_packet}"
            )));
        }
        Ok(Self {
            max_pixels_per_packet,
        })
    }

    pub fn max_pixels_per_packet(&self) -> usize {
        self.max_pixels_per_packet
    }

    /// Indices where `current` and `last_sent` differ in any channel.
    pub fn changed_indices(
        current: &PixelBuffer,
        last_sent: &PixelBuffer,
    ) -> Result<Vec<usize>, SyncError> {
        if current.len() != last_sent.len() {
            return Err(SyncError::BufferLengthMismatch {
                expected: last_sent.len(),
                actual: current.len(),
            });
        }
        Ok(current
            .iter()
            .zip(last_sent.iter())
            .enumerate()
            .filter_map(|(i, (a, b))| (a != b).then_some(i))
            .collect())
    }

    /// Packets carrying every changed pixel. Empty when nothing changed.
    pub fn encode(
        &self,
        current: &PixelBuffer,
        last_sent: &PixelBuffer,
    ) -> Result<Vec<UpdatePacket>, SyncError> {
        let changed = Self::changed_indices(current, last_sent)?;
        self.encode_indices(current, &changed)
    }

    /// Split `indices` into per-packet groups, order preserved.
    pub fn packet_groups<'a>(&self, indices: &'a [usize]) -> std::slice::Chunks<'a, usize> {
        indices.chunks(self.max_pixels_per_packet)
    }

    /// Packets carrying the pixels at `indices` (ascending).
    pub fn encode_indices(
        &self,
        current: &PixelBuffer,
        indices: &[usize],
    ) -> Result<Vec<UpdatePacket>, SyncError> {
        self.packet_groups(indices)
            .map(|chunk| -> Result<UpdatePacket, SyncError> {
                let mut packet = UpdatePacket::with_capacity(chunk.len());
                for &i in chunk {
                    let color = current.get(i).ok_or(SyncError::BufferLengthMismatch {
                        expected: i + 1,
                        actual: current.len(),
                    })?;
                    let index = u8::try_from(i).map_err(|_| {
                        SyncError::InvalidConfig(format!(
                            "pixel {i} is beyond the {MAX_ADDRESSABLE_PIXELS} addressable pixels"
                        ))
                    })?;
                    packet.push(index, color);
                }
                Ok(packet)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::led::pixel::Rgb;

    #[test]
    fn unchanged_buffer_produces_nothing() {
        let enc = DeltaEncoder::new(126).unwrap();
        let buf = PixelBuffer::filled(60, Rgb::new(10, 20, 30));
        assert!(enc.encode(&buf, &buf.clone()).unwrap().is_empty());
    }

    #[test]
    fn only_changed_pixels_are_sent() {
        let enc = DeltaEncoder::new(126).unwrap();
        let last = PixelBuffer::new(10);
        let mut cur = last.clone();
        cur.set(2, Rgb::new(0, 0, 1));
        cur.set(7, Rgb::WHITE);

        let packets = enc.encode(&cur, &last).unwrap();
        assert_eq!(packets.len(), 1);
        assert_eq!(
            packets[0].entries(),
            &[(2, Rgb::new(0, 0, 1)), (7, Rgb::WHITE)]
        );
    }

    #[test]
    fn chunks_preserve_order() {
        let enc = DeltaEncoder::new(4).unwrap();
        let last = PixelBuffer::new(10);
        let cur = PixelBuffer::filled(10, Rgb::WHITE);
        let packets = enc.encode(&cur, &last).unwrap();
        let sizes: Vec<usize> = packets.iter().map(|p| p.len()).collect();
        assert_eq!(sizes, vec![4, 4, 2]);
        let indices: Vec<u8> = packets
            .iter()
            .flat_map(|p| p.entries().iter().map(|(i, _)| *i))
            .collect();
        assert_eq!(indices, (0..10).collect::<Vec<u8>>());
    }

    #[test]
    fn three_hundred_changes_group_as_126_126_48() {
        let enc = DeltaEncoder::new(126).unwrap();
        let changed: Vec<usize> = (0..300).collect();
        let sizes: Vec<usize> = enc.packet_groups(&changed).map(<[usize]>::len).collect();
        assert_eq!(sizes, vec![126, 126, 48]);
    }

    #[test]
    fn length_mismatch_is_an_error() {
        let enc = DeltaEncoder::new(126).unwrap();
        let err = enc
            .encode(&PixelBuffer::new(3), &PixelBuffer::new(4))
            .unwrap_err();
        assert!(matches!(
            err,
            SyncError::BufferLengthMismatch {
                expected: 4,
                actual: 3
            }
        ));
    }

    #[test]
    fn unaddressable_index_is_rejected() {
        let enc = DeltaEncoder::new(126).unwrap();
        let last = PixelBuffer::new(300);
        let mut cur = last.clone();
        cur.set(299, Rgb::WHITE);
        assert!(matches!(
            enc.encode(&cur, &last),
            Err(SyncError::InvalidConfig(_))
        ));
    }

    #[test]
    fn packet_size_bounds() {
        assert!(DeltaEncoder::new(0).is_err());
        assert!(DeltaEncoder::new(257).is_err());
        assert!(DeltaEncoder::new(256).is_ok());
    }
}
