//! RGB pixels and fixed-length pixel buffers.

use std::ops::{Index, IndexMut};

// ── Rgb ──────────────────────────────────────────────────────────

/// One 3-byte RGB pixel.
///
/// Every constructor from a wider type clamps each channel to `0..=255`,
/// so a buffer can never hold an out-of-range channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const BLACK: Rgb = Rgb::new(0, 0, 0);
    pub const WHITE: Rgb = Rgb::new(255, 255, 255);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Build from integer channels, clamping each to `0..=255`.
    pub fn clamped(r: i32, g: i32, b: i32) -> Self {
        let c = |v: i32| v.clamp(0, 255) as u8;
        Self::new(c(r), c(g), c(b))
    }

    /// Build from float channels (rounded, clamped, NaN → 0).
    pub fn from_f32(r: f32, g: f32, b: f32) -> Self {
        // `as` saturates and maps NaN to 0.
        let c = |v: f32| v.round().clamp(0.0, 255.0) as u8;
        Self::new(c(r), c(g), c(b))
    }

    pub const fn to_bytes(self) -> [u8; 3] {
        [self.r, self.g, self.b]
    }

    /// Scale every channel by `factor` (clamped).
    pub fn scale(self, factor: f32) -> Self {
        Self::from_f32(
            self.r as f32 * factor,
            self.g as f32 * factor,
            self.b as f32 * factor,
        )
    }

    /// Subtract `amount` from every channel, stopping at 0.
    pub fn fade(self, amount: u8) -> Self {
        Self::new(
            self.r.saturating_sub(amount),
            self.g.saturating_sub(amount),
            self.b.saturating_sub(amount),
        )
    }

    pub fn is_black(self) -> bool {
        self == Self::BLACK
    }
}

impl From<[u8; 3]> for Rgb {
    fn from([r, g, b]: [u8; 3]) -> Self {
        Self::new(r, g, b)
    }
}

impl From<Rgb> for [u8; 3] {
    fn from(c: Rgb) -> Self {
        c.to_bytes()
    }
}

// ── PixelBuffer ──────────────────────────────────────────────────

/// Fixed-length pixel sequence, one entry per LED.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    pixels: Vec<Rgb>,
}

impl PixelBuffer {
    /// All-black buffer of `len` pixels.
    pub fn new(len: usize) -> Self {
        Self::filled(len, Rgb::BLACK)
    }

    pub fn filled(len: usize, color: Rgb) -> Self {
        Self {
            pixels: vec![color; len],
        }
    }

    pub fn len(&self) -> usize {
        self.pixels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pixels.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<Rgb> {
        self.pixels.get(index).copied()
    }

    /// Set one pixel. Returns `false` if `index` is out of range.
    pub fn set(&mut self, index: usize, color: Rgb) -> bool {
        match self.pixels.get_mut(index) {
            Some(p) => {
                *p = color;
                true
            }
            None => false,
        }
    }

    pub fn fill(&mut self, color: Rgb) {
        self.pixels.fill(color);
    }

    pub fn as_slice(&self) -> &[Rgb] {
        &self.pixels
    }

    pub fn iter(&self) -> impl Iterator<Item = &Rgb> {
        self.pixels.iter()
    }
}

impl Index<usize> for PixelBuffer {
    type Output = Rgb;

    fn index(&self, index: usize) -> &Rgb {
        &self.pixels[index]
    }
}

impl IndexMut<usize> for PixelBuffer {
    fn index_mut(&mut self, index: usize) -> &mut Rgb {
        &mut self.pixels[index]
    }
}
