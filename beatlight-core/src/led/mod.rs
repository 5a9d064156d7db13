//! # LED output
//!
//! Turns a [`PixelBuffer`] into the smallest set of index-addressed UDP
//! datagrams that bring a WLED-style controller up to date.
//!
//! ```text
//! PixelBuffer ──► DeltaEncoder ──► UpdatePacket(s) ──► RateLimitedTransport ──► DatagramSink
//!                  (vs last sent)     (≤ N entries)      (max fps, commit)        (UdpSink)
//! ```
//!
//! | Module      | Purpose                                     |
//! |-------------|---------------------------------------------|
//! | `pixel`     | `Rgb` and fixed-length `PixelBuffer`         |
//! | `packet`    | WARLS wire format                            |
//! | `encoder`   | Diff against last-sent, chunk into packets   |
//! | `transport` | Rate limiting, sending, last-sent tracking   |

pub mod encoder;
pub mod packet;
pub mod pixel;
pub mod transport;

pub use encoder::DeltaEncoder;
pub use packet::{
    DEFAULT_MAX_PIXELS_PER_PACKET, DEFAULT_UDP_PORT, MAX_ADDRESSABLE_PIXELS, UpdatePacket,
};
pub use pixel::{PixelBuffer, Rgb};
pub use transport::{
    DatagramSink, RateLimitedTransport, SendReport, TransportConfig, UdpSink, UpdateOutcome,
};
