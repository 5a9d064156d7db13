//! Rate-limited UDP transport for LED updates.
//!
//! [`RateLimitedTransport`] owns the "last sent" pixel generation. Each
//! accepted [`update`](RateLimitedTransport::update) diffs the caller's
//! buffer against it, sends one datagram per [`UpdatePacket`], and commits
//! a packet's pixels to "last sent" only after that datagram went out.
//! Calls arriving faster than `1000 / max_fps` ms after the previous
//! accepted call are dropped without touching any state.

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::net::UdpSocket;
use tracing::{debug, warn};

use crate::error::SyncError;
use crate::led::encoder::DeltaEncoder;
use crate::led::packet::{DEFAULT_MAX_PIXELS_PER_PACKET, MAX_ADDRESSABLE_PIXELS};
use crate::led::pixel::PixelBuffer;

// ── DatagramSink ─────────────────────────────────────────────────

/// Anything that can fire off one datagram.
#[async_trait]
pub trait DatagramSink: Send + Sync {
    async fn send(&self, datagram: &[u8]) -> std::io::Result<usize>;
}

/// UDP socket aimed at one controller.
pub struct UdpSink {
    socket: UdpSocket,
    remote_addr: SocketAddr,
}

impl UdpSink {
    /// Wrap an already-bound socket.
    pub fn new(socket: UdpSocket, remote_addr: SocketAddr) -> Self {
        Self {
            socket,
            remote_addr,
        }
    }

    /// Bind an ephemeral local port of the same address family as `remote_addr`.
    pub async fn bind(remote_addr: SocketAddr) -> Result<Self, SyncError> {
        let local: SocketAddr = if remote_addr.is_ipv4() {
            ([0, 0, 0, 0], 0).into()
        } else {
            ([0u16; 8], 0).into()
        };
        let socket = UdpSocket::bind(local).await?;
        Ok(Self::new(socket, remote_addr))
    }

    pub fn remote_addr(&self) -> SocketAddr {
        self.remote_addr
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }
}

#[async_trait]
impl DatagramSink for UdpSink {
    async fn send(&self, datagram: &[u8]) -> std::io::Result<usize> {
        self.socket.send_to(datagram, self.remote_addr).await
    }
}

// ── Config / results ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
pub struct TransportConfig {
    /// Entries per datagram (1..=256).
    pub max_pixels_per_packet: usize,
    /// Upper bound on accepted updates per second; 0 = unbounded.
    pub max_fps: u32,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            max_pixels_per_packet: DEFAULT_MAX_PIXELS_PER_PACKET,
            max_fps: 0,
        }
    }
}

/// Per-update send statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SendReport {
    pub pixels_changed: usize,
    pub packets_sent: usize,
    pub packets_failed: usize,
    pub bytes_sent: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// Too soon after the previous accepted update; nothing happened.
    Throttled,
    /// Accepted, but no pixel differed from what was last sent.
    Unchanged,
    Sent(SendReport),
}

// ── RateLimitedTransport ─────────────────────────────────────────

pub struct RateLimitedTransport<S> {
    sink: S,
    encoder: DeltaEncoder,
    last_sent: PixelBuffer,
    min_interval: Option<Duration>,
    last_update: Option<Instant>,
    full_resend: bool,
    packets_sent: u64,
    bytes_sent: u64,
}

impl<S: DatagramSink> RateLimitedTransport<S> {
    /// Fails if `num_pixels` is 0 or exceeds the 256 pixels a one-byte
    /// index can address, or if the packet size is out of range.
    pub fn new(sink: S, num_pixels: usize, config: TransportConfig) -> Result<Self, SyncError> {
        if num_pixels == 0 || num_pixels > MAX_ADDRESSABLE_PIXELS {
            return Err(SyncError::InvalidConfig(format!(
                "LED count must be 1..={MAX_ADDRESSABLE_PIXELS} for index-addressed updates, got {num_pixels}"
            )));
        }
        let encoder = DeltaEncoder::new(config.max_pixels_per_packet)?;
        let min_interval =
            (config.max_fps > 0).then(|| Duration::from_secs_f64(1.0 / config.max_fps as f64));

        Ok(Self {
            sink,
            encoder,
            last_sent: PixelBuffer::new(num_pixels),
            min_interval,
            last_update: None,
            full_resend: true,
            packets_sent: 0,
            bytes_sent: 0,
        })
    }

    pub async fn update(&mut self, current: &PixelBuffer) -> Result<UpdateOutcome, SyncError> {
        self.update_at(current, Instant::now()).await
    }

    /// [`update`](Self::update) with an explicit clock (useful for testing).
    pub async fn update_at(
        &mut self,
        current: &PixelBuffer,
        now: Instant,
    ) -> Result<UpdateOutcome, SyncError> {
        if let (Some(min), Some(last)) = (self.min_interval, self.last_update) {
            if now.saturating_duration_since(last) < min {
                return Ok(UpdateOutcome::Throttled);
            }
        }
        if current.len() != self.last_sent.len() {
            return Err(SyncError::BufferLengthMismatch {
                expected: self.last_sent.len(),
                actual: current.len(),
            });
        }
        self.last_update = Some(now);

        let packets = if self.full_resend {
            let all: Vec<usize> = (0..current.len()).collect();
            self.encoder.encode_indices(current, &all)?
        } else {
            self.encoder.encode(current, &self.last_sent)?
        };
        if packets.is_empty() {
            return Ok(UpdateOutcome::Unchanged);
        }

        let mut report = SendReport::default();
        for packet in &packets {
            report.pixels_changed += packet.len();
            let datagram = packet.encode();
            match self.sink.send(&datagram).await {
                Ok(n) => {
                    report.packets_sent += 1;
                    report.bytes_sent += n;
                    for &(i, color) in packet.entries() {
                        self.last_sent[i as usize] = color;
                    }
                }
                Err(e) => {
                    // Pixels of this packet stay stale and go out with the next diff.
                    report.packets_failed += 1;
                    warn!("LED packet send failed: {e}");
                }
            }
        }

        if report.packets_failed == 0 {
            self.full_resend = false;
        }
        self.packets_sent += report.packets_sent as u64;
        self.bytes_sent += report.bytes_sent as u64;
        debug!(
            "LED update: {} pixels in {} packets ({} failed)",
            report.pixels_changed, report.packets_sent, report.packets_failed
        );
        Ok(UpdateOutcome::Sent(report))
    }

    /// Treat every pixel as changed on the next accepted update, e.g.
    /// after the controller rebooted.
    pub fn force_full_resend(&mut self) {
        self.full_resend = true;
    }

    pub fn last_sent(&self) -> &PixelBuffer {
        &self.last_sent
    }

    pub fn num_pixels(&self) -> usize {
        self.last_sent.len()
    }

    /// Total datagrams sent since construction.
    pub fn packets_sent(&self) -> u64 {
        self.packets_sent
    }

    /// Total bytes sent since construction.
    pub fn bytes_sent(&self) -> u64 {
        self.bytes_sent
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }
}

// ── Tests ────────────────────────────────────────────────────────
