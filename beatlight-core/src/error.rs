//! Domain-specific error types for the sync engine and LED transport.
//!
//! All fallible operations return `Result<T, SyncError>`.
//! Nothing on the frame path panics on bad input; configuration problems
//! surface at construction time.

use thiserror::Error;

/// The canonical error type for beatlight.
#[derive(Debug, Error)]
pub enum SyncError {
    // ── Analysis Errors ──────────────────────────────────────────
    /// The track analysis document could not be used.
    #[error("malformed track analysis: {0}")]
    MalformedAnalysis(String),

    /// JSON decoding of an analysis or playback document failed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    // ── Configuration Errors ─────────────────────────────────────
    /// A configuration value is outside what the protocol can express.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    // ── LED Protocol Errors ──────────────────────────────────────
    /// A pixel buffer does not match the length the transport was built for.
    #[error("pixel buffer length mismatch: expected {expected}, got {actual}")]
    BufferLengthMismatch { expected: usize, actual: usize },

    /// A datagram is shorter than the fixed header.
    #[error("packet too short: {0} bytes")]
    PacketTooShort(usize),

    /// A datagram does not start with the index-addressed RGB header.
    #[error("invalid packet header: {0:#04x} {1:#04x}")]
    InvalidHeader(u8, u8),

    /// The packet body is not a whole number of `index, r, g, b` entries.
    #[error("truncated packet entry: {0} trailing bytes")]
    TruncatedEntry(usize),

    // ── I/O Errors ───────────────────────────────────────────────
    /// The socket or file layer reported an error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// A collaborator (playback or analysis source) failed.
    #[error("source error: {0}")]
    Source(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_messages() {
        let e = SyncError::BufferLengthMismatch {
            expected: 60,
            actual: 30,
        };
        assert!(e.to_string().contains("60"));
        assert!(e.to_string().contains("30"));

        let e = SyncError::InvalidHeader(0x02, 0x01);
        assert_eq!(e.to_string(), "invalid packet header: 0x02 0x01");
    }

    #[test]
    fn from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        let e: SyncError = io_err.into();
        assert!(matches!(e, SyncError::Io(_)));
    }
}
