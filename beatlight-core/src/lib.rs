//! # beatlight-core
//!
//! Music-synchronised lighting engine.
//!
//! This crate contains:
//! - **Analysis**: `TrackAnalysis`, the sorted per-category timeline of sections, bars, beats, tatums and segments
//! - **Playback**: `PlaybackState` plus the `PlaybackSource` / `AnalysisSource` collaborator traits
//! - **Estimator**: `PositionEstimator`, which keeps the best-latency sample and extrapolates audible progress
//! - **Detector**: `StructuralEventDetector`, which finds elements crossed during one frame
//! - **Scheduler / Poller / Engine**: the Tokio loops that tie the above together and broadcast `SyncEvent`s
//! - **LED**: `DeltaEncoder` and `RateLimitedTransport` for index-addressed UDP pixel updates
//! - **Error**: `SyncError`, a typed, `thiserror`-based error enum

pub mod analysis;
pub mod detector;
pub mod engine;
pub mod error;
pub mod estimator;
pub mod events;
pub mod led;
pub mod playback;
pub mod poller;
pub mod scheduler;
pub mod snapshot;

// ── Re-exports for ergonomic usage ───────────────────────────────

pub use analysis::{ElementKind, StructuralElement, TrackAnalysis, TrackSummary};
pub use detector::{BeatCounter, Detection, FrameWindow, StructuralEventDetector};
pub use engine::{EngineConfig, SyncEngine};
pub use error::SyncError;
pub use estimator::{Acceptance, PlaybackSample, PositionEstimator, PositionModel};
pub use events::{BeatPosition, ElementHit, SyncEvent, TrackChange};
pub use playback::{AnalysisSource, PlaybackSource, PlaybackState, TrackMetadata};
pub use poller::{PlaybackPoller, PollOutcome};
pub use scheduler::{FrameScheduler, FrameState};
pub use snapshot::PlaybackSnapshot;

// ── LED re-exports ───────────────────────────────────────────────
pub use led::{
    DatagramSink, DeltaEncoder, PixelBuffer, RateLimitedTransport, Rgb, SendReport,
    TransportConfig, UdpSink, UpdateOutcome, UpdatePacket,
};
