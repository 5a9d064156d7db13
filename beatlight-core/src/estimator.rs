//! Playback position estimation from sparse, latency-noisy samples.
//!
//! The playback source is polled roughly once a second and each answer
//! is already stale by the time it arrives. [`PositionEstimator`] keeps
//! the single best sample seen so far and extrapolates from it:
//!
//! ```text
//! progress(t) = reported + (t − sampled_at) + latency / 2 + audio_delay
//! ```
//!
//! A new sample only replaces the held one when it is about a different
//! track, was measured with a tighter round trip, or disagrees with the
//! extrapolation by more than either sample's uncertainty (a seek).

use std::time::Instant;

// ── PlaybackSample ───────────────────────────────────────────────

/// One poll result, timestamped on the monotonic clock.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackSample {
    /// Progress reported by the source, in ms.
    pub reported_progress_ms: f64,
    /// Monotonic instant the response was received.
    pub sampled_at: Instant,
    /// Round trip of the poll that produced this sample, in ms.
    pub measured_latency_ms: f64,
    pub track_id: String,
    pub is_playing: bool,
}

impl PlaybackSample {
    /// Reported progress carried forward to `t`, without latency or
    /// audio delay compensation.
    pub fn extrapolate(&self, t: Instant) -> f64 {
        self.reported_progress_ms + signed_elapsed_ms(self.sampled_at, t)
    }
}

/// `to − from` in ms; negative when `to` precedes `from`.
pub(crate) fn signed_elapsed_ms(from: Instant, to: Instant) -> f64 {
    if to >= from {
        (to - from).as_secs_f64() * 1000.0
    } else {
        -((from - to).as_secs_f64() * 1000.0)
    }
}

// ── PositionModel ────────────────────────────────────────────────

/// Continuous position function derived from the held sample.
///
/// Cheap to clone; the poller publishes one of these per accepted sample.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionModel {
    sample: PlaybackSample,
    audio_delay_ms: f64,
}

impl PositionModel {
    pub fn new(sample: PlaybackSample, audio_delay_ms: f64) -> Self {
        Self {
            sample,
            audio_delay_ms,
        }
    }

    /// Audible progress at `t` in ms, or `None` while not playing.
    pub fn progress_at(&self, t: Instant) -> Option<f64> {
        if !self.sample.is_playing {
            return None;
        }
        Some(
            self.sample.extrapolate(t)
                + self.sample.measured_latency_ms / 2.0
                + self.audio_delay_ms,
        )
    }

    pub fn sample(&self) -> &PlaybackSample {
        &self.sample
    }

    pub fn track_id(&self) -> &str {
        &self.sample.track_id
    }

    pub fn is_playing(&self) -> bool {
        self.sample.is_playing
    }
}

// ── Acceptance ───────────────────────────────────────────────────

/// Verdict of [`PositionEstimator::ingest`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acceptance {
    /// Different track than the held sample (or no sample held yet).
    TrackChanged,
    /// Same track, paused or resumed.
    PlayStateChanged,
    /// Same track, lower round-trip latency.
    LatencyImproved,
    /// Reported progress disagrees with the extrapolation beyond both
    /// samples' latency bounds.
    SeekDetected,
    /// Kept the held sample.
    Rejected,
}

impl Acceptance {
    pub fn is_accepted(self) -> bool {
        !matches!(self, Acceptance::Rejected)
    }
}

// ── PositionEstimator ────────────────────────────────────────────

/// Holds the current best [`PlaybackSample`].
#[derive(Debug, Clone)]
pub struct PositionEstimator {
    audio_delay_ms: f64,
    current: Option<PlaybackSample>,
}

impl PositionEstimator {
    /// `audio_delay_ms` compensates output-device buffering; it is added
    /// to every position the estimator reports.
    pub fn new(audio_delay_ms: f64) -> Self {
        Self {
            audio_delay_ms,
            current: None,
        }
    }

    /// Offer a new sample. The held sample is replaced only when the
    /// returned verdict is accepted.
    pub fn ingest(&mut self, sample: PlaybackSample) -> Acceptance {
        let verdict = match &self.current {
            None => Acceptance::TrackChanged,
            Some(held) => Self::judge(held, &sample),
        };
        if verdict.is_accepted() {
            self.current = Some(sample);
        }
        verdict
    }

    /// Drop the held sample. Returns `true` if one was held.
    ///
    /// Used when the source reports no track at all; the next sample is
    /// then treated as a track change.
    pub fn clear(&mut self) -> bool {
        self.current.take().is_some()
    }

    /// Estimated audible progress at `t`, or `None` if unknown.
    pub fn position_at(&self, t: Instant) -> Option<f64> {
        self.model().and_then(|m| m.progress_at(t))
    }

    /// Snapshot of the position function for publishing to readers.
    pub fn model(&self) -> Option<PositionModel> {
        self.current
            .as_ref()
            .map(|s| PositionModel::new(s.clone(), self.audio_delay_ms))
    }

    pub fn current(&self) -> Option<&PlaybackSample> {
        self.current.as_ref()
    }

    // ── Internal ─────────────────────────────────────────────────

    fn judge(held: &PlaybackSample, new: &PlaybackSample) -> Acceptance {
        if new.track_id != held.track_id {
            return Acceptance::TrackChanged;
        }
        if new.is_playing != held.is_playing {
            return Acceptance::PlayStateChanged;
        }
        if new.measured_latency_ms < held.measured_latency_ms {
            return Acceptance::LatencyImproved;
        }
        let predicted = held.extrapolate(new.sampled_at);
        let discrepancy = (predicted - new.reported_progress_ms).abs();
        if discrepancy > new.measured_latency_ms.max(held.measured_latency_ms) {
            Acceptance::SeekDetected
        } else {
            Acceptance::Rejected
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────
