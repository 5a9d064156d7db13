//! The record the poller publishes and the frame scheduler reads.
//!
//! Published through a `tokio::sync::watch` channel: the poller is the
//! only writer, readers always see one whole snapshot, never a mix of two.

use std::sync::Arc;
use std::time::Instant;

use crate::analysis::TrackAnalysis;
use crate::estimator::PositionModel;

/// Position function plus element lists for the current track.
#[derive(Debug, Clone, Default)]
pub struct PlaybackSnapshot {
    /// Bumped on every track change (including "nothing playing").
    pub generation: u64,
    pub model: Option<PositionModel>,
    /// `None` until the analysis arrives, or when it could not be loaded.
    pub analysis: Option<Arc<TrackAnalysis>>,
}

impl PlaybackSnapshot {
    /// Audible progress at `t`, or `None` if not playing / no sample.
    pub fn progress_at(&self, t: Instant) -> Option<f64> {
        self.model.as_ref().and_then(|m| m.progress_at(t))
    }

    pub fn track_id(&self) -> Option<&str> {
        self.model.as_ref().map(|m| m.track_id())
    }
}
