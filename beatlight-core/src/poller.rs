//! Periodic playback polling.
//!
//! The poller is the single writer of the shared [`PlaybackSnapshot`].
//! Every tick it asks the [`PlaybackSource`] for the current state,
//! measures the round trip, and offers the resulting sample to the
//! [`PositionEstimator`]. Accepted samples are published; a track change
//! additionally bumps the snapshot generation, fetches the new track's
//! analysis and emits [`SyncEvent::TrackChanged`].
//!
//! Polls run one at a time, so a slow response can never be applied
//! after a newer one.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{broadcast, watch};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::analysis::TrackAnalysis;
use crate::error::SyncError;
use crate::estimator::{Acceptance, PlaybackSample, PositionEstimator};
use crate::events::{SyncEvent, TrackChange};
use crate::playback::{AnalysisSource, PlaybackSource, TrackMetadata};
use crate::snapshot::PlaybackSnapshot;

/// What one poll did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// Source reported no track at all.
    Idle,
    /// A sample was offered to the estimator.
    Sample(Acceptance),
}

pub struct PlaybackPoller {
    playback: Arc<dyn PlaybackSource>,
    analysis_source: Arc<dyn AnalysisSource>,
    estimator: PositionEstimator,
    analysis: Option<Arc<TrackAnalysis>>,
    generation: u64,
    snapshots: watch::Sender<PlaybackSnapshot>,
    events: broadcast::Sender<SyncEvent>,
    interval: Duration,
}

impl PlaybackPoller {
    pub fn new(
        playback: Arc<dyn PlaybackSource>,
        analysis_source: Arc<dyn AnalysisSource>,
        audio_delay_ms: f64,
        interval: Duration,
        snapshots: watch::Sender<PlaybackSnapshot>,
        events: broadcast::Sender<SyncEvent>,
    ) -> Self {
        Self {
            playback,
            analysis_source,
            estimator: PositionEstimator::new(audio_delay_ms),
            analysis: None,
            generation: 0,
            snapshots,
            events,
            interval,
        }
    }

    pub fn estimator(&self) -> &PositionEstimator {
        &self.estimator
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Poll the source once and apply the result.
    pub async fn poll_once(&mut self) -> Result<PollOutcome, SyncError> {
        let before = Instant::now();
        let state = self.playback.current_playback().await?;
        let received = Instant::now();
        let latency_ms = (received - before).as_secs_f64() * 1000.0;

        let Some((state, track)) = state.and_then(|s| {
            let track = s.item.clone()?;
            Some((s, track))
        }) else {
            if self.estimator.clear() {
                info!("playback stopped");
                self.generation += 1;
                self.analysis = None;
                self.publish();
            }
            return Ok(PollOutcome::Idle);
        };

        let sample = PlaybackSample {
            reported_progress_ms: state.progress_ms.unwrap_or(0.0),
            sampled_at: received,
            measured_latency_ms: latency_ms,
            track_id: track.id.clone(),
            // Without a reported position there is nothing to extrapolate.
            is_playing: state.is_playing && state.progress_ms.is_some(),
        };

        let verdict = self.estimator.ingest(sample);
        match verdict {
            Acceptance::Rejected => {}
            Acceptance::PlayStateChanged => {
                info!(
                    "playback {}",
                    if state.is_playing { "resumed" } else { "paused" }
                );
                self.publish();
            }
            Acceptance::LatencyImproved => {
                debug!("latency improved to {latency_ms:.1} ms");
                self.publish();
            }
            Acceptance::SeekDetected => {
                debug!(
                    "seek detected at {:.0} ms",
                    state.progress_ms.unwrap_or_default()
                );
                self.publish();
            }
            Acceptance::TrackChanged => self.change_track(track).await,
        }
        Ok(PollOutcome::Sample(verdict))
    }

    /// Poll every `interval` until `cancel` fires. Failed polls are logged
    /// and the estimator keeps extrapolating from its last sample.
    pub async fn run(mut self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }
            let result = tokio::select! {
                _ = cancel.cancelled() => break,
                r = self.poll_once() => r,
            };
            if let Err(e) = result {
                warn!("playback poll failed: {e}");
            }
        }

        debug!("playback poller stopped");
    }

    // ── Internal ─────────────────────────────────────────────────

    async fn change_track(&mut self, track: TrackMetadata) {
        self.generation += 1;
        // Publish the new position right away without element lists so
        // the old track's elements are never matched against it.
        self.analysis = None;
        self.publish();

        let analysis = match self.analysis_source.track_analysis(&track.id).await {
            Ok(analysis) => Some(Arc::new(analysis)),
            Err(e) => {
                warn!("no analysis for track {}: {e}", track.id);
                None
            }
        };

        let change = TrackChange {
            track,
            summary: analysis.as_ref().map(|a| *a.summary()),
            generation: self.generation,
        };
        log_track_change(&change);
        // Announce before the elements become visible to the scheduler.
        let _ = self.events.send(SyncEvent::TrackChanged(change));

        if analysis.is_some() {
            self.analysis = analysis;
            self.publish();
        }
    }

    fn publish(&self) {
        self.snapshots.send_replace(PlaybackSnapshot {
            generation: self.generation,
            model: self.estimator.model(),
            analysis: self.analysis.clone(),
        });
    }
}

fn log_track_change(change: &TrackChange) {
    info!(
        "now playing: {} - {}",
        change.track.artist_line(),
        change.track.name
    );
    if let Some(summary) = &change.summary {
        info!(
            "tempo {} BPM, time signature {}/4, key {}",
            summary.bpm(),
            summary.time_signature,
            change.key_signature().as_deref().unwrap_or("unknown")
        );
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use crate::analysis::{AnalysisDocument, RawElement};
    use crate::playback::PlaybackState;

    /// Replays queued answers; an empty queue is a failed poll.
    struct Scripted(Mutex<VecDeque<Option<PlaybackState>>>);

    #[async_trait]
    impl PlaybackSource for Scripted {
        async fn current_playback(&self) -> Result<Option<PlaybackState>, SyncError> {
            self.0
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| SyncError::Source("offline".into()))
        }
    }

    struct OneTrack;

    #[async_trait]
    impl AnalysisSource for OneTrack {
        async fn track_analysis(&self, track_id: &str) -> Result<TrackAnalysis, SyncError> {
            if track_id != "known" {
                return Err(SyncError::Source("404".into()));
            }
            TrackAnalysis::from_document(AnalysisDocument {
                beats: vec![RawElement::new(0.0, 0.5)],
                ..AnalysisDocument::default()
            })
        }
    }

    fn playing(id: &str, progress: f64) -> Option<PlaybackState> {
        Some(PlaybackState {
            is_playing: true,
            progress_ms: Some(progress),
            item: Some(TrackMetadata::new(id, "Song", &["Band"])),
        })
    }

    fn poller(
        answers: Vec<Option<PlaybackState>>,
    ) -> (
        PlaybackPoller,
        watch::Receiver<PlaybackSnapshot>,
        broadcast::Receiver<SyncEvent>,
    ) {
        let (snap_tx, snap_rx) = watch::channel(PlaybackSnapshot::default());
        let (ev_tx, ev_rx) = broadcast::channel(16);
        let p = PlaybackPoller::new(
            Arc::new(Scripted(Mutex::new(answers.into()))),
            Arc::new(OneTrack),
            0.0,
            Duration::from_millis(10),
            snap_tx,
            ev_tx,
        );
        (p, snap_rx, ev_rx)
    }

    #[tokio::test]
    async fn first_poll_changes_track_and_loads_analysis() {
        let (mut p, snaps, mut events) = poller(vec![playing("known", 1_000.0)]);

        let outcome = p.poll_once().await.unwrap();
        assert_eq!(outcome, PollOutcome::Sample(Acceptance::TrackChanged));

        let snap = snaps.borrow().clone();
        assert_eq!(snap.generation, 1);
        assert_eq!(snap.track_id(), Some("known"));
        assert!(snap.analysis.is_some());
        assert!(snap.progress_at(Instant::now()).unwrap() >= 1_000.0);

        match events.try_recv().unwrap() {
            SyncEvent::TrackChanged(change) => {
                assert_eq!(change.track.id, "known");
                assert!(change.summary.is_some());
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_analysis_still_reports_track() {
        let (mut p, snaps, mut events) = poller(vec![playing("unknown", 0.0)]);
        p.poll_once().await.unwrap();

        assert!(snaps.borrow().analysis.is_none());
        assert!(snaps.borrow().model.is_some());
        match events.try_recv().unwrap() {
            SyncEvent::TrackChanged(change) => assert!(change.summary.is_none()),
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test]
    async fn failed_poll_keeps_last_sample() {
        let (mut p, snaps, _events) = poller(vec![playing("known", 5_000.0)]);
        p.poll_once().await.unwrap();
        assert!(p.poll_once().await.is_err());
        assert_eq!(snaps.borrow().generation, 1);
        assert!(p.estimator().current().is_some());
    }

    #[tokio::test]
    async fn nothing_playing_clears_model() {
        let (mut p, snaps, _events) = poller(vec![playing("known", 0.0), None]);
        p.poll_once().await.unwrap();
        assert_eq!(p.poll_once().await.unwrap(), PollOutcome::Idle);

        let snap = snaps.borrow().clone();
        assert_eq!(snap.generation, 2);
        assert!(snap.model.is_none());
        assert!(snap.analysis.is_none());
    }

    #[tokio::test]
    async fn missing_progress_is_not_playing() {
        let state = Some(PlaybackState {
            is_playing: true,
            progress_ms: None,
            item: Some(TrackMetadata::new("known", "Song", &[])),
        });
        let (mut p, snaps, _events) = poller(vec![state]);
        p.poll_once().await.unwrap();
        assert_eq!(snaps.borrow().progress_at(Instant::now()), None);
    }

    #[tokio::test]
    async fn run_stops_on_cancel() {
        let (p, snaps, _events) = poller(vec![playing("known", 0.0)]);
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(p.run(cancel.clone()));

        let mut snaps = snaps;
        tokio::time::timeout(Duration::from_secs(2), snaps.changed())
            .await
            .expect("timeout")
            .unwrap();

        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("poller did not stop")
            .unwrap();
    }
}
