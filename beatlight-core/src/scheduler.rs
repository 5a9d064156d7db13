//! Fixed-rate frame loop driving the structural event detector.
//!
//! Each tick reads the latest [`PlaybackSnapshot`], evaluates the
//! position function once, and hands the detector the window between the
//! previous tick's progress and this one. Deadlines advance by exactly one
//! frame interval from the loop start, so processing time is absorbed by
//! a shorter sleep instead of accumulating as drift.

use std::time::{Duration, Instant};

use tokio::sync::{broadcast, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::analysis::ElementKind;
use crate::detector::{BeatCounter, FrameWindow, StructuralEventDetector};
use crate::events::{ElementHit, SyncEvent};
use crate::snapshot::PlaybackSnapshot;

// ── FrameState ───────────────────────────────────────────────────

/// Scheduler-owned state threaded through every tick.
#[derive(Debug, Clone, Default)]
pub struct FrameState {
    prev_progress: Option<f64>,
    generation: Option<u64>,
    beats: BeatCounter,
}

impl FrameState {
    pub fn prev_progress(&self) -> Option<f64> {
        self.prev_progress
    }

    pub fn beat_count(&self) -> u32 {
        self.beats.count()
    }

    /// Advance one frame at instant `now`.
    ///
    /// Unknown position or missing analysis makes the tick a no-op that
    /// keeps the last valid progress. A new snapshot generation clears
    /// the previous progress and the beat count first.
    pub fn step(
        &mut self,
        detector: &StructuralEventDetector,
        snapshot: &PlaybackSnapshot,
        now: Instant,
    ) -> Vec<SyncEvent> {
        if self.generation != Some(snapshot.generation) {
            self.generation = Some(snapshot.generation);
            self.prev_progress = None;
            self.beats.reset();
        }

        let Some(curr) = snapshot.progress_at(now) else {
            return Vec::new();
        };
        let Some(analysis) = snapshot.analysis.as_deref() else {
            return Vec::new();
        };

        let window = FrameWindow {
            prev_progress: self
                .prev_progress
                .unwrap_or(curr - detector.frame_interval_ms()),
            curr_progress: curr,
        };
        self.prev_progress = Some(curr);

        if window.seek_occurred() {
            debug!(
                from = window.prev_progress,
                to = curr,
                "playback moved backwards"
            );
        }

        let beats_per_bar = analysis.summary().beats_per_bar();
        detector
            .detect(analysis, window)
            .into_iter()
            .map(|d| {
                let hit = ElementHit {
                    element: d.element,
                    progress_ms: curr,
                };
                match d.kind {
                    ElementKind::Section => SyncEvent::SectionStarted(hit),
                    ElementKind::Bar => {
                        self.beats.reset();
                        SyncEvent::BarStarted(hit)
                    }
                    ElementKind::Beat => {
                        let position = self.beats.on_beat(d.element.index, beats_per_bar);
                        SyncEvent::BeatStarted { hit, position }
                    }
                    ElementKind::Tatum => SyncEvent::TatumStarted(hit),
                    ElementKind::Segment => SyncEvent::SegmentStarted(hit),
                }
            })
            .collect()
    }
}

// ── FrameScheduler ───────────────────────────────────────────────

/// Cooperative frame loop.
pub struct FrameScheduler {
    detector: StructuralEventDetector,
    state: FrameState,
    snapshots: watch::Receiver<PlaybackSnapshot>,
    events: broadcast::Sender<SyncEvent>,
    frame_interval: Duration,
    frames: u64,
}

impl FrameScheduler {
    /// `fps` of 0 is treated as 1.
    pub fn new(
        fps: u32,
        snapshots: watch::Receiver<PlaybackSnapshot>,
        events: broadcast::Sender<SyncEvent>,
    ) -> Self {
        let frame_interval = Duration::from_secs_f64(1.0 / fps.max(1) as f64);
        Self {
            detector: StructuralEventDetector::new(frame_interval.as_secs_f64() * 1000.0),
            state: FrameState::default(),
            snapshots,
            events,
            frame_interval,
            frames: 0,
        }
    }

    /// Run one frame at `now` and publish its events. Returns how many
    /// events fired.
    pub fn tick(&mut self, now: Instant) -> usize {
        self.frames += 1;
        let events = {
            let snapshot = self.snapshots.borrow();
            self.state.step(&self.detector, &snapshot, now)
        };
        let fired = events.len();
        for event in events {
            trace!(?event, "frame event");
            // No subscribers is not an error.
            let _ = self.events.send(event);
        }
        fired
    }

    /// Tick until `cancel` fires.
    pub async fn run(mut self, cancel: CancellationToken) {
        debug!(interval = ?self.frame_interval, "frame scheduler started");
        let mut deadline = tokio::time::Instant::now();

        loop {
            self.tick(Instant::now());

            deadline = next_deadline(deadline, tokio::time::Instant::now(), self.frame_interval);

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep_until(deadline) => {}
            }
        }

        debug!(frames = self.frames, "frame scheduler stopped");
    }
}

/// Deadline for the next tick: one interval after `deadline`, or `now`
/// when the loop has fallen more than a whole frame behind.
fn next_deadline(
    deadline: tokio::time::Instant,
    now: tokio::time::Instant,
    interval: Duration,
) -> tokio::time::Instant {
    let next = deadline + interval;
    if now > next + interval {
        debug!(late = ?(now - next), "frame overrun");
        now
    } else {
        next
    }
}

// ── Tests ────────────────────────────────────────────────────────
