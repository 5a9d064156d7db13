//! Sync engine: owns the poller and the frame scheduler.
//!
//! ```text
//!  PlaybackSource ──► PlaybackPoller ──watch──► FrameScheduler ──broadcast──► consumers
//!  AnalysisSource ──┘   (estimator)              (detector)
//! ```
//!
//! Both loops run as Tokio tasks and stop when the engine's
//! `CancellationToken` fires.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::events::SyncEvent;
use crate::playback::{AnalysisSource, PlaybackSource};
use crate::poller::PlaybackPoller;
use crate::scheduler::FrameScheduler;
use crate::snapshot::PlaybackSnapshot;

// ── EngineConfig ─────────────────────────────────────────────────

/// Values the engine needs; how they are obtained is up to the caller.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Detector frame rate.
    pub fps: u32,
    /// Output-device audio delay compensation in ms.
    pub audio_delay_ms: f64,
    /// Interval between playback polls.
    pub poll_interval: Duration,
    /// Capacity of the event broadcast channel.
    pub event_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            fps: 60,
            audio_delay_ms: 0.0,
            poll_interval: Duration::from_millis(1000),
            event_capacity: 256,
        }
    }
}

// ── SyncEngine ───────────────────────────────────────────────────

pub struct SyncEngine {
    events: broadcast::Sender<SyncEvent>,
    snapshots: watch::Receiver<PlaybackSnapshot>,
    cancel: CancellationToken,
    poller: JoinHandle<()>,
    scheduler: JoinHandle<()>,
}

impl SyncEngine {
    /// Spawn the poller and scheduler on the current runtime.
    ///
    /// Returns the engine and a receiver subscribed before either task
    /// started, so the first track change is never missed.
    pub fn start(
        config: EngineConfig,
        playback: Arc<dyn PlaybackSource>,
        analysis: Arc<dyn AnalysisSource>,
        cancel: CancellationToken,
    ) -> (Self, broadcast::Receiver<SyncEvent>) {
        let (events, first_rx) = broadcast::channel(config.event_capacity.max(1));
        let (snap_tx, snap_rx) = watch::channel(PlaybackSnapshot::default());

        let poller = PlaybackPoller::new(
            playback,
            analysis,
            config.audio_delay_ms,
            config.poll_interval,
            snap_tx,
            events.clone(),
        );
        let scheduler = FrameScheduler::new(config.fps, snap_rx.clone(), events.clone());

        info!(
            "sync engine: {} fps, poll every {:?}, audio delay {} ms",
            config.fps, config.poll_interval, config.audio_delay_ms
        );

        let poller = tokio::spawn(poller.run(cancel.child_token()));
        let scheduler = tokio::spawn(scheduler.run(cancel.child_token()));

        (
            Self {
                events,
                snapshots: snap_rx,
                cancel,
                poller,
                scheduler,
            },
            first_rx,
        )
    }

    /// Additional event receiver; sees events from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.events.subscribe()
    }

    /// Copy of the latest published snapshot.
    pub fn snapshot(&self) -> PlaybackSnapshot {
        self.snapshots.borrow().clone()
    }

    /// Estimated audible progress right now.
    pub fn position_now(&self) -> Option<f64> {
        self.snapshots.borrow().progress_at(Instant::now())
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Stop both loops and wait for them to finish.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        for (name, handle) in [("poller", self.poller), ("scheduler", self.scheduler)] {
            if let Err(e) = handle.await {
                warn!("{name} task ended abnormally: {e}");
            }
        }
        info!("sync engine stopped");
    }
}
