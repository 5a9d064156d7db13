//! Light service core logic.
//!
//! Wires the configured sources into a [`SyncEngine`], feeds its events
//! through the [`FlashEffect`], and pushes the resulting strip colour to
//! the LED controller until cancelled.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tokio::sync::broadcast::error::RecvError;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use beatlight_core::{
    DatagramSink, PixelBuffer, RateLimitedTransport, Rgb, SyncEngine, SyncError, SyncEvent,
    UdpSink, UpdateOutcome,
};

use crate::config::LightConfig;
use crate::effect::FlashEffect;
use crate::sources::{self, FileAnalysisSource, SimulatedPlayback};

// ── OutputSink ───────────────────────────────────────────────────

/// Where LED datagrams go.
pub enum OutputSink {
    Udp(UdpSink),
    /// `--dry-run`: log datagram sizes instead of sending.
    Log,
}

#[async_trait]
impl DatagramSink for OutputSink {
    async fn send(&self, datagram: &[u8]) -> std::io::Result<usize> {
        match self {
            OutputSink::Udp(sink) => sink.send(datagram).await,
            OutputSink::Log => {
                debug!("dry run: {} byte datagram", datagram.len());
                Ok(datagram.len())
            }
        }
    }
}

// ── LightService ─────────────────────────────────────────────────

/// The top-level light service.
pub struct LightService {
    config: LightConfig,
    dry_run: bool,
    cancel: CancellationToken,
}

impl LightService {
    pub fn new(config: LightConfig, dry_run: bool) -> Self {
        Self {
            config,
            dry_run,
            cancel: CancellationToken::new(),
        }
    }

    /// Token that stops [`run`](Self::run) when cancelled.
    pub fn stop_handle(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn stop(&self) {
        self.cancel.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Open the configured output.
    pub async fn open_output(&self) -> Result<OutputSink, SyncError> {
        if self.dry_run {
            info!("dry run: LED output is logged, not sent");
            return Ok(OutputSink::Log);
        }
        let address = self.config.led_address();
        let remote = tokio::net::lookup_host(address.as_str())
            .await?
            .next()
            .ok_or_else(|| SyncError::InvalidConfig(format!("cannot resolve {address}")))?;
        let sink = UdpSink::bind(remote).await?;
        info!("LED output → {}", sink.remote_addr());
        Ok(OutputSink::Udp(sink))
    }

    /// Run until stopped.
    ///
    /// 1. Builds the effect and the LED transport; configuration errors end here.
    /// 2. Starts the sync engine on the simulated player and analysis files.
    /// 3. Applies events to the effect and pushes the strip on every flash
    ///    and on every refresh tick.
    /// 4. On stop, blanks the strip and shuts the engine down.
    pub async fn run(&self) -> Result<(), SyncError> {
        let mut effect = FlashEffect::from_config(&self.config.effect)?;
        let mut transport = RateLimitedTransport::new(
            self.open_output().await?,
            self.config.led.led_count,
            self.config.to_transport_config(),
        )?;
        let mut buffer = PixelBuffer::new(self.config.led.led_count);

        let analysis = FileAnalysisSource::new(&self.config.source.analysis_path);
        let mut playback = SimulatedPlayback::from_config(&self.config.source);
        if let Some(len) = sources::track_length_ms(&analysis, &self.config.source.track_id).await
        {
            playback = playback.with_track_length(len, self.config.source.loop_track);
        }

        let (engine, mut events) = SyncEngine::start(
            self.config.to_engine_config(),
            Arc::new(playback),
            Arc::new(analysis),
            self.cancel.child_token(),
        );
        info!(
            "flashing on every {} across {} LEDs",
            effect.trigger(),
            buffer.len()
        );

        let mut refresh = tokio::time::interval(self.config.refresh_interval());
        refresh.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut fade = tokio::time::interval(self.config.fade_interval());
        fade.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                received = events.recv() => match received {
                    Ok(event) => {
                        let analysis = match event {
                            SyncEvent::SegmentStarted(_) => engine.snapshot().analysis,
                            _ => None,
                        };
                        if effect.on_event_in(&event, analysis.as_deref(), Instant::now()) {
                            effect.render(&mut buffer);
                            push(&mut transport, &buffer).await;
                        }
                    }
                    Err(RecvError::Lagged(n)) => warn!("effect fell behind, {n} events dropped"),
                    Err(RecvError::Closed) => break,
                },
                _ = fade.tick() => {
                    effect.fade(Instant::now());
                }
                _ = refresh.tick() => {
                    effect.render(&mut buffer);
                    push(&mut transport, &buffer).await;
                }
            }
        }

        buffer.fill(Rgb::BLACK);
        transport.force_full_resend();
        push(&mut transport, &buffer).await;
        info!(
            "sent {} packets ({} bytes) to the LED controller",
            transport.packets_sent(),
            transport.bytes_sent()
        );

        engine.shutdown().await;
        info!("light service stopped");
        Ok(())
    }
}

async fn push(transport: &mut RateLimitedTransport<OutputSink>, buffer: &PixelBuffer) {
    match transport.update(buffer).await {
        Ok(UpdateOutcome::Sent(report)) if report.packets_failed > 0 => {
            warn!(
                "{} of {} LED packets failed",
                report.packets_failed,
                report.packets_failed + report.packets_sent
            );
        }
        Ok(_) => {}
        Err(e) => warn!("LED update failed: {e}"),
    }
}

// ── Tests ────────────────────────────────────────────────────────
