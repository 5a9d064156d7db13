//! Flash-and-fade light effect.
//!
//! Every event of the configured trigger kind sets the whole strip to a
//! palette colour; between flashes the colour decays towards black one
//! fixed step at a time. A short hold after each flash keeps fast fades
//! from swallowing it before it is seen.

use std::time::{Duration, Instant};

use tracing::debug;

use beatlight_core::{
    ElementHit, ElementKind, PixelBuffer, Rgb, StructuralElement, SyncError, SyncEvent,
    TrackAnalysis,
};

use crate::config::EffectConfig;

/// Flash colours, indexed by beat-in-bar (1 → first entry) or by a
/// running flash counter for other trigger kinds.
pub const PALETTE: [Rgb; 32] = [
    Rgb::new(255, 255, 255),
    Rgb::new(255, 0, 0),
    Rgb::new(0, 255, 0),
    Rgb::new(0, 0, 255),
    Rgb::new(0, 255, 255),
    Rgb::new(255, 255, 0),
    Rgb::new(255, 0, 255),
    Rgb::new(128, 128, 128),
    Rgb::new(255, 165, 0),
    Rgb::new(128, 0, 128),
    Rgb::new(0, 128, 128),
    Rgb::new(255, 192, 203),
    Rgb::new(0, 0, 0),
    Rgb::new(128, 0, 0),
    Rgb::new(0, 128, 0),
    Rgb::new(0, 0, 128),
    Rgb::new(128, 128, 0),
    Rgb::new(128, 0, 128),
    Rgb::new(0, 128, 128),
    Rgb::new(192, 192, 192),
    Rgb::new(128, 128, 128),
    Rgb::new(255, 140, 0),
    Rgb::new(139, 0, 139),
    Rgb::new(0, 128, 0),
    Rgb::new(0, 0, 128),
    Rgb::new(46, 139, 87),
    Rgb::new(218, 112, 214),
    Rgb::new(210, 180, 140),
    Rgb::new(255, 0, 255),
    Rgb::new(255, 255, 224),
    Rgb::new(128, 0, 0),
    Rgb::new(70, 130, 180),
];

/// Loudness assumed before the first segment is seen.
const SILENCE_DB: f64 = -60.0;

#[derive(Debug, Clone)]
pub struct FlashEffect {
    trigger: ElementKind,
    brightness: f32,
    hold: Duration,
    fade_step: u8,
    color: Rgb,
    flashes: u32,
    last_flash: Option<Instant>,
    volume_db: f64,
}

impl FlashEffect {
    pub fn new(trigger: ElementKind, hold: Duration, fade_step: u8, brightness: f32) -> Self {
        Self {
            trigger,
            brightness: brightness.clamp(0.0, 1.0),
            hold,
            fade_step,
            color: Rgb::BLACK,
            flashes: 0,
            last_flash: None,
            volume_db: SILENCE_DB,
        }
    }

    /// Fails on an unknown `flash_on` kind.
    pub fn from_config(config: &EffectConfig) -> Result<Self, SyncError> {
        Ok(Self::new(
            config.flash_on.parse()?,
            Duration::from_millis(config.hold_ms),
            config.fade_step,
            config.brightness,
        ))
    }

    /// Apply one engine event. Returns `true` if the strip just flashed.
    pub fn on_event(&mut self, event: &SyncEvent, now: Instant) -> bool {
        self.on_event_in(event, None, now)
    }

    /// Like [`on_event`](Self::on_event), with the current track's analysis
    /// so segment loudness can take the neighbouring segments into account.
    pub fn on_event_in(
        &mut self,
        event: &SyncEvent,
        analysis: Option<&TrackAnalysis>,
        now: Instant,
    ) -> bool {
        match event {
            SyncEvent::TrackChanged(_) => {
                self.flashes = 0;
                return false;
            }
            SyncEvent::SegmentStarted(hit) => {
                self.volume_db = segment_volume(hit, analysis);
            }
            _ => {}
        }
        if event.kind() != Some(self.trigger) {
            return false;
        }

        let base = match event {
            SyncEvent::BeatStarted { position, .. } => {
                let marker = if position.is_downbeat() { '-' } else { '.' };
                debug!(
                    "{marker} beat {}/{} | volume {:.1} dB",
                    position.beat, position.beats_per_bar, self.volume_db
                );
                palette_color(position.beat.saturating_sub(1))
            }
            SyncEvent::BarStarted(_) => PALETTE[0],
            _ => {
                self.flashes += 1;
                palette_color(self.flashes - 1)
            }
        };
        self.color = base.scale(self.brightness);
        self.last_flash = Some(now);
        true
    }

    /// One fade step, skipped while the hold after the last flash lasts.
    /// Returns `true` if the colour changed.
    pub fn fade(&mut self, now: Instant) -> bool {
        if self.color.is_black() {
            return false;
        }
        if let Some(t) = self.last_flash {
            if now.saturating_duration_since(t) <= self.hold {
                return false;
            }
        }
        self.color = self.color.fade(self.fade_step);
        true
    }

    pub fn render(&self, buffer: &mut PixelBuffer) {
        buffer.fill(self.color);
    }

    pub fn color(&self) -> Rgb {
        self.color
    }

    pub fn trigger(&self) -> ElementKind {
        self.trigger
    }

    /// Peak loudness of the most recent segment, in dB.
    pub fn volume_db(&self) -> f64 {
        self.volume_db
    }
}

/// Peak loudness around a segment: the loudest of it and its two
/// neighbours. Missing neighbours count as silence.
fn segment_volume(hit: &ElementHit, analysis: Option<&TrackAnalysis>) -> f64 {
    let loudness = |e: &StructuralElement| e.loudness_max.unwrap_or(SILENCE_DB);
    let current = loudness(&hit.element);
    let Some(segments) = analysis.map(|a| a.elements(ElementKind::Segment)) else {
        return current;
    };

    let i = hit.element.index;
    let prev = i
        .checked_sub(1)
        .and_then(|j| segments.get(j))
        .map_or(SILENCE_DB, loudness);
    let next = segments.get(i + 1).map_or(SILENCE_DB, loudness);
    current.max(prev).max(next)
}

fn palette_color(n: u32) -> Rgb {
    PALETTE[n as usize % PALETTE.len()]
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use beatlight_core::{BeatPosition, ElementHit, StructuralElement, TrackChange, TrackMetadata};

    fn hit(index: usize) -> ElementHit {
        ElementHit {
            element: StructuralElement {
                start_ms: index as f64 * 500.0,
                duration_ms: 500.0,
                index,
                confidence: None,
                loudness_max: Some(-7.5),
            },
            progress_ms: index as f64 * 500.0,
        }
    }

    fn beat(index: usize, beat: u32) -> SyncEvent {
        SyncEvent::BeatStarted {
            hit: hit(index),
            position: BeatPosition {
                beat,
                beats_per_bar: 4,
            },
        }
    }

    #[test]
    fn beat_picks_colour_by_position_in_bar() {
        let mut fx = FlashEffect::new(ElementKind::Beat, Duration::ZERO, 10, 1.0);
        let now = Instant::now();
        assert!(fx.on_event(&beat(0, 1), now));
        assert_eq!(fx.color(), Rgb::WHITE);
        assert!(fx.on_event(&beat(1, 2), now));
        assert_eq!(fx.color(), Rgb::new(255, 0, 0));
    }

    #[test]
    fn other_kinds_do_not_flash() {
        let mut fx = FlashEffect::new(ElementKind::Beat, Duration::ZERO, 10, 1.0);
        assert!(!fx.on_event(&SyncEvent::BarStarted(hit(0)), Instant::now()));
        assert!(fx.color().is_black());
    }

    #[test]
    fn counter_cycles_for_non_beat_triggers() {
        let mut fx = FlashEffect::new(ElementKind::Tatum, Duration::ZERO, 10, 1.0);
        let now = Instant::now();
        fx.on_event(&SyncEvent::TatumStarted(hit(0)), now);
        fx.on_event(&SyncEvent::TatumStarted(hit(1)), now);
        assert_eq!(fx.color(), PALETTE[1]);

        let track = TrackChange {
            track: TrackMetadata::new("t", "T", &[]),
            summary: None,
            generation: 2,
        };
        fx.on_event(&SyncEvent::TrackChanged(track), now);
        fx.on_event(&SyncEvent::TatumStarted(hit(2)), now);
        assert_eq!(fx.color(), PALETTE[0]);
    }

    #[test]
    fn fade_waits_for_hold_then_decays() {
        let mut fx = FlashEffect::new(ElementKind::Beat, Duration::from_millis(100), 10, 1.0);
        let t0 = Instant::now();
        fx.on_event(&beat(0, 1), t0);

        assert!(!fx.fade(t0 + Duration::from_millis(50)));
        assert_eq!(fx.color(), Rgb::WHITE);

        assert!(fx.fade(t0 + Duration::from_millis(150)));
        assert_eq!(fx.color(), Rgb::new(245, 245, 245));

        for _ in 0..30 {
            fx.fade(t0 + Duration::from_secs(1));
        }
        assert!(fx.color().is_black());
        assert!(!fx.fade(t0 + Duration::from_secs(1)));
    }

    #[test]
    fn segments_update_volume() {
        let mut fx = FlashEffect::new(ElementKind::Beat, Duration::ZERO, 10, 1.0);
        assert_eq!(fx.volume_db(), -60.0);
        fx.on_event(&SyncEvent::SegmentStarted(hit(3)), Instant::now());
        assert_eq!(fx.volume_db(), -7.5);
    }

    #[test]
    fn segment_volume_takes_loudest_neighbour() {
        let analysis = TrackAnalysis::from_json(
            r#"{
                "segments": [
                    { "start": 0.0, "duration": 0.5, "loudness_max": -20.0 },
                    { "start": 0.5, "duration": 0.5, "loudness_max": -30.0 },
                    { "start": 1.0, "duration": 0.5, "loudness_max": -4.0 }
                ]
            }"#,
        )
        .unwrap();
        let segments = analysis.elements(ElementKind::Segment);
        let at = |i: usize| {
            SyncEvent::SegmentStarted(ElementHit {
                element: segments[i],
                progress_ms: segments[i].start_ms,
            })
        };

        let mut fx = FlashEffect::new(ElementKind::Beat, Duration::ZERO, 10, 1.0);
        let now = Instant::now();
        fx.on_event_in(&at(0), Some(&analysis), now);
        assert_eq!(fx.volume_db(), -20.0);
        fx.on_event_in(&at(1), Some(&analysis), now);
        assert_eq!(fx.volume_db(), -4.0);
        fx.on_event_in(&at(2), Some(&analysis), now);
        assert_eq!(fx.volume_db(), -4.0);

        // Without the analysis only the segment itself counts.
        fx.on_event(&at(1), now);
        assert_eq!(fx.volume_db(), -30.0);
    }

    #[test]
    fn brightness_scales_flash() {
        let mut fx = FlashEffect::new(ElementKind::Bar, Duration::ZERO, 10, 0.5);
        fx.on_event(&SyncEvent::BarStarted(hit(0)), Instant::now());
        assert_eq!(fx.color(), Rgb::new(128, 128, 128));
        let mut buf = PixelBuffer::new(3);
        fx.render(&mut buf);
        assert_eq!(buf.as_slice(), &[Rgb::new(128, 128, 128); 3]);
    }

    #[test]
    fn unknown_trigger_is_rejected() {
        let cfg = EffectConfig {
            flash_on: "chorus".into(),
            ..EffectConfig::default()
        };
        assert!(FlashEffect::from_config(&cfg).is_err());
    }
}
