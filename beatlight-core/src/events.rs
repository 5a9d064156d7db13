//! Events delivered to effect consumers.
//!
//! The engine fans events out over a `tokio::sync::broadcast` channel:
//! every subscriber sees every event in emission order. A subscriber that
//! falls more than the channel capacity behind loses the oldest events and
//! receives `RecvError::Lagged` once.

use crate::analysis::{ElementKind, StructuralElement, TrackSummary};
use crate::playback::TrackMetadata;

/// A structural element whose start boundary was just crossed.
#[derive(Debug, Clone, PartialEq)]
pub struct ElementHit {
    pub element: StructuralElement,
    /// Estimated audible progress (ms) on the frame that detected it.
    pub progress_ms: f64,
}

/// Position of a beat inside its bar, 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BeatPosition {
    pub beat: u32,
    pub beats_per_bar: u32,
}

impl BeatPosition {
    pub fn is_downbeat(&self) -> bool {
        self.beat == 1
    }
}

/// A new track started playing.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackChange {
    pub track: TrackMetadata,
    /// `None` when the analysis could not be fetched; no element events
    /// fire for this track until a later track change.
    pub summary: Option<TrackSummary>,
    /// Snapshot generation the change was published with.
    pub generation: u64,
}

impl TrackChange {
    /// e.g. `"F# Minor"`.
    pub fn key_signature(&self) -> Option<String> {
        let s = self.summary.as_ref()?;
        Some(format!("{} {}", s.key_name()?, s.mode_name()))
    }
}

/// Everything the sync engine reports.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    TrackChanged(TrackChange),
    SectionStarted(ElementHit),
    BarStarted(ElementHit),
    BeatStarted {
        hit: ElementHit,
        position: BeatPosition,
    },
    TatumStarted(ElementHit),
    SegmentStarted(ElementHit),
}

impl SyncEvent {
    /// Category of a started-event; `None` for track changes.
    pub fn kind(&self) -> Option<ElementKind> {
        match self {
            SyncEvent::TrackChanged(_) => None,
            SyncEvent::SectionStarted(_) => Some(ElementKind::Section),
            SyncEvent::BarStarted(_) => Some(ElementKind::Bar),
            SyncEvent::BeatStarted { .. } => Some(ElementKind::Beat),
            SyncEvent::TatumStarted(_) => Some(ElementKind::Tatum),
            SyncEvent::SegmentStarted(_) => Some(ElementKind::Segment),
        }
    }

    pub fn hit(&self) -> Option<&ElementHit> {
        match self {
            SyncEvent::TrackChanged(_) => None,
            SyncEvent::SectionStarted(h)
            | SyncEvent::BarStarted(h)
            | SyncEvent::TatumStarted(h)
            | SyncEvent::SegmentStarted(h) => Some(h),
            SyncEvent::BeatStarted { hit, .. } => Some(hit),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(start_ms: f64, index: usize) -> ElementHit {
        ElementHit {
            element: StructuralElement {
                start_ms,
                duration_ms: 500.0,
                index,
                confidence: None,
                loudness_max: None,
            },
            progress_ms: start_ms + 3.0,
        }
    }

    #[test]
    fn kind_and_hit_accessors() {
        let ev = SyncEvent::BeatStarted {
            hit: hit(500.0, 1),
            position: BeatPosition {
                beat: 2,
                beats_per_bar: 4,
            },
        };
        assert_eq!(ev.kind(), Some(ElementKind::Beat));
        assert_eq!(ev.hit().unwrap().element.index, 1);

        let ev = SyncEvent::SegmentStarted(hit(0.0, 0));
        assert_eq!(ev.kind(), Some(ElementKind::Segment));
    }

    #[test]
    fn key_signature_formatting() {
        let change = TrackChange {
            track: TrackMetadata::new("id", "Song", &["Artist"]),
            summary: Some(TrackSummary {
                tempo: 128.0,
                key: 6,
                mode: 0,
                time_signature: 4,
                duration_ms: 200_000.0,
            }),
            generation: 1,
        };
        assert_eq!(change.key_signature().as_deref(), Some("F# Minor"));
        assert!(SyncEvent::TrackChanged(change).kind().is_none());
    }
}
