//! Frame-window structural event detection.
//!
//! Each frame the scheduler hands the detector a [`FrameWindow`]: the
//! audible progress captured on the previous frame and on this one. An
//! element fires when its start lies inside `[curr − F, curr]` and was
//! not already behind the previous frame's progress. Moving backwards
//! (a seek) re-arms everything, so elements fire again on the next pass.
//!
//! Only the earliest matching element per category fires per frame. Two
//! boundaries of one category inside a single frame therefore report
//! only the first; consumers rely on at most one event per category per
//! frame.

use crate::analysis::{ElementKind, StructuralElement, TrackAnalysis};
use crate::events::BeatPosition;

// ── FrameWindow ──────────────────────────────────────────────────

/// Progress (ms) at the previous and the current frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameWindow {
    pub prev_progress: f64,
    pub curr_progress: f64,
}

impl FrameWindow {
    /// Progress moved backwards since the previous frame.
    pub fn seek_occurred(&self) -> bool {
        self.curr_progress < self.prev_progress
    }
}

// ── StructuralEventDetector ──────────────────────────────────────

/// One detected boundary.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Detection {
    pub kind: ElementKind,
    pub element: StructuralElement,
}

/// Stateless detector; all per-track state lives with the scheduler.
#[derive(Debug, Clone, Copy)]
pub struct StructuralEventDetector {
    frame_interval_ms: f64,
}

impl StructuralEventDetector {
    pub fn new(frame_interval_ms: f64) -> Self {
        Self { frame_interval_ms }
    }

    pub fn frame_interval_ms(&self) -> f64 {
        self.frame_interval_ms
    }

    /// Boundaries crossed in `window`, at most one per category, in
    /// [`ElementKind::ALL`] order.
    pub fn detect(&self, analysis: &TrackAnalysis, window: FrameWindow) -> Vec<Detection> {
        ElementKind::ALL
            .iter()
            .filter_map(|&kind| {
                self.first_crossed(analysis.elements(kind), window)
                    .map(|element| Detection {
                        kind,
                        element: *element,
                    })
            })
            .collect()
    }

    /// Earliest element of one sorted category that fires in `window`.
    pub fn first_crossed<'a>(
        &self,
        elements: &'a [StructuralElement],
        window: FrameWindow,
    ) -> Option<&'a StructuralElement> {
        let curr = window.curr_progress;
        if !curr.is_finite() {
            return None;
        }
        let seek = window.seek_occurred();
        let f = self.frame_interval_ms;

        // Skip everything whose window already closed: curr >= start + F.
        let from = elements.partition_point(|e| curr >= e.start_ms + f);
        elements[from..]
            .iter()
            .take_while(|e| curr >= e.start_ms)
            .find(|e| e.start_ms > window.prev_progress || seek)
    }
}

// ── BeatCounter ──────────────────────────────────────────────────

/// Position of beats within the current bar.
///
/// Beats with an index below the bar length take `index + 1` directly so
/// the count is right from the start of the track; after that it cycles.
/// Reset on every bar and on track change.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BeatCounter {
    count: u32,
}

impl BeatCounter {
    pub fn on_beat(&mut self, beat_index: usize, beats_per_bar: u32) -> BeatPosition {
        let bpb = beats_per_bar.max(1);
        self.count = if beat_index < bpb as usize {
            beat_index as u32 + 1
        } else {
            (self.count % bpb) + 1
        };
        BeatPosition {
            beat: self.count,
            beats_per_bar: bpb,
        }
    }

    pub fn reset(&mut self) {
        self.count = 0;
    }

    pub fn count(&self) -> u32 {
        self.count
    }
}

// ── Tests ────────────────────────────────────────────────────────
