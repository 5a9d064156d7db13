//! Track structural analysis.
//!
//! An analysis document lists five categories of structural elements
//! (sections, bars, beats, tatums, segments), each element carrying a
//! `start` and `duration` in **seconds**. [`TrackAnalysis`] is the
//! validated, immutable form the detector works on: times converted to
//! milliseconds, every category sorted by start, indices assigned.
//!
//! A `TrackAnalysis` is loaded once per track and replaced wholesale on
//! track change; nothing mutates it afterwards, so it is shared as an
//! `Arc<TrackAnalysis>`.

use std::fmt;

use serde::Deserialize;

use crate::error::SyncError;

// ── ElementKind ──────────────────────────────────────────────────

/// The five structural element categories, in detection order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementKind {
    Section,
    Bar,
    Beat,
    Tatum,
    Segment,
}

impl ElementKind {
    /// All categories in the order the detector reports them within a frame.
    pub const ALL: [ElementKind; 5] = [
        ElementKind::Section,
        ElementKind::Bar,
        ElementKind::Beat,
        ElementKind::Tatum,
        ElementKind::Segment,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            ElementKind::Section => "section",
            ElementKind::Bar => "bar",
            ElementKind::Beat => "beat",
            ElementKind::Tatum => "tatum",
            ElementKind::Segment => "segment",
        }
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ElementKind {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "section" | "sections" => Ok(ElementKind::Section),
            "bar" | "bars" => Ok(ElementKind::Bar),
            "beat" | "beats" => Ok(ElementKind::Beat),
            "tatum" | "tatums" => Ok(ElementKind::Tatum),
            "segment" | "segments" => Ok(ElementKind::Segment),
            other => Err(SyncError::InvalidConfig(format!(
                "unknown element kind: {other}"
            ))),
        }
    }
}

// ── StructuralElement ────────────────────────────────────────────

/// One time-bounded musical unit inside a category.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StructuralElement {
    /// Start of the element from the beginning of the track, in ms.
    pub start_ms: f64,
    /// Length of the element in ms.
    pub duration_ms: f64,
    /// Position inside its category after sorting.
    pub index: usize,
    /// Analyser confidence (0.0 – 1.0), when reported.
    pub confidence: Option<f64>,
    /// Peak loudness in dB. Only segments carry this.
    pub loudness_max: Option<f64>,
}

// ── Wire documents ───────────────────────────────────────────────

/// Raw element as found in the analysis document (seconds).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawElement {
    pub start: f64,
    #[serde(default)]
    pub duration: f64,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub loudness_max: Option<f64>,
}

impl RawElement {
    pub fn new(start: f64, duration: f64) -> Self {
        Self {
            start,
            duration,
            ..Self::default()
        }
    }
}

/// Raw track-level summary.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RawTrack {
    pub tempo: f64,
    pub key: i32,
    pub mode: i32,
    pub time_signature: i32,
    pub duration: f64,
}

impl Default for RawTrack {
    fn default() -> Self {
        Self {
            tempo: 0.0,
            key: -1,
            mode: 1,
            time_signature: 4,
            duration: 0.0,
        }
    }
}

/// The analysis document as delivered by the analysis source.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AnalysisDocument {
    pub track: RawTrack,
    pub sections: Vec<RawElement>,
    pub bars: Vec<RawElement>,
    pub beats: Vec<RawElement>,
    pub tatums: Vec<RawElement>,
    pub segments: Vec<RawElement>,
}

// ── TrackSummary ─────────────────────────────────────────────────

const KEY_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// Track-level musical metadata.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackSummary {
    /// Estimated tempo in BPM.
    pub tempo: f64,
    /// Pitch class (0 = C … 11 = B), `-1` when undetected.
    pub key: i32,
    /// 1 = major, 0 = minor.
    pub mode: i32,
    /// Beats per bar as estimated by the analyser.
    pub time_signature: i32,
    /// Track length in ms.
    pub duration_ms: f64,
}

impl TrackSummary {
    pub fn key_name(&self) -> Option<&'static str> {
        usize::try_from(self.key)
            .ok()
            .and_then(|k| KEY_NAMES.get(k).copied())
    }

    pub fn mode_name(&self) -> &'static str {
        if self.mode == 1 { "Major" } else { "Minor" }
    }

    /// Beats per bar used for beat counting; 4 when the analyser gave nothing usable.
    pub fn beats_per_bar(&self) -> u32 {
        u32::try_from(self.time_signature)
            .ok()
            .filter(|&n| n > 0)
            .unwrap_or(4)
    }

    pub fn bpm(&self) -> u32 {
        self.tempo.max(0.0).round() as u32
    }
}

impl From<&RawTrack> for TrackSummary {
    fn from(raw: &RawTrack) -> Self {
        Self {
            tempo: raw.tempo,
            key: raw.key,
            mode: raw.mode,
            time_signature: raw.time_signature,
            duration_ms: raw.duration * 1000.0,
        }
    }
}

// ── TrackAnalysis ────────────────────────────────────────────────

/// Validated structural analysis of one track.
#[derive(Debug, Clone)]
pub struct TrackAnalysis {
    summary: TrackSummary,
    sections: Vec<StructuralElement>,
    bars: Vec<StructuralElement>,
    beats: Vec<StructuralElement>,
    tatums: Vec<StructuralElement>,
    segments: Vec<StructuralElement>,
}

impl TrackAnalysis {
    /// Parse and validate an analysis JSON document.
    pub fn from_json(text: &str) -> Result<Self, SyncError> {
        let doc: AnalysisDocument = serde_json::from_str(text)?;
        Self::from_document(doc)
    }

    /// Validate an already-decoded document.
    ///
    /// Every start and duration must be finite and non-negative. Each
    /// category is sorted ascending by start before indices are assigned.
    pub fn from_document(doc: AnalysisDocument) -> Result<Self, SyncError> {
        Ok(Self {
            summary: TrackSummary::from(&doc.track),
            sections: convert(ElementKind::Section, doc.sections)?,
            bars: convert(ElementKind::Bar, doc.bars)?,
            beats: convert(ElementKind::Beat, doc.beats)?,
            tatums: convert(ElementKind::Tatum, doc.tatums)?,
            segments: convert(ElementKind::Segment, doc.segments)?,
        })
    }

    pub fn summary(&self) -> &TrackSummary {
        &self.summary
    }

    /// Elements of one category, ascending by start.
    pub fn elements(&self, kind: ElementKind) -> &[StructuralElement] {
        match kind {
            ElementKind::Section => &self.sections,
            ElementKind::Bar => &self.bars,
            ElementKind::Beat => &self.beats,
            ElementKind::Tatum => &self.tatums,
            ElementKind::Segment => &self.segments,
        }
    }

    /// Total number of elements across all categories.
    pub fn element_count(&self) -> usize {
        ElementKind::ALL
            .iter()
            .map(|&k| self.elements(k).len())
            .sum()
    }
}

fn convert(kind: ElementKind, raw: Vec<RawElement>) -> Result<Vec<StructuralElement>, SyncError> {
    if let Some((i, bad)) = raw.iter().enumerate().find(|(_, e)| {
        !e.start.is_finite() || !e.duration.is_finite() || e.start < 0.0 || e.duration < 0.0
    }) {
        return Err(SyncError::MalformedAnalysis(format!(
            "{kind} {i}: start={} duration={}",
            bad.start, bad.duration
        )));
    }

    let mut raw = raw;
    raw.sort_by(|a, b| a.start.total_cmp(&b.start));

    Ok(raw
        .into_iter()
        .enumerate()
        .map(|(index, e)| StructuralElement {
            start_ms: e.start * 1000.0,
            duration_ms: e.duration * 1000.0,
            index,
            confidence: e.confidence,
            loudness_max: e.loudness_max,
        })
        .collect())
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = r#"{
        "meta": { "analyzer_version": "4.0.0" },
        "track": { "tempo": 119.6, "key": 9, "mode": 0, "time_signature": 3, "duration": 2.0 },
        "bars":     [ { "start": 0.0, "duration": 1.5, "confidence": 0.9 } ],
        "beats":    [ { "start": 1.0, "duration": 0.5 }, { "start": 0.0, "duration": 0.5 }, { "start": 0.5, "duration": 0.5 } ],
        "tatums":   [],
        "sections": [ { "start": 0.0, "duration": 2.0, "loudness": -8.1 } ],
        "segments": [ { "start": 0.25, "duration": 0.3, "loudness_max": -5.5 } ]
    }"#;

    #[test]
    fn parses_and_converts_to_ms() {
        let a = TrackAnalysis::from_json(DOC).unwrap();
        let bars = a.elements(ElementKind::Bar);
        assert_eq!(bars.len(), 1);
        assert_eq!(bars[0].duration_ms, 1500.0);
        assert_eq!(bars[0].confidence, Some(0.9));
        assert_eq!(a.elements(ElementKind::Segment)[0].start_ms, 250.0);
        assert_eq!(a.elements(ElementKind::Segment)[0].loudness_max, Some(-5.5));
        assert_eq!(a.element_count(), 6);
    }

    #[test]
    fn sorts_before_indexing() {
        let a = TrackAnalysis::from_json(DOC).unwrap();
        let starts: Vec<f64> = a.elements(ElementKind::Beat).iter().map(|e| e.start_ms).collect();
        assert_eq!(starts, vec![0.0, 500.0, 1000.0]);
        let idx: Vec<usize> = a.elements(ElementKind::Beat).iter().map(|e| e.index).collect();
        assert_eq!(idx, vec![0, 1, 2]);
    }

    #[test]
    fn summary_names() {
        let a = TrackAnalysis::from_json(DOC).unwrap();
        let s = a.summary();
        assert_eq!(s.key_name(), Some("A"));
        assert_eq!(s.mode_name(), "Minor");
        assert_eq!(s.bpm(), 120);
        assert_eq!(s.beats_per_bar(), 3);
        assert_eq!(s.duration_ms, 2000.0);
    }

    #[test]
    fn unknown_key_and_bad_time_signature() {
        let s = TrackSummary {
            tempo: 90.0,
            key: -1,
            mode: 1,
            time_signature: 0,
            duration_ms: 0.0,
        };
        assert_eq!(s.key_name(), None);
        assert_eq!(s.beats_per_bar(), 4);
    }

    #[test]
    fn rejects_negative_start() {
        let doc = AnalysisDocument {
            beats: vec![RawElement::new(-1.0, 0.5)],
            ..AnalysisDocument::default()
        };
        let err = TrackAnalysis::from_document(doc).unwrap_err();
        assert!(matches!(err, SyncError::MalformedAnalysis(_)));
    }

    #[test]
    fn rejects_missing_start() {
        let err = TrackAnalysis::from_json(r#"{ "beats": [ { "duration": 0.5 } ] }"#).unwrap_err();
        assert!(matches!(err, SyncError::Json(_)));
    }

    #[test]
    fn kind_from_str() {
        assert_eq!("Beats".parse::<ElementKind>().unwrap(), ElementKind::Beat);
        assert!("chorus".parse::<ElementKind>().is_err());
    }
}
