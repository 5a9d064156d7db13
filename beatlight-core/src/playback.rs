//! Playback-state documents and the collaborator traits the poller consumes.
//!
//! The engine never talks HTTP itself. Anything that can answer "what is
//! playing and where are we" implements [`PlaybackSource`]; anything that
//! can produce a [`TrackAnalysis`] for a track id implements
//! [`AnalysisSource`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::analysis::TrackAnalysis;
use crate::error::SyncError;

// ── PlaybackState ────────────────────────────────────────────────

/// Artist credit on a track.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artist {
    pub name: String,
}

/// Identity and credits of the playing track.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackMetadata {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub artists: Vec<Artist>,
}

impl TrackMetadata {
    pub fn new(id: impl Into<String>, name: impl Into<String>, artists: &[&str]) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            artists: artists
                .iter()
                .map(|a| Artist {
                    name: (*a).to_string(),
                })
                .collect(),
        }
    }

    /// Artist names joined with ` & `.
    pub fn artist_line(&self) -> String {
        self.artists
            .iter()
            .map(|a| a.name.as_str())
            .collect::<Vec<_>>()
            .join(" & ")
    }
}

/// One answer from the playback-state source.
///
/// Field names follow the common currently-playing JSON shape
/// (`is_playing`, `progress_ms`, `item`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackState {
    #[serde(default)]
    pub is_playing: bool,
    #[serde(default)]
    pub progress_ms: Option<f64>,
    #[serde(default)]
    pub item: Option<TrackMetadata>,
}

impl PlaybackState {
    pub fn from_json(text: &str) -> Result<Self, SyncError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn track_id(&self) -> Option<&str> {
        self.item.as_ref().map(|t| t.id.as_str())
    }
}

// ── Collaborator traits ──────────────────────────────────────────

/// Source of the current playback position.
///
/// `Ok(None)` means nothing is playing at all (no active device / track).
/// Errors are transient: the poller logs them and tries again on the
/// next tick.
#[async_trait]
pub trait PlaybackSource: Send + Sync {
    async fn current_playback(&self) -> Result<Option<PlaybackState>, SyncError>;
}

/// Source of per-track structural analysis.
#[async_trait]
pub trait AnalysisSource: Send + Sync {
    async fn track_analysis(&self, track_id: &str) -> Result<TrackAnalysis, SyncError>;
}
