//! Offline playback and analysis sources.
//!
//! Lets the whole pipeline run against a local analysis file and a
//! simulated player, without any streaming-service account.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tracing::debug;

use beatlight_core::{
    AnalysisSource, PlaybackSource, PlaybackState, SyncError, TrackAnalysis, TrackMetadata,
};

use crate::config::SourceConfig;

// ── FileAnalysisSource ───────────────────────────────────────────

/// Reads analysis documents from disk.
///
/// If `path` is a directory, the document for track `id` is
/// `<path>/<id>.json`; otherwise `path` itself is returned for every track.
#[derive(Debug, Clone)]
pub struct FileAnalysisSource {
    path: PathBuf,
}

impl FileAnalysisSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path_for(&self, track_id: &str) -> PathBuf {
        if self.path.is_dir() {
            self.path.join(format!("{track_id}.json"))
        } else {
            self.path.clone()
        }
    }
}

#[async_trait]
impl AnalysisSource for FileAnalysisSource {
    async fn track_analysis(&self, track_id: &str) -> Result<TrackAnalysis, SyncError> {
        let path = self.path_for(track_id);
        let text = tokio::fs::read_to_string(&path).await?;
        let analysis = TrackAnalysis::from_json(&text)?;
        debug!(
            "loaded {} elements for {track_id} from {}",
            analysis.element_count(),
            path.display()
        );
        Ok(analysis)
    }
}

// ── SimulatedPlayback ────────────────────────────────────────────

/// A player that started `start_ms` into a track when it was created
/// and has been playing ever since.
///
/// Each poll takes `latency` to answer, and the reported position is the
/// one at the middle of that round trip. With a known track length and
/// `looping`, the position wraps to 0 at the end.
#[derive(Debug, Clone)]
pub struct SimulatedPlayback {
    track: TrackMetadata,
    started: Instant,
    start_ms: f64,
    latency: Duration,
    track_length_ms: Option<f64>,
    looping: bool,
}

impl SimulatedPlayback {
    pub fn new(track: TrackMetadata, start_ms: f64, latency: Duration) -> Self {
        Self {
            track,
            started: Instant::now(),
            start_ms: start_ms.max(0.0),
            latency,
            track_length_ms: None,
            looping: false,
        }
    }

    pub fn from_config(config: &SourceConfig) -> Self {
        let artists: Vec<&str> = config.artists.iter().map(String::as_str).collect();
        Self::new(
            TrackMetadata::new(&config.track_id, &config.track_name, &artists),
            config.start_ms,
            Duration::from_millis(config.latency_ms),
        )
    }

    /// Wrap at `length_ms` when `looping`, otherwise stop there.
    pub fn with_track_length(mut self, length_ms: f64, looping: bool) -> Self {
        self.track_length_ms = (length_ms.is_finite() && length_ms > 0.0).then_some(length_ms);
        self.looping = looping;
        self
    }

    /// Position (ms) and play state at `t`.
    pub fn position_at(&self, t: Instant) -> (f64, bool) {
        let elapsed = t.saturating_duration_since(self.started).as_secs_f64() * 1000.0;
        let pos = self.start_ms + elapsed;
        match self.track_length_ms {
            Some(len) if self.looping => (pos % len, true),
            Some(len) if pos >= len => (len, false),
            _ => (pos, true),
        }
    }
}

#[async_trait]
impl PlaybackSource for SimulatedPlayback {
    async fn current_playback(&self) -> Result<Option<PlaybackState>, SyncError> {
        let half = self.latency / 2;
        tokio::time::sleep(half).await;
        let (progress, is_playing) = self.position_at(Instant::now());
        tokio::time::sleep(half).await;

        Ok(Some(PlaybackState {
            is_playing,
            progress_ms: Some(progress),
            item: Some(self.track.clone()),
        }))
    }
}

/// Track length from its analysis, if that can be read.
pub async fn track_length_ms(source: &FileAnalysisSource, track_id: &str) -> Option<f64> {
    source
        .track_analysis(track_id)
        .await
        .ok()
        .map(|a| a.summary().duration_ms)
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = r#"{
        "track": { "tempo": 120.0, "time_signature": 4, "duration": 2.0 },
        "beats": [ { "start": 0.0, "duration": 0.5 }, { "start": 0.5, "duration": 0.5 } ]
    }"#;

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("beatlight-{name}-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[tokio::test]
    async fn reads_per_track_file_from_directory() {
        let dir = temp_dir("dir");
        std::fs::write(dir.join("abc.json"), DOC).unwrap();

        let src = FileAnalysisSource::new(&dir);
        let analysis = src.track_analysis("abc").await.unwrap();
        assert_eq!(analysis.summary().bpm(), 120);
        assert!(src.track_analysis("missing").await.is_err());
        assert_eq!(track_length_ms(&src, "abc").await, Some(2000.0));

        std::fs::remove_dir_all(dir).ok();
    }

    #[tokio::test]
    async fn single_file_serves_every_track() {
        let dir = temp_dir("file");
        let file = dir.join("song.json");
        std::fs::write(&file, DOC).unwrap();

        let src = FileAnalysisSource::new(&file);
        assert!(src.track_analysis("anything").await.is_ok());
        assert_eq!(src.path_for("x"), file);

        std::fs::remove_dir_all(dir).ok();
    }

    #[tokio::test]
    async fn malformed_file_is_an_error() {
        let dir = temp_dir("bad");
        let file = dir.join("bad.json");
        std::fs::write(&file, "{ not json").unwrap();
        assert!(FileAnalysisSource::new(&file).track_analysis("x").await.is_err());
        std::fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn simulated_position_loops() {
        let p = SimulatedPlayback::new(TrackMetadata::new("t", "T", &[]), 1_500.0, Duration::ZERO)
            .with_track_length(2_000.0, true);
        let (pos, playing) = p.position_at(p.started + Duration::from_millis(700));
        assert!(playing);
        assert!((pos - 200.0).abs() < 1e-6);
    }

    #[test]
    fn simulated_position_stops_at_end() {
        let p = SimulatedPlayback::new(TrackMetadata::new("t", "T", &[]), 1_500.0, Duration::ZERO)
            .with_track_length(2_000.0, false);
        assert_eq!(p.position_at(p.started + Duration::from_secs(1)), (2_000.0, false));
    }

    #[tokio::test]
    async fn simulated_poll_reports_track() {
        let p = SimulatedPlayback::from_config(&SourceConfig {
            latency_ms: 10,
            ..SourceConfig::default()
        });
        let before = Instant::now();
        let state = tokio_test::assert_ok!(p.current_playback().await).unwrap();
        assert!(before.elapsed() >= Duration::from_millis(10));
        assert!(state.is_playing);
        assert_eq!(state.track_id(), Some("demo"));
        assert!(state.progress_ms.unwrap() >= 0.0);
    }
}
