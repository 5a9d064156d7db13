//! Configuration for the beatlight service.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use beatlight_core::led::{DEFAULT_MAX_PIXELS_PER_PACKET, DEFAULT_UDP_PORT, MAX_ADDRESSABLE_PIXELS};
use beatlight_core::{EngineConfig, TransportConfig};

/// Top-level configuration loaded from a TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LightConfig {
    /// Position tracking and event detection.
    pub sync: SyncConfig,
    /// LED controller output.
    pub led: LedConfig,
    /// Flash / fade effect.
    pub effect: EffectConfig,
    /// Where playback state and analysis come from.
    pub source: SourceConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
}

/// Sync engine settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Detector frames per second.
    pub fps: u32,
    /// Audio output delay in milliseconds (positive = lights later).
    pub audio_delay_ms: f64,
    /// Interval between playback polls in milliseconds.
    pub poll_interval_ms: u64,
    /// Event channel capacity.
    pub event_capacity: usize,
}

/// LED controller settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LedConfig {
    /// Controller host name or IP address.
    pub host: String,
    /// Realtime UDP port.
    pub port: u16,
    /// Number of LEDs on the strip (1..=256).
    pub led_count: usize,
    /// Pixels per datagram.
    pub max_pixels_per_packet: usize,
    /// Cap on updates per second sent to the controller (0 = unbounded).
    pub max_fps: u32,
    /// How often the current colour is pushed to the strip.
    pub refresh_fps: u32,
}

/// Effect settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EffectConfig {
    /// Element kind that triggers a flash: "section", "bar", "beat",
    /// "tatum" or "segment".
    pub flash_on: String,
    /// Fade steps per second.
    pub fade_rate: u32,
    /// Amount subtracted from every channel per fade step.
    pub fade_step: u8,
    /// Time after a flash before fading starts, in milliseconds.
    pub hold_ms: u64,
    /// Brightness multiplier applied to the palette (0.0..=1.0).
    pub brightness: f32,
}

/// Playback / analysis source settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Analysis JSON file, or a directory of `<track_id>.json` files.
    pub analysis_path: PathBuf,
    /// Track reported by the simulated player.
    pub track_id: String,
    pub track_name: String,
    pub artists: Vec<String>,
    /// Position the simulated player starts at, in milliseconds.
    pub start_ms: f64,
    /// Round-trip latency the simulated player adds to every poll.
    pub latency_ms: u64,
    /// Restart the track when it reaches its end.
    pub loop_track: bool,
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    pub level: String,
}

// ── Defaults ─────────────────────────────────────────────────────

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            fps: 60,
            audio_delay_ms: 0.0,
            poll_interval_ms: 1000,
            event_capacity: 256,
        }
    }
}

impl Default for LedConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: DEFAULT_UDP_PORT,
            led_count: 60,
            max_pixels_per_packet: DEFAULT_MAX_PIXELS_PER_PACKET,
            max_fps: 0,
            refresh_fps: 30,
        }
    }
}

impl Default for EffectConfig {
    fn default() -> Self {
        Self {
            flash_on: "beat".into(),
            fade_rate: 60,
            fade_step: 10,
            hold_ms: 100,
            brightness: 1.0,
        }
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            analysis_path: PathBuf::from("analysis"),
            track_id: "demo".into(),
            track_name: "Demo Track".into(),
            artists: vec!["Unknown Artist".into()],
            start_ms: 0.0,
            latency_ms: 40,
            loop_track: true,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
        }
    }
}

// ── Loading ──────────────────────────────────────────────────────

impl LightConfig {
    /// Load configuration from a TOML file, falling back to defaults.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => toml::from_str(&contents).unwrap_or_else(|e| {
                tracing::warn!("invalid config {}: {e}; using defaults", path.display());
                Self::default()
            }),
            Err(_) => {
                tracing::info!("no config at {}; using defaults", path.display());
                Self::default()
            }
        }
    }

    /// Write the default configuration to a file (for bootstrapping).
    pub fn write_default(path: &Path) -> std::io::Result<()> {
        let text = toml::to_string_pretty(&Self::default()).map_err(std::io::Error::other)?;
        std::fs::write(path, text)
    }

    /// Engine settings, clamped into workable ranges.
    pub fn to_engine_config(&self) -> EngineConfig {
        EngineConfig {
            fps: self.sync.fps.clamp(1, 240),
            audio_delay_ms: if self.sync.audio_delay_ms.is_finite() {
                self.sync.audio_delay_ms
            } else {
                0.0
            },
            poll_interval: Duration::from_millis(self.sync.poll_interval_ms.max(100)),
            event_capacity: self.sync.event_capacity.max(16),
        }
    }

    /// Transport settings, clamped into the protocol's limits.
    pub fn to_transport_config(&self) -> TransportConfig {
        TransportConfig {
            max_pixels_per_packet: self
                .led
                .max_pixels_per_packet
                .clamp(1, MAX_ADDRESSABLE_PIXELS),
            max_fps: self.led.max_fps,
        }
    }

    /// Interval of the output refresh loop.
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.led.refresh_fps.clamp(1, 240) as f64)
    }

    /// Interval between fade steps.
    pub fn fade_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.effect.fade_rate.clamp(1, 1000) as f64)
    }

    /// `host:port` of the LED controller.
    pub fn led_address(&self) -> String {
        format!("{}:{}", self.led.host, self.led.port)
    }
}

// ── Tests ────────────────────────────────────────────────────────
