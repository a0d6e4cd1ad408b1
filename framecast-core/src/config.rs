//! Configuration for the frame-streaming server.
//!
//! The configuration is exchanged with the GUI front end as a **flat JSON
//! document** — one object, fixed key set. The key names and defaults are
//! part of that external contract and must not change.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::CastError;

/// Immutable-per-run server configuration.
///
/// Loaded from / persisted to a flat JSON document with exactly these
/// keys. Unknown keys are ignored, missing keys fall back to defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Target frames per second (also bounds batch production rate).
    pub fps: u32,
    /// Output frame width in pixels.
    pub x_res: u32,
    /// Output frame height in pixels.
    pub y_res: u32,
    /// Quantize color channels to their high 4 bits before normalizing.
    pub compressed_colors: bool,
    /// Number of frames bundled into one response (≥ 1).
    pub frame_groups: u32,
    /// Client-side frame-skip hint. Persisted for the GUI/client pair;
    /// the server itself does not act on it.
    pub frame_skip: u32,
    /// Initial playback cursor for new sessions (video mode).
    pub frame_start: u64,
    /// Serve frames from a video file instead of the live display.
    pub video_streaming: bool,
    /// Path to the video source (required when `video_streaming`).
    pub video_path: String,
    /// Cursor increment applied per advancing read (≥ 1).
    pub speed_multiplier: u64,
    /// TCP port to listen on.
    pub port: u16,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            fps: 8,
            x_res: 400,
            y_res: 225,
            compressed_colors: false,
            frame_groups: 1,
            frame_skip: 0,
            frame_start: 0,
            video_streaming: false,
            video_path: String::new(),
            speed_multiplier: 1,
            port: 5000,
        }
    }
}

// ── Loading / saving ─────────────────────────────────────────────

impl StreamConfig {
    /// Load configuration from a JSON file, falling back to defaults.
    ///
    /// A missing file is normal on first run; an unreadable document is
    /// logged and replaced with defaults rather than aborting.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => serde_json::from_str(&contents).unwrap_or_else(|e| {
                tracing::warn!("invalid config {}: {e}; using defaults", path.display());
                Self::default()
            }),
            Err(_) => {
                tracing::info!("no config at {}; using defaults", path.display());
                Self::default()
            }
        }
    }

    /// Persist the configuration as pretty-printed JSON.
    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        let text = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(path, text)
    }

    /// Check the invariants the server relies on.
    ///
    /// Called during server start; a failure leaves the server stopped.
    /// Whether `video_path` actually decodes is verified separately when
    /// the video handle is opened.
    pub fn validate(&self) -> Result<(), CastError> {
        if self.fps == 0 {
            return Err(CastError::Config("fps must be at least 1".into()));
        }
        if self.x_res == 0 || self.y_res == 0 {
            return Err(CastError::Config(format!(
                "resolution must be positive, got {}x{}",
                self.x_res, self.y_res
            )));
        }
        if self.frame_groups == 0 {
            return Err(CastError::Config("frame_groups must be at least 1".into()));
        }
        if self.speed_multiplier == 0 {
            return Err(CastError::Config(
                "speed_multiplier must be at least 1".into(),
            ));
        }
        if self.video_streaming && self.video_path.is_empty() {
            return Err(CastError::Config(
                "video_streaming requires a video_path".into(),
            ));
        }
        Ok(())
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn documented_defaults() {
        let cfg = StreamConfig::default();
        assert_eq!(cfg.fps, 8);
        assert_eq!(cfg.x_res, 400);
        assert_eq!(cfg.y_res, 225);
        assert!(!cfg.compressed_colors);
        assert_eq!(cfg.frame_groups, 1);
        assert_eq!(cfg.frame_skip, 0);
        assert_eq!(cfg.frame_start, 0);
        assert!(!cfg.video_streaming);
        assert_eq!(cfg.video_path, "");
        assert_eq!(cfg.speed_multiplier, 1);
        assert_eq!(cfg.port, 5000);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn json_document_carries_exactly_the_contract_keys() {
        let text = serde_json::to_string(&StreamConfig::default()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        let obj = value.as_object().unwrap();
        let mut keys: Vec<_> = obj.keys().map(String::as_str).collect();
        keys.sort_unstable();
        assert_eq!(
            keys,
            [
                "compressed_colors",
                "fps",
                "frame_groups",
                "frame_skip",
                "frame_start",
                "port",
                "speed_multiplier",
                "video_path",
                "video_streaming",
                "x_res",
                "y_res",
            ]
        );
    }

    #[test]
    fn partial_document_fills_defaults() {
        let cfg: StreamConfig = serde_json::from_str(r#"{"fps": 30, "port": 8080}"#).unwrap();
        assert_eq!(cfg.fps, 30);
        assert_eq!(cfg.port, 8080);
        assert_eq!(cfg.x_res, 400);
        assert_eq!(cfg.frame_groups, 1);
    }

    #[test]
    fn load_missing_file_returns_defaults() {
        let cfg = StreamConfig::load(Path::new("/nonexistent/framecast.json"));
        assert_eq!(cfg, StreamConfig::default());
    }

    #[test]
    fn save_then_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("framecast.json");
        let cfg = StreamConfig {
            fps: 16,
            compressed_colors: true,
            ..StreamConfig::default()
        };
        cfg.save(&path).unwrap();
        assert_eq!(StreamConfig::load(&path), cfg);
    }

    #[test]
    fn validate_rejects_bad_fields() {
        let mut cfg = StreamConfig::default();
        cfg.fps = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = StreamConfig::default();
        cfg.y_res = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = StreamConfig::default();
        cfg.frame_groups = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = StreamConfig::default();
        cfg.speed_multiplier = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = StreamConfig::default();
        cfg.video_streaming = true;
        assert!(cfg.validate().is_err());
        cfg.video_path = "clip.y4m".into();
        assert!(cfg.validate().is_ok());
    }
}
