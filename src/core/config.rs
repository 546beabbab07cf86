use std::{
    fs::File,
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use anyhow::{ensure, Context};
use log::{info, warn};
use serde::{Deserialize, Serialize};

use super::{folders::CONFIG_DIR, metrics::BlendShape};

const FILE_NAME: &str = "facelatch.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base URL of the actuator; `/colour` is appended.
    pub endpoint: Arc<str>,
    pub tracker_port: u16,
    pub ui_port: u16,
    pub frame_rate: u32,
    pub pull_interval_ms: u64,
    pub request_timeout_ms: u64,
    /// A tracker result older than this counts as no result.
    pub tracker_timeout_ms: u64,

    pub trigger_metrics: Vec<BlendShape>,
    pub threshold_lo: f32,
    pub threshold_hi: f32,
    pub smoothing: f32,

    pub commit_metric: BlendShape,
    pub commit_threshold: f32,

    pub speaking_metrics: [BlendShape; 2],
    pub speaking_threshold: f32,

    pub absence_timeout_ms: u64,
    pub idle_view: Arc<str>,
    /// Requested once when the latch fires; nothing happens when unset.
    pub completion_view: Option<Arc<str>>,

    pub forward_metrics: bool,
    pub reveal: RevealConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RevealConfig {
    pub delay_frames: u64,
    pub interval_frames: u64,
    pub spacing: i32,
    pub lines: Vec<RevealLine>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevealLine {
    pub text: String,
    pub x: i32,
    pub y: i32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoint: "http://172.20.10.4:3000".into(),
            tracker_port: 8888,
            ui_port: 9000,
            frame_rate: 60,
            pull_interval_ms: 50,
            request_timeout_ms: 1000,
            tracker_timeout_ms: 1000,
            trigger_metrics: vec![BlendShape::BrowOuterUpLeft, BlendShape::BrowOuterUpRight],
            threshold_lo: 0.1,
            threshold_hi: 0.9,
            smoothing: 0.1,
            commit_metric: BlendShape::JawOpen,
            commit_threshold: 0.4,
            speaking_metrics: [BlendShape::MouthUpperUpRight, BlendShape::MouthLowerDownLeft],
            speaking_threshold: 0.1,
            absence_timeout_ms: 30_000,
            idle_view: "index.html".into(),
            completion_view: None,
            forward_metrics: true,
            reveal: RevealConfig::default(),
        }
    }
}

impl Default for RevealConfig {
    fn default() -> Self {
        Self {
            delay_frames: 240,
            interval_frames: 5,
            spacing: 20,
            lines: vec![
                RevealLine {
                    text: "TO RECEIVE THE RGB VALUE".into(),
                    x: 40,
                    y: 60,
                },
                RevealLine {
                    text: "RAISE YOUR EYEBROWS".into(),
                    x: 40,
                    y: 80,
                },
            ],
        }
    }
}

impl Config {
    pub fn default_path() -> PathBuf {
        PathBuf::from(format!("{}/{}", CONFIG_DIR.as_ref(), FILE_NAME))
    }

    /// Reads the config file, falling back to defaults (and writing them out)
    /// when the file does not exist yet.
    pub fn load(path: &Path) -> anyhow::Result<Config> {
        let config = match File::open(path) {
            Ok(file) => serde_json::from_reader(file)
                .with_context(|| format!("Could not parse {}", path.display()))?,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!("No config at {}, using defaults", path.display());
                let config = Config::default();
                config.save(path);
                config
            }
            Err(e) => {
                return Err(e).with_context(|| format!("Could not open {}", path.display()));
            }
        };

        config.validate()?;
        Ok(config)
    }

    fn save(&self, path: &Path) {
        let result = File::create(path)
            .map_err(anyhow::Error::from)
            .and_then(|file| serde_json::to_writer_pretty(file, self).map_err(Into::into));
        if let Err(e) = result {
            warn!("Could not write default config to {}: {}", path.display(), e);
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        ensure!(
            self.smoothing > 0. && self.smoothing < 1.,
            "smoothing must be in (0, 1), got {}",
            self.smoothing
        );
        ensure!(
            self.threshold_lo < self.threshold_hi,
            "threshold_lo ({}) must be below threshold_hi ({})",
            self.threshold_lo,
            self.threshold_hi
        );
        ensure!(
            !self.trigger_metrics.is_empty(),
            "trigger_metrics must name at least one metric"
        );
        ensure!(self.frame_rate > 0, "frame_rate must be positive");
        ensure!(self.pull_interval_ms > 0, "pull_interval_ms must be positive");
        ensure!(
            self.reveal.interval_frames > 0,
            "reveal.interval_frames must be positive"
        );
        Ok(())
    }

    pub fn frame_period(&self) -> Duration {
        Duration::from_secs(1) / self.frame_rate
    }

    pub fn colour_url(&self) -> String {
        format!("{}/colour", self.endpoint.trim_end_matches('/'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.colour_url(), "http://172.20.10.4:3000/colour");
        assert_eq!(config.frame_period(), Duration::from_nanos(16_666_666));
    }

    #[test]
    fn partial_file_fills_defaults() {
        let config: Config = serde_json::from_str(
            r#"{ "endpoint": "http://localhost:3000/", "commit_metric": "mouthClose",
                 "reveal": { "delay_frames": 10 } }"#,
        )
        .unwrap();
        assert_eq!(config.colour_url(), "http://localhost:3000/colour");
        assert_eq!(config.commit_metric, BlendShape::MouthClose);
        assert_eq!(config.reveal.delay_frames, 10);
        assert_eq!(config.reveal.interval_frames, 5);
        assert_eq!(config.reveal.lines.len(), 2);
        assert_eq!(config.absence_timeout_ms, 30_000);
    }

    #[test]
    fn rejects_bad_values() {
        let config = Config {
            smoothing: 1.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = Config {
            threshold_lo: 0.9,
            threshold_hi: 0.1,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = Config {
            trigger_metrics: vec![],
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn unknown_metric_is_a_parse_error() {
        let parsed = serde_json::from_str::<Config>(r#"{ "commit_metric": "eyebrowUp" }"#);
        assert!(parsed.is_err());
    }

    #[test]
    fn missing_file_yields_defaults() {
        let path = std::env::temp_dir().join(format!("facelatch-test-{}.json", std::process::id()));
        let _ = std::fs::remove_file(&path);

        let config = Config::load(&path).unwrap();
        assert_eq!(config.tracker_port, 8888);
        assert!(path.exists());

        let reloaded = Config::load(&path).unwrap();
        assert_eq!(reloaded.idle_view, config.idle_view);
        let _ = std::fs::remove_file(&path);
    }
}
