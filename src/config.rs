//! Configuration for kokoro-say.
//!
//! Defaults can come from an optional YAML file. `KOKORO_URL` always wins
//! over the file for the server address, and command-line flags win over
//! both. Nothing is ever written back.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::voices::DEFAULT_VOICE;

pub const DEFAULT_SERVER_URL: &str = "http://localhost:8880";
pub const SERVER_URL_ENV: &str = "KOKORO_URL";
pub const MIN_SPEED: f32 = 0.5;
pub const MAX_SPEED: f32 = 2.0;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WebConfig {
    pub port: u16,
    pub open_browser: bool,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            port: 3456,
            open_browser: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server_url: String,
    pub voice: String,
    pub speed: f32,
    pub web: WebConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.into(),
            voice: DEFAULT_VOICE.into(),
            speed: 1.0,
            web: WebConfig::default(),
        }
    }
}

impl Config {
    /// Load defaults from YAML, then apply the `KOKORO_URL` override.
    ///
    /// Searches standard locations if no path is provided:
    /// 1. ./kokoro-say.yaml
    /// 2. ~/.config/kokoro-say/config.yaml
    pub fn load(path: Option<&Path>) -> Self {
        let mut config = Self::from_file(path);
        config.apply_server_override(std::env::var(SERVER_URL_ENV).ok());
        config
    }

    fn from_file(path: Option<&Path>) -> Self {
        let resolved = path.map(PathBuf::from).or_else(|| {
            let candidates = [
                std::env::current_dir().ok().map(|d| d.join("kokoro-say.yaml")),
                dirs::config_dir().map(|c| c.join("kokoro-say/config.yaml")),
            ];
            candidates.into_iter().flatten().find(|p| p.exists())
        });

        let Some(config_path) = resolved else {
            debug!("No config file found, using defaults");
            return Self::default();
        };

        match std::fs::read_to_string(&config_path) {
            Ok(contents) => match Self::parse(&contents) {
                Ok(config) => {
                    info!("Loaded config from {}", config_path.display());
                    config
                }
                Err(e) => {
                    warn!("Failed to parse {}: {e}, using defaults", config_path.display());
                    Self::default()
                }
            },
            Err(e) => {
                warn!("Failed to read {}: {e}, using defaults", config_path.display());
                Self::default()
            }
        }
    }

    fn parse(contents: &str) -> Result<Self, serde_yml::Error> {
        serde_yml::from_str(contents)
    }

    /// An empty override counts as unset.
    fn apply_server_override(&mut self, value: Option<String>) {
        if let Some(url) = value.filter(|u| !u.trim().is_empty()) {
            debug!("{SERVER_URL_ENV} override: {url}");
            self.server_url = url;
        }
    }
}

/// Check a speech speed against the range the server accepts.
pub fn validate_speed(speed: f32) -> Result<f32, String> {
    if speed.is_finite() && (MIN_SPEED..=MAX_SPEED).contains(&speed) {
        Ok(speed)
    } else {
        Err(format!("speed must be between {MIN_SPEED} and {MAX_SPEED}, got {speed}"))
    }
}
