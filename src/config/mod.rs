//! Application configuration
//!
//! Settings live in a TOML file. Every field has a default, so a missing
//! file or a partial one is fine:
//!
//! ```toml
//! [channel]
//! url = "wss://voice.example.com/ws"
//!
//! [capture]
//! sample_rate = 16000
//! block_size = 4096
//!
//! [playback]
//! sample_rate = 40000
//! ```

pub mod credentials;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use url::Url;

use crate::constants::*;
use crate::error::{Error, Result};

pub use credentials::CredentialStore;

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "VOICE_LINK_CONFIG";

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub channel: ChannelConfig,
    pub capture: CaptureConfig,
    pub playback: PlaybackConfig,
}

/// Remote endpoint settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    /// `ws://` or `wss://` endpoint of the voice channel
    pub url: String,
    /// Outbound messages buffered before frames are dropped
    pub outbound_queue: usize,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_CHANNEL_URL.to_string(),
            outbound_queue: CHANNEL_QUEUE_CAPACITY,
        }
    }
}

impl ChannelConfig {
    /// Parse and check the endpoint URL
    pub fn endpoint(&self) -> Result<Url> {
        let url = Url::parse(&self.url)
            .map_err(|e| Error::Config(format!("invalid channel url {:?}: {}", self.url, e)))?;
        match url.scheme() {
            "ws" | "wss" => Ok(url),
            other => Err(Error::Config(format!(
                "channel url must use ws or wss, got {:?}",
                other
            ))),
        }
    }
}

/// Microphone settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Input device name; the default device when absent
    pub device: Option<String>,
    pub sample_rate: u32,
    /// Samples per outbound frame
    pub block_size: usize,
    /// Frames buffered between the capture thread and the session
    pub queue: usize,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            device: None,
            sample_rate: DEFAULT_CAPTURE_SAMPLE_RATE,
            block_size: DEFAULT_BLOCK_SIZE,
            queue: CAPTURE_QUEUE_CAPACITY,
        }
    }
}

/// Speaker settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Output device name; the default device when absent
    pub device: Option<String>,
    /// Rate the endpoint declares for synthesized audio
    pub sample_rate: u32,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            device: None,
            sample_rate: DEFAULT_PLAYBACK_SAMPLE_RATE,
        }
    }
}

impl AppConfig {
    /// Load from `path`, falling back to `$VOICE_LINK_CONFIG` and then the
    /// platform config directory. A missing file yields the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) => Some(path.to_path_buf()),
            None => std::env::var_os(CONFIG_ENV_VAR)
                .map(PathBuf::from)
                .or_else(default_config_path),
        };

        let config = match path {
            Some(path) if path.exists() => {
                tracing::debug!("Loading config from {}", path.display());
                let text = std::fs::read_to_string(&path)?;
                Self::from_toml(&text)?
            }
            _ => Self::default(),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| Error::Config(e.to_string()))
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))
    }

    /// Reject settings no session could run with
    pub fn validate(&self) -> Result<()> {
        self.channel.endpoint()?;

        if self.channel.outbound_queue == 0 {
            return Err(Error::Config("channel.outbound_queue must be positive".into()));
        }
        if self.capture.sample_rate == 0 {
            return Err(Error::Config("capture.sample_rate must be positive".into()));
        }
        if self.capture.block_size == 0 {
            return Err(Error::Config("capture.block_size must be positive".into()));
        }
        if self.capture.queue == 0 {
            return Err(Error::Config("capture.queue must be positive".into()));
        }
        if self.playback.sample_rate == 0 {
            return Err(Error::Config("playback.sample_rate must be positive".into()));
        }
        Ok(())
    }
}

pub(crate) fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("", "", "voice-link")
}

/// `config.toml` in the platform config directory
pub fn default_config_path() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.config_dir().join("config.toml"))
}
