use crate::defaults;
use crate::error::{IslError, Result};
use crate::tokenize::Language;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub catalog: CatalogConfig,
    pub service: ServiceConfig,
    pub playback: PlaybackConfig,
    pub player: PlayerConfig,
    pub input: InputConfig,
    pub queue: QueueConfig,
}

/// Clip catalog location
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CatalogConfig {
    pub path: PathBuf,
    pub clip_dir: PathBuf,
}

/// External parser and transcription services
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServiceConfig {
    pub parser_url: String,
    pub transcribe_url: String,
    #[serde(with = "duration_str")]
    pub timeout: Duration,
}

/// How the sequencer advances between clips
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Pacing {
    /// Advance as soon as the player reports the clip finished.
    #[default]
    Event,
    /// Sample the ready flag on a fixed timer.
    Poll,
}

impl Pacing {
    pub fn as_str(self) -> &'static str {
        match self {
            Pacing::Event => "event",
            Pacing::Poll => "poll",
        }
    }
}

/// Playback sequencing configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PlaybackConfig {
    pub pacing: Pacing,
    #[serde(with = "duration_str")]
    pub poll_interval: Duration,
    #[serde(with = "duration_str")]
    pub clip_timeout: Duration,
}

/// Avatar player selection
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum PlayerKind {
    #[default]
    Log,
    Command,
}

/// Avatar player configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PlayerConfig {
    pub kind: PlayerKind,
    /// Program invoked per clip when `kind = "command"`; the clip path is appended to `args`.
    pub command: Option<String>,
    pub args: Vec<String>,
    #[serde(with = "duration_str")]
    pub clip_duration: Duration,
}

/// Sentence input configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct InputConfig {
    pub language: Language,
    pub stop_phrase: String,
    #[serde(with = "duration_str")]
    pub chunk_interval: Duration,
    pub max_failures: u32,
}

/// Queue retention configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct QueueConfig {
    pub display_limit: usize,
    pub max_retained: usize,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(defaults::CATALOG_PATH),
            clip_dir: PathBuf::from(defaults::CLIP_DIR),
        }
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            parser_url: defaults::PARSER_URL.to_string(),
            transcribe_url: defaults::TRANSCRIBE_URL.to_string(),
            timeout: Duration::from_millis(defaults::SERVICE_TIMEOUT_MS),
        }
    }
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            pacing: Pacing::default(),
            poll_interval: Duration::from_millis(defaults::POLL_INTERVAL_MS),
            clip_timeout: Duration::from_millis(defaults::CLIP_TIMEOUT_MS),
        }
    }
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            kind: PlayerKind::default(),
            command: None,
            args: Vec::new(),
            clip_duration: Duration::from_millis(defaults::CLIP_DURATION_MS),
        }
    }
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            language: Language::default(),
            stop_phrase: defaults::STOP_PHRASE.to_string(),
            chunk_interval: Duration::from_millis(defaults::CHUNK_INTERVAL_MS),
            max_failures: defaults::MAX_CAPTURE_FAILURES,
        }
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            display_limit: defaults::QUEUE_DISPLAY_LIMIT,
            max_retained: defaults::QUEUE_MAX_RETAINED,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Missing fields use default values. The result is validated.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a file, or return defaults if the file doesn't exist.
    ///
    /// Invalid TOML is still an error.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        match Self::load(path) {
            Err(IslError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            other => other,
        }
    }

    /// Apply environment variable overrides
    ///
    /// Supported environment variables:
    /// - ISLPLAY_PARSER_URL → service.parser_url
    /// - ISLPLAY_TRANSCRIBE_URL → service.transcribe_url
    /// - ISLPLAY_CATALOG → catalog.path
    /// - ISLPLAY_LANGUAGE → input.language (unknown values are ignored)
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(url) = std::env::var("ISLPLAY_PARSER_URL")
            && !url.is_empty()
        {
            self.service.parser_url = url;
        }

        if let Ok(url) = std::env::var("ISLPLAY_TRANSCRIBE_URL")
            && !url.is_empty()
        {
            self.service.transcribe_url = url;
        }

        if let Ok(path) = std::env::var("ISLPLAY_CATALOG")
            && !path.is_empty()
        {
            self.catalog.path = PathBuf::from(path);
        }

        if let Ok(language) = std::env::var("ISLPLAY_LANGUAGE")
            && let Ok(language) = language.parse::<Language>()
        {
            self.input.language = language;
        }

        self
    }

    /// Check values that serde cannot reject on its own.
    pub fn validate(&self) -> Result<()> {
        if self.playback.poll_interval.is_zero() {
            return Err(IslError::ConfigInvalidValue {
                key: "playback.poll_interval".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }
        if self.playback.clip_timeout.is_zero() {
            return Err(IslError::ConfigInvalidValue {
                key: "playback.clip_timeout".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }
        if self.queue.display_limit == 0 {
            return Err(IslError::ConfigInvalidValue {
                key: "queue.display_limit".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }
        if self.queue.max_retained < self.queue.display_limit {
            return Err(IslError::ConfigInvalidValue {
                key: "queue.max_retained".to_string(),
                message: format!(
                    "must be at least queue.display_limit ({})",
                    self.queue.display_limit
                ),
            });
        }
        if self.player.kind == PlayerKind::Command
            && self.player.command.as_deref().is_none_or(str::is_empty)
        {
            return Err(IslError::ConfigInvalidValue {
                key: "player.command".to_string(),
                message: "required when player.kind = \"command\"".to_string(),
            });
        }
        Ok(())
    }

    /// Render the configuration as TOML.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| IslError::ConfigParse {
            message: e.to_string(),
        })
    }

    /// Get the default configuration file path
    ///
    /// Returns ~/.config/islplay/config.toml on Linux
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join("islplay")
            .join("config.toml")
    }
}

/// Durations are written as human-friendly strings ("3s", "500ms").
mod duration_str {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&humantime::format_duration(*value).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let raw = String::deserialize(deserializer)?;
        humantime::parse_duration(raw.trim()).map_err(serde::de::Error::custom)
    }
}
