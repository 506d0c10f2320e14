use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// How the bot acknowledges a detected link before converting it.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum NotifyMode {
    #[default]
    Reaction,
    Message,
}

impl std::fmt::Display for NotifyMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NotifyMode::Reaction => write!(f, "reaction"),
            NotifyMode::Message => write!(f, "message"),
        }
    }
}

impl FromStr for NotifyMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "reaction" => Ok(NotifyMode::Reaction),
            "message" => Ok(NotifyMode::Message),
            other => anyhow::bail!(
                "Unknown notify mode '{}', expected 'reaction' or 'message'",
                other
            ),
        }
    }
}

#[derive(Deserialize, Clone, Default)]
pub struct TelegramConfig {
    #[serde(default)]
    pub bot_token: String,
}

impl std::fmt::Debug for TelegramConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramConfig")
            .field("bot_token", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct PipelineConfig {
    /// Cap on in-flight conversions; `None` or 0 means unbounded.
    #[serde(default)]
    pub max_concurrent_runs: Option<usize>,
    #[serde(default = "default_download_timeout_secs")]
    pub download_timeout_secs: u64,
    #[serde(default = "default_convert_timeout_secs")]
    pub convert_timeout_secs: u64,
    #[serde(default = "default_upload_timeout_secs")]
    pub upload_timeout_secs: u64,
    #[serde(default = "default_ffmpeg_path")]
    pub ffmpeg_path: PathBuf,
    #[serde(default = "default_stale_file_secs")]
    pub stale_file_secs: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_concurrent_runs: None,
            download_timeout_secs: default_download_timeout_secs(),
            convert_timeout_secs: default_convert_timeout_secs(),
            upload_timeout_secs: default_upload_timeout_secs(),
            ffmpeg_path: default_ffmpeg_path(),
            stale_file_secs: default_stale_file_secs(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub notify_mode: NotifyMode,
    #[serde(default = "default_temp_dir")]
    pub temp_dir: PathBuf,
    #[serde(default)]
    pub debug: bool,
    #[serde(default)]
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            notify_mode: NotifyMode::default(),
            temp_dir: default_temp_dir(),
            debug: false,
            telegram: TelegramConfig::default(),
            pipeline: PipelineConfig::default(),
        }
    }
}

/// A directory of our own, so the stale-file sweep never looks at anyone else's files.
fn default_temp_dir() -> PathBuf {
    std::env::temp_dir().join(env!("CARGO_PKG_NAME"))
}

fn default_download_timeout_secs() -> u64 {
    300
}

fn default_convert_timeout_secs() -> u64 {
    900
}

fn default_upload_timeout_secs() -> u64 {
    300
}

fn default_ffmpeg_path() -> PathBuf {
    PathBuf::from("ffmpeg")
}

fn default_stale_file_secs() -> u64 {
    6 * 60 * 60
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "" | "0" | "false" | "no" | "off" => Ok(false),
        other => anyhow::bail!("Invalid boolean for {}: '{}'", key, other),
    }
}

fn parse_number<T>(key: &str, value: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value
        .trim()
        .parse()
        .with_context(|| format!("Invalid number for {}: '{}'", key, value))
}

impl Config {
    /// Build the configuration from environment variables alone.
    pub fn from_env() -> Result<Self> {
        Self::default()
            .with_overrides(|key| std::env::var(key).ok())?
            .finish()
    }

    /// Read a TOML config file; environment variables still take precedence.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        config
            .with_overrides(|key| std::env::var(key).ok())?
            .finish()
    }

    /// Apply `KEY=value` overrides from `lookup`.
    fn with_overrides<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(token) = lookup("TELEGRAM_BOT_TOKEN") {
            self.telegram.bot_token = token;
        }
        if let Some(mode) = lookup("NOTIFY_MODE") {
            self.notify_mode = mode.parse()?;
        }
        if let Some(dir) = lookup("TEMP_DIR") {
            self.temp_dir = PathBuf::from(dir);
        }
        if let Some(debug) = lookup("DEBUG") {
            self.debug = parse_bool("DEBUG", &debug)?;
        }
        if let Some(limit) = lookup("MAX_CONCURRENT_RUNS") {
            self.pipeline.max_concurrent_runs = Some(parse_number("MAX_CONCURRENT_RUNS", &limit)?);
        }
        if let Some(secs) = lookup("DOWNLOAD_TIMEOUT_SECS") {
            self.pipeline.download_timeout_secs = parse_number("DOWNLOAD_TIMEOUT_SECS", &secs)?;
        }
        if let Some(secs) = lookup("CONVERT_TIMEOUT_SECS") {
            self.pipeline.convert_timeout_secs = parse_number("CONVERT_TIMEOUT_SECS", &secs)?;
        }
        if let Some(secs) = lookup("UPLOAD_TIMEOUT_SECS") {
            self.pipeline.upload_timeout_secs = parse_number("UPLOAD_TIMEOUT_SECS", &secs)?;
        }
        if let Some(path) = lookup("FFMPEG_PATH") {
            self.pipeline.ffmpeg_path = PathBuf::from(path);
        }
        if let Some(secs) = lookup("STALE_FILE_SECS") {
            self.pipeline.stale_file_secs = parse_number("STALE_FILE_SECS", &secs)?;
        }
        Ok(self)
    }

    /// Validate the credential and make sure the temp directory exists.
    fn finish(mut self) -> Result<Self> {
        self.telegram.bot_token = self.telegram.bot_token.trim().to_string();
        if self.telegram.bot_token.is_empty() {
            anyhow::bail!("Telegram bot token is missing (set TELEGRAM_BOT_TOKEN)");
        }

        let expanded = shellexpand::tilde(&self.temp_dir.to_string_lossy()).into_owned();
        self.temp_dir = PathBuf::from(expanded);

        if !self.temp_dir.exists() {
            std::fs::create_dir_all(&self.temp_dir).with_context(|| {
                format!(
                    "Failed to create temp directory: {}",
                    self.temp_dir.display()
                )
            })?;
        }

        Ok(self)
    }

    /// Concurrency cap for pipeline runs, if any.
    pub fn run_limit(&self) -> Option<usize> {
        self.pipeline.max_concurrent_runs.filter(|n| *n > 0)
    }

    pub fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.pipeline.download_timeout_secs)
    }

    pub fn convert_timeout(&self) -> Duration {
        Duration::from_secs(self.pipeline.convert_timeout_secs)
    }

    pub fn upload_timeout(&self) -> Duration {
        Duration::from_secs(self.pipeline.upload_timeout_secs)
    }

    pub fn stale_file_age(&self) -> Duration {
        Duration::from_secs(self.pipeline.stale_file_secs)
    }
}
