// Monitor configuration.
//
// Repository config: `<repo>/.evo/monitor.toml` (override with `EVO_DIGEST_CONFIG`).
// The webhook URL is a secret and only ever comes from the environment.

use chrono::{FixedOffset, NaiveTime};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use evo_digest_common::keywords::{default_keywords, default_url_markers};

/// Environment variable that overrides the config file location.
pub const CONFIG_PATH_ENV: &str = "EVO_DIGEST_CONFIG";
/// Environment variable holding the Discord webhook URL.
pub const WEBHOOK_ENV: &str = "DISCORD_WEBHOOK_URL";
/// Older name for the webhook variable, still honoured.
pub const LEGACY_WEBHOOK_ENV: &str = "WEBHOOK_URL";

const JST_OFFSET_HOURS: i32 = 9;

/// Path to the repository config file: `<root>/.evo/monitor.toml`.
pub fn repo_config_path(repo_root: &Path) -> PathBuf {
    repo_root.join(".evo").join("monitor.toml")
}

/// Config path honouring `EVO_DIGEST_CONFIG`. Relative overrides resolve
/// against the repository root.
pub fn resolve_config_path(repo_root: &Path) -> PathBuf {
    resolve_config_path_with(repo_root, |key| std::env::var(key).ok())
}

fn resolve_config_path_with(
    repo_root: &Path,
    lookup: impl Fn(&str) -> Option<String>,
) -> PathBuf {
    match lookup(CONFIG_PATH_ENV).filter(|v| !v.trim().is_empty()) {
        Some(raw) => {
            let path = PathBuf::from(raw.trim());
            if path.is_absolute() {
                path
            } else {
                repo_root.join(path)
            }
        }
        None => repo_config_path(repo_root),
    }
}

/// Webhook URL from the environment, preferring `DISCORD_WEBHOOK_URL`.
/// Blank values count as unset.
pub fn webhook_url_from_env() -> Option<String> {
    webhook_url_with(|key| std::env::var(key).ok())
}

pub fn webhook_url_with(lookup: impl Fn(&str) -> Option<String>) -> Option<String> {
    [WEBHOOK_ENV, LEGACY_WEBHOOK_ENV]
        .iter()
        .filter_map(|key| lookup(key))
        .map(|value| value.trim().to_string())
        .find(|value| !value.is_empty())
}

/// Offset of Japan Standard Time, which the disclosure sources run on.
pub fn jst() -> FixedOffset {
    FixedOffset::east_opt(JST_OFFSET_HOURS * 3600).expect("JST offset is in range")
}

// ── Monitor config ─────────────────────────────────────────────────

/// Top-level monitor configuration. Unknown keys, including a stray
/// `webhook_url`, are rejected.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default, deny_unknown_fields)]
pub struct MonitorConfig {
    pub sources: SourcesConfig,
    pub notify: NotifyConfig,
    pub digest: DigestConfig,
    pub git: GitConfig,
    pub schedule: ScheduleConfig,
}

impl MonitorConfig {
    /// Load the config for a repository. A missing file yields defaults; a
    /// file that exists but does not parse or validate is an error.
    pub fn load(repo_root: &Path) -> Result<Self, ConfigError> {
        let path = resolve_config_path(repo_root);
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::load_from(&path)
    }

    /// Load from a specific path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        let config: Self = toml::from_str(&contents).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    /// Save to a specific path (creates parent directories).
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(ConfigError::Io)?;
        }
        let contents = toml::to_string_pretty(self).map_err(ConfigError::Serialize)?;
        std::fs::write(path, contents).map_err(ConfigError::Io)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let s = &self.sources;
        if s.market_open_hour >= s.market_close_hour || s.market_close_hour > 24 {
            return Err(ConfigError::Invalid(format!(
                "market hours must satisfy open < close <= 24, got {}..{}",
                s.market_open_hour, s.market_close_hour
            )));
        }
        if s.keywords.iter().all(|k| k.trim().is_empty()) {
            return Err(ConfigError::Invalid("sources.keywords must not be empty".into()));
        }
        if !(-12..=14).contains(&self.digest.utc_offset_hours) {
            return Err(ConfigError::Invalid(format!(
                "digest.utc_offset_hours out of range: {}",
                self.digest.utc_offset_hours
            )));
        }
        if self.schedule.news_interval_min == 0 || self.schedule.tdnet_interval_min == 0 {
            return Err(ConfigError::Invalid("schedule intervals must be at least 1 minute".into()));
        }
        self.schedule.exercise_time()?;
        self.schedule.digest_time()?;
        Ok(())
    }
}

/// Scraped sources.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SourcesConfig {
    /// EVO Japan Securities news listing.
    pub evo_news_url: String,
    /// TDnet host; daily listings live under `/old/<YYYYMM>/<DD>/index.html`.
    pub tdnet_base_url: String,
    /// Title keywords for news items and exercise filings.
    pub keywords: Vec<String>,
    /// Case-insensitive URL fragments that flag a TDnet PDF.
    pub tdnet_url_markers: Vec<String>,
    /// TDnet scan window start (JST hour, inclusive).
    pub market_open_hour: u32,
    /// TDnet scan window end (JST hour, exclusive).
    pub market_close_hour: u32,
    /// Page fetch timeout in seconds.
    pub request_timeout_sec: u64,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            evo_news_url: "https://www.evofinancialgroup.com/ejs/news/".into(),
            tdnet_base_url: "https://release.tdnet.info".into(),
            keywords: default_keywords(),
            tdnet_url_markers: default_url_markers(),
            market_open_hour: 8,
            market_close_hour: 17,
            request_timeout_sec: 15,
        }
    }
}

/// Webhook delivery settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct NotifyConfig {
    /// The URL itself is read from `DISCORD_WEBHOOK_URL`, never from here.
    /// Post timeout in seconds.
    pub timeout_sec: u64,
    /// Post a short message when the long-running monitor starts.
    pub announce_start: bool,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self { timeout_sec: 10, announce_start: true }
    }
}

/// Digest composition and dedup state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DigestConfig {
    /// Dedup state file, relative to the repository root.
    pub state_file: String,
    /// UTC offset (hours) used to decide which calendar day a run belongs to.
    pub utc_offset_hours: i32,
}

impl Default for DigestConfig {
    fn default() -> Self {
        Self { state_file: ".evo_monitor_state.json".into(), utc_offset_hours: 0 }
    }
}

impl DigestConfig {
    pub fn offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.utc_offset_hours * 3600)
            .unwrap_or_else(|| FixedOffset::east_opt(0).expect("zero offset is valid"))
    }
}

/// Commit publishing settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GitConfig {
    /// Git remote name (defaults to `"origin"`).
    pub remote: String,
    /// Branch to push; `None` pushes the current branch upstream.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    /// Push after committing.
    pub push: bool,
}

impl Default for GitConfig {
    fn default() -> Self {
        Self { remote: "origin".into(), branch: None, push: true }
    }
}

/// Intervals for the long-running monitor. Clock times are JST.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ScheduleConfig {
    pub news_interval_min: u64,
    pub tdnet_interval_min: u64,
    /// Daily exercise check, `HH:MM` JST.
    pub exercise_at: String,
    /// Daily digest write + commit, `HH:MM` JST.
    pub digest_at: String,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            news_interval_min: 15,
            tdnet_interval_min: 5,
            exercise_at: "18:05".into(),
            digest_at: "18:30".into(),
        }
    }
}

impl ScheduleConfig {
    pub fn exercise_time(&self) -> Result<NaiveTime, ConfigError> {
        parse_clock("schedule.exercise_at", &self.exercise_at)
    }

    pub fn digest_time(&self) -> Result<NaiveTime, ConfigError> {
        parse_clock("schedule.digest_at", &self.digest_at)
    }
}

fn parse_clock(field: &str, raw: &str) -> Result<NaiveTime, ConfigError> {
    NaiveTime::parse_from_str(raw.trim(), "%H:%M")
        .map_err(|_| ConfigError::Invalid(format!("{field} must be HH:MM, got `{raw}`")))
}

// ── Errors ─────────────────────────────────────────────────────────

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Serialize(toml::ser::Error),
    Invalid(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "config I/O error: {e}"),
            Self::Parse(e) => write!(f, "config parse error: {e}"),
            Self::Serialize(e) => write!(f, "config serialize error: {e}"),
            Self::Invalid(msg) => write!(f, "invalid config: {msg}"),
        }
    }
}

impl std::error::Error for ConfigError {}
