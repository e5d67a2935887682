//! Configuration file parser for `reddit-rss.toml`.
//!
//! The config file is optional — a missing file yields `Config::default()`.
//! Unknown keys are accepted but logged as warnings. A handful of environment
//! variables override file values after loading (see [`Config::apply_env`]).
use secrecy::SecretString;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_CONFIG_PATH: &str = "reddit-rss.toml";

const ABOUT_URL: &str =
    "https://www.reddit.com/r/rss/comments/fvg3ed/i_built_a_better_rss_feed_for_reddit/";

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Config file too large: {0}")]
    TooLarge(String),

    #[error("Invalid config value for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

// ============================================================================
// Configuration Struct
// ============================================================================

/// Service configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
/// Custom Debug impl masks `reader_api_key`.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Socket address the HTTP server listens on.
    pub bind: String,

    /// Base URL listing requests are forwarded to.
    pub upstream_url: String,

    /// Link prefix that is rewritten onto `mirror_url` in item links.
    pub internal_url: String,

    /// Public base URL used for item, user and comments links.
    pub mirror_url: String,

    /// Redirect target for `/`, also used as the channel link.
    pub about_url: String,

    pub feed_description: String,
    pub author_name: String,
    pub author_email: String,

    /// User-Agent sent upstream.
    pub user_agent: String,

    /// Maximum number of article fetches run concurrently per batch.
    pub batch_capacity: usize,

    /// Per-article fetch timeout in seconds.
    pub fetch_timeout_secs: u64,

    /// Reader proxy base URL. Defaults to `https://r.jina.ai`.
    pub reader_url: Option<String>,

    /// Reader proxy API key (alternative to the JINA_API_KEY env var).
    pub reader_api_key: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8080".to_string(),
            upstream_url: "https://www.reddit.com".to_string(),
            internal_url: "https://old.reddit.com".to_string(),
            mirror_url: "https://old.reddit.com".to_string(),
            about_url: ABOUT_URL.to_string(),
            feed_description: "Reddit RSS feed that links directly to the content".to_string(),
            author_name: "Stephen Solka".to_string(),
            author_email: "stephen@solka.dev".to_string(),
            user_agent: "reddit-rss 1.0".to_string(),
            batch_capacity: 10,
            fetch_timeout_secs: 20,
            reader_url: None,
            reader_api_key: None,
        }
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("bind", &self.bind)
            .field("upstream_url", &self.upstream_url)
            .field("internal_url", &self.internal_url)
            .field("mirror_url", &self.mirror_url)
            .field("about_url", &self.about_url)
            .field("feed_description", &self.feed_description)
            .field("author_name", &self.author_name)
            .field("author_email", &self.author_email)
            .field("user_agent", &self.user_agent)
            .field("batch_capacity", &self.batch_capacity)
            .field("fetch_timeout_secs", &self.fetch_timeout_secs)
            .field("reader_url", &self.reader_url)
            .field(
                "reader_api_key",
                &self.reader_api_key.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}

impl Config {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    const KNOWN_KEYS: &'static [&'static str] = &[
        "bind",
        "upstream_url",
        "internal_url",
        "mirror_url",
        "about_url",
        "feed_description",
        "author_name",
        "author_email",
        "user_agent",
        "batch_capacity",
        "fetch_timeout_secs",
        "reader_url",
        "reader_api_key",
    ];

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Unknown keys → accepted, logged as warning
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        if content.trim().is_empty() {
            tracing::debug!(path = %path.display(), "Config file is empty, using defaults");
            return Ok(Self::default());
        }

        if let Ok(raw) = content.parse::<toml::Table>() {
            for key in raw.keys() {
                if !Self::KNOWN_KEYS.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        let config: Config = toml::from_str(&content)?;
        tracing::info!(path = %path.display(), upstream = %config.upstream_url, "Loaded configuration");
        Ok(config)
    }

    /// Applies environment overrides through `lookup`.
    ///
    /// - `REDDIT_URL` replaces `mirror_url`
    /// - `JINA_API_KEY` replaces `reader_api_key`
    /// - `PORT` rebinds to `0.0.0.0:<PORT>`
    ///
    /// Empty values are ignored.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(mirror) = get("REDDIT_URL") {
            self.mirror_url = mirror;
        }
        if let Some(key) = get("JINA_API_KEY") {
            self.reader_api_key = Some(key);
        }
        if let Some(port) = get("PORT") {
            self.bind = format!("0.0.0.0:{}", port.trim());
        }
    }

    /// Checks values serde cannot: URL shapes and numeric ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (key, value) in [
            ("upstream_url", &self.upstream_url),
            ("internal_url", &self.internal_url),
            ("mirror_url", &self.mirror_url),
            ("about_url", &self.about_url),
        ] {
            url::Url::parse(value).map_err(|e| ConfigError::Invalid {
                key,
                reason: format!("{value:?}: {e}"),
            })?;
        }
        if self.batch_capacity == 0 {
            return Err(ConfigError::Invalid {
                key: "batch_capacity",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.fetch_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                key: "fetch_timeout_secs",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn reader_api_key(&self) -> Option<SecretString> {
        self.reader_api_key.clone().map(SecretString::from)
    }
}

// ============================================================================
// Tests
// ============================================================================
