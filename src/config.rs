//! Configuration types for mediaserver-mirror

use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};

/// Server mirrored when no other URL is given
pub const DEFAULT_SERVER_URL: &str = "https://enseignement.medias.polytechnique.fr";

/// File name of the response cache inside the output directory
pub const RESPONSE_CACHE_FILE: &str = "cache_msc.db";

/// File name of the completion cache inside the output directory
pub const COMPLETION_CACHE_FILE: &str = "already_dl_cache.db";

/// Persistent cache settings
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Response cache location (default: `<output_dir>/cache_msc.db`)
    #[serde(default)]
    pub response_cache_path: Option<PathBuf>,

    /// Completion cache location (default: `<output_dir>/already_dl_cache.db`)
    #[serde(default)]
    pub completion_cache_path: Option<PathBuf>,

    /// Disable every response cache hit for the lifetime of the process
    #[serde(default)]
    pub force_reload: bool,

    /// Keep an existing `data.json` snapshot instead of rewriting it
    #[serde(default)]
    pub reuse_snapshots: bool,

    /// Token appended as `_=<token>` to channel, media and annotation endpoints
    ///
    /// The token becomes part of the cache key, so changing it invalidates every
    /// cached listing at once. `None` leaves the parameter out.
    #[serde(default)]
    pub cache_buster: Option<String>,
}

/// Tree walk settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CrawlConfig {
    /// Slug of the collection that is never mirrored (default: "recycle-bin")
    #[serde(default = "default_recycle_bin_slug")]
    pub recycle_bin_slug: String,

    /// Maximum attachment transfers in flight for one item (default: 5)
    #[serde(default = "default_attachment_concurrency")]
    pub attachment_concurrency: usize,

    /// Formats requested from the media modes endpoint
    #[serde(default = "default_html5_formats")]
    pub html5_formats: String,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            recycle_bin_slug: default_recycle_bin_slug(),
            attachment_concurrency: default_attachment_concurrency(),
            html5_formats: default_html5_formats(),
        }
    }
}

/// Per-request timeouts
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TimeoutConfig {
    /// Timeout for API listing calls (default: 15 seconds)
    #[serde(default = "default_listing_timeout", with = "duration_serde")]
    pub listing: Duration,

    /// Timeout for media, thumbnail and attachment transfers (default: 5 minutes)
    #[serde(default = "default_transfer_timeout", with = "duration_serde")]
    pub transfer: Duration,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            listing: default_listing_timeout(),
            transfer: default_transfer_timeout(),
        }
    }
}

/// Retry configuration for transient failures
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of retry attempts after the first one (default: 5)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Initial delay before first retry (default: 10 seconds)
    #[serde(default = "default_initial_delay", with = "duration_serde")]
    pub initial_delay: Duration,

    /// Maximum delay between retries (default: 60 seconds)
    #[serde(default = "default_max_delay", with = "duration_serde")]
    pub max_delay: Duration,

    /// Multiplier applied to the delay after each retry (default: 1.0, a fixed delay)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Add random jitter to delays (default: false)
    #[serde(default)]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay: default_initial_delay(),
            max_delay: default_max_delay(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter: false,
        }
    }
}

impl RetryConfig {
    /// Policy used for attachments: fewer attempts, short exponential backoff with jitter
    pub fn attachments() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

/// Main configuration for [`Mirror`](crate::mirror::Mirror)
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Base URL of the media server
    #[serde(default = "default_server_url")]
    pub server_url: String,

    /// Client identifier sent with API calls
    #[serde(default = "default_client_id")]
    pub client_id: String,

    /// API key, never serialized
    #[serde(skip)]
    pub api_key: String,

    /// Root of the local mirror; must already exist
    pub output_dir: PathBuf,

    /// Persistent cache settings
    #[serde(default)]
    pub cache: CacheConfig,

    /// Tree walk settings
    #[serde(default)]
    pub crawl: CrawlConfig,

    /// Request timeouts
    #[serde(default)]
    pub timeouts: TimeoutConfig,

    /// Retry policy for primary media downloads
    #[serde(default)]
    pub primary_retry: RetryConfig,

    /// Retry policy for attachments
    #[serde(default = "RetryConfig::attachments")]
    pub attachment_retry: RetryConfig,
}

impl Config {
    /// Configuration with defaults for everything but the output directory and key
    pub fn new(output_dir: impl Into<PathBuf>, api_key: impl Into<String>) -> Self {
        Self {
            server_url: default_server_url(),
            client_id: default_client_id(),
            api_key: api_key.into(),
            output_dir: output_dir.into(),
            cache: CacheConfig::default(),
            crawl: CrawlConfig::default(),
            timeouts: TimeoutConfig::default(),
            primary_retry: RetryConfig::default(),
            attachment_retry: RetryConfig::attachments(),
        }
    }

    /// Resolved response cache location
    pub fn response_cache_path(&self) -> PathBuf {
        self.cache
            .response_cache_path
            .clone()
            .unwrap_or_else(|| self.output_dir.join(RESPONSE_CACHE_FILE))
    }

    /// Resolved completion cache location
    pub fn completion_cache_path(&self) -> PathBuf {
        self.cache
            .completion_cache_path
            .clone()
            .unwrap_or_else(|| self.output_dir.join(COMPLETION_CACHE_FILE))
    }

    /// Server URL without a trailing slash, used to prefix relative resource paths
    pub fn server_base(&self) -> &str {
        self.server_url.trim_end_matches('/')
    }

    /// Check the settings that must hold before any network activity
    pub fn validate(&self) -> crate::Result<()> {
        if !self.output_dir.is_dir() {
            return Err(crate::Error::config(
                "output_dir",
                format!("Path {} does not exist", self.output_dir.display()),
            ));
        }
        if self.api_key.trim().is_empty() {
            return Err(crate::Error::config("api_key", "an API key is required"));
        }
        if self.crawl.attachment_concurrency == 0 {
            return Err(crate::Error::config(
                "attachment_concurrency",
                "must be at least 1",
            ));
        }
        url::Url::parse(&self.server_url)
            .map_err(|e| crate::Error::config("server_url", e.to_string()))?;
        Ok(())
    }
}

fn default_server_url() -> String {
    DEFAULT_SERVER_URL.to_string()
}

fn default_client_id() -> String {
    "mediaserver-mirror".to_string()
}

fn default_recycle_bin_slug() -> String {
    "recycle-bin".to_string()
}

fn default_attachment_concurrency() -> usize {
    5
}

fn default_html5_formats() -> String {
    "webm_ogg_ogv_oga_mp4_m4a_mp3".to_string()
}

fn default_listing_timeout() -> Duration {
    Duration::from_secs(15)
}

fn default_transfer_timeout() -> Duration {
    Duration::from_secs(5 * 60)
}

fn default_max_attempts() -> u32 {
    5
}

fn default_initial_delay() -> Duration {
    Duration::from_secs(10)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(60)
}

fn default_backoff_multiplier() -> f64 {
    1.0
}

// Duration serialization helper
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn minimal_json_fills_defaults() {
        let config: Config = serde_json::from_str(r#"{"output_dir": "/srv/mirror"}"#)
            .expect("deserialize failed");

        assert_eq!(config.server_url, DEFAULT_SERVER_URL);
        assert_eq!(config.crawl.recycle_bin_slug, "recycle-bin");
        assert_eq!(config.crawl.attachment_concurrency, 5);
        assert_eq!(config.timeouts.listing, Duration::from_secs(15));
        assert_eq!(config.timeouts.transfer, Duration::from_secs(300));
        assert_eq!(config.primary_retry.backoff_multiplier, 1.0);
        assert!(!config.primary_retry.jitter);
        assert_eq!(config.attachment_retry.max_attempts, 3);
        assert!(config.cache.cache_buster.is_none());
        assert!(config.api_key.is_empty(), "api key is never deserialized");
    }

    #[test]
    fn api_key_is_not_serialized() {
        let config = Config::new("/srv/mirror", "secret-key");
        let json = serde_json::to_string(&config).expect("serialize failed");
        assert!(!json.contains("secret-key"));
    }

    #[test]
    fn cache_paths_default_into_output_dir() {
        let config = Config::new("/srv/mirror", "k");
        assert_eq!(
            config.response_cache_path(),
            PathBuf::from("/srv/mirror/cache_msc.db")
        );
        assert_eq!(
            config.completion_cache_path(),
            PathBuf::from("/srv/mirror/already_dl_cache.db")
        );
    }

    #[test]
    fn explicit_cache_paths_win() {
        let mut config = Config::new("/srv/mirror", "k");
        config.cache.response_cache_path = Some(PathBuf::from("/tmp/r.db"));
        assert_eq!(config.response_cache_path(), PathBuf::from("/tmp/r.db"));
    }

    #[test]
    fn validate_rejects_missing_output_dir() {
        let temp_dir = TempDir::new().unwrap();
        let config = Config::new(temp_dir.path().join("missing"), "k");
        match config.validate() {
            Err(crate::Error::Config { key, .. }) => assert_eq!(key.as_deref(), Some("output_dir")),
            other => panic!("expected Config error, got {other:?}"),
        }
    }

    #[test]
    fn validate_rejects_blank_api_key() {
        let temp_dir = TempDir::new().unwrap();
        let config = Config::new(temp_dir.path(), "   ");
        match config.validate() {
            Err(crate::Error::Config { key, .. }) => assert_eq!(key.as_deref(), Some("api_key")),
            other => panic!("expected Config error, got {other:?}"),
        }
    }

    #[test]
    fn validate_accepts_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config = Config::new(temp_dir.path(), "key");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn server_base_strips_trailing_slash() {
        let mut config = Config::new("/srv", "k");
        config.server_url = "https://media.example.com/".into();
        assert_eq!(config.server_base(), "https://media.example.com");
    }
}
