//! Cache configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

/// Environment variable overriding the download timeout (seconds, float).
pub const DOWNLOAD_TIMEOUT_ENV: &str = "KEYLINE_DOWNLOAD_TIMEOUT";

/// Environment variable overriding the cache root.
pub const CACHE_DIR_ENV: &str = "KEYLINE_CACHE_DIR";

/// Download timeout used when none is configured.
pub const DEFAULT_DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(120);

/// Where the cache lives and how long a single download may take.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheConfig {
    /// Cache root; holds `raw/` and `derived/`.
    pub root: PathBuf,
    /// Timeout applied to each tile download.
    pub download_timeout: Duration,
}

impl CacheConfig {
    /// Configuration rooted at `root` with the default timeout.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            download_timeout: DEFAULT_DOWNLOAD_TIMEOUT,
        }
    }

    /// Builder-style timeout override.
    pub fn with_download_timeout(mut self, timeout: Duration) -> Self {
        self.download_timeout = timeout;
        self
    }

    /// Read `KEYLINE_CACHE_DIR` and `KEYLINE_DOWNLOAD_TIMEOUT`.
    pub fn from_env() -> Self {
        let root = std::env::var_os(CACHE_DIR_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(default_cache_root);
        let timeout = parse_download_timeout(std::env::var(DOWNLOAD_TIMEOUT_ENV).ok().as_deref());
        Self::new(root).with_download_timeout(timeout)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

/// `~/.cache/keyline-planner`, or a relative fallback when there is no home.
pub fn default_cache_root() -> PathBuf {
    dirs::home_dir()
        .map(|h| h.join(".cache").join("keyline-planner"))
        .unwrap_or_else(|| PathBuf::from(".cache/keyline-planner"))
}

/// Interpret a raw timeout setting.
///
/// Missing values give the default silently; unparsable or non-positive
/// values log a warning and give the default.
pub fn parse_download_timeout(raw: Option<&str>) -> Duration {
    let Some(raw) = raw else {
        return DEFAULT_DOWNLOAD_TIMEOUT;
    };
    let parsed = raw
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|secs| *secs > 0.0)
        .and_then(|secs| Duration::try_from_secs_f64(secs).ok());
    match parsed {
        Some(timeout) => timeout,
        None => {
            warn!(
                value = raw,
                default_secs = DEFAULT_DOWNLOAD_TIMEOUT.as_secs(),
                "Invalid {DOWNLOAD_TIMEOUT_ENV}, using default"
            );
            DEFAULT_DOWNLOAD_TIMEOUT
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_timeout_default_when_missing() {
        assert_eq!(parse_download_timeout(None), DEFAULT_DOWNLOAD_TIMEOUT);
    }

    #[test]
    fn test_timeout_parsed() {
        assert_eq!(parse_download_timeout(Some("30")), Duration::from_secs(30));
        assert_eq!(parse_download_timeout(Some(" 2.5 ")), Duration::from_millis(2500));
    }

    #[test]
    fn test_timeout_invalid_falls_back() {
        for raw in ["abc", "0", "-5", "", "inf", "NaN"] {
            assert_eq!(parse_download_timeout(Some(raw)), DEFAULT_DOWNLOAD_TIMEOUT, "{raw}");
        }
    }

    #[test]
    #[serial]
    fn test_from_env() {
        std::env::set_var(CACHE_DIR_ENV, "/tmp/keyline-test-cache");
        std::env::set_var(DOWNLOAD_TIMEOUT_ENV, "15");
        let config = CacheConfig::from_env();
        std::env::remove_var(CACHE_DIR_ENV);
        std::env::remove_var(DOWNLOAD_TIMEOUT_ENV);

        assert_eq!(config.root(), Path::new("/tmp/keyline-test-cache"));
        assert_eq!(config.download_timeout, Duration::from_secs(15));
    }

    #[test]
    #[serial]
    fn test_from_env_defaults() {
        std::env::remove_var(CACHE_DIR_ENV);
        std::env::remove_var(DOWNLOAD_TIMEOUT_ENV);
        let config = CacheConfig::from_env();
        assert!(config.root().ends_with("keyline-planner"));
        assert_eq!(config.download_timeout, DEFAULT_DOWNLOAD_TIMEOUT);
    }
}
