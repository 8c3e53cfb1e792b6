//! Byte transport used to download tile assets.

use crate::{CacheError, Result};
use std::io::Read;
use std::time::Duration;

/// Opens a streaming reader over the body at `url`.
///
/// Implementations must report connection failures, timeouts and non-success
/// statuses as [`CacheError::Transport`].
pub trait Transport: Send + Sync {
    fn open(&self, url: &str) -> Result<Box<dyn Read + Send>>;
}

/// Blocking HTTP(S) transport.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::blocking::Client,
}

impl HttpTransport {
    /// Create a transport whose requests time out after `timeout`.
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("keyline-planner/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| CacheError::Transport {
                url: String::new(),
                reason: format!("cannot build HTTP client: {e}"),
            })?;
        Ok(Self { client })
    }
}

impl Transport for HttpTransport {
    fn open(&self, url: &str) -> Result<Box<dyn Read + Send>> {
        let response = self.client.get(url).send().map_err(|e| CacheError::Transport {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        if !response.status().is_success() {
            return Err(CacheError::Transport {
                url: url.to_string(),
                reason: format!("HTTP {}", response.status()),
            });
        }

        Ok(Box::new(response))
    }
}
