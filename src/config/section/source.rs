//! `[source]` section configuration.
//!
//! Where events come from and how often to poll for them.
//!
//! # Example
//!
//! ```toml
//! [source]
//! base_uri = "http://localhost:8888"   # Prefix for feed and resource URLs
//! events = "events.jsonl"              # JSON-lines event log to harvest
//! seed = "dump.txt"                    # Initial listing, one resource id per line
//! poll_interval = 30                   # Seconds between harvest cycles
//! page_size = 1000                     # Events per harvested page
//! retry_attempts = 3                   # Attempts per failing fetch
//! retry_backoff_ms = 500               # First retry delay, doubled each time
//! ```

use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::super::util::non_zero;
use crate::config::{ConfigDiagnostics, FieldPath};
use crate::harvest::RetryPolicy;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub base_uri: String,
    pub events: PathBuf,
    pub seed: Option<PathBuf>,
    /// Seconds between harvest cycles.
    pub poll_interval: u64,
    pub page_size: usize,
    pub retry_attempts: u32,
    pub retry_backoff_ms: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_uri: "http://localhost:8888".into(),
            events: "events.jsonl".into(),
            seed: None,
            poll_interval: 30,
            page_size: 1000,
            retry_attempts: 3,
            retry_backoff_ms: 500,
        }
    }
}

impl SourceConfig {
    pub const BASE_URI: FieldPath = FieldPath::new("source.base_uri");
    pub const POLL_INTERVAL: FieldPath = FieldPath::new("source.poll_interval");
    pub const PAGE_SIZE: FieldPath = FieldPath::new("source.page_size");
    pub const RETRY_ATTEMPTS: FieldPath = FieldPath::new("source.retry_attempts");

    pub fn validate(&self, diag: &mut ConfigDiagnostics) {
        match url::Url::parse(&self.base_uri) {
            Ok(url) if url.has_host() => {}
            Ok(_) => diag.error_with_hint(
                Self::BASE_URI,
                format!("`{}` has no host", self.base_uri),
                "use an absolute URL like \"http://example.com/feed\"",
            ),
            Err(e) => diag.error_with_hint(
                Self::BASE_URI,
                format!("`{}` is not a valid URL: {e}", self.base_uri),
                "use an absolute URL like \"http://example.com/feed\"",
            ),
        }
        if self.poll_interval == 0 {
            diag.error(Self::POLL_INTERVAL, "must be at least 1 second");
        }
        if self.page_size == 0 {
            diag.error(Self::PAGE_SIZE, "must be greater than 0");
        }
        if self.retry_attempts == 0 {
            diag.error_with_hint(
                Self::RETRY_ATTEMPTS,
                "must be greater than 0",
                "1 means no retries",
            );
        }
    }

    pub fn page_size(&self) -> NonZeroUsize {
        non_zero(self.page_size)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            attempts: self.retry_attempts,
            backoff: Duration::from_millis(self.retry_backoff_ms),
        }
    }
}
