//! Configuration types for slack-export-dl

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Policy applied when an individual attachment cannot be retrieved
///
/// Parse errors and store write errors abort the run regardless of this
/// policy; it only governs per-attachment failures (non-success HTTP
/// status, missing download URL, network timeout).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Record the failure in the run summary and keep going (default)
    #[default]
    Continue,
    /// Terminate the run on the first failed attachment
    Abort,
}

/// Fetch behavior configuration (concurrency, timeout, failure handling)
///
/// Groups settings related to how attachments are retrieved over HTTP.
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Maximum in-flight attachment downloads (default: 4)
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_fetches: usize,

    /// Per-request timeout (default: 60 seconds)
    ///
    /// A timed-out request is treated as a per-attachment failure under
    /// [`FailurePolicy::Continue`], never as a process crash.
    #[serde(default = "default_request_timeout")]
    pub request_timeout: Duration,

    /// What to do when a single attachment fails to download
    #[serde(default)]
    pub failure_policy: FailurePolicy,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_concurrent_fetches: default_max_concurrent(),
            request_timeout: default_request_timeout(),
            failure_policy: FailurePolicy::default(),
        }
    }
}

/// Main configuration for the retrieval pipeline
///
/// The fetch sub-config is flattened for serialization, so the JSON/TOML
/// format stays un-nested.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Root of the already-extracted export tree (channel dirs → day files)
    #[serde(default = "default_export_root")]
    pub export_root: PathBuf,

    /// Local attachment store directory, created on first use
    /// (default: "./files")
    #[serde(default = "default_store_dir")]
    pub store_dir: PathBuf,

    /// Fetch behavior settings
    #[serde(flatten)]
    pub fetch: FetchConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            export_root: default_export_root(),
            store_dir: default_store_dir(),
            fetch: FetchConfig::default(),
        }
    }
}

impl Config {
    /// Check that the configuration can drive a run
    ///
    /// Called by the engine before any work starts, so a bad value fails
    /// the run up front instead of mid-retrieval.
    pub fn validate(&self) -> Result<()> {
        if self.fetch.max_concurrent_fetches == 0 {
            return Err(Error::Config {
                message: "max_concurrent_fetches must be at least 1".to_string(),
                key: Some("max_concurrent_fetches".to_string()),
            });
        }
        if self.fetch.request_timeout.is_zero() {
            return Err(Error::Config {
                message: "request_timeout must be non-zero".to_string(),
                key: Some("request_timeout".to_string()),
            });
        }
        Ok(())
    }
}

fn default_export_root() -> PathBuf {
    PathBuf::from("./export")
}

fn default_store_dir() -> PathBuf {
    PathBuf::from("./files")
}

fn default_max_concurrent() -> usize {
    4
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(60)
}
