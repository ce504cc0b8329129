//! Error types for slack-export-dl
//!
//! Every fatal condition carries enough context (channel, day-file path,
//! attachment id) to identify the offending record before the run
//! terminates. Per-attachment failures under the `Continue` policy are
//! collected into the run summary instead of being returned as errors;
//! see [`crate::types::RunSummary`].

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for slack-export-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for slack-export-dl
#[derive(Debug, Error)]
pub enum Error {
    /// Export root or a channel directory could not be enumerated.
    ///
    /// Always fatal for the whole run: no partial channel list is usable.
    #[error("discovery failed for {path}: {source}")]
    Discovery {
        /// The directory that could not be read
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// A day-file's content is not a well-formed message record sequence
    #[error("failed to parse day file {path}: {reason}")]
    Parse {
        /// The day-file that failed to parse
        path: PathBuf,
        /// The underlying JSON error, rendered
        reason: String,
    },

    /// A file_share record has a file object with neither
    /// `url_private_download` nor `url_private` set
    #[error("file_share record (ts {ts}) in {path} has no usable download URL")]
    AttachmentUrlMissing {
        /// The day-file containing the offending record
        path: PathBuf,
        /// The record's `ts` field, or "unknown" if absent
        ts: String,
    },

    /// The transport returned a non-success HTTP status for a download URL
    #[error("download of {url} failed with HTTP status {status}")]
    Retrieval {
        /// The URL that was fetched
        url: String,
        /// The HTTP status code returned
        status: u16,
    },

    /// A download URL could not be parsed or uses an unsupported scheme
    #[error("invalid download URL '{url}': {reason}")]
    InvalidUrl {
        /// The offending URL
        url: String,
        /// Why it was rejected
        reason: String,
    },

    /// Writing an attachment to the local store failed
    ///
    /// Always fatal: a store that cannot accept writes leaves no safe way
    /// to make progress.
    #[error("failed to write {path} to attachment store: {reason}")]
    StoreWrite {
        /// The store path that could not be written
        path: PathBuf,
        /// Why the write failed
        reason: String,
    },

    /// The Slack users.list response could not be used for email backfill
    ///
    /// Covers both an unparseable body and an `ok: false` response, which
    /// usually means the API token is not valid.
    #[error("users.list rejected: {reason}")]
    UserList {
        /// Why the response was unusable
        reason: String,
    },

    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "store_dir")
        key: Option<String>,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Network error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Output archive error
    #[error("archive error: {0}")]
    Zip(#[from] zip::result::ZipError),
}

impl Error {
    /// True if this error is recorded as a per-attachment failure under
    /// [`FailurePolicy::Continue`](crate::config::FailurePolicy::Continue)
    /// rather than aborting the run.
    ///
    /// Discovery, parse, store-write, and archive errors are always fatal.
    pub fn is_per_attachment(&self) -> bool {
        matches!(
            self,
            Error::Retrieval { .. }
                | Error::AttachmentUrlMissing { .. }
                | Error::InvalidUrl { .. }
                | Error::Network(_)
        )
    }
}
