//! Core types and events for slack-export-dl

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// One logical conversation inside the export tree
///
/// Produced by [`crate::walker::list_channels`]; never mutated, valid for
/// one pipeline run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelDirectory {
    /// Filesystem location of the channel directory
    pub path: PathBuf,
    /// Directory name, used as the channel's display name
    pub name: String,
}

/// One per-day message file inside a channel directory
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayFile {
    /// Filesystem location of the day-file
    pub path: PathBuf,
    /// Name of the owning channel
    pub channel: String,
}

/// An uploaded file referenced by a message record
///
/// `id` is the dedup key assigned by Slack; `name` is the on-disk leaf
/// filename under that id (not guaranteed unique across ids).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentDescriptor {
    /// Stable unique identifier assigned by Slack (e.g., "F024BE7LM")
    pub id: String,
    /// Display/file name
    pub name: String,
    /// Download URL, preferring the "download" variant over the "view"
    /// variant when both are present
    pub url: String,
}

/// A single attachment that could not be retrieved during a run
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedAttachment {
    /// Attachment id, when known ("unknown" for records where extraction
    /// failed before an id was read)
    pub id: String,
    /// Attachment display name, when known
    pub name: String,
    /// Channel the record was found in
    pub channel: String,
    /// Rendered error describing the failure
    pub error: String,
}

/// Counters and failure list for one retrieval run
///
/// Partial progress already written to the store is preserved even when a
/// run ends early, so a re-run resumes via the dedup check instead of
/// re-fetching everything.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RunSummary {
    /// Total attachment descriptors examined
    pub attempted: u64,
    /// Attachments fetched and written to the store during this run
    pub retrieved: u64,
    /// Attachments already present in the store (or already scheduled
    /// earlier in this run) and therefore not fetched
    pub skipped: u64,
    /// Per-attachment failures recorded under the `Continue` policy
    pub failed: Vec<FailedAttachment>,
    /// When the run started
    pub started_at: DateTime<Utc>,
    /// When the run finished (or was cancelled)
    pub finished_at: DateTime<Utc>,
}

impl RunSummary {
    pub(crate) fn new() -> Self {
        let now = Utc::now();
        Self {
            attempted: 0,
            retrieved: 0,
            skipped: 0,
            failed: Vec::new(),
            started_at: now,
            finished_at: now,
        }
    }
}

/// Progress events emitted by the retrieval engine
///
/// Consumers subscribe via [`crate::engine::RetrievalEngine::subscribe`];
/// events are dropped silently when nobody is listening.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A channel directory is being processed
    ChannelStarted {
        /// Channel name
        channel: String,
    },
    /// A day-file was scanned for attachment references
    DayFileScanned {
        /// Owning channel name
        channel: String,
        /// Day-file path
        path: PathBuf,
        /// Number of attachment descriptors extracted
        attachments: usize,
    },
    /// An attachment was already present in the store
    AttachmentSkipped {
        /// Attachment id
        id: String,
        /// Attachment display name
        name: String,
    },
    /// An attachment was fetched and written to the store
    AttachmentRetrieved {
        /// Attachment id
        id: String,
        /// Attachment display name
        name: String,
        /// Size of the retrieved payload
        bytes: u64,
    },
    /// An attachment could not be retrieved
    AttachmentFailed {
        /// Attachment id ("unknown" when extraction failed before one was read)
        id: String,
        /// Attachment display name
        name: String,
        /// Rendered error
        error: String,
    },
    /// The run finished or was cancelled
    ///
    /// Not emitted for aborted runs; those terminate with the error
    /// returned from the run itself.
    RunFinished {
        /// Final counters for the run
        summary: RunSummary,
    },
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_summary_starts_empty() {
        let summary = RunSummary::new();
        assert_eq!(summary.attempted, 0);
        assert_eq!(summary.retrieved, 0);
        assert_eq!(summary.skipped, 0);
        assert!(summary.failed.is_empty());
    }

    #[test]
    fn event_serializes_with_type_tag() {
        let event = Event::AttachmentRetrieved {
            id: "F1".into(),
            name: "cat.png".into(),
            bytes: 1024,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "attachment_retrieved");
        assert_eq!(json["id"], "F1");
        assert_eq!(json["bytes"], 1024);
    }

    #[test]
    fn run_summary_round_trips_through_json() {
        let mut summary = RunSummary::new();
        summary.attempted = 3;
        summary.retrieved = 2;
        summary.failed.push(FailedAttachment {
            id: "F9".into(),
            name: "doc.pdf".into(),
            channel: "general".into(),
            error: "download of https://x/doc.pdf failed with HTTP status 403".into(),
        });

        let json = serde_json::to_string(&summary).unwrap();
        let back: RunSummary = serde_json::from_str(&json).unwrap();
        assert_eq!(back.attempted, 3);
        assert_eq!(back.failed.len(), 1);
        assert_eq!(back.failed[0].id, "F9");
    }
}
