//! Attachment extraction from day-files
//!
//! A day-file holds an ordered JSON array of message records. Uploads are
//! referenced in two shapes: legacy `file_share` records carry a single
//! nested `file` object, newer records carry a `files` array. Both are
//! scanned; descriptor order matches record order.

use crate::error::{Error, Result};
use crate::types::{AttachmentDescriptor, DayFile};
use serde::Deserialize;
use tracing::{debug, warn};

/// Outcome of extracting one upload reference
///
/// A record with a file object but no usable download URL is surfaced as a
/// distinct per-record failure rather than silently skipped; the caller's
/// failure policy decides whether it aborts the run.
pub type ScanItem = std::result::Result<AttachmentDescriptor, Error>;

/// One message record, trimmed to the fields the scanner needs
#[derive(Debug, Deserialize)]
struct MessageRecord {
    #[serde(default)]
    subtype: Option<String>,
    #[serde(default)]
    ts: Option<String>,
    #[serde(default)]
    file: Option<FileObject>,
    #[serde(default)]
    files: Option<Vec<FileObject>>,
}

/// A file object as it appears inside a message record
#[derive(Debug, Deserialize)]
struct FileObject {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    url_private: Option<String>,
    #[serde(default)]
    url_private_download: Option<String>,
}

/// Parse a day-file and extract every upload reference, in record order
///
/// Unknown or malformed top-level content is a fatal parse error for the
/// file. Records that reference no uploads are ignored.
pub fn scan(day_file: &DayFile) -> Result<Vec<ScanItem>> {
    debug!(path = ?day_file.path, channel = %day_file.channel, "scanning day file");

    let content = std::fs::read(&day_file.path)?;
    let records: Vec<MessageRecord> =
        serde_json::from_slice(&content).map_err(|e| Error::Parse {
            path: day_file.path.clone(),
            reason: e.to_string(),
        })?;

    let mut items = Vec::new();
    for record in &records {
        let ts = record.ts.as_deref().unwrap_or("unknown");

        // Legacy file_share records carry a single nested file object and
        // take precedence over the files array (matching Slack's schema
        // evolution). Newer records carry only the files array.
        let candidates: &[FileObject] = if record.subtype.as_deref() == Some("file_share") {
            match &record.file {
                Some(file) => std::slice::from_ref(file),
                None => {
                    warn!(
                        ts,
                        path = ?day_file.path,
                        "file_share record has no file object, skipping"
                    );
                    continue;
                }
            }
        } else {
            match &record.files {
                Some(files) => files.as_slice(),
                None => continue,
            }
        };

        for file in candidates {
            let (Some(id), Some(name)) = (&file.id, &file.name) else {
                warn!(
                    ts,
                    path = ?day_file.path,
                    "file object is missing id or name, skipping"
                );
                continue;
            };

            // Prefer the download variant; fall back to the view variant.
            let url = file
                .url_private_download
                .as_ref()
                .or(file.url_private.as_ref());
            match url {
                Some(url) => items.push(Ok(AttachmentDescriptor {
                    id: id.clone(),
                    name: name.clone(),
                    url: url.clone(),
                })),
                None => items.push(Err(Error::AttachmentUrlMissing {
                    path: day_file.path.clone(),
                    ts: ts.to_string(),
                })),
            }
        }
    }

    debug!(
        path = ?day_file.path,
        extracted = items.len(),
        "day file scanned"
    );
    Ok(items)
}
