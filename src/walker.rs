//! Export tree enumeration
//!
//! The export tree is organized as channel directories containing per-day
//! message files. Both listings are sorted lexicographically by path so
//! that runs are reproducible; the ordering carries no other meaning.

use crate::error::{Error, Result};
use crate::types::{ChannelDirectory, DayFile};
use std::path::Path;
use tracing::debug;

/// List the channel directories directly under the export root
///
/// Only immediate subdirectories count as channels; the root itself and
/// any regular files beside the channel directories are ignored. An
/// unreadable export root is fatal for the whole run.
pub fn list_channels(export_root: &Path) -> Result<Vec<ChannelDirectory>> {
    debug!(?export_root, "listing channel directories");

    let entries = std::fs::read_dir(export_root).map_err(|e| Error::Discovery {
        path: export_root.to_path_buf(),
        source: e,
    })?;

    let mut channels = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| Error::Discovery {
            path: export_root.to_path_buf(),
            source: e,
        })?;
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }

        let name = entry.file_name().to_string_lossy().into_owned();
        channels.push(ChannelDirectory { path, name });
    }

    channels.sort_by(|a, b| a.path.cmp(&b.path));

    debug!(count = channels.len(), "found channel directories");
    Ok(channels)
}

/// List the day-files directly inside a channel directory
///
/// Only regular files are returned; the listing is non-recursive. An
/// unreadable channel directory is fatal for the whole run.
pub fn list_day_files(channel: &ChannelDirectory) -> Result<Vec<DayFile>> {
    debug!(channel = %channel.name, "listing day files");

    let entries = std::fs::read_dir(&channel.path).map_err(|e| Error::Discovery {
        path: channel.path.clone(),
        source: e,
    })?;

    let mut day_files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| Error::Discovery {
            path: channel.path.clone(),
            source: e,
        })?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }

        day_files.push(DayFile {
            path,
            channel: channel.name.clone(),
        });
    }

    day_files.sort_by(|a, b| a.path.cmp(&b.path));

    debug!(
        channel = %channel.name,
        count = day_files.len(),
        "found day files"
    );
    Ok(day_files)
}
