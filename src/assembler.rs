//! Output archive assembly
//!
//! Merges the original export tree and the local attachment store into a
//! single deflate-compressed zip. Export files keep their export-relative
//! paths; store files are placed under the fixed `__uploads/` prefix,
//! which can never collide with a real channel directory name. Both walks
//! are lexicographically sorted, so identical inputs produce an archive
//! with identical entry ordering.

use crate::error::{Error, Result};
use crate::store::AttachmentStore;
use std::path::{Component, Path};
use tracing::{debug, info};
use walkdir::WalkDir;
use zip::write::FileOptions;

/// Fixed top-level archive prefix for retrieved attachments
///
/// The double-underscore prefix is reserved by the export format and
/// never used for channel directories.
pub const UPLOADS_PREFIX: &str = "__uploads";

/// Merge the export tree and the attachment store into `output_path`
///
/// Every regular file under `export_root` lands at its export-relative
/// path; every regular file under the store lands at
/// `__uploads/<id>/<name>`. A stale `__uploads/` directory inside the
/// export tree (left by an older tool's staging step) is excluded so a
/// previous run's attachments can never leak into the output.
///
/// Must only run after all retrieval work for the run has completed.
pub fn assemble(export_root: &Path, store: &AttachmentStore, output_path: &Path) -> Result<()> {
    info!(?export_root, store = ?store.root(), ?output_path, "assembling output archive");

    let file = std::fs::File::create(output_path)?;
    let mut zip = zip::ZipWriter::new(file);
    let options = FileOptions::default().compression_method(zip::CompressionMethod::Deflated);

    let mut entries = 0usize;
    entries += add_tree(&mut zip, export_root, None, options)?;
    if store.root().is_dir() {
        entries += add_tree(&mut zip, store.root(), Some(UPLOADS_PREFIX), options)?;
    }

    zip.finish()?;
    info!(entries, ?output_path, "output archive written");
    Ok(())
}

/// Add every regular file under `root` to the archive, sorted, optionally
/// under a fixed prefix
fn add_tree(
    zip: &mut zip::ZipWriter<std::fs::File>,
    root: &Path,
    prefix: Option<&str>,
    options: FileOptions,
) -> Result<usize> {
    let mut added = 0usize;

    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.map_err(std::io::Error::from)?;
        if !entry.file_type().is_file() {
            continue;
        }

        let rel = entry
            .path()
            .strip_prefix(root)
            .map_err(|e| Error::Io(std::io::Error::other(e.to_string())))?;

        // A stale staging copy inside the export tree must not mix with
        // the store contents placed under the same prefix.
        if prefix.is_none() && first_component(rel) == Some(UPLOADS_PREFIX) {
            debug!(path = ?entry.path(), "skipping stale uploads directory in export tree");
            continue;
        }

        let mut name = entry_name(rel);
        if let Some(prefix) = prefix {
            name = format!("{}/{}", prefix, name);
        }

        debug!(entry = %name, "adding archive entry");
        zip.start_file(name, options)?;
        let mut source = std::fs::File::open(entry.path())?;
        std::io::copy(&mut source, zip)?;
        added += 1;
    }

    Ok(added)
}

/// First normal component of a relative path, as a str
fn first_component(rel: &Path) -> Option<&str> {
    match rel.components().next() {
        Some(Component::Normal(c)) => c.to_str(),
        _ => None,
    }
}

/// Archive entry name for a relative path (forward slashes on every platform)
fn entry_name(rel: &Path) -> String {
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}
