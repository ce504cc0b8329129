//! Local attachment store
//!
//! A deduplicating on-disk cache keyed by attachment id, then display
//! name: presence of `<store>/<id>/<name>` as a regular file means that
//! (id, name) pair has been durably retrieved. The store grows
//! monotonically and is never pruned by the pipeline.

use crate::error::{Error, Result};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

/// Counter for unique temp-file suffixes within one process
static TEMP_SEQ: AtomicU64 = AtomicU64::new(0);

/// Deduplicating, content-addressed-by-id attachment cache
#[derive(Clone, Debug)]
pub struct AttachmentStore {
    root: PathBuf,
}

impl AttachmentStore {
    /// Create a store rooted at `root`
    ///
    /// The directory is created lazily on the first write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The store's root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// True iff `<store>/<id>/<name>` exists as a regular file
    ///
    /// Ids or names that are not safe single path components can never
    /// have been written, so they report as absent.
    pub fn has(&self, id: &str, name: &str) -> bool {
        if !is_safe_component(id) || !is_safe_component(name) {
            return false;
        }
        self.root.join(id).join(name).is_file()
    }

    /// Write an attachment's bytes under `<store>/<id>/<name>`
    ///
    /// The payload lands in a uniquely-named temp file in the id directory
    /// and is renamed into place, so a repeated or concurrent write of the
    /// same (id, name) converges to a complete file: readers never observe
    /// a partially-written attachment.
    pub async fn write(&self, id: &str, name: &str, bytes: &[u8]) -> Result<()> {
        let final_path = self.entry_path(id, name)?;
        let id_dir = self.root.join(id);

        tokio::fs::create_dir_all(&id_dir)
            .await
            .map_err(|e| Error::StoreWrite {
                path: id_dir.clone(),
                reason: format!("failed to create id directory: {}", e),
            })?;

        let seq = TEMP_SEQ.fetch_add(1, Ordering::Relaxed);
        let temp_path = id_dir.join(format!(".{}.{}.part", std::process::id(), seq));

        tokio::fs::write(&temp_path, bytes)
            .await
            .map_err(|e| Error::StoreWrite {
                path: final_path.clone(),
                reason: format!("failed to write temp file: {}", e),
            })?;

        if let Err(e) = tokio::fs::rename(&temp_path, &final_path).await {
            // Best effort: don't leave the partial file behind.
            let _ = tokio::fs::remove_file(&temp_path).await;
            return Err(Error::StoreWrite {
                path: final_path,
                reason: format!("failed to move temp file into place: {}", e),
            });
        }

        debug!(id, name, bytes = bytes.len(), "attachment written to store");
        Ok(())
    }

    /// Resolve the on-disk path for an (id, name) pair, rejecting ids or
    /// names that would escape the store
    fn entry_path(&self, id: &str, name: &str) -> Result<PathBuf> {
        for (label, value) in [("id", id), ("name", name)] {
            if !is_safe_component(value) {
                return Err(Error::StoreWrite {
                    path: self.root.join(id).join(name),
                    reason: format!("attachment {} is not a safe path component: {:?}", label, value),
                });
            }
        }
        Ok(self.root.join(id).join(name))
    }
}

/// True if `value` is usable as a single path component under the store
fn is_safe_component(value: &str) -> bool {
    !value.is_empty()
        && value != "."
        && value != ".."
        && !value.contains('/')
        && !value.contains('\\')
        && !value.contains('\0')
}
