//! Directory presence checks used as idempotency gates.
//!
//! Presence only: a partially downloaded or corrupted directory counts as
//! populated just like a complete one.

use std::path::Path;

use tracing::debug;

/// Whether `path` is an existing directory containing at least one entry.
///
/// Unreadable paths are treated as absent.
pub fn is_populated(path: &Path) -> bool {
    let populated = std::fs::read_dir(path)
        .map(|mut entries| entries.next().is_some())
        .unwrap_or(false);
    debug!(path = %path.display(), populated, "Probed directory");
    populated
}
