//! Minimal payload selection for the second phase of an incremental push.
//!
//! Phase 1 always sends the full manifest (paths, hashes, sizes) so the
//! controller can say which entries it is missing; phase 2 packs only those
//! entries' bytes. Hashes are cheap to transmit, unchanged file content is
//! not.

use std::collections::HashSet;

use super::ArchiveEntry;

/// Keep every directory entry, plus exactly the leaves whose path the
/// controller reported as missing or changed.
///
/// An empty selection (directories only, or nothing at all) is legitimate
/// and means there is nothing to upload.
pub fn select<'t>(
    entries: &[ArchiveEntry<'t>],
    changed: &HashSet<String>,
) -> Vec<ArchiveEntry<'t>> {
    entries
        .iter()
        .filter(|entry| entry.is_directory || changed.contains(&entry.path))
        .cloned()
        .collect()
}
