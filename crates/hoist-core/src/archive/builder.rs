//! Pre-order archive construction with fingerprint reuse.

use std::io;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use super::ArchiveEntry;
use crate::fingerprint::{ContentHash, FingerprintCache, FingerprintEntry};
use crate::resource::{Leaf, ResourceNode};
use crate::types::AppName;

/// Decides per leaf whether a cached fingerprint may be reused.
///
/// The builder never decides staleness itself; the caller knows which files
/// changed (or suspects all of them did) and encodes that here.
pub enum LeafPolicy<'a> {
    /// Trust every cached fingerprint.
    Reuse,
    /// Ignore the cache and rehash every leaf.
    RecalculateAll,
    /// Rehash leaves modified at or after this instant.
    ModifiedSince(DateTime<Utc>),
    /// Arbitrary predicate over (relative path, leaf): `true` forces a
    /// recalculation.
    Custom(&'a dyn Fn(&str, &Leaf) -> bool),
}

impl LeafPolicy<'_> {
    fn recalculate(&self, path: &str, leaf: &Leaf) -> bool {
        match self {
            Self::Reuse => false,
            Self::RecalculateAll => true,
            Self::ModifiedSince(instant) => leaf.modified >= *instant,
            Self::Custom(predicate) => predicate(path, leaf),
        }
    }
}

/// Counters from one build.
#[derive(Debug, Default, Clone, Copy)]
pub struct BuildStats {
    /// Leaves whose fingerprint came straight from the cache.
    pub reused: usize,
    /// Leaves that were read and hashed.
    pub hashed: usize,
    /// Leaves skipped because their byte source would not open.
    pub skipped: usize,
}

/// Entries plus counters from one build.
#[derive(Debug)]
pub struct ArchiveBuild<'t> {
    pub entries: Vec<ArchiveEntry<'t>>,
    pub stats: BuildStats,
}

/// Walks a resource tree into an ordered entry sequence, computing a content
/// hash and size for each leaf unless a cached value can be reused.
pub struct ArchiveBuilder {
    cache: Arc<FingerprintCache>,
}

impl ArchiveBuilder {
    pub fn new(cache: Arc<FingerprintCache>) -> Self {
        Self { cache }
    }

    /// Build entries for `app` from the tree's top-level `nodes`.
    ///
    /// Entries come out in pre-order: every directory precedes its
    /// descendants. A leaf whose byte source cannot be opened is skipped and
    /// logged; a single unreadable resource never fails the other entries.
    pub fn build<'t>(
        &self,
        app: &AppName,
        nodes: &'t [ResourceNode],
        policy: &LeafPolicy<'_>,
    ) -> ArchiveBuild<'t> {
        let mut entries = Vec::new();
        let mut stats = BuildStats::default();
        for node in nodes {
            self.visit(app, node, "", &mut entries, policy, &mut stats);
        }
        debug!(
            app = %app,
            reused = stats.reused,
            hashed = stats.hashed,
            skipped = stats.skipped,
            "archive build complete"
        );
        ArchiveBuild { entries, stats }
    }

    fn visit<'t>(
        &self,
        app: &AppName,
        node: &'t ResourceNode,
        prefix: &str,
        out: &mut Vec<ArchiveEntry<'t>>,
        policy: &LeafPolicy<'_>,
        stats: &mut BuildStats,
    ) {
        match node {
            ResourceNode::Container { name, children } => {
                let path = format!("{prefix}{name}/");
                out.push(ArchiveEntry::directory(path.clone()));
                for child in children {
                    self.visit(app, child, &path, out, policy, stats);
                }
            }
            ResourceNode::Leaf(leaf) => {
                let path = format!("{prefix}{}", leaf.name);
                match self.cache.get(app, &path) {
                    Some(cached) if !policy.recalculate(&path, leaf) => {
                        stats.reused += 1;
                        out.push(ArchiveEntry::file(
                            path,
                            cached.hash,
                            cached.size,
                            leaf.source.as_ref(),
                        ));
                    }
                    _ => match fingerprint_leaf(leaf) {
                        Ok((hash, size)) => {
                            self.cache.put(
                                app,
                                FingerprintEntry {
                                    path: path.clone(),
                                    hash,
                                    size,
                                },
                            );
                            stats.hashed += 1;
                            out.push(ArchiveEntry::file(path, hash, size, leaf.source.as_ref()));
                        }
                        Err(err) => {
                            stats.skipped += 1;
                            warn!(path = %path, error = %err, "skipping leaf with unreadable content");
                        }
                    },
                }
            }
        }
    }
}

fn fingerprint_leaf(leaf: &Leaf) -> io::Result<(ContentHash, u64)> {
    let mut reader = leaf.source.open()?;
    ContentHash::from_reader(reader.as_mut())
}
