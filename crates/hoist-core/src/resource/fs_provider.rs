//! Filesystem-backed resource provider.

use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::{DateTime, Utc};
use tracing::warn;

use super::{Leaf, LeafSource, ResourceNode, ResourceProvider};

/// Enumerates a local directory into a resource tree.
///
/// Children are sorted lexicographically by file name so repeated
/// enumerations of unchanged content yield identical trees.
#[derive(Debug, Clone)]
pub struct FsTreeProvider {
    root: PathBuf,
}

impl FsTreeProvider {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl ResourceProvider for FsTreeProvider {
    fn enumerate(&self) -> anyhow::Result<Vec<ResourceNode>> {
        read_children(&self.root)
    }
}

fn read_children(dir: &Path) -> anyhow::Result<Vec<ResourceNode>> {
    let entries = fs::read_dir(dir)
        .with_context(|| format!("Failed to read directory: {}", dir.display()))?;

    let mut sorted_entries: Vec<_> = entries
        .collect::<Result<Vec<_>, _>>()
        .with_context(|| format!("Failed to read directory entries: {}", dir.display()))?;
    sorted_entries.sort_by_key(|e| e.file_name());

    let mut nodes = Vec::with_capacity(sorted_entries.len());
    for entry in sorted_entries {
        let name = entry.file_name().to_string_lossy().into_owned();
        let path = entry.path();
        let ty = entry
            .file_type()
            .with_context(|| format!("Failed to stat file: {}", path.display()))?;

        if ty.is_dir() {
            nodes.push(ResourceNode::Container {
                name,
                children: read_children(&path)?,
            });
        } else if ty.is_file() {
            let modified = fs::metadata(&path)
                .and_then(|m| m.modified())
                .map(DateTime::<Utc>::from)
                .unwrap_or_else(|_| Utc::now());
            nodes.push(ResourceNode::Leaf(Leaf {
                name,
                modified,
                source: Box::new(FileSource { path }),
            }));
        } else {
            // Symlinks and specials are not deployable content.
            warn!(path = %path.display(), "skipping unsupported filesystem entry");
        }
    }

    Ok(nodes)
}

#[derive(Debug)]
struct FileSource {
    path: PathBuf,
}

impl LeafSource for FileSource {
    fn open(&self) -> io::Result<Box<dyn Read + '_>> {
        Ok(Box::new(File::open(&self.path)?))
    }
}
