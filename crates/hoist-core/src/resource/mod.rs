//! Resource trees handed to the archive builder.
//!
//! A tree is an ordered hierarchy of containers and leaves; leaves carry a
//! byte source and a last-modified timestamp. Trees are immutable for the
//! duration of one archive build.

mod fs_provider;

pub use fs_provider::FsTreeProvider;

use std::fmt;
use std::io::{self, Cursor, Read};

use chrono::{DateTime, Utc};

/// One node of the tree being published.
#[derive(Debug)]
pub enum ResourceNode {
    /// Named container with ordered children.
    Container {
        name: String,
        children: Vec<ResourceNode>,
    },
    /// Named leaf with byte content.
    Leaf(Leaf),
}

impl ResourceNode {
    pub fn container(name: impl Into<String>, children: Vec<ResourceNode>) -> Self {
        Self::Container {
            name: name.into(),
            children,
        }
    }

    pub fn leaf(
        name: impl Into<String>,
        modified: DateTime<Utc>,
        source: Box<dyn LeafSource>,
    ) -> Self {
        Self::Leaf(Leaf {
            name: name.into(),
            modified,
            source,
        })
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Container { name, .. } => name,
            Self::Leaf(leaf) => &leaf.name,
        }
    }
}

/// A leaf resource: name, last-modified timestamp, and byte backing.
#[derive(Debug)]
pub struct Leaf {
    pub name: String,
    pub modified: DateTime<Utc>,
    pub source: Box<dyn LeafSource>,
}

/// Byte backing of a leaf.
///
/// `open` may legitimately fail: an external resource with no readable
/// backing is expected and the archive builder skips such leaves instead of
/// failing the build.
pub trait LeafSource: fmt::Debug + Send + Sync {
    fn open(&self) -> io::Result<Box<dyn Read + '_>>;
}

/// In-memory leaf backing, mainly for tests and synthetic trees.
#[derive(Debug, Clone)]
pub struct BytesSource(pub Vec<u8>);

impl LeafSource for BytesSource {
    fn open(&self) -> io::Result<Box<dyn Read + '_>> {
        Ok(Box::new(Cursor::new(self.0.as_slice())))
    }
}

/// Supplies the resource tree for one application.
///
/// Must be deterministic for unchanged content between calls within one
/// session: same content, same node order.
pub trait ResourceProvider {
    /// Enumerate the top-level nodes of the tree.
    fn enumerate(&self) -> anyhow::Result<Vec<ResourceNode>>;
}
