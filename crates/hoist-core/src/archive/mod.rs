//! Ordered archive entries, incremental selection, and packaging.

mod builder;
mod packer;
mod selector;

pub use builder::{ArchiveBuild, ArchiveBuilder, BuildStats, LeafPolicy};
pub use packer::pack;
pub use selector::select;

use std::io::{self, Read};

use crate::fingerprint::ContentHash;
use crate::resource::LeafSource;

/// One file or directory record in the content tree being published.
///
/// `path` is slash-separated and unique within one archive; directory paths
/// carry a trailing slash. A directory entry always precedes the entries of
/// its descendants (pre-order), which downstream packaging relies on.
/// Directories never have a hash, size, or byte stream.
#[derive(Debug, Clone)]
pub struct ArchiveEntry<'t> {
    pub path: String,
    pub is_directory: bool,
    pub size: Option<u64>,
    pub hash: Option<ContentHash>,
    source: Option<&'t dyn LeafSource>,
}

impl<'t> ArchiveEntry<'t> {
    pub fn directory(path: String) -> Self {
        debug_assert!(path.ends_with('/'), "directory paths carry a trailing slash");
        Self {
            path,
            is_directory: true,
            size: None,
            hash: None,
            source: None,
        }
    }

    pub fn file(path: String, hash: ContentHash, size: u64, source: &'t dyn LeafSource) -> Self {
        Self {
            path,
            is_directory: false,
            size: Some(size),
            hash: Some(hash),
            source: Some(source),
        }
    }

    /// Re-open the underlying byte stream. `None` for directories.
    pub fn open(&self) -> Option<io::Result<Box<dyn Read + 't>>> {
        self.source.map(|source| source.open())
    }
}
