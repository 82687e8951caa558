//! Session-scoped content fingerprints keyed by application and path.
//!
//! Rehashing every file on every publish is the dominant cost of an
//! incremental deployment, so fingerprints computed once are kept for the
//! rest of the process session and reused across publish cycles.

use std::collections::HashMap;
use std::fmt;
use std::io::{self, Read};
use std::sync::{Mutex, PoisonError};

use crate::types::AppName;

/// Fingerprint width in bytes.
pub const CONTENT_HASH_LEN: usize = 20;

/// Fixed-size content fingerprint: the leading 20 bytes of a BLAKE3 digest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentHash([u8; CONTENT_HASH_LEN]);

impl ContentHash {
    /// Hash an entire byte stream, returning the fingerprint and the number
    /// of bytes consumed.
    pub fn from_reader(reader: &mut dyn Read) -> io::Result<(Self, u64)> {
        let mut hasher = blake3::Hasher::new();
        let mut buf = [0u8; 8192];
        let mut size = 0u64;
        loop {
            let n = reader.read(&mut buf)?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
            size += n as u64;
        }
        Ok((Self::from_digest(hasher.finalize()), size))
    }

    /// Hash a byte slice.
    pub fn of(bytes: &[u8]) -> Self {
        Self::from_digest(blake3::hash(bytes))
    }

    fn from_digest(digest: blake3::Hash) -> Self {
        let mut out = [0u8; CONTENT_HASH_LEN];
        out.copy_from_slice(&digest.as_bytes()[..CONTENT_HASH_LEN]);
        Self(out)
    }

    pub fn as_bytes(&self) -> &[u8; CONTENT_HASH_LEN] {
        &self.0
    }

    /// Lowercase hex form, 40 chars.
    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{b:02x}")).collect()
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// One cached fingerprint: relative path, content hash, byte length.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FingerprintEntry {
    pub path: String,
    pub hash: ContentHash,
    pub size: u64,
}

/// Process-session cache of leaf fingerprints, keyed by (application, path).
///
/// Latest write wins; entries never expire on their own. Staleness is
/// corrected by the caller's leaf policy forcing recalculation. Safe under
/// concurrent builds: all access goes through one map-level lock, and no
/// entry is ever partially visible.
///
/// There is no eviction. Entries are a path, 20 bytes of hash, and a size,
/// and the number of tracked files is bounded by what a developer deploys in
/// one session.
#[derive(Debug, Default)]
pub struct FingerprintCache {
    inner: Mutex<HashMap<AppName, HashMap<String, FingerprintEntry>>>,
}

impl FingerprintCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached fingerprint for `path` under `app`. Absence is a normal miss,
    /// not a failure.
    pub fn get(&self, app: &AppName, path: &str) -> Option<FingerprintEntry> {
        let inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner.get(app).and_then(|entries| entries.get(path)).cloned()
    }

    /// Record a fingerprint, replacing any previous entry for its path.
    pub fn put(&self, app: &AppName, entry: FingerprintEntry) {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner
            .entry(app.clone())
            .or_default()
            .insert(entry.path.clone(), entry);
    }

    /// Drop every fingerprint recorded for `app`, e.g. after the remote
    /// application was deleted.
    pub fn forget(&self, app: &AppName) {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner.remove(app);
    }
}
