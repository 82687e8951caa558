//! Shared value objects describing one deployment attempt.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::resource::ResourceNode;

/// Identity of one deployable application.
///
/// The remote controller and the fingerprint cache both key on this name;
/// equality is by name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AppName(String);

impl AppName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AppName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AppName {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

/// What the orchestrator does once content has been pushed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeployMode {
    /// Push, stop/start, and wait for the app to report running.
    #[default]
    Start,
    /// Like `Start`, but request the controller's debug start variant.
    Debug,
    /// Upload content only; leave the app's run state alone.
    PushOnly,
}

/// Content handed to the orchestrator for one push.
#[derive(Debug)]
pub enum DeployPayload {
    /// Top-level nodes of a resource tree; archived incrementally with the
    /// two-phase manifest/partial-upload optimization.
    Tree(Vec<ResourceNode>),
    /// A ready-made archive file uploaded as-is, no incremental diffing.
    ArchiveFile(PathBuf),
}

/// Everything one deployment attempt needs, bundled up front.
///
/// Immutable once handed to the orchestrator.
#[derive(Debug)]
pub struct DeploymentDescriptor {
    pub app: AppName,
    pub memory_mb: u32,
    pub routes: Vec<String>,
    pub services: Vec<String>,
    pub start_command: Option<String>,
    pub mode: DeployMode,
    pub payload: DeployPayload,
}
