//! Remote controller seam: error taxonomy, gateway trait, and the resilient
//! request executor.

mod auth;
mod executor;
mod http;

pub use auth::{Authenticator, NoopAuthenticator};
pub use executor::{RequestBudget, ResilientExecutor};
pub use http::{Credentials, HttpGateway};

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::AppName;

/// Everything that can go wrong talking to the controller.
///
/// Variants map one-to-one onto the remediations a caller can choose:
/// credential failures must never be retried by waiting, and a "not ready
/// yet" condition must never trigger a destructive re-login.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// The controller rejected the call as unauthenticated or forbidden.
    #[error("authentication rejected: {0}")]
    Auth(String),
    /// The target is mid-staging; retry after the given delay.
    #[error("application is staging")]
    Staging { retry_after: Duration },
    /// The target is in a temporarily disallowed operational state.
    #[error("transient application state: {state}")]
    TransientState {
        state: String,
        retry_after: Duration,
    },
    /// The target no longer exists remotely. Soft for callers that tolerate
    /// pre-emptive deletion, fatal otherwise.
    #[error("not found: {0}")]
    NotFound(String),
    /// The transport failed before a response was obtained.
    #[error("transport failure: {0}")]
    Transport(String),
    /// Malformed request or response, or an unrecoverable server error.
    #[error("fatal controller error: {0}")]
    Fatal(String),
    /// Caller-initiated abort.
    #[error("operation cancelled")]
    Cancelled,
    /// Retry budget exhausted without success; carries the last observed
    /// failure as cause.
    #[error("timed out after {after:?}")]
    Timeout {
        after: Duration,
        #[source]
        source: Box<RemoteError>,
    },
}

/// Remediation chosen by a classifier for one failed call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Remediation {
    /// Stop looping and propagate immediately.
    Fatal,
    /// Re-establish the session, then retry without a fixed delay.
    Reauthenticate,
    /// Sleep, deduct the delay from the budget, then retry.
    Backoff(Duration),
}

/// Default classification: auth failures re-authenticate, staging and other
/// transient states back off, everything else is fatal.
pub fn classify_default(err: &RemoteError) -> Remediation {
    match err {
        RemoteError::Auth(_) => Remediation::Reauthenticate,
        RemoteError::Staging { retry_after } => Remediation::Backoff(*retry_after),
        RemoteError::TransientState { retry_after, .. } => Remediation::Backoff(*retry_after),
        _ => Remediation::Fatal,
    }
}

/// Classification for operations that must not wait out a transient state:
/// deleting a resource mid-staging should fail, not stall.
pub fn classify_no_backoff(err: &RemoteError) -> Remediation {
    match err {
        RemoteError::Auth(_) => Remediation::Reauthenticate,
        _ => Remediation::Fatal,
    }
}

/// Coarse run state reported by the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppState {
    Stopped,
    Staging,
    Starting,
    Started,
    Crashed,
    Unknown,
}

impl AppState {
    pub fn is_running(self) -> bool {
        matches!(self, Self::Started)
    }
}

/// One application row from the controller's listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppSummary {
    pub name: String,
    pub state: AppState,
    pub memory_mb: u32,
    #[serde(default)]
    pub routes: Vec<String>,
}

/// Parameters for creating an application remotely.
#[derive(Debug, Clone, Serialize)]
pub struct CreateApplicationRequest {
    pub name: String,
    pub memory_mb: u32,
    pub routes: Vec<String>,
    pub services: Vec<String>,
    pub start_command: Option<String>,
}

/// One manifest row: relative path, hex fingerprint, byte length.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub path: String,
    pub hash: String,
    pub size: u64,
}

/// Which start variant the controller should use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartKind {
    Normal,
    Debug,
}

/// The single seam through which the engine issues remote operations.
///
/// Implementations map their transport's failures onto [`RemoteError`] with
/// enough structure for a classifier to tell authentication, transient-state
/// and fatal conditions apart.
pub trait ControllerGateway: Send + Sync {
    fn list_applications(&self) -> Result<Vec<AppSummary>, RemoteError>;

    fn create_application(&self, req: &CreateApplicationRequest) -> Result<(), RemoteError>;

    /// Send paths and fingerprints; the controller answers with the paths it
    /// is missing and therefore needs uploaded.
    fn upload_manifest(
        &self,
        app: &AppName,
        manifest: &[ManifestEntry],
    ) -> Result<Vec<String>, RemoteError>;

    fn upload_archive(&self, app: &AppName, archive: &[u8]) -> Result<(), RemoteError>;

    fn start_application(&self, app: &AppName, kind: StartKind) -> Result<(), RemoteError>;

    fn stop_application(&self, app: &AppName) -> Result<(), RemoteError>;

    fn application_state(&self, app: &AppName) -> Result<AppState, RemoteError>;

    fn delete_application(&self, app: &AppName) -> Result<(), RemoteError>;
}
