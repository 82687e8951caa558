//! At-most-one in-flight deployment per application identity.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use thiserror::Error;

use crate::types::AppName;

/// A second attempt targeted an identity that is already mid-deployment.
#[derive(Debug, Error)]
#[error("a deployment for {0} is already in progress")]
pub struct AlreadyInProgress(pub AppName);

/// Registry of application identities with a deployment in flight.
///
/// Attempts for distinct identities proceed concurrently. A second attempt
/// for the same identity is rejected rather than queued: a queued attempt
/// would publish a stale snapshot of the tree by the time it ran.
#[derive(Debug, Default, Clone)]
pub struct ActiveDeployments {
    inner: Arc<Mutex<HashSet<AppName>>>,
}

impl ActiveDeployments {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `app` for one attempt. The claim releases when the returned
    /// guard drops, panics included.
    pub fn begin(&self, app: &AppName) -> Result<DeployGuard, AlreadyInProgress> {
        let mut active = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if !active.insert(app.clone()) {
            return Err(AlreadyInProgress(app.clone()));
        }
        Ok(DeployGuard {
            registry: Arc::clone(&self.inner),
            app: app.clone(),
        })
    }
}

/// Releases the per-identity claim on drop.
#[derive(Debug)]
pub struct DeployGuard {
    registry: Arc<Mutex<HashSet<AppName>>>,
    app: AppName,
}

impl Drop for DeployGuard {
    fn drop(&mut self) {
        let mut active = self.registry.lock().unwrap_or_else(PoisonError::into_inner);
        active.remove(&self.app);
    }
}
