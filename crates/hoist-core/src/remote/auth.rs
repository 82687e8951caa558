//! Re-authentication seam used by the resilient executor.

use super::RemoteError;

/// Re-establishes a controller session after an authentication rejection.
pub trait Authenticator: Send + Sync {
    fn reauthenticate(&self) -> Result<(), RemoteError>;
}

/// Authenticator for anonymous or pre-authorized gateways: always succeeds
/// without doing anything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopAuthenticator;

impl Authenticator for NoopAuthenticator {
    fn reauthenticate(&self) -> Result<(), RemoteError> {
        Ok(())
    }
}
