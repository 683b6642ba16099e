//! Boundary to the platform that installs and runs resources.
//!
//! The resolver never touches the platform directly. It reads installed
//! state through [`Installer::installed`] and the deployer drives the
//! side-effecting calls. Implementations decide how artifacts are fetched;
//! none of these calls are retried.

use std::sync::Arc;

use modrepo_model::{InstalledHandle, Resource};

/// Failure reported by an [`Installer`] call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct InstallerError {
    pub message: String,
}

impl InstallerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

pub type InstallerResult<T> = std::result::Result<T, InstallerError>;

/// Platform installer and source of local state.
pub trait Installer: Send + Sync {
    /// Snapshot of the currently installed resources.
    ///
    /// Every returned resource must be local (carry an [`InstalledHandle`]).
    fn installed(&self) -> Vec<Arc<Resource>>;

    /// Install a catalog resource, returning the new instance handle.
    fn install(&self, resource: &Resource) -> InstallerResult<InstalledHandle>;

    /// Replace the content of an installed instance with `resource`.
    fn update(&self, handle: &InstalledHandle, resource: &Resource) -> InstallerResult<()>;

    fn start(&self, handle: &InstalledHandle) -> InstallerResult<()>;

    fn stop(&self, handle: &InstalledHandle) -> InstallerResult<()>;
}
