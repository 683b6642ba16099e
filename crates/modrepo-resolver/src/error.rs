//! Error types for modrepo-resolver

use std::path::PathBuf;

use crate::catalog::CatalogError;
use crate::deployer::{DeployReport, DeployStep};

/// Result type for resolver operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while resolving or deploying
///
/// Unsatisfied requirements are not errors: they are reported through
/// [`Resolver::unsatisfied_requirements`](crate::Resolver::unsatisfied_requirements)
/// when `resolve()` returns `Ok(false)`.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Cancellation was observed during `resolve()`; the session holds no
    /// usable closure
    #[error("resolution was interrupted")]
    Interrupted,

    /// Operation not valid in the session's current state
    #[error("illegal state: {0}")]
    IllegalState(String),

    /// The installer failed at one step of a deployment
    ///
    /// Steps completed before the failure are not rolled back; `report`
    /// records them.
    #[error("{step} failed for {resource}: {reason}")]
    Deploy {
        resource: String,
        step: DeployStep,
        reason: String,
        report: Box<DeployReport>,
    },

    /// Configuration file not found
    #[error("configuration not found at {path}")]
    ConfigNotFound { path: PathBuf },

    /// Configuration file is not valid TOML for [`AdminConfig`](crate::AdminConfig)
    #[error("failed to parse configuration: {0}")]
    ConfigParse(#[from] toml::de::Error),

    // Transparent wrappers for underlying errors
    /// Model error (invalid filter syntax, invalid version)
    #[error(transparent)]
    Model(#[from] modrepo_model::Error),

    /// Catalog could not be loaded
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    /// Standard I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
