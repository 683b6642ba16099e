//! Boundary to the catalog loader.
//!
//! Fetching and parsing catalogs is the loader's business; the admin only
//! asks it for an immutable [`Repository`] snapshot per URI.

use modrepo_model::Repository;

/// Failure loading a catalog.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    /// The catalog could not be read.
    #[error("failed to read catalog {uri}: {source}")]
    Io {
        uri: String,
        #[source]
        source: std::io::Error,
    },

    /// The catalog was read but is not a valid repository description.
    #[error("failed to parse catalog {uri}: {reason}")]
    Parse { uri: String, reason: String },
}

/// Loads repository snapshots by URI.
pub trait CatalogLoader: Send + Sync {
    fn load(&self, uri: &str) -> Result<Repository, CatalogError>;
}
