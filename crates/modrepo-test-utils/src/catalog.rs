//! [`MemoryLoader`]: a catalog loader serving prepared repositories.

use std::collections::HashMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicUsize, Ordering};

use modrepo_model::Repository;
use modrepo_resolver::{CatalogError, CatalogLoader};

/// Catalog loader backed by a map from uri to repository.
///
/// Unknown uris fail with [`CatalogError::Parse`], standing in for a
/// catalog that could not be read.
#[derive(Default)]
pub struct MemoryLoader {
    catalogs: RwLock<HashMap<String, Repository>>,
    loads: AtomicUsize,
}

impl MemoryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `repository` at its own uri.
    pub fn with(self, repository: Repository) -> Self {
        self.publish(repository);
        self
    }

    /// Serve `repository`, replacing whatever was at its uri.
    pub fn publish(&self, repository: Repository) {
        self.catalogs
            .write()
            .unwrap()
            .insert(repository.uri().to_string(), repository);
    }

    /// Number of successful loads so far.
    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

impl CatalogLoader for MemoryLoader {
    fn load(&self, uri: &str) -> Result<Repository, CatalogError> {
        let repository = self
            .catalogs
            .read()
            .unwrap()
            .get(uri)
            .cloned()
            .ok_or_else(|| CatalogError::Parse {
                uri: uri.to_string(),
                reason: "no catalog at this uri".to_string(),
            })?;
        self.loads.fetch_add(1, Ordering::SeqCst);
        Ok(repository)
    }
}
