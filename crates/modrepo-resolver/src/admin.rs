//! Repository administration: the entry point callers hold on to.
//!
//! [`RepositoryAdmin`] owns the set of catalog repositories and hands out
//! [`Resolver`] sessions bound to a snapshot of it. The set is replaced
//! wholesale on every change, so a session or a discovery query sees either
//! the old set or the new one, never a mix.

use std::sync::{Arc, Mutex, PoisonError, RwLock};

use modrepo_model::{Filter, Repository, Requirement, Resource};

use crate::catalog::CatalogLoader;
use crate::config::AdminConfig;
use crate::deployer::DeployOptions;
use crate::error::Result;
use crate::installer::Installer;
use crate::resolver::{ResolveOptions, Resolver};

/// Manages catalog repositories and creates resolver sessions.
pub struct RepositoryAdmin {
    loader: Arc<dyn CatalogLoader>,
    installer: Arc<dyn Installer>,
    repositories: RwLock<Arc<Vec<Arc<Repository>>>>,
    /// Shared by every resolver this admin creates.
    deploy_lock: Arc<Mutex<()>>,
    resolve_options: ResolveOptions,
    deploy_options: DeployOptions,
}

impl RepositoryAdmin {
    /// Create an admin with no repositories and default options.
    pub fn new(loader: Arc<dyn CatalogLoader>, installer: Arc<dyn Installer>) -> Self {
        Self {
            loader,
            installer,
            repositories: RwLock::new(Arc::new(Vec::new())),
            deploy_lock: Arc::new(Mutex::new(())),
            resolve_options: ResolveOptions::default(),
            deploy_options: DeployOptions::empty(),
        }
    }

    /// Create an admin from configuration, loading every configured
    /// repository.
    ///
    /// # Errors
    ///
    /// Returns the first catalog that fails to load.
    pub fn with_config(
        config: &AdminConfig,
        loader: Arc<dyn CatalogLoader>,
        installer: Arc<dyn Installer>,
    ) -> Result<Self> {
        let mut admin = Self::new(loader, installer);
        admin.resolve_options = ResolveOptions::from(&config.resolver);
        admin.deploy_options = config.deploy.options();
        for uri in &config.repositories {
            admin.add_repository(uri)?;
        }
        Ok(admin)
    }

    /// Deployment options from configuration.
    ///
    /// These are advisory: [`Resolver::deploy`] uses only the options it is
    /// given, so callers that want the configured defaults pass these.
    pub fn deploy_options(&self) -> DeployOptions {
        self.deploy_options
    }

    /// Snapshot of the catalog repositories, in registration order.
    pub fn list_repositories(&self) -> Arc<Vec<Arc<Repository>>> {
        Arc::clone(&self.repositories.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Load the catalog at `uri` and register it.
    ///
    /// Adding a uri that is already registered reloads it in place.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Catalog`](crate::Error::Catalog) when the loader
    /// fails; the registered set is unchanged.
    pub fn add_repository(&self, uri: &str) -> Result<Arc<Repository>> {
        let repository = Arc::new(self.loader.load(uri)?);

        let mut guard = self
            .repositories
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let mut next: Vec<Arc<Repository>> = (**guard).clone();
        match next.iter().position(|existing| existing.uri() == uri) {
            Some(index) => next[index] = Arc::clone(&repository),
            None => next.push(Arc::clone(&repository)),
        }
        *guard = Arc::new(next);

        tracing::info!(uri, resources = repository.len(), "Added repository");
        Ok(repository)
    }

    /// Unregister the repository at `uri`. Returns whether it was present.
    pub fn remove_repository(&self, uri: &str) -> bool {
        let mut guard = self
            .repositories
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if !guard.iter().any(|repository| repository.uri() == uri) {
            return false;
        }
        let next: Vec<Arc<Repository>> = guard
            .iter()
            .filter(|repository| repository.uri() != uri)
            .cloned()
            .collect();
        *guard = Arc::new(next);
        tracing::info!(uri, "Removed repository");
        true
    }

    /// Repository of the currently installed resources, recomputed from the
    /// installer on every call.
    pub fn local_repository(&self) -> Repository {
        Repository::local(self.installer.installed())
    }

    /// Catalog resources whose properties match `filter`.
    ///
    /// Properties include `symbolicname`, `version`, `presentationname`,
    /// `uri` and `id`. Installed resources are not searched.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Model`](crate::Error::Model) for a malformed filter.
    pub fn discover_resources(&self, filter: &str) -> Result<Vec<Arc<Resource>>> {
        let filter = Filter::parse(filter)?;
        Ok(self.collect(|resource| filter.matches(&resource.property_map())))
    }

    /// Catalog resources that satisfy every one of `requirements`.
    pub fn discover_providers(&self, requirements: &[Requirement]) -> Vec<Arc<Resource>> {
        self.collect(|resource| requirements.iter().all(|req| resource.satisfies(req)))
    }

    /// Build a requirement from a filter string.
    pub fn requirement(&self, namespace: &str, filter: &str) -> Result<Requirement> {
        Ok(Requirement::parse(namespace, filter)?)
    }

    /// Start a resolver session over the current repository set and
    /// installed resources.
    pub fn resolver(&self) -> Resolver {
        Resolver::new(
            self.list_repositories(),
            Arc::new(self.local_repository()),
            Arc::clone(&self.installer),
            Arc::clone(&self.deploy_lock),
        )
        .with_options(self.resolve_options)
    }

    fn collect(&self, accept: impl Fn(&Resource) -> bool) -> Vec<Arc<Resource>> {
        let mut found: Vec<Arc<Resource>> = Vec::new();
        for repository in self.list_repositories().iter() {
            for resource in repository.resources() {
                if accept(&**resource) && !found.contains(resource) {
                    found.push(Arc::clone(resource));
                }
            }
        }
        found
    }
}
