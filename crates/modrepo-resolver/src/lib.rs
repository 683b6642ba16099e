//! Resolution and deployment for the module repository.
//!
//! This crate turns "I want these resources" into "install these, in this
//! order":
//!
//! - [`RepositoryAdmin`] holds the catalog repositories and creates sessions
//! - [`Resolver`] computes the closure of a set of roots, collecting every
//!   unsatisfied requirement as a [`Reason`]
//! - the [`deployer`] plans installs and updates against the installed state
//!   and drives the [`Installer`]
//!
//! Catalog parsing and the platform itself sit behind the [`CatalogLoader`]
//! and [`Installer`] traits.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use modrepo_resolver::{CatalogLoader, DeployOptions, Installer, RepositoryAdmin};
//!
//! fn deploy_app(
//!     loader: Arc<dyn CatalogLoader>,
//!     installer: Arc<dyn Installer>,
//! ) -> modrepo_resolver::Result<()> {
//!     let admin = RepositoryAdmin::new(loader, installer);
//!     admin.add_repository("file:///srv/catalog/repository.toml")?;
//!
//!     let mut resolver = admin.resolver();
//!     for resource in admin.discover_resources("(symbolicname=org.example.app)")? {
//!         resolver.add(resource);
//!     }
//!     if resolver.resolve()? {
//!         resolver.deploy(DeployOptions::START)?;
//!     } else {
//!         for reason in resolver.unsatisfied_requirements() {
//!             eprintln!("{reason}");
//!         }
//!     }
//!     Ok(())
//! }
//! ```

pub mod admin;
pub mod catalog;
pub mod config;
pub mod deployer;
pub mod error;
pub mod graph;
pub mod installer;
pub mod interrupt;
pub mod logging;
pub mod resolver;
pub mod selector;

pub use admin::RepositoryAdmin;
pub use catalog::{CatalogError, CatalogLoader};
pub use config::{AdminConfig, DeploySettings, ResolverSettings};
pub use deployer::{
    DeployAction, DeployEntry, DeployOptions, DeployReport, DeployState, DeployStep, Deployer,
};
pub use error::{Error, Result};
pub use graph::{DependencyGraph, TopologicalOrder};
pub use installer::{Installer, InstallerError, InstallerResult};
pub use interrupt::InterruptHandle;
pub use resolver::{MandatoryPackages, Reason, ResolveOptions, Resolver, RootPolicy, Wire};
