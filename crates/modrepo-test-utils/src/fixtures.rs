//! Builders for resources, capabilities and requirements used in tests.
//!
//! Versions and filters are given as strings and parsed eagerly; a typo in
//! a fixture panics at the call site.

use std::sync::Arc;

use modrepo_model::{
    Capability, Repository, Requirement, Resource, ResourceBuilder, Version, namespace,
};

/// Start a named resource at `version`.
pub fn resource(name: &str, version: &str) -> ResourceBuilder {
    Resource::builder()
        .symbolic_name(name)
        .version(Version::parse(version).unwrap())
}

/// Package capability exporting `package` at `version`.
pub fn export(package: &str, version: &str) -> Capability {
    Capability::new(namespace::PACKAGE)
        .with("package", package)
        .with("version", Version::parse(version).unwrap())
}

/// Mandatory requirement on `package`, any version.
pub fn import(package: &str) -> Requirement {
    Requirement::parse(namespace::PACKAGE, &format!("(package={package})")).unwrap()
}

/// Optional requirement on `package`, any version.
pub fn optional_import(package: &str) -> Requirement {
    import(package).with_optional(true)
}

/// Mandatory requirement on a resource by symbolic name.
pub fn require_bundle(name: &str) -> Requirement {
    Requirement::parse(namespace::BUNDLE, &format!("(symbolicname={name})")).unwrap()
}

/// A catalog at `uri` holding `resources` in the given order.
pub fn catalog(uri: &str, resources: Vec<Resource>) -> Repository {
    Repository::new(uri, resources.into_iter().map(Arc::new).collect())
}
