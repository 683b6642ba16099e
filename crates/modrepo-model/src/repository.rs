//! Repositories: ordered, immutable collections of resources.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::capability::Capability;
use crate::requirement::Requirement;
use crate::resource::Resource;

/// URI of the repository describing installed resources.
pub const LOCAL_URI: &str = "local";

/// A snapshot of a catalog (or of installed state).
///
/// Repositories are never patched in place; a refreshed catalog is a new
/// `Repository` value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Repository {
    uri: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    last_modified: DateTime<Utc>,
    #[serde(default)]
    resources: Vec<Arc<Resource>>,
}

impl Repository {
    pub fn new(uri: impl Into<String>, resources: Vec<Arc<Resource>>) -> Self {
        Self {
            uri: uri.into(),
            name: None,
            last_modified: Utc::now(),
            resources,
        }
    }

    /// The local repository over the given installed resources.
    pub fn local(resources: Vec<Arc<Resource>>) -> Self {
        Self::new(LOCAL_URI, resources)
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_last_modified(mut self, last_modified: DateTime<Utc>) -> Self {
        self.last_modified = last_modified;
        self
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn last_modified(&self) -> DateTime<Utc> {
        self.last_modified
    }

    pub fn resources(&self) -> &[Arc<Resource>] {
        &self.resources
    }

    pub fn is_local(&self) -> bool {
        self.uri == LOCAL_URI
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// Every `(resource, capability)` pair satisfying `requirement`, in
    /// declaration order.
    pub fn find<'a>(
        &'a self,
        requirement: &'a Requirement,
    ) -> impl Iterator<Item = (&'a Arc<Resource>, &'a Capability)> + 'a {
        self.resources.iter().flat_map(move |resource| {
            resource
                .capabilities()
                .iter()
                .filter(move |cap| requirement.is_satisfied(cap))
                .map(move |cap| (resource, cap))
        })
    }
}
