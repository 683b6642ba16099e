//! Resources: named, versioned units of deployment.
//!
//! A [`Resource`] is either a catalog entry (remote) or a view of an
//! installed instance (local), distinguished by whether it carries an
//! [`InstalledHandle`]. Identity is `(symbolic_name, version)`: two resources
//! with the same name and version are equal no matter where they came from.
//! Resources without a symbolic name are only equal to themselves.

use std::fmt;
use std::hash::{Hash, Hasher};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::attr::{AttrValue, Attributes};
use crate::capability::{Capability, namespace};
use crate::requirement::Requirement;
use crate::version::Version;

/// Property holding the catalog's last-modified timestamp (epoch millis).
pub const PROP_LAST_MODIFIED: &str = "lastmodified";

/// Property naming the host of a fragment resource.
pub const PROP_FRAGMENT_HOST: &str = "fragment-host";

/// Lifecycle state of an installed instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstanceState {
    Installed,
    Resolved,
    Active,
}

impl InstanceState {
    pub fn is_running(self) -> bool {
        matches!(self, InstanceState::Active)
    }
}

/// Binding of a local resource to a live installed instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstalledHandle {
    /// Installer-assigned instance id.
    pub id: u64,
    /// Location the instance was installed from.
    pub location: String,
    pub state: InstanceState,
    pub last_modified: DateTime<Utc>,
}

/// A versioned unit of deployment exposing capabilities and requirements.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "ResourceDef")]
pub struct Resource {
    id: String,
    symbolic_name: Option<String>,
    version: Version,
    presentation_name: Option<String>,
    uri: Option<String>,
    capabilities: Vec<Capability>,
    requirements: Vec<Requirement>,
    properties: Attributes,
    #[serde(skip)]
    installed: Option<InstalledHandle>,
}

/// Wire shape of a resource; deserialization goes through the builder so
/// the identity capability is always present.
#[derive(Deserialize)]
struct ResourceDef {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    symbolic_name: Option<String>,
    #[serde(default)]
    version: Version,
    #[serde(default)]
    presentation_name: Option<String>,
    #[serde(default)]
    uri: Option<String>,
    #[serde(default)]
    capabilities: Vec<Capability>,
    #[serde(default)]
    requirements: Vec<Requirement>,
    #[serde(default)]
    properties: Attributes,
}

impl From<ResourceDef> for Resource {
    fn from(def: ResourceDef) -> Self {
        ResourceBuilder {
            id: def.id,
            symbolic_name: def.symbolic_name,
            version: def.version,
            presentation_name: def.presentation_name,
            uri: def.uri,
            capabilities: def.capabilities,
            requirements: def.requirements,
            properties: def.properties,
            installed: None,
        }
        .build()
    }
}

impl Resource {
    /// Start building a resource.
    pub fn builder() -> ResourceBuilder {
        ResourceBuilder::default()
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn symbolic_name(&self) -> Option<&str> {
        self.symbolic_name.as_deref()
    }

    pub fn version(&self) -> &Version {
        &self.version
    }

    pub fn presentation_name(&self) -> Option<&str> {
        self.presentation_name.as_deref()
    }

    pub fn uri(&self) -> Option<&str> {
        self.uri.as_deref()
    }

    pub fn capabilities(&self) -> &[Capability] {
        &self.capabilities
    }

    pub fn requirements(&self) -> &[Requirement] {
        &self.requirements
    }

    pub fn properties(&self) -> &Attributes {
        &self.properties
    }

    /// Bind a resource snapshot to an installed instance.
    ///
    /// Identity fields come from `snapshot` as-is; the uri falls back to the
    /// handle's location.
    pub fn local(handle: InstalledHandle, snapshot: Resource) -> Resource {
        let mut resource = snapshot;
        if resource.uri.is_none() {
            resource.uri = Some(handle.location.clone());
        }
        resource.installed = Some(handle);
        resource
    }

    /// The installed instance backing this resource, for local resources.
    pub fn installed(&self) -> Option<&InstalledHandle> {
        self.installed.as_ref()
    }

    pub fn is_local(&self) -> bool {
        self.installed.is_some()
    }

    /// Fragments attach to a host and are never started on their own.
    pub fn is_fragment(&self) -> bool {
        self.properties.contains_key(PROP_FRAGMENT_HOST)
    }

    /// When this resource's content last changed.
    ///
    /// Local resources report their installed instance's timestamp; catalog
    /// resources report the `lastmodified` property, if declared.
    pub fn last_modified(&self) -> Option<DateTime<Utc>> {
        if let Some(handle) = &self.installed {
            return Some(handle.last_modified);
        }
        self.properties
            .get(PROP_LAST_MODIFIED)
            .and_then(AttrValue::as_long)
            .and_then(DateTime::from_timestamp_millis)
    }

    /// First capability satisfying `requirement`.
    pub fn matching_capability(&self, requirement: &Requirement) -> Option<&Capability> {
        self.capabilities.iter().find(|cap| requirement.is_satisfied(cap))
    }

    pub fn satisfies(&self, requirement: &Requirement) -> bool {
        self.matching_capability(requirement).is_some()
    }

    /// Flattened properties used for discovery queries.
    ///
    /// Contains `id`, `symbolicname`, `version`, `presentationname` and
    /// `uri` alongside every declared property.
    pub fn property_map(&self) -> Attributes {
        let mut map = self.properties.clone();
        map.insert("id".into(), self.id.clone().into());
        map.insert("version".into(), self.version.clone().into());
        if let Some(name) = &self.symbolic_name {
            map.insert("symbolicname".into(), name.clone().into());
        }
        if let Some(name) = &self.presentation_name {
            map.insert("presentationname".into(), name.clone().into());
        }
        if let Some(uri) = &self.uri {
            map.insert("uri".into(), uri.clone().into());
        }
        map
    }
}

impl PartialEq for Resource {
    fn eq(&self, other: &Self) -> bool {
        match (&self.symbolic_name, &other.symbolic_name) {
            (Some(a), Some(b)) => a == b && self.version == other.version,
            _ => std::ptr::eq(self, other),
        }
    }
}

impl Eq for Resource {}

impl Hash for Resource {
    fn hash<H: Hasher>(&self, state: &mut H) {
        // Anonymous resources all share one bucket; equality sorts them out.
        if let Some(name) = &self.symbolic_name {
            name.hash(state);
            self.version.hash(state);
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.symbolic_name {
            Some(name) => write!(f, "{name} ({})", self.version),
            None if self.id.is_empty() => f.write_str("<anonymous>"),
            None => write!(f, "<{}>", self.id),
        }
    }
}

/// Builder for [`Resource`].
#[derive(Debug, Clone, Default)]
pub struct ResourceBuilder {
    id: Option<String>,
    symbolic_name: Option<String>,
    version: Version,
    presentation_name: Option<String>,
    uri: Option<String>,
    capabilities: Vec<Capability>,
    requirements: Vec<Requirement>,
    properties: Attributes,
    installed: Option<InstalledHandle>,
}

impl ResourceBuilder {
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn symbolic_name(mut self, name: impl Into<String>) -> Self {
        self.symbolic_name = Some(name.into());
        self
    }

    pub fn version(mut self, version: Version) -> Self {
        self.version = version;
        self
    }

    pub fn presentation_name(mut self, name: impl Into<String>) -> Self {
        self.presentation_name = Some(name.into());
        self
    }

    pub fn uri(mut self, uri: impl Into<String>) -> Self {
        self.uri = Some(uri.into());
        self
    }

    pub fn capability(mut self, capability: Capability) -> Self {
        self.capabilities.push(capability);
        self
    }

    pub fn requirement(mut self, requirement: Requirement) -> Self {
        self.requirements.push(requirement);
        self
    }

    pub fn property(mut self, key: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Bind the resource to an installed instance, making it local.
    pub fn installed(mut self, handle: InstalledHandle) -> Self {
        self.installed = Some(handle);
        self
    }

    /// Finish the resource.
    ///
    /// Named resources get an implicit `bundle` capability carrying their
    /// identity unless one was declared explicitly.
    pub fn build(self) -> Resource {
        let mut capabilities = self.capabilities;
        if let Some(name) = &self.symbolic_name {
            let has_identity = capabilities
                .iter()
                .any(|cap| cap.namespace() == namespace::BUNDLE);
            if !has_identity {
                let mut identity = Capability::new(namespace::BUNDLE)
                    .with("symbolicname", name.as_str())
                    .with("version", self.version.clone());
                if let Some(presentation) = &self.presentation_name {
                    identity = identity.with("presentationname", presentation.as_str());
                }
                capabilities.insert(0, identity);
            }
        }

        let id = self.id.unwrap_or_else(|| match &self.symbolic_name {
            Some(name) => format!("{name}/{}", self.version),
            None => String::new(),
        });
        let uri = self
            .uri
            .or_else(|| self.installed.as_ref().map(|h| h.location.clone()));

        Resource {
            id,
            symbolic_name: self.symbolic_name,
            version: self.version,
            presentation_name: self.presentation_name,
            uri,
            capabilities,
            requirements: self.requirements,
            properties: self.properties,
            installed: self.installed,
        }
    }
}
