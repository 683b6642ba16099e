//! Value model for the module repository.
//!
//! This crate provides the leaf types the resolver works with:
//!
//! - [`Version`] and [`VersionRange`]
//! - [`AttrValue`] attribute maps and the LDAP-style [`Filter`] over them
//! - [`Capability`] and [`Requirement`]
//! - [`Resource`] (catalog or installed) and [`Repository`]
//!
//! All values are immutable once built; repositories hold resources behind
//! `Arc` so resolution results can share them.

pub mod attr;
pub mod capability;
pub mod error;
pub mod filter;
pub mod repository;
pub mod requirement;
pub mod resource;
pub mod version;

pub use attr::{AttrValue, Attributes};
pub use capability::{Capability, MANDATORY_DIRECTIVE, namespace};
pub use error::{Error, Result};
pub use filter::{Filter, Operator};
pub use repository::{LOCAL_URI, Repository};
pub use requirement::Requirement;
pub use resource::{
    InstalledHandle, InstanceState, PROP_FRAGMENT_HOST, PROP_LAST_MODIFIED, Resource,
    ResourceBuilder,
};
pub use version::{Version, VersionRange};
