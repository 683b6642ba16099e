//! Requirements declared by resources against other resources' capabilities.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::capability::{Capability, namespace};
use crate::error::Result;
use crate::filter::{Filter, Operator};
use crate::version::VersionRange;

/// A filtered need a resource declares.
///
/// A requirement is satisfied by a capability in the same namespace whose
/// attributes match the filter and whose mandatory attributes are all
/// referenced by the filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Requirement {
    namespace: String,
    filter: Filter,
    #[serde(default)]
    optional: bool,
    #[serde(default)]
    multiple: bool,
    #[serde(default)]
    extend: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    comment: Option<String>,
}

impl Requirement {
    /// Create a mandatory, single-provider requirement.
    pub fn new(namespace: impl Into<String>, filter: Filter) -> Self {
        Self {
            namespace: namespace.into(),
            filter,
            optional: false,
            multiple: false,
            extend: false,
            comment: None,
        }
    }

    /// Create a requirement from a filter string.
    ///
    /// # Errors
    ///
    /// Propagates [`Error::InvalidFilterSyntax`](crate::Error::InvalidFilterSyntax).
    pub fn parse(namespace: impl Into<String>, filter: &str) -> Result<Self> {
        Ok(Self::new(namespace, Filter::parse(filter)?))
    }

    /// Require a resource by symbolic name within a version range.
    ///
    /// The name is matched literally; filter metacharacters in it need no
    /// escaping.
    pub fn bundle(symbolic_name: &str, range: &VersionRange) -> Result<Self> {
        Ok(Self::new(
            namespace::BUNDLE,
            named_in_range("symbolicname", symbolic_name, range)?,
        ))
    }

    /// Require an exported package within a version range.
    pub fn package(package: &str, range: &VersionRange) -> Result<Self> {
        Ok(Self::new(
            namespace::PACKAGE,
            named_in_range("package", package, range)?,
        ))
    }

    pub fn with_optional(mut self, optional: bool) -> Self {
        self.optional = optional;
        self
    }

    pub fn with_multiple(mut self, multiple: bool) -> Self {
        self.multiple = multiple;
        self
    }

    pub fn with_extend(mut self, extend: bool) -> Self {
        self.extend = extend;
        self
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn filter(&self) -> &Filter {
        &self.filter
    }

    pub fn is_optional(&self) -> bool {
        self.optional
    }

    /// Whether more than one provider may satisfy this requirement.
    pub fn is_multiple(&self) -> bool {
        self.multiple
    }

    /// Whether the requirement attaches to its provider (fragment style).
    pub fn is_extend(&self) -> bool {
        self.extend
    }

    pub fn comment(&self) -> Option<&str> {
        self.comment.as_deref()
    }

    /// Check whether `capability` satisfies this requirement.
    pub fn is_satisfied(&self, capability: &Capability) -> bool {
        if self.namespace != capability.namespace() || !self.filter.matches(capability.attributes())
        {
            return false;
        }
        let mandatory = capability.mandatory_attributes();
        if mandatory.is_empty() {
            return true;
        }
        let referenced = self.filter.referenced_attributes();
        mandatory.iter().all(|attr| referenced.contains(attr))
    }
}

/// `(&(attr=name)<range>)` with `name` compared as a literal.
fn named_in_range(attr: &str, name: &str, range: &VersionRange) -> Result<Filter> {
    Ok(Filter::And(vec![
        Filter::Compare {
            attr: attr.to_string(),
            op: Operator::Equal,
            value: name.to_string(),
        },
        Filter::parse(&range.to_filter("version"))?,
    ]))
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.namespace, self.filter)?;
        if self.optional {
            f.write_str(" (optional)")?;
        }
        Ok(())
    }
}
