//! Capabilities offered by resources.

use serde::{Deserialize, Serialize};

use crate::attr::{AttrValue, Attributes, lookup};

/// Well-known capability namespaces.
pub mod namespace {
    /// Identity of a resource itself (`symbolicname`, `version`).
    pub const BUNDLE: &str = "bundle";
    /// An exported package.
    pub const PACKAGE: &str = "package";
    /// A registered service.
    pub const SERVICE: &str = "service";
    /// An extender (e.g. a component runtime).
    pub const EXTENDER: &str = "extender";
    /// Execution environment offered by the platform.
    pub const EXECUTION_ENVIRONMENT: &str = "ee";
}

/// Attribute listing the attributes a requirement must mention to match.
///
/// This mirrors the `mandatory:=` export directive: a capability exported
/// with `mandatory: "company"` is only visible to requirements whose filter
/// references `company`.
pub const MANDATORY_DIRECTIVE: &str = "mandatory:";

/// A named, attributed fact a resource offers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Capability {
    namespace: String,
    #[serde(default)]
    attributes: Attributes,
}

impl Capability {
    /// Create a capability with no attributes.
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            attributes: Attributes::new(),
        }
    }

    /// Add an attribute, returning the capability.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    /// Look up an attribute ignoring ASCII case.
    pub fn get(&self, key: &str) -> Option<&AttrValue> {
        lookup(&self.attributes, key)
    }

    /// Names of attributes a matching requirement must reference.
    pub fn mandatory_attributes(&self) -> Vec<String> {
        match self.attributes.get(MANDATORY_DIRECTIVE) {
            Some(AttrValue::String(list)) => list
                .split(',')
                .map(|s| s.trim().to_ascii_lowercase())
                .filter(|s| !s.is_empty())
                .collect(),
            Some(AttrValue::List(items)) => items
                .iter()
                .map(|s| s.trim().to_ascii_lowercase())
                .filter(|s| !s.is_empty())
                .collect(),
            _ => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Version;

    #[test]
    fn test_builder_collects_attributes() {
        let cap = Capability::new(namespace::PACKAGE)
            .with("package", "org.example")
            .with("version", Version::new(1, 0, 0));
        assert_eq!(cap.namespace(), "package");
        assert_eq!(cap.get("PACKAGE"), Some(&AttrValue::from("org.example")));
        assert_eq!(cap.attributes().len(), 2);
    }

    #[test]
    fn test_mandatory_attributes_from_string_and_list() {
        let cap = Capability::new(namespace::PACKAGE).with(MANDATORY_DIRECTIVE, "Company, team");
        assert_eq!(cap.mandatory_attributes(), vec!["company", "team"]);

        let cap = Capability::new(namespace::PACKAGE)
            .with(MANDATORY_DIRECTIVE, vec!["company".to_string()]);
        assert_eq!(cap.mandatory_attributes(), vec!["company"]);

        assert!(Capability::new(namespace::PACKAGE).mandatory_attributes().is_empty());
    }
}
