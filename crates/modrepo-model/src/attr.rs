//! Typed attribute values carried by capabilities and resources.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::version::Version;

/// Attribute map keyed by attribute name.
pub type Attributes = BTreeMap<String, AttrValue>;

/// A typed attribute value.
///
/// The type decides how filter literals are compared against it: a
/// `Version` attribute compares `(version>=1.2)` by version order, a `Long`
/// numerically, and so on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum AttrValue {
    String(String),
    Long(i64),
    Double(f64),
    Version(Version),
    List(Vec<String>),
}

impl AttrValue {
    /// The value as a string slice, for `String` attributes only.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttrValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// The value as a version, parsing `String` attributes on demand.
    pub fn as_version(&self) -> Option<Version> {
        match self {
            AttrValue::Version(v) => Some(v.clone()),
            AttrValue::String(s) => Version::parse(s).ok(),
            _ => None,
        }
    }

    pub fn as_long(&self) -> Option<i64> {
        match self {
            AttrValue::Long(n) => Some(*n),
            _ => None,
        }
    }
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttrValue::String(s) => f.write_str(s),
            AttrValue::Long(n) => write!(f, "{n}"),
            AttrValue::Double(d) => write!(f, "{d}"),
            AttrValue::Version(v) => write!(f, "{v}"),
            AttrValue::List(items) => f.write_str(&items.join(",")),
        }
    }
}

impl From<&str> for AttrValue {
    fn from(value: &str) -> Self {
        AttrValue::String(value.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(value: String) -> Self {
        AttrValue::String(value)
    }
}

impl From<i64> for AttrValue {
    fn from(value: i64) -> Self {
        AttrValue::Long(value)
    }
}

impl From<f64> for AttrValue {
    fn from(value: f64) -> Self {
        AttrValue::Double(value)
    }
}

impl From<Version> for AttrValue {
    fn from(value: Version) -> Self {
        AttrValue::Version(value)
    }
}

impl From<Vec<String>> for AttrValue {
    fn from(value: Vec<String>) -> Self {
        AttrValue::List(value)
    }
}

/// Look up an attribute by name, ignoring ASCII case.
///
/// An exact match wins over a case-insensitive one.
pub fn lookup<'a>(attributes: &'a Attributes, key: &str) -> Option<&'a AttrValue> {
    attributes.get(key).or_else(|| {
        attributes
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(key))
            .map(|(_, value)| value)
    })
}
