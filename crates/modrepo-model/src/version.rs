//! Resource versions and version ranges.
//!
//! Versions follow the `major.minor.micro.qualifier` scheme used by module
//! catalogs. Missing numeric components default to `0`, so `"1"`, `"1.0"` and
//! `"1.0.0"` all denote the same version. The optional qualifier is stored as
//! semver build metadata and compared lexicographically after the numeric
//! components; an absent qualifier sorts lowest.
//!
//! # Examples
//!
//! ```
//! use modrepo_model::version::{Version, VersionRange};
//!
//! let v: Version = "1.2".parse().unwrap();
//! assert_eq!(v, Version::new(1, 2, 0));
//! assert!(Version::parse("1.2.0.beta").unwrap() > v);
//!
//! let range = VersionRange::parse("[1.0,2.0)").unwrap();
//! assert!(range.includes(&v));
//! assert!(!range.includes(&Version::new(2, 0, 0)));
//! ```

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{Error, Result};

/// A resource version.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Version(semver::Version);

impl Version {
    /// The empty version, `0.0.0`.
    pub const ZERO: Version = Version::new(0, 0, 0);

    /// Create a version without qualifier.
    pub const fn new(major: u64, minor: u64, micro: u64) -> Self {
        Self(semver::Version::new(major, minor, micro))
    }

    /// Parse a version string.
    ///
    /// Accepts one to three numeric components followed by an optional
    /// qualifier (`1`, `1.2`, `1.2.3`, `1.2.3.RC1`). An empty or blank
    /// string parses to [`Version::ZERO`].
    pub fn parse(input: &str) -> Result<Self> {
        let s = input.trim();
        if s.is_empty() {
            return Ok(Self::ZERO);
        }

        let invalid = |reason: String| Error::InvalidVersion {
            version: input.to_string(),
            reason,
        };

        let mut parts = s.splitn(4, '.');
        let mut numbers = [0u64; 3];
        for (slot, number) in numbers.iter_mut().enumerate() {
            match parts.next() {
                Some(part) => {
                    if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                        return Err(invalid(format!("component {} is not numeric", slot + 1)));
                    }
                    *number = part
                        .parse()
                        .map_err(|e| invalid(format!("component {}: {e}", slot + 1)))?;
                }
                None => break,
            }
        }

        let mut inner = semver::Version::new(numbers[0], numbers[1], numbers[2]);
        if let Some(qualifier) = parts.next() {
            if qualifier.is_empty() {
                return Err(invalid("empty qualifier".to_string()));
            }
            inner.build = semver::BuildMetadata::new(qualifier)
                .map_err(|e| invalid(format!("qualifier: {e}")))?;
        }

        Ok(Self(inner))
    }

    pub fn major(&self) -> u64 {
        self.0.major
    }

    pub fn minor(&self) -> u64 {
        self.0.minor
    }

    pub fn micro(&self) -> u64 {
        self.0.patch
    }

    /// The qualifier, or `""` when absent.
    pub fn qualifier(&self) -> &str {
        self.0.build.as_str()
    }
}

impl Default for Version {
    fn default() -> Self {
        Self::ZERO
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.0.major, self.0.minor, self.0.patch)
            .cmp(&(other.0.major, other.0.minor, other.0.patch))
            .then_with(|| self.qualifier().cmp(other.qualifier()))
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.0.major, self.0.minor, self.0.patch)?;
        if !self.0.build.is_empty() {
            write!(f, ".{}", self.0.build)?;
        }
        Ok(())
    }
}

impl FromStr for Version {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl Serialize for Version {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Version {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// An interval of versions.
///
/// Written as `[floor,ceiling)` with `[`/`(` and `]`/`)` selecting inclusive
/// or exclusive bounds. A bare version means "at least this version".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionRange {
    floor: Version,
    floor_inclusive: bool,
    ceiling: Option<Version>,
    ceiling_inclusive: bool,
}

impl VersionRange {
    /// Range containing every version at or above `floor`.
    pub fn at_least(floor: Version) -> Self {
        Self {
            floor,
            floor_inclusive: true,
            ceiling: None,
            ceiling_inclusive: false,
        }
    }

    /// Range containing exactly one version.
    pub fn exact(version: Version) -> Self {
        Self {
            floor: version.clone(),
            floor_inclusive: true,
            ceiling: Some(version),
            ceiling_inclusive: true,
        }
    }

    /// Parse a range string.
    pub fn parse(input: &str) -> Result<Self> {
        let s = input.trim();
        let invalid = |reason: &str| Error::InvalidVersionRange {
            range: input.to_string(),
            reason: reason.to_string(),
        };

        let floor_inclusive = match s.chars().next() {
            Some('[') => true,
            Some('(') => false,
            _ => return Ok(Self::at_least(Version::parse(s)?)),
        };
        let ceiling_inclusive = match s.chars().last() {
            Some(']') => true,
            Some(')') => false,
            _ => return Err(invalid("missing closing ']' or ')'")),
        };
        if s.len() < 2 {
            return Err(invalid("missing bounds"));
        }

        let body = &s[1..s.len() - 1];
        let (floor, ceiling) = body
            .split_once(',')
            .ok_or_else(|| invalid("expected 'floor,ceiling'"))?;
        let floor = Version::parse(floor)?;
        let ceiling = Version::parse(ceiling)?;
        if ceiling < floor {
            return Err(invalid("ceiling is below floor"));
        }

        Ok(Self {
            floor,
            floor_inclusive,
            ceiling: Some(ceiling),
            ceiling_inclusive,
        })
    }

    pub fn floor(&self) -> &Version {
        &self.floor
    }

    pub fn ceiling(&self) -> Option<&Version> {
        self.ceiling.as_ref()
    }

    /// Check whether `version` lies inside this range.
    pub fn includes(&self, version: &Version) -> bool {
        let above_floor = if self.floor_inclusive {
            version >= &self.floor
        } else {
            version > &self.floor
        };
        let below_ceiling = match &self.ceiling {
            None => true,
            Some(ceiling) if self.ceiling_inclusive => version <= ceiling,
            Some(ceiling) => version < ceiling,
        };
        above_floor && below_ceiling
    }

    /// Render this range as a filter clause over `attr`.
    ///
    /// `[1.0,2.0)` on `version` becomes
    /// `(&(version>=1.0.0)(!(version>=2.0.0)))`.
    pub fn to_filter(&self, attr: &str) -> String {
        let low = if self.floor_inclusive {
            format!("({attr}>={})", self.floor)
        } else {
            format!("(!({attr}<={}))", self.floor)
        };
        match &self.ceiling {
            None => low,
            Some(ceiling) => {
                let high = if self.ceiling_inclusive {
                    format!("({attr}<={ceiling})")
                } else {
                    format!("(!({attr}>={ceiling}))")
                };
                format!("(&{low}{high})")
            }
        }
    }
}

impl fmt::Display for VersionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.ceiling {
            None => write!(f, "{}", self.floor),
            Some(ceiling) => write!(
                f,
                "{}{},{}{}",
                if self.floor_inclusive { '[' } else { '(' },
                self.floor,
                ceiling,
                if self.ceiling_inclusive { ']' } else { ')' },
            ),
        }
    }
}
