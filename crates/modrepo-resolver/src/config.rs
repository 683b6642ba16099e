//! Admin configuration loaded from TOML.
//!
//! # Example TOML
//!
//! ```toml
//! repositories = ["file:///srv/catalog/repository.toml"]
//!
//! [resolver]
//! use_local_resources = true
//!
//! [deploy]
//! start = true
//! no_optional_resources = false
//! ```
//!
//! Every section is optional; unknown keys are rejected so typos surface
//! at load time.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::deployer::DeployOptions;
use crate::error::{Error, Result};

/// Top-level admin configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AdminConfig {
    /// Catalog URIs loaded when the admin starts.
    #[serde(default)]
    pub repositories: Vec<String>,
    #[serde(default)]
    pub resolver: ResolverSettings,
    #[serde(default)]
    pub deploy: DeploySettings,
}

/// Settings applied to every resolver session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResolverSettings {
    /// Consider installed resources as candidates. When false, every
    /// requirement must be met from the catalogs.
    #[serde(default = "default_true")]
    pub use_local_resources: bool,
}

impl Default for ResolverSettings {
    fn default() -> Self {
        Self {
            use_local_resources: true,
        }
    }
}

/// Default deployment options.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeploySettings {
    #[serde(default)]
    pub start: bool,
    #[serde(default)]
    pub no_optional_resources: bool,
}

impl DeploySettings {
    /// The configured flags. Nothing applies them implicitly; callers pass
    /// them to `Resolver::deploy`.
    pub fn options(&self) -> DeployOptions {
        let mut options = DeployOptions::empty();
        if self.start {
            options |= DeployOptions::START;
        }
        if self.no_optional_resources {
            options |= DeployOptions::NO_OPTIONAL_RESOURCES;
        }
        options
    }
}

fn default_true() -> bool {
    true
}

impl AdminConfig {
    /// Parse configuration from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigNotFound`] when the file does not exist and
    /// [`Error::ConfigParse`] when it is not valid.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(Error::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }
        tracing::debug!(?path, "Loading admin config");
        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
    }
}
