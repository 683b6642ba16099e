//! End-to-end scenarios: configuration and catalogs on disk, through
//! discovery and resolution, to deployment on an in-memory platform.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use modrepo_model::{InstanceState, Repository};
use modrepo_resolver::{
    AdminConfig, CatalogError, CatalogLoader, DeployAction, DeployOptions, DeployState, Error,
    Installer, RepositoryAdmin,
};
use modrepo_test_utils::RecordingInstaller;
use pretty_assertions::assert_eq;
use tempfile::TempDir;

// =============================================================================
// Test Infrastructure
// =============================================================================

/// Loads `file://` catalogs written as TOML.
struct TomlFileLoader;

impl CatalogLoader for TomlFileLoader {
    fn load(&self, uri: &str) -> Result<Repository, CatalogError> {
        let path = uri.strip_prefix("file://").unwrap_or(uri);
        let content = fs::read_to_string(path).map_err(|source| CatalogError::Io {
            uri: uri.to_string(),
            source,
        })?;
        let parsed: Repository = toml::from_str(&content).map_err(|e| CatalogError::Parse {
            uri: uri.to_string(),
            reason: e.to_string(),
        })?;
        // The admin keys repositories by the uri they were loaded from.
        let mut repository = Repository::new(uri, parsed.resources().to_vec())
            .with_last_modified(parsed.last_modified());
        if let Some(name) = parsed.name() {
            repository = repository.with_name(name);
        }
        Ok(repository)
    }
}

const CATALOG_V1: &str = r#"
uri = "catalog"
name = "Example catalog"
last_modified = "2026-01-01T00:00:00Z"

[[resources]]
symbolic_name = "org.example.app"
version = "1.0"
presentation_name = "Example App"
requirements = [
    { namespace = "package", filter = "(&(package=org.example.api)(version>=1.0.0))" },
    { namespace = "package", filter = "(package=org.example.metrics)", optional = true },
]

[[resources]]
symbolic_name = "org.example.api"
version = "1.2"

[[resources.capabilities]]
namespace = "package"
attributes = { package = { type = "string", value = "org.example.api" }, version = { type = "version", value = "1.2.0" } }

[[resources]]
symbolic_name = "org.example.metrics"
version = "0.9"
requirements = [{ namespace = "package", filter = "(package=org.example.collector)" }]

[[resources.capabilities]]
namespace = "package"
attributes = { package = { type = "string", value = "org.example.metrics" } }

[[resources]]
symbolic_name = "org.example.broken"
version = "1.0"
requirements = [{ namespace = "package", filter = "(package=org.example.nowhere)" }]
"#;

const CATALOG_V2: &str = r#"
uri = "catalog"
last_modified = "2026-02-01T00:00:00Z"

[[resources]]
symbolic_name = "org.example.app"
version = "1.1"
requirements = [{ namespace = "package", filter = "(&(package=org.example.api)(version>=1.0.0))" }]

[[resources]]
symbolic_name = "org.example.api"
version = "2.0"

[[resources.capabilities]]
namespace = "package"
attributes = { package = { type = "string", value = "org.example.api" }, version = { type = "version", value = "2.0.0" } }
"#;

/// A temporary directory holding the catalog and the admin configuration.
struct Site {
    dir: TempDir,
}

impl Site {
    fn new() -> Self {
        let site = Self {
            dir: TempDir::new().unwrap(),
        };
        site.write_catalog(CATALOG_V1);
        let config = format!(
            "repositories = [\"{}\"]\n\n[deploy]\nstart = true\n",
            site.catalog_uri()
        );
        fs::write(site.config_path(), config).unwrap();
        site
    }

    fn catalog_path(&self) -> PathBuf {
        self.dir.path().join("repository.toml")
    }

    fn catalog_uri(&self) -> String {
        format!("file://{}", self.catalog_path().display())
    }

    fn config_path(&self) -> PathBuf {
        self.dir.path().join("admin.toml")
    }

    fn write_catalog(&self, content: &str) {
        fs::write(self.catalog_path(), content).unwrap();
    }

    fn admin(&self, installer: &Arc<RecordingInstaller>) -> RepositoryAdmin {
        let config = AdminConfig::load(&self.config_path()).unwrap();
        RepositoryAdmin::with_config(
            &config,
            Arc::new(TomlFileLoader),
            Arc::clone(installer) as Arc<dyn Installer>,
        )
        .unwrap()
    }
}

fn names(resources: &[Arc<modrepo_model::Resource>]) -> Vec<String> {
    resources.iter().map(|r| r.to_string()).collect()
}

// =============================================================================
// Scenarios
// =============================================================================

#[test]
fn test_catalog_to_running_platform() {
    let site = Site::new();
    let installer = Arc::new(RecordingInstaller::new());
    let admin = site.admin(&installer);

    let repositories = admin.list_repositories();
    assert_eq!(repositories.len(), 1);
    assert_eq!(repositories[0].name(), Some("Example catalog"));

    let mut resolver = admin.resolver();
    for resource in admin
        .discover_resources("(presentationname=Example App)")
        .unwrap()
    {
        resolver.add(resource);
    }
    assert!(resolver.resolve().unwrap());
    assert_eq!(
        names(resolver.required_resources()),
        vec!["org.example.app (1.0.0)", "org.example.api (1.2.0)"]
    );
    // metrics needs a collector nobody provides, so the optional branch is dropped.
    assert!(resolver.optional_resources().is_empty());

    let report = resolver.deploy(admin.deploy_options()).unwrap();
    let deployed: Vec<(String, DeployState)> = report
        .entries
        .iter()
        .map(|e| (e.resource.to_string(), e.state))
        .collect();
    assert_eq!(
        deployed,
        vec![
            ("org.example.api (1.2.0)".to_string(), DeployState::Started),
            ("org.example.app (1.0.0)".to_string(), DeployState::Started),
        ]
    );
    assert!(
        installer
            .installed()
            .iter()
            .all(|r| r.installed().map(|h| h.state) == Some(InstanceState::Active))
    );
}

#[test]
fn test_catalog_refresh_upgrades_in_place() {
    let site = Site::new();
    let installer = Arc::new(RecordingInstaller::new());
    let admin = site.admin(&installer);

    let mut first = admin.resolver();
    for resource in admin
        .discover_resources("(symbolicname=org.example.app)")
        .unwrap()
    {
        first.add(resource);
    }
    assert!(first.resolve().unwrap());
    first.deploy(DeployOptions::START).unwrap();
    let before = installer.calls().len();

    site.write_catalog(CATALOG_V2);
    admin.add_repository(&site.catalog_uri()).unwrap();
    assert_eq!(admin.list_repositories().len(), 1);

    let mut upgrade = admin.resolver();
    for resource in admin
        .discover_resources("(&(symbolicname=org.example.app)(version>=1.1.0))")
        .unwrap()
    {
        upgrade.add(resource);
    }
    assert!(upgrade.resolve().unwrap());

    // The installed api still satisfies the app, so it is kept over 2.0.
    let api = upgrade
        .required_resources()
        .iter()
        .find(|r| r.symbolic_name() == Some("org.example.api"))
        .cloned()
        .unwrap();
    assert!(api.is_local());

    let report = upgrade.deploy(DeployOptions::START).unwrap();
    let actions: Vec<String> = installer.calls()[before..]
        .iter()
        .map(|(step, name)| format!("{step} {name}"))
        .collect();
    assert_eq!(
        actions,
        vec![
            "stop org.example.app",
            "update org.example.app",
            "start org.example.app",
        ]
    );
    assert_eq!(report.entry(&api).map(|e| &e.action), Some(&DeployAction::Unchanged));

    let app = installer.find("org.example.app").unwrap();
    assert_eq!(app.version().to_string(), "1.1.0");
    assert_eq!(installer.installed().len(), 2);
}

#[test]
fn test_unsatisfiable_root_reports_every_reason() {
    let site = Site::new();
    let installer = Arc::new(RecordingInstaller::new());
    let admin = site.admin(&installer);

    let mut resolver = admin.resolver();
    for resource in admin
        .discover_resources("(symbolicname=org.example.broken)")
        .unwrap()
    {
        resolver.add(resource);
    }
    let nothing = admin
        .requirement("package", "(package=org.example.ghost)")
        .unwrap();
    resolver.add_requirement(nothing);

    assert!(!resolver.resolve().unwrap());
    let reasons: Vec<String> = resolver
        .unsatisfied_requirements()
        .iter()
        .map(|r| r.to_string())
        .collect();
    assert_eq!(
        reasons,
        vec![
            "nothing provides package:(package=org.example.ghost)",
            "org.example.broken (1.0.0) requires package:(package=org.example.nowhere)",
        ]
    );

    let err = resolver.deploy(DeployOptions::START).unwrap_err();
    assert!(matches!(err, Error::IllegalState(_)));
    assert!(installer.calls().is_empty());
}

#[test]
fn test_missing_catalog_is_reported() {
    let site = Site::new();
    let installer = Arc::new(RecordingInstaller::new());
    let admin = site.admin(&installer);

    let missing = format!("file://{}", site.dir.path().join("nope.toml").display());
    let err = admin.add_repository(&missing).unwrap_err();
    assert!(matches!(err, Error::Catalog(CatalogError::Io { .. })));

    fs::write(site.dir.path().join("bad.toml"), "resources = 3").unwrap();
    let bad = format!("file://{}", site.dir.path().join("bad.toml").display());
    let err = admin.add_repository(&bad).unwrap_err();
    assert!(matches!(err, Error::Catalog(CatalogError::Parse { .. })));

    assert_eq!(admin.list_repositories().len(), 1);
}

#[test]
fn test_interrupted_resolve_can_be_retried() {
    let site = Site::new();
    let installer = Arc::new(RecordingInstaller::new());
    let admin = site.admin(&installer);

    let mut resolver = admin.resolver();
    for resource in admin
        .discover_resources("(symbolicname=org.example.app)")
        .unwrap()
    {
        resolver.add(resource);
    }
    let handle = resolver.interrupt_handle();
    handle.interrupt();
    assert!(matches!(resolver.resolve(), Err(Error::Interrupted)));
    assert!(resolver.resolve().unwrap());
}
