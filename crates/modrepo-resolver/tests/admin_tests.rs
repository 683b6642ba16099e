//! Tests for repository administration and discovery

use std::sync::Arc;
use std::thread;

use modrepo_model::{InstanceState, Repository, namespace};
use modrepo_resolver::{
    AdminConfig, DeployOptions, DeployStep, Error, Installer, RepositoryAdmin,
};
use modrepo_test_utils::fixtures::{catalog, export, import, resource};
use modrepo_test_utils::{MemoryLoader, RecordingInstaller};
use pretty_assertions::assert_eq;

fn catalog_one() -> Repository {
    catalog(
        "mem:one",
        vec![
            resource("org.example.app", "1.0")
                .presentation_name("Example App")
                .property("category", "demo")
                .requirement(import("org.example.api"))
                .build(),
            resource("org.example.api", "1.0")
                .capability(export("org.example.api", "1.0"))
                .build(),
        ],
    )
}

fn catalog_two() -> Repository {
    catalog(
        "mem:two",
        vec![
            resource("org.example.api", "2.0")
                .capability(export("org.example.api", "2.0"))
                .build(),
            resource("org.other", "1.0").property("category", "demo").build(),
        ],
    )
}

fn admin() -> (RepositoryAdmin, Arc<MemoryLoader>, Arc<RecordingInstaller>) {
    let loader = Arc::new(MemoryLoader::new().with(catalog_one()).with(catalog_two()));
    let installer = Arc::new(RecordingInstaller::new());
    let admin = RepositoryAdmin::new(
        Arc::clone(&loader) as Arc<dyn modrepo_resolver::CatalogLoader>,
        Arc::clone(&installer) as Arc<dyn Installer>,
    );
    (admin, loader, installer)
}

fn uris(admin: &RepositoryAdmin) -> Vec<String> {
    admin
        .list_repositories()
        .iter()
        .map(|r| r.uri().to_string())
        .collect()
}

mod repository_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_add_list_remove() {
        let (admin, _, _) = admin();
        assert!(admin.list_repositories().is_empty());

        let one = admin.add_repository("mem:one").unwrap();
        assert_eq!(one.len(), 2);
        admin.add_repository("mem:two").unwrap();
        assert_eq!(uris(&admin), vec!["mem:one", "mem:two"]);

        assert!(admin.remove_repository("mem:one"));
        assert!(!admin.remove_repository("mem:one"));
        assert_eq!(uris(&admin), vec!["mem:two"]);
    }

    #[test]
    fn test_re_adding_uri_replaces_in_place() {
        let (admin, loader, _) = admin();
        admin.add_repository("mem:one").unwrap();
        admin.add_repository("mem:two").unwrap();

        loader.publish(catalog("mem:one", vec![resource("fresh", "1.0").build()]));
        admin.add_repository("mem:one").unwrap();

        assert_eq!(uris(&admin), vec!["mem:one", "mem:two"]);
        assert_eq!(admin.list_repositories()[0].resources()[0].symbolic_name(), Some("fresh"));
        assert_eq!(loader.load_count(), 3);
    }

    #[test]
    fn test_failed_load_leaves_set_unchanged() {
        let (admin, _, _) = admin();
        admin.add_repository("mem:one").unwrap();

        let err = admin.add_repository("mem:missing").unwrap_err();
        assert!(matches!(err, Error::Catalog(_)));
        assert_eq!(uris(&admin), vec!["mem:one"]);
    }

    #[test]
    fn test_snapshots_are_not_torn_by_mutation() {
        let (admin, _, _) = admin();
        admin.add_repository("mem:one").unwrap();
        let before = admin.list_repositories();

        admin.add_repository("mem:two").unwrap();
        assert_eq!(before.len(), 1);
        assert_eq!(admin.list_repositories().len(), 2);
    }

    #[test]
    fn test_concurrent_readers_see_whole_snapshots() {
        let (admin, _, _) = admin();
        admin.add_repository("mem:one").unwrap();

        thread::scope(|scope| {
            for _ in 0..4 {
                scope.spawn(|| {
                    for _ in 0..200 {
                        let snapshot = admin.list_repositories();
                        assert!(snapshot.len() == 1 || snapshot.len() == 2);
                        assert_eq!(snapshot[0].uri(), "mem:one");
                        assert!(snapshot.iter().all(|r| !r.is_empty()));
                    }
                });
            }
            for _ in 0..50 {
                admin.add_repository("mem:two").unwrap();
                admin.remove_repository("mem:two");
            }
        });
    }

    #[test]
    fn test_local_repository_reflects_installer() {
        let (admin, _, installer) = admin();
        assert!(admin.local_repository().is_empty());

        installer.install_local(resource("x", "1.0").build(), InstanceState::Active);
        let local = admin.local_repository();
        assert!(local.is_local());
        assert_eq!(local.len(), 1);
    }
}

mod discovery_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_discover_by_symbolic_name() {
        let (admin, _, _) = admin();
        admin.add_repository("mem:one").unwrap();
        admin.add_repository("mem:two").unwrap();

        let found = admin
            .discover_resources("(symbolicname=org.example.api)")
            .unwrap();
        let versions: Vec<String> = found.iter().map(|r| r.version().to_string()).collect();
        assert_eq!(versions, vec!["1.0.0", "2.0.0"]);
    }

    #[test]
    fn test_discover_by_property_and_presentation_name() {
        let (admin, _, _) = admin();
        admin.add_repository("mem:one").unwrap();
        admin.add_repository("mem:two").unwrap();

        let demo = admin.discover_resources("(category=demo)").unwrap();
        assert_eq!(demo.len(), 2);

        let named = admin
            .discover_resources("(presentationname=Example*)")
            .unwrap();
        assert_eq!(named.len(), 1);
        assert_eq!(named[0].symbolic_name(), Some("org.example.app"));
    }

    #[test]
    fn test_discover_rejects_bad_filter() {
        let (admin, _, _) = admin();
        let err = admin.discover_resources("(symbolicname=").unwrap_err();
        assert!(matches!(
            err,
            Error::Model(modrepo_model::Error::InvalidFilterSyntax { .. })
        ));
        assert!(admin.requirement(namespace::PACKAGE, "package=x").is_err());
    }

    #[test]
    fn test_discover_providers_requires_all() {
        let (admin, _, installer) = admin();
        admin.add_repository("mem:one").unwrap();
        admin.add_repository("mem:two").unwrap();
        installer.install_local(
            resource("local.api", "9.0")
                .capability(export("org.example.api", "9.0"))
                .build(),
            InstanceState::Active,
        );

        let api = admin
            .requirement(namespace::PACKAGE, "(package=org.example.api)")
            .unwrap();
        let v2 = admin
            .requirement(namespace::PACKAGE, "(version>=2.0.0)")
            .unwrap();

        let any = admin.discover_providers(std::slice::from_ref(&api));
        assert_eq!(any.len(), 2);
        assert!(any.iter().all(|r| !r.is_local()));

        let newest = admin.discover_providers(&[api, v2]);
        assert_eq!(newest.len(), 1);
        assert_eq!(newest[0].version().major(), 2);
    }
}

mod session_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_resolver_binds_snapshot_at_creation() {
        let (admin, _, _) = admin();
        admin.add_repository("mem:one").unwrap();
        let mut resolver = admin.resolver();
        admin.remove_repository("mem:one");

        let app = resolver.repositories()[0].resources()[0].clone();
        resolver.add(app);
        assert!(resolver.resolve().unwrap());
        assert_eq!(resolver.required_resources().len(), 2);
    }

    #[test]
    fn test_with_config_loads_repositories_and_options() {
        let config = AdminConfig::from_toml(
            r#"
repositories = ["mem:one", "mem:two"]

[resolver]
use_local_resources = false

[deploy]
start = true
"#,
        )
        .unwrap();
        let loader = Arc::new(MemoryLoader::new().with(catalog_one()).with(catalog_two()));
        let installer = Arc::new(RecordingInstaller::new());
        let admin = RepositoryAdmin::with_config(&config, loader, installer).unwrap();

        assert_eq!(uris(&admin), vec!["mem:one", "mem:two"]);
        assert_eq!(admin.deploy_options(), DeployOptions::START);
        assert!(!admin.resolver().options().use_local_resources);
    }

    #[test]
    fn test_configured_deploy_options_apply_only_when_passed() {
        let config = AdminConfig::from_toml("repositories = [\"mem:one\"]\n\n[deploy]\nstart = true\n")
            .unwrap();
        let deploy_with = |pick: fn(&RepositoryAdmin) -> DeployOptions| {
            let loader = Arc::new(MemoryLoader::new().with(catalog_one()));
            let installer = Arc::new(RecordingInstaller::new());
            let admin = RepositoryAdmin::with_config(
                &config,
                loader,
                Arc::clone(&installer) as Arc<dyn Installer>,
            )
            .unwrap();
            let app = admin
                .discover_resources("(symbolicname=org.example.app)")
                .unwrap();
            let mut resolver = admin.resolver();
            resolver.add(Arc::clone(&app[0]));
            assert!(resolver.resolve().unwrap());
            resolver.deploy(pick(&admin)).unwrap();
            installer.calls_for(DeployStep::Start)
        };

        assert!(deploy_with(|_| DeployOptions::empty()).is_empty());
        assert_eq!(
            deploy_with(RepositoryAdmin::deploy_options),
            vec!["org.example.api", "org.example.app"]
        );
    }

    #[test]
    fn test_with_config_fails_on_missing_catalog() {
        let config = AdminConfig {
            repositories: vec!["mem:nope".to_string()],
            ..AdminConfig::default()
        };
        let loader = Arc::new(MemoryLoader::new());
        let installer = Arc::new(RecordingInstaller::new());
        assert!(RepositoryAdmin::with_config(&config, loader, installer).is_err());
    }

    #[test]
    fn test_concurrent_deploys_are_serialized() {
        let (admin, _, installer) = admin();
        admin.add_repository("mem:one").unwrap();
        admin.add_repository("mem:two").unwrap();

        let app = admin
            .discover_resources("(symbolicname=org.example.app)")
            .unwrap();
        let other = admin.discover_resources("(symbolicname=org.other)").unwrap();

        let mut first = admin.resolver();
        first.add(Arc::clone(&app[0]));
        let mut second = admin.resolver();
        second.add(Arc::clone(&app[0]));
        second.add(Arc::clone(&other[0]));
        assert!(first.resolve().unwrap());
        assert!(second.resolve().unwrap());

        thread::scope(|scope| {
            scope.spawn(|| first.deploy(DeployOptions::START).unwrap());
            scope.spawn(|| second.deploy(DeployOptions::START).unwrap());
        });

        // Whichever deploy ran second saw the first one's installs.
        let installs = installer.calls_for(DeployStep::Install);
        assert_eq!(
            installs.iter().filter(|n| *n == "org.example.app").count(),
            1
        );
        assert_eq!(
            installs.iter().filter(|n| *n == "org.example.api").count(),
            1
        );
        assert_eq!(installer.installed().len(), 3);
    }
}
