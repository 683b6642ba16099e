//! Candidate search and selection.
//!
//! [`find_providers`] is a pure query over repository snapshots. The
//! resolver narrows its result to candidates consistent with the current
//! closure and then calls [`select_best`] (or [`select_per_name`] for
//! `multiple` requirements).
//!
//! Selection rules, in order:
//!
//! 1. an installed (local) candidate wins, to avoid churn;
//! 2. otherwise the highest version wins;
//! 3. among equal versions the first declared wins (local repository first,
//!    then catalogs in registration order, then declaration order within a
//!    catalog).

use std::sync::Arc;

use modrepo_model::{Repository, Requirement, Resource};

/// All resources with a capability satisfying `requirement`.
///
/// The local repository is searched first, then `repositories` in order.
/// Results are de-duplicated by resource identity, keeping the first
/// occurrence.
pub fn find_providers(
    requirement: &Requirement,
    repositories: &[Arc<Repository>],
    local: &Repository,
) -> Vec<Arc<Resource>> {
    let mut providers: Vec<Arc<Resource>> = Vec::new();
    let sources = std::iter::once(local).chain(repositories.iter().map(|r| r.as_ref()));
    for repository in sources {
        for (resource, _) in repository.find(requirement) {
            if !providers.iter().any(|known| known == resource) {
                providers.push(Arc::clone(resource));
            }
        }
    }
    providers
}

/// Pick the single best candidate.
pub fn select_best(candidates: &[Arc<Resource>]) -> Option<Arc<Resource>> {
    if let Some(local) = candidates.iter().find(|c| c.is_local()) {
        return Some(Arc::clone(local));
    }
    let mut best: Option<&Arc<Resource>> = None;
    for candidate in candidates {
        match best {
            Some(current) if candidate.version() <= current.version() => {}
            _ => best = Some(candidate),
        }
    }
    best.cloned()
}

/// Pick the best candidate for each distinct symbolic name.
///
/// Groups keep the order in which their name first appears. Anonymous
/// candidates each form their own group.
pub fn select_per_name(candidates: &[Arc<Resource>]) -> Vec<Arc<Resource>> {
    let mut groups: Vec<Vec<Arc<Resource>>> = Vec::new();
    for candidate in candidates {
        let group = candidate.symbolic_name().and_then(|name| {
            groups
                .iter_mut()
                .find(|g| g[0].symbolic_name() == Some(name))
        });
        match group {
            Some(group) => group.push(Arc::clone(candidate)),
            None => groups.push(vec![Arc::clone(candidate)]),
        }
    }
    groups.iter().filter_map(|g| select_best(g)).collect()
}
