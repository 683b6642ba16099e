//! Resolver sessions.
//!
//! A [`Resolver`] collects roots (resources and bare requirements), computes
//! the transitive closure needed to satisfy them against a snapshot of the
//! repository set, and hands the result to the deployer.
//!
//! Resolution walks a FIFO work queue. Each item either expands a member of
//! the closure (queues its requirements) or satisfies one requirement by
//! selecting a provider:
//!
//! - a member already in the closure that satisfies the requirement is
//!   reused;
//! - otherwise candidates come from the local repository and the catalogs,
//!   minus any whose symbolic name is already in the closure at another
//!   version, and [`selector::select_best`] picks one.
//!
//! Optional requirements are deferred until the mandatory work queued so far
//! is done, then tried in a branch: a copy of the closure is extended and
//! drained, and only committed if it picked up no unsatisfied requirements.
//! Members pulled in that way form the optional closure. Since every
//! mandatory requirement is settled first, an optional selection can never
//! take the symbolic name a mandatory requirement needs.

use std::collections::{BTreeSet, HashMap, VecDeque};
use std::fmt;
use std::sync::{Arc, Mutex};

use modrepo_model::{Repository, Requirement, Resource, VersionRange, namespace};

use crate::config::ResolverSettings;
use crate::deployer::{DeployOptions, DeployReport, Deployer};
use crate::error::{Error, Result};
use crate::installer::Installer;
use crate::interrupt::InterruptHandle;
use crate::selector;

/// Which optional package requirements a root treats as mandatory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum MandatoryPackages {
    #[default]
    None,
    All,
    /// Only requirements asserting one of these package names.
    Named(BTreeSet<String>),
}

impl MandatoryPackages {
    pub fn named<I, S>(packages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Named(packages.into_iter().map(Into::into).collect())
    }

    fn covers(&self, requirement: &Requirement) -> bool {
        if requirement.namespace() != namespace::PACKAGE {
            return false;
        }
        match self {
            Self::None => false,
            Self::All => true,
            Self::Named(packages) => requirement
                .filter()
                .asserted_value("package")
                .is_some_and(|package| packages.contains(package)),
        }
    }
}

/// Per-root resolution policy.
///
/// The policy applies to every requirement reached while expanding the
/// root. A resource reached from several roots keeps the policy of the
/// first root that reached it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RootPolicy {
    pub mandatory_packages: MandatoryPackages,
}

impl RootPolicy {
    pub fn with_mandatory_packages(mandatory_packages: MandatoryPackages) -> Self {
        Self { mandatory_packages }
    }
}

/// Session-wide resolution options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolveOptions {
    /// Consider installed resources as candidates.
    pub use_local_resources: bool,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            use_local_resources: true,
        }
    }
}

impl From<&ResolverSettings> for ResolveOptions {
    fn from(settings: &ResolverSettings) -> Self {
        Self {
            use_local_resources: settings.use_local_resources,
        }
    }
}

/// A requirement that could not be satisfied.
#[derive(Debug, Clone, PartialEq)]
pub struct Reason {
    pub requirement: Requirement,
    /// The resource declaring the requirement; `None` for a bare root
    /// requirement.
    pub resource: Option<Arc<Resource>>,
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.resource {
            Some(resource) => write!(f, "{resource} requires {}", self.requirement),
            None => write!(f, "nothing provides {}", self.requirement),
        }
    }
}

/// A requirement-satisfaction edge found during resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct Wire {
    /// `None` for a bare root requirement.
    pub requirer: Option<Arc<Resource>>,
    pub requirement: Requirement,
    pub provider: Arc<Resource>,
    /// Whether the requirement was mandatory for its requirer. Only
    /// mandatory wires constrain deployment order.
    pub mandatory: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Pending,
    Resolved,
    Failed,
}

#[derive(Debug, Clone)]
enum Root {
    Resource(Arc<Resource>),
    Requirement(Requirement),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Required,
    Optional,
}

#[derive(Debug, Clone)]
struct Member {
    resource: Arc<Resource>,
    mode: Mode,
    /// Index of the root whose policy applies.
    policy: usize,
}

#[derive(Debug, Clone)]
struct Link {
    requirer: Option<usize>,
    requirement: Requirement,
    provider: usize,
    mandatory: bool,
}

#[derive(Debug, Clone)]
struct Demand {
    requirer: Option<usize>,
    requirement: Requirement,
    policy: usize,
    mode: Mode,
}

#[derive(Debug, Clone)]
enum Work {
    Expand(usize),
    Satisfy(Demand),
}

/// Working state of one resolution. Cloned to checkpoint optional branches.
#[derive(Debug, Clone, Default)]
struct Closure {
    members: Vec<Member>,
    /// At most one member per symbolic name.
    by_name: HashMap<String, usize>,
    links: Vec<Link>,
    unsatisfied: Vec<Reason>,
}

impl Closure {
    fn position(&self, resource: &Resource) -> Option<usize> {
        match resource.symbolic_name() {
            Some(name) => self
                .by_name
                .get(name)
                .copied()
                .filter(|&index| self.members[index].resource.version() == resource.version()),
            None => self
                .members
                .iter()
                .position(|member| *member.resource == *resource),
        }
    }

    /// True when another version of `resource` is already selected.
    fn clashes(&self, resource: &Resource) -> bool {
        resource
            .symbolic_name()
            .and_then(|name| self.by_name.get(name))
            .is_some_and(|&index| self.members[index].resource.version() != resource.version())
    }

    /// Add `resource` unless an identical one is present. Returns its index
    /// and whether it was newly added.
    fn admit(&mut self, resource: Arc<Resource>, mode: Mode, policy: usize) -> (usize, bool) {
        if let Some(index) = self.position(&resource) {
            return (index, false);
        }
        let index = self.members.len();
        if let Some(name) = resource.symbolic_name() {
            self.by_name.insert(name.to_string(), index);
        }
        self.members.push(Member {
            resource,
            mode,
            policy,
        });
        (index, true)
    }
}

/// A resolution session bound to one snapshot of the repository set.
pub struct Resolver {
    repositories: Arc<Vec<Arc<Repository>>>,
    local: Arc<Repository>,
    installer: Arc<dyn Installer>,
    deploy_lock: Arc<Mutex<()>>,
    options: ResolveOptions,
    interrupt: InterruptHandle,
    roots: Vec<(Root, RootPolicy)>,
    outcome: Outcome,
    required: Vec<Arc<Resource>>,
    optional: Vec<Arc<Resource>>,
    unsatisfied: Vec<Reason>,
    wires: Vec<Wire>,
}

impl Resolver {
    /// Create a session over `repositories` (catalogs, in registration
    /// order) and `local` (installed resources). Sessions sharing
    /// `deploy_lock` never deploy concurrently.
    pub fn new(
        repositories: Arc<Vec<Arc<Repository>>>,
        local: Arc<Repository>,
        installer: Arc<dyn Installer>,
        deploy_lock: Arc<Mutex<()>>,
    ) -> Self {
        Self {
            repositories,
            local,
            installer,
            deploy_lock,
            options: ResolveOptions::default(),
            interrupt: InterruptHandle::new(),
            roots: Vec::new(),
            outcome: Outcome::Pending,
            required: Vec::new(),
            optional: Vec::new(),
            unsatisfied: Vec::new(),
            wires: Vec::new(),
        }
    }

    pub fn with_options(mut self, options: ResolveOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> ResolveOptions {
        self.options
    }

    pub fn repositories(&self) -> &[Arc<Repository>] {
        &self.repositories
    }

    pub fn local_repository(&self) -> &Repository {
        &self.local
    }

    /// Handle that cancels a `resolve()` in progress.
    pub fn interrupt_handle(&self) -> InterruptHandle {
        self.interrupt.clone()
    }

    /// Add a resource to be deployed.
    pub fn add(&mut self, resource: Arc<Resource>) {
        self.add_with_policy(resource, RootPolicy::default());
    }

    pub fn add_with_policy(&mut self, resource: Arc<Resource>, policy: RootPolicy) {
        self.roots.push((Root::Resource(resource), policy));
        self.outcome = Outcome::Pending;
    }

    /// Add a requirement to be met by whatever provides it.
    pub fn add_requirement(&mut self, requirement: Requirement) {
        self.add_requirement_with_policy(requirement, RootPolicy::default());
    }

    pub fn add_requirement_with_policy(&mut self, requirement: Requirement, policy: RootPolicy) {
        self.roots.push((Root::Requirement(requirement), policy));
        self.outcome = Outcome::Pending;
    }

    /// Resources added as roots, in addition order.
    pub fn added_resources(&self) -> Vec<Arc<Resource>> {
        self.roots
            .iter()
            .filter_map(|(root, _)| match root {
                Root::Resource(resource) => Some(Arc::clone(resource)),
                Root::Requirement(_) => None,
            })
            .collect()
    }

    /// Requirements added as roots, in addition order.
    pub fn added_requirements(&self) -> Vec<Requirement> {
        self.roots
            .iter()
            .filter_map(|(root, _)| match root {
                Root::Requirement(requirement) => Some(requirement.clone()),
                Root::Resource(_) => None,
            })
            .collect()
    }

    /// The required closure of the last `resolve()`, roots included.
    pub fn required_resources(&self) -> &[Arc<Resource>] {
        &self.required
    }

    /// Resources pulled in only through optional requirements.
    pub fn optional_resources(&self) -> &[Arc<Resource>] {
        &self.optional
    }

    pub fn unsatisfied_requirements(&self) -> &[Reason] {
        &self.unsatisfied
    }

    pub fn wires(&self) -> &[Wire] {
        &self.wires
    }

    /// Compute the closure of the added roots.
    ///
    /// Returns `Ok(true)` when every mandatory requirement is satisfied and
    /// `Ok(false)` when [`unsatisfied_requirements`](Self::unsatisfied_requirements)
    /// lists at least one problem. All problems are collected in one pass.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Interrupted`] when the session's interrupt handle is
    /// triggered before or during the search; the session then holds no
    /// result.
    pub fn resolve(&mut self) -> Result<bool> {
        self.clear();
        let closure = match self.compute() {
            Ok(closure) => closure,
            Err(err) => {
                self.clear();
                return Err(err);
            }
        };

        let members = &closure.members;
        for member in members {
            match member.mode {
                Mode::Required => self.required.push(Arc::clone(&member.resource)),
                Mode::Optional => self.optional.push(Arc::clone(&member.resource)),
            }
        }
        self.wires = closure
            .links
            .iter()
            .map(|link| Wire {
                requirer: link.requirer.map(|index| Arc::clone(&members[index].resource)),
                requirement: link.requirement.clone(),
                provider: Arc::clone(&members[link.provider].resource),
                mandatory: link.mandatory,
            })
            .collect();
        self.unsatisfied = closure.unsatisfied;

        let resolved = self.unsatisfied.is_empty();
        self.outcome = if resolved {
            Outcome::Resolved
        } else {
            Outcome::Failed
        };
        tracing::info!(
            required = self.required.len(),
            optional = self.optional.len(),
            unsatisfied = self.unsatisfied.len(),
            resolved,
            "Resolution finished"
        );
        Ok(resolved)
    }

    /// Deploy the last successful resolution.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IllegalState`] unless the last `resolve()` succeeded,
    /// and [`Error::Deploy`] when the installer fails.
    pub fn deploy(&self, options: DeployOptions) -> Result<DeployReport> {
        match self.outcome {
            Outcome::Resolved => {}
            Outcome::Pending => {
                return Err(Error::IllegalState(
                    "deploy() called before resolve()".to_string(),
                ));
            }
            Outcome::Failed => {
                return Err(Error::IllegalState(
                    "deploy() called after a failed resolve()".to_string(),
                ));
            }
        }
        Deployer::new(self.installer.as_ref(), &self.deploy_lock).deploy(
            &self.required,
            &self.optional,
            &self.wires,
            options,
        )
    }

    fn clear(&mut self) {
        self.outcome = Outcome::Pending;
        self.required.clear();
        self.optional.clear();
        self.unsatisfied.clear();
        self.wires.clear();
    }

    fn check_interrupt(&self) -> Result<()> {
        if self.interrupt.take() {
            tracing::info!("Resolution interrupted");
            return Err(Error::Interrupted);
        }
        Ok(())
    }

    fn compute(&self) -> Result<Closure> {
        self.check_interrupt()?;

        let no_local;
        let local: &Repository = if self.options.use_local_resources {
            &self.local
        } else {
            no_local = Repository::local(Vec::new());
            &no_local
        };

        let mut closure = Closure::default();
        let mut queue = VecDeque::new();
        for (policy, (root, _)) in self.roots.iter().enumerate() {
            match root {
                Root::Resource(resource) => {
                    if closure.clashes(resource) {
                        tracing::warn!(%resource, "Root conflicts with another version of itself");
                        closure.unsatisfied.push(Reason {
                            requirement: identity_requirement(resource)?,
                            resource: Some(Arc::clone(resource)),
                        });
                        continue;
                    }
                    let (index, added) = closure.admit(Arc::clone(resource), Mode::Required, policy);
                    if added && !resource.is_local() {
                        queue.push_back(Work::Expand(index));
                    }
                }
                Root::Requirement(requirement) => {
                    queue.push_back(Work::Satisfy(Demand {
                        requirer: None,
                        requirement: requirement.clone(),
                        policy,
                        mode: Mode::Required,
                    }));
                }
            }
        }

        self.drain(&mut closure, &mut queue, local)?;
        Ok(closure)
    }

    /// Work through `queue`. Optional requirements wait until every
    /// mandatory requirement reachable so far has been satisfied, so an
    /// optional choice never blocks a mandatory one.
    fn drain(&self, closure: &mut Closure, queue: &mut VecDeque<Work>, local: &Repository) -> Result<()> {
        let mut deferred: VecDeque<Demand> = VecDeque::new();
        loop {
            let work = match queue.pop_front() {
                Some(work) => work,
                None => match deferred.pop_front() {
                    Some(demand) => {
                        self.check_interrupt()?;
                        self.satisfy_optional(closure, &demand, local)?;
                        continue;
                    }
                    None => break,
                },
            };
            self.check_interrupt()?;
            match work {
                Work::Expand(index) => {
                    let member = &closure.members[index];
                    for requirement in member.resource.requirements() {
                        queue.push_back(Work::Satisfy(Demand {
                            requirer: Some(index),
                            requirement: requirement.clone(),
                            policy: member.policy,
                            mode: member.mode,
                        }));
                    }
                }
                Work::Satisfy(demand) if self.is_mandatory(&demand) => {
                    if !self.satisfy(closure, queue, &demand, demand.mode, true, local) {
                        let resource = demand
                            .requirer
                            .map(|index| Arc::clone(&closure.members[index].resource));
                        tracing::debug!(requirement = %demand.requirement, "No provider");
                        closure.unsatisfied.push(Reason {
                            requirement: demand.requirement,
                            resource,
                        });
                    }
                }
                Work::Satisfy(demand) => deferred.push_back(demand),
            }
        }
        Ok(())
    }

    fn is_mandatory(&self, demand: &Demand) -> bool {
        !demand.requirement.is_optional()
            || self.roots[demand.policy]
                .1
                .mandatory_packages
                .covers(&demand.requirement)
    }

    /// Wire `demand` to its provider(s), admitting new members in `mode`.
    /// Returns false when nothing admissible provides it.
    fn satisfy(
        &self,
        closure: &mut Closure,
        queue: &mut VecDeque<Work>,
        demand: &Demand,
        mode: Mode,
        mandatory: bool,
        local: &Repository,
    ) -> bool {
        let providers = self.choose(closure, &demand.requirement, local);
        if providers.is_empty() {
            return false;
        }
        for provider in providers {
            let (index, added) = closure.admit(provider, mode, demand.policy);
            let resource = &closure.members[index].resource;
            if added && !resource.is_local() {
                queue.push_back(Work::Expand(index));
            }
            tracing::debug!(
                requirement = %demand.requirement,
                provider = %resource,
                local = resource.is_local(),
                "Selected provider"
            );
            closure.links.push(Link {
                requirer: demand.requirer,
                requirement: demand.requirement.clone(),
                provider: index,
                mandatory,
            });
        }
        true
    }

    /// Try an optional requirement on a copy of the closure and keep the
    /// copy only if everything it pulled in resolved.
    fn satisfy_optional(&self, closure: &mut Closure, demand: &Demand, local: &Repository) -> Result<()> {
        let mut branch = closure.clone();
        let baseline = branch.unsatisfied.len();
        let mut queue = VecDeque::new();
        if !self.satisfy(&mut branch, &mut queue, demand, Mode::Optional, false, local) {
            tracing::debug!(requirement = %demand.requirement, "Optional requirement omitted");
            return Ok(());
        }
        self.drain(&mut branch, &mut queue, local)?;
        if branch.unsatisfied.len() > baseline {
            tracing::warn!(
                requirement = %demand.requirement,
                problems = branch.unsatisfied.len() - baseline,
                "Discarding optional requirement whose providers cannot be resolved"
            );
            return Ok(());
        }
        *closure = branch;
        Ok(())
    }

    fn choose(&self, closure: &Closure, requirement: &Requirement, local: &Repository) -> Vec<Arc<Resource>> {
        let mut candidates: Vec<Arc<Resource>> = closure
            .members
            .iter()
            .filter(|member| member.resource.satisfies(requirement))
            .map(|member| Arc::clone(&member.resource))
            .collect();

        if !requirement.is_multiple() && !candidates.is_empty() {
            return selector::select_best(&candidates).into_iter().collect();
        }

        for provider in selector::find_providers(requirement, &self.repositories, local) {
            if !closure.clashes(&provider) && !candidates.contains(&provider) {
                candidates.push(provider);
            }
        }

        if requirement.is_multiple() {
            selector::select_per_name(&candidates)
        } else {
            selector::select_best(&candidates).into_iter().collect()
        }
    }
}

/// `bundle:(&(symbolicname=N)(version=V))` for a named resource.
fn identity_requirement(resource: &Resource) -> Result<Requirement> {
    let name = resource.symbolic_name().unwrap_or_default();
    Ok(Requirement::bundle(
        name,
        &VersionRange::exact(resource.version().clone()),
    )?)
}
