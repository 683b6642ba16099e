//! Deployment of a resolved closure through the [`Installer`].
//!
//! Deployment runs in three steps:
//!
//! 1. **Plan**: each selected resource is classified against a fresh
//!    snapshot of the installed resources as unchanged, a fresh install, or
//!    an update of an installed instance with the same symbolic name.
//! 2. **Install/update**: changed resources are processed providers first,
//!    following the mandatory wires recorded during resolution. Running
//!    instances are stopped before their update.
//! 3. **Start**: resources that should run are started in the same order.
//!    Fragments are never started.
//!
//! The first installer error aborts the batch. Completed steps are not
//! rolled back; the error carries a [`DeployReport`] of what was done.

use std::fmt;
use std::ops::{BitOr, BitOrAssign};
use std::sync::{Arc, Mutex};

use modrepo_model::{InstalledHandle, Resource};

use crate::error::{Error, Result};
use crate::graph::DependencyGraph;
use crate::installer::{Installer, InstallerError};
use crate::resolver::Wire;

/// Deployment flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct DeployOptions(u8);

impl DeployOptions {
    /// Start deployed resources once everything is installed.
    pub const START: Self = Self(1);
    /// Deploy only the required closure.
    pub const NO_OPTIONAL_RESOURCES: Self = Self(1 << 1);

    pub const fn empty() -> Self {
        Self(0)
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for DeployOptions {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for DeployOptions {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

/// What deployment does with one resource.
#[derive(Debug, Clone, PartialEq)]
pub enum DeployAction {
    /// Already installed at this identity; nothing to do.
    Unchanged,
    Install,
    /// Replace the content of an installed instance.
    Update { target: Arc<Resource> },
}

/// Installer call that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeployStep {
    Install,
    Update,
    Start,
    Stop,
}

impl fmt::Display for DeployStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DeployStep::Install => "install",
            DeployStep::Update => "update",
            DeployStep::Start => "start",
            DeployStep::Stop => "stop",
        })
    }
}

/// Per-resource progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeployState {
    Planned,
    Installed,
    Updated,
    Started,
    Failed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeployEntry {
    pub resource: Arc<Resource>,
    pub action: DeployAction,
    pub state: DeployState,
}

/// Outcome of a deployment, in deployment order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeployReport {
    pub entries: Vec<DeployEntry>,
}

impl DeployReport {
    pub fn entry(&self, resource: &Resource) -> Option<&DeployEntry> {
        self.entries.iter().find(|entry| *entry.resource == *resource)
    }

    pub fn state_of(&self, resource: &Resource) -> Option<DeployState> {
        self.entry(resource).map(|entry| entry.state)
    }

    /// Entries with an install or update action.
    pub fn changed(&self) -> impl Iterator<Item = &DeployEntry> {
        self.entries
            .iter()
            .filter(|entry| entry.action != DeployAction::Unchanged)
    }

    pub fn failed(&self) -> Option<&DeployEntry> {
        self.entries
            .iter()
            .find(|entry| entry.state == DeployState::Failed)
    }
}

/// Classify `resource` against the installed resources.
///
/// A catalog resource updates the first installed resource with the same
/// symbolic name when the versions differ or the catalog copy is newer.
pub fn plan(resource: &Resource, installed: &[Arc<Resource>]) -> DeployAction {
    if resource.is_local() {
        return DeployAction::Unchanged;
    }
    let Some(name) = resource.symbolic_name() else {
        return DeployAction::Install;
    };
    let Some(target) = installed
        .iter()
        .find(|local| local.symbolic_name() == Some(name))
    else {
        return DeployAction::Install;
    };

    let newer = match (resource.last_modified(), target.last_modified()) {
        (Some(candidate), Some(current)) => candidate > current,
        _ => false,
    };
    if target.version() != resource.version() || newer {
        DeployAction::Update {
            target: Arc::clone(target),
        }
    } else {
        DeployAction::Unchanged
    }
}

/// Order `resources` so that providers of mandatory wires come first.
///
/// Resources unrelated by wires keep their relative order.
pub fn order(resources: &[Arc<Resource>], wires: &[Wire]) -> Vec<Arc<Resource>> {
    let key = |index: usize| -> String {
        let resource = &resources[index];
        match resource.symbolic_name() {
            Some(_) => resource.to_string(),
            None => format!("{resource}#{index}"),
        }
    };
    let index_of = |resource: &Resource| resources.iter().position(|r| **r == *resource);

    let mut graph = DependencyGraph::new();
    let keys: Vec<String> = (0..resources.len()).map(key).collect();
    for id in &keys {
        graph.add_node(id.as_str());
    }
    for wire in wires.iter().filter(|wire| wire.mandatory) {
        let Some(requirer) = &wire.requirer else {
            continue;
        };
        if let (Some(from), Some(to)) = (index_of(requirer.as_ref()), index_of(wire.provider.as_ref())) {
            graph.add_edge(&keys[from], &keys[to]);
        }
    }

    tracing::debug!(
        resources = graph.node_count(),
        dependencies = graph.edge_count(),
        "Ordering deployment"
    );
    let sorted = graph.topological_order();
    for id in &sorted.cycle {
        tracing::debug!(resource = %id, depends_on = ?graph.dependencies_of(id), "Unordered cycle member");
    }

    sorted
        .order
        .iter()
        .filter_map(|id| keys.iter().position(|key| key == id))
        .map(|index| Arc::clone(&resources[index]))
        .collect()
}

/// Executes deployments while holding the shared deploy lock.
pub struct Deployer<'a> {
    installer: &'a dyn Installer,
    lock: &'a Mutex<()>,
}

impl<'a> Deployer<'a> {
    pub fn new(installer: &'a dyn Installer, lock: &'a Mutex<()>) -> Self {
        Self { installer, lock }
    }

    /// Deploy the required closure, plus the optional closure unless
    /// [`DeployOptions::NO_OPTIONAL_RESOURCES`] is set.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Deploy`] naming the resource and step of the first
    /// installer failure.
    pub fn deploy(
        &self,
        required: &[Arc<Resource>],
        optional: &[Arc<Resource>],
        wires: &[Wire],
        options: DeployOptions,
    ) -> Result<DeployReport> {
        let _guard = self.lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        let mut selected: Vec<Arc<Resource>> = required.to_vec();
        if !options.contains(DeployOptions::NO_OPTIONAL_RESOURCES) {
            selected.extend(optional.iter().cloned());
        }

        let installed = self.installer.installed();
        let mut report = DeployReport {
            entries: order(&selected, wires)
                .into_iter()
                .map(|resource| {
                    let action = plan(&resource, &installed);
                    DeployEntry {
                        resource,
                        action,
                        state: DeployState::Planned,
                    }
                })
                .collect(),
        };
        tracing::info!(
            resources = report.entries.len(),
            changed = report.changed().count(),
            "Deploying"
        );

        // Handles to start once every install and update is done.
        let mut to_start: Vec<(usize, InstalledHandle)> = Vec::new();

        for index in 0..report.entries.len() {
            let entry = &report.entries[index];
            let resource = Arc::clone(&entry.resource);
            match entry.action.clone() {
                DeployAction::Unchanged => {}
                DeployAction::Install => {
                    let handle = self
                        .installer
                        .install(&resource)
                        .map_err(|err| failure(&mut report, index, DeployStep::Install, err))?;
                    tracing::info!(%resource, id = handle.id, "Installed");
                    report.entries[index].state = DeployState::Installed;
                    if options.contains(DeployOptions::START) {
                        to_start.push((index, handle));
                    }
                }
                DeployAction::Update { target } => {
                    let Some(handle) = target.installed().cloned() else {
                        return Err(failure(
                            &mut report,
                            index,
                            DeployStep::Update,
                            InstallerError::new(format!("{target} is not installed")),
                        ));
                    };
                    let was_running = handle.state.is_running();
                    if was_running {
                        self.installer
                            .stop(&handle)
                            .map_err(|err| failure(&mut report, index, DeployStep::Stop, err))?;
                        tracing::info!(resource = %target, "Stopped for update");
                    }
                    self.installer
                        .update(&handle, &resource)
                        .map_err(|err| failure(&mut report, index, DeployStep::Update, err))?;
                    tracing::info!(from = %target, to = %resource, "Updated");
                    report.entries[index].state = DeployState::Updated;
                    if was_running || options.contains(DeployOptions::START) {
                        to_start.push((index, handle));
                    }
                }
            }
        }

        for (index, handle) in to_start {
            let resource = Arc::clone(&report.entries[index].resource);
            if resource.is_fragment() {
                tracing::debug!(%resource, "Not starting fragment");
                continue;
            }
            self.installer
                .start(&handle)
                .map_err(|err| failure(&mut report, index, DeployStep::Start, err))?;
            tracing::info!(%resource, "Started");
            report.entries[index].state = DeployState::Started;
        }

        Ok(report)
    }
}

fn failure(report: &mut DeployReport, index: usize, step: DeployStep, err: InstallerError) -> Error {
    report.entries[index].state = DeployState::Failed;
    let resource = report.entries[index].resource.to_string();
    tracing::error!(%resource, %step, reason = %err, "Deployment failed");
    Error::Deploy {
        resource,
        step,
        reason: err.message,
        report: Box::new(report.clone()),
    }
}
