//! [`RecordingInstaller`]: an in-memory platform for deployment tests.

use std::sync::{Arc, Mutex};

use chrono::Utc;
use modrepo_model::{InstalledHandle, InstanceState, Resource};
use modrepo_resolver::{DeployStep, Installer, InstallerError, InstallerResult};

#[derive(Default)]
struct State {
    installed: Vec<Arc<Resource>>,
    calls: Vec<(DeployStep, String)>,
    failures: Vec<(DeployStep, String)>,
    next_id: u64,
}

/// Installer double that keeps installed resources in memory.
///
/// Every call is recorded as `(step, name)` where `name` is the symbolic
/// name of the resource involved (its id when anonymous). Failures are
/// injected per step and name with [`fail_on`](Self::fail_on).
///
/// # Example
///
/// ```rust
/// use modrepo_model::InstanceState;
/// use modrepo_resolver::{DeployStep, Installer};
/// use modrepo_test_utils::{RecordingInstaller, fixtures};
///
/// let installer = RecordingInstaller::new();
/// installer.install_local(fixtures::resource("org.a", "1.0").build(), InstanceState::Active);
/// installer.fail_on(DeployStep::Install, "org.b");
/// assert_eq!(installer.installed().len(), 1);
/// ```
#[derive(Default)]
pub struct RecordingInstaller {
    state: Mutex<State>,
}

impl RecordingInstaller {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `snapshot` as already installed, returning the local resource.
    pub fn install_local(&self, snapshot: Resource, state: InstanceState) -> Arc<Resource> {
        let mut guard = self.state.lock().unwrap();
        let handle = Self::next_handle(&mut guard, &snapshot, state);
        let local = Arc::new(Resource::local(handle, snapshot));
        guard.installed.push(Arc::clone(&local));
        local
    }

    /// Make the next `step` call for `name` fail.
    pub fn fail_on(&self, step: DeployStep, name: &str) {
        self.state
            .lock()
            .unwrap()
            .failures
            .push((step, name.to_string()));
    }

    /// Every call made so far, in order.
    pub fn calls(&self) -> Vec<(DeployStep, String)> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Calls made so far for one step.
    pub fn calls_for(&self, step: DeployStep) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|(s, _)| *s == step)
            .map(|(_, name)| name)
            .collect()
    }

    /// The installed resource named `name`, if any.
    pub fn find(&self, name: &str) -> Option<Arc<Resource>> {
        self.state
            .lock()
            .unwrap()
            .installed
            .iter()
            .find(|r| r.symbolic_name() == Some(name))
            .cloned()
    }

    fn name_of(resource: &Resource) -> String {
        resource
            .symbolic_name()
            .map(str::to_string)
            .unwrap_or_else(|| resource.id().to_string())
    }

    fn next_handle(state: &mut State, resource: &Resource, instance: InstanceState) -> InstalledHandle {
        state.next_id += 1;
        InstalledHandle {
            id: state.next_id,
            location: resource
                .uri()
                .map(str::to_string)
                .unwrap_or_else(|| format!("memory:{}", resource.id())),
            state: instance,
            last_modified: Utc::now(),
        }
    }

    /// Record a call and apply any injected failure.
    fn record(state: &mut State, step: DeployStep, name: String) -> InstallerResult<()> {
        state.calls.push((step, name.clone()));
        if let Some(index) = state
            .failures
            .iter()
            .position(|(s, n)| *s == step && *n == name)
        {
            state.failures.remove(index);
            return Err(InstallerError::new(format!("injected {step} failure for {name}")));
        }
        Ok(())
    }

    /// Replace the installed entry behind `handle`, returning its name.
    fn rebind(
        state: &mut State,
        handle: &InstalledHandle,
        rebuild: impl FnOnce(&Resource) -> Resource,
    ) -> InstallerResult<String> {
        let index = state
            .installed
            .iter()
            .position(|r| r.installed().is_some_and(|h| h.id == handle.id))
            .ok_or_else(|| InstallerError::new(format!("no instance with id {}", handle.id)))?;
        let current = Arc::clone(&state.installed[index]);
        let next = rebuild(&*current);
        let name = Self::name_of(&next);
        state.installed[index] = Arc::new(next);
        Ok(name)
    }

    fn set_state(
        state: &mut State,
        handle: &InstalledHandle,
        step: DeployStep,
        instance: InstanceState,
    ) -> InstallerResult<()> {
        let name = state
            .installed
            .iter()
            .find(|r| r.installed().is_some_and(|h| h.id == handle.id))
            .map(|r| Self::name_of(r))
            .ok_or_else(|| InstallerError::new(format!("no instance with id {}", handle.id)))?;
        Self::record(state, step, name)?;
        Self::rebind(state, handle, |current| {
            let mut next = current.installed().cloned().unwrap_or_else(|| handle.clone());
            next.state = instance;
            Resource::local(next, current.clone())
        })?;
        Ok(())
    }
}

impl Installer for RecordingInstaller {
    fn installed(&self) -> Vec<Arc<Resource>> {
        self.state.lock().unwrap().installed.clone()
    }

    fn install(&self, resource: &Resource) -> InstallerResult<InstalledHandle> {
        let mut guard = self.state.lock().unwrap();
        Self::record(&mut guard, DeployStep::Install, Self::name_of(resource))?;
        let handle = Self::next_handle(&mut guard, resource, InstanceState::Installed);
        guard
            .installed
            .push(Arc::new(Resource::local(handle.clone(), resource.clone())));
        Ok(handle)
    }

    fn update(&self, handle: &InstalledHandle, resource: &Resource) -> InstallerResult<()> {
        let mut guard = self.state.lock().unwrap();
        Self::record(&mut guard, DeployStep::Update, Self::name_of(resource))?;
        Self::rebind(&mut guard, handle, |current| {
            let mut next = current.installed().cloned().unwrap_or_else(|| handle.clone());
            next.last_modified = Utc::now();
            Resource::local(next, resource.clone())
        })?;
        Ok(())
    }

    fn start(&self, handle: &InstalledHandle) -> InstallerResult<()> {
        let mut guard = self.state.lock().unwrap();
        Self::set_state(&mut guard, handle, DeployStep::Start, InstanceState::Active)
    }

    fn stop(&self, handle: &InstalledHandle) -> InstallerResult<()> {
        let mut guard = self.state.lock().unwrap();
        Self::set_state(&mut guard, handle, DeployStep::Stop, InstanceState::Resolved)
    }
}
