mod sorting;

use std::{
    panic::{catch_unwind, AssertUnwindSafe},
    sync::{Arc, Mutex, PoisonError},
};

use itertools::Itertools;
use smallvec::SmallVec;

pub use sorting::*;

use crate::{
    error::{Error, Result, SystemError, SystemResult},
    system::{BoxedSystem, System},
    ComponentRegistry, EntityLayer, JobHandle, JobSystem, UpdateData,
};

/// Selects how the execution graph of a [`SystemsManager`] is built
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SchedulePolicy {
    /// Only explicit dependencies order systems. Systems with conflicting
    /// access and no dependency may run concurrently and fail with a borrow
    /// conflict.
    Dependencies,
    /// Explicit dependencies, plus an inferred edge between every pair of
    /// systems with conflicting access
    #[default]
    Conflicts,
}

/// Refers to a system added to a [`SystemsManager`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SystemId(usize);

impl SystemId {
    /// Returns the registration index of the system
    pub fn index(self) -> usize {
        self.0
    }
}

/// Owns the systems of a layer, orders them into a graph and runs them.
///
/// Each frame every system is filled, updated and committed. Once all systems
/// have finished the commands they recorded are applied in execution order.
pub struct SystemsManager {
    registry: Arc<ComponentRegistry>,
    policy: SchedulePolicy,
    systems: Vec<BoxedSystem>,
    data: Vec<UpdateData>,
    access: Vec<Access>,
    nodes: Vec<SystemNode>,
    dirty: bool,
}

impl SystemsManager {
    /// Creates a manager using the default [`SchedulePolicy`]
    pub fn new(registry: Arc<ComponentRegistry>) -> Self {
        Self::with_policy(registry, SchedulePolicy::default())
    }

    /// Creates a manager with the given scheduling policy
    pub fn with_policy(registry: Arc<ComponentRegistry>, policy: SchedulePolicy) -> Self {
        Self {
            registry,
            policy,
            systems: Vec::new(),
            data: Vec::new(),
            access: Vec::new(),
            nodes: Vec::new(),
            dirty: false,
        }
    }

    /// Returns the scheduling policy
    pub fn policy(&self) -> SchedulePolicy {
        self.policy
    }

    /// Adds a system, resolving its requirements against the registry.
    ///
    /// Fails if a system with the same name exists, or if the system requests
    /// an unregistered component.
    pub fn add(&mut self, system: impl System + 'static) -> Result<SystemId> {
        self.add_boxed(Box::new(system))
    }

    /// Same as [`Self::add`] for an already boxed system
    pub fn add_boxed(&mut self, system: BoxedSystem) -> Result<SystemId> {
        let desc = system.desc();
        if self.systems.iter().any(|v| v.desc().name() == desc.name()) {
            return Err(Error::DuplicateSystem(desc.name().into()));
        }

        let requests = desc.requirements().resolve(&self.registry)?;
        let data = UpdateData::new(&self.registry, &requests, desc.requirements().tags());
        let access = Access::from_requests(&requests);

        tracing::debug!(
            name = desc.name(),
            requests = %requests.iter().join(", "),
            "added system"
        );

        let id = SystemId(self.systems.len());
        self.systems.push(system);
        self.data.push(data);
        self.access.push(access);
        self.dirty = true;
        Ok(id)
    }

    /// Returns the number of systems
    pub fn len(&self) -> usize {
        self.systems.len()
    }

    /// Returns true if no systems are added
    pub fn is_empty(&self) -> bool {
        self.systems.is_empty()
    }

    /// Builds and sorts the execution graph.
    ///
    /// Called automatically by the update functions when systems were added.
    pub fn initialize(&mut self) -> Result<()> {
        if !self.dirty {
            return Ok(());
        }

        profile_function!();
        let descs = self.systems.iter().map(|v| v.desc()).collect_vec();
        let nodes = match self.policy {
            SchedulePolicy::Dependencies => order_by_dependencies(&descs)?,
            SchedulePolicy::Conflicts => order_by_components(&descs, &self.access)?,
        };

        self.nodes = sort_topologically(nodes, &descs)?;
        self.dirty = false;

        tracing::debug!(
            policy = ?self.policy,
            order = %self.ordered_names().join(" -> "),
            "built schedule"
        );

        Ok(())
    }

    /// Returns the sorted execution graph
    pub fn nodes(&self) -> &[SystemNode] {
        &self.nodes
    }

    /// Returns the system names in execution order
    pub fn ordered_names(&self) -> Vec<&str> {
        self.nodes
            .iter()
            .map(|v| self.systems[v.system].desc().name())
            .collect()
    }

    /// Returns the update data of a system, as filled in the last frame
    pub fn data(&self, id: SystemId) -> Option<&UpdateData> {
        self.data.get(id.0)
    }

    /// Runs all systems on the job system.
    ///
    /// A system starts once all the systems it depends on are finished, and
    /// all systems are finished when this returns. The first error in
    /// execution order is returned, after the commands of all succeeding
    /// systems are applied.
    pub fn update(&mut self, layer: &mut EntityLayer, jobs: &JobSystem) -> SystemResult<()> {
        profile_function!();
        self.check_registry(layer)?;
        self.initialize()?;

        let errors = Mutex::new(Vec::new());
        {
            let shared: &EntityLayer = layer;
            let nodes = &self.nodes;
            let errors = &errors;

            let mut work = self
                .systems
                .iter_mut()
                .zip(self.data.iter_mut())
                .map(Some)
                .collect_vec();

            jobs.scope(|s| {
                let mut handles: Vec<Option<JobHandle>> = vec![None; nodes.len()];
                let mut spawned = 0;

                while spawned < nodes.len() {
                    let mut progressed = false;
                    for (index, node) in nodes.iter().enumerate() {
                        if handles[index].is_some() {
                            continue;
                        }

                        let deps = node
                            .incoming
                            .iter()
                            .map(|&v| handles[v])
                            .collect::<Option<SmallVec<[JobHandle; 4]>>>();

                        let Some(deps) = deps.filter(|v| v.iter().all(|&h| s.is_finished(h)))
                        else {
                            continue;
                        };

                        let Some((system, data)) = work[node.system].take() else {
                            continue;
                        };

                        handles[index] = Some(s.spawn(move || {
                            for dep in deps {
                                jobs.wait(dep);
                            }

                            if let Err(err) = run_system(system.as_mut(), data, shared) {
                                errors
                                    .lock()
                                    .unwrap_or_else(PoisonError::into_inner)
                                    .push((index, err));
                            }
                        }));

                        spawned += 1;
                        progressed = true;
                    }

                    if !progressed && !s.help() {
                        std::hint::spin_loop();
                    }
                }
            });
        }

        let mut errors = errors.into_inner().unwrap_or_else(PoisonError::into_inner);
        errors.sort_by_key(|v| v.0);
        let failed = errors.iter().map(|v| self.nodes[v.0].system).collect_vec();

        let result = self.apply_commands(layer, &failed);
        match errors.into_iter().next() {
            Some((_, err)) => Err(err),
            None => result,
        }
    }

    /// Runs all systems one after another on the calling thread.
    ///
    /// Stops at the first failing system. Commands of the systems which ran
    /// successfully are applied either way.
    pub fn update_seq(&mut self, layer: &mut EntityLayer) -> SystemResult<()> {
        profile_function!();
        self.check_registry(layer)?;
        self.initialize()?;

        let mut failure = None;
        for node in &self.nodes {
            let system = &mut self.systems[node.system];
            let data = &mut self.data[node.system];

            if let Err(err) = run_system(system.as_mut(), data, layer) {
                failure = Some((node.system, err));
                break;
            }
        }

        let failed = failure.iter().map(|v| v.0).collect_vec();
        let result = self.apply_commands(layer, &failed);
        match failure {
            Some((_, err)) => Err(err),
            None => result,
        }
    }

    /// Component ids of the systems are only meaningful for layers sharing the
    /// same registry
    fn check_registry(&self, layer: &EntityLayer) -> Result<()> {
        if Arc::ptr_eq(&self.registry, layer.registry()) {
            Ok(())
        } else {
            Err(Error::RegistryMismatch)
        }
    }

    /// Applies the commands of every system in execution order, discarding
    /// the commands of failed systems.
    fn apply_commands(&mut self, layer: &mut EntityLayer, failed: &[usize]) -> SystemResult<()> {
        let mut result = Ok(());
        for node in &self.nodes {
            let data = &mut self.data[node.system];
            if failed.contains(&node.system) {
                data.commands().clear();
                continue;
            }

            if let Err(source) = data.commit_changes(layer) {
                let name = self.systems[node.system].desc().name().to_string();
                tracing::error!(%name, "failed to apply commands: {source:#}");
                if result.is_ok() {
                    result = Err(SystemError::Failed { name, source });
                }
            }
        }

        result
    }
}

/// Fills, updates and commits a single system
fn run_system(
    system: &mut dyn System,
    data: &mut UpdateData,
    layer: &EntityLayer,
) -> SystemResult<()> {
    profile_scope!("run_system", system.desc().name());
    tracing::trace!(name = system.desc().name(), "running system");

    let result = catch_unwind(AssertUnwindSafe(|| {
        data.fill(layer);
        let result = system.update(data);
        if result.is_ok() {
            data.commit(layer);
        }
        result
    }));

    let name = || system.desc().name().to_string();
    match result {
        Ok(Ok(())) => Ok(()),
        Ok(Err(source)) => Err(SystemError::Failed {
            name: name(),
            source,
        }),
        Err(_) => {
            tracing::error!(name = system.desc().name(), "system panicked");
            Err(SystemError::Panicked { name: name() })
        }
    }
}

impl core::fmt::Debug for SystemsManager {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SystemsManager")
            .field("policy", &self.policy)
            .field("order", &self.ordered_names())
            .finish()
    }
}
