// src/engine/registry.rs

use std::collections::HashMap;
use std::sync::Arc;

use crate::job::{JobDescriptor, JobScope, RunnerHandle};
use crate::types::JobName;

/// Which registries hold a given name, observed in one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Presence {
    pub descriptor: bool,
    pub scope: bool,
    pub runner: bool,
}

impl Presence {
    /// Registered in all three maps.
    pub fn is_active(&self) -> bool {
        self.descriptor && self.scope && self.runner
    }

    /// Registered in none of them.
    pub fn is_absent(&self) -> bool {
        !(self.descriptor || self.scope || self.runner)
    }
}

/// The three name-keyed maps. Entries are only ever inserted or removed all
/// together, so outside the engine lock a name is in all of them or none.
#[derive(Debug, Default)]
pub struct Registry {
    descriptors: HashMap<JobName, Arc<JobDescriptor>>,
    scopes: HashMap<JobName, Arc<JobScope>>,
    runners: HashMap<JobName, RunnerHandle>,
    /// Submitted jobs whose `JOB_ACCEPTED` is still being sent, with the
    /// first completion that arrived in the meantime.
    held: HashMap<JobName, Option<Arc<JobScope>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.descriptors.contains_key(name)
            || self.scopes.contains_key(name)
            || self.runners.contains_key(name)
    }

    pub fn presence(&self, name: &str) -> Presence {
        Presence {
            descriptor: self.descriptors.contains_key(name),
            scope: self.scopes.contains_key(name),
            runner: self.runners.contains_key(name),
        }
    }

    pub fn insert(
        &mut self,
        descriptor: Arc<JobDescriptor>,
        scope: Arc<JobScope>,
        runner: RunnerHandle,
    ) {
        let name = descriptor.name().to_string();
        self.scopes.insert(name.clone(), scope);
        self.runners.insert(name.clone(), runner);
        self.descriptors.insert(name, descriptor);
    }

    /// Drop `name` from every map. Returns whether anything was removed.
    pub fn remove(&mut self, name: &str) -> bool {
        let descriptor = self.descriptors.remove(name).is_some();
        let scope = self.scopes.remove(name).is_some();
        let runner = self.runners.remove(name).is_some();
        descriptor || scope || runner
    }

    /// Hold back completion of `name` until [`Registry::release`].
    pub fn hold(&mut self, name: &str) {
        self.held.insert(name.to_string(), None);
    }

    /// Park `scope` if its job is held. Returns whether it was parked (or a
    /// completion was already parked, in which case `scope` is dropped).
    pub fn defer_completion(&mut self, scope: &Arc<JobScope>) -> bool {
        match self.held.get_mut(scope.name()) {
            Some(slot) => {
                slot.get_or_insert_with(|| Arc::clone(scope));
                true
            }
            None => false,
        }
    }

    /// End the hold on `name`, returning a completion parked meanwhile.
    pub fn release(&mut self, name: &str) -> Option<Arc<JobScope>> {
        self.held.remove(name).flatten()
    }

    pub fn scope(&self, name: &str) -> Option<Arc<JobScope>> {
        self.scopes.get(name).cloned()
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<JobName> {
        let mut names: Vec<JobName> = self.descriptors.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}
