//! Bookkeeping of the instance fleet.

use std::collections::btree_map::Values;
use std::collections::{BTreeMap, BTreeSet};

use crate::core::instance::InstanceRecord;

/// Outcome of a counter update.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CounterUpdate {
    Applied,
    /// Counters would have gone below zero and were clamped.
    Clamped,
    UnknownInstance,
}

/// Stores the created instances, the in-flight creation requests and the mapping from instance to the compute backend
/// (datacenter component) hosting it.
///
/// This is the only place where instance state is modified. Instances are kept ordered by ID, so every iteration over
/// the fleet visits them from the lowest ID.
#[derive(Default)]
pub struct FleetLedger {
    instances: BTreeMap<u32, InstanceRecord>,
    backends: BTreeMap<u32, u32>,
    requested: BTreeSet<u32>,
}

impl FleetLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remembers that creation of instance was requested.
    pub fn register_request(&mut self, instance_id: u32) {
        self.requested.insert(instance_id);
    }

    /// Forgets creation request, returns whether it was known.
    pub fn resolve_request(&mut self, instance_id: u32) -> bool {
        self.requested.remove(&instance_id)
    }

    /// Returns the number of creation requests awaiting acknowledgement.
    pub fn requested_count(&self) -> usize {
        self.requested.len()
    }

    /// Adds created instance hosted by the given backend.
    pub fn add_instance(&mut self, instance: InstanceRecord, backend: u32) {
        self.backends.insert(instance.id, backend);
        self.instances.insert(instance.id, instance);
    }

    /// Removes instance, returns its last state.
    pub fn remove_instance(&mut self, instance_id: u32) -> Option<InstanceRecord> {
        self.backends.remove(&instance_id);
        self.instances.remove(&instance_id)
    }

    pub fn get(&self, instance_id: u32) -> Option<&InstanceRecord> {
        self.instances.get(&instance_id)
    }

    pub fn contains(&self, instance_id: u32) -> bool {
        self.instances.contains_key(&instance_id)
    }

    pub fn backend(&self, instance_id: u32) -> Option<u32> {
        self.backends.get(&instance_id).copied()
    }

    /// Returns an iterator over all created instances (including retiring ones) in ID order.
    pub fn instances(&self) -> Values<u32, InstanceRecord> {
        self.instances.values()
    }

    /// Returns the number of created instances (including retiring ones).
    pub fn active_count(&self) -> usize {
        self.instances.len()
    }

    pub fn retiring_count(&self) -> usize {
        self.instances.values().filter(|i| i.retiring).count()
    }

    /// Sum of queued load over all instances.
    pub fn total_load(&self) -> u64 {
        self.instances.values().map(|i| i.queued_load).sum()
    }

    /// Marks or unmarks instance as retiring, returns whether the flag has changed.
    pub fn set_retiring(&mut self, instance_id: u32, retiring: bool) -> bool {
        match self.instances.get_mut(&instance_id) {
            Some(instance) if instance.retiring != retiring => {
                instance.retiring = retiring;
                true
            }
            _ => false,
        }
    }

    pub fn set_destroy_requested(&mut self, instance_id: u32, requested: bool) {
        if let Some(instance) = self.instances.get_mut(&instance_id) {
            instance.destroy_requested = requested;
        }
    }

    /// Accounts job dispatched to the instance.
    pub fn add_job(&mut self, instance_id: u32, load: u64) -> CounterUpdate {
        match self.instances.get_mut(&instance_id) {
            Some(instance) => {
                instance.queued_job_count += 1;
                instance.queued_load += load;
                CounterUpdate::Applied
            }
            None => CounterUpdate::UnknownInstance,
        }
    }

    /// Accounts job completed (or rejected) by the instance.
    pub fn remove_job(&mut self, instance_id: u32, load: u64) -> CounterUpdate {
        match self.instances.get_mut(&instance_id) {
            Some(instance) => {
                let clamped = instance.queued_job_count == 0 || instance.queued_load < load;
                instance.queued_job_count = instance.queued_job_count.saturating_sub(1);
                instance.queued_load = instance.queued_load.saturating_sub(load);
                if clamped {
                    CounterUpdate::Clamped
                } else {
                    CounterUpdate::Applied
                }
            }
            None => CounterUpdate::UnknownInstance,
        }
    }
}
