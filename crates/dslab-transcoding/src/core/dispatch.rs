//! Job dispatch policies.

use crate::core::config::parse_config_value;
use crate::core::error::ParameterError;
use crate::core::instance::InstanceRecord;
use crate::core::job::JobRecord;
use crate::core::ledger::FleetLedger;

/// Trait for implementation of job dispatch policies.
///
/// The policy is a function of the pending job and the current fleet state, which returns an ID of instance selected
/// for running the job or `None` if there is no suitable instance. It is evaluated for every job separately, so each
/// decision sees the counters updated by the previous one.
///
/// Policies must only consider instances that accept jobs (see [`InstanceRecord::accepts_jobs`]) and may only use the
/// predicted job size, since the actual one is not known before completion.
pub trait DispatchPolicy {
    fn select_instance(&self, job: &JobRecord, ledger: &FleetLedger) -> Option<u32>;

    fn name(&self) -> String;
}

/// Creates dispatch policy by its name.
pub fn dispatch_policy_resolver(config_str: &str) -> Result<Box<dyn DispatchPolicy>, ParameterError> {
    let (policy_name, _) = parse_config_value(config_str);
    match policy_name.as_str() {
        "ShortestQueue" | "qlen" => Ok(Box::new(ShortestQueue::new())),
        "LeastLoad" | "load" => Ok(Box::new(LeastLoad::new())),
        _ => Err(ParameterError::UnknownDispatchPolicy(config_str.to_string())),
    }
}

/// Returns the eligible instance minimizing the given key, ties are broken by the lowest ID.
fn select_min_by_key<K, F>(ledger: &FleetLedger, key: F) -> Option<u32>
where
    K: Ord,
    F: Fn(&InstanceRecord) -> K,
{
    let mut best: Option<(K, u32)> = None;
    for instance in ledger.instances().filter(|i| i.accepts_jobs()) {
        let value = key(instance);
        if best.as_ref().map_or(true, |(best_value, _)| value < *best_value) {
            best = Some((value, instance.id));
        }
    }
    best.map(|(_, id)| id)
}

////////////////////////////////////////////////////////////////////////////////

/// Selects the instance with the smallest number of queued jobs.
#[derive(Default)]
pub struct ShortestQueue;

impl ShortestQueue {
    pub fn new() -> Self {
        Self {}
    }
}

impl DispatchPolicy for ShortestQueue {
    fn select_instance(&self, _job: &JobRecord, ledger: &FleetLedger) -> Option<u32> {
        select_min_by_key(ledger, |instance| instance.queued_job_count())
    }

    fn name(&self) -> String {
        "ShortestQueue".to_string()
    }
}

////////////////////////////////////////////////////////////////////////////////

/// Selects the instance with the smallest queued load (sum of predicted sizes of its jobs).
#[derive(Default)]
pub struct LeastLoad;

impl LeastLoad {
    pub fn new() -> Self {
        Self {}
    }
}

impl DispatchPolicy for LeastLoad {
    fn select_instance(&self, _job: &JobRecord, ledger: &FleetLedger) -> Option<u32> {
        select_min_by_key(ledger, |instance| instance.queued_load())
    }

    fn name(&self) -> String {
        "LeastLoad".to_string()
    }
}

////////////////////////////////////////////////////////////////////////////////

/// Routing decision for a single pending job.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Route {
    /// Job should be sent to the instance.
    Instance(u32),
    /// No instance accepts jobs now.
    NoCapacity,
    /// Job is bound to an instance which is gone or being destroyed.
    StaleBinding(u32),
}

/// Routes job to an instance. Bound jobs bypass the policy.
pub fn route(policy: &dyn DispatchPolicy, job: &JobRecord, ledger: &FleetLedger) -> Route {
    if let Some(instance_id) = job.bound_instance {
        return match ledger.get(instance_id) {
            Some(instance) if !instance.is_destroy_requested() => Route::Instance(instance_id),
            _ => Route::StaleBinding(instance_id),
        };
    }
    match policy.select_instance(job, ledger) {
        Some(instance_id) => Route::Instance(instance_id),
        None => Route::NoCapacity,
    }
}
