//! Trait for workload sources.

use std::collections::VecDeque;

/// Represents information about a single job produced by workload source.
#[derive(Clone, Debug, PartialEq)]
pub struct JobSpec {
    pub actual_size: u64,
    pub predicted_size: u64,
    pub frame_count: u64,
    pub bound_instance: Option<u32>,
}

impl JobSpec {
    pub fn new(actual_size: u64, predicted_size: u64, frame_count: u64) -> Self {
        Self {
            actual_size,
            predicted_size,
            frame_count,
            bound_instance: None,
        }
    }

    /// Binds job to the given instance, so that the dispatch policy is bypassed.
    pub fn bound_to(mut self, instance_id: u32) -> Self {
        self.bound_instance = Some(instance_id);
        self
    }
}

pub trait WorkloadSource {
    /// Returns the batch of jobs arriving in the next interval, or `None` if the workload is over.
    ///
    /// Empty batch means that no jobs arrive in this interval.
    fn next_batch(&mut self) -> Option<Vec<JobSpec>>;
}

/// Workload source returning pre-built batches.
#[derive(Default)]
pub struct StaticWorkload {
    batches: VecDeque<Vec<JobSpec>>,
}

impl StaticWorkload {
    pub fn new(batches: Vec<Vec<JobSpec>>) -> Self {
        Self {
            batches: batches.into(),
        }
    }

    pub fn add_batch(&mut self, batch: Vec<JobSpec>) {
        self.batches.push_back(batch);
    }

    pub fn remaining_batches(&self) -> usize {
        self.batches.len()
    }
}

impl WorkloadSource for StaticWorkload {
    fn next_batch(&mut self) -> Option<Vec<JobSpec>> {
        self.batches.pop_front()
    }
}
