//! Representation of a worker instance.

use serde::Serialize;

/// Per-instance state tracked by the broker.
///
/// Counters reflect the jobs dispatched to the instance and not yet completed. Queued load is accumulated in predicted
/// job sizes, both on dispatch and on completion, so the two updates always cancel out.
#[derive(Clone, Debug, Serialize)]
pub struct InstanceRecord {
    pub id: u32,
    /// Time of creation acknowledgement, anchors the rental periods.
    pub created_at: f64,
    pub rental_period: f64,
    pub(crate) retiring: bool,
    pub(crate) destroy_requested: bool,
    pub(crate) queued_job_count: u32,
    pub(crate) queued_load: u64,
}

impl InstanceRecord {
    pub fn new(id: u32, created_at: f64, rental_period: f64) -> Self {
        Self {
            id,
            created_at,
            rental_period,
            retiring: false,
            destroy_requested: false,
            queued_job_count: 0,
            queued_load: 0,
        }
    }

    /// Whether the instance is flagged as a candidate for removal.
    pub fn is_retiring(&self) -> bool {
        self.retiring
    }

    /// Whether a destroy request for the instance is in flight.
    pub fn is_destroy_requested(&self) -> bool {
        self.destroy_requested
    }

    /// Whether new unbound jobs may be routed to the instance.
    pub fn accepts_jobs(&self) -> bool {
        !self.retiring && !self.destroy_requested
    }

    pub fn queued_job_count(&self) -> u32 {
        self.queued_job_count
    }

    pub fn queued_load(&self) -> u64 {
        self.queued_load
    }

    /// Time left until the end of the current rental period.
    pub fn remaining_rental_time(&self, time: f64) -> f64 {
        self.rental_period - (time - self.created_at).rem_euclid(self.rental_period)
    }
}
