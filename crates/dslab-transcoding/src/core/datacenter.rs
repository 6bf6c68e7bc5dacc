//! Simulated datacenter running transcoding instances.

use std::collections::BTreeMap;

use dslab_core::cast;
use dslab_core::context::SimulationContext;
use dslab_core::event::Event;
use dslab_core::handler::EventHandler;
use dslab_core::{log_debug, log_trace, log_warn};

use crate::core::events::instance::{CreateInstanceRequest, DestroyInstanceRequest, InstanceCreated, InstanceDestroyed};
use crate::core::events::job::{JobCompleted, JobRejected, SubmitJob};
use crate::core::job::JobRecord;

/// Instance hosted by datacenter. Jobs are executed one after another in submission order.
struct HostedInstance {
    busy_until: f64,
    executed_jobs: u64,
}

/// Datacenter creates and destroys instances on request and executes jobs submitted to them.
///
/// Every instance has a single core processing `processing_rate` size units per second, so a job occupies the
/// instance for `actual_size / processing_rate` seconds. Creation fails if the datacenter is full, destruction fails
/// if the instance is unknown or still has unfinished jobs.
pub struct Datacenter {
    pub id: u32,
    processing_rate: f64,
    max_instances: Option<u32>,
    instance_start_delay: f64,
    instance_stop_delay: f64,
    instances: BTreeMap<u32, HostedInstance>,
    created_instances: u64,
    destroyed_instances: u64,
    ctx: SimulationContext,
}

impl Datacenter {
    pub fn new(
        processing_rate: f64,
        max_instances: Option<u32>,
        instance_start_delay: f64,
        instance_stop_delay: f64,
        ctx: SimulationContext,
    ) -> Self {
        Self {
            id: ctx.id(),
            processing_rate,
            max_instances,
            instance_start_delay,
            instance_stop_delay,
            instances: BTreeMap::new(),
            created_instances: 0,
            destroyed_instances: 0,
            ctx,
        }
    }

    /// Returns the number of currently running instances.
    pub fn instance_count(&self) -> usize {
        self.instances.len()
    }

    pub fn created_instances(&self) -> u64 {
        self.created_instances
    }

    pub fn destroyed_instances(&self) -> u64 {
        self.destroyed_instances
    }

    /// Returns the number of jobs executed by the instance, if it is running.
    pub fn executed_jobs(&self, instance_id: u32) -> Option<u64> {
        self.instances.get(&instance_id).map(|i| i.executed_jobs)
    }

    fn on_create_request(&mut self, instance_id: u32, requester: u32) {
        let full = self
            .max_instances
            .map_or(false, |max| self.instances.len() >= max as usize);
        if full || self.instances.contains_key(&instance_id) {
            log_warn!(self.ctx, "can't create instance {}", instance_id);
            self.ctx.emit_now(
                InstanceCreated {
                    instance_id,
                    success: false,
                },
                requester,
            );
            return;
        }
        self.instances.insert(
            instance_id,
            HostedInstance {
                busy_until: 0.,
                executed_jobs: 0,
            },
        );
        self.created_instances += 1;
        log_debug!(self.ctx, "instance {} started", instance_id);
        self.ctx.emit(
            InstanceCreated {
                instance_id,
                success: true,
            },
            requester,
            self.instance_start_delay,
        );
    }

    fn on_destroy_request(&mut self, instance_id: u32, requester: u32) {
        let now = self.ctx.time();
        let idle = match self.instances.get(&instance_id) {
            Some(instance) => instance.busy_until <= now,
            None => false,
        };
        if !idle {
            log_warn!(self.ctx, "can't destroy instance {}", instance_id);
            self.ctx.emit_now(
                InstanceDestroyed {
                    instance_id,
                    success: false,
                },
                requester,
            );
            return;
        }
        self.instances.remove(&instance_id);
        self.destroyed_instances += 1;
        log_debug!(self.ctx, "instance {} stopped", instance_id);
        self.ctx.emit(
            InstanceDestroyed {
                instance_id,
                success: true,
            },
            requester,
            self.instance_stop_delay,
        );
    }

    fn on_submit_job(&mut self, job: JobRecord, instance_id: u32, requester: u32) {
        let now = self.ctx.time();
        let instance = match self.instances.get_mut(&instance_id) {
            Some(instance) => instance,
            None => {
                log_warn!(self.ctx, "job {} rejected: unknown instance {}", job.id, instance_id);
                self.ctx.emit_now(JobRejected { job, instance_id }, requester);
                return;
            }
        };
        let actual_size = job.actual_size();
        let start_time = instance.busy_until.max(now);
        let finish_time = start_time + actual_size as f64 / self.processing_rate;
        instance.busy_until = finish_time;
        instance.executed_jobs += 1;
        log_trace!(
            self.ctx,
            "job {} on instance {}: start {:.3}, finish {:.3}",
            job.id,
            instance_id,
            start_time,
            finish_time
        );
        self.ctx.emit(
            JobCompleted {
                job,
                instance_id,
                actual_size,
                start_time,
                finish_time,
            },
            requester,
            finish_time - now,
        );
    }
}

impl EventHandler for Datacenter {
    fn on(&mut self, event: Event) {
        cast!(match event.data {
            CreateInstanceRequest { instance_id } => {
                self.on_create_request(instance_id, event.src);
            }
            DestroyInstanceRequest { instance_id } => {
                self.on_destroy_request(instance_id, event.src);
            }
            SubmitJob { job, instance_id } => {
                self.on_submit_job(job, instance_id, event.src);
            }
        })
    }
}
