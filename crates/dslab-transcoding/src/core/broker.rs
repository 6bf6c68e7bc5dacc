//! Component coordinating fleet provisioning and job dispatch.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use serde::Serialize;

use dslab_core::cast;
use dslab_core::context::SimulationContext;
use dslab_core::event::Event;
use dslab_core::handler::EventHandler;
use dslab_core::{log_debug, log_info, log_trace, log_warn};

use crate::core::config::SimulationConfig;
use crate::core::dispatch::{route, DispatchPolicy, Route};
use crate::core::error::ParameterError;
use crate::core::events::instance::{InstanceCreated, InstanceDestroyed};
use crate::core::events::job::{JobCompleted, JobRejected};
use crate::core::events::timer::{DispatchTick, ScaleInTick, ScaleOutTick};
use crate::core::events::workload::{EndOfWorkload, JobBatch, WorkloadFinished};
use crate::core::fabric::ExecutionFabric;
use crate::core::instance::InstanceRecord;
use crate::core::job::{JobRecord, JobStatus};
use crate::core::ledger::{CounterUpdate, FleetLedger};
use crate::core::metrics::{CycleMetrics, JobResult, MetricsSink};
use crate::core::provisioner::{ProvisioningController, ProvisioningEstimate, ProvisioningParams};

/// Aggregated broker counters.
#[derive(Clone, Debug, Default, Serialize, PartialEq)]
pub struct BrokerStats {
    pub jobs_received: u64,
    pub jobs_dispatched: u64,
    pub jobs_completed: u64,
    pub jobs_rejected: u64,
    /// Jobs left in the pending queue.
    pub jobs_unprocessed: u64,
    pub instances_requested: u64,
    pub instances_created: u64,
    pub instance_creations_failed: u64,
    pub destructions_requested: u64,
    pub instances_destroyed: u64,
    pub destructions_failed: u64,
    pub instances_reclaimed: u64,
    pub instances_flagged: u64,
    /// Queue counter updates which would have gone below zero.
    pub counters_clamped: u64,
    pub total_observed_wait: f64,
}

impl BrokerStats {
    pub fn mean_observed_wait(&self) -> f64 {
        if self.jobs_completed == 0 {
            0.
        } else {
            self.total_observed_wait / self.jobs_completed as f64
        }
    }
}

/// Accumulates job metrics between two provisioning cycles.
#[derive(Default)]
struct CycleAccumulator {
    dispatched: u64,
    completed: u64,
    observed_wait: f64,
    predicted_throughput: f64,
    actual_throughput: f64,
}

impl CycleAccumulator {
    fn mean(&self, sum: f64) -> f64 {
        if self.completed == 0 {
            0.
        } else {
            sum / self.completed as f64
        }
    }
}

/// Broker holds the queue of pending jobs and the fleet ledger.
///
/// It runs three periodic activities: scale-out and scale-in decisions delegated to the provisioning controller, and
/// draining of the pending queue, where every job is routed by the dispatch policy. Requests to the execution fabric
/// are asynchronous, the ledger changes only when the corresponding acknowledgement arrives.
pub struct TranscodingBroker {
    pub id: u32,
    ledger: FleetLedger,
    provisioner: ProvisioningController,
    policy: Box<dyn DispatchPolicy>,
    fabric: Box<dyn ExecutionFabric>,
    metrics: Rc<RefCell<dyn MetricsSink>>,
    pending: VecDeque<JobRecord>,
    /// Number of rejected jobs put back at the head of the queue since the last dispatch round.
    requeued: usize,
    next_instance_id: u32,
    workload_sources: u32,
    finished_sources: u32,
    end_of_workload: bool,
    stats: BrokerStats,
    cycle: CycleAccumulator,
    ctx: SimulationContext,
    sim_config: Rc<SimulationConfig>,
}

impl TranscodingBroker {
    /// Creates broker with specified dispatch policy.
    pub fn new(
        fabric: Box<dyn ExecutionFabric>,
        policy: Box<dyn DispatchPolicy>,
        metrics: Rc<RefCell<dyn MetricsSink>>,
        ctx: SimulationContext,
        sim_config: Rc<SimulationConfig>,
    ) -> Result<Self, ParameterError> {
        let provisioner = ProvisioningController::new(ProvisioningParams::from(sim_config.as_ref()))?;
        Ok(Self {
            id: ctx.id(),
            ledger: FleetLedger::new(),
            provisioner,
            policy,
            fabric,
            metrics,
            pending: VecDeque::new(),
            requeued: 0,
            next_instance_id: 0,
            workload_sources: 0,
            finished_sources: 0,
            end_of_workload: false,
            stats: BrokerStats::default(),
            cycle: CycleAccumulator::default(),
            ctx,
            sim_config,
        })
    }

    /// Schedules the first provisioning and dispatch ticks.
    pub fn start(&mut self) {
        log_info!(self.ctx, "starting with {} dispatch policy", self.policy.name());
        self.ctx
            .emit_self(ScaleOutTick {}, self.sim_config.provisioning_start_delay);
        self.ctx
            .emit_self(ScaleInTick {}, self.sim_config.provisioning_start_delay);
        self.ctx
            .emit_self(DispatchTick {}, self.sim_config.dispatch_start_delay);
    }

    pub fn ledger(&self) -> &FleetLedger {
        &self.ledger
    }

    pub fn provisioner(&self) -> &ProvisioningController {
        &self.provisioner
    }

    pub fn provisioner_mut(&mut self) -> &mut ProvisioningController {
        &mut self.provisioner
    }

    pub fn policy_name(&self) -> String {
        self.policy.name()
    }

    pub fn pending_jobs(&self) -> &VecDeque<JobRecord> {
        &self.pending
    }

    pub fn is_finished(&self) -> bool {
        self.end_of_workload
    }

    pub fn stats(&self) -> BrokerStats {
        let mut stats = self.stats.clone();
        stats.jobs_unprocessed = self.pending.len() as u64;
        stats
    }

    /// Appends jobs to the pending queue preserving their order.
    pub fn enqueue_jobs(&mut self, jobs: Vec<JobRecord>) {
        let time = self.ctx.time();
        log_trace!(self.ctx, "received {} jobs", jobs.len());
        for mut job in jobs {
            job.arrival_time = time;
            job.status = JobStatus::Pending;
            job.predicted_queue_delay = None;
            self.stats.jobs_received += 1;
            self.pending.push_back(job);
        }
    }

    /// Registers a workload generator. The workload ends only after every registered generator has finished.
    pub fn register_workload_source(&mut self) {
        self.workload_sources += 1;
    }

    fn on_workload_finished(&mut self) {
        self.finished_sources += 1;
        if self.finished_sources < self.workload_sources {
            log_debug!(
                self.ctx,
                "workload source finished, {} of {} remaining",
                self.workload_sources - self.finished_sources,
                self.workload_sources
            );
            return;
        }
        self.on_end_of_workload();
    }

    /// Stops provisioning and dispatch. Repeated calls have no effect.
    pub fn on_end_of_workload(&mut self) {
        if self.end_of_workload {
            return;
        }
        self.end_of_workload = true;
        log_info!(
            self.ctx,
            "end of workload, {} jobs pending, {} instances running",
            self.pending.len(),
            self.ledger.active_count()
        );
    }

    fn record_cycle(&mut self, estimate: &ProvisioningEstimate) {
        let metrics = CycleMetrics {
            time: self.ctx.time(),
            fleet_size: estimate.active_count,
            retiring_instances: self.ledger.retiring_count(),
            pending_jobs: self.pending.len(),
            total_load_time: estimate.total_load_time,
            estimated_wait: estimate.estimated_wait,
            observed_wait: self.cycle.mean(self.cycle.observed_wait),
            sla_wait_target: self.provisioner.params().sla_waiting_time,
            delta: estimate.delta,
            dispatched_jobs: self.cycle.dispatched,
            completed_jobs: self.cycle.completed,
            mean_predicted_throughput: self.cycle.mean(self.cycle.predicted_throughput),
            mean_actual_throughput: self.cycle.mean(self.cycle.actual_throughput),
        };
        self.metrics.borrow_mut().record_cycle(&metrics);
        self.cycle = CycleAccumulator::default();
    }

    fn on_scale_out_tick(&mut self) {
        if self.end_of_workload {
            return;
        }
        let time = self.ctx.time();
        let estimate = self.provisioner.estimate(&self.ledger);
        self.record_cycle(&estimate);
        let plan = self.provisioner.scale_out(&estimate, &mut self.ledger, time);
        if !plan.is_empty() {
            log_info!(
                self.ctx,
                "scale-out by {}: reclaimed {} instances, requesting {} new",
                estimate.delta,
                plan.reclaimed.len(),
                plan.new_instances
            );
        }
        self.stats.instances_reclaimed += plan.reclaimed.len() as u64;
        for _ in 0..plan.new_instances {
            let instance_id = self.next_instance_id;
            self.next_instance_id += 1;
            self.ledger.register_request(instance_id);
            self.fabric.request_instance_creation(&mut self.ctx, instance_id);
            self.stats.instances_requested += 1;
        }
        self.ctx
            .emit_self(ScaleOutTick {}, self.sim_config.provisioning_interval);
    }

    fn on_scale_in_tick(&mut self) {
        if self.end_of_workload {
            return;
        }
        let time = self.ctx.time();
        let estimate = self.provisioner.estimate(&self.ledger);
        let plan = self.provisioner.scale_in(&estimate, &mut self.ledger, time);
        if !plan.is_empty() {
            log_info!(
                self.ctx,
                "scale-in by {}: destroying {} instances, flagged {}",
                -estimate.delta,
                plan.destroy.len(),
                plan.flagged.len()
            );
        }
        self.stats.instances_flagged += plan.flagged.len() as u64;
        for instance_id in plan.destroy {
            self.fabric.request_instance_destruction(&mut self.ctx, instance_id);
            self.stats.destructions_requested += 1;
        }
        self.ctx
            .emit_self(ScaleInTick {}, self.sim_config.provisioning_interval);
    }

    fn on_dispatch_tick(&mut self) {
        if self.end_of_workload {
            return;
        }
        self.dispatch_pending();
        self.ctx.emit_self(DispatchTick {}, self.sim_config.dispatch_interval);
    }

    /// Routes pending jobs in arrival order. Jobs without a target stay in the queue in the same order.
    fn dispatch_pending(&mut self) {
        let mut still_pending = VecDeque::new();
        let mut no_capacity = false;
        self.requeued = 0;
        while let Some(job) = self.pending.pop_front() {
            if no_capacity && job.bound_instance.is_none() {
                still_pending.push_back(job);
                continue;
            }
            match route(self.policy.as_ref(), &job, &self.ledger) {
                Route::Instance(instance_id) => self.dispatch_job(job, instance_id),
                Route::NoCapacity => {
                    no_capacity = true;
                    still_pending.push_back(job);
                }
                Route::StaleBinding(instance_id) => {
                    log_debug!(
                        self.ctx,
                        "postponing job {}: bound instance {} is not available",
                        job.id,
                        instance_id
                    );
                    still_pending.push_back(job);
                }
            }
        }
        if !still_pending.is_empty() {
            log_trace!(self.ctx, "{} jobs left pending", still_pending.len());
        }
        self.pending = still_pending;
    }

    fn dispatch_job(&mut self, mut job: JobRecord, instance_id: u32) {
        let queued_load = self.ledger.get(instance_id).map_or(0, |i| i.queued_load());
        job.predicted_queue_delay = Some(queued_load as f64 / self.sim_config.processing_rate);
        job.status = JobStatus::Dispatched;
        self.ledger.add_job(instance_id, job.predicted_size());
        log_debug!(self.ctx, "sending job {} to instance {}", job.id, instance_id);
        self.stats.jobs_dispatched += 1;
        self.cycle.dispatched += 1;
        self.fabric.submit_job(&mut self.ctx, job, instance_id);
    }

    fn on_instance_created(&mut self, instance_id: u32, success: bool, backend: u32) {
        if !self.ledger.resolve_request(instance_id) {
            log_warn!(self.ctx, "ignoring creation ack for unknown instance {}", instance_id);
            return;
        }
        if success {
            let time = self.ctx.time();
            self.ledger.add_instance(
                InstanceRecord::new(instance_id, time, self.sim_config.rental_period),
                backend,
            );
            self.provisioner.on_fleet_modified(time);
            self.stats.instances_created += 1;
            log_debug!(self.ctx, "instance {} has been created", instance_id);
        } else {
            self.stats.instance_creations_failed += 1;
            log_warn!(self.ctx, "creation of instance {} failed", instance_id);
        }
    }

    fn on_instance_destroyed(&mut self, instance_id: u32, success: bool) {
        if success {
            if self.ledger.remove_instance(instance_id).is_some() {
                self.provisioner.on_fleet_modified(self.ctx.time());
                self.stats.instances_destroyed += 1;
                log_debug!(self.ctx, "instance {} has been destroyed", instance_id);
            } else {
                log_warn!(self.ctx, "ignoring destruction ack for unknown instance {}", instance_id);
            }
        } else {
            self.ledger.set_destroy_requested(instance_id, false);
            self.stats.destructions_failed += 1;
            log_warn!(self.ctx, "termination of instance {} failed", instance_id);
        }
    }

    fn release_job(&mut self, job: &JobRecord, instance_id: u32) {
        match self.ledger.remove_job(instance_id, job.predicted_size()) {
            CounterUpdate::Applied => {}
            CounterUpdate::Clamped => {
                self.stats.counters_clamped += 1;
                log_warn!(self.ctx, "counters of instance {} clamped at zero", instance_id);
            }
            CounterUpdate::UnknownInstance => {
                log_warn!(self.ctx, "job {} returned from unknown instance {}", job.id, instance_id);
            }
        }
    }

    fn on_job_completed(
        &mut self,
        mut job: JobRecord,
        instance_id: u32,
        actual_size: u64,
        start_time: f64,
        finish_time: f64,
    ) {
        self.release_job(&job, instance_id);
        if let Err(e) = job.set_actual_size(actual_size) {
            log_warn!(self.ctx, "job {}: {}", job.id, e);
        }
        job.status = JobStatus::Completed;
        let observed_wait = start_time - job.arrival_time;
        let result = JobResult {
            job_id: job.id,
            status: job.status.to_string(),
            instance_id,
            arrival_time: job.arrival_time,
            start_time,
            finish_time,
            observed_wait,
            predicted_wait: job.predicted_queue_delay.unwrap_or(0.),
            predicted_size: job.predicted_size(),
            actual_size: job.actual_size(),
            predicted_throughput: job.predicted_throughput(),
            actual_throughput: job.actual_throughput(),
        };
        log_trace!(self.ctx, "job {} completed, waited {:.3}", job.id, observed_wait);
        self.metrics.borrow_mut().record_job(&result);

        self.stats.jobs_completed += 1;
        self.stats.total_observed_wait += observed_wait;
        self.cycle.completed += 1;
        self.cycle.observed_wait += observed_wait;
        self.cycle.predicted_throughput += job.predicted_throughput();
        self.cycle.actual_throughput += job.actual_throughput();
    }

    fn on_job_rejected(&mut self, mut job: JobRecord, instance_id: u32) {
        self.release_job(&job, instance_id);
        log_warn!(self.ctx, "job {} rejected by instance {}, requeued", job.id, instance_id);
        job.status = JobStatus::Pending;
        job.predicted_queue_delay = None;
        self.stats.jobs_rejected += 1;
        // rejections of one round arrive in dispatch order
        self.pending.insert(self.requeued, job);
        self.requeued += 1;
    }
}

impl EventHandler for TranscodingBroker {
    fn on(&mut self, event: Event) {
        cast!(match event.data {
            ScaleOutTick {} => {
                self.on_scale_out_tick();
            }
            ScaleInTick {} => {
                self.on_scale_in_tick();
            }
            DispatchTick {} => {
                self.on_dispatch_tick();
            }
            JobBatch { jobs } => {
                self.enqueue_jobs(jobs);
            }
            EndOfWorkload {} => {
                self.on_end_of_workload();
            }
            WorkloadFinished {} => {
                self.on_workload_finished();
            }
            InstanceCreated { instance_id, success } => {
                self.on_instance_created(instance_id, success, event.src);
            }
            InstanceDestroyed { instance_id, success } => {
                self.on_instance_destroyed(instance_id, success);
            }
            JobCompleted {
                job,
                instance_id,
                actual_size,
                start_time,
                finish_time,
            } => {
                self.on_job_completed(job, instance_id, actual_size, start_time, finish_time);
            }
            JobRejected { job, instance_id } => {
                self.on_job_rejected(job, instance_id);
            }
        })
    }
}
