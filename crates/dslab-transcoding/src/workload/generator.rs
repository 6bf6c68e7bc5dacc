//! Component delivering jobs from workload source to the broker.

use std::cell::Cell;
use std::rc::Rc;

use dslab_core::cast;
use dslab_core::context::SimulationContext;
use dslab_core::event::Event;
use dslab_core::handler::EventHandler;
use dslab_core::{log_debug, log_info, log_warn};

use crate::core::events::workload::{GenerateJobs, JobBatch, WorkloadFinished};
use crate::core::job::JobRecord;
use crate::workload::source::WorkloadSource;

/// Pulls a batch from the workload source every `arrival_interval` and sends it to the broker.
///
/// Job IDs are taken from a counter shared by all generators of the simulation. When the source is exhausted, the
/// broker is notified with [`WorkloadFinished`] and the generator stops.
///
/// [`WorkloadFinished`]: crate::core::events::workload::WorkloadFinished
pub struct WorkloadGenerator {
    pub id: u32,
    source: Box<dyn WorkloadSource>,
    broker_id: u32,
    arrival_interval: f64,
    next_job_id: Rc<Cell<u64>>,
    generated_jobs: u64,
    finished: bool,
    ctx: SimulationContext,
}

impl WorkloadGenerator {
    pub fn new(
        source: Box<dyn WorkloadSource>,
        broker_id: u32,
        arrival_interval: f64,
        next_job_id: Rc<Cell<u64>>,
        ctx: SimulationContext,
    ) -> Self {
        Self {
            id: ctx.id(),
            source,
            broker_id,
            arrival_interval,
            next_job_id,
            generated_jobs: 0,
            finished: false,
            ctx,
        }
    }

    /// Schedules the first batch after the given delay.
    pub fn start(&mut self, delay: f64) {
        self.ctx.emit_self(GenerateJobs {}, delay);
    }

    pub fn generated_jobs(&self) -> u64 {
        self.generated_jobs
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    fn generate_jobs(&mut self) {
        if self.finished {
            return;
        }
        let specs = match self.source.next_batch() {
            Some(specs) => specs,
            None => {
                log_info!(self.ctx, "workload is over, {} jobs generated", self.generated_jobs);
                self.finished = true;
                self.ctx.emit_now(WorkloadFinished {}, self.broker_id);
                return;
            }
        };
        let time = self.ctx.time();
        let mut jobs = Vec::with_capacity(specs.len());
        for spec in specs {
            let id = self.next_job_id.get();
            self.next_job_id.set(id + 1);
            match JobRecord::new(id, spec.actual_size, spec.predicted_size, spec.frame_count) {
                Ok(mut job) => {
                    job.bound_instance = spec.bound_instance;
                    job.arrival_time = time;
                    jobs.push(job);
                }
                Err(e) => {
                    log_warn!(self.ctx, "skipping job {}: {}", id, e);
                }
            }
        }
        self.generated_jobs += jobs.len() as u64;
        if !jobs.is_empty() {
            log_debug!(self.ctx, "sending {} jobs", jobs.len());
            self.ctx.emit_now(JobBatch { jobs }, self.broker_id);
        }
        self.ctx.emit_self(GenerateJobs {}, self.arrival_interval);
    }
}

impl EventHandler for WorkloadGenerator {
    fn on(&mut self, event: Event) {
        cast!(match event.data {
            GenerateJobs {} => {
                self.generate_jobs();
            }
        })
    }
}
