use std::cell::{Cell, RefCell};
use std::rc::Rc;
use sugars::{rc, refcell};

use dslab_core::context::SimulationContext;
use dslab_core::simulation::Simulation;

use crate::core::broker::{BrokerStats, TranscodingBroker};
use crate::core::config::SimulationConfig;
use crate::core::datacenter::Datacenter;
use crate::core::dispatch::dispatch_policy_resolver;
use crate::core::error::ParameterError;
use crate::core::events::workload::{EndOfWorkload, JobBatch};
use crate::core::fabric::DatacenterFabric;
use crate::core::job::JobRecord;
use crate::core::metrics::{MemoryMetricsSink, MetricsSink};
use crate::workload::generator::WorkloadGenerator;
use crate::workload::source::WorkloadSource;

/// Transcoding fleet simulation: a broker driving a single datacenter.
///
/// Provisioning and dispatch ticks are rescheduled until the broker receives the end of workload, so a simulation
/// without workload generator must be finished with [`end_workload`](Self::end_workload) before calling
/// [`step_until_no_events`](Self::step_until_no_events).
pub struct TranscodingSimulation {
    broker: Rc<RefCell<TranscodingBroker>>,
    broker_id: u32,
    datacenter: Rc<RefCell<Datacenter>>,
    datacenter_id: u32,
    generators: Vec<Rc<RefCell<WorkloadGenerator>>>,
    next_job_id: Rc<Cell<u64>>,
    memory_metrics: Option<Rc<RefCell<MemoryMetricsSink>>>,
    sim: Simulation,
    ctx: SimulationContext,
    sim_config: Rc<SimulationConfig>,
}

impl TranscodingSimulation {
    /// Creates simulation keeping all metrics in memory.
    pub fn new(sim: Simulation, sim_config: SimulationConfig) -> Result<Self, ParameterError> {
        let metrics = rc!(refcell!(MemoryMetricsSink::new()));
        let mut simulation = Self::with_metrics_sink(sim, sim_config, metrics.clone())?;
        simulation.memory_metrics = Some(metrics);
        Ok(simulation)
    }

    /// Creates simulation reporting metrics to the given sink.
    pub fn with_metrics_sink(
        mut sim: Simulation,
        sim_config: SimulationConfig,
        metrics: Rc<RefCell<dyn MetricsSink>>,
    ) -> Result<Self, ParameterError> {
        sim_config.validate()?;
        let sim_config = rc!(sim_config);
        let policy = dispatch_policy_resolver(&sim_config.dispatch_policy)?;

        let datacenter = rc!(refcell!(Datacenter::new(
            sim_config.processing_rate,
            sim_config.max_instances,
            sim_config.instance_start_delay,
            sim_config.instance_stop_delay,
            sim.create_context("datacenter"),
        )));
        let datacenter_id = sim.add_handler("datacenter", datacenter.clone());

        let fabric = Box::new(DatacenterFabric::new(datacenter_id, sim_config.message_delay));
        let broker = rc!(refcell!(TranscodingBroker::new(
            fabric,
            policy,
            metrics,
            sim.create_context("broker"),
            sim_config.clone(),
        )?));
        let broker_id = sim.add_handler("broker", broker.clone());
        broker.borrow_mut().start();

        let ctx = sim.create_context("simulation");
        Ok(Self {
            broker,
            broker_id,
            datacenter,
            datacenter_id,
            generators: Vec::new(),
            next_job_id: rc!(Cell::new(0)),
            memory_metrics: None,
            sim,
            ctx,
            sim_config,
        })
    }

    /// Adds component generating jobs from the source every `arrival_interval`, starting now.
    ///
    /// Generators share one job ID counter. The workload ends when all of them are exhausted.
    pub fn add_workload(&mut self, source: Box<dyn WorkloadSource>, arrival_interval: f64) -> u32 {
        let name = format!("workload-{}", self.generators.len());
        let generator = rc!(refcell!(WorkloadGenerator::new(
            source,
            self.broker_id,
            arrival_interval,
            self.next_job_id.clone(),
            self.sim.create_context(&name),
        )));
        self.broker.borrow_mut().register_workload_source();
        let id = self.sim.add_handler(&name, generator.clone());
        generator.borrow_mut().start(0.);
        self.generators.push(generator);
        id
    }

    /// Sends jobs to the broker after the given delay.
    pub fn submit_jobs(&mut self, jobs: Vec<JobRecord>, delay: f64) {
        self.ctx.emit(JobBatch { jobs }, self.broker_id, delay);
    }

    /// Notifies the broker that no more jobs will arrive.
    pub fn end_workload(&mut self, delay: f64) {
        self.ctx.emit(EndOfWorkload {}, self.broker_id, delay);
    }

    pub fn broker(&self) -> Rc<RefCell<TranscodingBroker>> {
        self.broker.clone()
    }

    pub fn broker_id(&self) -> u32 {
        self.broker_id
    }

    pub fn datacenter(&self) -> Rc<RefCell<Datacenter>> {
        self.datacenter.clone()
    }

    pub fn datacenter_id(&self) -> u32 {
        self.datacenter_id
    }

    /// Returns in-memory metrics, if the simulation was created with [`new`](Self::new).
    pub fn memory_metrics(&self) -> Option<Rc<RefCell<MemoryMetricsSink>>> {
        self.memory_metrics.clone()
    }

    pub fn stats(&self) -> BrokerStats {
        self.broker.borrow().stats()
    }

    pub fn context(&self) -> &SimulationContext {
        &self.ctx
    }

    pub fn step(&mut self) -> bool {
        self.sim.step()
    }

    pub fn steps(&mut self, step_count: u64) -> bool {
        self.sim.steps(step_count)
    }

    pub fn step_until_no_events(&mut self) {
        self.sim.step_until_no_events();
    }

    pub fn step_for_duration(&mut self, duration: f64) -> bool {
        self.sim.step_for_duration(duration)
    }

    pub fn event_count(&self) -> u64 {
        self.sim.event_count()
    }

    pub fn current_time(&self) -> f64 {
        self.sim.time()
    }

    pub fn sim_config(&self) -> Rc<SimulationConfig> {
        self.sim_config.clone()
    }
}
