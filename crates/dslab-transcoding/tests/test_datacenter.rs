mod common;
use common::{assert_float_eq, init_logger};

use std::cell::RefCell;
use std::rc::Rc;

use dslab_core::cast;
use dslab_core::context::SimulationContext;
use dslab_core::event::Event;
use dslab_core::handler::EventHandler;
use dslab_core::simulation::Simulation;

use dslab_transcoding::core::datacenter::Datacenter;
use dslab_transcoding::core::events::instance::{
    CreateInstanceRequest, DestroyInstanceRequest, InstanceCreated, InstanceDestroyed,
};
use dslab_transcoding::core::events::job::{JobCompleted, JobRejected, SubmitJob};
use dslab_transcoding::core::job::JobRecord;

/// Records acknowledgements received from datacenter.
struct Client {
    created: Vec<(u32, bool, f64)>,
    destroyed: Vec<(u32, bool, f64)>,
    completed: Vec<(u64, u32, f64, f64)>,
    rejected: Vec<(u64, u32)>,
    ctx: SimulationContext,
}

impl Client {
    fn new(ctx: SimulationContext) -> Self {
        Self {
            created: Vec::new(),
            destroyed: Vec::new(),
            completed: Vec::new(),
            rejected: Vec::new(),
            ctx,
        }
    }
}

impl EventHandler for Client {
    fn on(&mut self, event: Event) {
        let time = event.time;
        cast!(match event.data {
            InstanceCreated { instance_id, success } => {
                self.created.push((instance_id, success, time));
            }
            InstanceDestroyed { instance_id, success } => {
                self.destroyed.push((instance_id, success, time));
            }
            JobCompleted {
                job,
                instance_id,
                start_time,
                finish_time,
                ..
            } => {
                self.completed.push((job.id, instance_id, start_time, finish_time));
            }
            JobRejected { job, instance_id } => {
                self.rejected.push((job.id, instance_id));
            }
        })
    }
}

#[test]
fn test_datacenter() {
    init_logger();
    let mut sim = Simulation::new(123);
    let datacenter = Rc::new(RefCell::new(Datacenter::new(
        100.,
        Some(2),
        1.,
        0.5,
        sim.create_context("datacenter"),
    )));
    let datacenter_id = sim.add_handler("datacenter", datacenter.clone());
    let client = Rc::new(RefCell::new(Client::new(sim.create_context("client"))));
    sim.add_handler("client", client.clone());

    // third instance doesn't fit, the last request duplicates existing instance
    for instance_id in [0, 1, 2, 0] {
        client
            .borrow_mut()
            .ctx
            .emit_now(CreateInstanceRequest { instance_id }, datacenter_id);
    }
    sim.step_until_no_events();
    {
        let client = client.borrow();
        assert_eq!(client.created.len(), 4);
        assert!(client.created.contains(&(0, true, 1.)));
        assert!(client.created.contains(&(1, true, 1.)));
        assert!(client.created.contains(&(2, false, 0.)));
        assert!(client.created.contains(&(0, false, 0.)));
    }
    assert_eq!(datacenter.borrow().instance_count(), 2);

    // jobs on the same instance run one after another
    {
        let mut client = client.borrow_mut();
        let jobs = [(0, 200, 0), (1, 100, 0), (2, 100, 7)];
        for (id, size, instance_id) in jobs {
            let job = JobRecord::new(id, size, 1, 1).unwrap();
            client.ctx.emit_now(SubmitJob { job, instance_id }, datacenter_id);
        }
        // instance 0 is busy
        client
            .ctx
            .emit_now(DestroyInstanceRequest { instance_id: 0 }, datacenter_id);
        client
            .ctx
            .emit_now(DestroyInstanceRequest { instance_id: 1 }, datacenter_id);
        client
            .ctx
            .emit_now(DestroyInstanceRequest { instance_id: 9 }, datacenter_id);
    }
    sim.step_until_no_events();
    {
        let client = client.borrow();
        assert_eq!(client.completed, vec![(0, 0, 1., 3.), (1, 0, 3., 4.)]);
        assert_eq!(client.rejected, vec![(2, 7)]);
        assert_eq!(client.destroyed.len(), 3);
        assert!(client.destroyed.contains(&(0, false, 1.)));
        assert!(client.destroyed.contains(&(1, true, 1.5)));
        assert!(client.destroyed.contains(&(9, false, 1.)));
    }
    assert_eq!(datacenter.borrow().executed_jobs(0), Some(2));
    assert_eq!(datacenter.borrow().executed_jobs(1), None);
    assert_float_eq(sim.time(), 4., 1e-9);

    // instance 0 is idle after the last job
    client
        .borrow_mut()
        .ctx
        .emit_now(DestroyInstanceRequest { instance_id: 0 }, datacenter_id);
    sim.step_until_no_events();
    assert!(client.borrow().destroyed.contains(&(0, true, 4.5)));
    assert_eq!(datacenter.borrow().instance_count(), 0);
    assert_eq!(datacenter.borrow().created_instances(), 2);
    assert_eq!(datacenter.borrow().destroyed_instances(), 2);
}
