//! Interface of the execution fabric used by the broker.

use dslab_core::context::SimulationContext;

use crate::core::events::instance::{CreateInstanceRequest, DestroyInstanceRequest};
use crate::core::events::job::SubmitJob;
use crate::core::job::JobRecord;

/// Operations the broker needs from the execution fabric.
///
/// All requests are asynchronous: the caller does not wait, and the fabric answers with
/// [`InstanceCreated`](crate::core::events::instance::InstanceCreated),
/// [`InstanceDestroyed`](crate::core::events::instance::InstanceDestroyed),
/// [`JobCompleted`](crate::core::events::job::JobCompleted) or
/// [`JobRejected`](crate::core::events::job::JobRejected) events sent to the requester.
pub trait ExecutionFabric {
    fn request_instance_creation(&self, ctx: &mut SimulationContext, instance_id: u32);

    fn request_instance_destruction(&self, ctx: &mut SimulationContext, instance_id: u32);

    fn submit_job(&self, ctx: &mut SimulationContext, job: JobRecord, instance_id: u32);
}

/// Fabric backed by a single [`Datacenter`](crate::core::datacenter::Datacenter) component.
pub struct DatacenterFabric {
    datacenter_id: u32,
    message_delay: f64,
}

impl DatacenterFabric {
    pub fn new(datacenter_id: u32, message_delay: f64) -> Self {
        Self {
            datacenter_id,
            message_delay,
        }
    }
}

impl ExecutionFabric for DatacenterFabric {
    fn request_instance_creation(&self, ctx: &mut SimulationContext, instance_id: u32) {
        ctx.emit(CreateInstanceRequest { instance_id }, self.datacenter_id, self.message_delay);
    }

    fn request_instance_destruction(&self, ctx: &mut SimulationContext, instance_id: u32) {
        ctx.emit(DestroyInstanceRequest { instance_id }, self.datacenter_id, self.message_delay);
    }

    fn submit_job(&self, ctx: &mut SimulationContext, job: JobRecord, instance_id: u32) {
        ctx.emit(SubmitJob { job, instance_id }, self.datacenter_id, self.message_delay);
    }
}
