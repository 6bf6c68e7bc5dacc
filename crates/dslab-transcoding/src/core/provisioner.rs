//! Fleet provisioning algorithm.
//!
//! The controller converts the load queued on the fleet into the number of instances needed to keep the average
//! waiting time under the SLA target, and reconciles this number with the current fleet:
//!
//! - scale-out counts instances already requested but not yet created toward the shortfall, then reclaims retiring
//!   instances (they are warm and already paid for) and requests new instances for the rest;
//! - scale-in destroys retiring instances that have drained, and flags other instances as retiring when their
//!   current rental period is about to end, so that paid capacity is not wasted.
//!
//! Both directions are throttled by the minimum interval between fleet modifications.

use crate::core::config::SimulationConfig;
use crate::core::error::{check_non_negative, check_positive, check_retirement_window, ParameterError};
use crate::core::ledger::FleetLedger;

/// Parameters of the provisioning algorithm.
#[derive(Clone, Debug, PartialEq)]
pub struct ProvisioningParams {
    /// Instance processing rate in size units per time unit.
    pub processing_rate: f64,
    /// Target average waiting time.
    pub sla_waiting_time: f64,
    /// Number of instances requested when the fleet is empty.
    pub bootstrap_fleet_size: u32,
    /// Minimum time between fleet modifications.
    pub min_reconfigure_interval: f64,
    pub rental_period: f64,
    /// Instances are flagged only when the time left in their rental period is strictly inside
    /// (`retirement_lower_threshold`, `retirement_upper_threshold`).
    pub retirement_lower_threshold: f64,
    pub retirement_upper_threshold: f64,
}

impl From<&SimulationConfig> for ProvisioningParams {
    fn from(config: &SimulationConfig) -> Self {
        Self {
            processing_rate: config.processing_rate,
            sla_waiting_time: config.sla_waiting_time,
            bootstrap_fleet_size: config.bootstrap_fleet_size,
            min_reconfigure_interval: config.min_reconfigure_interval,
            rental_period: config.rental_period,
            retirement_lower_threshold: config.retirement_lower_threshold,
            retirement_upper_threshold: config.retirement_upper_threshold,
        }
    }
}

/// Snapshot of the fleet load computed on every provisioning tick.
#[derive(Clone, Debug, PartialEq)]
pub struct ProvisioningEstimate {
    pub total_load: u64,
    /// Time needed to process the total load on a single instance.
    pub total_load_time: f64,
    /// Average waiting time if the load were spread evenly over the fleet.
    pub estimated_wait: f64,
    pub active_count: usize,
    /// Number of instances to add (positive) or remove (negative).
    pub delta: i64,
}

/// Actions decided on scale-out. Un-retiring is already applied to the ledger.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ScaleOutPlan {
    pub reclaimed: Vec<u32>,
    pub new_instances: u32,
}

impl ScaleOutPlan {
    pub fn is_empty(&self) -> bool {
        self.reclaimed.is_empty() && self.new_instances == 0
    }
}

/// Actions decided on scale-in. Flags are already applied to the ledger, instances to destroy are marked as
/// `destroy_requested`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ScaleInPlan {
    pub destroy: Vec<u32>,
    pub flagged: Vec<u32>,
}

impl ScaleInPlan {
    pub fn is_empty(&self) -> bool {
        self.destroy.is_empty() && self.flagged.is_empty()
    }
}

pub struct ProvisioningController {
    params: ProvisioningParams,
    last_fleet_modification: Option<f64>,
}

impl ProvisioningController {
    pub fn new(params: ProvisioningParams) -> Result<Self, ParameterError> {
        check_positive("processing_rate", params.processing_rate)?;
        check_positive("sla_waiting_time", params.sla_waiting_time)?;
        check_positive("bootstrap_fleet_size", params.bootstrap_fleet_size as f64)?;
        check_non_negative("min_reconfigure_interval", params.min_reconfigure_interval)?;
        check_positive("rental_period", params.rental_period)?;
        check_retirement_window(
            params.retirement_lower_threshold,
            params.retirement_upper_threshold,
            params.rental_period,
        )?;
        Ok(Self {
            params,
            last_fleet_modification: None,
        })
    }

    pub fn params(&self) -> &ProvisioningParams {
        &self.params
    }

    pub fn set_sla_waiting_time(&mut self, value: f64) -> Result<(), ParameterError> {
        check_positive("sla_waiting_time", value)?;
        self.params.sla_waiting_time = value;
        Ok(())
    }

    pub fn set_min_reconfigure_interval(&mut self, value: f64) -> Result<(), ParameterError> {
        check_non_negative("min_reconfigure_interval", value)?;
        self.params.min_reconfigure_interval = value;
        Ok(())
    }

    pub fn set_retirement_window(&mut self, lower: f64, upper: f64) -> Result<(), ParameterError> {
        check_retirement_window(lower, upper, self.params.rental_period)?;
        self.params.retirement_lower_threshold = lower;
        self.params.retirement_upper_threshold = upper;
        Ok(())
    }

    /// Time of the last change of the fleet membership.
    pub fn last_fleet_modification(&self) -> Option<f64> {
        self.last_fleet_modification
    }

    /// Must be called when an instance is actually added to or removed from the fleet.
    pub fn on_fleet_modified(&mut self, time: f64) {
        self.last_fleet_modification = Some(time);
    }

    /// Whether enough time has passed since the last fleet modification.
    pub fn can_reconfigure(&self, time: f64) -> bool {
        match self.last_fleet_modification {
            Some(last) => time - last > self.params.min_reconfigure_interval,
            None => true,
        }
    }

    /// Computes the fleet load and the required change of the fleet size.
    pub fn estimate(&self, ledger: &FleetLedger) -> ProvisioningEstimate {
        let active_count = ledger.active_count();
        let total_load = ledger.total_load();
        let total_load_time = total_load as f64 / self.params.processing_rate;
        if active_count == 0 {
            return ProvisioningEstimate {
                total_load,
                total_load_time,
                estimated_wait: 0.,
                active_count,
                delta: self.params.bootstrap_fleet_size as i64,
            };
        }
        let required = (total_load_time / self.params.sla_waiting_time).floor() as i64;
        ProvisioningEstimate {
            total_load,
            total_load_time,
            estimated_wait: total_load_time / active_count as f64,
            active_count,
            delta: required - active_count as i64,
        }
    }

    /// Decides how to grow the fleet. Creations still in flight cover the shortfall first, then retiring instances
    /// are reclaimed, each of them covers one instance, and the rest is requested as new instances.
    pub fn scale_out(&self, estimate: &ProvisioningEstimate, ledger: &mut FleetLedger, time: f64) -> ScaleOutPlan {
        let mut plan = ScaleOutPlan::default();
        if estimate.delta <= 0 || !self.can_reconfigure(time) {
            return plan;
        }
        let mut outstanding = estimate.delta - ledger.requested_count() as i64;
        if outstanding <= 0 {
            return plan;
        }
        let candidates: Vec<u32> = ledger
            .instances()
            .filter(|i| i.is_retiring() && !i.is_destroy_requested())
            .map(|i| i.id)
            .collect();
        for instance_id in candidates {
            if outstanding == 0 {
                break;
            }
            if ledger.set_retiring(instance_id, false) {
                plan.reclaimed.push(instance_id);
                outstanding -= 1;
            }
        }
        plan.new_instances = outstanding as u32;
        plan
    }

    /// Decides how to shrink the fleet.
    ///
    /// Drained retiring instances are destroyed first. Retiring instances which are still busy (or already being
    /// destroyed) will leave the fleet anyway, so they cover the excess without further action. The rest of the
    /// excess is covered by flagging instances whose rental period ends soon.
    pub fn scale_in(&self, estimate: &ProvisioningEstimate, ledger: &mut FleetLedger, time: f64) -> ScaleInPlan {
        let mut plan = ScaleInPlan::default();
        if estimate.delta >= 0 || !self.can_reconfigure(time) {
            return plan;
        }
        let mut outstanding = -estimate.delta;

        let drained: Vec<u32> = ledger
            .instances()
            .filter(|i| i.is_retiring() && !i.is_destroy_requested() && i.queued_job_count() == 0)
            .map(|i| i.id)
            .collect();
        for instance_id in drained {
            if outstanding == 0 {
                return plan;
            }
            ledger.set_destroy_requested(instance_id, true);
            plan.destroy.push(instance_id);
            outstanding -= 1;
        }

        let leaving = ledger
            .instances()
            .filter(|i| i.is_retiring() && !plan.destroy.contains(&i.id))
            .count() as i64;
        outstanding = (outstanding - leaving).max(0);

        let lower = self.params.retirement_lower_threshold;
        let upper = self.params.retirement_upper_threshold;
        let candidates: Vec<u32> = ledger
            .instances()
            .filter(|i| !i.is_retiring())
            .filter(|i| {
                let remaining = i.remaining_rental_time(time);
                lower < remaining && remaining < upper
            })
            .map(|i| i.id)
            .collect();
        for instance_id in candidates {
            if outstanding == 0 {
                break;
            }
            if ledger.set_retiring(instance_id, true) {
                plan.flagged.push(instance_id);
                outstanding -= 1;
            }
        }
        plan
    }
}
