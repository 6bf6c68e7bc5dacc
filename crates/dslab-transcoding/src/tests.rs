use std::io::Write;

use crate::core::config::{parse_config_value, SimulationConfig};
use crate::core::dispatch::{dispatch_policy_resolver, route, DispatchPolicy, LeastLoad, Route, ShortestQueue};
use crate::core::error::{ConfigError, ParameterError, WorkloadError};
use crate::core::instance::InstanceRecord;
use crate::core::job::{JobRecord, JobStatus};
use crate::core::ledger::{CounterUpdate, FleetLedger};
use crate::core::metrics::{CsvMetricsSink, CycleMetrics, JobResult, MemoryMetricsSink, MetricsSink};
use crate::core::provisioner::{ProvisioningController, ProvisioningParams};
use crate::workload::source::{JobSpec, StaticWorkload, WorkloadSource};
use crate::workload::trace::{time_to_size, TraceWorkload};

fn assert_float_eq(x: f64, y: f64, eps: f64) {
    assert!(x > y - eps && x < y + eps, "{} != {}", x, y);
}

fn params() -> ProvisioningParams {
    ProvisioningParams {
        processing_rate: 1.,
        sla_waiting_time: 10.,
        bootstrap_fleet_size: 3,
        min_reconfigure_interval: 540.,
        rental_period: 3600.,
        retirement_lower_threshold: 300.,
        retirement_upper_threshold: 900.,
    }
}

fn ledger_with(count: u32, created_at: f64) -> FleetLedger {
    let mut ledger = FleetLedger::new();
    for id in 0..count {
        ledger.add_instance(InstanceRecord::new(id, created_at, 3600.), 0);
    }
    ledger
}

fn job(id: u64, size: u64) -> JobRecord {
    JobRecord::new(id, size, size, 10).unwrap()
}

// JOBS ////////////////////////////////////////////////////////////////////////////////////////////

#[test]
fn test_job_throughput_recomputed() {
    let mut job = JobRecord::new(0, 1000, 1000, 500).unwrap();
    assert_float_eq(job.predicted_throughput(), 0.5, 1e-12);
    assert_float_eq(job.actual_throughput(), 0.5, 1e-12);

    job.set_actual_size(1200).unwrap();
    assert_float_eq(job.actual_throughput(), 0.4167, 1e-4);
    assert_float_eq(job.predicted_throughput(), 0.5, 1e-12);
    assert_eq!(job.predicted_size(), 1000);

    job.set_frame_count(600).unwrap();
    assert_float_eq(job.actual_throughput(), 0.5, 1e-12);
    assert_float_eq(job.predicted_throughput(), 0.6, 1e-12);
}

#[test]
fn test_job_rejects_invalid_sizes() {
    assert_eq!(
        JobRecord::new(0, 0, 10, 10).unwrap_err(),
        ParameterError::NonPositive {
            name: "actual_size",
            value: 0.
        }
    );
    assert!(JobRecord::new(0, 10, 0, 10).is_err());
    assert!(JobRecord::new(0, 10, 10, 0).is_err());

    let mut job = JobRecord::new(0, 100, 200, 50).unwrap();
    assert!(job.set_actual_size(0).is_err());
    assert!(job.set_predicted_size(0).is_err());
    assert!(job.set_frame_count(0).is_err());
    assert_eq!(job.actual_size(), 100);
    assert_eq!(job.predicted_size(), 200);
    assert_eq!(job.frame_count(), 50);
    assert_float_eq(job.actual_throughput(), 0.5, 1e-12);
    assert_float_eq(job.predicted_throughput(), 0.25, 1e-12);
    assert_eq!(job.status, JobStatus::Created);
    assert_eq!(JobStatus::Completed.to_string(), "SUCCESS");
}

// LEDGER //////////////////////////////////////////////////////////////////////////////////////////

#[test]
fn test_ledger_counters_never_negative() {
    let mut ledger = ledger_with(2, 0.);
    assert_eq!(ledger.add_job(0, 100), CounterUpdate::Applied);
    assert_eq!(ledger.add_job(0, 50), CounterUpdate::Applied);
    assert_eq!(ledger.get(0).unwrap().queued_job_count(), 2);
    assert_eq!(ledger.get(0).unwrap().queued_load(), 150);
    assert_eq!(ledger.total_load(), 150);

    assert_eq!(ledger.remove_job(0, 100), CounterUpdate::Applied);
    assert_eq!(ledger.remove_job(0, 100), CounterUpdate::Clamped);
    assert_eq!(ledger.get(0).unwrap().queued_job_count(), 0);
    assert_eq!(ledger.get(0).unwrap().queued_load(), 0);
    assert_eq!(ledger.remove_job(0, 1), CounterUpdate::Clamped);
    assert_eq!(ledger.get(0).unwrap().queued_job_count(), 0);
    assert_eq!(ledger.get(0).unwrap().queued_load(), 0);

    assert_eq!(ledger.add_job(7, 10), CounterUpdate::UnknownInstance);
    assert_eq!(ledger.remove_job(7, 10), CounterUpdate::UnknownInstance);
}

#[test]
fn test_ledger_membership() {
    let mut ledger = FleetLedger::new();
    ledger.register_request(3);
    ledger.register_request(1);
    assert_eq!(ledger.requested_count(), 2);
    assert!(ledger.resolve_request(3));
    assert!(!ledger.resolve_request(3));
    assert_eq!(ledger.requested_count(), 1);

    ledger.add_instance(InstanceRecord::new(3, 10., 3600.), 42);
    ledger.add_instance(InstanceRecord::new(1, 20., 3600.), 43);
    let ids: Vec<u32> = ledger.instances().map(|i| i.id).collect();
    assert_eq!(ids, vec![1, 3]);
    assert_eq!(ledger.backend(3), Some(42));

    assert!(ledger.set_retiring(3, true));
    assert!(!ledger.set_retiring(3, true));
    assert_eq!(ledger.retiring_count(), 1);
    assert_eq!(ledger.active_count(), 2);

    let removed = ledger.remove_instance(3).unwrap();
    assert!(removed.is_retiring());
    assert!(!ledger.contains(3));
    assert_eq!(ledger.backend(3), None);
    assert!(ledger.remove_instance(3).is_none());
}

#[test]
fn test_remaining_rental_time() {
    let instance = InstanceRecord::new(0, 100., 3600.);
    assert_float_eq(instance.remaining_rental_time(100.), 3600., 1e-9);
    assert_float_eq(instance.remaining_rental_time(3400.), 300., 1e-9);
    assert_float_eq(instance.remaining_rental_time(3800.), 3500., 1e-9);
}

// DISPATCH ////////////////////////////////////////////////////////////////////////////////////////

#[test]
fn test_shortest_queue_balances_jobs() {
    let mut ledger = ledger_with(5, 0.);
    let policy = ShortestQueue::new();
    for id in 0..23 {
        let job = job(id, 1 + id * 37 % 11);
        match route(&policy, &job, &ledger) {
            Route::Instance(instance_id) => {
                ledger.add_job(instance_id, job.predicted_size());
            }
            other => panic!("unexpected route {:?}", other),
        }
    }
    let counts: Vec<u32> = ledger.instances().map(|i| i.queued_job_count()).collect();
    let max = counts.iter().max().unwrap();
    let min = counts.iter().min().unwrap();
    assert!(max - min <= 1, "{:?}", counts);
    assert_eq!(counts.iter().sum::<u32>(), 23);
}

#[test]
fn test_shortest_queue_breaks_ties_by_lowest_id() {
    let mut ledger = ledger_with(3, 0.);
    let policy = ShortestQueue::new();
    assert_eq!(policy.select_instance(&job(0, 10), &ledger), Some(0));
    ledger.add_job(0, 10);
    assert_eq!(policy.select_instance(&job(1, 10), &ledger), Some(1));
    ledger.add_job(1, 10);
    ledger.add_job(2, 10);
    assert_eq!(policy.select_instance(&job(2, 10), &ledger), Some(0));
}

#[test]
fn test_least_load_uses_predicted_size() {
    let mut ledger = ledger_with(3, 0.);
    let policy = LeastLoad::new();
    let big = JobRecord::new(0, 10, 500, 10).unwrap();
    let small = JobRecord::new(1, 1000, 20, 10).unwrap();
    ledger.add_job(0, big.predicted_size());
    ledger.add_job(1, small.predicted_size());
    ledger.add_job(1, small.predicted_size());
    // instance 2 is empty
    assert_eq!(policy.select_instance(&big, &ledger), Some(2));
    ledger.add_job(2, 30);
    // loads are 500, 40 and 30
    assert_eq!(policy.select_instance(&big, &ledger), Some(2));
    assert_eq!(ShortestQueue::new().select_instance(&big, &ledger), Some(0));
}

#[test]
fn test_retiring_instances_are_skipped() {
    let mut ledger = ledger_with(2, 0.);
    ledger.set_retiring(0, true);
    ledger.add_job(1, 100);
    let policy = LeastLoad::new();
    assert_eq!(route(&policy, &job(0, 10), &ledger), Route::Instance(1));

    ledger.set_retiring(1, true);
    assert_eq!(route(&policy, &job(0, 10), &ledger), Route::NoCapacity);
    assert_eq!(route(&policy, &job(0, 10), &FleetLedger::new()), Route::NoCapacity);
}

#[test]
fn test_bound_job_bypasses_policy() {
    let mut ledger = ledger_with(2, 0.);
    ledger.add_job(1, 1000);
    ledger.set_retiring(1, true);
    let mut job = job(0, 10);
    job.bound_instance = Some(1);
    let policy = ShortestQueue::new();
    assert_eq!(route(&policy, &job, &ledger), Route::Instance(1));

    ledger.set_destroy_requested(1, true);
    assert_eq!(route(&policy, &job, &ledger), Route::StaleBinding(1));

    ledger.remove_instance(1);
    assert_eq!(route(&policy, &job, &ledger), Route::StaleBinding(1));
}

#[test]
fn test_dispatch_policy_resolver() {
    assert_eq!(dispatch_policy_resolver("ShortestQueue").unwrap().name(), "ShortestQueue");
    assert_eq!(dispatch_policy_resolver("qlen").unwrap().name(), "ShortestQueue");
    assert_eq!(dispatch_policy_resolver("LeastLoad").unwrap().name(), "LeastLoad");
    assert_eq!(dispatch_policy_resolver("load").unwrap().name(), "LeastLoad");
    assert_eq!(
        dispatch_policy_resolver("Random").err(),
        Some(ParameterError::UnknownDispatchPolicy("Random".to_string()))
    );
    assert_eq!(
        parse_config_value("LeastLoad[option=1]"),
        ("LeastLoad".to_string(), Some("option=1".to_string()))
    );
}

// PROVISIONING ////////////////////////////////////////////////////////////////////////////////////

#[test]
fn test_empty_fleet_requests_bootstrap() {
    let controller = ProvisioningController::new(params()).unwrap();
    let mut ledger = FleetLedger::new();
    let estimate = controller.estimate(&ledger);
    assert_eq!(estimate.total_load, 0);
    assert_eq!(estimate.active_count, 0);
    assert_eq!(estimate.delta, 3);
    assert_float_eq(estimate.estimated_wait, 0., 1e-12);

    let plan = controller.scale_out(&estimate, &mut ledger, 0.);
    assert!(plan.reclaimed.is_empty());
    assert_eq!(plan.new_instances, 3);
}

#[test]
fn test_estimate() {
    let controller = ProvisioningController::new(params()).unwrap();
    let mut ledger = ledger_with(4, 0.);
    ledger.add_job(0, 60);
    ledger.add_job(1, 39);
    let estimate = controller.estimate(&ledger);
    assert_eq!(estimate.total_load, 99);
    assert_float_eq(estimate.total_load_time, 99., 1e-12);
    assert_float_eq(estimate.estimated_wait, 24.75, 1e-12);
    // floor(99 / 10) - 4
    assert_eq!(estimate.delta, 5);
}

#[test]
fn test_scale_out_respects_reconfigure_interval() {
    let mut controller = ProvisioningController::new(params()).unwrap();
    let mut ledger = ledger_with(1, 0.);
    ledger.add_job(0, 100);
    let estimate = controller.estimate(&ledger);
    assert_eq!(estimate.delta, 9);

    assert!(controller.can_reconfigure(0.));
    let plan = controller.scale_out(&estimate, &mut ledger, 0.);
    assert_eq!(plan.new_instances, 9);
    controller.on_fleet_modified(0.);

    for time in [180., 360., 540.] {
        let plan = controller.scale_out(&controller.estimate(&ledger), &mut ledger, time);
        assert!(plan.is_empty(), "scale-out at {}", time);
    }
    let plan = controller.scale_out(&controller.estimate(&ledger), &mut ledger, 720.);
    assert_eq!(plan.new_instances, 9);
}

#[test]
fn test_scale_out_reclaims_retiring_instances_first() {
    let controller = ProvisioningController::new(params()).unwrap();
    let mut ledger = ledger_with(4, 0.);
    ledger.set_retiring(0, true);
    ledger.set_retiring(1, true);
    ledger.set_retiring(2, true);
    ledger.set_destroy_requested(2, true);
    ledger.add_job(3, 90);
    let estimate = controller.estimate(&ledger);
    // floor(90 / 10) - 4
    assert_eq!(estimate.delta, 5);

    let plan = controller.scale_out(&estimate, &mut ledger, 100.);
    assert_eq!(plan.reclaimed, vec![0, 1]);
    assert_eq!(plan.new_instances, 3);
    assert_eq!(plan.reclaimed.len() as i64 + plan.new_instances as i64, estimate.delta);
    assert!(!ledger.get(0).unwrap().is_retiring());
    assert!(!ledger.get(1).unwrap().is_retiring());
    // instance being destroyed is not reclaimed
    assert!(ledger.get(2).unwrap().is_retiring());

    // reclaimed instances were already counted as active
    let estimate = controller.estimate(&ledger);
    assert_eq!(estimate.active_count, 4);
    assert_eq!(estimate.delta, 5);
}

#[test]
fn test_scale_out_only_reclaims_needed_instances() {
    let controller = ProvisioningController::new(params()).unwrap();
    let mut ledger = ledger_with(4, 0.);
    for id in 0..4 {
        ledger.set_retiring(id, true);
    }
    ledger.add_job(0, 60);
    let estimate = controller.estimate(&ledger);
    assert_eq!(estimate.delta, 2);
    let plan = controller.scale_out(&estimate, &mut ledger, 0.);
    assert_eq!(plan.reclaimed, vec![0, 1]);
    assert_eq!(plan.new_instances, 0);
    assert_eq!(ledger.retiring_count(), 2);
}

#[test]
fn test_scale_out_counts_requested_instances() {
    let controller = ProvisioningController::new(params()).unwrap();
    let mut ledger = ledger_with(2, 0.);
    ledger.set_retiring(1, true);
    ledger.add_job(0, 100);
    let estimate = controller.estimate(&ledger);
    assert_eq!(estimate.delta, 8);

    for instance_id in 10..16 {
        ledger.register_request(instance_id);
    }
    let plan = controller.scale_out(&estimate, &mut ledger, 0.);
    assert_eq!(plan.reclaimed, vec![1]);
    assert_eq!(plan.new_instances, 1);

    // requests cover the whole shortfall, retiring instances are left alone
    ledger.set_retiring(1, true);
    for instance_id in 16..18 {
        ledger.register_request(instance_id);
    }
    let plan = controller.scale_out(&controller.estimate(&ledger), &mut ledger, 0.);
    assert!(plan.is_empty());
    assert!(ledger.get(1).unwrap().is_retiring());

    // failed creation frees the slot
    ledger.resolve_request(10);
    let plan = controller.scale_out(&controller.estimate(&ledger), &mut ledger, 0.);
    assert_eq!(plan.reclaimed, vec![1]);
    assert_eq!(plan.new_instances, 0);
}

#[test]
fn test_scale_in_destroys_only_drained_retiring_instances() {
    let controller = ProvisioningController::new(params()).unwrap();
    let mut ledger = ledger_with(4, 0.);
    ledger.set_retiring(1, true);
    ledger.set_retiring(2, true);
    ledger.add_job(2, 5);
    let estimate = controller.estimate(&ledger);
    assert_eq!(estimate.delta, -4);

    let plan = controller.scale_in(&estimate, &mut ledger, 100.);
    assert_eq!(plan.destroy, vec![1]);
    assert!(plan.flagged.is_empty());
    assert!(ledger.get(1).unwrap().is_destroy_requested());
    assert!(!ledger.get(2).unwrap().is_destroy_requested());

    // busy retiring instance is kept until it drains
    let plan = controller.scale_in(&controller.estimate(&ledger), &mut ledger, 200.);
    assert!(plan.destroy.is_empty());

    ledger.remove_job(2, 5);
    let plan = controller.scale_in(&controller.estimate(&ledger), &mut ledger, 300.);
    assert_eq!(plan.destroy, vec![2]);
}

#[test]
fn test_scale_in_flags_instances_near_rental_boundary() {
    let controller = ProvisioningController::new(params()).unwrap();
    let mut ledger = ledger_with(1, 0.);
    let estimate = controller.estimate(&ledger);
    assert_eq!(estimate.delta, -1);

    // remaining = 300, lower bound is excluded
    let plan = controller.scale_in(&estimate, &mut ledger, 3300.);
    assert!(plan.is_empty());
    // remaining = 900, upper bound is excluded
    let plan = controller.scale_in(&estimate, &mut ledger, 2700.);
    assert!(plan.is_empty());
    assert!(!ledger.get(0).unwrap().is_retiring());

    // remaining = 600
    let plan = controller.scale_in(&estimate, &mut ledger, 3000.);
    assert_eq!(plan.flagged, vec![0]);
    assert!(plan.destroy.is_empty());
    assert!(ledger.get(0).unwrap().is_retiring());

    // flagged instance is drained, so it is destroyed on the next cycle
    let plan = controller.scale_in(&controller.estimate(&ledger), &mut ledger, 3180.);
    assert_eq!(plan.destroy, vec![0]);
}

#[test]
fn test_scale_in_stops_at_delta() {
    let controller = ProvisioningController::new(params()).unwrap();
    let mut ledger = ledger_with(6, 0.);
    ledger.set_retiring(0, true);
    ledger.add_job(0, 1);
    // floor(61 / 10) - 6
    ledger.add_job(1, 60);
    let estimate = controller.estimate(&ledger);
    assert_eq!(estimate.delta, 0);
    assert!(controller.scale_in(&estimate, &mut ledger, 3000.).is_empty());

    ledger.remove_job(1, 60);
    let estimate = controller.estimate(&ledger);
    assert_eq!(estimate.delta, -6);
    let plan = controller.scale_in(&estimate, &mut ledger, 3000.);
    // busy retiring instance covers one instance of the excess
    assert!(plan.destroy.is_empty());
    assert_eq!(plan.flagged, vec![1, 2, 3, 4, 5]);
}

#[test]
fn test_scale_in_respects_reconfigure_interval() {
    let mut controller = ProvisioningController::new(params()).unwrap();
    let mut ledger = ledger_with(2, 0.);
    ledger.set_retiring(0, true);
    controller.on_fleet_modified(3000.);
    let plan = controller.scale_in(&controller.estimate(&ledger), &mut ledger, 3100.);
    assert!(plan.is_empty());
    assert!(!ledger.get(0).unwrap().is_destroy_requested());
}

#[test]
fn test_controller_setters() {
    let mut controller = ProvisioningController::new(params()).unwrap();
    assert!(controller.set_sla_waiting_time(0.).is_err());
    assert!(controller.set_sla_waiting_time(-5.).is_err());
    assert!(controller.set_min_reconfigure_interval(-1.).is_err());
    assert!(controller.set_retirement_window(900., 300.).is_err());
    assert!(controller.set_retirement_window(300., 4000.).is_err());
    assert_eq!(controller.params(), &params());

    controller.set_sla_waiting_time(60.).unwrap();
    controller.set_min_reconfigure_interval(0.).unwrap();
    controller.set_retirement_window(0., 600.).unwrap();
    assert_float_eq(controller.params().sla_waiting_time, 60., 1e-12);
    assert_float_eq(controller.params().retirement_upper_threshold, 600., 1e-12);

    let mut invalid = params();
    invalid.bootstrap_fleet_size = 0;
    assert!(ProvisioningController::new(invalid).is_err());
}

// CONFIG //////////////////////////////////////////////////////////////////////////////////////////

#[test]
fn test_config_defaults() {
    let config = SimulationConfig::default();
    assert_float_eq(config.processing_rate, 124162., 1e-9);
    assert_eq!(config.bootstrap_fleet_size, 2000);
    assert_float_eq(config.sla_waiting_time, 180., 1e-9);
    assert_float_eq(config.min_reconfigure_interval, 540., 1e-9);
    assert_float_eq(config.rental_period, 3600., 1e-9);
    assert_float_eq(config.provisioning_interval, 180., 1e-9);
    assert_float_eq(config.dispatch_interval, 5., 1e-9);
    assert_eq!(config.dispatch_policy, "ShortestQueue");
    assert_eq!(config.max_instances, None);
    assert!(config.workload.is_none());
    assert!(config.validate().is_ok());
}

#[test]
fn test_config_from_yaml() {
    let config = SimulationConfig::from_yaml(
        "sla_waiting_time: 60\n\
         dispatch_policy: load\n\
         max_instances: 10\n\
         workload:\n  arrivals: arrivals.csv\n  jobs: jobs.csv\n",
    )
    .unwrap();
    assert_float_eq(config.sla_waiting_time, 60., 1e-9);
    assert_eq!(config.dispatch_policy, "load");
    assert_eq!(config.max_instances, Some(10));
    let workload = config.workload.unwrap();
    assert_eq!(workload.arrivals, "arrivals.csv");
    assert_eq!(workload.delimiter, ';');
    assert_eq!(workload.arrival_divisor, 5);
    assert_float_eq(workload.arrival_interval, 5., 1e-9);
}

#[test]
fn test_config_validation() {
    assert!(matches!(
        SimulationConfig::from_yaml("retirement_lower_threshold: 1000"),
        Err(ConfigError::Parameter(ParameterError::InvalidRetirementWindow { .. }))
    ));
    assert!(matches!(
        SimulationConfig::from_yaml("dispatch_policy: Random"),
        Err(ConfigError::Parameter(ParameterError::UnknownDispatchPolicy(_)))
    ));
    assert!(matches!(
        SimulationConfig::from_yaml("dispatch_interval: 0"),
        Err(ConfigError::Parameter(ParameterError::NonPositive {
            name: "dispatch_interval",
            ..
        }))
    ));
    assert!(matches!(
        SimulationConfig::from_yaml("message_delay: -1"),
        Err(ConfigError::Parameter(ParameterError::Negative { .. }))
    ));
    assert!(matches!(
        SimulationConfig::from_yaml("sla_waiting_time: [1, 2]"),
        Err(ConfigError::Yaml { .. })
    ));
    assert!(matches!(
        SimulationConfig::from_file("no-such-config.yaml"),
        Err(ConfigError::Io { .. })
    ));
}

// WORKLOAD ////////////////////////////////////////////////////////////////////////////////////////

fn write_temp_file(name: &str, content: &str) -> String {
    let path = std::env::temp_dir().join(format!("dslab-transcoding-{}-{}", std::process::id(), name));
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(content.as_bytes()).unwrap();
    path.to_str().unwrap().to_string()
}

#[test]
fn test_static_workload() {
    let mut workload = StaticWorkload::new(vec![vec![JobSpec::new(1, 2, 3)], vec![]]);
    workload.add_batch(vec![JobSpec::new(4, 5, 6).bound_to(7)]);
    assert_eq!(workload.remaining_batches(), 3);
    assert_eq!(workload.next_batch(), Some(vec![JobSpec::new(1, 2, 3)]));
    assert_eq!(workload.next_batch(), Some(vec![]));
    let batch = workload.next_batch().unwrap();
    assert_eq!(batch[0].bound_instance, Some(7));
    assert_eq!(workload.next_batch(), None);
}

#[test]
fn test_trace_workload() {
    let arrivals = write_temp_file("arrivals.csv", "arrivals\n10\n3\n7\n");
    let jobs = write_temp_file(
        "jobs.csv",
        "actual_time;predicted_time;frames\n1.5;2.0;30\n0.5;-0.25;0\n",
    );
    let mut workload = TraceWorkload::from_files(&arrivals, &jobs, ';', 5, 10.).unwrap();
    assert_eq!(workload.interval_count(), 3);
    assert_eq!(workload.job_count(), 2);

    let batch = workload.next_batch().unwrap();
    assert_eq!(batch, vec![JobSpec::new(15, 20, 30), JobSpec::new(5, 2, 1)]);
    assert_eq!(workload.next_batch(), Some(vec![]));
    // jobs trace starts over
    assert_eq!(workload.next_batch(), Some(vec![JobSpec::new(15, 20, 30)]));
    assert_eq!(workload.next_batch(), None);
}

#[test]
fn test_trace_workload_errors() {
    let arrivals = write_temp_file("errors-arrivals.csv", "arrivals\n10\n");
    let empty_jobs = write_temp_file("errors-jobs.csv", "actual_time;predicted_time;frames\n");
    assert!(matches!(
        TraceWorkload::from_files(&arrivals, &empty_jobs, ';', 5, 10.),
        Err(WorkloadError::EmptyJobTrace(_))
    ));
    assert!(matches!(
        TraceWorkload::from_files("no-such-arrivals.csv", &empty_jobs, ';', 5, 10.),
        Err(WorkloadError::Csv { .. })
    ));
    let bad_jobs = write_temp_file("errors-bad-jobs.csv", "actual_time;predicted_time;frames\nx;1;1\n");
    assert!(matches!(
        TraceWorkload::from_files(&arrivals, &bad_jobs, ';', 5, 10.),
        Err(WorkloadError::Csv { .. })
    ));
    assert!(matches!(
        TraceWorkload::from_files(&arrivals, &bad_jobs, '→', 5, 10.),
        Err(WorkloadError::InvalidDelimiter('→'))
    ));
}

#[test]
fn test_time_to_size() {
    assert_eq!(time_to_size(2.5, 124162.), 310405);
    assert_eq!(time_to_size(-1., 100.), 100);
    assert_eq!(time_to_size(0., 100.), 1);
}

// METRICS /////////////////////////////////////////////////////////////////////////////////////////

#[test]
fn test_csv_metrics_sink() {
    let mut sink = CsvMetricsSink::from_writers(Vec::new(), Vec::new(), b'\t');
    sink.record_cycle(&CycleMetrics {
        time: 2.,
        fleet_size: 0,
        retiring_instances: 0,
        pending_jobs: 5,
        total_load_time: 0.,
        estimated_wait: 0.,
        observed_wait: 0.,
        sla_wait_target: 180.,
        delta: 2000,
        dispatched_jobs: 0,
        completed_jobs: 0,
        mean_predicted_throughput: 0.,
        mean_actual_throughput: 0.,
    });
    assert_eq!(sink.errors(), 0);
    let (cycles, jobs) = sink.into_inner().unwrap();
    let cycles = String::from_utf8(cycles).unwrap();
    let lines: Vec<&str> = cycles.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].starts_with("time\tfleet_size\tretiring_instances\tpending_jobs"));
    assert!(lines[1].starts_with("2.0\t0\t0\t5\t"));
    assert!(jobs.is_empty());
}

fn job_result(job_id: u64) -> JobResult {
    JobResult {
        job_id,
        status: JobStatus::Completed.to_string(),
        instance_id: 1,
        arrival_time: 0.,
        start_time: 5.,
        finish_time: 17.,
        observed_wait: 5.,
        predicted_wait: 0.,
        predicted_size: 1000,
        actual_size: 1200,
        predicted_throughput: 0.5,
        actual_throughput: 500. / 1200.,
    }
}

#[test]
fn test_memory_metrics_sink_saves_files() {
    let mut sink = MemoryMetricsSink::new();
    sink.record_job(&job_result(0));
    sink.record_job(&job_result(1));
    sink.record_cycle(&CycleMetrics {
        time: 2.,
        fleet_size: 1,
        retiring_instances: 0,
        pending_jobs: 0,
        total_load_time: 10.,
        estimated_wait: 10.,
        observed_wait: 5.,
        sla_wait_target: 10.,
        delta: 0,
        dispatched_jobs: 2,
        completed_jobs: 2,
        mean_predicted_throughput: 0.5,
        mean_actual_throughput: 0.4,
    });

    let jobs_path = write_temp_file("saved-jobs.tsv", "");
    let cycles_path = write_temp_file("saved-cycles.csv", "");
    sink.save_jobs(&jobs_path, b'\t').unwrap();
    sink.save_cycles(&cycles_path, b',').unwrap();

    let jobs = std::fs::read_to_string(&jobs_path).unwrap();
    let lines: Vec<&str> = jobs.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[0].starts_with("job_id\tstatus\tinstance_id\tarrival_time"));
    assert!(lines[1].starts_with("0\tSUCCESS\t1\t"));
    assert!(lines[2].starts_with("1\tSUCCESS\t1\t"));

    let cycles = std::fs::read_to_string(&cycles_path).unwrap();
    let lines: Vec<&str> = cycles.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].starts_with("time,fleet_size,retiring_instances,pending_jobs"));
    assert!(lines[1].starts_with("2.0,1,0,0,10.0,"));

    assert!(sink.save_jobs("no-such-dir/jobs.tsv", b'\t').is_err());
}
