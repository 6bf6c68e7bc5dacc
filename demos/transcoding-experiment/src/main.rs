use std::error::Error;
use std::time::Instant;

use clap::Parser;
use log::info;
use sugars::{rc, refcell};

use dslab_core::simulation::Simulation;
use dslab_transcoding::core::config::{SimulationConfig, WorkloadConfig};
use dslab_transcoding::core::metrics::CsvMetricsSink;
use dslab_transcoding::simulation::TranscodingSimulation;
use dslab_transcoding::workload::trace::TraceWorkload;

fn init_logger() {
    use env_logger::Builder;
    use std::io::Write;
    Builder::from_default_env()
        .format(|buf, record| writeln!(buf, "{}", record.args()))
        .init();
}

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// Path to simulation config
    #[clap(short, long)]
    config: String,

    /// Path to arrivals trace (overrides config)
    #[clap(long)]
    arrivals: Option<String>,

    /// Path to jobs trace (overrides config)
    #[clap(long)]
    jobs: Option<String>,

    /// Dispatch policy: ShortestQueue (qlen) or LeastLoad (load)
    #[clap(short, long)]
    policy: Option<String>,

    /// Output file with provisioning cycle metrics
    #[clap(long, default_value = "metrics.tsv")]
    metrics: String,

    /// Output file with job results
    #[clap(long, default_value = "results.tsv")]
    results: String,

    /// Random seed
    #[clap(long, default_value_t = 123)]
    seed: u64,
}

fn workload_config(config: &SimulationConfig, args: &Args) -> Result<WorkloadConfig, Box<dyn Error>> {
    let mut workload = match (&config.workload, &args.arrivals, &args.jobs) {
        (Some(workload), _, _) => workload.clone(),
        (None, Some(arrivals), Some(jobs)) => WorkloadConfig {
            arrivals: arrivals.clone(),
            jobs: jobs.clone(),
            delimiter: ';',
            arrival_interval: 5.,
            arrival_divisor: 5,
        },
        _ => return Err("workload traces are not specified".into()),
    };
    if let Some(arrivals) = &args.arrivals {
        workload.arrivals = arrivals.clone();
    }
    if let Some(jobs) = &args.jobs {
        workload.jobs = jobs.clone();
    }
    Ok(workload)
}

fn main() -> Result<(), Box<dyn Error>> {
    init_logger();
    let args = Args::parse();

    let mut config = SimulationConfig::from_file(&args.config)?;
    if let Some(policy) = &args.policy {
        config.dispatch_policy = policy.clone();
    }
    let workload = workload_config(&config, &args)?;
    info!("Using {}", workload);
    let trace = TraceWorkload::load(&workload, config.processing_rate)?;

    let metrics = rc!(refcell!(CsvMetricsSink::create(&args.metrics, &args.results)?));
    let mut sim = TranscodingSimulation::with_metrics_sink(Simulation::new(args.seed), config, metrics.clone())?;
    sim.add_workload(Box::new(trace), workload.arrival_interval);

    let t = Instant::now();
    sim.step_until_no_events();
    let elapsed = t.elapsed().as_secs_f64();

    let stats = sim.stats();
    info!(
        "Simulated {:.0} seconds with {} policy in {:.2} s ({} events)",
        sim.current_time(),
        sim.broker().borrow().policy_name(),
        elapsed,
        sim.event_count()
    );
    info!(
        "Jobs: received {}, completed {}, rejected {}, unprocessed {}, mean wait {:.2} s",
        stats.jobs_received,
        stats.jobs_completed,
        stats.jobs_rejected,
        stats.jobs_unprocessed,
        stats.mean_observed_wait()
    );
    info!(
        "Instances: requested {}, created {}, failed {}, destroyed {}, reclaimed {}, flagged {}",
        stats.instances_requested,
        stats.instances_created,
        stats.instance_creations_failed,
        stats.instances_destroyed,
        stats.instances_reclaimed,
        stats.instances_flagged
    );
    let errors = metrics.borrow().errors();
    if errors > 0 {
        return Err(format!("failed to write {} metric records", errors).into());
    }
    info!("Metrics saved to {} and {}", args.metrics, args.results);
    Ok(())
}
