//! Provisioning and job metrics.

use std::fs::File;
use std::io::Write;

use serde::Serialize;

/// Fleet state recorded once per provisioning cycle.
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct CycleMetrics {
    pub time: f64,
    pub fleet_size: usize,
    pub retiring_instances: usize,
    pub pending_jobs: usize,
    pub total_load_time: f64,
    pub estimated_wait: f64,
    /// Mean waiting time of jobs completed during the cycle.
    pub observed_wait: f64,
    pub sla_wait_target: f64,
    pub delta: i64,
    pub dispatched_jobs: u64,
    pub completed_jobs: u64,
    pub mean_predicted_throughput: f64,
    pub mean_actual_throughput: f64,
}

/// Outcome of a single completed job.
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct JobResult {
    pub job_id: u64,
    pub status: String,
    pub instance_id: u32,
    pub arrival_time: f64,
    pub start_time: f64,
    pub finish_time: f64,
    pub observed_wait: f64,
    pub predicted_wait: f64,
    pub predicted_size: u64,
    pub actual_size: u64,
    pub predicted_throughput: f64,
    pub actual_throughput: f64,
}

/// Receiver of metrics produced by the broker.
pub trait MetricsSink {
    fn record_cycle(&mut self, metrics: &CycleMetrics);

    fn record_job(&mut self, result: &JobResult);
}

/// Sink that drops all records.
#[derive(Default)]
pub struct NoopMetricsSink {}

impl MetricsSink for NoopMetricsSink {
    fn record_cycle(&mut self, _metrics: &CycleMetrics) {}

    fn record_job(&mut self, _result: &JobResult) {}
}

/// Sink that keeps all records in memory.
#[derive(Default)]
pub struct MemoryMetricsSink {
    pub cycles: Vec<CycleMetrics>,
    pub jobs: Vec<JobResult>,
}

impl MemoryMetricsSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Saves cycle metrics to CSV file with the given delimiter.
    pub fn save_cycles(&self, path: &str, delimiter: u8) -> Result<(), csv::Error> {
        save_records(&self.cycles, path, delimiter)
    }

    /// Saves job results to CSV file with the given delimiter.
    pub fn save_jobs(&self, path: &str, delimiter: u8) -> Result<(), csv::Error> {
        save_records(&self.jobs, path, delimiter)
    }
}

impl MetricsSink for MemoryMetricsSink {
    fn record_cycle(&mut self, metrics: &CycleMetrics) {
        self.cycles.push(metrics.clone());
    }

    fn record_job(&mut self, result: &JobResult) {
        self.jobs.push(result.clone());
    }
}

fn save_records<T: Serialize>(records: &[T], path: &str, delimiter: u8) -> Result<(), csv::Error> {
    let file = File::create(path)?;
    let mut wtr = csv::WriterBuilder::new().delimiter(delimiter).from_writer(file);
    for record in records {
        wtr.serialize(record)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Sink that streams records as delimited lines, tab-separated by default.
pub struct CsvMetricsSink<W: Write> {
    cycles: csv::Writer<W>,
    jobs: csv::Writer<W>,
    errors: u64,
}

impl CsvMetricsSink<File> {
    /// Creates sink writing to the given files.
    pub fn create(cycles_path: &str, jobs_path: &str) -> Result<Self, csv::Error> {
        Ok(Self::from_writers(File::create(cycles_path)?, File::create(jobs_path)?, b'\t'))
    }
}

impl<W: Write> CsvMetricsSink<W> {
    pub fn from_writers(cycles: W, jobs: W, delimiter: u8) -> Self {
        Self {
            cycles: csv::WriterBuilder::new().delimiter(delimiter).from_writer(cycles),
            jobs: csv::WriterBuilder::new().delimiter(delimiter).from_writer(jobs),
            errors: 0,
        }
    }

    /// Returns the number of records which failed to be written.
    pub fn errors(&self) -> u64 {
        self.errors
    }

    /// Flushes writers and returns the underlying ones.
    pub fn into_inner(self) -> Result<(W, W), csv::Error> {
        let cycles = self.cycles.into_inner().map_err(|e| csv::Error::from(e.into_error()))?;
        let jobs = self.jobs.into_inner().map_err(|e| csv::Error::from(e.into_error()))?;
        Ok((cycles, jobs))
    }

    fn write<T: Serialize>(wtr: &mut csv::Writer<W>, record: &T) -> Result<(), csv::Error> {
        wtr.serialize(record)?;
        wtr.flush()?;
        Ok(())
    }
}

impl<W: Write> MetricsSink for CsvMetricsSink<W> {
    fn record_cycle(&mut self, metrics: &CycleMetrics) {
        if let Err(e) = Self::write(&mut self.cycles, metrics) {
            log::warn!("failed to write cycle metrics: {}", e);
            self.errors += 1;
        }
    }

    fn record_job(&mut self, result: &JobResult) {
        if let Err(e) = Self::write(&mut self.jobs, result) {
            log::warn!("failed to write job result: {}", e);
            self.errors += 1;
        }
    }
}
