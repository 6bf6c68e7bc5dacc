//! Workload built from arrival and job traces.

use std::fs::File;

use log::info;
use serde::Deserialize;

use crate::core::config::WorkloadConfig;
use crate::core::error::WorkloadError;
use crate::workload::source::{JobSpec, WorkloadSource};

/// Number of jobs arriving in a single interval.
#[derive(Deserialize, Debug)]
struct ArrivalRecord {
    arrivals: u64,
}

/// Transcoding times (in seconds on a single instance) and the number of frames of a video segment.
#[derive(Deserialize, Debug)]
struct JobRecordRow {
    actual_time: f64,
    predicted_time: f64,
    frames: u64,
}

/// Workload source reading two CSV files with headers.
///
/// The arrivals file has an `arrivals` column, every row corresponds to one arrival interval and produces
/// `arrivals / arrival_divisor` jobs. The jobs file has `actual_time`, `predicted_time` and `frames` columns. Times are
/// converted to job sizes using the instance processing rate. The jobs are taken in file order, starting over when the
/// file is exhausted.
pub struct TraceWorkload {
    arrivals: Vec<u64>,
    jobs: Vec<JobSpec>,
    arrival_divisor: u64,
    current_interval: usize,
    current_job: usize,
}

impl TraceWorkload {
    /// Loads traces described by the workload config.
    pub fn load(config: &WorkloadConfig, processing_rate: f64) -> Result<Self, WorkloadError> {
        Self::from_files(
            &config.arrivals,
            &config.jobs,
            config.delimiter,
            config.arrival_divisor,
            processing_rate,
        )
    }

    pub fn from_files(
        arrivals_file_name: &str,
        jobs_file_name: &str,
        delimiter: char,
        arrival_divisor: u64,
        processing_rate: f64,
    ) -> Result<Self, WorkloadError> {
        if !delimiter.is_ascii() {
            return Err(WorkloadError::InvalidDelimiter(delimiter));
        }
        let delimiter = delimiter as u8;
        let arrivals = parse_arrivals(arrivals_file_name, delimiter)?;
        let jobs = parse_jobs(jobs_file_name, delimiter, processing_rate)?;
        if jobs.is_empty() {
            return Err(WorkloadError::EmptyJobTrace(jobs_file_name.to_string()));
        }
        info!(
            "Read {} arrival intervals and {} jobs from traces",
            arrivals.len(),
            jobs.len()
        );
        Ok(Self {
            arrivals,
            jobs,
            arrival_divisor: arrival_divisor.max(1),
            current_interval: 0,
            current_job: 0,
        })
    }

    /// Returns the number of jobs in the jobs trace.
    pub fn job_count(&self) -> usize {
        self.jobs.len()
    }

    /// Returns the number of arrival intervals.
    pub fn interval_count(&self) -> usize {
        self.arrivals.len()
    }
}

impl WorkloadSource for TraceWorkload {
    fn next_batch(&mut self) -> Option<Vec<JobSpec>> {
        let arrivals = *self.arrivals.get(self.current_interval)?;
        self.current_interval += 1;
        let count = arrivals / self.arrival_divisor;
        let mut batch = Vec::with_capacity(count as usize);
        for _ in 0..count {
            batch.push(self.jobs[self.current_job].clone());
            self.current_job = (self.current_job + 1) % self.jobs.len();
        }
        Some(batch)
    }
}

fn open_reader(file_name: &str, delimiter: u8) -> Result<csv::Reader<File>, WorkloadError> {
    csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .trim(csv::Trim::All)
        .from_path(file_name)
        .map_err(|source| WorkloadError::Csv {
            path: file_name.to_string(),
            source,
        })
}

fn parse_arrivals(file_name: &str, delimiter: u8) -> Result<Vec<u64>, WorkloadError> {
    let mut reader = open_reader(file_name, delimiter)?;
    let mut arrivals = Vec::new();
    for record in reader.deserialize() {
        let record: ArrivalRecord = record.map_err(|source| WorkloadError::Csv {
            path: file_name.to_string(),
            source,
        })?;
        arrivals.push(record.arrivals);
    }
    Ok(arrivals)
}

fn parse_jobs(file_name: &str, delimiter: u8, processing_rate: f64) -> Result<Vec<JobSpec>, WorkloadError> {
    let mut reader = open_reader(file_name, delimiter)?;
    let mut jobs = Vec::new();
    for record in reader.deserialize() {
        let record: JobRecordRow = record.map_err(|source| WorkloadError::Csv {
            path: file_name.to_string(),
            source,
        })?;
        jobs.push(JobSpec::new(
            time_to_size(record.actual_time, processing_rate),
            time_to_size(record.predicted_time, processing_rate),
            record.frames.max(1),
        ));
    }
    Ok(jobs)
}

/// Converts transcoding time into job size, sizes are at least 1.
pub(crate) fn time_to_size(time: f64, processing_rate: f64) -> u64 {
    ((time.abs() * processing_rate).floor() as u64).max(1)
}
