//! Representation of a transcoding job and its status.

use std::fmt::{Display, Formatter};

use serde::Serialize;

use crate::core::error::{check_positive, ParameterError};

/// Status of transcoding job.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum JobStatus {
    /// Job is created by the workload source but not yet received by the broker.
    Created,
    /// Job waits in the broker queue for an instance.
    Pending,
    /// Job is sent to an instance.
    Dispatched,
    /// Job is finished.
    Completed,
}

impl Display for JobStatus {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            JobStatus::Created => write!(f, "CREATED"),
            JobStatus::Pending => write!(f, "PENDING"),
            JobStatus::Dispatched => write!(f, "DISPATCHED"),
            JobStatus::Completed => write!(f, "SUCCESS"),
        }
    }
}

/// Represents transcoding job.
///
/// Job sizes are measured in abstract computational units (machine instructions). The predicted size comes from an
/// external predictor and is the only size the broker may rely on before the job is completed. Throughput metrics
/// (frames per size unit) are derived from the sizes and kept in sync by the setters.
#[derive(Clone, Debug, Serialize)]
pub struct JobRecord {
    pub id: u64,
    actual_size: u64,
    predicted_size: u64,
    frame_count: u64,
    actual_throughput: f64,
    predicted_throughput: f64,
    /// Instance the job must run on. `None` means the dispatch policy chooses.
    pub bound_instance: Option<u32>,
    /// Expected queueing delay on the chosen instance, set at dispatch time.
    pub predicted_queue_delay: Option<f64>,
    pub arrival_time: f64,
    pub status: JobStatus,
}

impl JobRecord {
    /// Creates job with specified sizes.
    pub fn new(id: u64, actual_size: u64, predicted_size: u64, frame_count: u64) -> Result<Self, ParameterError> {
        check_positive("actual_size", actual_size as f64)?;
        check_positive("predicted_size", predicted_size as f64)?;
        check_positive("frame_count", frame_count as f64)?;
        let mut job = Self {
            id,
            actual_size,
            predicted_size,
            frame_count,
            actual_throughput: 0.,
            predicted_throughput: 0.,
            bound_instance: None,
            predicted_queue_delay: None,
            arrival_time: 0.,
            status: JobStatus::Created,
        };
        job.update_throughput();
        Ok(job)
    }

    pub fn actual_size(&self) -> u64 {
        self.actual_size
    }

    pub fn predicted_size(&self) -> u64 {
        self.predicted_size
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Frames per actual size unit.
    pub fn actual_throughput(&self) -> f64 {
        self.actual_throughput
    }

    /// Frames per predicted size unit.
    pub fn predicted_throughput(&self) -> f64 {
        self.predicted_throughput
    }

    /// Corrects the actual size, e.g. when the ground truth is observed on completion.
    pub fn set_actual_size(&mut self, size: u64) -> Result<(), ParameterError> {
        check_positive("actual_size", size as f64)?;
        self.actual_size = size;
        self.update_throughput();
        Ok(())
    }

    pub fn set_predicted_size(&mut self, size: u64) -> Result<(), ParameterError> {
        check_positive("predicted_size", size as f64)?;
        self.predicted_size = size;
        self.update_throughput();
        Ok(())
    }

    pub fn set_frame_count(&mut self, frame_count: u64) -> Result<(), ParameterError> {
        check_positive("frame_count", frame_count as f64)?;
        self.frame_count = frame_count;
        self.update_throughput();
        Ok(())
    }

    fn update_throughput(&mut self) {
        self.actual_throughput = self.frame_count as f64 / self.actual_size as f64;
        self.predicted_throughput = self.frame_count as f64 / self.predicted_size as f64;
    }
}
