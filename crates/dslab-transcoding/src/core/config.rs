//! Simulation configuration.

use serde::{Deserialize, Serialize};

use crate::core::dispatch::dispatch_policy_resolver;
use crate::core::error::{check_non_negative, check_positive, check_retirement_window, ConfigError, ParameterError};

/// Holds raw simulation config parsed from YAML file.
#[derive(Debug, PartialEq, Serialize, Deserialize, Clone, Default)]
struct RawSimulationConfig {
    pub processing_rate: Option<f64>,
    pub bootstrap_fleet_size: Option<u32>,
    pub sla_waiting_time: Option<f64>,
    pub min_reconfigure_interval: Option<f64>,
    pub rental_period: Option<f64>,
    pub retirement_lower_threshold: Option<f64>,
    pub retirement_upper_threshold: Option<f64>,
    pub provisioning_interval: Option<f64>,
    pub provisioning_start_delay: Option<f64>,
    pub dispatch_interval: Option<f64>,
    pub dispatch_start_delay: Option<f64>,
    pub dispatch_policy: Option<String>,
    pub message_delay: Option<f64>,
    pub instance_start_delay: Option<f64>,
    pub instance_stop_delay: Option<f64>,
    pub max_instances: Option<u32>,
    pub workload: Option<RawWorkloadConfig>,
}

#[derive(Debug, PartialEq, Serialize, Deserialize, Clone)]
struct RawWorkloadConfig {
    pub arrivals: String,
    pub jobs: String,
    pub delimiter: Option<char>,
    pub arrival_interval: Option<f64>,
    pub arrival_divisor: Option<u64>,
}

/// Holds information about the used workload traces.
#[derive(Debug, PartialEq, Serialize, Deserialize, Clone)]
pub struct WorkloadConfig {
    /// Path to CSV file with the number of arrivals per interval.
    pub arrivals: String,
    /// Path to CSV file with job transcoding times.
    pub jobs: String,
    /// Field delimiter used in both files.
    pub delimiter: char,
    /// Time between job batches.
    pub arrival_interval: f64,
    /// The number of arrivals in a trace row is divided by this value.
    pub arrival_divisor: u64,
}

impl std::fmt::Display for WorkloadConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "workload config, arrivals = {}, jobs = {}", self.arrivals, self.jobs)
    }
}

/// Represents simulation config.
#[derive(Debug, PartialEq, Serialize, Deserialize, Clone)]
pub struct SimulationConfig {
    /// Job processing rate of a single instance in size units per second.
    pub processing_rate: f64,
    /// Number of instances requested when the fleet is empty.
    pub bootstrap_fleet_size: u32,
    /// Target average waiting time of jobs in seconds.
    pub sla_waiting_time: f64,
    /// Minimum time in seconds between fleet modifications.
    pub min_reconfigure_interval: f64,
    /// Length of instance rental (billing) period in seconds.
    pub rental_period: f64,
    /// Lower bound of time left in rental period for flagging instance as retiring.
    pub retirement_lower_threshold: f64,
    /// Upper bound of time left in rental period for flagging instance as retiring.
    pub retirement_upper_threshold: f64,
    /// Period in seconds of scale-out and scale-in decisions.
    pub provisioning_interval: f64,
    /// Time of the first provisioning decision.
    pub provisioning_start_delay: f64,
    /// Period in seconds of draining the pending job queue.
    pub dispatch_interval: f64,
    /// Time of the first dispatch.
    pub dispatch_start_delay: f64,
    /// Dispatch policy name.
    pub dispatch_policy: String,
    /// Message delay in seconds for communications with datacenter.
    pub message_delay: f64,
    /// Instance creation duration in seconds.
    pub instance_start_delay: f64,
    /// Instance destruction duration in seconds.
    pub instance_stop_delay: f64,
    /// Maximum number of instances in datacenter, unlimited if not set.
    pub max_instances: Option<u32>,
    /// Used workload traces.
    pub workload: Option<WorkloadConfig>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self::from_raw(RawSimulationConfig::default())
    }
}

impl SimulationConfig {
    /// Creates simulation config by reading parameter values from YAML file
    /// (uses default values if some parameters are absent).
    pub fn from_file(file_name: &str) -> Result<Self, ConfigError> {
        let data = std::fs::read_to_string(file_name).map_err(|source| ConfigError::Io {
            path: file_name.to_string(),
            source,
        })?;
        Self::from_yaml(&data).map_err(|e| match e {
            ConfigError::Yaml { source, .. } => ConfigError::Yaml {
                path: file_name.to_string(),
                source,
            },
            other => other,
        })
    }

    /// Creates simulation config from YAML string.
    pub fn from_yaml(data: &str) -> Result<Self, ConfigError> {
        let raw: RawSimulationConfig = serde_yaml::from_str(data).map_err(|source| ConfigError::Yaml {
            path: "<string>".to_string(),
            source,
        })?;
        let config = Self::from_raw(raw);
        config.validate()?;
        Ok(config)
    }

    fn from_raw(raw: RawSimulationConfig) -> Self {
        Self {
            processing_rate: raw.processing_rate.unwrap_or(124162.),
            bootstrap_fleet_size: raw.bootstrap_fleet_size.unwrap_or(2000),
            sla_waiting_time: raw.sla_waiting_time.unwrap_or(180.),
            min_reconfigure_interval: raw.min_reconfigure_interval.unwrap_or(540.),
            rental_period: raw.rental_period.unwrap_or(3600.),
            retirement_lower_threshold: raw.retirement_lower_threshold.unwrap_or(300.),
            retirement_upper_threshold: raw.retirement_upper_threshold.unwrap_or(900.),
            provisioning_interval: raw.provisioning_interval.unwrap_or(180.),
            provisioning_start_delay: raw.provisioning_start_delay.unwrap_or(2.),
            dispatch_interval: raw.dispatch_interval.unwrap_or(5.),
            dispatch_start_delay: raw.dispatch_start_delay.unwrap_or(5.),
            dispatch_policy: raw.dispatch_policy.unwrap_or_else(|| "ShortestQueue".to_string()),
            message_delay: raw.message_delay.unwrap_or(0.),
            instance_start_delay: raw.instance_start_delay.unwrap_or(0.),
            instance_stop_delay: raw.instance_stop_delay.unwrap_or(0.),
            max_instances: raw.max_instances,
            workload: raw.workload.map(|w| WorkloadConfig {
                arrivals: w.arrivals,
                jobs: w.jobs,
                delimiter: w.delimiter.unwrap_or(';'),
                arrival_interval: w.arrival_interval.unwrap_or(5.),
                arrival_divisor: w.arrival_divisor.unwrap_or(5),
            }),
        }
    }

    /// Checks parameter values.
    pub fn validate(&self) -> Result<(), ParameterError> {
        check_positive("processing_rate", self.processing_rate)?;
        check_positive("bootstrap_fleet_size", self.bootstrap_fleet_size as f64)?;
        check_positive("sla_waiting_time", self.sla_waiting_time)?;
        check_non_negative("min_reconfigure_interval", self.min_reconfigure_interval)?;
        check_positive("rental_period", self.rental_period)?;
        check_retirement_window(
            self.retirement_lower_threshold,
            self.retirement_upper_threshold,
            self.rental_period,
        )?;
        check_positive("provisioning_interval", self.provisioning_interval)?;
        check_non_negative("provisioning_start_delay", self.provisioning_start_delay)?;
        check_positive("dispatch_interval", self.dispatch_interval)?;
        check_non_negative("dispatch_start_delay", self.dispatch_start_delay)?;
        check_non_negative("message_delay", self.message_delay)?;
        check_non_negative("instance_start_delay", self.instance_start_delay)?;
        check_non_negative("instance_stop_delay", self.instance_stop_delay)?;
        dispatch_policy_resolver(&self.dispatch_policy)?;
        if let Some(workload) = &self.workload {
            check_positive("arrival_interval", workload.arrival_interval)?;
            check_positive("arrival_divisor", workload.arrival_divisor as f64)?;
        }
        Ok(())
    }
}

/// Parses config value string, which consists of two parts - name and options.
///
/// Example: `LeastLoad[option=value]` parses into `("LeastLoad", Some("option=value"))`.
pub fn parse_config_value(config_str: &str) -> (String, Option<String>) {
    match config_str.split_once('[') {
        Some((l, r)) => (l.to_string(), Some(r.to_string().replace(']', ""))),
        None => (config_str.to_string(), None),
    }
}
