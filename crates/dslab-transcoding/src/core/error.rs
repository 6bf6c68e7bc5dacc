//! Error types returned at the crate boundary.

use thiserror::Error;

/// Rejected parameter value. The receiver of the value is left unchanged.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParameterError {
    #[error("{name} must be positive, got {value}")]
    NonPositive { name: &'static str, value: f64 },
    #[error("{name} must not be negative, got {value}")]
    Negative { name: &'static str, value: f64 },
    #[error("invalid retirement window ({lower}, {upper}) for rental period {rental_period}")]
    InvalidRetirementWindow { lower: f64, upper: f64, rental_period: f64 },
    #[error("unknown dispatch policy: {0}")]
    UnknownDispatchPolicy(String),
}

/// Failure to load or validate simulation config.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("can't read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("can't parse YAML from {path}: {source}")]
    Yaml {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
    #[error(transparent)]
    Parameter(#[from] ParameterError),
}

/// Failure to load workload traces.
#[derive(Error, Debug)]
pub enum WorkloadError {
    #[error("can't read trace {path}: {source}")]
    Csv {
        path: String,
        #[source]
        source: csv::Error,
    },
    #[error("job trace {0} contains no jobs")]
    EmptyJobTrace(String),
    #[error("delimiter {0:?} is not an ASCII character")]
    InvalidDelimiter(char),
}

pub(crate) fn check_positive(name: &'static str, value: f64) -> Result<(), ParameterError> {
    // also rejects NaN
    if value > 0. {
        Ok(())
    } else {
        Err(ParameterError::NonPositive { name, value })
    }
}

pub(crate) fn check_non_negative(name: &'static str, value: f64) -> Result<(), ParameterError> {
    if value >= 0. {
        Ok(())
    } else {
        Err(ParameterError::Negative { name, value })
    }
}

pub(crate) fn check_retirement_window(lower: f64, upper: f64, rental_period: f64) -> Result<(), ParameterError> {
    if lower >= 0. && lower < upper && upper <= rental_period {
        Ok(())
    } else {
        Err(ParameterError::InvalidRetirementWindow {
            lower,
            upper,
            rental_period,
        })
    }
}
