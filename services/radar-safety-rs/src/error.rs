use reqwest::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Required setting {name} is not set")]
    Missing { name: &'static str },

    #[error("Invalid value {value:?} for {name}: {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Error)]
#[error("Radar raster for {timestamp} is not usable: {reason}")]
pub struct InvalidRasterError {
    pub timestamp: String,
    pub reason: String,
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("No radar observations available at or before {target}")]
    NoObservations { target: String },

    #[error(transparent)]
    InvalidRaster(#[from] InvalidRasterError),

    #[error(transparent)]
    Upstream(#[from] anyhow::Error),
}

/// Violations of the pipeline's input invariants. None of these should occur with a
/// valid configuration and a decoded raster; the loop treats them as fatal to the cycle.
#[derive(Debug, Error, PartialEq)]
pub enum AnalysisError {
    #[error("Field {edge}x{edge} expects {expected} values, got {actual}")]
    ShapeMismatch {
        edge: usize,
        expected: usize,
        actual: usize,
    },

    #[error("Field value {value} at index {index} is negative or not finite")]
    InvalidValue { index: usize, value: f64 },

    #[error("Pixel size must be positive and finite, got {0}")]
    InvalidPixelSize(f64),

    #[error("Radius must be positive and finite, got {0} km")]
    InvalidRadius(f64),

    #[error("Reference point ({row}, {col}) lies outside a {edge}x{edge} field")]
    ReferenceOutOfBounds { row: usize, col: usize, edge: usize },

    #[error("Circular mask of {radius_km} km selects no cells")]
    EmptyMask { radius_km: f64 },
}

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Transport failure posting metrics to {endpoint}: {source}")]
    Transport {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Protocol failure posting metrics to {endpoint}: unexpected status {status}")]
    Protocol { endpoint: String, status: StatusCode },
}
