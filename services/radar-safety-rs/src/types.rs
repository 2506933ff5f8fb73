use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;

use crate::constants::RAW_COUNTS_PER_MM_H;
use crate::error::AnalysisError;

#[derive(Clone)]
pub struct AppState {
    pub latest: Arc<RwLock<Option<Arc<LatestStatus>>>>,
}

/// Square row-major grid of precipitation intensities in mm/h.
#[derive(Clone, Debug, PartialEq)]
pub struct IntensityField {
    edge: usize,
    values: Vec<f64>,
}

impl IntensityField {
    pub fn new(edge: usize, values: Vec<f64>) -> Result<Self, AnalysisError> {
        let expected = edge * edge;
        if edge == 0 || values.len() != expected {
            return Err(AnalysisError::ShapeMismatch {
                edge,
                expected,
                actual: values.len(),
            });
        }
        if let Some((index, value)) = values
            .iter()
            .enumerate()
            .find(|(_, value)| !value.is_finite() || **value < 0.0)
        {
            return Err(AnalysisError::InvalidValue {
                index,
                value: *value,
            });
        }
        Ok(Self { edge, values })
    }

    pub fn from_raw(raster: &RawRaster) -> Result<Self, AnalysisError> {
        let values = raster
            .counts
            .iter()
            .map(|count| *count as f64 / RAW_COUNTS_PER_MM_H)
            .collect();
        Self::new(raster.edge, values)
    }

    pub fn edge(&self) -> usize {
        self.edge
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.values[row * self.edge + col]
    }

    /// Peak over the whole raster.
    pub fn max_value(&self) -> f64 {
        self.values.iter().copied().fold(0.0, f64::max)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReferencePoint {
    pub row: usize,
    pub col: usize,
}

impl ReferencePoint {
    pub fn center(edge: usize) -> Self {
        Self {
            row: edge / 2,
            col: edge / 2,
        }
    }

    pub fn ensure_within(&self, field: &IntensityField) -> Result<(), AnalysisError> {
        if self.row >= field.edge() || self.col >= field.edge() {
            return Err(AnalysisError::ReferenceOutOfBounds {
                row: self.row,
                col: self.col,
                edge: field.edge(),
            });
        }
        Ok(())
    }
}

#[derive(Clone, Debug)]
pub struct RadarFrame {
    pub field: IntensityField,
    pub pixel_size_m: f64,
    pub observed_at: DateTime<Utc>,
}

impl RadarFrame {
    pub fn new(
        field: IntensityField,
        pixel_size_m: f64,
        observed_at: DateTime<Utc>,
    ) -> Result<Self, AnalysisError> {
        if !pixel_size_m.is_finite() || pixel_size_m <= 0.0 {
            return Err(AnalysisError::InvalidPixelSize(pixel_size_m));
        }
        Ok(Self {
            field,
            pixel_size_m,
            observed_at,
        })
    }
}

/// Decoded single-channel raster in device counts (hundredths of mm/h).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawRaster {
    pub edge: usize,
    pub counts: Vec<u16>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct DerivedMetrics {
    pub field_max_mm_h: f64,
    pub max_intensity_by_radius: BTreeMap<u32, f64>,
    pub rain_distance_km: Option<f64>,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl BoundingBox {
    pub fn centered(x: f64, y: f64, size: f64) -> Self {
        let half = size / 2.0;
        Self {
            min_x: x - half,
            min_y: y - half,
            max_x: x + half,
            max_y: y + half,
        }
    }

    pub fn to_query_value(&self) -> String {
        format!("{},{},{},{}", self.min_x, self.min_y, self.max_x, self.max_y)
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct LatestStatus {
    pub timestamp: String,
    #[serde(rename = "processedAt")]
    pub processed_at: String,
    #[serde(rename = "maxIntensityMmH")]
    pub max_intensity_mm_h: BTreeMap<String, f64>,
    #[serde(rename = "rainDistanceKm")]
    pub rain_distance_km: Option<f64>,
    pub delivered: bool,
    #[serde(rename = "deliveryError")]
    pub delivery_error: Option<String>,
}
