use rstar::{PointDistance, RTree};

use crate::error::AnalysisError;
use crate::types::{IntensityField, ReferencePoint};

/// Distance in km from the reference to the closest cell with any precipitation, or
/// `None` when the whole field is dry.
pub fn distance_to_nearest_rain(
    field: &IntensityField,
    reference: ReferencePoint,
    pixel_size_m: f64,
) -> Result<Option<f64>, AnalysisError> {
    if !pixel_size_m.is_finite() || pixel_size_m <= 0.0 {
        return Err(AnalysisError::InvalidPixelSize(pixel_size_m));
    }
    reference.ensure_within(field)?;

    let edge = field.edge();
    let wet_cells: Vec<[f64; 2]> = field
        .values()
        .iter()
        .enumerate()
        .filter(|(_, value)| **value > 0.0)
        .map(|(index, _)| [(index / edge) as f64, (index % edge) as f64])
        .collect();
    if wet_cells.is_empty() {
        return Ok(None);
    }

    // Points are (row, col) in pixel space; distances convert to km at the end.
    let tree = RTree::bulk_load(wet_cells);
    let query = [reference.row as f64, reference.col as f64];
    let distance_px = tree
        .nearest_neighbor_iter(&query)
        .next()
        .map(|nearest| nearest.distance_2(&query).sqrt());

    Ok(distance_px.map(|pixels| pixels * pixel_size_m / 1000.0))
}
