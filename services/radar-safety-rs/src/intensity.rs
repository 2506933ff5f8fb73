use crate::constants::{HOT_PIXEL_SIGMA, MEDIAN_WINDOW, MIN_INTENSITY_MM_H};
use crate::error::AnalysisError;
use crate::types::IntensityField;

/// Suppresses isolated hot pixels and zeroes everything below the detection floor.
///
/// A cell is a hot pixel when it exceeds its 3x3 median by more than five standard
/// deviations of the field-wide residual. Spatially coherent cells keep a median close
/// to their own value and survive.
pub fn clean_intensity(field: &IntensityField) -> Result<IntensityField, AnalysisError> {
    let original = field.values();
    let median = median_filter(field);

    let residuals: Vec<f64> = original
        .iter()
        .zip(&median)
        .map(|(value, filtered)| value - filtered)
        .collect();
    let limit = HOT_PIXEL_SIGMA * population_std_dev(&residuals);

    let cleaned = original
        .iter()
        .zip(&median)
        .zip(&residuals)
        .map(|((value, filtered), residual)| {
            let value = if limit > 0.0 && *residual > limit {
                *filtered
            } else {
                *value
            };
            if value < MIN_INTENSITY_MM_H {
                0.0
            } else {
                value
            }
        })
        .collect();

    IntensityField::new(field.edge(), cleaned)
}

/// 3x3 median with out-of-range indices clamped back into the grid, which matches
/// reflect padding for a window of this size.
fn median_filter(field: &IntensityField) -> Vec<f64> {
    let edge = field.edge();
    let reach = (MEDIAN_WINDOW / 2) as isize;
    let last = edge as isize - 1;
    let mut window = Vec::with_capacity(MEDIAN_WINDOW * MEDIAN_WINDOW);
    let mut filtered = Vec::with_capacity(edge * edge);

    for row in 0..edge as isize {
        for col in 0..edge as isize {
            window.clear();
            for dy in -reach..=reach {
                let r = (row + dy).clamp(0, last) as usize;
                for dx in -reach..=reach {
                    let c = (col + dx).clamp(0, last) as usize;
                    window.push(field.get(r, c));
                }
            }
            let mid = window.len() / 2;
            let (_, median, _) = window.select_nth_unstable_by(mid, f64::total_cmp);
            filtered.push(*median);
        }
    }

    filtered
}

fn population_std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let count = values.len() as f64;
    let mean = values.iter().sum::<f64>() / count;
    let variance = values
        .iter()
        .map(|value| (value - mean) * (value - mean))
        .sum::<f64>()
        / count;
    variance.sqrt()
}
