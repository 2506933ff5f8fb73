use std::collections::BTreeMap;

use crate::error::AnalysisError;
use crate::types::{IntensityField, ReferencePoint};

/// Peak intensity among cells whose centre lies within `radius_km` of the reference.
/// Cells beyond the raster edge are never considered.
pub fn max_in_radius(
    field: &IntensityField,
    reference: ReferencePoint,
    radius_km: f64,
    pixel_size_m: f64,
) -> Result<f64, AnalysisError> {
    if !radius_km.is_finite() || radius_km <= 0.0 {
        return Err(AnalysisError::InvalidRadius(radius_km));
    }
    if !pixel_size_m.is_finite() || pixel_size_m <= 0.0 {
        return Err(AnalysisError::InvalidPixelSize(pixel_size_m));
    }
    reference.ensure_within(field)?;

    let radius_px = radius_km * 1000.0 / pixel_size_m;
    let radius_sq = radius_px * radius_px;
    let reach = radius_px.floor() as usize;
    let last = field.edge() - 1;

    let row_start = reference.row.saturating_sub(reach);
    let row_end = reference.row.saturating_add(reach).min(last);
    let col_start = reference.col.saturating_sub(reach);
    let col_end = reference.col.saturating_add(reach).min(last);

    let mut peak: Option<f64> = None;
    for row in row_start..=row_end {
        let dy = row.abs_diff(reference.row) as f64;
        for col in col_start..=col_end {
            let dx = col.abs_diff(reference.col) as f64;
            if dx * dx + dy * dy > radius_sq {
                continue;
            }
            let value = field.get(row, col);
            peak = Some(peak.map_or(value, |current| current.max(value)));
        }
    }

    peak.ok_or(AnalysisError::EmptyMask { radius_km })
}

pub fn max_by_radius(
    field: &IntensityField,
    reference: ReferencePoint,
    radii_km: &[u32],
    pixel_size_m: f64,
) -> Result<BTreeMap<u32, f64>, AnalysisError> {
    radii_km
        .iter()
        .map(|radius| {
            max_in_radius(field, reference, *radius as f64, pixel_size_m)
                .map(|peak| (*radius, peak))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient_field(edge: usize) -> IntensityField {
        let values = (0..edge * edge)
            .map(|index| ((index * 37) % 101) as f64 / 10.0)
            .collect();
        IntensityField::new(edge, values).unwrap()
    }

    #[test]
    fn larger_radius_never_reports_less() {
        let field = gradient_field(41);
        let reference = ReferencePoint::center(41);
        let mut previous = 0.0;
        for radius_km in [1.0, 2.5, 3.0, 7.0, 12.0, 20.0, 35.0] {
            let peak = max_in_radius(&field, reference, radius_km, 1000.0).unwrap();
            assert!(peak >= previous, "{radius_km} km dropped to {peak}");
            previous = peak;
        }
    }

    #[test]
    fn mask_is_inclusive_on_the_circle() {
        let mut values = vec![0.0; 11 * 11];
        // (dx, dy) = (3, 4) sits exactly 5 pixels away.
        values[9 * 11 + 8] = 9.0;
        let field = IntensityField::new(11, values).unwrap();
        let reference = ReferencePoint::center(11);
        assert_eq!(max_in_radius(&field, reference, 5.0, 1000.0).unwrap(), 9.0);
        assert_eq!(max_in_radius(&field, reference, 4.99, 1000.0).unwrap(), 0.0);
    }

    #[test]
    fn corners_outside_circle_are_excluded() {
        let mut values = vec![1.0; 5 * 5];
        values[0] = 50.0;
        let field = IntensityField::new(5, values).unwrap();
        // Corner offset is (2, 2), about 2.83 pixels out.
        let peak = max_in_radius(&field, ReferencePoint::center(5), 2.0, 1000.0).unwrap();
        assert_eq!(peak, 1.0);
    }

    #[test]
    fn values_outside_mask_do_not_matter() {
        let edge = 15;
        let reference = ReferencePoint::center(edge);
        let field = gradient_field(edge);
        let radius_km = 3.0;
        let baseline = max_in_radius(&field, reference, radius_km, 1000.0).unwrap();

        let mut outside: Vec<usize> = Vec::new();
        for row in 0..edge {
            for col in 0..edge {
                let dy = row as f64 - reference.row as f64;
                let dx = col as f64 - reference.col as f64;
                if dx * dx + dy * dy > 9.0 {
                    outside.push(row * edge + col);
                }
            }
        }
        let mut permuted = field.values().to_vec();
        let reversed: Vec<f64> = outside.iter().rev().map(|index| permuted[*index]).collect();
        for (index, value) in outside.iter().zip(reversed) {
            permuted[*index] = value;
        }
        permuted[outside[0]] = 1_000.0;

        let permuted = IntensityField::new(edge, permuted).unwrap();
        assert_eq!(
            max_in_radius(&permuted, reference, radius_km, 1000.0).unwrap(),
            baseline
        );
    }

    #[test]
    fn oversized_radius_is_clipped_to_the_raster() {
        let field = gradient_field(9);
        let expected = field.values().iter().cloned().fold(0.0, f64::max);
        let peak = max_in_radius(&field, ReferencePoint::center(9), 500.0, 1000.0).unwrap();
        assert_eq!(peak, expected);
    }

    #[test]
    fn sub_pixel_radius_still_covers_reference_cell() {
        let mut values = vec![0.0; 9];
        values[4] = 2.5;
        let field = IntensityField::new(3, values).unwrap();
        let peak = max_in_radius(&field, ReferencePoint::center(3), 0.5, 1000.0).unwrap();
        assert_eq!(peak, 2.5);
    }

    #[test]
    fn rejects_non_positive_radius_and_bad_reference() {
        let field = gradient_field(5);
        let reference = ReferencePoint::center(5);
        assert_eq!(
            max_in_radius(&field, reference, 0.0, 1000.0),
            Err(AnalysisError::InvalidRadius(0.0))
        );
        assert_eq!(
            max_in_radius(&field, reference, -3.0, 1000.0),
            Err(AnalysisError::InvalidRadius(-3.0))
        );
        assert_eq!(
            max_in_radius(&field, ReferencePoint { row: 5, col: 0 }, 1.0, 1000.0),
            Err(AnalysisError::ReferenceOutOfBounds {
                row: 5,
                col: 0,
                edge: 5
            })
        );
    }

    #[test]
    fn evaluates_every_configured_radius() {
        let field = gradient_field(21);
        let peaks = max_by_radius(&field, ReferencePoint::center(21), &[10, 3, 1], 1000.0).unwrap();
        assert_eq!(peaks.keys().copied().collect::<Vec<_>>(), vec![1, 3, 10]);
        assert!(peaks[&1] <= peaks[&3] && peaks[&3] <= peaks[&10]);
    }
}
