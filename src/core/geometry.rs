//! Geometric and burst-grid compatibility tests between scenes

use crate::core::burst_grid::SceneBurstGrid;
use crate::types::{Aoi, Point, Rectangle, StackError, StackResult};

/// Strict interior test: a point on an edge is not contained
pub fn point_in_rectangle(p: &Point, r: &Rectangle) -> bool {
    r.min.lon < p.lon && p.lon < r.max.lon && r.min.lat < p.lat && p.lat < r.max.lat
}

/// Whether the point lies inside at least one sub-swath footprint
pub fn point_in_any_subswath(p: &Point, grids: &SceneBurstGrid) -> bool {
    grids.iter().any(|grid| point_in_rectangle(p, grid.footprint()))
}

/// Whether all four AOI corners lie inside the sub-swath footprints.
///
/// Only the vertices are tested. An AOI whose corners are covered but whose
/// interior crosses a gap between footprints still passes.
pub fn aoi_contained(aoi: &Aoi, grids: &SceneBurstGrid) -> bool {
    aoi.corners().iter().all(|corner| point_in_any_subswath(corner, grids))
}

/// Whether every sub-swath has the same number of bursts in both grids
pub fn burst_counts_match(a: &SceneBurstGrid, b: &SceneBurstGrid) -> bool {
    a.iter().zip(b.iter()).all(|(x, y)| x.burst_count() == y.burst_count())
}

/// Euclidean norm of all burst timing differences across the three sub-swaths.
///
/// Undefined, and an error, when any sub-swath differs in burst count.
pub fn burst_alignment_distance(a: &SceneBurstGrid, b: &SceneBurstGrid) -> StackResult<f64> {
    let mut sum = 0.0;

    for (swath, (x, y)) in a.iter().zip(b.iter()).enumerate() {
        if x.burst_count() != y.burst_count() {
            return Err(StackError::BurstCountMismatch {
                swath: swath + 1,
                first: x.burst_count(),
                second: y.burst_count(),
            });
        }

        sum += x
            .burst_times()
            .iter()
            .zip(y.burst_times())
            .map(|(t1, t2)| (t1 - t2) * (t1 - t2))
            .sum::<f64>();
    }

    Ok(sum.sqrt())
}

/// True when `|value|` rounded half-to-even is not zero
pub fn is_non_zero_after_rounding(value: f64) -> bool {
    value.abs().round_ties_even() > 0.0
}

/// Admission rule for a candidate's distance to the master: it must round to zero
pub fn is_aligned(distance: f64) -> bool {
    !is_non_zero_after_rounding(distance)
}
