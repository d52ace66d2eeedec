use std::f64::consts::PI;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::cancel::CancellationToken;
use crate::errors::{TerrainError, TerrainResult};
use crate::plane_fit::fit_plane;
use crate::point::{LidarPoint, TerrainMetrics};
use crate::spatial_index::SpatialIndex;
use crate::store::PointStore;

/// Slope normalizer for the traversability score, in degrees.
const MAX_SLOPE_DEG: f64 = 90.0;

/// Roughness normalizer for the traversability score, in the length unit
/// of the input coordinates.
const MAX_ROUGH: f64 = 1.0;

/// Configuration of the metrics engine.
#[derive(Debug, Clone)]
pub struct MetricsConfig {
    /// Neighborhood radius used by the area-wide sweep.
    pub neighborhood_radius: f64,
    /// Rows per write-back transaction during the sweep. Write-back is
    /// batched like bulk loading so a sweep over millions of points does
    /// not open one transaction per point.
    pub write_batch_size: usize,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        MetricsConfig {
            neighborhood_radius: 5.0,
            write_batch_size: 10_000,
        }
    }
}

/// Outcome summary of an area-wide metrics sweep.
///
/// Isolated or degenerate points are skipped with their derived fields left
/// unset; they never fail the whole sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSummary {
    /// Points visited by the sweep.
    pub points_processed: u64,
    /// Points whose derived metric columns were written back.
    pub points_updated: u64,
    /// Points skipped because no neighbor fell inside the query box.
    pub skipped_no_neighbors: u64,
    /// Points skipped because the plane fit was underdetermined.
    pub skipped_degenerate: u64,
}

/// Computes per-point terrain metrics from local plane fits.
///
/// For a single point the engine only reads: it narrows to the neighborhood
/// through [`SpatialIndex::range_query`], fits a least-squares plane and
/// derives slope, roughness, curvature, the traversability score and the
/// plane's unit normal. The area-wide sweep additionally persists the
/// derived columns, funneling write-back through the single writer in
/// batches.
pub struct MetricsEngine {
    store: Arc<PointStore>,
    index: SpatialIndex,
    config: MetricsConfig,
}

impl MetricsEngine {
    pub(crate) fn new(store: Arc<PointStore>, index: SpatialIndex, config: MetricsConfig) -> Self {
        MetricsEngine {
            store,
            index,
            config,
        }
    }

    /// Computes metrics for the neighborhood of `(x, y)` within `radius`.
    ///
    /// Returns `Ok(None)` when the neighborhood is empty — an isolated
    /// point has no slope/roughness/curvature estimate, and that is not an
    /// error. Fails with [`TerrainError::SingularFit`] when the
    /// neighborhood cannot determine a plane; callers running a sweep
    /// treat that the same as `None`.
    ///
    /// The returned point carries the query coordinates and the computed
    /// metrics with `id == 0`; it is not persisted.
    pub fn compute_for_point(
        &self,
        x: f64,
        y: f64,
        z: f64,
        radius: f64,
        cancel: &CancellationToken,
    ) -> TerrainResult<Option<LidarPoint>> {
        cancel.checkpoint()?;
        let neighbor_ids = self.index.range_query(x - radius, x + radius, y - radius, y + radius);
        if neighbor_ids.is_empty() {
            return Ok(None);
        }
        let neighbors = self.store.points_by_ids(&neighbor_ids)?;
        if neighbors.is_empty() {
            return Ok(None);
        }

        let metrics = derive_metrics(&neighbors)?;
        Ok(Some(LidarPoint {
            id: 0,
            easting: x,
            northing: y,
            altitude: Some(z),
            zone: None,
            classification: None,
            metrics: Some(metrics),
        }))
    }

    /// Recomputes metrics for every point of the area, centered on each
    /// point's own coordinates with the configured neighborhood radius,
    /// and writes the derived columns back in batches.
    pub fn compute_area(&self, cancel: &CancellationToken) -> TerrainResult<MetricsSummary> {
        let positions = self.store.positions()?;
        let mut summary = MetricsSummary::default();
        let mut pending: Vec<(i64, TerrainMetrics)> = Vec::new();

        for (id, easting, northing, _altitude) in positions {
            cancel.checkpoint()?;
            summary.points_processed += 1;

            let radius = self.config.neighborhood_radius;
            let neighbor_ids = self.index.range_query(
                easting - radius,
                easting + radius,
                northing - radius,
                northing + radius,
            );
            if neighbor_ids.is_empty() {
                summary.skipped_no_neighbors += 1;
                continue;
            }
            let neighbors = self.store.points_by_ids(&neighbor_ids)?;
            if neighbors.is_empty() {
                summary.skipped_no_neighbors += 1;
                continue;
            }

            match derive_metrics(&neighbors) {
                Ok(metrics) => pending.push((id, metrics)),
                Err(TerrainError::SingularFit(_)) => {
                    summary.skipped_degenerate += 1;
                    continue;
                }
                Err(e) => return Err(e),
            }

            if pending.len() >= self.config.write_batch_size {
                self.store.write_metrics_batch(&pending)?;
                summary.points_updated += pending.len() as u64;
                pending.clear();
            }
        }

        cancel.checkpoint()?;
        self.store.write_metrics_batch(&pending)?;
        summary.points_updated += pending.len() as u64;

        log::info!(
            "metrics sweep: {} processed, {} updated, {} isolated, {} degenerate",
            summary.points_processed,
            summary.points_updated,
            summary.skipped_no_neighbors,
            summary.skipped_degenerate
        );
        Ok(summary)
    }
}

/// Derives the full metric set from one neighborhood fit.
fn derive_metrics(neighbors: &[LidarPoint]) -> TerrainResult<TerrainMetrics> {
    let fit = fit_plane(neighbors)?;
    let slope = (fit.a * fit.a + fit.b * fit.b).sqrt().atan() * (180.0 / PI);
    let (normal_x, normal_y, normal_z) = fit.unit_normal();
    Ok(TerrainMetrics {
        normal_x,
        normal_y,
        normal_z,
        slope,
        rough: fit.rough,
        curvature: fit.curvature,
        trav_score: traversability_score(slope, fit.rough, fit.curvature),
    })
}

/// Traversability heuristic: slope normalized by 90°, roughness by 1.0,
/// each clamped to [0, 1]; curvature enters unnormalized. The result is
/// clamped to [0, 1]. A heuristic, not a calibrated model.
pub fn traversability_score(slope: f64, rough: f64, curvature: f64) -> f64 {
    let slope_norm = (slope / MAX_SLOPE_DEG).clamp(0.0, 1.0);
    let rough_norm = (rough / MAX_ROUGH).clamp(0.0, 1.0);
    (1.0 - (slope_norm + rough_norm + curvature)).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn score_is_bounded_for_arbitrary_inputs() {
        let cases = [
            (0.0, 0.0, 0.0),
            (90.0, 1.0, 1.0),
            (45.0, 0.2, 0.1),
            (1e9, 1e9, 1e9),
            (-5.0, -0.5, -2.0),
            (f64::MAX, 0.0, 0.0),
        ];
        for (slope, rough, curvature) in cases {
            let score = traversability_score(slope, rough, curvature);
            assert!((0.0..=1.0).contains(&score), "score {} out of bounds", score);
        }
    }

    #[test]
    fn flat_smooth_terrain_scores_one() {
        assert_eq!(traversability_score(0.0, 0.0, 0.0), 1.0);
    }

    #[test]
    fn steep_terrain_scores_zero() {
        assert_eq!(traversability_score(90.0, 1.0, 0.5), 0.0);
    }

    #[test]
    fn score_decreases_with_slope() {
        let flat = traversability_score(0.0, 0.1, 0.05);
        let steep = traversability_score(45.0, 0.1, 0.05);
        assert!(steep < flat);
    }

    #[test]
    fn curvature_enters_unnormalized() {
        // 0.3 curvature costs exactly 0.3
        let base = traversability_score(0.0, 0.0, 0.0);
        let curved = traversability_score(0.0, 0.0, 0.3);
        assert!((base - curved - 0.3).abs() < 1e-12);
    }
}
