//! Ordinary least-squares plane fitting over a point neighborhood.
//!
//! Fits `z = a·easting + b·northing + c` by solving the normal equations
//! `(AᵗA) [a, b, c]ᵗ = AᵗB`, where the design matrix rows are
//! `[easting, northing, 1]` and the targets are the altitudes (a missing
//! altitude is treated as 0.0). `AᵗA` and `AᵗB` are accumulated directly,
//! so the fit runs in one pass without materializing `A`.

use nalgebra::{Matrix3, Vector3};

use crate::errors::{TerrainError, TerrainResult};
use crate::point::LidarPoint;

/// A fitted plane and its residual statistics.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct PlaneFit {
    /// Easting coefficient.
    pub a: f64,
    /// Northing coefficient.
    pub b: f64,
    /// Constant offset.
    pub c: f64,
    /// RMS of the residuals `altitude - (a·e + b·n + c)`.
    pub rough: f64,
    /// Mean absolute residual.
    pub curvature: f64,
}

impl PlaneFit {
    /// Unit normal of the fitted plane, `(-a, -b, 1) / ‖(-a, -b, 1)‖`.
    pub fn unit_normal(&self) -> (f64, f64, f64) {
        let norm = (self.a * self.a + self.b * self.b + 1.0).sqrt();
        (-self.a / norm, -self.b / norm, 1.0 / norm)
    }
}

/// Fits a plane to the neighbor set.
///
/// Fails with [`TerrainError::SingularFit`] when the normal equations are
/// not solvable — fewer than 3 neighbors, or neighbors that do not span the
/// plane (e.g. all colinear).
pub(crate) fn fit_plane(neighbors: &[LidarPoint]) -> TerrainResult<PlaneFit> {
    if neighbors.len() < 3 {
        return Err(TerrainError::singular_fit(format!(
            "{} neighbors, need at least 3",
            neighbors.len()
        )));
    }

    let mut ata = Matrix3::<f64>::zeros();
    let mut atb = Vector3::<f64>::zeros();
    for p in neighbors {
        let e = p.easting;
        let n = p.northing;
        let z = p.altitude.unwrap_or(0.0);
        ata[(0, 0)] += e * e;
        ata[(0, 1)] += e * n;
        ata[(0, 2)] += e;
        ata[(1, 1)] += n * n;
        ata[(1, 2)] += n;
        atb[0] += e * z;
        atb[1] += n * z;
        atb[2] += z;
    }
    ata[(1, 0)] = ata[(0, 1)];
    ata[(2, 0)] = ata[(0, 2)];
    ata[(2, 1)] = ata[(1, 2)];
    ata[(2, 2)] = neighbors.len() as f64;

    let coeffs = ata
        .lu()
        .solve(&atb)
        .ok_or_else(|| TerrainError::singular_fit("normal equations are not invertible"))?;
    let (a, b, c) = (coeffs[0], coeffs[1], coeffs[2]);

    if !(a.is_finite() && b.is_finite() && c.is_finite()) {
        return Err(TerrainError::singular_fit("non-finite fit coefficients"));
    }

    let mut sum_sq = 0.0;
    let mut sum_abs = 0.0;
    for p in neighbors {
        let fitted = a * p.easting + b * p.northing + c;
        let residual = p.altitude.unwrap_or(0.0) - fitted;
        sum_sq += residual * residual;
        sum_abs += residual.abs();
    }
    let count = neighbors.len() as f64;

    Ok(PlaneFit {
        a,
        b,
        c,
        rough: (sum_sq / count).sqrt(),
        curvature: sum_abs / count,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(easting: f64, northing: f64, altitude: f64) -> LidarPoint {
        LidarPoint {
            id: 0,
            easting,
            northing,
            altitude: Some(altitude),
            zone: None,
            classification: None,
            metrics: None,
        }
    }

    fn on_plane(a: f64, b: f64, c: f64, e: f64, n: f64) -> LidarPoint {
        point(e, n, a * e + b * n + c)
    }

    #[test]
    fn recovers_exact_plane() {
        let (a0, b0, c0) = (0.25, -0.5, 10.0);
        let neighbors: Vec<LidarPoint> = [(0.0, 0.0), (1.0, 0.0), (0.0, 1.0), (3.0, 4.0), (2.0, 7.0)]
            .iter()
            .map(|&(e, n)| on_plane(a0, b0, c0, e, n))
            .collect();

        let fit = fit_plane(&neighbors).expect("fit exact plane");
        assert!((fit.a - a0).abs() < 1e-9);
        assert!((fit.b - b0).abs() < 1e-9);
        assert!((fit.c - c0).abs() < 1e-9);
        assert!(fit.rough < 1e-9);
        assert!(fit.curvature < 1e-9);
    }

    #[test]
    fn flat_plane_has_upward_normal() {
        let neighbors = vec![
            point(0.0, 0.0, 5.0),
            point(1.0, 0.0, 5.0),
            point(0.0, 1.0, 5.0),
            point(1.0, 1.0, 5.0),
        ];
        let fit = fit_plane(&neighbors).expect("fit flat plane");
        let (nx, ny, nz) = fit.unit_normal();
        assert!(nx.abs() < 1e-9);
        assert!(ny.abs() < 1e-9);
        assert!((nz - 1.0).abs() < 1e-9);
    }

    #[test]
    fn unit_normal_has_unit_length() {
        let neighbors = vec![
            point(0.0, 0.0, 0.0),
            point(1.0, 0.0, 2.0),
            point(0.0, 1.0, -1.0),
            point(2.0, 2.0, 2.0),
        ];
        let fit = fit_plane(&neighbors).expect("fit");
        let (nx, ny, nz) = fit.unit_normal();
        let len = (nx * nx + ny * ny + nz * nz).sqrt();
        assert!((len - 1.0).abs() < 1e-12);
        assert!(nz > 0.0);
    }

    #[test]
    fn too_few_neighbors_is_singular() {
        let neighbors = vec![point(0.0, 0.0, 1.0), point(1.0, 1.0, 2.0)];
        let err = fit_plane(&neighbors).expect_err("2 points must be singular");
        assert!(matches!(err, TerrainError::SingularFit(_)));
    }

    #[test]
    fn colinear_neighbors_are_singular() {
        let neighbors: Vec<LidarPoint> =
            (0..5).map(|i| point(i as f64, 2.0 * i as f64, 1.0)).collect();
        let err = fit_plane(&neighbors).expect_err("colinear points must be singular");
        assert!(matches!(err, TerrainError::SingularFit(_)));
    }

    #[test]
    fn missing_altitude_treated_as_zero() {
        let mut neighbors = vec![
            point(0.0, 0.0, 0.0),
            point(1.0, 0.0, 0.0),
            point(0.0, 1.0, 0.0),
        ];
        neighbors[0].altitude = None;
        let fit = fit_plane(&neighbors).expect("fit with missing altitude");
        assert!(fit.a.abs() < 1e-9);
        assert!(fit.b.abs() < 1e-9);
        assert!(fit.c.abs() < 1e-9);
    }

    #[test]
    fn residuals_measured_against_best_fit() {
        // two levels, best plane halfway: residuals +/- 0.5
        let neighbors = vec![
            point(0.0, 0.0, 0.0),
            point(1.0, 0.0, 1.0),
            point(0.0, 1.0, 1.0),
            point(1.0, 1.0, 0.0),
        ];
        let fit = fit_plane(&neighbors).expect("fit");
        assert!((fit.rough - 0.5).abs() < 1e-9);
        assert!((fit.curvature - 0.5).abs() < 1e-9);
    }
}
