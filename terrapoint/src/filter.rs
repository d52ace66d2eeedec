use serde::{Deserialize, Serialize};

use crate::bounding_box::BoundingBox;
use crate::point::LidarPoint;

/// An inclusive `[min, max]` interval over one metric column.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Range {
    pub min: f64,
    pub max: f64,
}

impl Range {
    pub fn new(min: f64, max: f64) -> Self {
        Range { min, max }
    }

    pub(crate) fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

/// A composable, ephemeral query descriptor over one area's points.
///
/// Every clause is optional; unset clauses impose nothing, and set clauses
/// are AND-ed. The empty filter ([`PointFilter::all`]) matches every point.
///
/// The spatial clause selects by **bounding-box containment**: a point
/// matches when it lies inside `[e−r, e+r] × [n−r, n+r]`, not inside the
/// Euclidean circle of radius `r`. Corner points up to `r·√2` away are
/// included.
///
/// Metric range clauses only match points whose metrics have been computed;
/// a point with unset metrics never satisfies a metric range.
///
/// ```
/// use terrapoint::PointFilter;
///
/// let filter = PointFilter::all()
///     .within_box(480_000.0, 5_500_000.0, 250.0)
///     .classification("ground")
///     .trav_score(0.8, 1.0);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PointFilter {
    spatial: Option<SpatialClause>,
    classification: Option<String>,
    normal_x: Option<Range>,
    normal_y: Option<Range>,
    normal_z: Option<Range>,
    slope: Option<Range>,
    rough: Option<Range>,
    curvature: Option<Range>,
    trav_score: Option<Range>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
struct SpatialClause {
    easting: f64,
    northing: f64,
    radius: f64,
}

impl PointFilter {
    /// The empty filter: matches every point.
    pub fn all() -> Self {
        PointFilter::default()
    }

    /// Restricts to points inside the box `[e−r, e+r] × [n−r, n+r]`.
    pub fn within_box(mut self, easting: f64, northing: f64, radius: f64) -> Self {
        self.spatial = Some(SpatialClause {
            easting,
            northing,
            radius,
        });
        self
    }

    /// Restricts to points with exactly this classification.
    pub fn classification(mut self, classification: impl Into<String>) -> Self {
        self.classification = Some(classification.into());
        self
    }

    /// Restricts the normal's X component to `[min, max]`.
    pub fn normal_x(mut self, min: f64, max: f64) -> Self {
        self.normal_x = Some(Range::new(min, max));
        self
    }

    /// Restricts the normal's Y component to `[min, max]`.
    pub fn normal_y(mut self, min: f64, max: f64) -> Self {
        self.normal_y = Some(Range::new(min, max));
        self
    }

    /// Restricts the normal's Z component to `[min, max]`.
    pub fn normal_z(mut self, min: f64, max: f64) -> Self {
        self.normal_z = Some(Range::new(min, max));
        self
    }

    /// Restricts slope (degrees) to `[min, max]`.
    pub fn slope(mut self, min: f64, max: f64) -> Self {
        self.slope = Some(Range::new(min, max));
        self
    }

    /// Restricts roughness to `[min, max]`.
    pub fn roughness(mut self, min: f64, max: f64) -> Self {
        self.rough = Some(Range::new(min, max));
        self
    }

    /// Restricts curvature to `[min, max]`.
    pub fn curvature(mut self, min: f64, max: f64) -> Self {
        self.curvature = Some(Range::new(min, max));
        self
    }

    /// Restricts the traversability score to `[min, max]`.
    pub fn trav_score(mut self, min: f64, max: f64) -> Self {
        self.trav_score = Some(Range::new(min, max));
        self
    }

    /// The query box implied by the spatial clause, if one is set.
    pub(crate) fn query_box(&self) -> Option<BoundingBox> {
        self.spatial
            .map(|s| BoundingBox::around_point(s.easting, s.northing, s.radius))
    }

    /// Evaluates the non-spatial clauses against one point.
    pub(crate) fn matches_scalars(&self, point: &LidarPoint) -> bool {
        if let Some(classification) = &self.classification {
            if point.classification.as_deref() != Some(classification.as_str()) {
                return false;
            }
        }
        let ranges = [
            (&self.normal_x, point.metrics.as_ref().map(|m| m.normal_x)),
            (&self.normal_y, point.metrics.as_ref().map(|m| m.normal_y)),
            (&self.normal_z, point.metrics.as_ref().map(|m| m.normal_z)),
            (&self.slope, point.metrics.as_ref().map(|m| m.slope)),
            (&self.rough, point.metrics.as_ref().map(|m| m.rough)),
            (&self.curvature, point.metrics.as_ref().map(|m| m.curvature)),
            (&self.trav_score, point.metrics.as_ref().map(|m| m.trav_score)),
        ];
        for (range, value) in ranges {
            if let Some(range) = range {
                match value {
                    Some(value) if range.contains(value) => {}
                    _ => return false,
                }
            }
        }
        true
    }

    /// Builds the conjunctive WHERE clause over the indexed scalar columns
    /// for the no-spatial-clause evaluation path. Returns `None` when the
    /// filter has no scalar clauses at all.
    pub(crate) fn to_sql_where(&self) -> Option<(String, Vec<rusqlite::types::Value>)> {
        let mut clauses: Vec<String> = Vec::new();
        let mut values: Vec<rusqlite::types::Value> = Vec::new();

        if let Some(classification) = &self.classification {
            clauses.push(format!("classification = ?{}", values.len() + 1));
            values.push(classification.clone().into());
        }
        let columns = [
            ("normal_x", &self.normal_x),
            ("normal_y", &self.normal_y),
            ("normal_z", &self.normal_z),
            ("slope", &self.slope),
            ("rough", &self.rough),
            ("curvature", &self.curvature),
            ("trav_score", &self.trav_score),
        ];
        for (column, range) in columns {
            if let Some(range) = range {
                clauses.push(format!(
                    "{} BETWEEN ?{} AND ?{}",
                    column,
                    values.len() + 1,
                    values.len() + 2
                ));
                values.push(range.min.into());
                values.push(range.max.into());
            }
        }

        if clauses.is_empty() {
            None
        } else {
            Some((clauses.join(" AND "), values))
        }
    }
}
