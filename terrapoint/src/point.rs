use serde::{Deserialize, Serialize};

use crate::errors::{TerrainError, TerrainResult};

/// Maximum length of the coordinate zone string.
pub const MAX_ZONE_LEN: usize = 8;

/// Maximum length of the classification string.
pub const MAX_CLASSIFICATION_LEN: usize = 64;

/// The derived per-point terrain metrics, always written as one unit from a
/// single plane fit.
///
/// A point either has no metrics (never processed by the metrics engine) or
/// all of them, which is why they are grouped behind one `Option` on
/// [`LidarPoint`] instead of seven independent optionals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TerrainMetrics {
    /// X component of the unit normal of the fitted plane.
    pub normal_x: f64,
    /// Y component of the unit normal of the fitted plane.
    pub normal_y: f64,
    /// Z component of the unit normal of the fitted plane.
    pub normal_z: f64,
    /// Local slope in degrees, >= 0.
    pub slope: f64,
    /// Roughness: RMS of the plane fit residuals, >= 0.
    pub rough: f64,
    /// Curvature: mean absolute plane fit residual, >= 0.
    pub curvature: f64,
    /// Traversability score, clamped to [0, 1].
    pub trav_score: f64,
}

/// One scanned LiDAR point within a survey area.
///
/// The id is assigned by the store on insert and is stable for the point's
/// lifetime. Position fields are immutable once written by ingestion; only
/// the bulk loader creates points and only the metrics engine populates
/// `metrics`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LidarPoint {
    /// Store-assigned unique id. 0 on non-persisted results returned by
    /// single-point metric computation.
    pub id: i64,
    /// Projected easting coordinate (required).
    pub easting: f64,
    /// Projected northing coordinate (required).
    pub northing: f64,
    /// Altitude, when the source provided one.
    pub altitude: Option<f64>,
    /// Coordinate zone label, at most [`MAX_ZONE_LEN`] characters.
    pub zone: Option<String>,
    /// Point classification, at most [`MAX_CLASSIFICATION_LEN`] characters.
    pub classification: Option<String>,
    /// Derived metrics; `None` until the metrics engine processes the point.
    pub metrics: Option<TerrainMetrics>,
}

/// A raw, pre-validation ingestion record as yielded by a point source.
///
/// LAS decoding and UTM zone resolution happen outside this crate; a point
/// source hands over already-decoded georeferenced records. Easting and
/// northing are optional here precisely so that validation can reject
/// incomplete records with a [`TerrainError::Validation`] carrying the
/// record's ordinal position.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PointRecord {
    pub easting: Option<f64>,
    pub northing: Option<f64>,
    pub altitude: Option<f64>,
    pub zone: Option<String>,
    pub classification: Option<String>,
}

impl PointRecord {
    /// Creates a record with the required coordinates set.
    pub fn new(easting: f64, northing: f64) -> Self {
        PointRecord {
            easting: Some(easting),
            northing: Some(northing),
            ..PointRecord::default()
        }
    }

    /// Sets the altitude.
    pub fn with_altitude(mut self, altitude: f64) -> Self {
        self.altitude = Some(altitude);
        self
    }

    /// Sets the coordinate zone label.
    pub fn with_zone(mut self, zone: impl Into<String>) -> Self {
        self.zone = Some(zone.into());
        self
    }

    /// Sets the classification.
    pub fn with_classification(mut self, classification: impl Into<String>) -> Self {
        self.classification = Some(classification.into());
        self
    }

    /// Validates the record as the `ordinal`-th record of a load and
    /// returns its required coordinates.
    ///
    /// Rejects missing or non-finite easting/northing and over-long
    /// zone/classification strings.
    pub fn validate(&self, ordinal: u64) -> TerrainResult<(f64, f64)> {
        let easting = self
            .easting
            .ok_or_else(|| TerrainError::validation_at(ordinal, "missing easting"))?;
        let northing = self
            .northing
            .ok_or_else(|| TerrainError::validation_at(ordinal, "missing northing"))?;
        if !easting.is_finite() {
            return Err(TerrainError::validation_at(ordinal, "easting is not finite"));
        }
        if !northing.is_finite() {
            return Err(TerrainError::validation_at(ordinal, "northing is not finite"));
        }
        if let Some(zone) = &self.zone {
            if zone.chars().count() > MAX_ZONE_LEN {
                return Err(TerrainError::validation_at(
                    ordinal,
                    format!("zone exceeds {} characters", MAX_ZONE_LEN),
                ));
            }
        }
        if let Some(classification) = &self.classification {
            if classification.chars().count() > MAX_CLASSIFICATION_LEN {
                return Err(TerrainError::validation_at(
                    ordinal,
                    format!("classification exceeds {} characters", MAX_CLASSIFICATION_LEN),
                ));
            }
        }
        Ok((easting, northing))
    }
}
