use rstar::AABB;

/// A 2D axis-aligned bounding box used as the spatial index key.
///
/// A `BoundingBox` defines a rectangular area in projected (easting,
/// northing) space using its minimum and maximum corners. Point data is
/// indexed with a degenerate box where min == max on both axes.
///
/// # Examples
///
/// ```rust,ignore
/// use terrapoint::BoundingBox;
///
/// // Query box 5 units around a survey point
/// let query = BoundingBox::around_point(480_000.0, 5_500_000.0, 5.0);
/// assert!(query.contains_point(480_003.0, 5_500_004.0));
/// ```
#[derive(Clone, PartialEq, Default, Debug, serde::Deserialize, serde::Serialize)]
pub struct BoundingBox {
    /// Minimum X (easting) coordinate
    pub min_x: f64,
    /// Minimum Y (northing) coordinate
    pub min_y: f64,
    /// Maximum X (easting) coordinate
    pub max_x: f64,
    /// Maximum Y (northing) coordinate
    pub max_y: f64,
}

impl std::fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "BoundingBox({}, {}, {}, {})",
            self.min_x, self.min_y, self.max_x, self.max_y
        )
    }
}

impl BoundingBox {
    /// Creates a new bounding box from its corner coordinates.
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> BoundingBox {
        BoundingBox {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// Creates a degenerate box at a single point (min == max on both axes).
    pub fn point(x: f64, y: f64) -> BoundingBox {
        BoundingBox::new(x, y, x, y)
    }

    /// Creates the query box `[x-radius, x+radius] × [y-radius, y+radius]`.
    pub fn around_point(x: f64, y: f64, radius: f64) -> BoundingBox {
        BoundingBox::new(x - radius, y - radius, x + radius, y + radius)
    }

    /// Returns the width of the bounding box.
    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    /// Returns the height of the bounding box.
    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    /// Returns the center point of the bounding box.
    pub fn center(&self) -> (f64, f64) {
        ((self.min_x + self.max_x) / 2.0, (self.min_y + self.max_y) / 2.0)
    }

    /// Checks if this bounding box contains a point. Boundaries count.
    pub fn contains_point(&self, x: f64, y: f64) -> bool {
        x >= self.min_x && x <= self.max_x && y >= self.min_y && y <= self.max_y
    }

    /// Checks if this bounding box intersects another. Touching counts.
    pub fn intersects(&self, other: &BoundingBox) -> bool {
        self.min_x <= other.max_x
            && self.max_x >= other.min_x
            && self.min_y <= other.max_y
            && self.max_y >= other.min_y
    }

    /// Checks if this bounding box is degenerate (a single point).
    pub fn is_point(&self) -> bool {
        self.min_x == self.max_x && self.min_y == self.max_y
    }

    /// Checks if this bounding box is valid (min <= max on both axes).
    pub fn is_valid(&self) -> bool {
        self.min_x <= self.max_x && self.min_y <= self.max_y
    }

    /// Converts this box to the R-tree envelope representation.
    pub(crate) fn to_aabb(&self) -> AABB<[f64; 2]> {
        AABB::from_corners([self.min_x, self.min_y], [self.max_x, self.max_y])
    }
}
