//! Schema and statement text for the per-area point database.
//!
//! Column names and secondary indexes follow the persisted layout contract:
//! a `points` table with required easting/northing, optional altitude,
//! zone (<= 8 chars) and classification (<= 64 chars), seven derived metric
//! columns, a `points_idx` shadow table keyed by the same id, and B-tree
//! accelerators over every filterable scalar column.

/// Table and index DDL, executed once at store open.
pub(crate) const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS points (
    id             INTEGER PRIMARY KEY AUTOINCREMENT,
    easting        REAL NOT NULL,
    northing       REAL NOT NULL,
    altitude       REAL,
    zone           TEXT,
    classification TEXT,
    normal_x       REAL,
    normal_y       REAL,
    normal_z       REAL,
    slope          REAL,
    rough          REAL,
    curvature      REAL,
    trav_score     REAL
);

CREATE TABLE IF NOT EXISTS points_idx (
    id    INTEGER PRIMARY KEY,
    min_x REAL NOT NULL,
    max_x REAL NOT NULL,
    min_y REAL NOT NULL,
    max_y REAL NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_points_classification ON points(classification);
CREATE INDEX IF NOT EXISTS idx_points_trav_score     ON points(trav_score);
CREATE INDEX IF NOT EXISTS idx_points_rough          ON points(rough);
CREATE INDEX IF NOT EXISTS idx_points_slope          ON points(slope);
CREATE INDEX IF NOT EXISTS idx_points_curvature      ON points(curvature);
CREATE INDEX IF NOT EXISTS idx_points_altitude       ON points(altitude);
CREATE INDEX IF NOT EXISTS idx_points_normal_x       ON points(normal_x);
CREATE INDEX IF NOT EXISTS idx_points_normal_y       ON points(normal_y);
CREATE INDEX IF NOT EXISTS idx_points_normal_z       ON points(normal_z);
CREATE INDEX IF NOT EXISTS idx_points_coord          ON points(easting, northing);
";

/// Inserts one point row. Metrics columns start NULL.
pub(crate) const INSERT_POINT_SQL: &str = "
INSERT INTO points (easting, northing, altitude, zone, classification)
VALUES (?1, ?2, ?3, ?4, ?5)";

/// Inserts one shadow index row (degenerate box).
pub(crate) const INSERT_SHADOW_SQL: &str = "
INSERT INTO points_idx (id, min_x, max_x, min_y, max_y)
VALUES (?1, ?2, ?2, ?3, ?3)";

/// One-pass shadow table repopulation from the points table. `INSERT OR
/// IGNORE` keeps rows that were maintained incrementally.
pub(crate) const REBUILD_SHADOW_SQL: &str = "
INSERT OR IGNORE INTO points_idx (id, min_x, max_x, min_y, max_y)
SELECT id, easting, easting, northing, northing FROM points";

/// Column list of a full point row, shared by every row-returning query.
pub(crate) const POINT_COLUMNS: &str = "id, easting, northing, altitude, zone, classification, \
                                        normal_x, normal_y, normal_z, slope, rough, curvature, trav_score";

/// Writes the derived metric columns of one row. The column list is
/// explicit and static; derived-field write-back never goes through any
/// dynamic per-field copying.
pub(crate) const UPDATE_METRICS_SQL: &str = "
UPDATE points
SET normal_x = ?2, normal_y = ?3, normal_z = ?4,
    slope = ?5, rough = ?6, curvature = ?7, trav_score = ?8
WHERE id = ?1";
