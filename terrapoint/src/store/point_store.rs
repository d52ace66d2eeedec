use std::path::{Path, PathBuf};

use parking_lot::{Mutex, MutexGuard};
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::schema;
use crate::errors::TerrainResult;
use crate::point::{LidarPoint, TerrainMetrics};

/// The persisted table of LiDAR points for one survey area.
///
/// Backed by a single-file embedded transactional store opened in
/// write-ahead durability mode with relaxed-but-safe synchronous commits
/// (`journal_mode = WAL`, `synchronous = NORMAL`). The connection sits
/// behind a mutex: one active write transaction at a time, which is the
/// single-writer discipline every mutating component funnels through.
///
/// The store owns point identity (rowid-assigned ids) and all scalar and
/// metric columns, plus the `points_idx` shadow table that persists the
/// spatial index. Shadow rows are written inside the same transaction as
/// their point row; [`crate::SpatialIndex`] is the queryable in-memory form
/// and is reloaded from the shadow table at open.
pub struct PointStore {
    conn: Mutex<Connection>,
    path: PathBuf,
}

impl PointStore {
    /// Opens (creating if needed) the store at `path`, applies the
    /// durability pragmas and ensures the schema and secondary indexes
    /// exist.
    pub fn open(path: impl AsRef<Path>) -> TerrainResult<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(&path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.execute_batch(schema::SCHEMA_SQL)?;
        log::debug!("opened point store at {:?}", path);
        Ok(PointStore {
            conn: Mutex::new(conn),
            path,
        })
    }

    /// Path of the backing database file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Acquires the writer lock on the underlying connection. Held for at
    /// most one transaction by every caller.
    pub(crate) fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock()
    }

    /// Inserts a single validated point together with its shadow index row
    /// in one transaction and returns the assigned id.
    pub(crate) fn insert_point(
        &self,
        easting: f64,
        northing: f64,
        altitude: Option<f64>,
        zone: Option<&str>,
        classification: Option<&str>,
    ) -> TerrainResult<i64> {
        let mut conn = self.lock();
        let tx = conn.transaction()?;
        let id = {
            let mut insert = tx.prepare_cached(schema::INSERT_POINT_SQL)?;
            insert.execute(params![easting, northing, altitude, zone, classification])?;
            let id = tx.last_insert_rowid();
            let mut shadow = tx.prepare_cached(schema::INSERT_SHADOW_SQL)?;
            shadow.execute(params![id, easting, northing])?;
            id
        };
        tx.commit()?;
        Ok(id)
    }

    /// Removes a point and its shadow row in one transaction. Returns
    /// `true` if a row was deleted.
    pub(crate) fn remove_point(&self, id: i64) -> TerrainResult<bool> {
        let mut conn = self.lock();
        let tx = conn.transaction()?;
        let deleted = tx.execute("DELETE FROM points WHERE id = ?1", params![id])?;
        tx.execute("DELETE FROM points_idx WHERE id = ?1", params![id])?;
        tx.commit()?;
        Ok(deleted > 0)
    }

    /// Fetches one point by id.
    pub fn point(&self, id: i64) -> TerrainResult<Option<LidarPoint>> {
        let conn = self.lock();
        let sql = format!("SELECT {} FROM points WHERE id = ?1", schema::POINT_COLUMNS);
        let mut stmt = conn.prepare_cached(&sql)?;
        let point = stmt
            .query_row(params![id], point_from_row)
            .optional()?;
        Ok(point)
    }

    /// Fetches the rows for the given ids, preserving the input order.
    /// Ids with no row (e.g. removed concurrently) are skipped.
    pub(crate) fn points_by_ids(&self, ids: &[i64]) -> TerrainResult<Vec<LidarPoint>> {
        let conn = self.lock();
        let sql = format!("SELECT {} FROM points WHERE id = ?1", schema::POINT_COLUMNS);
        let mut stmt = conn.prepare_cached(&sql)?;
        let mut points = Vec::with_capacity(ids.len());
        for &id in ids {
            if let Some(point) = stmt.query_row(params![id], point_from_row).optional()? {
                points.push(point);
            }
        }
        Ok(points)
    }

    /// Number of stored points.
    pub fn len(&self) -> TerrainResult<u64> {
        let conn = self.lock();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM points", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    /// Returns `true` if the store holds no points.
    pub fn is_empty(&self) -> TerrainResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Id-ordered `(id, easting, northing, altitude)` tuples, the iteration
    /// basis of the area-wide metrics sweep.
    pub(crate) fn positions(&self) -> TerrainResult<Vec<(i64, f64, f64, Option<f64>)>> {
        let conn = self.lock();
        let mut stmt =
            conn.prepare_cached("SELECT id, easting, northing, altitude FROM points ORDER BY id")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
        })?;
        let mut positions = Vec::new();
        for row in rows {
            positions.push(row?);
        }
        Ok(positions)
    }

    /// Loads all shadow index rows as `(id, easting, northing)` entries.
    pub(crate) fn load_index_entries(&self) -> TerrainResult<Vec<(i64, f64, f64)>> {
        let conn = self.lock();
        let mut stmt = conn.prepare_cached("SELECT id, min_x, min_y FROM points_idx ORDER BY id")?;
        let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?;
        let mut entries = Vec::new();
        for row in rows {
            entries.push(row?);
        }
        Ok(entries)
    }

    /// One-pass shadow table rebuild from the points table, returning the
    /// full entry set for reloading the in-memory index. Used after bulk
    /// loads that deferred per-row index maintenance.
    pub(crate) fn rebuild_shadow(&self) -> TerrainResult<Vec<(i64, f64, f64)>> {
        {
            let mut conn = self.lock();
            let tx = conn.transaction()?;
            tx.execute(schema::REBUILD_SHADOW_SQL, [])?;
            tx.commit()?;
        }
        self.load_index_entries()
    }

    /// Discards the shadow table and repopulates it from the points table
    /// in one transaction. Unlike [`PointStore::rebuild_shadow`] this also
    /// drops shadow rows with no live point.
    pub(crate) fn reset_shadow(&self) -> TerrainResult<Vec<(i64, f64, f64)>> {
        {
            let mut conn = self.lock();
            let tx = conn.transaction()?;
            tx.execute("DELETE FROM points_idx", [])?;
            tx.execute(schema::REBUILD_SHADOW_SQL, [])?;
            tx.commit()?;
        }
        self.load_index_entries()
    }

    /// Runs one conjunctive scalar query against the secondary indexes,
    /// id-ordered. `None` selects every row.
    pub(crate) fn query_where(
        &self,
        clause: Option<(String, Vec<rusqlite::types::Value>)>,
    ) -> TerrainResult<Vec<LidarPoint>> {
        let conn = self.lock();
        let (sql, values) = match clause {
            Some((where_clause, values)) => (
                format!(
                    "SELECT {} FROM points WHERE {} ORDER BY id",
                    schema::POINT_COLUMNS,
                    where_clause
                ),
                values,
            ),
            None => (
                format!("SELECT {} FROM points ORDER BY id", schema::POINT_COLUMNS),
                Vec::new(),
            ),
        };
        let mut stmt = conn.prepare_cached(&sql)?;
        let rows = stmt.query_map(rusqlite::params_from_iter(values), point_from_row)?;
        let mut points = Vec::new();
        for row in rows {
            points.push(row?);
        }
        Ok(points)
    }

    /// Writes one batch of derived metrics in a single transaction, using
    /// the explicit static column list.
    pub(crate) fn write_metrics_batch(
        &self,
        updates: &[(i64, TerrainMetrics)],
    ) -> TerrainResult<()> {
        if updates.is_empty() {
            return Ok(());
        }
        let mut conn = self.lock();
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare_cached(schema::UPDATE_METRICS_SQL)?;
            for (id, m) in updates {
                stmt.execute(params![
                    id,
                    m.normal_x,
                    m.normal_y,
                    m.normal_z,
                    m.slope,
                    m.rough,
                    m.curvature,
                    m.trav_score
                ])?;
            }
        }
        tx.commit()?;
        log::debug!("wrote metrics for {} points", updates.len());
        Ok(())
    }
}

/// Maps a full point row. The seven metric columns are written as one unit,
/// so a row either has all of them or none.
pub(crate) fn point_from_row(row: &Row<'_>) -> rusqlite::Result<LidarPoint> {
    let normal_x: Option<f64> = row.get(6)?;
    let normal_y: Option<f64> = row.get(7)?;
    let normal_z: Option<f64> = row.get(8)?;
    let slope: Option<f64> = row.get(9)?;
    let rough: Option<f64> = row.get(10)?;
    let curvature: Option<f64> = row.get(11)?;
    let trav_score: Option<f64> = row.get(12)?;

    let metrics = match (normal_x, normal_y, normal_z, slope, rough, curvature, trav_score) {
        (Some(nx), Some(ny), Some(nz), Some(s), Some(r), Some(c), Some(t)) => {
            Some(TerrainMetrics {
                normal_x: nx,
                normal_y: ny,
                normal_z: nz,
                slope: s,
                rough: r,
                curvature: c,
                trav_score: t,
            })
        }
        _ => None,
    };

    Ok(LidarPoint {
        id: row.get(0)?,
        easting: row.get(1)?,
        northing: row.get(2)?,
        altitude: row.get(3)?,
        zone: row.get(4)?,
        classification: row.get(5)?,
        metrics,
    })
}
