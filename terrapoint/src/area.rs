use std::path::Path;
use std::sync::Arc;

use crate::cancel::CancellationToken;
use crate::errors::TerrainResult;
use crate::filter::PointFilter;
use crate::loader::{BulkLoadConfig, BulkLoader};
use crate::metrics::{MetricsConfig, MetricsEngine};
use crate::point::{LidarPoint, PointRecord};
use crate::spatial_index::SpatialIndex;
use crate::store::PointStore;

/// One named survey area: a point store and its spatial index, kept in
/// lockstep.
///
/// An `Area` is the unit of partitioning — each area has its own database
/// file, its own id space and its own in-memory R-tree, and operations on
/// different areas never contend. Opening an area loads the index from the
/// persisted shadow table; when the shadow table has fewer rows than the
/// point table (a deferred load that never finished its rebuild), the index
/// is rebuilt from the point table first.
///
/// Uses the Pimpl pattern: clones are cheap and share the same state.
#[derive(Clone)]
pub struct Area {
    inner: Arc<AreaInner>,
}

struct AreaInner {
    name: String,
    store: Arc<PointStore>,
    index: SpatialIndex,
}

impl Area {
    pub(crate) fn open(name: &str, path: &Path) -> TerrainResult<Area> {
        let store = Arc::new(PointStore::open(path)?);
        let index = SpatialIndex::new();

        let mut entries = store.load_index_entries()?;
        let total = store.len()?;
        if (entries.len() as u64) < total {
            log::warn!(
                "area '{}': shadow index incomplete ({} of {} rows), rebuilding",
                name,
                entries.len(),
                total
            );
            entries = store.rebuild_shadow()?;
        }
        index.bulk_replace(entries)?;

        log::debug!("opened area '{}' with {} points", name, index.len());
        Ok(Area {
            inner: Arc::new(AreaInner {
                name: name.to_string(),
                store,
                index,
            }),
        })
    }

    /// Name of this area.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// The spatial index over this area's points.
    pub fn index(&self) -> &SpatialIndex {
        &self.inner.index
    }

    /// A bulk loader over this area.
    pub fn bulk_loader(&self, config: BulkLoadConfig) -> BulkLoader {
        BulkLoader::new(self.inner.store.clone(), self.inner.index.clone(), config)
    }

    /// A metrics engine over this area.
    pub fn metrics_engine(&self, config: MetricsConfig) -> MetricsEngine {
        MetricsEngine::new(self.inner.store.clone(), self.inner.index.clone(), config)
    }

    /// Validates and inserts a single record, returning the assigned id.
    /// The point row, its shadow index row and the in-memory index entry
    /// are all visible once this returns.
    pub fn insert_point(&self, record: &PointRecord) -> TerrainResult<i64> {
        let (easting, northing) = record.validate(0)?;
        let id = self.inner.store.insert_point(
            easting,
            northing,
            record.altitude,
            record.zone.as_deref(),
            record.classification.as_deref(),
        )?;
        self.inner.index.insert(id, easting, northing)?;
        Ok(id)
    }

    /// Removes a point and its index entry. Returns `true` if the point
    /// existed.
    pub fn remove_point(&self, id: i64) -> TerrainResult<bool> {
        let removed = self.inner.store.remove_point(id)?;
        if removed {
            self.inner.index.remove(id)?;
        }
        Ok(removed)
    }

    /// Fetches one point by id.
    pub fn point(&self, id: i64) -> TerrainResult<Option<LidarPoint>> {
        self.inner.store.point(id)
    }

    /// Number of points in the area.
    pub fn len(&self) -> TerrainResult<u64> {
        self.inner.store.len()
    }

    /// Returns `true` if the area holds no points.
    pub fn is_empty(&self) -> TerrainResult<bool> {
        self.inner.store.is_empty()
    }

    /// Evaluates a filter against this area's points, ascending by id.
    ///
    /// With a spatial clause the candidate set comes from the R-tree and
    /// the remaining clauses are applied in memory; without one, the query
    /// runs as a single statement over the scalar secondary indexes. An
    /// empty filter returns every point; no match returns an empty vec,
    /// never an error.
    pub fn query(
        &self,
        filter: &PointFilter,
        cancel: &CancellationToken,
    ) -> TerrainResult<Vec<LidarPoint>> {
        cancel.checkpoint()?;
        match filter.query_box() {
            Some(bbox) => {
                let ids = self.inner.index.query_box(&bbox);
                let mut points = self.inner.store.points_by_ids(&ids)?;
                cancel.checkpoint()?;
                points.retain(|point| filter.matches_scalars(point));
                Ok(points)
            }
            None => self.inner.store.query_where(filter.to_sql_where()),
        }
    }

    /// Rebuilds the shadow table and the in-memory index from the point
    /// table in one pass, dropping any stale entries.
    pub fn rebuild_spatial_index(&self) -> TerrainResult<()> {
        let entries = self.inner.store.reset_shadow()?;
        self.inner.index.bulk_replace(entries)?;
        log::info!(
            "area '{}': spatial index rebuilt over {} points",
            self.inner.name,
            self.inner.index.len()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::TerrainError;
    use tempfile::TempDir;

    fn open_area() -> (TempDir, Area) {
        let dir = TempDir::new().expect("temp dir");
        let area = Area::open("test", &dir.path().join("test.db")).expect("open area");
        (dir, area)
    }

    #[test]
    fn test_insert_is_queryable_immediately() {
        let (_dir, area) = open_area();
        let cancel = CancellationToken::new();
        let id = area
            .insert_point(&PointRecord::new(10.0, 20.0).with_classification("ground"))
            .expect("insert");

        let hits = area
            .query(&PointFilter::all().within_box(10.0, 20.0, 0.0), &cancel)
            .expect("query");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, id);
    }

    #[test]
    fn test_remove_point_clears_both_sides() {
        let (_dir, area) = open_area();
        let id = area.insert_point(&PointRecord::new(1.0, 2.0)).expect("insert");

        assert!(area.remove_point(id).expect("remove"));
        assert!(area.point(id).expect("fetch").is_none());
        assert!(!area.index().contains(id));
        assert!(!area.remove_point(id).expect("second remove"));
    }

    #[test]
    fn test_invalid_record_is_rejected() {
        let (_dir, area) = open_area();
        let err = area
            .insert_point(&PointRecord::default())
            .expect_err("record without coordinates must fail");
        assert!(matches!(err, TerrainError::Validation { .. }));
        assert!(area.is_empty().expect("is_empty"));
    }

    #[test]
    fn test_scalar_query_without_spatial_clause() {
        let (_dir, area) = open_area();
        let cancel = CancellationToken::new();
        for i in 0..5 {
            let class = if i % 2 == 0 { "ground" } else { "water" };
            area.insert_point(&PointRecord::new(i as f64, 0.0).with_classification(class))
                .expect("insert");
        }

        let ground = area
            .query(&PointFilter::all().classification("ground"), &cancel)
            .expect("query");
        assert_eq!(ground.len(), 3);
        assert!(ground.windows(2).all(|w| w[0].id < w[1].id));
    }

    #[test]
    fn test_empty_filter_returns_all() {
        let (_dir, area) = open_area();
        for i in 0..4 {
            area.insert_point(&PointRecord::new(i as f64, i as f64)).expect("insert");
        }
        let cancel = CancellationToken::new();
        assert_eq!(area.query(&PointFilter::all(), &cancel).expect("query").len(), 4);
    }

    #[test]
    fn test_reopen_reloads_index_from_shadow_table() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("area.db");
        let id;
        {
            let area = Area::open("a", &path).expect("open");
            id = area.insert_point(&PointRecord::new(7.5, 8.5)).expect("insert");
        }
        let area = Area::open("a", &path).expect("reopen");
        assert!(area.index().contains(id));
        assert_eq!(area.index().range_query(7.5, 7.5, 8.5, 8.5), vec![id]);
    }

    #[test]
    fn test_rebuild_drops_stale_index_entries() {
        let (_dir, area) = open_area();
        let id = area.insert_point(&PointRecord::new(1.0, 1.0)).expect("insert");
        // plant a stale entry, as if a remove lost its index half
        area.index().insert(id + 1000, 99.0, 99.0).expect("stale insert");

        area.rebuild_spatial_index().expect("rebuild");
        assert_eq!(area.index().len(), 1);
        assert!(area.index().contains(id));
        assert!(!area.index().contains(id + 1000));
    }
}
