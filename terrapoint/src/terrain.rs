use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::area::Area;
use crate::cancel::CancellationToken;
use crate::errors::{TerrainError, TerrainResult};
use crate::filter::PointFilter;
use crate::loader::{BulkLoadConfig, BulkLoadSummary};
use crate::metrics::{MetricsConfig, MetricsSummary};
use crate::point::{LidarPoint, PointRecord};

/// Maximum length of an area name.
pub const MAX_AREA_NAME_LEN: usize = 64;

/// The top-level handle over a directory of survey areas.
///
/// Each area is one database file under the base directory; areas are
/// created on first use and cached for the lifetime of the store. The
/// store is cheap to clone and safe to share across threads (Pimpl).
///
/// ```no_run
/// use terrapoint::{PointFilter, PointRecord, CancellationToken, TerrainStore};
///
/// # fn main() -> terrapoint::TerrainResult<()> {
/// let store = TerrainStore::open("/var/lib/surveys")?;
/// let cancel = CancellationToken::new();
///
/// let records = vec![PointRecord::new(480_000.0, 5_500_000.0).with_altitude(132.8)];
/// store.process_area("valley-north", records, Some("32N"), &cancel)?;
/// store.compute_area_metrics("valley-north", &cancel)?;
///
/// let flat = store.query_points("valley-north", &PointFilter::all().slope(0.0, 5.0), &cancel)?;
/// # drop(flat);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct TerrainStore {
    inner: Arc<TerrainStoreInner>,
}

struct TerrainStoreInner {
    base_dir: PathBuf,
    load_config: BulkLoadConfig,
    metrics_config: MetricsConfig,
    areas: RwLock<HashMap<String, Area>>,
}

/// Builder for [`TerrainStore`].
#[derive(Debug, Default)]
pub struct TerrainStoreBuilder {
    load_config: BulkLoadConfig,
    metrics_config: MetricsConfig,
}

impl TerrainStoreBuilder {
    /// Sets the bulk load configuration used by
    /// [`TerrainStore::process_area`].
    pub fn load_config(mut self, config: BulkLoadConfig) -> Self {
        self.load_config = config;
        self
    }

    /// Sets the metrics configuration used by
    /// [`TerrainStore::compute_area_metrics`].
    pub fn metrics_config(mut self, config: MetricsConfig) -> Self {
        self.metrics_config = config;
        self
    }

    /// Opens (creating if needed) a terrain store rooted at `base_dir`.
    pub fn open(self, base_dir: impl AsRef<Path>) -> TerrainResult<TerrainStore> {
        let base_dir = base_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&base_dir)?;
        log::debug!("opened terrain store at {:?}", base_dir);
        Ok(TerrainStore {
            inner: Arc::new(TerrainStoreInner {
                base_dir,
                load_config: self.load_config,
                metrics_config: self.metrics_config,
                areas: RwLock::new(HashMap::new()),
            }),
        })
    }
}

impl TerrainStore {
    /// Starts building a store with non-default configuration.
    pub fn builder() -> TerrainStoreBuilder {
        TerrainStoreBuilder::default()
    }

    /// Opens a store at `base_dir` with default configuration.
    pub fn open(base_dir: impl AsRef<Path>) -> TerrainResult<TerrainStore> {
        TerrainStore::builder().open(base_dir)
    }

    /// Returns the handle for `name`, opening (and creating) the area on
    /// first use.
    ///
    /// Area names become file names, so they are restricted to 1 to
    /// [`MAX_AREA_NAME_LEN`] characters from `[A-Za-z0-9_-]`.
    pub fn area(&self, name: &str) -> TerrainResult<Area> {
        validate_area_name(name)?;
        if let Some(area) = self.inner.areas.read().get(name) {
            return Ok(area.clone());
        }

        let mut areas = self.inner.areas.write();
        // raced another opener between the locks
        if let Some(area) = areas.get(name) {
            return Ok(area.clone());
        }
        let path = self.inner.base_dir.join(format!("{}.db", name));
        let area = Area::open(name, &path)?;
        areas.insert(name.to_string(), area.clone());
        Ok(area)
    }

    /// Names of all areas persisted under the base directory, sorted.
    pub fn area_names(&self) -> TerrainResult<Vec<String>> {
        let mut names = Vec::new();
        for entry in std::fs::read_dir(&self.inner.base_dir)? {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == "db") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    names.push(stem.to_string());
                }
            }
        }
        names.sort_unstable();
        Ok(names)
    }

    /// Ingests a finite record source into the named area.
    ///
    /// `zone_override` replaces every record's zone label when set.
    /// Batching, failure and cancellation semantics are those of
    /// [`crate::BulkLoader::load`].
    pub fn process_area<S>(
        &self,
        area: &str,
        source: S,
        zone_override: Option<&str>,
        cancel: &CancellationToken,
    ) -> TerrainResult<BulkLoadSummary>
    where
        S: IntoIterator<Item = PointRecord>,
    {
        let area = self.area(area)?;
        area.bulk_loader(self.inner.load_config.clone())
            .load(source, zone_override, cancel)
    }

    /// Evaluates a filter against the named area's points, ascending by id.
    pub fn query_points(
        &self,
        area: &str,
        filter: &PointFilter,
        cancel: &CancellationToken,
    ) -> TerrainResult<Vec<LidarPoint>> {
        self.area(area)?.query(filter, cancel)
    }

    /// Recomputes and persists terrain metrics for every point of the
    /// named area.
    pub fn compute_area_metrics(
        &self,
        area: &str,
        cancel: &CancellationToken,
    ) -> TerrainResult<MetricsSummary> {
        let area = self.area(area)?;
        area.metrics_engine(self.inner.metrics_config.clone())
            .compute_area(cancel)
    }

    /// Computes terrain metrics for the neighborhood of one location in
    /// the named area, without persisting anything. `Ok(None)` when the
    /// neighborhood is empty.
    pub fn compute_metrics_for_point(
        &self,
        area: &str,
        x: f64,
        y: f64,
        z: f64,
        radius: f64,
        cancel: &CancellationToken,
    ) -> TerrainResult<Option<LidarPoint>> {
        let area = self.area(area)?;
        area.metrics_engine(self.inner.metrics_config.clone())
            .compute_for_point(x, y, z, radius, cancel)
    }
}

fn validate_area_name(name: &str) -> TerrainResult<()> {
    if name.is_empty() {
        return Err(TerrainError::validation("area name must not be empty"));
    }
    if name.chars().count() > MAX_AREA_NAME_LEN {
        return Err(TerrainError::validation(format!(
            "area name exceeds {} characters",
            MAX_AREA_NAME_LEN
        )));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(TerrainError::validation(format!(
            "invalid area name '{}': only [A-Za-z0-9_-] allowed",
            name
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn open_store() -> (TempDir, TerrainStore) {
        let dir = TempDir::new().expect("temp dir");
        let store = TerrainStore::open(dir.path()).expect("open store");
        (dir, store)
    }

    #[test]
    fn test_area_names_are_validated() {
        let (_dir, store) = open_store();
        assert!(store.area("valley-north_2").is_ok());
        assert!(store.area("").is_err());
        assert!(store.area("bad/name").is_err());
        assert!(store.area("dots.are.out").is_err());
        assert!(store.area(&"x".repeat(65)).is_err());
    }

    #[test]
    fn test_area_handles_are_shared() {
        let (_dir, store) = open_store();
        let a = store.area("hill").expect("open");
        let b = store.area("hill").expect("reopen");
        let id = a
            .insert_point(&PointRecord::new(1.0, 2.0))
            .expect("insert");
        assert!(b.point(id).expect("fetch through second handle").is_some());
    }

    #[test]
    fn test_areas_are_isolated() {
        let (_dir, store) = open_store();
        let cancel = CancellationToken::new();
        store
            .process_area("north", vec![PointRecord::new(1.0, 1.0)], None, &cancel)
            .expect("load north");

        assert_eq!(
            store
                .query_points("north", &PointFilter::all(), &cancel)
                .expect("north")
                .len(),
            1
        );
        assert!(store
            .query_points("south", &PointFilter::all(), &cancel)
            .expect("south")
            .is_empty());
    }

    #[test]
    fn test_area_names_lists_created_areas() {
        let (_dir, store) = open_store();
        store.area("b-area").expect("open");
        store.area("a-area").expect("open");
        assert_eq!(
            store.area_names().expect("names"),
            vec!["a-area".to_string(), "b-area".to_string()]
        );
    }
}
