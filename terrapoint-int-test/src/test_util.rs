//! Shared fixtures for the integration tests: temp-dir backed stores and
//! synthetic point cloud generators.

use std::path::Path;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tempfile::TempDir;
use terrapoint::{PointRecord, TerrainResult, TerrainStore};

/// A terrain store rooted in a temp directory that lives as long as the
/// context.
pub struct TestContext {
    store: TerrainStore,
    dir: TempDir,
}

impl TestContext {
    pub fn store(&self) -> &TerrainStore {
        &self.store
    }

    /// Base directory of the store, for reopen tests.
    pub fn base_dir(&self) -> &Path {
        self.dir.path()
    }
}

/// Creates a store with default configuration in a fresh temp directory.
pub fn create_test_context() -> TerrainResult<TestContext> {
    init_logging();
    let dir = TempDir::new()?;
    let store = TerrainStore::open(dir.path())?;
    Ok(TestContext { store, dir })
}

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// A `side` x `side` grid of records at `spacing`, with altitudes on the
/// exact plane `z = a*easting + b*northing + c`, classified "ground".
pub fn plane_grid(a: f64, b: f64, c: f64, side: usize, spacing: f64) -> Vec<PointRecord> {
    let mut records = Vec::with_capacity(side * side);
    for i in 0..side {
        for j in 0..side {
            let easting = i as f64 * spacing;
            let northing = j as f64 * spacing;
            records.push(
                PointRecord::new(easting, northing)
                    .with_altitude(a * easting + b * northing + c)
                    .with_classification("ground"),
            );
        }
    }
    records
}

/// A reproducible random cloud over `[0, extent]²` with altitudes in
/// `[0, 50]`.
pub fn random_cloud(seed: u64, count: usize, extent: f64) -> Vec<PointRecord> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count)
        .map(|_| {
            PointRecord::new(rng.gen_range(0.0..extent), rng.gen_range(0.0..extent))
                .with_altitude(rng.gen_range(0.0..50.0))
        })
        .collect()
}
