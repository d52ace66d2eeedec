//! # Terrapoint - Embedded LiDAR Terrain Point Store
//!
//! Terrapoint ingests georeferenced LiDAR point clouds into named survey
//! areas, maintains a persisted, spatially-indexed point store per area,
//! and derives per-point terrain traversability metrics (slope, roughness,
//! curvature, traversability score and plane normal) from local
//! least-squares plane fits.
//!
//! ## Key Features
//!
//! - **Embedded**: single-file storage per area, no server process
//! - **Spatially Indexed**: an in-memory R-tree, persisted through a
//!   shadow table and reloaded at open
//! - **Batched Ingestion**: transactional bulk loading with per-batch
//!   commit granularity and optional deferred index maintenance
//! - **Terrain Metrics**: neighborhood plane fitting with batched
//!   write-back over whole areas
//! - **Composable Queries**: spatial, classification and metric-range
//!   clauses, AND-ed
//! - **Cooperative Cancellation**: every long-running operation takes a
//!   [`CancellationToken`] and rolls back its open transaction on cancel
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use terrapoint::{CancellationToken, PointFilter, PointRecord, TerrainStore};
//!
//! # fn main() -> terrapoint::TerrainResult<()> {
//! let store = TerrainStore::open("./surveys")?;
//! let cancel = CancellationToken::new();
//!
//! // ingest a decoded point cloud into one area
//! let records = vec![
//!     PointRecord::new(480_000.0, 5_500_000.0)
//!         .with_altitude(132.8)
//!         .with_classification("ground"),
//! ];
//! let summary = store.process_area("valley-north", records, Some("32N"), &cancel)?;
//! println!("loaded {} rows", summary.rows_loaded);
//!
//! // derive terrain metrics for the whole area
//! store.compute_area_metrics("valley-north", &cancel)?;
//!
//! // query traversable ground near a location
//! let filter = PointFilter::all()
//!     .within_box(480_000.0, 5_500_000.0, 250.0)
//!     .classification("ground")
//!     .trav_score(0.8, 1.0);
//! let candidates = store.query_points("valley-north", &filter, &cancel)?;
//! # drop(candidates);
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Organization
//!
//! - [`terrain`] - The top-level store over a directory of areas
//! - [`area`] - One survey area: point store plus spatial index
//! - [`store`] - The persisted point table and shadow index table
//! - [`spatial_index`] - In-memory R-tree over point bounding boxes
//! - [`loader`] - Batched, transactional bulk ingestion
//! - [`metrics`] - Plane-fit terrain metrics and area sweeps
//! - [`filter`] - Composable point query filters
//! - [`errors`] - Error types and the crate result alias

pub mod area;
pub mod bounding_box;
pub mod cancel;
pub mod errors;
pub mod filter;
pub mod loader;
pub mod metrics;
pub mod point;
pub mod spatial_index;
pub mod store;
pub mod terrain;

mod plane_fit;

pub use area::Area;
pub use bounding_box::BoundingBox;
pub use cancel::CancellationToken;
pub use errors::{TerrainError, TerrainResult};
pub use filter::{PointFilter, Range};
pub use loader::{BulkLoadConfig, BulkLoadSummary, BulkLoader};
pub use metrics::{MetricsConfig, MetricsEngine, MetricsSummary};
pub use point::{LidarPoint, PointRecord, TerrainMetrics};
pub use spatial_index::SpatialIndex;
pub use store::PointStore;
pub use terrain::{TerrainStore, TerrainStoreBuilder, MAX_AREA_NAME_LEN};
