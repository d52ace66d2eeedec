use std::sync::Arc;

use rusqlite::params;
use serde::{Deserialize, Serialize};

use crate::cancel::CancellationToken;
use crate::errors::TerrainResult;
use crate::point::PointRecord;
use crate::spatial_index::SpatialIndex;
use crate::store::{schema, PointStore};

/// Configuration of a bulk load.
#[derive(Debug, Clone)]
pub struct BulkLoadConfig {
    /// Rows committed per transaction. Each batch gets a fresh scoped
    /// transaction, so a failed batch rolls back alone and the writer lock
    /// is never held longer than one batch.
    pub batch_size: usize,
    /// When set, per-row shadow index maintenance is suspended for the
    /// duration of the load and the spatial index is rebuilt in one pass
    /// after the final commit. Faster for large clouds; the
    /// point-row/index-entry invariant is restored before the load returns.
    pub defer_index_maintenance: bool,
}

impl Default for BulkLoadConfig {
    fn default() -> Self {
        BulkLoadConfig {
            batch_size: 10_000,
            defer_index_maintenance: true,
        }
    }
}

/// Outcome summary of a bulk load.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkLoadSummary {
    /// Rows committed by this load.
    pub rows_loaded: u64,
    /// Transactions committed.
    pub batches_committed: u64,
    /// Id assigned to the first loaded row, if any row was loaded.
    pub first_id: Option<i64>,
    /// Id assigned to the last loaded row, if any row was loaded.
    pub last_id: Option<i64>,
}

/// Batched, transactional ingestion of point records.
///
/// The loader drains a finite record source in batches of
/// [`BulkLoadConfig::batch_size`] rows, committing each batch in its own
/// transaction. Failures follow batch granularity: a validation error or
/// cancellation rolls back the open batch only, and every previously
/// committed batch stays committed.
pub struct BulkLoader {
    store: Arc<PointStore>,
    index: SpatialIndex,
    config: BulkLoadConfig,
}

impl BulkLoader {
    pub(crate) fn new(store: Arc<PointStore>, index: SpatialIndex, config: BulkLoadConfig) -> Self {
        BulkLoader {
            store,
            index,
            config,
        }
    }

    /// Loads every record from `source`, in order.
    ///
    /// `zone_override` replaces each record's own zone label when set.
    /// Records are validated as they are consumed; an invalid record fails
    /// the load with [`crate::TerrainError::Validation`] carrying the
    /// record's 0-based ordinal, after rolling back its batch.
    ///
    /// Cancellation is observed per row and likewise rolls back only the
    /// open batch. On any outcome, rows from committed batches are fully
    /// indexed when this returns: a deferred load that fails mid-way still
    /// runs its index rebuild before surfacing the error.
    pub fn load<S>(
        &self,
        source: S,
        zone_override: Option<&str>,
        cancel: &CancellationToken,
    ) -> TerrainResult<BulkLoadSummary>
    where
        S: IntoIterator<Item = PointRecord>,
    {
        let mut records = source.into_iter().enumerate().peekable();
        let mut summary = BulkLoadSummary::default();
        let defer = self.config.defer_index_maintenance;

        let outcome = self.drain_batches(&mut records, zone_override, cancel, defer, &mut summary);

        // committed batches must be indexed even when a later batch failed;
        // everything visible in the store is visible to range queries on
        // return, error or not
        let rebuilt = if defer && summary.rows_loaded > 0 {
            self.store
                .rebuild_shadow()
                .and_then(|entries| self.index.bulk_replace(entries))
        } else {
            Ok(())
        };
        outcome?;
        rebuilt?;

        log::info!(
            "bulk load finished: {} rows in {} batches",
            summary.rows_loaded,
            summary.batches_committed
        );
        Ok(summary)
    }

    fn drain_batches<I>(
        &self,
        records: &mut std::iter::Peekable<std::iter::Enumerate<I>>,
        zone_override: Option<&str>,
        cancel: &CancellationToken,
        defer: bool,
        summary: &mut BulkLoadSummary,
    ) -> TerrainResult<()>
    where
        I: Iterator<Item = PointRecord>,
    {
        while records.peek().is_some() {
            let mut batch_entries: Vec<(i64, f64, f64)> = Vec::new();
            {
                let mut conn = self.store.lock();
                let tx = conn.transaction()?;
                {
                    let mut insert = tx.prepare_cached(schema::INSERT_POINT_SQL)?;
                    let mut shadow = tx.prepare_cached(schema::INSERT_SHADOW_SQL)?;
                    while batch_entries.len() < self.config.batch_size {
                        let Some((ordinal, mut record)) = records.next() else {
                            break;
                        };
                        // an early return here drops `tx`, rolling the batch back
                        cancel.checkpoint()?;
                        if let Some(zone) = zone_override {
                            record.zone = Some(zone.to_string());
                        }
                        let (easting, northing) = record.validate(ordinal as u64)?;
                        insert.execute(params![
                            easting,
                            northing,
                            record.altitude,
                            record.zone,
                            record.classification
                        ])?;
                        let id = tx.last_insert_rowid();
                        if !defer {
                            shadow.execute(params![id, easting, northing])?;
                        }
                        batch_entries.push((id, easting, northing));
                    }
                }
                tx.commit()?;
                if !defer {
                    // applied under the writer lock, after the commit, so
                    // readers see the batch all at once
                    self.index.insert_many(&batch_entries)?;
                }
            }

            summary.rows_loaded += batch_entries.len() as u64;
            summary.batches_committed += 1;
            if summary.first_id.is_none() {
                summary.first_id = batch_entries.first().map(|&(id, _, _)| id);
            }
            summary.last_id = batch_entries.last().map(|&(id, _, _)| id);
            log::debug!(
                "committed batch of {} rows ({} total)",
                batch_entries.len(),
                summary.rows_loaded
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::TerrainError;
    use tempfile::TempDir;

    fn loader(config: BulkLoadConfig) -> (TempDir, Arc<PointStore>, SpatialIndex, BulkLoader) {
        let dir = TempDir::new().expect("temp dir");
        let store = Arc::new(PointStore::open(dir.path().join("area.db")).expect("open store"));
        let index = SpatialIndex::new();
        let loader = BulkLoader::new(store.clone(), index.clone(), config);
        (dir, store, index, loader)
    }

    fn records(n: usize) -> Vec<PointRecord> {
        (0..n)
            .map(|i| PointRecord::new(i as f64, i as f64).with_altitude(0.5))
            .collect()
    }

    #[test]
    fn test_load_batches_and_summary() {
        let (_dir, store, index, loader) = loader(BulkLoadConfig {
            batch_size: 10,
            ..BulkLoadConfig::default()
        });
        let cancel = CancellationToken::new();

        let summary = loader.load(records(25), None, &cancel).expect("load");
        assert_eq!(summary.rows_loaded, 25);
        assert_eq!(summary.batches_committed, 3);
        assert_eq!(store.len().expect("len"), 25);
        assert_eq!(index.len(), 25);
        assert!(summary.first_id.is_some());
        assert_eq!(
            summary.last_id.unwrap() - summary.first_id.unwrap(),
            24,
            "ids assigned contiguously"
        );
    }

    #[test]
    fn test_empty_source_skips_rebuild() {
        let (_dir, store, index, loader) = loader(BulkLoadConfig::default());
        let cancel = CancellationToken::new();

        let summary = loader.load(Vec::new(), None, &cancel).expect("load nothing");
        assert_eq!(summary, BulkLoadSummary::default());
        assert!(store.is_empty().expect("is_empty"));
        assert!(index.is_empty());
    }

    #[test]
    fn test_validation_failure_rolls_back_open_batch_only() {
        let (_dir, store, index, loader) = loader(BulkLoadConfig {
            batch_size: 10,
            ..BulkLoadConfig::default()
        });
        let cancel = CancellationToken::new();

        let mut source = records(25);
        source[15].easting = None;

        let err = loader
            .load(source, None, &cancel)
            .expect_err("invalid record must fail the load");
        assert!(matches!(err, TerrainError::Validation { .. }));
        assert_eq!(err.ordinal(), Some(15));
        // first batch committed, second rolled back
        assert_eq!(store.len().expect("len"), 10);
        // the deferred rebuild still ran: committed rows are queryable
        assert_eq!(index.len(), 10);
        assert_eq!(index.range_query(0.0, 9.0, 0.0, 9.0).len(), 10);
    }

    #[test]
    fn test_cancellation_keeps_committed_batches() {
        let (_dir, store, index, loader) = loader(BulkLoadConfig {
            batch_size: 10,
            ..BulkLoadConfig::default()
        });
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        let source = records(25).into_iter().enumerate().map(move |(i, r)| {
            if i == 12 {
                trigger.cancel();
            }
            r
        });

        let err = loader.load(source, None, &cancel).expect_err("must cancel");
        assert!(err.is_cancelled());
        assert_eq!(store.len().expect("len"), 10);
        assert_eq!(index.len(), 10, "committed rows indexed despite cancellation");
    }

    #[test]
    fn test_zone_override_wins() {
        let (_dir, store, _index, loader) = loader(BulkLoadConfig::default());
        let cancel = CancellationToken::new();

        let source = vec![
            PointRecord::new(1.0, 1.0).with_zone("31U"),
            PointRecord::new(2.0, 2.0),
        ];
        let summary = loader.load(source, Some("32N"), &cancel).expect("load");

        for id in summary.first_id.unwrap()..=summary.last_id.unwrap() {
            let point = store.point(id).expect("fetch").expect("exists");
            assert_eq!(point.zone.as_deref(), Some("32N"));
        }
    }

    #[test]
    fn test_incremental_maintenance_keeps_index_current() {
        let (_dir, _store, index, loader) = loader(BulkLoadConfig {
            batch_size: 4,
            defer_index_maintenance: false,
        });
        let cancel = CancellationToken::new();

        loader.load(records(10), None, &cancel).expect("load");
        assert_eq!(index.len(), 10);
        assert_eq!(index.range_query(0.0, 9.0, 0.0, 9.0).len(), 10);
    }

    #[test]
    fn test_deferred_load_restores_index_before_returning() {
        let (_dir, store, index, loader) = loader(BulkLoadConfig {
            batch_size: 4,
            defer_index_maintenance: true,
        });
        let cancel = CancellationToken::new();

        loader.load(records(10), None, &cancel).expect("load");
        assert_eq!(index.len(), 10);
        assert_eq!(store.load_index_entries().expect("entries").len(), 10);
    }
}
