use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use rstar::{RTree, RTreeObject, AABB};

use crate::bounding_box::BoundingBox;
use crate::errors::{TerrainError, TerrainResult};

/// One spatial index entry: a point id and its degenerate bounding box.
#[derive(Clone, Debug, PartialEq)]
pub struct IndexEntry {
    id: i64,
    bbox: BoundingBox,
}

impl IndexEntry {
    fn new(id: i64, easting: f64, northing: f64) -> Self {
        IndexEntry {
            id,
            bbox: BoundingBox::point(easting, northing),
        }
    }

    /// The point id this entry indexes.
    pub fn id(&self) -> i64 {
        self.id
    }

    /// The stored bounding box (degenerate for point data).
    pub fn bbox(&self) -> &BoundingBox {
        &self.bbox
    }
}

impl RTreeObject for IndexEntry {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.bbox.to_aabb()
    }
}

/// An in-memory R-tree over per-point bounding boxes.
///
/// `SpatialIndex` answers "which points have bounding boxes intersecting
/// box B" as a true indexed lookup — neighbor queries are the hot path of
/// metrics computation and must never degrade to a linear scan.
///
/// The index is the queryable form of the `points_idx` shadow table kept by
/// the point store; the two are maintained in lockstep by [`crate::Area`]:
/// shadow rows are written inside the same transaction as the point row,
/// and this structure is updated once that transaction commits. It can be
/// fully rebuilt from the store in one pass via [`SpatialIndex::bulk_replace`],
/// which is how deferred bulk loads restore the invariant.
///
/// Uses the Pimpl pattern: clones are cheap and share the same tree.
#[derive(Clone, Default)]
pub struct SpatialIndex {
    inner: Arc<RwLock<SpatialIndexInner>>,
}

#[derive(Default)]
struct SpatialIndexInner {
    rtree: RTree<IndexEntry>,
    // id -> box map so removals and duplicate checks need no tree walk
    boxes: HashMap<i64, BoundingBox>,
}

impl SpatialIndex {
    /// Creates an empty index.
    pub fn new() -> Self {
        SpatialIndex::default()
    }

    /// Adds a degenerate box at the point's coordinates.
    ///
    /// Fails with [`TerrainError::Index`] if an entry for `id` already
    /// exists.
    pub fn insert(&self, id: i64, easting: f64, northing: f64) -> TerrainResult<()> {
        let mut inner = self.inner.write();
        inner.insert(id, easting, northing)
    }

    /// Adds many entries under one write lock. Used to apply a committed
    /// batch in one step so readers never observe a half-applied batch.
    pub fn insert_many(&self, entries: &[(i64, f64, f64)]) -> TerrainResult<()> {
        let mut inner = self.inner.write();
        for &(id, easting, northing) in entries {
            inner.insert(id, easting, northing)?;
        }
        Ok(())
    }

    /// Removes the entry for `id`.
    ///
    /// Fails with [`TerrainError::Index`] if no entry exists.
    pub fn remove(&self, id: i64) -> TerrainResult<()> {
        let mut inner = self.inner.write();
        let bbox = inner
            .boxes
            .remove(&id)
            .ok_or_else(|| TerrainError::index(format!("no index entry for id {}", id)))?;
        let entry = IndexEntry { id, bbox };
        if inner.rtree.remove(&entry).is_none() {
            // boxes and rtree diverged; should be unreachable
            return Err(TerrainError::index(format!(
                "index entry for id {} missing from R-tree",
                id
            )));
        }
        Ok(())
    }

    /// Atomically replaces the stored box for `id` with a degenerate box at
    /// the new coordinates. Readers never observe a stale entry: the
    /// remove and re-insert happen under a single write lock.
    pub fn update(&self, id: i64, new_easting: f64, new_northing: f64) -> TerrainResult<()> {
        let mut inner = self.inner.write();
        let bbox = inner
            .boxes
            .remove(&id)
            .ok_or_else(|| TerrainError::index(format!("no index entry for id {}", id)))?;
        let old = IndexEntry { id, bbox };
        inner.rtree.remove(&old);
        inner.insert(id, new_easting, new_northing)
    }

    /// Returns the ids of all entries whose box intersects the query box,
    /// in ascending id order.
    pub fn range_query(&self, min_x: f64, max_x: f64, min_y: f64, max_y: f64) -> Vec<i64> {
        self.query_box(&BoundingBox::new(min_x, min_y, max_x, max_y))
    }

    /// Returns the ids of all entries whose box intersects `bbox`, in
    /// ascending id order.
    pub fn query_box(&self, bbox: &BoundingBox) -> Vec<i64> {
        let inner = self.inner.read();
        let mut ids: Vec<i64> = inner
            .rtree
            .locate_in_envelope_intersecting(&bbox.to_aabb())
            .map(|entry| entry.id)
            .collect();
        ids.sort_unstable();
        ids
    }

    /// Replaces the whole index with the given entries in one bulk-load
    /// pass. Used at store open and after deferred bulk loads.
    pub fn bulk_replace(&self, entries: Vec<(i64, f64, f64)>) -> TerrainResult<()> {
        let mut boxes = HashMap::with_capacity(entries.len());
        let mut objects = Vec::with_capacity(entries.len());
        for (id, easting, northing) in entries {
            let entry = IndexEntry::new(id, easting, northing);
            if boxes.insert(id, entry.bbox.clone()).is_some() {
                return Err(TerrainError::index(format!(
                    "duplicate id {} in bulk index load",
                    id
                )));
            }
            objects.push(entry);
        }
        let rtree = RTree::bulk_load(objects);
        let mut inner = self.inner.write();
        inner.rtree = rtree;
        inner.boxes = boxes;
        Ok(())
    }

    /// Returns `true` if an entry for `id` exists.
    pub fn contains(&self, id: i64) -> bool {
        self.inner.read().boxes.contains_key(&id)
    }

    /// Number of indexed entries.
    pub fn len(&self) -> usize {
        self.inner.read().rtree.size()
    }

    /// Returns `true` if the index holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes all entries.
    pub fn clear(&self) {
        let mut inner = self.inner.write();
        inner.rtree = RTree::new();
        inner.boxes.clear();
    }
}

impl SpatialIndexInner {
    fn insert(&mut self, id: i64, easting: f64, northing: f64) -> TerrainResult<()> {
        if self.boxes.contains_key(&id) {
            return Err(TerrainError::index(format!(
                "index entry for id {} already exists",
                id
            )));
        }
        let entry = IndexEntry::new(id, easting, northing);
        self.boxes.insert(id, entry.bbox.clone());
        self.rtree.insert(entry);
        Ok(())
    }
}
