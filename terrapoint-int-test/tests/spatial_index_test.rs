//! Integration tests for the point-row/index-entry lockstep invariant and
//! spatial query semantics through the public API.

use terrapoint::{CancellationToken, PointFilter, PointRecord, TerrainStore};
use terrapoint_int_test::test_util::{create_test_context, init_logging};

#[test]
fn test_inserted_point_is_found_at_radius_zero() {
    let ctx = create_test_context().expect("context");
    let area = ctx.store().area("survey").expect("area");
    let cancel = CancellationToken::new();

    let id = area
        .insert_point(&PointRecord::new(480_123.25, 5_501_987.5).with_altitude(88.0))
        .expect("insert");

    let hits = area
        .query(
            &PointFilter::all().within_box(480_123.25, 5_501_987.5, 0.0),
            &cancel,
        )
        .expect("radius-0 query");
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].id, id);
    assert_eq!(hits[0].easting, 480_123.25);
}

#[test]
fn test_removed_point_disappears_from_spatial_queries() {
    let ctx = create_test_context().expect("context");
    let area = ctx.store().area("survey").expect("area");
    let cancel = CancellationToken::new();

    let keep = area.insert_point(&PointRecord::new(10.0, 10.0)).expect("insert");
    let gone = area.insert_point(&PointRecord::new(11.0, 11.0)).expect("insert");
    assert!(area.remove_point(gone).expect("remove"));

    let hits = area
        .query(&PointFilter::all().within_box(10.5, 10.5, 5.0), &cancel)
        .expect("query");
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].id, keep);
}

#[test]
fn test_box_semantics_include_corner_points() {
    let ctx = create_test_context().expect("context");
    let area = ctx.store().area("survey").expect("area");
    let cancel = CancellationToken::new();

    // at euclidean distance r*sqrt(2) from the center, but inside the box
    area.insert_point(&PointRecord::new(10.0, 10.0)).expect("insert corner");
    let hits = area
        .query(&PointFilter::all().within_box(0.0, 0.0, 10.0), &cancel)
        .expect("query");
    assert_eq!(hits.len(), 1, "spatial clause is a box, not a circle");

    // just outside the box on one axis
    assert!(area
        .query(&PointFilter::all().within_box(0.0, 0.0, 9.99), &cancel)
        .expect("query")
        .is_empty());
}

#[test]
fn test_reopen_restores_index_from_shadow_table() {
    init_logging();
    let ctx = create_test_context().expect("context");
    let cancel = CancellationToken::new();

    let records: Vec<PointRecord> = (0..100)
        .map(|i| PointRecord::new(i as f64, i as f64))
        .collect();
    ctx.store()
        .process_area("survey", records, None, &cancel)
        .expect("load");

    // a second store over the same directory sees the same index
    let reopened = TerrainStore::open(ctx.base_dir()).expect("reopen");
    let area = reopened.area("survey").expect("area");
    assert_eq!(area.index().len(), 100);
    assert_eq!(
        area.query(&PointFilter::all().within_box(50.0, 50.0, 2.0), &cancel)
            .expect("query")
            .len(),
        5
    );
}

#[test]
fn test_duplicate_index_insert_is_an_index_error() {
    let ctx = create_test_context().expect("context");
    let area = ctx.store().area("survey").expect("area");

    let id = area.insert_point(&PointRecord::new(1.0, 1.0)).expect("insert");
    let err = area
        .index()
        .insert(id, 1.0, 1.0)
        .expect_err("second entry for the same id must fail");
    assert!(matches!(err, terrapoint::TerrainError::Index(_)));
}
