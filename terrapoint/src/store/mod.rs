//! The persisted point store and its schema.

mod point_store;
pub(crate) mod schema;

pub use point_store::PointStore;
