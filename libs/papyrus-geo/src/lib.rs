//! Geometry adapter and geo-interface records.
//!
//! - [`adapter`]: `GeoJSON` geometry ⇄ planar shape ⇄ WKB
//! - [`mapping`]: explicit property ↔ column table of a `SeaORM` entity
//! - [`value`]: JSON and query-string codecs for column values
//! - [`record`]: `GeoRecord`, the feature view of an active model
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub mod adapter;
pub mod column;
pub mod error;
pub mod mapping;
pub mod record;
pub mod value;

pub use adapter::Shape;
pub use column::{ColumnInfo, ColumnKind, GeometryType};
pub use error::{GeoError, MappingError, RecordError, ValueError};
pub use mapping::{ColumnDef, GeoMapping, GeoMappingBuilder, MappingSchema};
pub use record::{GeoRecord, id_to_value};
