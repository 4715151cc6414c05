//! `MapFish` protocol over sea-orm entities.
//!
//! - [`params`]: raw query parameters and the request a protocol call sees
//! - [`filter`]: attribute and geometry filters built from those parameters
//! - [`spatial`]: within-distance SQL per database dialect
//! - [`protocol`]: count, read, create, update and delete with [`hooks`]
//! - [`service`]: the object-safe, transactional view used by the HTTP layer
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub mod error;
pub mod filter;
pub mod hooks;
pub mod params;
pub mod protocol;
pub mod service;
pub mod spatial;

pub use error::{FilterError, ProtocolError, READONLY_ALLOW};
pub use filter::{create_attr_filter, create_filter, create_geom_filter};
pub use hooks::{Hooks, NoHooks};
pub use params::{MapfishRequest, Params, asbool};
pub use protocol::Protocol;
pub use service::{DbMapfishService, MapfishService};
pub use spatial::{OracleParams, SpatialDialect, SpatialTarget};
