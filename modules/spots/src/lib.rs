//! Spots: points of interest served over the `MapFish` protocol.
//!
//! [`register`] wires the entity, its mapping and hooks into a
//! transactional `MapFish` service and mounts its routes.
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub mod config;
pub mod hooks;
pub mod mapping;
pub mod module;

#[doc(hidden)]
pub mod infra;

pub use config::SpotsConfig;
pub use module::{migrate, register};
pub use papyrus_protocol::SpatialDialect;
