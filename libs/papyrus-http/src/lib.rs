//! HTTP surface of `MapFish` resources.
//!
//! [`register_routes`] mounts the six conventional `MapFish` routes of one
//! resource on an axum router; [`register_xsd_route`] adds its schema.
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub mod error;
mod handlers;
pub mod routes;

pub use error::ApiError;
pub use routes::{MapfishResource, RouteInfo, RouteTable, register_routes, register_xsd_route};
