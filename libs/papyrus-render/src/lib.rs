//! Renderers for `MapFish` responses: `GeoJSON` with optional JSONP, and an
//! XML schema describing a mapped resource.
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub mod feature;
pub mod registry;
pub mod xsd;

pub use feature::{
    APPLICATION_GEO_JSON, CollectionType, GeoJsonError, GeoJsonRenderer, GeoJsonValue,
    TEXT_JAVASCRIPT,
};
pub use registry::{Renderer, RendererRegistry};
pub use xsd::{APPLICATION_XML, ElementCallback, SequenceCallback, XsdError, XsdGenerator, XsdWriter};

/// A rendered response body and its content type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Rendered {
    pub content_type: String,
    pub body: bytes::Bytes,
}
