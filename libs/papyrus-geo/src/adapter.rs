//! Conversions between `GeoJSON` geometries, planar shapes and WKB.
//!
//! Shapes are `geo_types` geometries in `f64`. WKB is written little-endian,
//! without an embedded SRID; the SRID travels next to the bytes.

use geo::BoundingRect;
use geo_traits::to_geo::ToGeoGeometry;
use geo_types::{Coord, LineString, Point, Polygon, Rect};
use geojson::GeoJson;
use wkb::Endianness;
use wkb::writer::{WriteOptions, write_geometry};

use crate::error::GeoError;

pub type Shape = geo_types::Geometry<f64>;

/// Convert a `GeoJSON` geometry to a planar shape.
///
/// # Errors
/// Returns `GeoError::InvalidGeometry` with the parser's message when the
/// geometry cannot be represented (e.g. an empty or unclosed ring).
pub fn to_shape(geometry: &geojson::Geometry) -> Result<Shape, GeoError> {
    Shape::try_from(geometry.clone()).map_err(|e| GeoError::InvalidGeometry(e.to_string()))
}

#[must_use]
pub fn from_shape(shape: &Shape) -> geojson::Geometry {
    geojson::Geometry::new(geojson::Value::from(shape))
}

/// Parse a `GeoJSON` geometry document, as sent in the `geometry` parameter.
///
/// # Errors
/// Returns `GeoError::InvalidGeometry` for malformed JSON or for a document
/// that is not a bare geometry.
pub fn parse_geometry(text: &str) -> Result<Shape, GeoError> {
    let doc: GeoJson = text
        .parse()
        .map_err(|e: geojson::Error| GeoError::InvalidGeometry(e.to_string()))?;
    match doc {
        GeoJson::Geometry(g) => to_shape(&g),
        GeoJson::Feature(_) | GeoJson::FeatureCollection(_) => Err(GeoError::InvalidGeometry(
            "expected a geometry, got a feature".to_owned(),
        )),
    }
}

/// Encode a shape as little-endian WKB.
///
/// # Errors
/// Returns `GeoError::Wkb` when the writer rejects the shape.
pub fn to_wkb(shape: &Shape) -> Result<Vec<u8>, GeoError> {
    let mut buf = Vec::new();
    write_geometry(
        &mut buf,
        shape,
        &WriteOptions {
            endianness: Endianness::LittleEndian,
        },
    )
    .map_err(|e| GeoError::Wkb(e.to_string()))?;
    Ok(buf)
}

/// Decode WKB of either byte order.
///
/// # Errors
/// Returns `GeoError::Wkb` for truncated or unknown input.
pub fn from_wkb(bytes: &[u8]) -> Result<Shape, GeoError> {
    let parsed = wkb::reader::read_wkb(bytes).map_err(|e| GeoError::Wkb(e.to_string()))?;
    parsed
        .try_to_geometry()
        .ok_or_else(|| GeoError::Wkb("geometry has no planar representation".to_owned()))
}

/// Rectangle polygon for a `bbox` parameter.
///
/// The exterior ring runs `(minx,miny) (minx,maxy) (maxx,maxy) (maxx,miny)`
/// and closes on the first corner.
#[must_use]
pub fn bbox_polygon(minx: f64, miny: f64, maxx: f64, maxy: f64) -> Shape {
    let ring = LineString::from(vec![
        (minx, miny),
        (minx, maxy),
        (maxx, maxy),
        (maxx, miny),
        (minx, miny),
    ]);
    Shape::Polygon(Polygon::new(ring, vec![]))
}

#[must_use]
pub fn point(lon: f64, lat: f64) -> Shape {
    Shape::Point(Point::new(lon, lat))
}

#[must_use]
pub fn envelope(shape: &Shape) -> Option<Rect<f64>> {
    shape.bounding_rect()
}

/// Envelope grown by `distance` on every side.
#[must_use]
pub fn expanded_envelope(shape: &Shape, distance: f64) -> Option<Rect<f64>> {
    envelope(shape).map(|r| {
        Rect::new(
            Coord {
                x: r.min().x - distance,
                y: r.min().y - distance,
            },
            Coord {
                x: r.max().x + distance,
                y: r.max().y + distance,
            },
        )
    })
}
