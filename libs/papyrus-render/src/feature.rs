//! `GeoJSON` renderer with JSONP support.

use std::str::FromStr;

use bytes::Bytes;
use geojson::{Feature, GeoJson, Geometry};
use papyrus_protocol::Params;
use serde::{Deserialize, Serialize};
use serde_json::{Value as Json, json};
use thiserror::Error;

use crate::Rendered;

pub const APPLICATION_GEO_JSON: &str = "application/geo+json";
pub const TEXT_JAVASCRIPT: &str = "text/javascript";

#[derive(Debug, Error)]
pub enum GeoJsonError {
    /// A JSONP callback that is not a plain JavaScript name path.
    #[error("`{callback}` is not a valid JSONP callback name")]
    InvalidCallback { param: String, callback: String },

    #[error("cannot serialize GeoJSON: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Letters, digits, `_`, `$` and `.`, e.g. `app.handlers.show_1`.
fn is_callback_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '$' | '.'))
}

/// What a list of items is wrapped into.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CollectionType {
    #[default]
    FeatureCollection,
    GeometryCollection,
}

impl FromStr for CollectionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "FeatureCollection" => Ok(Self::FeatureCollection),
            "GeometryCollection" => Ok(Self::GeometryCollection),
            other => Err(format!("unknown collection type `{other}`")),
        }
    }
}

/// Input of [`GeoJsonRenderer::render`]: one document, or a list of items
/// to wrap in the configured collection type.
#[derive(Clone, Debug)]
pub enum GeoJsonValue {
    One(GeoJson),
    Many(Vec<GeoJson>),
}

impl From<GeoJson> for GeoJsonValue {
    fn from(value: GeoJson) -> Self {
        Self::One(value)
    }
}

impl From<Feature> for GeoJsonValue {
    fn from(value: Feature) -> Self {
        Self::One(GeoJson::Feature(value))
    }
}

impl From<Vec<Feature>> for GeoJsonValue {
    fn from(value: Vec<Feature>) -> Self {
        Self::Many(value.into_iter().map(GeoJson::Feature).collect())
    }
}

impl From<Vec<Geometry>> for GeoJsonValue {
    fn from(value: Vec<Geometry>) -> Self {
        Self::Many(value.into_iter().map(GeoJson::Geometry).collect())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GeoJsonRenderer {
    jsonp_param_name: String,
    collection_type: CollectionType,
}

impl Default for GeoJsonRenderer {
    fn default() -> Self {
        Self {
            jsonp_param_name: "callback".to_owned(),
            collection_type: CollectionType::FeatureCollection,
        }
    }
}

impl GeoJsonRenderer {
    #[must_use]
    pub fn new(jsonp_param_name: impl Into<String>, collection_type: CollectionType) -> Self {
        Self {
            jsonp_param_name: jsonp_param_name.into(),
            collection_type,
        }
    }

    #[must_use]
    pub fn jsonp_param_name(&self) -> &str {
        &self.jsonp_param_name
    }

    #[must_use]
    pub fn collection_type(&self) -> CollectionType {
        self.collection_type
    }

    /// The JSONP callback requested in `params`, if any.
    ///
    /// # Errors
    /// `GeoJsonError::InvalidCallback` for a callback that is not a plain
    /// name path.
    pub fn callback<'p>(&self, params: &'p Params) -> Result<Option<&'p str>, GeoJsonError> {
        match params.get(&self.jsonp_param_name) {
            Some(callback) if !is_callback_name(callback) => Err(GeoJsonError::InvalidCallback {
                param: self.jsonp_param_name.clone(),
                callback: callback.to_owned(),
            }),
            callback => Ok(callback),
        }
    }

    fn to_json(&self, value: GeoJsonValue) -> Result<Json, serde_json::Error> {
        Ok(match value {
            GeoJsonValue::One(doc) => serde_json::to_value(&doc)?,
            GeoJsonValue::Many(items) => {
                let items = items
                    .iter()
                    .map(serde_json::to_value)
                    .collect::<Result<Vec<_>, _>>()?;
                match self.collection_type {
                    CollectionType::FeatureCollection => {
                        json!({"type": "FeatureCollection", "features": items})
                    }
                    CollectionType::GeometryCollection => {
                        json!({"type": "GeometryCollection", "geometries": items})
                    }
                }
            }
        })
    }

    /// Serialize `value`.
    ///
    /// An explicit content type is kept as is. Otherwise the body is
    /// wrapped as `callback(...);` and served as JavaScript when the JSONP
    /// parameter is present, and served as `GeoJSON` when it is not.
    ///
    /// # Errors
    /// - `GeoJsonError::InvalidCallback` for a malformed JSONP callback
    /// - `GeoJsonError::Serialize` for serialization failures
    pub fn render(
        &self,
        value: impl Into<GeoJsonValue>,
        params: &Params,
        explicit_content_type: Option<&str>,
    ) -> Result<Rendered, GeoJsonError> {
        let body = serde_json::to_string(&self.to_json(value.into())?)?;
        if let Some(ct) = explicit_content_type {
            return Ok(Rendered {
                content_type: ct.to_owned(),
                body: Bytes::from(body),
            });
        }
        Ok(match self.callback(params)? {
            Some(callback) => Rendered {
                content_type: TEXT_JAVASCRIPT.to_owned(),
                body: Bytes::from(format!("{callback}({body});")),
            },
            None => Rendered {
                content_type: APPLICATION_GEO_JSON.to_owned(),
                body: Bytes::from(body),
            },
        })
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    fn point_feature() -> Feature {
        let geometry = Geometry::new(geojson::Value::Point(vec![53.0, -4.0]));
        let mut feature = Feature::from(geometry);
        feature.id = Some(geojson::feature::Id::Number(1.into()));
        feature.set_property("title", "Dict 1");
        feature
    }

    fn body(r: &Rendered) -> Json {
        serde_json::from_slice(&r.body).unwrap()
    }

    #[test]
    fn plain_geojson() {
        let r = GeoJsonRenderer::default()
            .render(point_feature(), &Params::default(), None)
            .unwrap();
        assert_eq!(r.content_type, APPLICATION_GEO_JSON);
        let doc = body(&r);
        assert_eq!(doc["type"], "Feature");
        assert_eq!(doc["id"], 1);
        assert_eq!(doc["properties"]["title"], "Dict 1");
        assert_eq!(doc["geometry"]["coordinates"], json!([53.0, -4.0]));
    }

    #[test]
    fn jsonp_wraps_body() {
        let params = Params::parse("callback=jsonp_cb").unwrap();
        let r = GeoJsonRenderer::default()
            .render(point_feature(), &params, None)
            .unwrap();
        assert_eq!(r.content_type, TEXT_JAVASCRIPT);
        let text = std::str::from_utf8(&r.body).unwrap();
        assert!(text.starts_with("jsonp_cb({"));
        assert!(text.ends_with("});"));
    }

    #[test]
    fn jsonp_callback_must_be_a_name_path() {
        let renderer = GeoJsonRenderer::default();
        let params = Params::parse("callback=app.%24handlers.show_1").unwrap();
        let r = renderer.render(point_feature(), &params, None).unwrap();
        assert!(r.body.starts_with(b"app.$handlers.show_1({"));

        for bad in ["alert(1)%3Bf", "f%3C%2Fscript%3E", "", "a%20b"] {
            let params = Params::parse(&format!("callback={bad}")).unwrap();
            let err = renderer.render(point_feature(), &params, None).unwrap_err();
            assert!(
                matches!(&err, GeoJsonError::InvalidCallback { param, .. } if param == "callback"),
                "{bad}"
            );
        }
    }

    #[test]
    fn custom_jsonp_param_name() {
        let renderer = GeoJsonRenderer::new("cb", CollectionType::FeatureCollection);
        let ignored = Params::parse("callback=nope").unwrap();
        let r = renderer.render(point_feature(), &ignored, None).unwrap();
        assert_eq!(r.content_type, APPLICATION_GEO_JSON);

        let params = Params::parse("cb=f").unwrap();
        let r = renderer.render(point_feature(), &params, None).unwrap();
        assert!(r.body.starts_with(b"f("));
    }

    #[test]
    fn explicit_content_type_is_kept() {
        let params = Params::parse("callback=jsonp_cb").unwrap();
        let r = GeoJsonRenderer::default()
            .render(point_feature(), &params, Some("text/plain"))
            .unwrap();
        assert_eq!(r.content_type, "text/plain");
        assert_eq!(body(&r)["type"], "Feature");
    }

    #[test]
    fn lists_are_wrapped_as_feature_collection() {
        let r = GeoJsonRenderer::default()
            .render(vec![point_feature()], &Params::default(), None)
            .unwrap();
        let doc = body(&r);
        assert_eq!(doc["type"], "FeatureCollection");
        assert_eq!(doc["features"][0]["type"], "Feature");
    }

    #[test]
    fn lists_can_be_wrapped_as_geometry_collection() {
        let renderer = GeoJsonRenderer::new("callback", CollectionType::GeometryCollection);
        let geoms = vec![Geometry::new(geojson::Value::Point(vec![1.0, 2.0]))];
        let doc = body(&renderer.render(geoms, &Params::default(), None).unwrap());
        assert_eq!(doc["type"], "GeometryCollection");
        assert_eq!(doc["geometries"][0]["type"], "Point");
    }

    #[test]
    fn collection_type_from_str() {
        assert_eq!(
            "GeometryCollection".parse::<CollectionType>().unwrap(),
            CollectionType::GeometryCollection
        );
        assert!("Collection".parse::<CollectionType>().is_err());
    }
}
