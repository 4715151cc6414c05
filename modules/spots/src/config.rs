use papyrus_protocol::SpatialDialect;
use papyrus_render::CollectionType;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SpotsConfig {
    /// Prefix of the route names, e.g. `spots_read_many`.
    pub route_prefix: String,
    pub base_url: String,
    /// Serve reads only; writes answer 405.
    pub readonly: bool,
    pub jsonp_param_name: String,
    pub collection_type: CollectionType,
    /// Spatial SQL dialect. Derived from the database backend when unset.
    pub spatial: Option<SpatialDialect>,
    /// List the primary key in the XSD.
    pub xsd_include_primary_keys: bool,
}

impl Default for SpotsConfig {
    fn default() -> Self {
        Self {
            route_prefix: "spots".to_owned(),
            base_url: "/spots".to_owned(),
            readonly: false,
            jsonp_param_name: "callback".to_owned(),
            collection_type: CollectionType::FeatureCollection,
            spatial: None,
            xsd_include_primary_keys: false,
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use papyrus_protocol::OracleParams;

    #[test]
    fn missing_fields_take_defaults() {
        let cfg: SpotsConfig = serde_json::from_str(r#"{"readonly": true}"#).unwrap();
        assert!(cfg.readonly);
        assert_eq!(cfg.base_url, "/spots");
        assert_eq!(cfg.spatial, None);
    }

    #[test]
    fn spatial_dialect_by_kind() {
        let cfg: SpotsConfig =
            serde_json::from_str(r#"{"spatial": {"kind": "spatialite", "spatial_index": true}}"#)
                .unwrap();
        assert_eq!(
            cfg.spatial,
            Some(SpatialDialect::Spatialite {
                spatial_index: true
            })
        );

        let cfg: SpotsConfig =
            serde_json::from_str(r#"{"spatial": {"kind": "oracle", "params": "unit=km", "tol": 0.5}}"#)
                .unwrap();
        assert_eq!(
            cfg.spatial,
            Some(SpatialDialect::Oracle(OracleParams {
                params: "unit=km".to_owned(),
                tol: Some(0.5),
                ..OracleParams::default()
            }))
        );
    }

    #[test]
    fn unknown_fields_are_rejected() {
        assert!(serde_json::from_str::<SpotsConfig>(r#"{"base": "/x"}"#).is_err());
    }
}
