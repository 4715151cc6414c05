use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use http::Method;
use papyrus_protocol::MapfishService;
use papyrus_render::{GeoJsonRenderer, RendererRegistry, XsdGenerator};

use crate::handlers;

/// One `MapFish` resource as seen by the router: its service and the
/// renderers its responses go through.
#[derive(Clone)]
pub struct MapfishResource {
    pub(crate) service: Arc<dyn MapfishService>,
    pub(crate) geojson: GeoJsonRenderer,
    pub(crate) xsd: XsdGenerator,
}

impl MapfishResource {
    #[must_use]
    pub fn new(service: Arc<dyn MapfishService>) -> Self {
        Self {
            service,
            geojson: GeoJsonRenderer::default(),
            xsd: XsdGenerator::default(),
        }
    }

    /// Take the `geojson` and `xsd` renderers from `registry` when present.
    #[must_use]
    pub fn with_renderers(mut self, registry: &RendererRegistry) -> Self {
        if let Some(r) = registry.geojson("geojson") {
            self.geojson = r.clone();
        }
        if let Some(r) = registry.xsd("xsd") {
            self.xsd = r.clone();
        }
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RouteInfo {
    pub name: String,
    pub method: Method,
    pub path: String,
}

pub type RouteTable = Vec<RouteInfo>;

fn route_info(prefix: &str, suffix: &str, method: Method, path: &str) -> RouteInfo {
    RouteInfo {
        name: format!("{prefix}_{suffix}"),
        method,
        path: path.to_owned(),
    }
}

fn base_path(base_url: &str) -> String {
    let trimmed = base_url.trim_end_matches('/');
    if trimmed.starts_with('/') {
        trimmed.to_owned()
    } else {
        format!("/{trimmed}")
    }
}

/// Mount the `MapFish` routes of `resource` under `base_url`.
///
/// | name                   | method | path             |
/// |------------------------|--------|------------------|
/// | `<prefix>_read_many`   | GET    | `base`           |
/// | `<prefix>_read_one`    | GET    | `base/{id}`      |
/// | `<prefix>_count`       | GET    | `base/count`     |
/// | `<prefix>_create`      | POST   | `base`           |
/// | `<prefix>_update`      | PUT    | `base/{id}`      |
/// | `<prefix>_delete`      | DELETE | `base/{id}`      |
#[must_use]
pub fn register_routes(
    router: Router,
    route_name_prefix: &str,
    base_url: &str,
    resource: MapfishResource,
) -> (Router, RouteTable) {
    let base = base_path(base_url);
    let item = format!("{base}/{{id}}");
    let count = format!("{base}/count");

    let routes = Router::new()
        .route(
            &base,
            get(handlers::read_many).post(handlers::create),
        )
        .route(&count, get(handlers::count))
        .route(
            &item,
            get(handlers::read_one)
                .put(handlers::update)
                .delete(handlers::delete),
        )
        .with_state(Arc::new(resource));

    let table = vec![
        route_info(route_name_prefix, "read_many", Method::GET, &base),
        route_info(route_name_prefix, "read_one", Method::GET, &item),
        route_info(route_name_prefix, "count", Method::GET, &count),
        route_info(route_name_prefix, "create", Method::POST, &base),
        route_info(route_name_prefix, "update", Method::PUT, &item),
        route_info(route_name_prefix, "delete", Method::DELETE, &item),
    ];
    tracing::info!(prefix = route_name_prefix, base = %base, "registered MapFish routes");
    (router.merge(routes), table)
}

/// Mount `GET base/schema.xsd` describing `resource`.
#[must_use]
pub fn register_xsd_route(
    router: Router,
    route_name_prefix: &str,
    base_url: &str,
    resource: MapfishResource,
) -> (Router, RouteInfo) {
    let path = format!("{}/schema.xsd", base_path(base_url));
    let routes = Router::new()
        .route(&path, get(handlers::xsd))
        .with_state(Arc::new(resource));
    let info = route_info(route_name_prefix, "xsd", Method::GET, &path);
    (router.merge(routes), info)
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request, StatusCode, header};
    use geojson::{Feature, FeatureCollection, GeoJson, Geometry};
    use papyrus_geo::{ColumnInfo, ColumnKind, MappingSchema};
    use papyrus_protocol::{MapfishRequest, ProtocolError};
    use serde_json::Value;
    use tower::ServiceExt as _;

    struct MockService {
        readonly: bool,
    }

    fn feature(id: i32) -> Feature {
        let mut f = Feature::from(Geometry::new(geojson::Value::Point(vec![1.0, 2.0])));
        f.id = Some(geojson::feature::Id::Number(id.into()));
        f.set_property("name", "alpha");
        f
    }

    fn collection() -> FeatureCollection {
        FeatureCollection {
            bbox: None,
            features: vec![feature(1)],
            foreign_members: None,
        }
    }

    #[async_trait]
    impl MapfishService for MockService {
        async fn count(&self, req: &MapfishRequest) -> Result<u64, ProtocolError> {
            Ok(if req.params.contains("name__eq") { 1 } else { 3 })
        }

        async fn read(
            &self,
            _req: &MapfishRequest,
            id: Option<String>,
        ) -> Result<GeoJson, ProtocolError> {
            match id.as_deref() {
                None => Ok(GeoJson::FeatureCollection(collection())),
                Some("1") => Ok(GeoJson::Feature(feature(1))),
                Some(other) => Err(ProtocolError::NotFound(other.to_owned())),
            }
        }

        async fn create(
            &self,
            req: &MapfishRequest,
        ) -> Result<Option<FeatureCollection>, ProtocolError> {
            if self.readonly {
                return Err(ProtocolError::MethodNotAllowed);
            }
            Ok((!req.body.is_empty()).then(collection))
        }

        async fn update(
            &self,
            _req: &MapfishRequest,
            id: String,
        ) -> Result<Feature, ProtocolError> {
            if self.readonly {
                return Err(ProtocolError::MethodNotAllowed);
            }
            match id.as_str() {
                "1" => Ok(feature(1)),
                _ => Err(ProtocolError::NotFound(id)),
            }
        }

        async fn delete(&self, _req: &MapfishRequest, id: String) -> Result<(), ProtocolError> {
            if self.readonly {
                return Err(ProtocolError::MethodNotAllowed);
            }
            match id.as_str() {
                "1" => Ok(()),
                _ => Err(ProtocolError::NotFound(id)),
            }
        }

        fn is_readonly(&self) -> bool {
            self.readonly
        }

        fn schema(&self) -> MappingSchema {
            MappingSchema {
                class_name: "Spot".to_owned(),
                columns: vec![ColumnInfo::new("name", ColumnKind::String { max_len: None })],
            }
        }
    }

    fn app(readonly: bool) -> (Router, RouteTable) {
        let resource = MapfishResource::new(Arc::new(MockService { readonly }))
            .with_renderers(&RendererRegistry::default());
        let (router, mut table) =
            register_routes(Router::new(), "spots", "/spots/", resource.clone());
        let (router, xsd) = register_xsd_route(router, "spots", "/spots", resource);
        table.push(xsd);
        (router, table)
    }

    async fn send(router: Router, method: &str, uri: &str, body: &str) -> axum::response::Response {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::from(body.to_owned()))
            .unwrap();
        router.oneshot(request).await.unwrap()
    }

    async fn text(resp: axum::response::Response) -> String {
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(body.to_vec()).unwrap()
    }

    #[test]
    fn route_table_names_and_paths() {
        let (_, table) = app(false);
        let rows: Vec<(&str, &str, &str)> = table
            .iter()
            .map(|r| (r.name.as_str(), r.method.as_str(), r.path.as_str()))
            .collect();
        assert_eq!(
            rows,
            [
                ("spots_read_many", "GET", "/spots"),
                ("spots_read_one", "GET", "/spots/{id}"),
                ("spots_count", "GET", "/spots/count"),
                ("spots_create", "POST", "/spots"),
                ("spots_update", "PUT", "/spots/{id}"),
                ("spots_delete", "DELETE", "/spots/{id}"),
                ("spots_xsd", "GET", "/spots/schema.xsd"),
            ]
        );
    }

    #[tokio::test]
    async fn read_many_returns_geojson() {
        let resp = send(app(false).0, "GET", "/spots", "").await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()[header::CONTENT_TYPE], "application/geo+json");
        let doc: Value = serde_json::from_str(&text(resp).await).unwrap();
        assert_eq!(doc["type"], "FeatureCollection");
        assert_eq!(doc["features"][0]["properties"]["name"], "alpha");
    }

    #[tokio::test]
    async fn read_many_with_jsonp_callback() {
        let resp = send(app(false).0, "GET", "/spots?callback=cb", "").await;
        assert_eq!(resp.headers()[header::CONTENT_TYPE], "text/javascript");
        let body = text(resp).await;
        assert!(body.starts_with("cb({\"type\":\"FeatureCollection\""));
        assert!(body.ends_with(");"));
    }

    #[tokio::test]
    async fn bad_jsonp_callback_is_rejected_before_the_service_runs() {
        let resp = send(app(false).0, "GET", "/spots?callback=x%3Balert(1)", "").await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let problem: Value = serde_json::from_str(&text(resp).await).unwrap();
        assert_eq!(problem["invalid-params"][0]["name"], "callback");

        // A read-only service would answer 405 if it were reached.
        let resp = send(app(true).0, "POST", "/spots?callback=%3Cscript%3E", "{}").await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn read_one_and_missing() {
        let resp = send(app(false).0, "GET", "/spots/1", "").await;
        assert_eq!(resp.status(), StatusCode::OK);
        let doc: Value = serde_json::from_str(&text(resp).await).unwrap();
        assert_eq!(doc["type"], "Feature");
        assert_eq!(doc["id"], 1);

        let resp = send(app(false).0, "GET", "/spots/2", "").await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            resp.headers()[header::CONTENT_TYPE],
            papyrus_errors::APPLICATION_PROBLEM_JSON
        );
        let problem: Value = serde_json::from_str(&text(resp).await).unwrap();
        assert_eq!(problem["status"], 404);
        assert_eq!(problem["instance"], "/spots/2");
    }

    #[tokio::test]
    async fn count_is_plain_text() {
        let resp = send(app(false).0, "GET", "/spots/count?name__eq=a&queryable=name", "").await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(
            resp.headers()[header::CONTENT_TYPE]
                .to_str()
                .unwrap()
                .starts_with("text/plain")
        );
        assert_eq!(text(resp).await, "1");
    }

    #[tokio::test]
    async fn create_returns_201() {
        let resp = send(app(false).0, "POST", "/spots", "{}").await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        let doc: Value = serde_json::from_str(&text(resp).await).unwrap();
        assert_eq!(doc["type"], "FeatureCollection");

        let resp = send(app(false).0, "POST", "/spots", "").await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        assert!(text(resp).await.is_empty());
    }

    #[tokio::test]
    async fn update_and_delete() {
        let resp = send(app(false).0, "PUT", "/spots/1", "{}").await;
        assert_eq!(resp.status(), StatusCode::OK);

        let resp = send(app(false).0, "DELETE", "/spots/1", "").await;
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);

        let resp = send(app(false).0, "DELETE", "/spots/9", "").await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn readonly_writes_are_405_with_allow() {
        for (method, uri) in [("POST", "/spots"), ("PUT", "/spots/1"), ("DELETE", "/spots/1")] {
            let resp = send(app(true).0, method, uri, "{}").await;
            assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED, "{method}");
            assert_eq!(resp.headers()[header::ALLOW], "GET, HEAD");
        }
        let resp = send(app(true).0, "GET", "/spots", "").await;
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn xsd_route() {
        let resp = send(app(false).0, "GET", "/spots/schema.xsd", "").await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()[header::CONTENT_TYPE], "application/xml");
        let body = text(resp).await;
        assert!(body.contains(r#"<xsd:complexType name="Spot">"#));
        assert!(body.contains(r#"<xsd:element name="name" type="xsd:string"/>"#));
    }
}
