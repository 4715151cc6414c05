use std::sync::Arc;

use axum::extract::{Path, RawQuery, State};
use axum::http::{StatusCode, Uri, header};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use geojson::GeoJson;
use papyrus_protocol::{MapfishRequest, Params, ProtocolError};
use papyrus_render::{GeoJsonError, GeoJsonValue, Rendered};

use crate::error::ApiError;
use crate::routes::MapfishResource;

type Res = State<Arc<MapfishResource>>;

fn render_error(err: &GeoJsonError, uri: &Uri) -> ApiError {
    match err {
        GeoJsonError::InvalidCallback { param, .. } => {
            ApiError::invalid_param(param, &err.to_string(), uri.path())
        }
        GeoJsonError::Serialize(_) => ApiError::internal(err, uri.path()),
    }
}

/// Parse the query string. A malformed JSONP callback is rejected here,
/// before the service runs.
fn request(
    res: &MapfishResource,
    uri: &Uri,
    query: Option<String>,
    body: Bytes,
) -> Result<MapfishRequest, ApiError> {
    let params = Params::parse(query.as_deref().unwrap_or_default()).map_err(|e| {
        ApiError::from_protocol(
            &ProtocolError::BadRequest(format!("invalid query string: {e}")),
            uri.path(),
        )
    })?;
    res.geojson
        .callback(&params)
        .map_err(|e| render_error(&e, uri))?;
    Ok(MapfishRequest::new(params, body))
}

fn respond(status: StatusCode, rendered: Rendered) -> Response {
    (
        status,
        [(header::CONTENT_TYPE, rendered.content_type)],
        rendered.body,
    )
        .into_response()
}

fn geojson(
    res: &MapfishResource,
    uri: &Uri,
    status: StatusCode,
    value: impl Into<GeoJsonValue>,
    params: &Params,
) -> Result<Response, ApiError> {
    let rendered = res
        .geojson
        .render(value, params, None)
        .map_err(|e| render_error(&e, uri))?;
    Ok(respond(status, rendered))
}

pub async fn read_many(
    State(res): Res,
    uri: Uri,
    RawQuery(query): RawQuery,
) -> Result<Response, ApiError> {
    let req = request(&res, &uri, query, Bytes::new())?;
    let doc = res
        .service
        .read(&req, None)
        .await
        .map_err(|e| ApiError::from_protocol(&e, uri.path()))?;
    geojson(&res, &uri, StatusCode::OK, doc, &req.params)
}

pub async fn read_one(
    State(res): Res,
    uri: Uri,
    Path(id): Path<String>,
    RawQuery(query): RawQuery,
) -> Result<Response, ApiError> {
    let req = request(&res, &uri, query, Bytes::new())?;
    let doc = res
        .service
        .read(&req, Some(id))
        .await
        .map_err(|e| ApiError::from_protocol(&e, uri.path()))?;
    geojson(&res, &uri, StatusCode::OK, doc, &req.params)
}

pub async fn count(
    State(res): Res,
    uri: Uri,
    RawQuery(query): RawQuery,
) -> Result<Response, ApiError> {
    let req = request(&res, &uri, query, Bytes::new())?;
    let n = res
        .service
        .count(&req)
        .await
        .map_err(|e| ApiError::from_protocol(&e, uri.path()))?;
    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        n.to_string(),
    )
        .into_response())
}

pub async fn create(
    State(res): Res,
    uri: Uri,
    RawQuery(query): RawQuery,
    body: Bytes,
) -> Result<Response, ApiError> {
    let req = request(&res, &uri, query, body)?;
    let created = res
        .service
        .create(&req)
        .await
        .map_err(|e| ApiError::from_protocol(&e, uri.path()))?;
    match created {
        Some(fc) => geojson(
            &res,
            &uri,
            StatusCode::CREATED,
            GeoJson::FeatureCollection(fc),
            &req.params,
        ),
        None => Ok(StatusCode::CREATED.into_response()),
    }
}

pub async fn update(
    State(res): Res,
    uri: Uri,
    Path(id): Path<String>,
    RawQuery(query): RawQuery,
    body: Bytes,
) -> Result<Response, ApiError> {
    let req = request(&res, &uri, query, body)?;
    let feature = res
        .service
        .update(&req, id)
        .await
        .map_err(|e| ApiError::from_protocol(&e, uri.path()))?;
    geojson(&res, &uri, StatusCode::OK, feature, &req.params)
}

pub async fn delete(
    State(res): Res,
    uri: Uri,
    Path(id): Path<String>,
    RawQuery(query): RawQuery,
) -> Result<Response, ApiError> {
    let req = request(&res, &uri, query, Bytes::new())?;
    res.service
        .delete(&req, id)
        .await
        .map_err(|e| ApiError::from_protocol(&e, uri.path()))?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

pub async fn xsd(State(res): Res, uri: Uri) -> Result<Response, ApiError> {
    let rendered = res
        .xsd
        .render(&res.service.schema())
        .map_err(|e| ApiError::internal(&e, uri.path()))?;
    Ok(respond(StatusCode::OK, rendered))
}
