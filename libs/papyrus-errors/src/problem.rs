//! RFC 9457 Problem Details, the error body of every Papyrus endpoint.

use http::StatusCode;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Content type for Problem Details as per RFC 9457.
pub const APPLICATION_PROBLEM_JSON: &str = "application/problem+json";

#[allow(clippy::trivially_copy_pass_by_ref)] // serde requires &T signature
fn serialize_status_code<S>(status: &StatusCode, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_u16(status.as_u16())
}

fn deserialize_status_code<'de, D>(deserializer: D) -> Result<StatusCode, D::Error>
where
    D: Deserializer<'de>,
{
    let code = u16::deserialize(deserializer)?;
    StatusCode::from_u16(code).map_err(serde::de::Error::custom)
}

/// RFC 9457 Problem Details object.
///
/// `status` travels as a plain number on the wire. Optional members are
/// omitted when empty so a bare 404 stays a small document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[must_use]
pub struct Problem {
    #[serde(rename = "type")]
    pub type_url: String,
    pub title: String,
    #[serde(
        serialize_with = "serialize_status_code",
        deserialize_with = "deserialize_status_code"
    )]
    pub status: StatusCode,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub detail: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub instance: String,
    /// Machine-readable code from the catalog, e.g. `PAPYRUS_NOT_FOUND`.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,
    /// Query parameters that could not be interpreted.
    #[serde(
        rename = "invalid-params",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub invalid_params: Option<Vec<InvalidParam>>,
}

/// One rejected request parameter (`invalid-params` extension member).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvalidParam {
    pub name: String,
    pub reason: String,
}

impl InvalidParam {
    #[must_use]
    pub fn new(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            reason: reason.into(),
        }
    }
}

impl Problem {
    pub fn new(status: StatusCode, title: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            type_url: "about:blank".to_owned(),
            title: title.into(),
            status,
            detail: detail.into(),
            instance: String::new(),
            code: String::new(),
            trace_id: None,
            invalid_params: None,
        }
    }

    pub fn with_type(mut self, type_url: impl Into<String>) -> Self {
        self.type_url = type_url.into();
        self
    }

    pub fn with_instance(mut self, uri: impl Into<String>) -> Self {
        self.instance = uri.into();
        self
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = code.into();
        self
    }

    pub fn with_trace_id(mut self, id: impl Into<String>) -> Self {
        self.trace_id = Some(id.into());
        self
    }

    pub fn with_invalid_param(mut self, param: InvalidParam) -> Self {
        self.invalid_params.get_or_insert_with(Vec::new).push(param);
        self
    }
}

#[cfg(feature = "axum")]
impl axum::response::IntoResponse for Problem {
    fn into_response(self) -> axum::response::Response {
        use axum::http::HeaderValue;

        let status = self.status;
        let mut resp = axum::Json(self).into_response();
        *resp.status_mut() = status;
        resp.headers_mut().insert(
            axum::http::header::CONTENT_TYPE,
            HeaderValue::from_static(APPLICATION_PROBLEM_JSON),
        );
        resp
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn builder_collects_invalid_params() {
        let p = Problem::new(StatusCode::BAD_REQUEST, "Bad Request", "bad bbox")
            .with_code("PAPYRUS_BAD_REQUEST")
            .with_instance("/spots")
            .with_invalid_param(InvalidParam::new("bbox", "expected 4 numbers"))
            .with_invalid_param(InvalidParam::new("epsg", "not an integer"));

        assert_eq!(p.status, StatusCode::BAD_REQUEST);
        assert_eq!(p.code, "PAPYRUS_BAD_REQUEST");
        assert_eq!(p.instance, "/spots");
        let params = p.invalid_params.unwrap();
        assert_eq!(params.len(), 2);
        assert_eq!(params[0].name, "bbox");
    }

    #[test]
    fn empty_members_are_omitted() {
        let p = Problem::new(StatusCode::NOT_FOUND, "Not Found", "");
        let json: serde_json::Value = serde_json::to_value(&p).unwrap();
        assert_eq!(json["status"], 404);
        assert_eq!(json["type"], "about:blank");
        assert!(json.get("detail").is_none());
        assert!(json.get("trace_id").is_none());
        assert!(json.get("invalid-params").is_none());
    }

    #[test]
    fn deserializes_status_from_u16() {
        let json = r#"{"type":"about:blank","title":"Method Not Allowed","status":405}"#;
        let p: Problem = serde_json::from_str(json).unwrap();
        assert_eq!(p.status, StatusCode::METHOD_NOT_ALLOWED);
        assert!(p.detail.is_empty());
    }
}
