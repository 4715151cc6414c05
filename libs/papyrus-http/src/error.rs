use axum::http::{HeaderValue, header};
use axum::response::{IntoResponse, Response};
use papyrus_errors::catalog::{BAD_REQUEST, INTERNAL, METHOD_NOT_ALLOWED, NOT_FOUND};
use papyrus_errors::{InvalidParam, Problem};
use papyrus_protocol::{ProtocolError, READONLY_ALLOW};

/// A failed request, rendered as Problem Details.
#[derive(Debug)]
pub struct ApiError {
    problem: Problem,
    allow: Option<&'static str>,
}

fn current_trace_id() -> Option<String> {
    tracing::Span::current()
        .id()
        .map(|id| id.into_u64().to_string())
}

impl ApiError {
    /// Map a protocol error for the request at `instance`.
    ///
    /// Client errors are logged at `warn`, everything else at `error`
    /// with a generic detail.
    #[must_use]
    pub fn from_protocol(err: &ProtocolError, instance: &str) -> Self {
        let trace_id = current_trace_id();
        if err.is_client_error() {
            tracing::warn!(error = %err, instance, "request rejected");
        } else {
            tracing::error!(error = ?err, instance, "request failed");
        }

        let problem = match err {
            ProtocolError::NotFound(_) => NOT_FOUND.with_context(err.to_string(), instance, trace_id),
            ProtocolError::MethodNotAllowed => {
                return Self {
                    problem: METHOD_NOT_ALLOWED.with_context(err.to_string(), instance, trace_id),
                    allow: Some(READONLY_ALLOW),
                };
            }
            ProtocolError::BadRequest(_) | ProtocolError::InvalidFeature(_) => {
                BAD_REQUEST.with_context(err.to_string(), instance, trace_id)
            }
            ProtocolError::Filter(f) if f.is_client_error() => {
                let problem = BAD_REQUEST.with_context(err.to_string(), instance, trace_id);
                match f.param() {
                    Some(param) => problem.with_invalid_param(InvalidParam::new(param, f.to_string())),
                    None => problem,
                }
            }
            ProtocolError::Filter(_)
            | ProtocolError::Record(_)
            | ProtocolError::Hook(_)
            | ProtocolError::Database(_) => {
                INTERNAL.with_context("An internal error occurred", instance, trace_id)
            }
        };
        Self {
            problem,
            allow: None,
        }
    }

    /// A 400 naming the offending query parameter.
    #[must_use]
    pub fn invalid_param(param: &str, reason: &str, instance: &str) -> Self {
        tracing::warn!(param, reason, instance, "request rejected");
        Self {
            problem: BAD_REQUEST
                .with_context(reason, instance, current_trace_id())
                .with_invalid_param(InvalidParam::new(param, reason)),
            allow: None,
        }
    }

    /// A 500 that is not a protocol outcome, e.g. a renderer failure.
    #[must_use]
    pub fn internal(err: &dyn std::error::Error, instance: &str) -> Self {
        tracing::error!(error = %err, instance, "response rendering failed");
        Self {
            problem: INTERNAL.with_context(
                "An internal error occurred",
                instance,
                current_trace_id(),
            ),
            allow: None,
        }
    }

    #[must_use]
    pub fn problem(&self) -> &Problem {
        &self.problem
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut resp = self.problem.into_response();
        if let Some(allow) = self.allow {
            resp.headers_mut()
                .insert(header::ALLOW, HeaderValue::from_static(allow));
        }
        resp
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use papyrus_protocol::FilterError;

    #[test]
    fn not_found_maps_to_404() {
        let err = ApiError::from_protocol(&ProtocolError::NotFound("7".to_owned()), "/spots/7");
        assert_eq!(err.problem().status, StatusCode::NOT_FOUND);
        assert_eq!(err.problem().instance, "/spots/7");
        assert_eq!(err.problem().code, "PAPYRUS_NOT_FOUND");
    }

    #[test]
    fn readonly_sets_allow_header() {
        let resp = ApiError::from_protocol(&ProtocolError::MethodNotAllowed, "/spots").into_response();
        assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(resp.headers()[header::ALLOW], "GET, HEAD");
        assert_eq!(
            resp.headers()[header::CONTENT_TYPE],
            papyrus_errors::APPLICATION_PROBLEM_JSON
        );
    }

    #[test]
    fn filter_errors_name_the_parameter() {
        let err = ProtocolError::Filter(FilterError::InvalidParam {
            param: "bbox",
            reason: "expected 4 numbers".to_owned(),
        });
        let api = ApiError::from_protocol(&err, "/spots");
        assert_eq!(api.problem().status, StatusCode::BAD_REQUEST);
        let params = api.problem().invalid_params.as_ref().unwrap();
        assert_eq!(params[0].name, "bbox");
    }

    #[test]
    fn invalid_param_is_400_with_name() {
        let api = ApiError::invalid_param("callback", "not a name", "/spots");
        assert_eq!(api.problem().status, StatusCode::BAD_REQUEST);
        assert_eq!(api.problem().detail, "not a name");
        let params = api.problem().invalid_params.as_ref().unwrap();
        assert_eq!(params[0].name, "callback");
    }

    #[test]
    fn setup_errors_are_internal() {
        let err = ProtocolError::Filter(FilterError::NoGeometryColumn("Spot".to_owned()));
        let api = ApiError::from_protocol(&err, "/spots");
        assert_eq!(api.problem().status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(api.problem().detail, "An internal error occurred");

        let err = ProtocolError::Hook(anyhow::anyhow!("secret detail"));
        let api = ApiError::from_protocol(&err, "/spots");
        assert_eq!(api.problem().status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!api.problem().detail.contains("secret"));
    }
}
