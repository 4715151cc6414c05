use papyrus_geo::{RecordError, ValueError};
use sea_orm::DbErr;
use thiserror::Error;

/// `Allow` header value of a read-only resource.
pub const READONLY_ALLOW: &str = "GET, HEAD";

#[derive(Debug, Error, Clone, PartialEq)]
pub enum FilterError {
    #[error("queryable field `{0}` is not a mapped column")]
    UnknownField(String),

    #[error("invalid value for `{param}`: {source}")]
    InvalidValue {
        param: String,
        #[source]
        source: ValueError,
    },

    #[error("invalid `{param}` parameter: {reason}")]
    InvalidParam { param: &'static str, reason: String },

    #[error("mapping `{0}` has no geometry column")]
    NoGeometryColumn(String),

    #[error(
        "within-distance on a reprojected Oracle column needs `dim1` and `dim2` or `tol`"
    )]
    OracleParamsMissing,
}

impl FilterError {
    /// Whether the request, rather than the resource setup, is at fault.
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        !matches!(
            self,
            FilterError::NoGeometryColumn(_) | FilterError::OracleParamsMissing
        )
    }

    /// Name of the offending query parameter, if any.
    #[must_use]
    pub fn param(&self) -> Option<&str> {
        match self {
            FilterError::UnknownField(name) => Some(name.as_str()),
            FilterError::InvalidValue { param, .. } => Some(param.as_str()),
            FilterError::InvalidParam { param, .. } => Some(*param),
            FilterError::NoGeometryColumn(_) | FilterError::OracleParamsMissing => None,
        }
    }
}

/// Outcome of a protocol operation other than success.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("no feature with id `{0}`")]
    NotFound(String),

    #[error("resource is read-only")]
    MethodNotAllowed,

    #[error("{0}")]
    BadRequest(String),

    #[error(transparent)]
    Filter(#[from] FilterError),

    /// A feature in the request body cannot be written.
    #[error("invalid feature: {0}")]
    InvalidFeature(#[source] RecordError),

    /// A stored row cannot be read back as a feature.
    #[error("cannot read stored feature: {0}")]
    Record(#[source] RecordError),

    #[error("hook failed: {0}")]
    Hook(#[source] anyhow::Error),

    #[error(transparent)]
    Database(#[from] DbErr),
}

impl ProtocolError {
    /// Whether the error is the caller's fault (4xx).
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        match self {
            ProtocolError::NotFound(_)
            | ProtocolError::MethodNotAllowed
            | ProtocolError::BadRequest(_)
            | ProtocolError::InvalidFeature(_) => true,
            ProtocolError::Filter(e) => e.is_client_error(),
            ProtocolError::Record(_) | ProtocolError::Hook(_) | ProtocolError::Database(_) => {
                false
            }
        }
    }
}
