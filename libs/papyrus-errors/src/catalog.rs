//! Static catalog of the problems a `MapFish` endpoint can return.

use crate::problem::Problem;
use http::StatusCode;

#[derive(Debug, Clone, Copy)]
pub struct ErrDef {
    pub status: u16,
    pub title: &'static str,
    pub code: &'static str,
    pub type_url: &'static str,
}

impl ErrDef {
    #[inline]
    #[must_use]
    pub fn as_problem(&self, detail: impl Into<String>) -> Problem {
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        Problem::new(status, self.title, detail.into())
            .with_code(self.code)
            .with_type(self.type_url)
    }

    /// Same as [`ErrDef::as_problem`] with the request path and trace id attached.
    #[must_use]
    pub fn with_context(
        &self,
        detail: impl Into<String>,
        instance: &str,
        trace_id: Option<String>,
    ) -> Problem {
        crate::finalize(self.as_problem(detail), instance, trace_id)
    }
}

pub const NOT_FOUND: ErrDef = ErrDef {
    status: 404,
    title: "Not Found",
    code: "PAPYRUS_NOT_FOUND",
    type_url: "urn:papyrus:problem:not-found",
};

pub const METHOD_NOT_ALLOWED: ErrDef = ErrDef {
    status: 405,
    title: "Method Not Allowed",
    code: "PAPYRUS_METHOD_NOT_ALLOWED",
    type_url: "urn:papyrus:problem:method-not-allowed",
};

pub const BAD_REQUEST: ErrDef = ErrDef {
    status: 400,
    title: "Bad Request",
    code: "PAPYRUS_BAD_REQUEST",
    type_url: "urn:papyrus:problem:bad-request",
};

pub const INTERNAL: ErrDef = ErrDef {
    status: 500,
    title: "Internal Server Error",
    code: "PAPYRUS_INTERNAL",
    type_url: "urn:papyrus:problem:internal",
};
