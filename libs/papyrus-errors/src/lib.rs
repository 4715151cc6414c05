//! Error model shared by the Papyrus HTTP layer.
//!
//! - RFC 9457 Problem Details (`Problem`)
//! - the static problem catalog (`ErrDef` and its constants)
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub mod catalog;
pub mod problem;

pub use catalog::ErrDef;
pub use problem::{APPLICATION_PROBLEM_JSON, InvalidParam, Problem};

/// Attach the request path and, when known, the trace id to a Problem.
#[must_use]
pub fn finalize(mut p: Problem, instance: &str, trace_id: Option<String>) -> Problem {
    p = p.with_instance(instance);
    if let Some(tid) = trace_id {
        p = p.with_trace_id(tid);
    }
    p
}
