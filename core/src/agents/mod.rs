//! Handler families and the supervisor
//!
//! Handlers never return errors. Whatever goes wrong is folded into a
//! failure-tagged string so the pipeline always reaches the merge step.

pub mod code;
pub mod policy;
pub mod supervisor;
pub mod web;

use crate::error::RouterError;

pub const WEB_TAG: &str = "[Web API]";
pub const CODE_TAG: &str = "[Code Tool]";
pub const POLICY_TAG: &str = "[Policy Tool]";

/// `"<tag> <what> failed (<kind>): <error>"`
pub fn failure(tag: &str, what: &str, error: &RouterError) -> String {
    tracing::error!(kind = error.kind(), "{} failed: {}", what, error);
    format!("{} {} failed ({}): {}", tag, what, error.kind(), error)
}
