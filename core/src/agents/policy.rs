//! Policy handler. No document store is wired in, so answers are fixed.

use super::POLICY_TAG;
use crate::routing::Intent;

pub fn handle(intent: Intent) -> String {
    let message = match intent {
        Intent::CheckViolation => "Checked the request against the policy documents for violations.",
        Intent::SummarizePolicy => "Summarized the requested policy document.",
        other => {
            tracing::warn!(intent = %other, "policy handler received a non-policy intent");
            "Policy document search failed."
        }
    };
    format!("{} {}", POLICY_TAG, message)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn policy_intents_have_placeholders() {
        assert!(handle(Intent::CheckViolation).contains("violations"));
        assert!(handle(Intent::SummarizePolicy).starts_with(POLICY_TAG));
        assert!(handle(Intent::FetchNews).ends_with("search failed."));
    }
}
