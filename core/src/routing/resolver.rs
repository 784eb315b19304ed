//! Intent resolution
//!
//! Pure and deterministic: a confidence gate, a per-source default intent,
//! then first-match keyword refinement in rule-table order.

use super::{ClassificationResult, RoutingDecision, Source};
use crate::config::KeywordRuleTable;

/// Below this the classified source is not trusted at all
pub const CONFIDENCE_GATE: f64 = 0.35;

/// `user_input_lower` must already be lowercased.
pub fn resolve(
    classification: &ClassificationResult,
    user_input_lower: &str,
    table: &KeywordRuleTable,
) -> RoutingDecision {
    if classification.confidence < CONFIDENCE_GATE {
        tracing::info!(
            confidence = classification.confidence,
            "confidence below gate, routing to general lookup"
        );
        return RoutingDecision {
            final_source: Source::General,
            final_intent: Source::General.default_intent(),
        };
    }

    let source = classification.source;
    let final_intent = match table.first_match(source, user_input_lower) {
        Some(intent) => {
            tracing::debug!(%source, %intent, "keyword rule matched");
            intent
        }
        None => source.default_intent(),
    };

    tracing::info!(%source, %final_intent, "routing decided");
    RoutingDecision {
        final_source: source,
        final_intent,
    }
}
