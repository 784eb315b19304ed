//! Two-stage routing: an LLM source classifier followed by a
//! deterministic, rule-driven intent resolver.

pub mod classifier;
pub mod resolver;
mod types;

pub use classifier::SourceClassifier;
pub use resolver::{resolve, CONFIDENCE_GATE};
pub use types::{ClassificationResult, HandlerFamily, Intent, RoutingDecision, Source};
