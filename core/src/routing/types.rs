//! Routing vocabulary: sources, intents and the records passed between stages.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Coarse domain classification of a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Web,
    Code,
    Policy,
    General,
}

impl Source {
    pub const ALL: [Source; 4] = [Source::Web, Source::Code, Source::Policy, Source::General];

    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Web => "web",
            Source::Code => "code",
            Source::Policy => "policy",
            Source::General => "general",
        }
    }

    /// Intent used when the source is trusted but no keyword matched
    pub fn default_intent(&self) -> Intent {
        match self {
            Source::Web => Intent::FetchNews,
            Source::Code => Intent::ExplainCode,
            Source::Policy => Intent::SummarizePolicy,
            Source::General => Intent::GeneralLookup,
        }
    }
}

impl FromStr for Source {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "web" => Ok(Source::Web),
            "code" => Ok(Source::Code),
            "policy" => Ok(Source::Policy),
            "general" => Ok(Source::General),
            other => Err(format!("Unknown source: {}", other)),
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fine-grained action within a source. Closed set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    FetchNews,
    FetchStocks,
    FetchJobs,
    ReviewCode,
    ExplainCode,
    RefactorCode,
    CheckViolation,
    SummarizePolicy,
    GeneralLookup,
}

impl Intent {
    pub const ALL: [Intent; 9] = [
        Intent::FetchNews,
        Intent::FetchStocks,
        Intent::FetchJobs,
        Intent::ReviewCode,
        Intent::ExplainCode,
        Intent::RefactorCode,
        Intent::CheckViolation,
        Intent::SummarizePolicy,
        Intent::GeneralLookup,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::FetchNews => "fetch_news",
            Intent::FetchStocks => "fetch_stocks",
            Intent::FetchJobs => "fetch_jobs",
            Intent::ReviewCode => "review_code",
            Intent::ExplainCode => "explain_code",
            Intent::RefactorCode => "refactor_code",
            Intent::CheckViolation => "check_violation",
            Intent::SummarizePolicy => "summarize_policy",
            Intent::GeneralLookup => "general_lookup",
        }
    }

    /// Handler family this intent dispatches to. `None` goes straight to Merge.
    pub fn family(&self) -> Option<HandlerFamily> {
        match self {
            Intent::FetchNews | Intent::FetchStocks | Intent::FetchJobs => Some(HandlerFamily::Web),
            Intent::ReviewCode | Intent::ExplainCode | Intent::RefactorCode => {
                Some(HandlerFamily::Code)
            }
            Intent::CheckViolation | Intent::SummarizePolicy => Some(HandlerFamily::Policy),
            Intent::GeneralLookup => None,
        }
    }
}

impl FromStr for Intent {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Intent::ALL
            .iter()
            .copied()
            .find(|i| i.as_str() == wanted)
            .ok_or_else(|| format!("Unknown intent: {}", s.trim()))
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Group of handlers bound to a source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerFamily {
    Web,
    Code,
    Policy,
}

/// Output of the source classifier
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub source: Source,
    /// Always within [0, 1]
    pub confidence: f64,
}

impl ClassificationResult {
    pub fn new(source: Source, confidence: f64) -> Self {
        let confidence = if confidence.is_finite() {
            confidence.clamp(0.0, 1.0)
        } else {
            0.0
        };
        Self { source, confidence }
    }
}

impl Default for ClassificationResult {
    fn default() -> Self {
        Self {
            source: Source::General,
            confidence: 0.0,
        }
    }
}

/// Final routing decision, one per request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingDecision {
    pub final_source: Source,
    pub final_intent: Intent,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_intent_round_trips_its_name() {
        for intent in Intent::ALL {
            assert_eq!(intent.as_str().parse::<Intent>(), Ok(intent));
        }
    }

    #[test]
    fn families_cover_closed_set() {
        let web: Vec<_> = Intent::ALL
            .iter()
            .filter(|i| i.family() == Some(HandlerFamily::Web))
            .collect();
        assert_eq!(web.len(), 3);
        assert_eq!(Intent::GeneralLookup.family(), None);
        assert_eq!(Intent::CheckViolation.family(), Some(HandlerFamily::Policy));
    }

    #[test]
    fn source_defaults() {
        assert_eq!(Source::Web.default_intent(), Intent::FetchNews);
        assert_eq!(Source::Code.default_intent(), Intent::ExplainCode);
        assert_eq!(Source::Policy.default_intent(), Intent::SummarizePolicy);
        assert_eq!(Source::General.default_intent(), Intent::GeneralLookup);
    }

    #[test]
    fn source_parse_is_case_insensitive() {
        assert_eq!(" WEB ".parse::<Source>(), Ok(Source::Web));
        assert!("finance".parse::<Source>().is_err());
    }

    #[test]
    fn confidence_is_clamped() {
        assert_eq!(ClassificationResult::new(Source::Web, 1.7).confidence, 1.0);
        assert_eq!(ClassificationResult::new(Source::Web, -0.2).confidence, 0.0);
        assert_eq!(ClassificationResult::new(Source::Web, f64::NAN).confidence, 0.0);
    }
}
