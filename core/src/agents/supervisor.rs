//! Merge step: hand every handler result to the model and return its answer verbatim.

use crate::config::prompts;
use crate::error::Result;
use crate::pipeline::{AgentState, PipelineContext};
use serde::Serialize;

/// Everything the supervisor sees. Absent results serialize as `null`.
#[derive(Debug, Serialize)]
pub struct MergeContext<'a> {
    pub web_data: Option<&'a str>,
    pub code_data: Option<&'a str>,
    pub policy_data: Option<&'a str>,
    pub original_query: &'a str,
    pub final_intent: Option<&'static str>,
}

impl<'a> MergeContext<'a> {
    pub fn from_state(state: &'a AgentState) -> Self {
        Self {
            web_data: state.web_data.as_deref(),
            code_data: state.code_data.as_deref(),
            policy_data: state.policy_data.as_deref(),
            original_query: &state.user_input,
            final_intent: state.decision.map(|d| d.final_intent.as_str()),
        }
    }
}

pub fn build_user_prompt(state: &AgentState) -> Result<String> {
    let context = serde_json::to_string(&MergeContext::from_state(state))?;
    Ok(format!("Original Query: {}\nContext Data: {}", state.user_input, context))
}

async fn answer(ctx: &PipelineContext, state: &AgentState) -> Result<String> {
    let system = ctx.prompts.get(prompts::SUPERVISOR)?;
    let user = build_user_prompt(state)?;
    ctx.model
        .generate(system, &user, ctx.settings.generation.max_tokens)
        .await
}

/// The final answer. A model failure becomes the answer text itself.
pub async fn merge(ctx: &PipelineContext, state: &AgentState) -> String {
    match answer(ctx, state).await {
        Ok(text) => text,
        Err(e) => {
            tracing::error!(kind = e.kind(), "supervisor failed: {}", e);
            format!("[Supervisor] Could not produce a final answer ({}): {}", e.kind(), e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::{Intent, RoutingDecision, Source};
    use serde_json::Value;

    #[test]
    fn absent_results_are_explicit_nulls() {
        let mut state = AgentState::new("오늘 테슬라 주가 확인해봐");
        state.decision = Some(RoutingDecision {
            final_source: Source::Web,
            final_intent: Intent::FetchStocks,
        });
        state.web_data = Some("TODAY: N/A".to_string());

        let prompt = build_user_prompt(&state).unwrap();
        let (head, json) = prompt.split_once("\nContext Data: ").unwrap();
        assert_eq!(head, "Original Query: 오늘 테슬라 주가 확인해봐");

        let context: Value = serde_json::from_str(json).unwrap();
        assert_eq!(context["web_data"], "TODAY: N/A");
        assert!(context.get("code_data").unwrap().is_null());
        assert!(context.get("policy_data").unwrap().is_null());
        assert_eq!(context["final_intent"], "fetch_stocks");
        assert_eq!(context["original_query"], "오늘 테슬라 주가 확인해봐");
    }

    #[test]
    fn non_ascii_is_not_escaped() {
        let state = AgentState::new("뉴스 알려줘");
        let prompt = build_user_prompt(&state).unwrap();
        assert!(prompt.contains("\"original_query\":\"뉴스 알려줘\""));
        assert!(prompt.contains("\"final_intent\":null"));
    }
}
