//! Request pipeline
//!
//! A strictly forward state machine:
//!
//! ```text
//! SourceClassify -> AggregateRoute -> Dispatch -+-> WebHandle ----+
//!                                               +-> CodeHandle ---+-> Merge -> Done
//!                                               +-> PolicyHandle -+
//!                                               +-----------------+
//! ```
//!
//! Dispatch is the only branch point and is an exhaustive match over
//! [`Intent`]. Every path reaches Merge; nothing loops back.
//!
//! All collaborators live in [`PipelineContext`], built once and shared
//! read-only, so one [`Pipeline`] can serve many requests at once.

use crate::agents::{code, policy, supervisor, web};
use crate::config::{prompts, KeywordRuleTable, PromptStore, RouterConfig, Settings};
use crate::error::Result;
use crate::executor::CodeExecutor;
use crate::extract::StructuredExtractor;
use crate::llm::{LlmClient, LlmConfig, TextModel};
use crate::routing::{resolve, ClassificationResult, Intent, RoutingDecision, Source, SourceClassifier};
use crate::services::{SearchApi, SerpApiClient};
use serde::Serialize;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

/// Injected dependencies, read-only after construction
pub struct PipelineContext {
    pub model: Arc<dyn TextModel>,
    pub search: Arc<dyn SearchApi>,
    pub prompts: PromptStore,
    pub rules: KeywordRuleTable,
    pub extractor: StructuredExtractor,
    pub executor: CodeExecutor,
    pub settings: Settings,
    /// Parent of every per-request token
    pub cancel: CancellationToken,
}

impl PipelineContext {
    /// Wire the live HTTP clients from loaded configuration.
    pub fn from_config(config: RouterConfig, cancel: CancellationToken) -> Result<Self> {
        let model = LlmClient::new(LlmConfig::from_settings(&config.settings))?.with_cancel_token(cancel.clone());
        let search = SerpApiClient::new(&config.settings.search)?;
        let executor = CodeExecutor::new(&config.settings.executor)?;
        let extractor = StructuredExtractor::new(config.settings.extraction.turn_markers.clone());

        tracing::debug!(model = model.model(), workspace = %executor.workspace().display(), "pipeline wired");

        Ok(Self {
            model: Arc::new(model),
            search: Arc::new(search),
            prompts: config.prompts,
            rules: config.rules,
            extractor,
            executor,
            settings: config.settings,
            cancel,
        })
    }
}

/// Per-request record. Each field is filled by exactly one stage.
#[derive(Debug, Clone, Default)]
pub struct AgentState {
    pub user_input: String,
    /// Present after SourceClassify
    pub classification: Option<ClassificationResult>,
    /// Present after AggregateRoute
    pub decision: Option<RoutingDecision>,
    /// Present after WebHandle
    pub web_data: Option<String>,
    /// Present after CodeHandle
    pub code_data: Option<String>,
    /// Present after PolicyHandle
    pub policy_data: Option<String>,
    /// Present after Merge
    pub llm_output: Option<String>,
}

impl AgentState {
    pub fn new(user_input: impl Into<String>) -> Self {
        Self {
            user_input: user_input.into(),
            ..Self::default()
        }
    }
}

/// Pipeline stages; data needed by the next stage travels with it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Stage {
    SourceClassify,
    AggregateRoute(ClassificationResult),
    Dispatch(RoutingDecision),
    WebHandle(Intent),
    CodeHandle(Intent),
    PolicyHandle(Intent),
    Merge,
    Done,
}

/// The N-way branch. Adding an intent without a handler fails to compile.
pub fn dispatch(intent: Intent) -> Stage {
    match intent {
        Intent::FetchNews | Intent::FetchStocks | Intent::FetchJobs => Stage::WebHandle(intent),
        Intent::ReviewCode | Intent::ExplainCode | Intent::RefactorCode => Stage::CodeHandle(intent),
        Intent::CheckViolation | Intent::SummarizePolicy => Stage::PolicyHandle(intent),
        Intent::GeneralLookup => Stage::Merge,
    }
}

/// Entry-point result for one request
#[derive(Debug, Clone, Serialize)]
pub struct PipelineOutcome {
    pub request_id: Uuid,
    pub final_source: Source,
    pub final_intent: Intent,
    pub confidence: f64,
    pub web_data: Option<String>,
    pub code_data: Option<String>,
    pub policy_data: Option<String>,
    pub llm_output: String,
}

impl PipelineOutcome {
    fn from_state(request_id: Uuid, state: AgentState) -> Self {
        let decision = state.decision.unwrap_or(RoutingDecision {
            final_source: Source::General,
            final_intent: Intent::GeneralLookup,
        });
        Self {
            request_id,
            final_source: decision.final_source,
            final_intent: decision.final_intent,
            confidence: state.classification.unwrap_or_default().confidence,
            web_data: state.web_data,
            code_data: state.code_data,
            policy_data: state.policy_data,
            llm_output: state.llm_output.unwrap_or_default(),
        }
    }

    /// The populated handler result with its label, if any
    pub fn agent_data(&self) -> Option<(&'static str, &str)> {
        [
            ("Web Data", &self.web_data),
            ("Code Data", &self.code_data),
            ("Policy Data", &self.policy_data),
        ]
        .into_iter()
        .find_map(|(label, data)| data.as_deref().map(|d| (label, d)))
    }
}

/// Routing-only result (no handler, no merge)
#[derive(Debug, Clone, Copy, Serialize)]
pub struct RouteOutcome {
    pub classification: ClassificationResult,
    pub decision: RoutingDecision,
}

#[derive(Clone)]
pub struct Pipeline {
    ctx: Arc<PipelineContext>,
}

impl Pipeline {
    pub fn new(ctx: PipelineContext) -> Self {
        Self { ctx: Arc::new(ctx) }
    }

    pub fn context(&self) -> &PipelineContext {
        &self.ctx
    }

    /// Run one request to a final answer. Never fails: every stage degrades to a string.
    pub async fn run(&self, user_input: &str) -> PipelineOutcome {
        let request_id = Uuid::new_v4();
        let span = tracing::info_span!("request", id = %request_id);
        let state = self.drive(AgentState::new(user_input)).instrument(span).await;
        PipelineOutcome::from_state(request_id, state)
    }

    /// Classification and intent resolution only.
    pub async fn route(&self, user_input: &str) -> RouteOutcome {
        let span = tracing::info_span!("route", id = %Uuid::new_v4());
        async {
            let classification = self.classify(user_input).await;
            let decision = resolve(&classification, &user_input.to_lowercase(), &self.ctx.rules);
            RouteOutcome {
                classification,
                decision,
            }
        }
        .instrument(span)
        .await
    }

    async fn classify(&self, user_input: &str) -> ClassificationResult {
        let ctx = &*self.ctx;
        let system = match ctx.prompts.get(prompts::SOURCE_ROUTER) {
            Ok(system) => system,
            Err(e) => {
                tracing::warn!("{}, using default classification", e);
                return ClassificationResult::default();
            }
        };
        SourceClassifier::new(
            ctx.model.as_ref(),
            system,
            &ctx.extractor,
            ctx.settings.generation.max_tokens,
        )
        .classify(user_input)
        .await
    }

    async fn drive(&self, mut state: AgentState) -> AgentState {
        let ctx = &*self.ctx;
        let cancel = ctx.cancel.child_token();
        let mut stage = Stage::SourceClassify;

        loop {
            tracing::debug!(?stage, "entering stage");
            stage = match stage {
                Stage::SourceClassify => {
                    let classification = self.classify(&state.user_input).await;
                    state.classification = Some(classification);
                    Stage::AggregateRoute(classification)
                }
                Stage::AggregateRoute(classification) => {
                    let decision = resolve(&classification, &state.user_input.to_lowercase(), &ctx.rules);
                    state.decision = Some(decision);
                    Stage::Dispatch(decision)
                }
                Stage::Dispatch(decision) => dispatch(decision.final_intent),
                Stage::WebHandle(intent) => {
                    state.web_data = Some(web::handle(ctx, intent, &state.user_input).await);
                    Stage::Merge
                }
                Stage::CodeHandle(intent) => {
                    state.code_data = Some(code::handle(ctx, intent, &state.user_input, &cancel).await);
                    Stage::Merge
                }
                Stage::PolicyHandle(intent) => {
                    state.policy_data = Some(policy::handle(intent));
                    Stage::Merge
                }
                Stage::Merge => {
                    state.llm_output = Some(supervisor::merge(ctx, &state).await);
                    Stage::Done
                }
                Stage::Done => break,
            };
        }

        state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::HandlerFamily;

    #[test]
    fn dispatch_agrees_with_intent_families() {
        for intent in Intent::ALL {
            let stage = dispatch(intent);
            let expected = match intent.family() {
                Some(HandlerFamily::Web) => Stage::WebHandle(intent),
                Some(HandlerFamily::Code) => Stage::CodeHandle(intent),
                Some(HandlerFamily::Policy) => Stage::PolicyHandle(intent),
                None => Stage::Merge,
            };
            assert_eq!(stage, expected, "{intent}");
        }
    }

    #[test]
    fn outcome_reports_populated_agent_data() {
        let mut state = AgentState::new("q");
        state.policy_data = Some("[Policy Tool] ok".to_string());
        state.llm_output = Some("answer".to_string());
        let outcome = PipelineOutcome::from_state(Uuid::nil(), state);
        assert_eq!(outcome.agent_data(), Some(("Policy Data", "[Policy Tool] ok")));
        assert_eq!(outcome.final_intent, Intent::GeneralLookup);
        assert_eq!(outcome.llm_output, "answer");
    }

    #[test]
    fn outcome_serializes_absent_data_as_null() {
        let outcome = PipelineOutcome::from_state(Uuid::nil(), AgentState::new("q"));
        let json = serde_json::to_value(&outcome).unwrap();
        assert!(json["web_data"].is_null());
        assert_eq!(json["final_source"], "general");
        assert_eq!(json["final_intent"], "general_lookup");
    }
}
