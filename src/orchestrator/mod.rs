//! Top-level orchestration
//!
//! Sequences the whole pipeline: classify the request, then either the
//! tool-calling fast path or a planned multi-step workflow. Chain steps run
//! strictly sequentially with per-step context budgets, coordinated inputs,
//! and entity tracking. Instruction validation is advisory: a violation on
//! the fast path triggers exactly one retry with strengthened constraints.
//! Any error escaping the pipeline is answered by the fallback model, never
//! surfaced to the caller.

pub mod progress;
pub mod session;

pub use progress::{CoordinatorUpdate, NoopProgress, ProgressSink, StepComplete, StepStart};
pub use session::{ConversationState, SessionStore};

use crate::config::Config;
use crate::context::{ContextConfig, ConversationContextManager, ModelBudgetManager};
use crate::coordinator::{CoordinatedInput, StepCoordinator};
use crate::entities::{EntityKind, ReferenceResolver};
use crate::instructions::{parse_instructions, validate_against_instructions, ParsedInstructions};
use crate::intent::{quick_route, Complexity, IntentClassifier, QueryIntent};
use crate::planner::{heuristic_plan, DynamicPlanner, ExecutionPlan, PlannedStep, StepPurpose};
use crate::providers::{ModelRequest, ProviderError, ProviderRegistry};
use crate::tools::{ToolContext, ToolExecutor, ToolRegistry};
use crate::types::{
    ChainStepResult, ChatRequest, ChatResponse, Message, StepMetadata, StepOutputKind,
};
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

/// Model used for dynamic plan generation
const PLANNING_MODEL: &str = "gpt-4o";

pub struct Orchestrator {
    config: Config,
    providers: Arc<ProviderRegistry>,
    tools: Arc<ToolRegistry>,
    executor: ToolExecutor,
    classifier: IntentClassifier,
    planner: DynamicPlanner,
    coordinator: StepCoordinator,
    conversation_context: ConversationContextManager,
    model_budget: ModelBudgetManager,
    sessions: SessionStore,
}

impl Orchestrator {
    pub fn new(config: Config, providers: Arc<ProviderRegistry>, tools: Arc<ToolRegistry>) -> Self {
        let utility = config.utility_model.clone();
        Orchestrator {
            executor: ToolExecutor::new(Arc::clone(&tools)),
            classifier: IntentClassifier::new(Arc::clone(&providers), &utility),
            planner: DynamicPlanner::new(Arc::clone(&providers), PLANNING_MODEL),
            coordinator: StepCoordinator::new(Arc::clone(&providers), &utility),
            conversation_context: ConversationContextManager::new(Arc::clone(&providers), &utility),
            model_budget: ModelBudgetManager::new(Arc::clone(&providers), &utility),
            sessions: SessionStore::new(),
            config,
            providers,
            tools,
        }
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// Handle one chat request end to end. Never returns an error: the worst
    /// case is a single answer from the fallback model.
    pub async fn handle(&self, request: ChatRequest, progress: &dyn ProgressSink) -> ChatResponse {
        let session_id = request
            .session_id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        match self.run(&request, &session_id, progress).await {
            Ok(response) => response,
            Err(e) => {
                log::error!("[ORCH] Pipeline failed ({}), answering with fallback model", e);
                self.fallback_response(&request).await
            }
        }
    }

    async fn run(
        &self,
        request: &ChatRequest,
        session_id: &str,
        progress: &dyn ProgressSink,
    ) -> Result<ChatResponse, ProviderError> {
        self.sessions
            .with_state(session_id, |state| state.tracker.begin_turn());

        let parsed = parse_instructions(&request.message);
        let message = self.sessions.with_state(session_id, |state| {
            ReferenceResolver::resolve_all(&request.message, &parsed.references, &state.tracker)
        });
        if message != request.message {
            log::info!("[ORCH] Resolved references in request");
        }

        if let Some(hint) = quick_route(&message) {
            log::debug!(
                "[ORCH] Quick route suggests {} (confidence {:.2}), re-classifying anyway",
                hint.suggested_model,
                hint.confidence
            );
        }

        let mut intent = self.classifier.classify(&message, &request.context).await;
        if let Some(model) = &request.model {
            intent.suggested_model = model.clone();
        } else if let Some(preferred) = single_model_preference(&parsed) {
            log::info!("[ORCH] User named '{}', overriding suggested model", preferred);
            intent.suggested_model = preferred;
        }
        log::info!(
            "[ORCH] Intent: {} via {} (chain: {})",
            intent.query_type,
            intent.suggested_model,
            intent.requires_chain()
        );

        if intent.requires_chain() {
            self.run_chain(&message, request, intent, &parsed, session_id, progress)
                .await
        } else {
            self.run_fast_path(&message, request, intent, &parsed, session_id)
                .await
        }
    }

    // ------------------------------------------------------------------
    // Planned workflow path
    // ------------------------------------------------------------------

    async fn run_chain(
        &self,
        message: &str,
        request: &ChatRequest,
        intent: QueryIntent,
        parsed: &ParsedInstructions,
        session_id: &str,
        progress: &dyn ProgressSink,
    ) -> Result<ChatResponse, ProviderError> {
        let started = Instant::now();
        let history = &request.context.conversation_history;

        let plan = self.resolve_plan(message, &intent, history).await;
        let plan = if intent.needs_image_generation
            && !plan
                .steps
                .iter()
                .any(|s| s.purpose == StepPurpose::ImageGeneration)
        {
            log::warn!("[ORCH] Plan lacks an image step, injecting emergency image chain");
            emergency_image_chain(message)
        } else {
            plan
        };

        let mut results: Vec<ChainStepResult> = Vec::with_capacity(plan.len());
        for step in &plan.steps {
            progress.on_step_start(&StepStart {
                step: step.step,
                purpose: step.purpose,
                model: step.recommended_model.clone(),
                total_steps: plan.len(),
            });

            let input = match step.input_from {
                Some(source) => {
                    let coordinated = self
                        .coordinator
                        .coordinate(&results[source - 1], &plan.steps[source - 1], step, message)
                        .await;
                    if let Some(notes) = coordinated.notes() {
                        progress.on_coordinator_update(&CoordinatorUpdate {
                            notes: notes.to_string(),
                        });
                    }
                    let prev = &mut results[source - 1];
                    prev.metadata.extracted_for_next_step =
                        Some(coordinated.content().to_string());
                    prev.metadata.coordinator_notes = coordinated.notes().map(String::from);
                    Some(coordinated)
                }
                None => None,
            };

            // A step failure aborts the remaining chain and reaches the
            // top-level fallback.
            let result = self.execute_step(step, input.as_ref(), message, history).await?;
            progress.on_step_complete(&StepComplete {
                step: result.step,
                purpose: result.purpose,
                model: result.model.clone(),
                content: result.content.clone(),
                kind: result.kind,
                execution_time_ms: result.execution_time_ms,
                metadata: result.metadata.clone(),
            });

            if let Some(kind) = entity_kind_for_purpose(step.purpose) {
                self.sessions.with_state(session_id, |state| {
                    state.tracker.track(
                        kind,
                        result.content.clone(),
                        serde_json::json!({"step": result.step, "model": result.model}),
                    );
                });
            }
            results.push(result);
        }

        let implied_tools = implied_tool_names(&plan);
        let final_model = results
            .last()
            .map(|r| r.model.clone())
            .unwrap_or_else(|| intent.suggested_model.clone());
        let report = validate_against_instructions(parsed, &final_model, &implied_tools);
        if !report.valid {
            log::warn!("[ORCH] Chain violates instructions: {:?}", report.violations);
        }

        Ok(ChatResponse::chained(
            results,
            started.elapsed().as_millis() as u64,
            intent,
        ))
    }

    async fn resolve_plan(
        &self,
        message: &str,
        intent: &QueryIntent,
        history: &[Message],
    ) -> ExecutionPlan {
        if let Some(steps) = intent.chain_steps.clone() {
            let plan = ExecutionPlan {
                reasoning: "classifier-provided chain".to_string(),
                estimated_time_secs: 0,
                steps,
            };
            if plan.validate().is_ok() {
                return plan;
            }
            log::warn!("[ORCH] Classifier chain invalid, replanning");
        }

        let recent_start = history.len().saturating_sub(4);
        match self.planner.plan(message, intent, &history[recent_start..]).await {
            Ok(plan) => plan,
            Err(e) => {
                log::warn!("[PLANNER] Dynamic planning failed ({}), using heuristic plan", e);
                heuristic_plan(intent, message, &self.providers)
            }
        }
    }

    async fn execute_step(
        &self,
        step: &PlannedStep,
        input: Option<&CoordinatedInput>,
        user_message: &str,
        history: &[Message],
    ) -> Result<ChainStepResult, ProviderError> {
        let started = Instant::now();
        let context_config = ContextConfig::for_level(step.purpose.context_level());
        let managed = self
            .conversation_context
            .build(history, user_message, &context_config)
            .await;

        let mut prompt = String::new();
        if let Some(input) = input {
            prompt.push_str(&format!(
                "Input from the previous step:\n{}\n\n",
                input.content()
            ));
        }
        prompt.push_str(&format!(
            "Task: {}\n\nUser request: {}",
            step.instructions, user_message
        ));

        let mut messages = managed.messages;
        messages.push(Message::user(prompt.clone()));
        let window = self.model_budget.fit(&messages, &step.recommended_model).await;

        let request = ModelRequest::new(&step.recommended_model, window.messages);
        let response = match self.providers.invoke(request).await {
            Ok(response) => response,
            // One shrink attempt with history dropped, then propagate.
            Err(err) if err.is_context_too_large() => {
                log::warn!(
                    "[ORCH] Step {} overflowed {} context, retrying without history",
                    step.step,
                    step.recommended_model
                );
                let minimal = vec![Message::user(prompt)];
                let window = self.model_budget.fit(&minimal, &step.recommended_model).await;
                let retry = ModelRequest::new(&step.recommended_model, window.messages);
                self.providers.invoke(retry).await?
            }
            Err(err) => return Err(err),
        };

        let kind = step.purpose.output_kind();
        let content = match kind {
            StepOutputKind::Image => response
                .artifacts
                .first()
                .cloned()
                .unwrap_or_else(|| response.content.clone()),
            _ => response.content.clone(),
        };

        log::info!(
            "[ORCH] Step {} ({}) done in {}ms",
            step.step,
            step.purpose,
            started.elapsed().as_millis()
        );
        Ok(ChainStepResult {
            step: step.step,
            model: step.recommended_model.clone(),
            content,
            kind,
            purpose: step.purpose,
            execution_time_ms: started.elapsed().as_millis() as u64,
            metadata: StepMetadata {
                citations: response.citations,
                artifacts: response.artifacts,
                coordinator_notes: None,
                extracted_for_next_step: None,
            },
        })
    }

    // ------------------------------------------------------------------
    // Tool-calling fast path
    // ------------------------------------------------------------------

    async fn run_fast_path(
        &self,
        message: &str,
        request: &ChatRequest,
        intent: QueryIntent,
        parsed: &ParsedInstructions,
        session_id: &str,
    ) -> Result<ChatResponse, ProviderError> {
        let model = intent.suggested_model.clone();
        let level = if intent.complexity == Complexity::High {
            crate::context::ContextLevel::Full
        } else {
            crate::context::ContextLevel::Standard
        };
        let managed = self
            .conversation_context
            .build(
                &request.context.conversation_history,
                message,
                &ContextConfig::for_level(level),
            )
            .await;

        let mut messages = managed.messages;
        messages.push(Message::user(message.to_string()));
        let window = self.model_budget.fit(&messages, &model).await;

        let attempt = self
            .fast_attempt(&model, &window.messages, request, message, session_id, None)
            .await?;
        let report = validate_against_instructions(parsed, &model, &attempt.invoked_tools);
        if report.valid {
            return Ok(finish_single(attempt, &model, intent));
        }

        log::warn!(
            "[ORCH] Selection violates instructions ({:?}), retrying once",
            report.violations
        );
        match self
            .fast_attempt(&model, &window.messages, request, message, session_id, Some(&report))
            .await
        {
            Ok(retry) => {
                let retry_report =
                    validate_against_instructions(parsed, &model, &retry.invoked_tools);
                if retry_report.valid {
                    return Ok(finish_single(retry, &model, intent));
                }
                log::warn!(
                    "[ORCH] Retry still violates instructions ({:?}), keeping original result",
                    retry_report.violations
                );
                Ok(finish_single(attempt, &model, intent))
            }
            Err(e) => {
                log::warn!("[ORCH] Retry failed ({}), keeping original result", e);
                Ok(finish_single(attempt, &model, intent))
            }
        }
    }

    /// One fast-path round: invoke with tools, run any requested tool batch,
    /// then ask for the final answer over the tool results.
    async fn fast_attempt(
        &self,
        model: &str,
        base_messages: &[Message],
        request: &ChatRequest,
        message: &str,
        session_id: &str,
        constraints: Option<&crate::instructions::ValidationReport>,
    ) -> Result<FastAttempt, ProviderError> {
        let mut model_request = ModelRequest::new(model, base_messages.to_vec())
            .with_tools(self.tools.definitions());
        if let Some(report) = constraints {
            model_request = model_request
                .with_system(format!(
                    "You MUST honor the user's explicit directives. Previous attempt \
                     violated them:\n- {}\nFix every violation.",
                    report.violations.join("\n- ")
                ))
                .with_temperature(0.0);
        }

        let response = self.providers.invoke(model_request).await?;
        if !response.has_tool_calls() {
            return Ok(FastAttempt {
                content: response.content,
                metadata: None,
                invoked_tools: vec![],
            });
        }

        let context = ToolContext {
            session_id: Some(session_id.to_string()),
            user_id: request.context.user_id.clone(),
            user_message: message.to_string(),
        };
        let results = self.executor.execute_batch(&response.tool_calls, &context).await;
        let invoked_tools: Vec<String> = results.iter().map(|r| r.name.clone()).collect();

        self.sessions.with_state(session_id, |state| {
            for result in &results {
                if result.is_error {
                    continue;
                }
                let tag = result
                    .metadata
                    .as_ref()
                    .and_then(|m| m.get("type"))
                    .and_then(Value::as_str);
                if let Some(kind) = tag.and_then(entity_kind_for_tag) {
                    state.tracker.track(
                        kind,
                        result.content.clone(),
                        result.metadata.clone().unwrap_or(Value::Null),
                    );
                }
            }
        });

        // An image result is the primary payload, not model fodder
        if let Some(image) = results.iter().find(|r| {
            !r.is_error
                && r.metadata
                    .as_ref()
                    .and_then(|m| m.get("type"))
                    .and_then(Value::as_str)
                    == Some("image")
        }) {
            return Ok(FastAttempt {
                content: image.content.clone(),
                metadata: image.metadata.clone(),
                invoked_tools,
            });
        }

        let mut followup = base_messages.to_vec();
        if !response.content.is_empty() {
            followup.push(Message::assistant(response.content.clone()));
        }
        for result in &results {
            followup.push(Message::tool(format!("[{}] {}", result.name, result.content)));
        }
        let final_response = self
            .providers
            .invoke(ModelRequest::new(model, followup))
            .await?;

        Ok(FastAttempt {
            content: final_response.content,
            metadata: None,
            invoked_tools,
        })
    }

    // ------------------------------------------------------------------
    // Terminal fallback
    // ------------------------------------------------------------------

    async fn fallback_response(&self, request: &ChatRequest) -> ChatResponse {
        let intent = QueryIntent::safe_default(&self.config.fallback_model);
        let model_request = ModelRequest::new(
            &self.config.fallback_model,
            vec![Message::user(request.message.clone())],
        )
        .with_system("Answer the user's request helpfully and concisely.");

        match self.providers.invoke(model_request).await {
            Ok(response) => {
                ChatResponse::single(response.content, &self.config.fallback_model, intent)
            }
            Err(e) => {
                log::error!("[ORCH] Fallback model failed too: {}", e);
                ChatResponse::single(
                    "I wasn't able to process that request. Please try again.",
                    &self.config.fallback_model,
                    intent,
                )
            }
        }
    }
}

struct FastAttempt {
    content: String,
    metadata: Option<Value>,
    invoked_tools: Vec<String>,
}

fn finish_single(attempt: FastAttempt, model: &str, intent: QueryIntent) -> ChatResponse {
    ChatResponse::Single {
        content: attempt.content,
        model: model.to_string(),
        intent,
        metadata: attempt.metadata,
    }
}

/// When the user named exactly one model across all capability categories,
/// that model wins over the classifier's suggestion.
fn single_model_preference(parsed: &ParsedInstructions) -> Option<String> {
    let mut models = parsed.model_preferences.all();
    let first = models.next()?.clone();
    if models.all(|m| *m == first) {
        Some(first)
    } else {
        None
    }
}

/// Fixed 2-step chain used when image generation was requested but no plan
/// contains an image step.
fn emergency_image_chain(message: &str) -> ExecutionPlan {
    ExecutionPlan {
        reasoning: "emergency image chain".to_string(),
        estimated_time_secs: 20,
        steps: vec![
            PlannedStep {
                step: 1,
                purpose: StepPurpose::PromptEnhancement,
                recommended_model: "gpt-4o-mini".to_string(),
                instructions: format!(
                    "Rewrite the request as a rich, concrete image prompt. Request: {}",
                    message
                ),
                expected_output_schema: None,
                input_from: None,
            },
            PlannedStep {
                step: 2,
                purpose: StepPurpose::ImageGeneration,
                recommended_model: "gemini-2.5-flash-image".to_string(),
                instructions: "Generate the image from the enhanced prompt.".to_string(),
                expected_output_schema: None,
                input_from: Some(1),
            },
        ],
    }
}

fn entity_kind_for_purpose(purpose: StepPurpose) -> Option<EntityKind> {
    match purpose {
        StepPurpose::WebSearch => Some(EntityKind::SearchResult),
        StepPurpose::PromptEnhancement => Some(EntityKind::Prompt),
        StepPurpose::ImageGeneration => Some(EntityKind::Image),
        StepPurpose::CodeGeneration => Some(EntityKind::Code),
        StepPurpose::Reasoning => Some(EntityKind::Analysis),
        StepPurpose::Generation | StepPurpose::Composition => None,
    }
}

fn entity_kind_for_tag(tag: &str) -> Option<EntityKind> {
    match tag {
        "search" => Some(EntityKind::SearchResult),
        "image" => Some(EntityKind::Image),
        "code" => Some(EntityKind::Code),
        "analysis" => Some(EntityKind::Analysis),
        "explanation" => Some(EntityKind::Explanation),
        _ => None,
    }
}

/// Tool names a plan's purposes imply, for advisory validation of chains.
fn implied_tool_names(plan: &ExecutionPlan) -> Vec<String> {
    plan.steps
        .iter()
        .filter_map(|s| match s.purpose {
            StepPurpose::WebSearch => Some("web_search".to_string()),
            StepPurpose::ImageGeneration => Some("generate_image".to_string()),
            StepPurpose::CodeGeneration => Some("generate_code".to_string()),
            _ => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{ModelProvider, ModelResponse, ProviderFamily};
    use crate::types::RequestContext;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Returns a fixed body for every invocation and counts how often it was
    /// called.
    struct ScriptedProvider {
        family: ProviderFamily,
        content: String,
        artifacts: Vec<String>,
        calls: Arc<AtomicUsize>,
    }

    impl ScriptedProvider {
        fn new(family: ProviderFamily, content: &str) -> (Self, Arc<AtomicUsize>) {
            let calls = Arc::new(AtomicUsize::new(0));
            (
                ScriptedProvider {
                    family,
                    content: content.to_string(),
                    artifacts: vec![],
                    calls: Arc::clone(&calls),
                },
                calls,
            )
        }

        fn with_artifact(mut self, url: &str) -> Self {
            self.artifacts.push(url.to_string());
            self
        }
    }

    #[async_trait]
    impl ModelProvider for ScriptedProvider {
        fn family(&self) -> ProviderFamily {
            self.family
        }

        async fn invoke(&self, _request: ModelRequest) -> Result<ModelResponse, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(ModelResponse {
                content: self.content.clone(),
                tool_calls: vec![],
                citations: vec![],
                artifacts: self.artifacts.clone(),
                stop_reason: Some("end_turn".to_string()),
            })
        }
    }

    /// Rejects the first call as an overflow, answers the second.
    struct OverflowOnceProvider {
        family: ProviderFamily,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl ModelProvider for OverflowOnceProvider {
        fn family(&self) -> ProviderFamily {
            self.family
        }

        async fn invoke(&self, _request: ModelRequest) -> Result<ModelResponse, ProviderError> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                return Err(ProviderError::with_status(
                    "prompt exceeds maximum context length",
                    400,
                ));
            }
            Ok(ModelResponse {
                content: "recovered answer".to_string(),
                tool_calls: vec![],
                citations: vec![],
                artifacts: vec![],
                stop_reason: Some("end_turn".to_string()),
            })
        }
    }

    fn test_config() -> Config {
        Config {
            anthropic_api_key: None,
            openai_api_key: None,
            perplexity_api_key: None,
            gemini_api_key: None,
            utility_model: "gpt-4o-mini".to_string(),
            fallback_model: "gpt-4o-mini".to_string(),
        }
    }

    fn request(message: &str) -> ChatRequest {
        ChatRequest {
            message: message.to_string(),
            model: None,
            session_id: Some("test-session".to_string()),
            context: RequestContext::default(),
        }
    }

    #[tokio::test]
    async fn test_image_request_runs_two_step_chain() {
        let providers = Arc::new(ProviderRegistry::new());
        let (openai, _) = ScriptedProvider::new(
            ProviderFamily::OpenAi,
            r#"{"type": "image-generation", "needsImageGeneration": true, "needsChaining": true, "complexity": "low", "confidence": 0.9, "suggestedModel": "gpt-4o"}"#,
        );
        providers.register(Arc::new(openai));
        let (gemini, _) = ScriptedProvider::new(ProviderFamily::Gemini, "");
        providers.register(Arc::new(gemini.with_artifact("https://img.example/cat.png")));

        let tools = Arc::new(ToolRegistry::new());
        let orchestrator = Orchestrator::new(test_config(), providers, tools);

        let response = orchestrator
            .handle(request("generate an image of a cat in a garden"), &NoopProgress)
            .await;

        match response {
            ChatResponse::Chained { steps, .. } => {
                assert_eq!(steps.len(), 2);
                assert_eq!(steps[0].purpose, StepPurpose::PromptEnhancement);
                assert_eq!(steps[1].purpose, StepPurpose::ImageGeneration);
                assert_eq!(steps[1].kind, StepOutputKind::Image);
                assert_eq!(steps[1].content, "https://img.example/cat.png");
                assert!(steps[0].metadata.extracted_for_next_step.is_some());
            }
            ChatResponse::Single { .. } => panic!("expected a chained response"),
        }
    }

    #[tokio::test]
    async fn test_chain_steps_track_entities() {
        let providers = Arc::new(ProviderRegistry::new());
        let (openai, _) = ScriptedProvider::new(
            ProviderFamily::OpenAi,
            r#"{"type": "image-generation", "needsImageGeneration": true, "needsChaining": true, "suggestedModel": "gpt-4o"}"#,
        );
        providers.register(Arc::new(openai));
        let (gemini, _) = ScriptedProvider::new(ProviderFamily::Gemini, "");
        providers.register(Arc::new(gemini.with_artifact("https://img.example/alley.png")));

        let orchestrator = Orchestrator::new(
            test_config(),
            providers,
            Arc::new(ToolRegistry::new()),
        );
        orchestrator
            .handle(request("draw a neon cyberpunk alley"), &NoopProgress)
            .await;

        orchestrator.sessions().with_state("test-session", |state| {
            let prompt = state.tracker.most_recent(Some(EntityKind::Prompt));
            assert!(prompt.is_some(), "enhancement step should track a prompt entity");
            let image = state.tracker.most_recent(Some(EntityKind::Image)).unwrap();
            assert_eq!(image.content, "https://img.example/alley.png");
        });
    }

    #[tokio::test]
    async fn test_violation_retries_exactly_once() {
        let providers = Arc::new(ProviderRegistry::new());
        // Classifier + utility calls land on OpenAI
        let (openai, _) = ScriptedProvider::new(
            ProviderFamily::OpenAi,
            r#"{"type": "simple", "needsChaining": false, "complexity": "low", "confidence": 0.8, "suggestedModel": "claude-sonnet-4"}"#,
        );
        providers.register(Arc::new(openai));
        // The selected model never calls the mandatory tool
        let (anthropic, anthropic_calls) =
            ScriptedProvider::new(ProviderFamily::Anthropic, "Paris is the capital of France.");
        providers.register(Arc::new(anthropic));

        let orchestrator = Orchestrator::new(
            test_config(),
            Arc::clone(&providers),
            Arc::new(ToolRegistry::new()),
        );

        // "search the web" makes web_search mandatory; the mock never invokes
        // it, so the first attempt violates and exactly one retry follows.
        let response = orchestrator
            .handle(request("search the web for the capital of France"), &NoopProgress)
            .await;

        assert_eq!(
            anthropic_calls.load(Ordering::SeqCst),
            2,
            "one initial attempt plus exactly one retry"
        );
        assert_eq!(response.content(), "Paris is the capital of France.");
    }

    #[tokio::test]
    async fn test_unregistered_provider_falls_back() {
        let providers = Arc::new(ProviderRegistry::new());
        // Only OpenAI is live; classification steers to Anthropic, whose
        // invocation fails, so the pipeline ends at the fallback model.
        let (openai, _) = ScriptedProvider::new(
            ProviderFamily::OpenAi,
            r#"{"type": "reasoning", "needsChaining": false, "suggestedModel": "claude-sonnet-4"}"#,
        );
        providers.register(Arc::new(openai));

        let orchestrator = Orchestrator::new(
            test_config(),
            providers,
            Arc::new(ToolRegistry::new()),
        );
        let response = orchestrator
            .handle(request("why is the sky blue"), &NoopProgress)
            .await;

        match response {
            ChatResponse::Single { model, .. } => assert_eq!(model, "gpt-4o-mini"),
            ChatResponse::Chained { .. } => panic!("expected a single fallback response"),
        }
    }

    #[tokio::test]
    async fn test_progress_events_fire_per_step() {
        use parking_lot::Mutex;

        #[derive(Default)]
        struct Recording {
            started: Mutex<Vec<usize>>,
            completed: Mutex<Vec<usize>>,
        }
        impl ProgressSink for Recording {
            fn on_step_start(&self, event: &StepStart) {
                self.started.lock().push(event.step);
            }
            fn on_step_complete(&self, event: &StepComplete) {
                self.completed.lock().push(event.step);
            }
        }

        let providers = Arc::new(ProviderRegistry::new());
        let (openai, _) = ScriptedProvider::new(
            ProviderFamily::OpenAi,
            r#"{"type": "image-generation", "needsImageGeneration": true, "needsChaining": true, "suggestedModel": "gpt-4o"}"#,
        );
        providers.register(Arc::new(openai));
        let (gemini, _) = ScriptedProvider::new(ProviderFamily::Gemini, "");
        providers.register(Arc::new(gemini.with_artifact("https://img.example/x.png")));

        let orchestrator = Orchestrator::new(
            test_config(),
            providers,
            Arc::new(ToolRegistry::new()),
        );
        let sink = Recording::default();
        orchestrator.handle(request("draw a fox"), &sink).await;

        assert_eq!(*sink.started.lock(), vec![1, 2]);
        assert_eq!(*sink.completed.lock(), vec![1, 2]);
    }

    #[tokio::test]
    async fn test_step_overflow_shrinks_once_and_recovers() {
        let providers = Arc::new(ProviderRegistry::new());
        let calls = Arc::new(AtomicUsize::new(0));
        providers.register(Arc::new(OverflowOnceProvider {
            family: ProviderFamily::OpenAi,
            calls: Arc::clone(&calls),
        }));

        let orchestrator = Orchestrator::new(
            test_config(),
            providers,
            Arc::new(ToolRegistry::new()),
        );
        let step = PlannedStep {
            step: 1,
            purpose: StepPurpose::Generation,
            recommended_model: "gpt-4o".to_string(),
            instructions: "Answer the question".to_string(),
            expected_output_schema: None,
            input_from: None,
        };

        let result = orchestrator
            .execute_step(&step, None, "what is a monad", &[])
            .await
            .unwrap();
        assert_eq!(result.content, "recovered answer");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_emergency_chain_shape() {
        let plan = emergency_image_chain("draw a fox");
        assert_eq!(plan.len(), 2);
        assert_eq!(plan.steps[0].purpose, StepPurpose::PromptEnhancement);
        assert_eq!(plan.steps[1].purpose, StepPurpose::ImageGeneration);
        assert!(plan.validate().is_ok());
    }

    #[test]
    fn test_single_model_preference() {
        let parsed = parse_instructions("use sonar to check the forecast");
        assert_eq!(single_model_preference(&parsed), Some("sonar-pro".to_string()));

        let none = parse_instructions("what is a monad");
        assert_eq!(single_model_preference(&none), None);
    }
}
