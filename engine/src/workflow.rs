//! Request Workflow State Machine
//!
//! Sequences one request through: load memory → classify intent →
//! generate (with the quality-gated retry loop) → update memory →
//! finalize. Every request yields a well-formed `FinalOutput`: any
//! classification failure fails open to the companion intent, and any
//! structural generation failure degrades to the intent's fixed fallback
//! rather than surfacing an error.
//!
//! # Limits
//!
//! - Retries are bounded by `max_retries` per request (budget 1 means at
//!   most 2 generation attempts)
//! - Each LLM call is wrapped in a timeout
//! - Companion answers with conversational context are never retried and
//!   never served from or stored into the cache

use crate::cache::{CachedValue, ResponseCache, CLASSIFIER_NAMESPACE};
use crate::config::WorkflowSettings;
use crate::evaluator::{Evaluator, QualityThresholds};
use crate::generate;
use crate::intent::Intent;
use crate::llm::{LLMError, LLMProvider, Message};
use crate::response::{FinalOutput, ResponseDraft};
use crate::session::{SessionStore, Turn};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Default timeout for each LLM call in seconds
const DEFAULT_LLM_TIMEOUT_SECS: u64 = 60;

/// Transient per-request state threaded through the pipeline stages.
/// Owned by exactly one in-flight request and discarded at finalize.
#[derive(Debug)]
pub struct AgentState {
    pub query: String,
    pub session_id: String,
    pub intent: Intent,
    pub conversation_history: Vec<Turn>,
    pub draft: Option<ResponseDraft>,
    pub quality_score: f64,
    pub retry_count: usize,
}

impl AgentState {
    fn new(query: &str, session_id: &str, conversation_history: Vec<Turn>) -> Self {
        Self {
            query: query.to_string(),
            session_id: session_id.to_string(),
            intent: Intent::CompanionAnswer,
            conversation_history,
            draft: None,
            quality_score: 0.0,
            retry_count: 0,
        }
    }
}

/// The workflow engine. Shares its cache and session store across all
/// concurrent requests; everything else is per-request state.
pub struct Workflow {
    provider: Arc<dyn LLMProvider>,
    cache: ResponseCache,
    sessions: SessionStore,
    evaluator: Evaluator,
    config: WorkflowSettings,
    llm_timeout: Duration,
}

impl Workflow {
    pub fn new(provider: Arc<dyn LLMProvider>, config: WorkflowSettings) -> Self {
        let thresholds = QualityThresholds {
            dua: config.dua_threshold,
            companion: config.companion_threshold,
            video: config.video_threshold,
        };

        Self {
            provider,
            cache: ResponseCache::new(),
            sessions: SessionStore::new(config.session_window),
            evaluator: Evaluator::new(thresholds),
            config,
            llm_timeout: Duration::from_secs(DEFAULT_LLM_TIMEOUT_SECS),
        }
    }

    /// Override the per-call LLM timeout
    pub fn with_llm_timeout(mut self, llm_timeout: Duration) -> Self {
        self.llm_timeout = llm_timeout;
        self
    }

    /// Shared response cache (management surface)
    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    /// Shared session store (history/clear surface)
    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// Process one query end to end. Infallible by contract: every input
    /// yields a well-formed output envelope, even under total provider
    /// failure.
    pub async fn run(&self, query: &str, session_id: &str) -> FinalOutput {
        // LoadMemory
        let history = self.sessions.get_history(session_id);
        debug!(session_id, turns = history.len(), "loaded session memory");
        let mut state = AgentState::new(query, session_id, history);

        // Classify
        state.intent = self.classify(&state.query).await;
        info!(intent = %state.intent, "query classified");

        // Generate<Intent>, with the bounded quality retry loop
        self.generate(&mut state).await;

        // UpdateMemory
        self.update_memory(&state);

        // Finalize
        let draft = state
            .draft
            .unwrap_or_else(|| generate::fallback_draft(state.intent));
        FinalOutput::from_draft(&draft, state.quality_score)
    }

    /// Classify the query, consulting the classifier cache namespace
    /// first. Fails open to `CompanionAnswer` so classification can never
    /// block the pipeline.
    async fn classify(&self, query: &str) -> Intent {
        if let Some(CachedValue::Intent(intent)) = self.cache.get(CLASSIFIER_NAMESPACE, query) {
            return intent;
        }

        match self.call_provider(&generate::classifier_messages(query)).await {
            Ok(raw) => match generate::parse_intent_label(&raw) {
                Some(intent) => {
                    self.cache
                        .set(CLASSIFIER_NAMESPACE, query, CachedValue::Intent(intent));
                    intent
                }
                None => {
                    warn!("classifier output had no parseable label, defaulting");
                    Intent::CompanionAnswer
                }
            },
            Err(e) => {
                warn!(error = %e, "classification failed, defaulting");
                Intent::CompanionAnswer
            }
        }
    }

    /// Run the generator for the classified intent: cache short-circuit,
    /// then up to `max_retries + 1` attempts, then floor acceptance or
    /// fallback. The three attempt outcomes (success / low quality /
    /// structural failure) are handled as explicit branches.
    async fn generate(&self, state: &mut AgentState) {
        let intent = state.intent;

        // Memory-bearing answers must reflect conversational context, so
        // they bypass the cache in both directions and are never retried.
        let memory_bearing =
            intent == Intent::CompanionAnswer && !state.conversation_history.is_empty();

        if !memory_bearing {
            if let Some(CachedValue::Response(draft)) = self.cache.get(intent.as_str(), &state.query)
            {
                debug!(intent = %intent, "serving cached response");
                state.draft = Some(draft);
                state.quality_score = 1.0;
                return;
            }
        }

        let mut best: Option<(ResponseDraft, f64)> = None;

        loop {
            let attempt = state.retry_count + 1;
            let messages = generate::generator_messages(
                intent,
                &state.query,
                &state.conversation_history,
                self.config.prompt_history_turns,
                state.retry_count > 0,
            );

            let parsed = match self.call_provider(&messages).await {
                Ok(raw) => generate::parse_draft(intent, &raw),
                Err(e) => {
                    warn!(intent = %intent, attempt, error = %e, "generation failed");
                    None
                }
            };

            let Some(draft) = parsed else {
                // Structural failure: substitute the fixed fallback.
                // Fallbacks are never retried and never cached.
                warn!(intent = %intent, attempt, "structural failure, using fallback");
                state.draft = Some(generate::fallback_draft(intent));
                state.quality_score = self.config.fallback_quality_score;
                return;
            };

            let evaluation = self.evaluator.evaluate(&draft, &state.query);
            info!(
                intent = %intent,
                attempt,
                score = evaluation.score,
                threshold = evaluation.threshold,
                passed = evaluation.passed,
                "draft evaluated"
            );
            if !evaluation.issues.is_empty() {
                debug!(issues = ?evaluation.issues, "quality issues");
            }

            if evaluation.passed {
                if !memory_bearing {
                    self.cache.set(
                        intent.as_str(),
                        &state.query,
                        CachedValue::Response(draft.clone()),
                    );
                }
                state.draft = Some(draft);
                state.quality_score = evaluation.score;
                return;
            }

            if best.as_ref().map_or(true, |(_, s)| evaluation.score > *s) {
                best = Some((draft, evaluation.score));
            }

            if state.retry_count < self.config.max_retries && !memory_bearing {
                state.retry_count += 1;
                continue;
            }

            // Retry budget exhausted: accept the best draft at the
            // secondary floor, otherwise demote to the fallback.
            let (best_draft, best_score) =
                best.unwrap_or_else(|| (generate::fallback_draft(intent), 0.0));
            if best_score >= self.config.acceptance_floor {
                info!(intent = %intent, score = best_score, "accepting best draft at floor");
                state.draft = Some(best_draft);
                state.quality_score = best_score;
            } else {
                info!(intent = %intent, score = best_score, "below floor, using fallback");
                state.draft = Some(generate::fallback_draft(intent));
                state.quality_score = self.config.fallback_quality_score;
            }
            return;
        }
    }

    /// Append this request's turns and write back the bounded history.
    /// Only companion answers contribute an assistant turn; dua and video
    /// payloads do not appear in conversational context.
    fn update_memory(&self, state: &AgentState) {
        let mut history = state.conversation_history.clone();
        history.push(Turn::user(&state.query));

        if state.intent == Intent::CompanionAnswer {
            if let Some(ResponseDraft::Companion(answer)) = &state.draft {
                history.push(Turn::assistant(&answer.text));
            }
        }

        self.sessions.save_history(&state.session_id, history);
    }

    async fn call_provider(&self, messages: &[Message]) -> Result<String, LLMError> {
        match timeout(self.llm_timeout, self.provider.generate(messages)).await {
            Ok(result) => result,
            Err(_) => Err(LLMError::Timeout),
        }
    }
}
