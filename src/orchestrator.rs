//! Public entry point for AI generation.
//!
//! Every use case funnels through [`Orchestrator::generate`]: guard check, prompt
//! composition, model call, structured parsing. Any failure along the live path
//! drops to the deterministic fallback, so callers never see "model unavailable".
//! Only storage failures and invalid caller input surface as errors.

use crate::fallback;
use crate::guard::{AvailabilityGuard, GuardState, ModelEndpoint};
use crate::logging::Diagnostics;
use crate::prompts;
use crate::storage::ENERGY_RANGE;
use crate::provider::{ChatOptions, ModelError, ModelProvider};
use crate::store::{ContextProvider, ConversationStore, StoreError};
use crate::structured;
use crate::types::{
    ConversationContext, GenerationRequest, GenerationResult, MealSuggestion, MindfulPractice,
    StructuredHint, UseCase,
};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::oneshot;
use tracing::{debug, info, Instrument};

#[derive(Error, Debug)]
pub enum OrchestratorError {
    #[error("invalid input: {0}")]
    InputInvalid(String),
    #[error("storage failure: {0}")]
    Storage(#[from] StoreError),
    #[error("request cancelled")]
    Cancelled,
}

#[derive(Clone, Debug, Serialize)]
pub struct ServiceStatus {
    pub state: GuardState,
    pub endpoint: ModelEndpoint,
}

pub struct Orchestrator {
    model: Arc<dyn ModelProvider>,
    guard: AvailabilityGuard,
    context: Arc<dyn ContextProvider>,
    store: Arc<dyn ConversationStore>,
    options: ChatOptions,
    diagnostics: Diagnostics,
}

impl Orchestrator {
    /// Starts degraded; call [`Orchestrator::initialize`] to probe the model.
    pub fn new(
        model: Arc<dyn ModelProvider>,
        context: Arc<dyn ContextProvider>,
        store: Arc<dyn ConversationStore>,
        options: ChatOptions,
        diagnostics: Diagnostics,
    ) -> Self {
        Self {
            model,
            guard: AvailabilityGuard::new(),
            context,
            store,
            options,
            diagnostics,
        }
    }

    /// Probes the model endpoint. Also the manual re-probe after degradation.
    pub async fn initialize(&self) -> GuardState {
        self.guard
            .probe(self.model.as_ref())
            .instrument(self.diagnostics.span().clone())
            .await
    }

    pub fn status(&self) -> ServiceStatus {
        ServiceStatus {
            state: self.guard.state(),
            endpoint: self.guard.endpoint(self.model.as_ref()),
        }
    }

    pub async fn generate(
        &self,
        request: &GenerationRequest,
        context: &ConversationContext,
    ) -> GenerationResult {
        let use_case = request.use_case;
        let blank_text = request
            .free_text
            .as_deref()
            .map_or(true, |t| t.trim().is_empty());
        if use_case.requires_free_text() && blank_text {
            debug!(use_case = use_case.as_str(), "blank input; inviting user to share more");
            return GenerationResult::Text(fallback::INVITATION.to_string());
        }
        if !self.guard.is_live() {
            debug!(use_case = use_case.as_str(), "guard degraded; skipping live path");
            return fallback_result(request);
        }
        match self
            .live(request, context)
            .instrument(self.diagnostics.span().clone())
            .await
        {
            Some(result) => result,
            None => fallback_result(request),
        }
    }

    async fn live(
        &self,
        request: &GenerationRequest,
        context: &ConversationContext,
    ) -> Option<GenerationResult> {
        let use_case = request.use_case.as_str();
        let messages = prompts::compose(request, context);
        let text = match self.model.complete(messages, &self.options).await {
            Ok(text) if !text.trim().is_empty() => text.trim().to_string(),
            Ok(_) => {
                self.diagnostics
                    .absorbed(use_case, "complete", &ModelError::EmptyOutput);
                return None;
            }
            Err(e) => {
                // Empty output leaves the guard as it is.
                if !matches!(e, ModelError::EmptyOutput) {
                    self.guard.mark_degraded(&e);
                }
                self.diagnostics.absorbed(use_case, "complete", &e);
                return None;
            }
        };
        let result = match request.structured_hint {
            None => GenerationResult::Text(text),
            Some(StructuredHint::Meals) => match structured::parse_meals(&text) {
                Ok(meals) => GenerationResult::Meals(meals),
                Err(e) => {
                    self.diagnostics.absorbed(use_case, "parse", &e);
                    return None;
                }
            },
            Some(StructuredHint::Practices) => match structured::parse_practices(&text) {
                Ok(practices) => GenerationResult::Practices(practices),
                Err(e) => {
                    self.diagnostics.absorbed(use_case, "parse", &e);
                    return None;
                }
            },
        };
        debug!(use_case, "served live generation");
        Some(result)
    }

    /// Responds to a chat message and appends the exchange to the conversation log.
    pub async fn chat(&self, user_id: &str, message: &str) -> Result<String, OrchestratorError> {
        let message = message.trim();
        if message.is_empty() {
            // Nothing to persist and nothing to ask the model.
            return Ok(fallback::INVITATION.to_string());
        }
        let context = self.context.get_context(user_id).await?;
        let request = GenerationRequest::new(UseCase::Chat).with_text(message);
        let reply = self.text_for(&request, &context).await;
        let id = self.store.append(user_id, message, &reply).await?;
        debug!(user_id, conversation_id = %id, "chat exchange saved");
        Ok(reply)
    }

    /// Like [`Orchestrator::chat`], but abandons the request when `cancel` fires.
    ///
    /// A cancelled request drops the in-flight model call and writes nothing.
    pub async fn chat_cancellable(
        &self,
        user_id: &str,
        message: &str,
        cancel: oneshot::Receiver<()>,
    ) -> Result<String, OrchestratorError> {
        tokio::select! {
            result = self.chat(user_id, message) => result,
            Ok(()) = cancel => {
                info!(user_id, "chat request cancelled");
                Err(OrchestratorError::Cancelled)
            }
        }
    }

    pub async fn daily_insight(&self, user_id: &str) -> String {
        debug!(user_id, "daily insight requested");
        let request = GenerationRequest::new(UseCase::DailyInsight);
        self.text_for(&request, &ConversationContext::default()).await
    }

    pub async fn journal_reflection(&self, user_id: &str, content: &str) -> String {
        debug!(user_id, "journal reflection requested");
        let request = GenerationRequest::new(UseCase::JournalReflection).with_text(content);
        self.text_for(&request, &ConversationContext::default()).await
    }

    pub async fn weekly_summary(&self, user_id: &str) -> String {
        debug!(user_id, "weekly summary requested");
        let request = GenerationRequest::new(UseCase::WeeklySummary);
        self.text_for(&request, &ConversationContext::default()).await
    }

    /// Exactly two meals, live or fallback. Energy level must be 1..=5 when given.
    pub async fn meal_suggestions(
        &self,
        user_id: &str,
        mood: Option<&str>,
        energy_level: Option<u8>,
    ) -> Result<Vec<MealSuggestion>, OrchestratorError> {
        if let Some(level) = energy_level {
            if !ENERGY_RANGE.contains(&level) {
                return Err(OrchestratorError::InputInvalid(format!(
                    "energy level {} outside {:?}",
                    level, ENERGY_RANGE
                )));
            }
        }
        debug!(user_id, "meal suggestions requested");
        let request = GenerationRequest::new(UseCase::MealSuggestion)
            .with_mood(mood.map(str::to_string))
            .with_energy(energy_level);
        match self.generate(&request, &ConversationContext::default()).await {
            GenerationResult::Meals(meals) => Ok(meals),
            _ => Ok(structured::fallback_meals()),
        }
    }

    /// Exactly two practices, live or fallback.
    pub async fn mindful_practices(
        &self,
        user_id: &str,
        current_mood: Option<&str>,
    ) -> Vec<MindfulPractice> {
        debug!(user_id, "mindful practices requested");
        let request = GenerationRequest::new(UseCase::MindfulPractice)
            .with_mood(current_mood.map(str::to_string));
        match self.generate(&request, &ConversationContext::default()).await {
            GenerationResult::Practices(practices) => practices,
            _ => structured::fallback_practices(),
        }
    }

    async fn text_for(&self, request: &GenerationRequest, context: &ConversationContext) -> String {
        self.generate(request, context)
            .await
            .into_text()
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| {
                fallback::for_use_case(request.use_case, request.free_text.as_deref()).to_string()
            })
    }
}

fn fallback_result(request: &GenerationRequest) -> GenerationResult {
    match request.structured_hint {
        Some(StructuredHint::Meals) => GenerationResult::Meals(structured::fallback_meals()),
        Some(StructuredHint::Practices) => {
            GenerationResult::Practices(structured::fallback_practices())
        }
        None => GenerationResult::Text(
            fallback::for_use_case(request.use_case, request.free_text.as_deref()).to_string(),
        ),
    }
}
