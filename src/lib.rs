mod config;
mod fallback;
mod guard;
mod logging;
mod ollama;
mod orchestrator;
mod prompts;
mod provider;
mod storage;
mod store;
mod structured;
mod types;

pub use config::{Config, ConfigError};
pub use fallback::{classify, Bucket};
pub use guard::{AvailabilityGuard, GuardState, ModelEndpoint};
pub use logging::{Diagnostics, LogInitError};
pub use ollama::{ModelInfo, OllamaClient};
pub use orchestrator::{Orchestrator, OrchestratorError, ServiceStatus};
pub use prompts::{context_summary, STRUCTURED_ITEM_COUNT};
pub use provider::{ChatMessage, ChatOptions, ModelError, ModelProvider, ProbeReport, Role};
pub use storage::{SqliteStore, Storage};
pub use store::{ContextProvider, ConversationStore, MemoryStore, StoreError};
pub use structured::{fallback_meals, fallback_practices, ParseError};
pub use types::{
    ConversationContext, ConversationRecord, GenerationRequest, GenerationResult, Helpline,
    MealSuggestion, MindfulPractice, Mood, StructuredHint, UseCase, GROUNDING_TECHNIQUES,
    HELPLINES,
};

pub mod replies {
    //! Fixed fallback texts, exposed for callers that match on them.
    pub use crate::fallback::{DAILY_INSIGHT, GENERIC, INVITATION, WEEKLY_SUMMARY};
}

pub use logging::init as init_logging;

use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
    #[error("Logging error: {0}")]
    Logging(#[from] LogInitError),
    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),
    #[error("Companion error: {0}")]
    Companion(#[from] OrchestratorError),
}

/// Long-lived service objects shared by request handlers.
pub struct AppState {
    pub store: Arc<SqliteStore>,
    pub orchestrator: Arc<Orchestrator>,
}

impl AppState {
    /// Opens storage in the configured data dir and wires the orchestrator to Ollama.
    /// The model is not probed yet; see [`Orchestrator::initialize`].
    pub fn build(config: &Config, diagnostics: Diagnostics) -> Result<Self, AppError> {
        let storage = Storage::new(&config.data_dir)?;
        Ok(Self::with_storage(config, storage, diagnostics))
    }

    pub fn with_storage(config: &Config, storage: Storage, diagnostics: Diagnostics) -> Self {
        let store = Arc::new(SqliteStore::new(storage));
        let ollama = Arc::new(OllamaClient::new(
            config.ollama_url.clone(),
            config.model.clone(),
            config.probe_timeout(),
            config.request_timeout(),
        ));
        let orchestrator = Arc::new(Orchestrator::new(
            ollama,
            store.clone(),
            store.clone(),
            config.chat_options(),
            diagnostics,
        ));
        Self {
            store,
            orchestrator,
        }
    }
}
