//! Collaborator contracts consumed by the orchestrator: context lookup and the conversation log.

use crate::types::{ConversationContext, ConversationRecord};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Mutex;
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("conversation messages must not be blank")]
    EmptyMessage,
    #[error("SQLite: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON column: {0}")]
    Json(#[from] serde_json::Error),
    #[error("store lock poisoned")]
    Poisoned,
    #[error("{field} {value} outside {min}..={max}")]
    OutOfRange {
        field: &'static str,
        value: u8,
        min: u8,
        max: u8,
    },
}

#[async_trait]
pub trait ContextProvider: Send + Sync {
    /// Unknown users yield an all-empty context.
    async fn get_context(&self, user_id: &str) -> Result<ConversationContext, StoreError>;
}

#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Appends one exchange and returns its id. Both messages are stored trimmed.
    async fn append(
        &self,
        user_id: &str,
        user_message: &str,
        ai_response: &str,
    ) -> Result<String, StoreError>;
}

/// Trims both sides of an exchange, rejecting blanks.
pub fn validate_exchange<'a>(
    user_message: &'a str,
    ai_response: &'a str,
) -> Result<(&'a str, &'a str), StoreError> {
    let user_message = user_message.trim();
    let ai_response = ai_response.trim();
    if user_message.is_empty() || ai_response.is_empty() {
        return Err(StoreError::EmptyMessage);
    }
    Ok((user_message, ai_response))
}

/// Process-local store for tests and runs without a data directory.
#[derive(Default)]
pub struct MemoryStore {
    contexts: Mutex<HashMap<String, ConversationContext>>,
    conversations: Mutex<Vec<ConversationRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_context(&self, user_id: &str, context: ConversationContext) {
        if let Ok(mut map) = self.contexts.lock() {
            map.insert(user_id.to_string(), context);
        }
    }

    /// Insertion-ordered exchanges for one user.
    pub fn conversations(&self, user_id: &str) -> Vec<ConversationRecord> {
        self.conversations
            .lock()
            .map(|c| c.iter().filter(|r| r.user_id == user_id).cloned().collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl ContextProvider for MemoryStore {
    async fn get_context(&self, user_id: &str) -> Result<ConversationContext, StoreError> {
        let map = self.contexts.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(map.get(user_id).cloned().unwrap_or_default())
    }
}

#[async_trait]
impl ConversationStore for MemoryStore {
    async fn append(
        &self,
        user_id: &str,
        user_message: &str,
        ai_response: &str,
    ) -> Result<String, StoreError> {
        let (user_message, ai_response) = validate_exchange(user_message, ai_response)?;
        let id = Uuid::new_v4().to_string();
        let mut log = self.conversations.lock().map_err(|_| StoreError::Poisoned)?;
        log.push(ConversationRecord {
            id: id.clone(),
            user_id: user_id.to_string(),
            user_message: user_message.to_string(),
            ai_response: ai_response.to_string(),
            created_at: Utc::now().timestamp_millis(),
        });
        Ok(id)
    }
}
