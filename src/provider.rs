//! Model provider trait for pluggable backends. Ollama implements this; tests use fakes.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChatOptions {
    pub temperature: f64,
    pub top_p: f64,
    pub num_predict: u32,
}

impl Default for ChatOptions {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            top_p: 0.9,
            num_predict: 500,
        }
    }
}

/// Result of a capability check against the endpoint.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ProbeReport {
    pub available: bool,
    pub models_offered: Vec<String>,
    /// Model that will serve completions, after any substitution.
    pub active_model: Option<String>,
}

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("model endpoint unreachable: {0}")]
    Unreachable(String),
    #[error("model request timed out")]
    Timeout,
    #[error("model endpoint returned {status}: {body}")]
    BadStatus { status: u16, body: String },
    #[error("malformed model payload: {0}")]
    Malformed(String),
    #[error("model returned empty output")]
    EmptyOutput,
}

impl ModelError {
    /// Short label used in log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            ModelError::Unreachable(_) => "unreachable",
            ModelError::Timeout => "timeout",
            ModelError::BadStatus { .. } => "bad_status",
            ModelError::Malformed(_) => "malformed",
            ModelError::EmptyOutput => "empty_output",
        }
    }
}

#[async_trait]
pub trait ModelProvider: Send + Sync {
    fn name(&self) -> &str;
    fn base_url(&self) -> &str;
    /// Model currently used for completions.
    fn active_model(&self) -> String;
    /// Never fails: an unreachable endpoint reports `available: false`.
    async fn probe(&self) -> ProbeReport;
    /// Returns trimmed response text.
    async fn complete(
        &self,
        messages: Vec<ChatMessage>,
        options: &ChatOptions,
    ) -> Result<String, ModelError>;
}
