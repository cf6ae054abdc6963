//! Availability guard: decides per call whether the live model path is worth attempting.
//!
//! Two states. `Initialized` after a successful probe; `Degraded` after a failed
//! probe or any failed completion. Only an explicit re-probe leaves `Degraded`.

use crate::provider::{ModelError, ModelProvider};
use serde::Serialize;
use std::sync::RwLock;
use tracing::{info, warn};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GuardState {
    Initialized,
    Degraded,
}

/// Endpoint as seen by the guard: where it is, which model serves it, whether it is usable.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ModelEndpoint {
    pub base_url: String,
    pub model_identifier: String,
    pub connected: bool,
}

pub struct AvailabilityGuard {
    state: RwLock<GuardState>,
}

impl Default for AvailabilityGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl AvailabilityGuard {
    /// Starts degraded: nothing is attempted until a probe succeeds.
    pub fn new() -> Self {
        Self {
            state: RwLock::new(GuardState::Degraded),
        }
    }

    pub fn state(&self) -> GuardState {
        self.state
            .read()
            .map(|s| *s)
            .unwrap_or(GuardState::Degraded)
    }

    pub fn is_live(&self) -> bool {
        self.state() == GuardState::Initialized
    }

    fn set(&self, next: GuardState) -> GuardState {
        match self.state.write() {
            Ok(mut s) => std::mem::replace(&mut *s, next),
            Err(poisoned) => {
                let mut s = poisoned.into_inner();
                std::mem::replace(&mut *s, next)
            }
        }
    }

    /// Probes the provider and moves to the matching state.
    pub async fn probe(&self, provider: &dyn ModelProvider) -> GuardState {
        let report = provider.probe().await;
        let next = if report.available {
            GuardState::Initialized
        } else {
            GuardState::Degraded
        };
        let prev = self.set(next);
        match next {
            GuardState::Initialized => info!(
                provider = provider.name(),
                model = %provider.active_model(),
                from = ?prev,
                "model backend available; live generation enabled"
            ),
            GuardState::Degraded => warn!(
                provider = provider.name(),
                base_url = provider.base_url(),
                "model backend unavailable; serving fallback responses"
            ),
        }
        next
    }

    /// Called after a failed completion.
    pub fn mark_degraded(&self, cause: &ModelError) {
        if self.set(GuardState::Degraded) == GuardState::Initialized {
            warn!(cause = cause.kind(), error = %cause, "live model call failed; guard degraded until re-probe");
        }
    }

    pub fn endpoint(&self, provider: &dyn ModelProvider) -> ModelEndpoint {
        ModelEndpoint {
            base_url: provider.base_url().to_string(),
            model_identifier: provider.active_model(),
            connected: self.is_live(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{ChatMessage, ChatOptions, ProbeReport};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct Switch(AtomicBool);

    #[async_trait]
    impl ModelProvider for Switch {
        fn name(&self) -> &str {
            "switch"
        }
        fn base_url(&self) -> &str {
            "http://switch"
        }
        fn active_model(&self) -> String {
            "m".to_string()
        }
        async fn probe(&self) -> ProbeReport {
            let up = self.0.load(Ordering::SeqCst);
            ProbeReport {
                available: up,
                models_offered: if up { vec!["m".into()] } else { vec![] },
                active_model: up.then(|| "m".to_string()),
            }
        }
        async fn complete(
            &self,
            _messages: Vec<ChatMessage>,
            _options: &ChatOptions,
        ) -> Result<String, ModelError> {
            Err(ModelError::Timeout)
        }
    }

    #[test]
    fn starts_degraded() {
        assert_eq!(AvailabilityGuard::new().state(), GuardState::Degraded);
    }

    #[tokio::test]
    async fn failure_degrades_until_reprobe() {
        let provider = Switch(AtomicBool::new(true));
        let guard = AvailabilityGuard::new();
        assert_eq!(guard.probe(&provider).await, GuardState::Initialized);
        assert!(guard.endpoint(&provider).connected);

        guard.mark_degraded(&ModelError::Timeout);
        assert!(!guard.is_live());

        assert_eq!(guard.probe(&provider).await, GuardState::Initialized);
        provider.0.store(false, Ordering::SeqCst);
        assert_eq!(guard.probe(&provider).await, GuardState::Degraded);
        assert!(!guard.endpoint(&provider).connected);
    }
}
