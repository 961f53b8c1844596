//! # Completion Client
//!
//! Turns one user utterance into one reply. Owns the pacing policy around a
//! [`CompletionProvider`]: a fixed pre-request delay, then up to
//! `max_attempts` tries while the provider reports rate limiting.
//!
//! ```text
//! pre-delay → attempt 1 ─429→ wait base → attempt 2 ─429→ wait 2*base → ...
//!                 │ok / other error            │
//!                 ▼                            ▼
//!              return                       return
//! ```

use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};

use crate::core::clock::Sleeper;
use crate::core::state::Mode;
use crate::inference::{CompletionError, CompletionProvider, CompletionRequest, RetryPolicy};

/// Substituted when the service succeeds without any text.
pub const EMPTY_REPLY_FALLBACK: &str = "No response from assistant.";

/// Model parameters sent with every live request.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelParams {
    pub model: String,
    pub system_prompt: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

pub struct CompletionClient {
    provider: Arc<dyn CompletionProvider>,
    sleeper: Arc<dyn Sleeper>,
    policy: RetryPolicy,
    pre_request_delay: Duration,
    params: ModelParams,
}

impl CompletionClient {
    pub fn new(
        provider: Arc<dyn CompletionProvider>,
        sleeper: Arc<dyn Sleeper>,
        policy: RetryPolicy,
        pre_request_delay: Duration,
        params: ModelParams,
    ) -> Self {
        Self {
            provider,
            sleeper,
            policy,
            pre_request_delay,
            params,
        }
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    pub async fn complete(&self, utterance: &str, mode: Mode) -> Result<String, CompletionError> {
        if !self.pre_request_delay.is_zero() {
            self.sleeper.sleep(self.pre_request_delay).await;
        }

        if mode == Mode::Mock {
            debug!("Mock mode: synthesizing reply for {} byte utterance", utterance.len());
            return Ok(mock_reply(utterance));
        }

        let request = CompletionRequest {
            system_prompt: &self.params.system_prompt,
            utterance,
            model: &self.params.model,
            temperature: self.params.temperature,
            max_tokens: self.params.max_tokens,
        };

        let mut attempt = 1;
        loop {
            info!(
                "Completion attempt {}/{} via {} (model={})",
                attempt,
                self.policy.max_attempts(),
                self.provider.name(),
                self.params.model
            );

            match self.provider.complete(request).await {
                Ok(text) => return Ok(finish_reply(text)),
                Err(e) if e.is_retryable() => {
                    let Some(delay) = self.policy.delay_before(attempt + 1) else {
                        warn!("Giving up after {} attempt(s): {}", attempt, e);
                        return Err(e);
                    };
                    warn!(
                        "Attempt {} rate limited, retrying in {}ms: {}",
                        attempt,
                        delay.as_millis(),
                        e
                    );
                    self.sleeper.sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    warn!("Completion failed without retry ({}): {}", e.kind(), e);
                    return Err(e);
                }
            }
        }
    }
}

/// Deterministic offline reply.
pub fn mock_reply(utterance: &str) -> String {
    format!("[mock] You asked: \"{utterance}\"")
}

fn finish_reply(text: Option<String>) -> String {
    match text.as_deref().map(str::trim) {
        Some(t) if !t.is_empty() => t.to_string(),
        _ => EMPTY_REPLY_FALLBACK.to_string(),
    }
}
