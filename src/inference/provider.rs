use std::fmt;

use async_trait::async_trait;

/// Errors from a single completion attempt.
/// Only `RateLimited` is worth retrying; see [`CompletionError::is_retryable`].
#[derive(Debug, Clone, PartialEq)]
pub enum CompletionError {
    /// Remote service asked us to slow down (HTTP 429 without a quota code).
    RateLimited(String),
    /// Missing or rejected credential.
    AuthFailure(String),
    /// Billing quota exhausted. Retrying won't help.
    QuotaExceeded(String),
    /// Transport-level failure (DNS, connection refused, timeout).
    Network(String),
    /// Remote answered 2xx but the body wasn't the expected shape.
    Malformed(String),
    /// Any other error status.
    Api { status: u16, message: String },
}

impl CompletionError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, CompletionError::RateLimited(_))
    }

    /// Short kind name for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            CompletionError::RateLimited(_) => "rate_limited",
            CompletionError::AuthFailure(_) => "auth_failure",
            CompletionError::QuotaExceeded(_) => "quota_exceeded",
            CompletionError::Network(_) => "network",
            CompletionError::Malformed(_) => "malformed",
            CompletionError::Api { .. } => "api",
        }
    }
}

impl fmt::Display for CompletionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompletionError::RateLimited(msg) => write!(f, "rate limited: {msg}"),
            CompletionError::AuthFailure(msg) => write!(f, "authentication failed: {msg}"),
            CompletionError::QuotaExceeded(msg) => write!(f, "quota exceeded: {msg}"),
            CompletionError::Network(msg) => write!(f, "network error: {msg}"),
            CompletionError::Malformed(msg) => write!(f, "malformed response: {msg}"),
            CompletionError::Api { status, message } => {
                write!(f, "API error (HTTP {status}): {message}")
            }
        }
    }
}

impl std::error::Error for CompletionError {}

/// Everything a provider needs for one completion attempt.
#[derive(Debug, Clone, Copy)]
pub struct CompletionRequest<'a> {
    pub system_prompt: &'a str,
    pub utterance: &'a str,
    pub model: &'a str,
    pub temperature: f32,
    pub max_tokens: u32,
}

#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Returns the name of the provider.
    fn name(&self) -> &str;

    /// Performs exactly one remote attempt. `Ok(None)` means the service
    /// answered successfully but produced no text.
    async fn complete(&self, request: CompletionRequest<'_>) -> Result<Option<String>, CompletionError>;
}
