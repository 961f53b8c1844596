//! OpenAI provider using the Chat Completions API.
//!
//! One non-streaming request per attempt. The interesting part is error
//! classification: OpenAI reports both throttling and exhausted billing as
//! HTTP 429, distinguished only by the error body.

use async_trait::async_trait;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::inference::{CompletionError, CompletionProvider, CompletionRequest};

pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

// ============================================================================
// Chat Completions API Types
// ============================================================================

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "lowercase")]
enum Role {
    System,
    User,
}

#[derive(Serialize, Debug)]
struct ChatMessage<'a> {
    role: Role,
    content: &'a str,
}

#[derive(Serialize, Debug)]
struct ChatCompletionsRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Deserialize, Debug)]
struct ChatCompletionsResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize, Debug)]
struct Choice {
    message: Option<ResponseMessage>,
}

#[derive(Deserialize, Debug)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

/// `{"error": {"message": ..., "type": ..., "code": ...}}`
#[derive(Deserialize, Debug, Default)]
struct ErrorEnvelope {
    #[serde(default)]
    error: ErrorBody,
}

#[derive(Deserialize, Debug, Default)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default, rename = "type")]
    error_type: Option<String>,
    #[serde(default)]
    code: Option<String>,
}

// ============================================================================
// Translation Layer
// ============================================================================

fn build_request<'a>(request: &CompletionRequest<'a>) -> ChatCompletionsRequest<'a> {
    ChatCompletionsRequest {
        model: request.model,
        messages: vec![
            ChatMessage {
                role: Role::System,
                content: request.system_prompt,
            },
            ChatMessage {
                role: Role::User,
                content: request.utterance,
            },
        ],
        max_tokens: request.max_tokens,
        temperature: request.temperature,
    }
}

/// Maps a non-success status and its raw body to our error taxonomy.
fn classify_error(status: u16, raw_body: &str) -> CompletionError {
    let body = serde_json::from_str::<ErrorEnvelope>(raw_body)
        .map(|env| env.error)
        .unwrap_or_default();
    let message = if body.message.is_empty() {
        raw_body.to_string()
    } else {
        body.message.clone()
    };

    let has_code = |needle: &str| {
        body.code.as_deref() == Some(needle) || body.error_type.as_deref() == Some(needle)
    };

    if has_code("insufficient_quota") || message.to_lowercase().contains("quota") {
        return CompletionError::QuotaExceeded(message);
    }
    if status == 429 {
        return CompletionError::RateLimited(message);
    }
    if status == 401
        || status == 403
        || has_code("invalid_api_key")
        || message.contains("Incorrect API key")
    {
        return CompletionError::AuthFailure(message);
    }
    CompletionError::Api { status, message }
}

fn extract_reply(raw_body: &str) -> Result<Option<String>, CompletionError> {
    let parsed: ChatCompletionsResponse = serde_json::from_str(raw_body)
        .map_err(|e| CompletionError::Malformed(format!("response body: {e}")))?;
    Ok(parsed
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message)
        .and_then(|m| m.content))
}

// ============================================================================
// Provider Implementation
// ============================================================================

pub struct OpenAiProvider {
    api_key: Option<String>,
    base_url: String,
    client: reqwest::Client,
}

impl OpenAiProvider {
    /// Creates a new OpenAI provider.
    ///
    /// # Arguments
    /// * `api_key` - Bearer credential; `None` makes every attempt an `AuthFailure`
    /// * `base_url` - Optional custom base URL (defaults to OpenAI's API)
    pub fn new(api_key: Option<String>, base_url: Option<String>) -> Self {
        Self {
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            base_url: base_url
                .unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl CompletionProvider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    async fn complete(&self, request: CompletionRequest<'_>) -> Result<Option<String>, CompletionError> {
        let Some(api_key) = self.api_key.as_deref() else {
            warn!("No OpenAI API key configured");
            return Err(CompletionError::AuthFailure("no API key configured".to_string()));
        };

        let body = build_request(&request);
        debug!(
            "OpenAI request: model={}, utterance_len={}, max_tokens={}",
            body.model,
            request.utterance.len(),
            body.max_tokens
        );

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {api_key}"))
            .json(&body)
            .send()
            .await
            .map_err(|e| CompletionError::Network(e.to_string()))?;

        let status = response.status();
        debug!("OpenAI response status: {}", status);

        let raw_body = response
            .text()
            .await
            .map_err(|e| CompletionError::Network(e.to_string()))?;

        if !status.is_success() {
            let error = classify_error(status.as_u16(), &raw_body);
            warn!("OpenAI API error ({}): {}", error.kind(), error);
            return Err(error);
        }

        let reply = extract_reply(&raw_body)?;
        info!(
            "OpenAI reply received: {} bytes",
            reply.as_ref().map_or(0, |r| r.len())
        );
        Ok(reply)
    }
}
