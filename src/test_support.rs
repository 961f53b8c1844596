//! Test utilities shared across the crate.
//!
//! This module is only compiled during tests (`#[cfg(test)]`).

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};

use crate::core::action::Conversation;
use crate::core::clock::{Clock, IdGenerator, MessageFactory, Sleeper};
use crate::core::config::DEFAULT_GREETING;
use crate::core::message::MessageId;
use crate::core::quick::QuickResponseTable;
use crate::core::state::Mode;
use crate::core::store::ConversationStore;
use crate::inference::{
    CompletionClient, CompletionError, CompletionProvider, CompletionRequest, ModelParams,
    RetryPolicy,
};
use crate::session::{SessionConfig, SessionController, SessionDeps};

/// Always returns the same instant.
pub struct FixedClock(DateTime<Utc>);

impl FixedClock {
    pub fn epoch() -> Self {
        Self(Utc.with_ymd_and_hms(2024, 1, 1, 9, 30, 0).unwrap())
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// `msg-1`, `msg-2`, ...
#[derive(Default)]
pub struct SequentialIds(AtomicU64);

impl SequentialIds {
    pub fn new() -> Self {
        Self::default()
    }
}

impl IdGenerator for SequentialIds {
    fn next_id(&self) -> MessageId {
        let n = self.0.fetch_add(1, Ordering::Relaxed) + 1;
        MessageId::new(format!("msg-{n}"))
    }
}

/// Records each requested duration and returns immediately.
#[derive(Default)]
pub struct RecordingSleeper(Mutex<Vec<Duration>>);

impl RecordingSleeper {
    pub fn recorded(&self) -> Vec<Duration> {
        self.0.lock().unwrap().clone()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.0.lock().unwrap().push(duration);
    }
}

/// Replays canned results in order, one per attempt.
pub struct ScriptedProvider {
    script: Mutex<VecDeque<Result<Option<String>, CompletionError>>>,
    utterances: Mutex<Vec<String>>,
    calls: AtomicUsize,
}

impl ScriptedProvider {
    pub fn new(script: Vec<Result<Option<String>, CompletionError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            utterances: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn utterances(&self) -> Vec<String> {
        self.utterances.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: CompletionRequest<'_>) -> Result<Option<String>, CompletionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.utterances.lock().unwrap().push(request.utterance.to_string());
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(CompletionError::Network("script exhausted".into())))
    }
}

/// Never answers, so a session stays in AwaitingReply until torn down.
pub struct PendingProvider;

#[async_trait]
impl CompletionProvider for PendingProvider {
    fn name(&self) -> &str {
        "pending"
    }

    async fn complete(&self, _request: CompletionRequest<'_>) -> Result<Option<String>, CompletionError> {
        std::future::pending().await
    }
}

pub fn test_params() -> ModelParams {
    ModelParams {
        model: "test-model".to_string(),
        system_prompt: "You are a test assistant.".to_string(),
        temperature: 0.7,
        max_tokens: 150,
    }
}

/// A conversation seeded with the default greeting and quick responses.
pub fn test_conversation() -> Conversation {
    let factory = MessageFactory::new(Box::new(FixedClock::epoch()), Box::new(SequentialIds::new()));
    let mut convo = Conversation::new(
        ConversationStore::new(Mode::Live),
        factory,
        Arc::new(QuickResponseTable::default()),
        Duration::from_millis(800),
    );
    convo.seed_greeting(DEFAULT_GREETING).unwrap();
    convo
}

/// A running session over `provider`, with a shared recording sleeper.
pub fn test_session(
    provider: Arc<dyn CompletionProvider>,
    mode: Mode,
) -> (SessionController, Arc<RecordingSleeper>) {
    test_session_with(provider, mode, QuickResponseTable::default())
}

pub fn test_session_with(
    provider: Arc<dyn CompletionProvider>,
    mode: Mode,
    quick: QuickResponseTable,
) -> (SessionController, Arc<RecordingSleeper>) {
    let sleeper = Arc::new(RecordingSleeper::default());
    let client = CompletionClient::new(
        provider,
        sleeper.clone(),
        RetryPolicy::new(3, Duration::from_millis(1000)).unwrap(),
        Duration::from_millis(1000),
        test_params(),
    );
    let controller = SessionController::spawn(
        SessionConfig {
            mode,
            greeting: DEFAULT_GREETING.to_string(),
            quick_reply_delay: Duration::from_millis(800),
            quick_responses: Arc::new(quick),
        },
        SessionDeps {
            client: Arc::new(client),
            clock: Box::new(FixedClock::epoch()),
            ids: Box::new(SequentialIds::new()),
            sleeper: sleeper.clone(),
        },
    )
    .unwrap();
    (controller, sleeper)
}
