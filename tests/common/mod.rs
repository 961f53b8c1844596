//! Helpers shared by the integration test binaries.
#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use softsell_assistant::core::clock::{Sleeper, SystemClock, UuidIds};
use softsell_assistant::core::config::DEFAULT_GREETING;
use softsell_assistant::core::quick::QuickResponseTable;
use softsell_assistant::core::state::{ConversationState, Mode};
use softsell_assistant::inference::{
    CompletionClient, CompletionError, CompletionProvider, CompletionRequest, ModelParams,
    RetryPolicy,
};
use softsell_assistant::session::{SessionConfig, SessionController, SessionDeps, SessionHandle};
use tokio::sync::Notify;

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

/// Sets a flag when dropped, to observe futures being cancelled.
pub struct DropFlag(pub Arc<AtomicBool>);

impl Drop for DropFlag {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

/// A provider that parks every call until `release()` is called.
#[derive(Default)]
pub struct GatedProvider {
    gate: Notify,
    calls: AtomicUsize,
    pub dropped: Arc<AtomicBool>,
}

impl GatedProvider {
    pub fn release(&self) {
        self.gate.notify_one();
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub async fn wait_for_call(&self) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while self.calls() == 0 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("provider was never called");
    }
}

#[async_trait]
impl CompletionProvider for GatedProvider {
    fn name(&self) -> &str {
        "gated"
    }

    async fn complete(&self, request: CompletionRequest<'_>) -> Result<Option<String>, CompletionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let _flag = DropFlag(self.dropped.clone());
        self.gate.notified().await;
        Ok(Some(format!("released: {}", request.utterance)))
    }
}

pub fn params() -> ModelParams {
    ModelParams {
        model: "gpt-3.5-turbo".to_string(),
        system_prompt: "You are a helpful assistant for SoftSell, a platform for selling software licenses."
            .to_string(),
        temperature: 0.7,
        max_tokens: 150,
    }
}

pub fn client(
    provider: Arc<dyn CompletionProvider>,
    sleeper: Arc<dyn Sleeper>,
    max_attempts: u32,
) -> CompletionClient {
    CompletionClient::new(
        provider,
        sleeper,
        RetryPolicy::new(max_attempts, Duration::from_millis(1000)).unwrap(),
        Duration::from_millis(1000),
        params(),
    )
}

pub fn spawn_session(client: CompletionClient, sleeper: Arc<dyn Sleeper>, mode: Mode) -> SessionController {
    SessionController::spawn(
        SessionConfig {
            mode,
            greeting: DEFAULT_GREETING.to_string(),
            quick_reply_delay: Duration::from_millis(800),
            quick_responses: Arc::new(QuickResponseTable::default()),
        },
        SessionDeps {
            client: Arc::new(client),
            clock: Box::new(SystemClock),
            ids: Box::new(UuidIds),
            sleeper,
        },
    )
    .unwrap()
}

/// Waits until the session is idle with exactly `messages` messages.
pub async fn wait_idle(handle: &SessionHandle, messages: usize) -> ConversationState {
    let mut rx = handle.subscribe();
    let fut = rx.wait_for(|s| !s.is_awaiting_reply && s.messages.len() == messages);
    let state = tokio::time::timeout(Duration::from_secs(5), fut)
        .await
        .expect("session did not settle")
        .expect("session closed");
    state.clone()
}
