//! # Session Controller
//!
//! Runs one chat session as a single tokio task. The task owns the
//! [`Conversation`] and is the only thing that mutates it; front ends talk
//! to it through a cloneable [`SessionHandle`] and watch snapshots.
//!
//! ```text
//!  SessionHandle ──Intent──►  session task  ──update()──► ConversationStore
//!        ▲                       │    ▲                        │
//!        │ Dispatch (oneshot)    │    │ Action                 │ watch
//!        └───────────────────────┘    │                        ▼
//!                              JoinSet children          snapshot stream
//!                         (quick-reply pause, completion)
//! ```
//!
//! Teardown (`shutdown()`, or the last handle dropping) aborts every child
//! task, so no timer or retry loop outlives the session.

use std::fmt;
use std::sync::Arc;

use log::{debug, error, info, warn};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::{JoinHandle, JoinSet};

use crate::core::action::{Action, Conversation, Effect, Rejection, update};
use crate::core::clock::{Clock, IdGenerator, MessageFactory, Sleeper};
use crate::core::quick::QuickResponseTable;
use crate::core::state::{ConversationState, Mode};
use crate::core::store::{ConversationStore, StoreError};
use crate::inference::CompletionClient;

/// Outcome of a user intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    Accepted,
    Ignored(Rejection),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// The session task has ended; intents can no longer be delivered.
    Closed,
    /// The conversation store refused a write. Indicates a bug.
    Store(StoreError),
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::Closed => write!(f, "chat session is closed"),
            SessionError::Store(e) => write!(f, "chat session store error: {e}"),
        }
    }
}

impl std::error::Error for SessionError {}

impl From<StoreError> for SessionError {
    fn from(e: StoreError) -> Self {
        SessionError::Store(e)
    }
}

/// Everything needed to open a session.
pub struct SessionConfig {
    pub mode: Mode,
    pub greeting: String,
    pub quick_reply_delay: std::time::Duration,
    pub quick_responses: Arc<QuickResponseTable>,
}

/// Injected capabilities. Production wiring uses `SystemClock`, `UuidIds`
/// and `TokioSleeper`.
pub struct SessionDeps {
    pub client: Arc<CompletionClient>,
    pub clock: Box<dyn Clock>,
    pub ids: Box<dyn IdGenerator>,
    pub sleeper: Arc<dyn Sleeper>,
}

type Reply = oneshot::Sender<Result<Dispatch, SessionError>>;

enum Intent {
    Action(Action, Reply),
    Shutdown,
}

#[derive(Clone)]
pub struct SessionHandle {
    intents: mpsc::Sender<Intent>,
    snapshots: watch::Receiver<ConversationState>,
    quick: Arc<QuickResponseTable>,
}

impl SessionHandle {
    pub async fn send_utterance(&self, text: impl Into<String>) -> Result<Dispatch, SessionError> {
        self.dispatch(Action::Send(text.into())).await
    }

    pub async fn click_quick_question(&self, trigger: impl Into<String>) -> Result<Dispatch, SessionError> {
        self.dispatch(Action::ClickQuickQuestion(trigger.into())).await
    }

    pub async fn toggle_mode(&self) -> Result<Dispatch, SessionError> {
        self.dispatch(Action::ToggleMode).await
    }

    pub fn snapshot(&self) -> ConversationState {
        self.snapshots.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ConversationState> {
        self.snapshots.clone()
    }

    /// Shortcut labels, for drawing quick-question buttons.
    pub fn quick_questions(&self) -> Vec<String> {
        self.quick.triggers().map(str::to_string).collect()
    }

    async fn dispatch(&self, action: Action) -> Result<Dispatch, SessionError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.intents
            .send(Intent::Action(action, reply_tx))
            .await
            .map_err(|_| SessionError::Closed)?;
        reply_rx.await.map_err(|_| SessionError::Closed)?
    }
}

/// Owns the join handle of a running session.
pub struct SessionController {
    handle: SessionHandle,
    task: JoinHandle<()>,
}

impl SessionController {
    /// Seeds the greeting and starts the session task.
    pub fn spawn(config: SessionConfig, deps: SessionDeps) -> Result<Self, SessionError> {
        let store = ConversationStore::new(config.mode);
        let snapshots = store.subscribe();
        let factory = MessageFactory::new(deps.clock, deps.ids);
        let mut convo = Conversation::new(
            store,
            factory,
            config.quick_responses.clone(),
            config.quick_reply_delay,
        );
        convo.seed_greeting(&config.greeting)?;

        let (intents_tx, intents_rx) = mpsc::channel(32);
        let runner = Runner {
            convo,
            client: deps.client,
            sleeper: deps.sleeper,
            children: JoinSet::new(),
        };
        let task = tokio::spawn(runner.run(intents_rx));
        info!("Chat session started in {} mode", config.mode.label());

        Ok(Self {
            handle: SessionHandle {
                intents: intents_tx,
                snapshots,
                quick: config.quick_responses,
            },
            task,
        })
    }

    pub fn handle(&self) -> SessionHandle {
        self.handle.clone()
    }

    /// Tears the session down and waits for the task to finish.
    pub async fn shutdown(self) {
        // Err only if the task already ended, which is the goal anyway.
        let _ = self.handle.intents.send(Intent::Shutdown).await;
        if let Err(e) = self.task.await {
            warn!("Session task ended abnormally: {}", e);
        }
    }
}

struct Runner {
    convo: Conversation,
    client: Arc<CompletionClient>,
    sleeper: Arc<dyn Sleeper>,
    children: JoinSet<Action>,
}

impl Runner {
    async fn run(mut self, mut intents: mpsc::Receiver<Intent>) {
        loop {
            tokio::select! {
                intent = intents.recv() => match intent {
                    Some(Intent::Action(action, reply)) => {
                        let outcome = self.apply(action);
                        // The caller may have stopped waiting; the action still applied.
                        let _ = reply.send(outcome);
                    }
                    Some(Intent::Shutdown) | None => break,
                },
                Some(joined) = self.children.join_next() => match joined {
                    Ok(action) => {
                        if let Err(e) = self.apply(action) {
                            error!("Failed to apply resolution: {}", e);
                        }
                    }
                    Err(e) if e.is_cancelled() => debug!("Child task cancelled"),
                    Err(e) => error!("Child task panicked: {}", e),
                },
            }
        }
        self.teardown();
    }

    fn apply(&mut self, action: Action) -> Result<Dispatch, SessionError> {
        let effect = update(&mut self.convo, action)?;
        Ok(self.run_effect(effect))
    }

    fn run_effect(&mut self, effect: Effect) -> Dispatch {
        match effect {
            Effect::None => Dispatch::Accepted,
            Effect::Ignored(reason) => Dispatch::Ignored(reason),
            Effect::DeliverQuickReply { ticket, reply, delay } => {
                let sleeper = self.sleeper.clone();
                self.children.spawn(async move {
                    sleeper.sleep(delay).await;
                    Action::QuickReplyDue { ticket, reply }
                });
                Dispatch::Accepted
            }
            Effect::RequestCompletion { ticket, utterance, mode } => {
                debug!("Spawning completion request ({} mode)", mode.label());
                let client = self.client.clone();
                self.children.spawn(async move {
                    let result = client.complete(&utterance, mode).await;
                    Action::CompletionResolved { ticket, result }
                });
                Dispatch::Accepted
            }
        }
    }

    fn teardown(&mut self) {
        if !self.children.is_empty() {
            info!("Aborting {} in-flight task(s) on teardown", self.children.len());
        }
        self.children.abort_all();
        self.convo.store.close();
        info!("Chat session closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::message::Sender;
    use crate::core::quick::QuickResponseEntry;
    use crate::test_support::{ScriptedProvider, test_session, test_session_with};
    use std::time::Duration;

    async fn wait_idle(handle: &SessionHandle, messages: usize) -> ConversationState {
        let mut rx = handle.subscribe();
        let state = rx
            .wait_for(|s| !s.is_awaiting_reply && s.messages.len() == messages)
            .await
            .unwrap();
        state.clone()
    }

    #[tokio::test]
    async fn test_blank_send_is_ignored() {
        let provider = Arc::new(ScriptedProvider::new(vec![]));
        let (controller, _sleeper) = test_session(provider, Mode::Live);
        let handle = controller.handle();

        assert_eq!(
            handle.send_utterance("   ").await,
            Ok(Dispatch::Ignored(Rejection::Blank))
        );
        let snap = handle.snapshot();
        assert_eq!(snap.messages.len(), 1);
        assert!(!snap.is_awaiting_reply);
        controller.shutdown().await;
    }

    #[tokio::test]
    async fn test_every_trigger_answers_without_provider() {
        let provider = Arc::new(ScriptedProvider::new(vec![]));
        let (controller, sleeper) = test_session(provider.clone(), Mode::Live);
        let handle = controller.handle();

        let table = QuickResponseTable::default();
        let mut expected_len = 1;
        for trigger in handle.quick_questions() {
            assert_eq!(handle.click_quick_question(trigger.clone()).await, Ok(Dispatch::Accepted));
            expected_len += 2;
            let snap = wait_idle(&handle, expected_len).await;
            let bot = &snap.messages[expected_len - 1];
            assert_eq!(bot.sender(), Sender::Bot);
            assert_eq!(Some(bot.text()), table.lookup(&trigger));
        }

        assert_eq!(provider.calls(), 0);
        assert!(sleeper.recorded().iter().all(|d| *d == Duration::from_millis(800)));
        controller.shutdown().await;
    }

    #[tokio::test]
    async fn test_configured_shortcuts_never_reach_provider() {
        let provider = Arc::new(ScriptedProvider::new(vec![Ok(Some("remote".into()))]));
        let table = QuickResponseTable::new(vec![
            QuickResponseEntry::new("Fee? ", "padded"),
            QuickResponseEntry::new("Fee?", "canned"),
        ]);
        let (controller, _) = test_session_with(provider.clone(), Mode::Live, table);
        let handle = controller.handle();

        let shortcuts = handle.quick_questions();
        assert_eq!(shortcuts, vec!["Fee?".to_string()]);
        assert_eq!(handle.click_quick_question(shortcuts[0].clone()).await, Ok(Dispatch::Accepted));
        let snap = wait_idle(&handle, 3).await;
        assert_eq!(snap.messages[2].text(), "canned");

        assert_eq!(
            handle.click_quick_question("Anything else?").await,
            Ok(Dispatch::Ignored(Rejection::UnknownShortcut))
        );
        assert_eq!(handle.snapshot().messages.len(), 3);
        assert_eq!(provider.calls(), 0);
        controller.shutdown().await;
    }

    #[tokio::test]
    async fn test_ids_are_unique_across_session() {
        let provider = Arc::new(ScriptedProvider::new(vec![Ok(Some("a".into())), Ok(Some("b".into()))]));
        let (controller, _) = test_session(provider, Mode::Live);
        let handle = controller.handle();

        handle.send_utterance("one").await.unwrap();
        wait_idle(&handle, 3).await;
        handle.send_utterance("two").await.unwrap();
        let snap = wait_idle(&handle, 5).await;

        let ids: std::collections::HashSet<_> = snap.messages.iter().map(|m| m.id().clone()).collect();
        assert_eq!(ids.len(), 5);
        let texts: Vec<_> = snap.messages.iter().skip(1).map(|m| m.text()).collect();
        assert_eq!(texts, vec!["one", "a", "two", "b"]);
        controller.shutdown().await;
    }

    #[tokio::test]
    async fn test_intents_after_shutdown_fail() {
        let provider = Arc::new(ScriptedProvider::new(vec![]));
        let (controller, _) = test_session(provider, Mode::Live);
        let handle = controller.handle();
        controller.shutdown().await;

        assert_eq!(handle.send_utterance("hello").await, Err(SessionError::Closed));
        assert_eq!(handle.toggle_mode().await, Err(SessionError::Closed));
    }

    #[tokio::test]
    async fn test_mock_mode_uses_placeholder() {
        let provider = Arc::new(ScriptedProvider::new(vec![]));
        let (controller, sleeper) = test_session(provider.clone(), Mode::Live);
        let handle = controller.handle();

        handle.toggle_mode().await.unwrap();
        assert_eq!(handle.snapshot().mode, Mode::Mock);
        handle.send_utterance("random question").await.unwrap();
        let snap = wait_idle(&handle, 3).await;

        assert_eq!(snap.messages[2].text(), "[mock] You asked: \"random question\"");
        assert_eq!(provider.calls(), 0);
        assert_eq!(sleeper.recorded(), vec![Duration::from_millis(1000)]);
        controller.shutdown().await;
    }

    #[tokio::test]
    async fn test_recording_sleeper_is_shared() {
        // The client and the session share one sleeper; quick replies and
        // pre-request delays land in the same log.
        let provider = Arc::new(ScriptedProvider::new(vec![Ok(Some("hi".into()))]));
        let (controller, sleeper) = test_session(provider, Mode::Live);
        let handle = controller.handle();

        handle.send_utterance("Is there a fee?").await.unwrap();
        wait_idle(&handle, 3).await;
        handle.send_utterance("hello").await.unwrap();
        wait_idle(&handle, 5).await;

        assert_eq!(
            sleeper.recorded(),
            vec![Duration::from_millis(800), Duration::from_millis(1000)]
        );
        controller.shutdown().await;
    }
}
