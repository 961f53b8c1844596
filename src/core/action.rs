//! # Actions
//!
//! Everything that can happen to a chat session becomes an `Action`.
//! User hits Enter? That's `Action::Send(text)`.
//! The remote service answers? That's `Action::CompletionResolved { .. }`.
//!
//! `update()` applies an action to the [`Conversation`] and returns an
//! [`Effect`] describing the async work the caller must start. No timers,
//! no I/O here: "what changes state" is separate from "how long it takes".
//!
//! ```text
//! Conversation + Action  →  update()  →  Effect
//!                                          │
//!              session task runs it, later feeds back QuickReplyDue /
//!              CompletionResolved carrying the same ticket
//! ```

use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};

use crate::core::clock::MessageFactory;
use crate::core::message::Sender;
use crate::core::quick::QuickResponseTable;
use crate::core::state::{Mode, Phase};
use crate::core::store::{ConversationStore, StoreError};
use crate::inference::CompletionError;

pub const RATE_LIMITED_REPLY: &str =
    "⚠️ The assistant is busy right now. Please wait a moment and try again.";
pub const AUTH_FAILURE_REPLY: &str =
    "⚠️ Invalid API key. Verify OPENAI_API_KEY in your environment or ~/.softsell/config.toml.";
pub const QUOTA_EXCEEDED_REPLY: &str = "⚠️ Quota exceeded. Check your OpenAI plan at platform.openai.com or contact support. Try a quick question instead.";
pub const GENERIC_FAILURE_REPLY: &str = "⚠️ Unable to connect to assistant. Please try again.";

/// Correlates an outstanding reply with the send that caused it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket(u64);

#[derive(Debug)]
pub enum Action {
    /// Free text from the input box.
    Send(String),
    /// A quick-question shortcut was clicked.
    ClickQuickQuestion(String),
    ToggleMode,
    /// The pause before a canned answer has elapsed.
    QuickReplyDue { ticket: Ticket, reply: String },
    CompletionResolved {
        ticket: Ticket,
        result: Result<String, CompletionError>,
    },
}

/// Why an intent was dropped at the boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// Empty or whitespace-only text.
    Blank,
    /// A reply is still pending.
    Busy,
    /// A clicked shortcut that the quick-response table does not know.
    UnknownShortcut,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    None,
    Ignored(Rejection),
    /// Wait `delay`, then feed back `Action::QuickReplyDue`.
    DeliverQuickReply {
        ticket: Ticket,
        reply: String,
        delay: Duration,
    },
    /// Run the completion client, then feed back `Action::CompletionResolved`.
    RequestCompletion {
        ticket: Ticket,
        utterance: String,
        mode: Mode,
    },
}

/// The session's owned state: the store plus what it needs to make
/// messages and answer shortcuts.
pub struct Conversation {
    pub store: ConversationStore,
    factory: MessageFactory,
    quick: Arc<QuickResponseTable>,
    quick_reply_delay: Duration,
    outstanding: Option<Ticket>,
    next_ticket: u64,
}

impl Conversation {
    pub fn new(
        store: ConversationStore,
        factory: MessageFactory,
        quick: Arc<QuickResponseTable>,
        quick_reply_delay: Duration,
    ) -> Self {
        Self {
            store,
            factory,
            quick,
            quick_reply_delay,
            outstanding: None,
            next_ticket: 1,
        }
    }

    /// Appends the opening Bot line shown before the user says anything.
    pub fn seed_greeting(&mut self, greeting: &str) -> Result<(), StoreError> {
        if greeting.trim().is_empty() {
            return Ok(());
        }
        let message = self.factory.stamp(Sender::Bot, greeting);
        self.store.append(message)
    }

    pub fn phase(&self) -> Phase {
        self.store.state().phase()
    }

    pub fn outstanding(&self) -> Option<Ticket> {
        self.outstanding
    }

    fn issue_ticket(&mut self) -> Ticket {
        let ticket = Ticket(self.next_ticket);
        self.next_ticket += 1;
        self.outstanding = Some(ticket);
        ticket
    }

    fn append(&mut self, sender: Sender, text: &str) -> Result<(), StoreError> {
        let message = self.factory.stamp(sender, text);
        self.store.append(message)
    }

    /// Appends the Bot reply and reopens the input gate. The gate reopens
    /// even when the store refuses the reply.
    fn resolve(&mut self, text: &str) -> Result<(), StoreError> {
        self.outstanding = None;
        let appended = self.append(Sender::Bot, text);
        self.store.set_awaiting_reply(false)?;
        appended
    }
}

pub fn update(convo: &mut Conversation, action: Action) -> Result<Effect, StoreError> {
    match action {
        Action::Send(text) => submit(convo, &text, Route::Any),
        Action::ClickQuickQuestion(trigger) => submit(convo, &trigger, Route::ShortcutOnly),
        Action::ToggleMode => {
            let mode = convo.store.state().mode.toggled();
            info!("Mode toggled to {}", mode.label());
            convo.store.set_mode(mode)?;
            Ok(Effect::None)
        }
        Action::QuickReplyDue { ticket, reply } => {
            if convo.outstanding != Some(ticket) {
                debug!("Dropping stale quick reply for {:?}", ticket);
                return Ok(Effect::None);
            }
            convo.resolve(&reply)?;
            Ok(Effect::None)
        }
        Action::CompletionResolved { ticket, result } => {
            if convo.outstanding != Some(ticket) {
                debug!("Dropping stale completion for {:?}", ticket);
                return Ok(Effect::None);
            }
            let text = match result {
                Ok(reply) => reply,
                Err(e) => {
                    warn!("Completion failed ({}): {}", e.kind(), e);
                    fallback_reply(&e).to_string()
                }
            };
            convo.resolve(&text)?;
            Ok(Effect::None)
        }
    }
}

/// Which answer paths a submission may take.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Route {
    Any,
    /// Clicked shortcuts never reach the remote service.
    ShortcutOnly,
}

fn submit(convo: &mut Conversation, raw: &str, route: Route) -> Result<Effect, StoreError> {
    let utterance = raw.trim();
    if utterance.is_empty() {
        return Ok(Effect::Ignored(Rejection::Blank));
    }
    if convo.phase() == Phase::AwaitingReply {
        debug!("Send rejected: reply still pending");
        return Ok(Effect::Ignored(Rejection::Busy));
    }

    let canned = convo.quick.lookup(utterance).map(str::to_string);
    if route == Route::ShortcutOnly && canned.is_none() {
        warn!("Clicked shortcut is not in the quick-response table: {:?}", utterance);
        return Ok(Effect::Ignored(Rejection::UnknownShortcut));
    }

    convo.append(Sender::User, utterance)?;
    convo.store.set_awaiting_reply(true)?;
    let ticket = convo.issue_ticket();

    if let Some(reply) = canned {
        debug!("Quick-response hit for {:?}", utterance);
        return Ok(Effect::DeliverQuickReply {
            ticket,
            reply,
            delay: convo.quick_reply_delay,
        });
    }

    Ok(Effect::RequestCompletion {
        ticket,
        utterance: utterance.to_string(),
        mode: convo.store.state().mode,
    })
}

/// User-facing text for a failed completion. Raw errors stay in the log.
pub fn fallback_reply(error: &CompletionError) -> &'static str {
    match error {
        CompletionError::RateLimited(_) => RATE_LIMITED_REPLY,
        CompletionError::AuthFailure(_) => AUTH_FAILURE_REPLY,
        CompletionError::QuotaExceeded(_) => QUOTA_EXCEEDED_REPLY,
        CompletionError::Network(_) | CompletionError::Malformed(_) | CompletionError::Api { .. } => {
            GENERIC_FAILURE_REPLY
        }
    }
}
