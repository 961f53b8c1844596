//! # Conversation Store
//!
//! Append-only message log plus the typing/mode flags. Each mutation
//! publishes a fresh snapshot on a `watch` channel before returning, so
//! subscribers never observe a half-applied change.

use std::collections::HashSet;
use std::fmt;

use tokio::sync::watch;

use super::message::{Message, MessageId};
use super::state::{ConversationState, Mode};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The message breaks a log invariant (empty text, reused id,
    /// timestamp before the previous message).
    InvalidMessage(&'static str),
    /// The session was torn down; the log no longer accepts writes.
    Closed,
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::InvalidMessage(reason) => write!(f, "invalid message: {reason}"),
            StoreError::Closed => write!(f, "conversation store is closed"),
        }
    }
}

impl std::error::Error for StoreError {}

pub struct ConversationStore {
    state: ConversationState,
    seen_ids: HashSet<MessageId>,
    publisher: watch::Sender<ConversationState>,
    closed: bool,
}

impl ConversationStore {
    pub fn new(mode: Mode) -> Self {
        let state = ConversationState::new(mode);
        let (publisher, _) = watch::channel(state.clone());
        Self {
            state,
            seen_ids: HashSet::new(),
            publisher,
            closed: false,
        }
    }

    pub fn append(&mut self, message: Message) -> Result<(), StoreError> {
        self.ensure_open()?;
        if message.text().is_empty() {
            return Err(StoreError::InvalidMessage("empty text"));
        }
        if self.seen_ids.contains(message.id()) {
            return Err(StoreError::InvalidMessage("duplicate id"));
        }
        if let Some(last) = self.state.last_message()
            && message.created_at() < last.created_at()
        {
            return Err(StoreError::InvalidMessage("timestamp before previous message"));
        }

        self.seen_ids.insert(message.id().clone());
        self.state.messages.push(message);
        self.publish();
        Ok(())
    }

    pub fn set_awaiting_reply(&mut self, flag: bool) -> Result<(), StoreError> {
        self.ensure_open()?;
        self.state.is_awaiting_reply = flag;
        self.publish();
        Ok(())
    }

    pub fn set_mode(&mut self, mode: Mode) -> Result<(), StoreError> {
        self.ensure_open()?;
        self.state.mode = mode;
        self.publish();
        Ok(())
    }

    pub fn snapshot(&self) -> ConversationState {
        self.state.clone()
    }

    /// Read-only view without cloning, for the controller's own decisions.
    pub fn state(&self) -> &ConversationState {
        &self.state
    }

    pub fn subscribe(&self) -> watch::Receiver<ConversationState> {
        self.publisher.subscribe()
    }

    /// Rejects further writes. Subscribers keep the final snapshot.
    pub fn close(&mut self) {
        self.closed = true;
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn ensure_open(&self) -> Result<(), StoreError> {
        if self.closed {
            Err(StoreError::Closed)
        } else {
            Ok(())
        }
    }

    fn publish(&self) {
        // send_replace succeeds with zero receivers, unlike send.
        self.publisher.send_replace(self.state.clone());
    }
}
