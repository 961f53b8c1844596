//! # Conversation State
//!
//! Everything a front end needs to draw the chat, in one value:
//!
//! ```text
//! ConversationState
//! ├── messages: Vec<Message>     // display order = append order
//! ├── is_awaiting_reply: bool    // typing indicator + input lockout
//! └── mode: Mode                 // Mock (offline) or Live (remote API)
//! ```
//!
//! Consumers only ever see clones of this (snapshots). The session task is
//! the single writer, through [`ConversationStore`](super::store::ConversationStore).

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use super::message::Message;

/// Where non-shortcut questions are answered.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Synthesized placeholder replies, no network.
    Mock,
    /// Remote completion service.
    #[default]
    Live,
}

impl Mode {
    pub fn toggled(self) -> Mode {
        match self {
            Mode::Mock => Mode::Live,
            Mode::Live => Mode::Mock,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Mode::Mock => "Mock",
            Mode::Live => "Live",
        }
    }
}

/// Controller phase, derived from `is_awaiting_reply`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Idle,
    AwaitingReply,
}

#[derive(Serialize, Debug, Clone, Default, PartialEq)]
pub struct ConversationState {
    pub messages: Vec<Message>,
    pub is_awaiting_reply: bool,
    pub mode: Mode,
}

impl ConversationState {
    pub fn new(mode: Mode) -> Self {
        Self {
            messages: Vec::new(),
            is_awaiting_reply: false,
            mode,
        }
    }

    pub fn phase(&self) -> Phase {
        if self.is_awaiting_reply {
            Phase::AwaitingReply
        } else {
            Phase::Idle
        }
    }

    /// Whether the UI should accept a new send right now.
    pub fn accepts_input(&self) -> bool {
        !self.is_awaiting_reply
    }

    pub fn last_message(&self) -> Option<&Message> {
        self.messages.last()
    }
}
