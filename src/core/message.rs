use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Opaque message identifier. Unique within a session.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
pub struct MessageId(String);

impl MessageId {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sender {
    #[serde(rename = "user")]
    User,
    #[serde(rename = "bot")]
    Bot,
}

/// A single chat line. Fields are private so a message cannot change after
/// it has been stamped by a [`MessageFactory`](super::clock::MessageFactory).
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Message {
    id: MessageId,
    sender: Sender,
    text: String,
    created_at: DateTime<Utc>,
}

impl Message {
    pub fn new(id: MessageId, sender: Sender, text: String, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            sender,
            text,
            created_at,
        }
    }

    pub fn id(&self) -> &MessageId {
        &self.id
    }

    pub fn sender(&self) -> Sender {
        self.sender
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn is_bot(&self) -> bool {
        self.sender == Sender::Bot
    }
}
