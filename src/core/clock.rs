//! # Time & Identity
//!
//! Capabilities the session needs from the outside world: the current time,
//! fresh message ids, and a way to wait. Each is a trait so tests can swap in
//! deterministic versions (see `test_support`).

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::message::{Message, MessageId, Sender};

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub trait IdGenerator: Send + Sync {
    fn next_id(&self) -> MessageId;
}

/// Suspends the caller for a duration. Every delay in the crate
/// (pre-request smoothing, backoff, quick-reply pause) goes through this.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Random UUID v4 ids.
pub struct UuidIds;

impl IdGenerator for UuidIds {
    fn next_id(&self) -> MessageId {
        MessageId::new(uuid::Uuid::new_v4().to_string())
    }
}

pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Stamps new messages with an id and a creation time.
///
/// Wall clocks can step backwards (NTP adjustments), so the stamp is clamped
/// to the previous one. Store order then always has non-decreasing times.
pub struct MessageFactory {
    clock: Box<dyn Clock>,
    ids: Box<dyn IdGenerator>,
    last_stamp: Option<DateTime<Utc>>,
}

impl MessageFactory {
    pub fn new(clock: Box<dyn Clock>, ids: Box<dyn IdGenerator>) -> Self {
        Self {
            clock,
            ids,
            last_stamp: None,
        }
    }

    pub fn stamp(&mut self, sender: Sender, text: impl Into<String>) -> Message {
        let now = self.clock.now();
        let created_at = match self.last_stamp {
            Some(last) if last > now => last,
            _ => now,
        };
        self.last_stamp = Some(created_at);
        Message::new(self.ids.next_id(), sender, text.into(), created_at)
    }
}
