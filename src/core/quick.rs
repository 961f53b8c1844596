//! # Quick Responses
//!
//! Canned answers for the shortcut questions. A hit skips the remote
//! service entirely. Matching is exact string equality: any change in
//! wording falls through to the completion path.

use log::warn;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct QuickResponseEntry {
    pub trigger: String,
    pub reply: String,
}

impl QuickResponseEntry {
    pub fn new(trigger: impl Into<String>, reply: impl Into<String>) -> Self {
        Self {
            trigger: trigger.into(),
            reply: reply.into(),
        }
    }

    /// Why this entry can never be answered from the table, if it can't.
    ///
    /// Utterances are trimmed before lookup, so a trigger with surrounding
    /// whitespace would never match.
    pub fn defect(&self) -> Option<&'static str> {
        if self.trigger.trim().is_empty() {
            Some("trigger is blank")
        } else if self.trigger.trim() != self.trigger {
            Some("trigger has leading or trailing whitespace")
        } else if self.reply.trim().is_empty() {
            Some("reply is blank")
        } else {
            None
        }
    }
}

#[derive(Debug, Clone)]
pub struct QuickResponseTable {
    entries: Vec<QuickResponseEntry>,
}

impl Default for QuickResponseTable {
    fn default() -> Self {
        Self::new(default_entries())
    }
}

impl QuickResponseTable {
    /// Builds the table. The first entry for a trigger wins; entries that
    /// could never be answered are dropped.
    pub fn new(entries: Vec<QuickResponseEntry>) -> Self {
        let mut kept: Vec<QuickResponseEntry> = Vec::with_capacity(entries.len());
        for entry in entries {
            if let Some(defect) = entry.defect() {
                warn!("Quick-response entry {:?} ignored: {}", entry.trigger, defect);
                continue;
            }
            if kept.iter().any(|k| k.trigger == entry.trigger) {
                warn!("Duplicate quick-response trigger ignored: {:?}", entry.trigger);
                continue;
            }
            kept.push(entry);
        }
        Self { entries: kept }
    }

    pub fn lookup(&self, utterance: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|e| e.trigger == utterance)
            .map(|e| e.reply.as_str())
    }

    /// Shortcut labels in configured order.
    pub fn triggers(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.trigger.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

pub fn default_entries() -> Vec<QuickResponseEntry> {
    vec![
        QuickResponseEntry::new(
            "How do I sell my license?",
            "To sell your software license, please visit our website and follow the submission process.",
        ),
        QuickResponseEntry::new(
            "Is there a fee?",
            "Yes, SoftSell charges a small processing fee. Check our website for details.",
        ),
        QuickResponseEntry::new(
            "What types do you accept?",
            "We accept various software licenses, including Microsoft, Adobe, and more. See our full list online.",
        ),
    ]
}
