//! Rolling conversation context.
//!
//! A fixed-capacity ring of recent utterances, owned by the
//! orchestrator. Writes happen only from the orchestrator loop; readers
//! take cheap snapshots under a short-lived mutex.

use crate::pipeline::messages::Emotion;
use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use std::sync::Mutex;

/// One remembered utterance.
#[derive(Debug, Clone)]
pub struct ContextEntry {
    pub text: String,
    pub emotion: Emotion,
    /// Topic label; implicit command types land here so later requests
    /// can be reinforced.
    pub topic: String,
    pub timestamp: DateTime<Utc>,
}

/// Ring buffer of the last N conversation entries.
pub struct ConversationContext {
    entries: Mutex<VecDeque<ContextEntry>>,
    capacity: usize,
}

impl ConversationContext {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity.max(1))),
            capacity: capacity.max(1),
        }
    }

    /// Append an entry, evicting the oldest when full.
    pub fn push(&self, entry: ContextEntry) {
        let Ok(mut entries) = self.entries.lock() else {
            return;
        };
        if entries.len() == self.capacity {
            entries.pop_front();
        }
        entries.push_back(entry);
    }

    /// Topics of the newest `n` entries, oldest first.
    #[must_use]
    pub fn recent_topics(&self, n: usize) -> Vec<String> {
        let Ok(entries) = self.entries.lock() else {
            return Vec::new();
        };
        let skip = entries.len().saturating_sub(n);
        entries.iter().skip(skip).map(|e| e.topic.clone()).collect()
    }

    /// Number of remembered entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
