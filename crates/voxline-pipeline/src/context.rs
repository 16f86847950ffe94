//! Per-caller conversation history.
//!
//! Keyed by caller number, bounded to the last N turns. Concurrent calls from
//! the same number race on append with last-write-wins semantics; that is an
//! accepted limitation of the data model, not something this store corrects.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, RwLock};
use tracing::error;
use voxline_types::ConversationTurn;

/// Bounded conversation history shared across concurrent sessions.
///
/// Uses `std::sync::RwLock` intentionally: all lock acquisitions are brief
/// map operations that never span `.await` points, making a synchronous lock
/// safe and more efficient than `tokio::sync::RwLock`.
#[derive(Debug, Clone)]
pub struct ContextStore {
    inner: Arc<RwLock<HashMap<String, VecDeque<ConversationTurn>>>>,
    max_turns: usize,
}

impl ContextStore {
    pub fn new(max_turns: usize) -> Self {
        Self {
            inner: Arc::new(RwLock::new(HashMap::new())),
            max_turns,
        }
    }

    /// Returns the trailing history for a caller, oldest first.
    pub fn history(&self, caller: &str) -> Vec<ConversationTurn> {
        let guard = match self.inner.read() {
            Ok(guard) => guard,
            Err(poisoned) => {
                // A panicked writer at worst leaves a stale turn list; dropping
                // all history over it would be worse than serving it.
                error!("context store lock poisoned, recovering with stale state");
                poisoned.into_inner()
            }
        };
        guard
            .get(caller)
            .map(|turns| turns.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Appends a completed turn for a caller, dropping the oldest turns
    /// beyond the configured bound.
    pub fn append(&self, caller: &str, turn: ConversationTurn) {
        let mut guard = match self.inner.write() {
            Ok(guard) => guard,
            Err(poisoned) => {
                error!("context store lock poisoned, recovering with stale state");
                poisoned.into_inner()
            }
        };
        let turns = guard.entry(caller.to_string()).or_default();
        turns.push_back(turn);
        while turns.len() > self.max_turns {
            turns.pop_front();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn history_for_unknown_caller_is_empty() {
        let store = ContextStore::new(10);
        assert!(store.history("+1000").is_empty());
    }

    #[test]
    fn append_preserves_order() {
        let store = ContextStore::new(10);
        store.append("+1000", ConversationTurn::new("one", "r1"));
        store.append("+1000", ConversationTurn::new("two", "r2"));

        let history = store.history("+1000");
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].user_text, "one");
        assert_eq!(history[1].user_text, "two");
    }

    #[test]
    fn history_is_bounded_to_last_n_turns() {
        let store = ContextStore::new(3);
        for i in 0..5 {
            store.append("+1000", ConversationTurn::new(format!("u{i}"), format!("r{i}")));
        }

        let history = store.history("+1000");
        assert_eq!(history.len(), 3);
        assert_eq!(history[0].user_text, "u2");
        assert_eq!(history[2].user_text, "u4");
    }

    #[test]
    fn callers_are_isolated() {
        let store = ContextStore::new(10);
        store.append("+1000", ConversationTurn::new("a", "ra"));
        store.append("+2000", ConversationTurn::new("b", "rb"));

        assert_eq!(store.history("+1000").len(), 1);
        assert_eq!(store.history("+2000")[0].user_text, "b");
    }
}
