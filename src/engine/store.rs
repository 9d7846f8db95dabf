//! Conversation store — settled histories keyed by `(user, conversation)`.
//!
//! In-memory and process-local. Only *settled* histories are stored; a
//! suspended turn's state lives with its approval coordinator until every
//! decision is in. Writes replace the whole history (the runner's output
//! strictly extends its input, so replacement is append in effect).

use std::collections::HashMap;
use std::sync::Mutex;

use super::history::Item;

/// Composite key: user identity and conversation id.
fn store_key(user_id: &str, conversation_id: &str) -> String {
    format!("{user_id}__{conversation_id}")
}

/// In-memory conversation history store.
#[derive(Debug, Default)]
pub struct ConversationStore {
    inner: Mutex<HashMap<String, Vec<Item>>>,
}

impl ConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The stored history for a conversation, empty when none exists.
    pub fn get(&self, user_id: &str, conversation_id: &str) -> Vec<Item> {
        self.inner
            .lock()
            .ok()
            .and_then(|map| map.get(&store_key(user_id, conversation_id)).cloned())
            .unwrap_or_default()
    }

    /// Replace the stored history for a conversation.
    pub fn set(&self, user_id: &str, conversation_id: &str, history: Vec<Item>) {
        if let Ok(mut map) = self.inner.lock() {
            map.insert(store_key(user_id, conversation_id), history);
        }
    }

    /// Number of stored conversations.
    pub fn len(&self) -> usize {
        self.inner.lock().map(|m| m.len()).unwrap_or(0)
    }

    /// Whether no conversation is stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::history::{assistant, user};

    #[test]
    fn test_round_trip_and_replacement() {
        let store = ConversationStore::new();
        assert!(store.get("u1", "c1").is_empty());

        let first = vec![user("hello"), assistant("hi")];
        store.set("u1", "c1", first.clone());
        assert_eq!(store.get("u1", "c1"), first);

        let mut second = first.clone();
        second.push(user("and another thing"));
        store.set("u1", "c1", second.clone());
        assert_eq!(store.get("u1", "c1"), second);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_conversations_are_isolated_per_user() {
        let store = ConversationStore::new();
        store.set("u1", "c1", vec![user("from u1")]);
        store.set("u2", "c1", vec![user("from u2")]);

        assert_eq!(store.get("u1", "c1"), vec![user("from u1")]);
        assert_eq!(store.get("u2", "c1"), vec![user("from u2")]);
        assert!(store.get("u1", "c2").is_empty());
        assert_eq!(store.len(), 2);
    }
}
