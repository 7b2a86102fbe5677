use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Default number of turns kept in the conversation history.
pub const DEFAULT_MAX_HISTORY: usize = 10;

/// A single exchange between the user and the avatar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub user: String,
    pub ai: String,
}

/// In-memory conversation history, bounded to the most recent turns.
///
/// Nothing here is persisted; a new process starts with an empty history.
#[derive(Debug, Clone)]
pub struct ContextManager {
    history: VecDeque<Turn>,
    max_history: usize,
}

impl Default for ContextManager {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_HISTORY)
    }
}

impl ContextManager {
    /// Creates an empty history holding at most `max_history` turns.
    pub fn new(max_history: usize) -> Self {
        let max_history = max_history.max(1);
        Self {
            history: VecDeque::with_capacity(max_history),
            max_history,
        }
    }

    /// Appends a turn, dropping the oldest one when full.
    pub fn add_to_history(&mut self, user: impl Into<String>, ai: impl Into<String>) {
        if self.history.len() == self.max_history {
            self.history.pop_front();
        }
        self.history.push_back(Turn {
            user: user.into(),
            ai: ai.into(),
        });
    }

    /// Returns the retained turns, oldest first.
    pub fn turns(&self) -> impl Iterator<Item = &Turn> {
        self.history.iter()
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }
}
