//! Append-only conversation log
//!
//! The log is the single source of truth for rendered history. Turns are
//! never edited or removed; `reset` replaces the whole log with a fresh
//! greeting for a new session.

use crate::topic::Topic;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Monotonic turn identifier (creation order)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TurnId(pub u64);

impl fmt::Display for TurnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Who a turn is attributed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnRole {
    User,
    Assistant,
    SystemError,
}

/// One immutable message in the log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub id: TurnId,
    pub role: TurnRole,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// Dialogue role as seen by the generation service
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryRole {
    User,
    Assistant,
}

/// One prior exchange passed to the generation client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub role: HistoryRole,
    pub content: String,
}

/// Ordered turn log for one practice session
#[derive(Debug, Clone)]
pub struct Conversation {
    turns: Vec<Turn>,
    next_id: u64,
}

impl Conversation {
    /// Start a conversation with the topic's greeting installed
    pub fn new(topic: Topic) -> Self {
        let mut conversation = Self {
            turns: Vec::new(),
            next_id: 1,
        };
        conversation.reset(topic);
        conversation
    }

    /// Append a turn and return it. The only mutator besides `reset`.
    pub fn append(&mut self, role: TurnRole, content: impl Into<String>) -> Turn {
        let turn = Turn {
            id: TurnId(self.next_id),
            role,
            content: content.into(),
            created_at: Utc::now(),
        };
        self.next_id += 1;
        self.turns.push(turn.clone());
        turn
    }

    /// Drop every turn and install the greeting for `topic`.
    ///
    /// Ids keep increasing across resets so a stale id can never name a
    /// turn of the new session.
    pub fn reset(&mut self, topic: Topic) -> &[Turn] {
        self.turns.clear();
        self.append(TurnRole::Assistant, topic.greeting());
        &self.turns
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    pub fn get(&self, id: TurnId) -> Option<&Turn> {
        self.turns.iter().find(|t| t.id == id)
    }

    /// The dialogue as the model should see it.
    ///
    /// System-error turns are local notices, not part of the dialogue.
    pub fn history(&self) -> Vec<HistoryEntry> {
        dialogue(self.turns.iter())
    }

    /// History up to (not including) the given turn
    pub fn history_before(&self, id: TurnId) -> Vec<HistoryEntry> {
        dialogue(self.turns.iter().take_while(|t| t.id != id))
    }
}

fn dialogue<'a>(turns: impl Iterator<Item = &'a Turn>) -> Vec<HistoryEntry> {
    turns
        .filter_map(|turn| {
            let role = match turn.role {
                TurnRole::User => HistoryRole::User,
                TurnRole::Assistant => HistoryRole::Assistant,
                TurnRole::SystemError => return None,
            };
            Some(HistoryEntry {
                role,
                content: turn.content.clone(),
            })
        })
        .collect()
}
