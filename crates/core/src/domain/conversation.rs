use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::slots::TravelInfo;
use crate::flows::states::ConversationPhase;

pub const DEFAULT_HISTORY_LIMIT: usize = 20;

/// Identity of a conversation, typically the sender's phone number or chat handle.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConversationId(pub String);

impl ConversationId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnRecord {
    pub user: String,
    pub reply: String,
    pub at: DateTime<Utc>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversationState {
    pub slots: TravelInfo,
    pub history: VecDeque<TurnRecord>,
    pub expected_field_key: Option<String>,
    pub phase: ConversationPhase,
    pub completion_percentage: u8,
    pub last_activity: Option<DateTime<Utc>>,
}

impl ConversationState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_slots(slots: TravelInfo) -> Self {
        Self { slots, ..Self::default() }
    }

    /// Appends a turn, evicting the oldest entries beyond `limit`.
    pub fn record_turn(&mut self, turn: TurnRecord, limit: usize) {
        self.history.push_back(turn);
        while self.history.len() > limit.max(1) {
            self.history.pop_front();
        }
    }

    /// Moves `last_activity` forward, never backwards.
    pub fn touch(&mut self, at: DateTime<Utc>) {
        self.last_activity = Some(match self.last_activity {
            Some(previous) if previous > at => previous,
            _ => at,
        });
    }
}
