use serde::{Deserialize, Serialize};

/// Conversation phases, ordered. A conversation only ever moves forward.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConversationPhase {
    #[default]
    Greeting,
    Collecting,
    Complete,
}

impl ConversationPhase {
    /// Phase implied by a slot count, before the no-regression rule is applied.
    pub fn for_progress(filled_fields: usize, total_fields: usize) -> Self {
        if filled_fields == 0 {
            Self::Greeting
        } else if filled_fields >= total_fields {
            Self::Complete
        } else {
            Self::Collecting
        }
    }

    /// Status label stored with conversation records.
    pub fn status_label(&self) -> &'static str {
        match self {
            Self::Greeting | Self::Collecting => "collecting_info",
            Self::Complete => "ready_for_planning",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct PhaseContext {
    pub filled_fields: usize,
    pub total_fields: usize,
}

impl PhaseContext {
    pub fn new(filled_fields: usize, total_fields: usize) -> Self {
        Self { filled_fields, total_fields }
    }
}

/// How the reply closes for the phase a turn lands in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PhaseAction {
    /// Nothing known yet: open with a welcome and ask the first question.
    WelcomeTraveler,
    AskNextField,
    HandOffToPlanner,
}

impl PhaseAction {
    pub fn for_phase(phase: ConversationPhase) -> Self {
        match phase {
            ConversationPhase::Greeting => Self::WelcomeTraveler,
            ConversationPhase::Collecting => Self::AskNextField,
            ConversationPhase::Complete => Self::HandOffToPlanner,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionOutcome {
    pub from: ConversationPhase,
    pub to: ConversationPhase,
    pub action: PhaseAction,
}

impl TransitionOutcome {
    pub fn changed(&self) -> bool {
        self.from != self.to
    }
}
