pub mod engine;
pub mod states;

pub use engine::{
    merge, ConversationEngine, FlowDefinition, FlowTransitionError, SlotFillingFlow, TurnOutcome,
    RECOVERY_COMPLETE_REPLY,
};
pub use states::{ConversationPhase, PhaseAction, PhaseContext, TransitionOutcome};

#[cfg(test)]
mod proptests;
