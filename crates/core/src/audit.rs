//! Audit trail for conversation turns. The engine reports each accepted field, each phase change
//! and the turn result; the runtime reports turns it could not run at all.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::conversation::ConversationId;
use crate::flows::states::ConversationPhase;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditOutcome {
    Success,
    Recovered,
    Failed,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TurnEvent {
    FieldFilled { field: String, value: String },
    PhaseChanged { from: ConversationPhase, to: ConversationPhase },
    TurnProcessed { completion_percentage: u8, fields_filled: usize },
    /// The engine hit an internal fault and sent the recovery reply.
    TurnRecovered { fault: String },
    /// The turn never reached the engine or its result was not stored.
    TurnFailed { reason: String },
}

impl TurnEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::FieldFilled { .. } => "conversation.field_filled",
            Self::PhaseChanged { .. } => "conversation.phase_changed",
            Self::TurnProcessed { .. } => "conversation.turn_processed",
            Self::TurnRecovered { .. } => "conversation.turn_recovered",
            Self::TurnFailed { .. } => "conversation.turn_failed",
        }
    }

    pub fn outcome(&self) -> AuditOutcome {
        match self {
            Self::TurnRecovered { .. } => AuditOutcome::Recovered,
            Self::TurnFailed { .. } => AuditOutcome::Failed,
            _ => AuditOutcome::Success,
        }
    }
}

/// Who a turn belongs to and which inbound message caused it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditContext {
    pub conversation_id: Option<ConversationId>,
    pub correlation_id: String,
    pub actor: String,
}

impl AuditContext {
    pub fn new(
        conversation_id: Option<ConversationId>,
        correlation_id: impl Into<String>,
        actor: impl Into<String>,
    ) -> Self {
        Self { conversation_id, correlation_id: correlation_id.into(), actor: actor.into() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub event_id: Uuid,
    pub conversation_id: Option<ConversationId>,
    pub correlation_id: String,
    pub actor: String,
    pub event: TurnEvent,
    pub occurred_at: DateTime<Utc>,
}

impl AuditEvent {
    pub fn new(context: &AuditContext, event: TurnEvent, occurred_at: DateTime<Utc>) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            conversation_id: context.conversation_id.clone(),
            correlation_id: context.correlation_id.clone(),
            actor: context.actor.clone(),
            event,
            occurred_at,
        }
    }

    pub fn event_type(&self) -> &'static str {
        self.event.event_type()
    }

    pub fn outcome(&self) -> AuditOutcome {
        self.event.outcome()
    }
}

pub trait AuditSink: Send + Sync {
    fn emit(&self, event: AuditEvent);
}

#[derive(Clone, Copy, Debug, Default)]
pub struct NoopAuditSink;

impl AuditSink for NoopAuditSink {
    fn emit(&self, _event: AuditEvent) {}
}

#[derive(Clone, Default)]
pub struct InMemoryAuditSink {
    events: Arc<Mutex<Vec<AuditEvent>>>,
}

impl InMemoryAuditSink {
    pub fn events(&self) -> Vec<AuditEvent> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn event_types(&self) -> Vec<&'static str> {
        self.events().iter().map(AuditEvent::event_type).collect()
    }
}

impl AuditSink for InMemoryAuditSink {
    fn emit(&self, event: AuditEvent) {
        match self.events.lock() {
            Ok(mut events) => events.push(event),
            Err(poisoned) => poisoned.into_inner().push(event),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use crate::audit::{
        AuditContext, AuditEvent, AuditOutcome, AuditSink, InMemoryAuditSink, TurnEvent,
    };
    use crate::domain::conversation::ConversationId;
    use crate::flows::states::ConversationPhase;

    #[test]
    fn events_carry_the_turn_context() {
        let sink = InMemoryAuditSink::default();
        let context =
            AuditContext::new(Some(ConversationId::new("+15551234567")), "req-123", "traveler");
        let at = Utc::now();
        sink.emit(AuditEvent::new(
            &context,
            TurnEvent::PhaseChanged {
                from: ConversationPhase::Greeting,
                to: ConversationPhase::Collecting,
            },
            at,
        ));

        let events = sink.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type(), "conversation.phase_changed");
        assert_eq!(events[0].correlation_id, "req-123");
        assert_eq!(
            events[0].conversation_id.as_ref().map(ConversationId::as_str),
            Some("+15551234567")
        );
        assert_eq!(events[0].actor, "traveler");
        assert_eq!(events[0].occurred_at, at);
    }

    #[test]
    fn outcomes_follow_the_event_kind() {
        let filled = TurnEvent::FieldFilled { field: "destination".into(), value: "Lisbon".into() };
        let recovered = TurnEvent::TurnRecovered { fault: "panic: boom".into() };
        let failed = TurnEvent::TurnFailed { reason: "store offline".into() };

        assert_eq!(filled.outcome(), AuditOutcome::Success);
        assert_eq!(recovered.outcome(), AuditOutcome::Recovered);
        assert_eq!(failed.outcome(), AuditOutcome::Failed);
    }

    #[test]
    fn events_serialize_with_a_kind_tag() {
        let event = TurnEvent::FieldFilled { field: "budget".into(), value: "€2000".into() };

        let encoded = serde_json::to_value(&event).expect("encode event");

        assert_eq!(encoded["kind"], "field_filled");
        assert_eq!(encoded["field"], "budget");
    }
}
