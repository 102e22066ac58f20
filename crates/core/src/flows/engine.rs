use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{debug, error, warn};

use crate::audit::{AuditContext, AuditEvent, AuditSink, TurnEvent};
use crate::compose::ResponseComposer;
use crate::domain::conversation::{ConversationState, TurnRecord, DEFAULT_HISTORY_LIMIT};
use crate::domain::slots::{ExtractionResult, TravelInfo};
use crate::errors::DomainError;
use crate::extraction::{ExtractionPolicy, RuleBasedExtractor, SlotExtractor};
use crate::flows::states::{ConversationPhase, PhaseAction, PhaseContext, TransitionOutcome};
use crate::progress::{filled_count, next_field, progress};
use crate::schema::FieldSchema;

pub const RECOVERY_COMPLETE_REPLY: &str =
    "Thanks for all the details! Let me get our travel expert to help you.";

pub trait FlowDefinition: Send + Sync {
    fn initial_phase(&self) -> ConversationPhase;
    fn transition(
        &self,
        current: ConversationPhase,
        context: &PhaseContext,
    ) -> Result<TransitionOutcome, FlowTransitionError>;
}

#[derive(Clone, Debug, Default)]
pub struct SlotFillingFlow;

impl FlowDefinition for SlotFillingFlow {
    fn initial_phase(&self) -> ConversationPhase {
        ConversationPhase::Greeting
    }

    fn transition(
        &self,
        current: ConversationPhase,
        context: &PhaseContext,
    ) -> Result<TransitionOutcome, FlowTransitionError> {
        transition_slot_filling(current, context)
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FlowTransitionError {
    #[error("conversation cannot move back from {from:?} to {to:?}")]
    Regression { from: ConversationPhase, to: ConversationPhase },
}

fn transition_slot_filling(
    current: ConversationPhase,
    context: &PhaseContext,
) -> Result<TransitionOutcome, FlowTransitionError> {
    let to = ConversationPhase::for_progress(context.filled_fields, context.total_fields);
    if to < current {
        return Err(FlowTransitionError::Regression { from: current, to });
    }

    Ok(TransitionOutcome { from: current, to, action: PhaseAction::for_phase(to) })
}

/// Result of one turn. `fault` is set when the turn was recovered instead of processed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TurnOutcome {
    pub reply: String,
    pub state: ConversationState,
    pub extracted: ExtractionResult,
    pub transition: Option<TransitionOutcome>,
    pub fault: Option<String>,
}

impl TurnOutcome {
    pub fn recovered(&self) -> bool {
        self.fault.is_some()
    }
}

/// Accepts extracted values for schema keys that are still open. Returns what was taken.
pub fn merge(
    slots: &mut TravelInfo,
    extracted: &ExtractionResult,
    schema: &FieldSchema,
) -> ExtractionResult {
    let mut accepted = ExtractionResult::new();
    for (key, value) in extracted.iter() {
        if !schema.contains(key) {
            debug!(event_name = "conversation.unknown_key_dropped", key, "ignoring unknown field");
            continue;
        }
        if slots.insert_if_absent(key, value.clone()) {
            accepted.insert(key, value.clone());
        }
    }
    accepted
}

pub struct ConversationEngine<X = RuleBasedExtractor, F = SlotFillingFlow> {
    schema: Arc<FieldSchema>,
    extractor: X,
    flow: F,
    composer: ResponseComposer,
    history_limit: usize,
}

impl ConversationEngine {
    pub fn from_schema(schema: FieldSchema, policy: ExtractionPolicy) -> Self {
        let schema = Arc::new(schema);
        let extractor = RuleBasedExtractor::new(schema.clone(), policy);
        Self::new(schema, extractor, SlotFillingFlow)
    }
}

impl Default for ConversationEngine {
    fn default() -> Self {
        Self::from_schema(FieldSchema::travel(), ExtractionPolicy::default())
    }
}

impl<X, F> ConversationEngine<X, F>
where
    X: SlotExtractor,
    F: FlowDefinition,
{
    pub fn new(schema: Arc<FieldSchema>, extractor: X, flow: F) -> Self {
        let composer = ResponseComposer::new(schema.clone());
        Self { schema, extractor, flow, composer, history_limit: DEFAULT_HISTORY_LIMIT }
    }

    pub fn with_history_limit(mut self, history_limit: usize) -> Self {
        self.history_limit = history_limit.max(1);
        self
    }

    pub fn schema(&self) -> &FieldSchema {
        &self.schema
    }

    pub fn history_limit(&self) -> usize {
        self.history_limit
    }

    /// State for an identity that has never written before.
    pub fn initial_state(&self) -> ConversationState {
        ConversationState {
            expected_field_key: self.schema.first().map(|field| field.key.clone()),
            phase: self.flow.initial_phase(),
            ..ConversationState::default()
        }
    }

    /// Runs one turn. Never fails: internal faults produce a recovery turn that re-asks the
    /// next missing field and leaves the slots untouched.
    pub fn process_turn(
        &self,
        message: &str,
        state: ConversationState,
        at: DateTime<Utc>,
    ) -> TurnOutcome {
        let attempt = catch_unwind(AssertUnwindSafe(|| self.try_process(message, &state, at)));
        let fault = match attempt {
            Ok(Ok(outcome)) => return outcome,
            Ok(Err(error)) => error.to_string(),
            Err(payload) => panic_message(payload.as_ref()),
        };
        self.recover(message, state, at, fault)
    }

    pub fn process_turn_with_audit<S>(
        &self,
        message: &str,
        state: ConversationState,
        at: DateTime<Utc>,
        sink: &S,
        audit: &AuditContext,
    ) -> TurnOutcome
    where
        S: AuditSink + ?Sized,
    {
        let outcome = self.process_turn(message, state, at);
        for event in turn_events(&outcome) {
            sink.emit(AuditEvent::new(audit, event, at));
        }
        outcome
    }

    fn try_process(
        &self,
        message: &str,
        state: &ConversationState,
        at: DateTime<Utc>,
    ) -> Result<TurnOutcome, DomainError> {
        let expected_key = state
            .expected_field_key
            .as_deref()
            .filter(|key| self.schema.contains(key) && !state.slots.is_filled(key))
            .map(str::to_owned)
            .or_else(|| next_field(&self.schema, &state.slots).map(|field| field.key.clone()));

        let extracted =
            self.extractor.try_extract(message, &state.slots, expected_key.as_deref())?;

        let mut slots = state.slots.clone();
        let accepted = merge(&mut slots, &extracted, &self.schema);
        let next = next_field(&self.schema, &slots);
        let completion = progress(&self.schema, &slots);
        let context = PhaseContext::new(filled_count(&self.schema, &slots), self.schema.len());

        let transition = match self.flow.transition(state.phase, &context) {
            Ok(transition) => transition,
            Err(FlowTransitionError::Regression { from, to }) => {
                warn!(
                    event_name = "conversation.phase_regression_rejected",
                    from = ?from,
                    to = ?to,
                    "keeping current phase"
                );
                // The label stays put; the reply still follows the slots.
                TransitionOutcome { from, to: from, action: PhaseAction::for_phase(to) }
            }
        };

        let reply = self
            .composer
            .compose(transition.action, &accepted, &state.slots, next)
            .ok_or_else(|| {
                DomainError::InvariantViolation(format!(
                    "{:?} reply composed without a field to ask for",
                    transition.action
                ))
            })?;

        let mut updated = state.clone();
        updated.slots = slots;
        updated.expected_field_key = next.map(|field| field.key.clone());
        updated.phase = transition.to;
        updated.completion_percentage = completion.max(state.completion_percentage);
        updated.record_turn(
            TurnRecord { user: message.to_owned(), reply: reply.clone(), at },
            self.history_limit,
        );
        updated.touch(at);

        debug!(
            event_name = "conversation.turn_processed",
            phase = ?updated.phase,
            completion = updated.completion_percentage,
            accepted = accepted.len(),
            "turn processed"
        );

        Ok(TurnOutcome {
            reply,
            state: updated,
            extracted: accepted,
            transition: Some(transition),
            fault: None,
        })
    }

    fn recover(
        &self,
        message: &str,
        mut state: ConversationState,
        at: DateTime<Utc>,
        fault: String,
    ) -> TurnOutcome {
        error!(
            event_name = "conversation.turn_recovered",
            fault = %fault,
            "turn fell back to safe reply"
        );

        let next = next_field(&self.schema, &state.slots);
        let reply = match next {
            Some(field) => format!("Thanks! {}", field.prompt),
            None => RECOVERY_COMPLETE_REPLY.to_owned(),
        };

        state.expected_field_key = next.map(|field| field.key.clone());
        state.completion_percentage =
            progress(&self.schema, &state.slots).max(state.completion_percentage);
        state.record_turn(
            TurnRecord { user: message.to_owned(), reply: reply.clone(), at },
            self.history_limit,
        );
        state.touch(at);

        TurnOutcome {
            reply,
            state,
            extracted: ExtractionResult::new(),
            transition: None,
            fault: Some(fault),
        }
    }
}

/// Audit trail for one turn: accepted fields, any phase change, then the turn result.
fn turn_events(outcome: &TurnOutcome) -> Vec<TurnEvent> {
    if let Some(fault) = &outcome.fault {
        return vec![TurnEvent::TurnRecovered { fault: fault.clone() }];
    }

    let mut events: Vec<TurnEvent> = outcome
        .extracted
        .iter()
        .map(|(field, value)| TurnEvent::FieldFilled {
            field: field.to_owned(),
            value: value.to_string(),
        })
        .collect();
    if let Some(transition) = outcome.transition.as_ref().filter(|transition| transition.changed())
    {
        events.push(TurnEvent::PhaseChanged { from: transition.from, to: transition.to });
    }
    events.push(TurnEvent::TurnProcessed {
        completion_percentage: outcome.state.completion_percentage,
        fields_filled: outcome.extracted.len(),
    });
    events
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("panic: {message}")
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("panic: {message}")
    } else {
        "panic: unknown payload".to_owned()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{Duration, Utc};

    use crate::audit::{AuditContext, InMemoryAuditSink, TurnEvent};
    use crate::compose::COMPLETION_MESSAGE;
    use crate::domain::conversation::ConversationState;
    use crate::domain::slots::{ExtractionResult, SlotValue, TravelInfo};
    use crate::errors::DomainError;
    use crate::extraction::SlotExtractor;
    use crate::flows::engine::{
        ConversationEngine, FlowDefinition, FlowTransitionError, SlotFillingFlow,
    };
    use crate::flows::states::{ConversationPhase, PhaseAction, PhaseContext};
    use crate::schema::{FieldDefinition, FieldKind, FieldSchema};

    struct FailingExtractor;

    impl SlotExtractor for FailingExtractor {
        fn try_extract(
            &self,
            _message: &str,
            _slots: &TravelInfo,
            _expected_key: Option<&str>,
        ) -> Result<ExtractionResult, DomainError> {
            Err(DomainError::Extraction("recognizer unavailable".to_owned()))
        }
    }

    struct PanickingExtractor;

    impl SlotExtractor for PanickingExtractor {
        fn try_extract(
            &self,
            _message: &str,
            _slots: &TravelInfo,
            _expected_key: Option<&str>,
        ) -> Result<ExtractionResult, DomainError> {
            panic!("index out of bounds in recognizer")
        }
    }

    fn travel_schema() -> Arc<FieldSchema> {
        Arc::new(FieldSchema::travel())
    }

    #[test]
    fn phases_advance_with_filled_fields() {
        let flow = SlotFillingFlow;

        let greeting = flow
            .transition(ConversationPhase::Greeting, &PhaseContext::new(0, 15))
            .expect("greeting stays");
        let collecting = flow
            .transition(ConversationPhase::Greeting, &PhaseContext::new(3, 15))
            .expect("greeting -> collecting");
        let complete = flow
            .transition(ConversationPhase::Collecting, &PhaseContext::new(15, 15))
            .expect("collecting -> complete");

        assert_eq!(greeting.to, ConversationPhase::Greeting);
        assert_eq!(greeting.action, PhaseAction::WelcomeTraveler);
        assert_eq!(collecting.to, ConversationPhase::Collecting);
        assert_eq!(collecting.action, PhaseAction::AskNextField);
        assert_eq!(complete.to, ConversationPhase::Complete);
        assert_eq!(complete.action, PhaseAction::HandOffToPlanner);
    }

    #[test]
    fn phases_never_move_backwards() {
        let error = SlotFillingFlow
            .transition(ConversationPhase::Complete, &PhaseContext::new(14, 16))
            .expect_err("complete cannot regress");

        assert_eq!(
            error,
            FlowTransitionError::Regression {
                from: ConversationPhase::Complete,
                to: ConversationPhase::Collecting
            }
        );
    }

    #[test]
    fn greeting_turn_welcomes_and_asks_the_first_question() {
        let engine = ConversationEngine::default();

        let outcome = engine.process_turn("hi", engine.initial_state(), Utc::now());

        assert_eq!(
            outcome.reply,
            "Hi! I'd love to help plan your trip. Where would you like to travel to?"
        );
        assert_eq!(outcome.state.phase, ConversationPhase::Greeting);
        assert_eq!(outcome.state.expected_field_key.as_deref(), Some("destination"));
        assert_eq!(outcome.state.history.len(), 1);
        assert!(!outcome.recovered());
    }

    #[test]
    fn destination_answer_moves_to_collecting_with_contextual_question() {
        let engine = ConversationEngine::default();

        let outcome = engine.process_turn("Lisbon", engine.initial_state(), Utc::now());

        assert_eq!(outcome.state.phase, ConversationPhase::Collecting);
        assert_eq!(outcome.state.slots.get("destination"), Some(&SlotValue::text("Lisbon")));
        assert_eq!(
            outcome.reply,
            "Lisbon sounds amazing! Where will you be traveling from, to Lisbon?"
        );
        assert_eq!(outcome.state.expected_field_key.as_deref(), Some("departure_location"));
        assert_eq!(outcome.state.completion_percentage, 7);
    }

    #[test]
    fn one_answer_per_field_reaches_completion() {
        let engine = ConversationEngine::default();
        let answers = [
            "Lisbon",
            "London",
            "June",
            "2",
            "$3000",
            "culture",
            "comfort",
            "food and history",
            "relaxed",
            "activities",
            "villa",
            "near the beach",
            "pool and wifi",
            "vegetarian",
            "none",
        ];

        let mut state = engine.initial_state();
        let mut last_progress = 0;
        let mut reply = String::new();
        for (turn, answer) in answers.iter().enumerate() {
            let outcome = engine.process_turn(answer, state, Utc::now());
            assert!(!outcome.recovered(), "turn {turn} should not fault");
            assert_eq!(outcome.extracted.len(), 1, "turn {turn} ({answer}) fills one field");
            assert!(outcome.state.completion_percentage >= last_progress);
            last_progress = outcome.state.completion_percentage;
            reply = outcome.reply;
            state = outcome.state;
        }

        assert_eq!(state.phase, ConversationPhase::Complete);
        assert_eq!(state.phase.status_label(), "ready_for_planning");
        assert_eq!(state.completion_percentage, 100);
        assert!(state.expected_field_key.is_none());
        assert!(reply.ends_with(COMPLETION_MESSAGE));
    }

    #[test]
    fn extractor_errors_are_recovered_without_touching_slots() {
        let schema = travel_schema();
        let engine = ConversationEngine::new(schema, FailingExtractor, SlotFillingFlow);
        let state = ConversationState::with_slots(TravelInfo::from_iter([(
            "destination",
            SlotValue::text("Lisbon"),
        )]));

        let outcome = engine.process_turn("from London", state.clone(), Utc::now());

        assert!(outcome.recovered());
        assert_eq!(outcome.reply, "Thanks! Where will you be traveling from?");
        assert_eq!(outcome.state.slots, state.slots);
        assert_eq!(outcome.state.history.len(), 1);
    }

    #[test]
    fn panics_inside_a_turn_are_recovered() {
        let engine = ConversationEngine::new(travel_schema(), PanickingExtractor, SlotFillingFlow);

        let outcome = engine.process_turn("Lisbon", engine.initial_state(), Utc::now());

        let fault = outcome.fault.as_deref().unwrap_or_default();
        assert!(fault.contains("index out of bounds"), "unexpected fault: {fault}");
        assert_eq!(outcome.reply, "Thanks! Where would you like to travel to?");
        assert!(outcome.state.slots.is_empty());
    }

    #[test]
    fn recovery_with_nothing_missing_hands_off() {
        let only_destination =
            FieldDefinition::new("destination", "Where to?", FieldKind::Destination);
        let schema =
            Arc::new(FieldSchema::new(vec![only_destination]).expect("valid schema"));
        let engine = ConversationEngine::new(schema, FailingExtractor, SlotFillingFlow);
        let state = ConversationState::with_slots(TravelInfo::from_iter([(
            "destination",
            SlotValue::text("Lisbon"),
        )]));

        let outcome = engine.process_turn("thanks again", state, Utc::now());

        assert_eq!(outcome.reply, super::RECOVERY_COMPLETE_REPLY);
    }

    #[test]
    fn completed_conversation_keeps_its_phase_when_the_schema_grows() {
        let engine = ConversationEngine::default();
        let state = ConversationState {
            phase: ConversationPhase::Complete,
            slots: TravelInfo::from_iter([("destination", SlotValue::text("Lisbon"))]),
            ..ConversationState::default()
        };

        let outcome = engine.process_turn("hello", state, Utc::now());

        assert_eq!(outcome.state.phase, ConversationPhase::Complete);
        assert!(!outcome.recovered());
        assert_eq!(
            outcome.transition.map(|transition| transition.action),
            Some(PhaseAction::AskNextField)
        );
        assert!(outcome.reply.ends_with("Where will you be traveling from, to Lisbon?"));
    }

    #[test]
    fn stale_expected_key_is_recomputed() {
        let engine = ConversationEngine::default();
        let state = ConversationState {
            expected_field_key: Some("destination".to_owned()),
            slots: TravelInfo::from_iter([("destination", SlotValue::text("Lisbon"))]),
            phase: ConversationPhase::Collecting,
            ..ConversationState::default()
        };

        let outcome = engine.process_turn("Manchester", state, Utc::now());

        assert_eq!(
            outcome.state.slots.get("departure_location"),
            Some(&SlotValue::text("Manchester"))
        );
    }

    #[test]
    fn history_is_bounded_and_activity_moves_forward() {
        let engine = ConversationEngine::default().with_history_limit(2);
        let start = Utc::now();
        let mut state = engine.initial_state();
        for (offset, message) in ["hi", "Lisbon", "London"].iter().enumerate() {
            let at = start + Duration::seconds(offset as i64);
            state = engine.process_turn(message, state, at).state;
        }

        assert_eq!(state.history.len(), 2);
        assert_eq!(state.history.front().map(|turn| turn.user.as_str()), Some("Lisbon"));
        assert_eq!(state.last_activity, Some(start + Duration::seconds(2)));
    }

    #[test]
    fn unknown_slot_keys_survive_a_turn() {
        let engine = ConversationEngine::default();
        let state = ConversationState::with_slots(TravelInfo::from_iter([(
            "loyalty_number",
            SlotValue::text("AB123"),
        )]));

        let outcome = engine.process_turn("Lisbon", state, Utc::now());

        assert_eq!(outcome.state.slots.get("loyalty_number"), Some(&SlotValue::text("AB123")));
        assert_eq!(outcome.state.completion_percentage, 7);
    }

    #[test]
    fn turns_emit_audit_events() {
        let engine = ConversationEngine::default();
        let sink = InMemoryAuditSink::default();
        let audit = AuditContext::new(None, "req-42", "engine");

        let processed = engine.process_turn_with_audit(
            "Lisbon",
            engine.initial_state(),
            Utc::now(),
            &sink,
            &audit,
        );
        let failing = ConversationEngine::new(travel_schema(), FailingExtractor, SlotFillingFlow);
        let _ = failing.process_turn_with_audit(
            "London",
            processed.state,
            Utc::now(),
            &sink,
            &audit,
        );

        assert_eq!(
            sink.event_types(),
            vec![
                "conversation.field_filled",
                "conversation.phase_changed",
                "conversation.turn_processed",
                "conversation.turn_recovered",
            ]
        );
        let events = sink.events();
        assert_eq!(
            events[0].event,
            TurnEvent::FieldFilled { field: "destination".into(), value: "Lisbon".into() }
        );
        assert_eq!(
            events[1].event,
            TurnEvent::PhaseChanged {
                from: ConversationPhase::Greeting,
                to: ConversationPhase::Collecting
            }
        );
        assert!(events.iter().all(|event| event.correlation_id == "req-42"));
    }
}
