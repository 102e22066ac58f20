//! Property-based tests for the conversation engine
//!
//! Any message, any prior state: filled slots stay put, progress never goes back, a cooperative
//! traveller always reaches completion and internal faults never leak past a turn.

use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};
use proptest::prelude::*;

use super::engine::{ConversationEngine, SlotFillingFlow};
use crate::domain::conversation::ConversationState;
use crate::domain::slots::{ExtractionResult, SlotValue, TravelInfo};
use crate::errors::DomainError;
use crate::extraction::{ExtractionPolicy, RuleBasedExtractor, SlotExtractor};
use crate::flows::states::ConversationPhase;
use crate::progress::{filled_count, progress};
use crate::schema::{FieldDefinition, FieldKind, FieldSchema};

// ============================================================================
// Test Helpers
// ============================================================================

fn start() -> chrono::DateTime<Utc> {
    Utc.timestamp_opt(1_760_000_000, 0).single().unwrap_or_else(Utc::now)
}

fn engine_for(fields: Vec<FieldDefinition>) -> ConversationEngine {
    let schema = FieldSchema::new(fields).expect("travel fields form a valid schema");
    ConversationEngine::from_schema(schema, ExtractionPolicy::default())
}

/// A direct answer the recognizer bound to `field` is known to accept.
fn cooperative_answer(field: &FieldDefinition) -> String {
    match field.kind {
        FieldKind::Destination => "Lisbon".to_owned(),
        FieldKind::Departure => "London".to_owned(),
        FieldKind::Dates => "June".to_owned(),
        FieldKind::TravelerCount => "2".to_owned(),
        FieldKind::Budget => "2000".to_owned(),
        FieldKind::Choice => field.keywords.first().cloned().unwrap_or_default(),
        FieldKind::Text => "nothing special".to_owned(),
    }
}

struct FaultyExtractor {
    panics: bool,
}

impl SlotExtractor for FaultyExtractor {
    fn try_extract(
        &self,
        _message: &str,
        _slots: &TravelInfo,
        _expected_key: Option<&str>,
    ) -> Result<ExtractionResult, DomainError> {
        if self.panics {
            panic!("recognizer blew up");
        }
        Err(DomainError::Extraction("recognizer unavailable".to_owned()))
    }
}

// ============================================================================
// Arbitrary Generators
// ============================================================================

fn arb_message() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("hi".to_owned()),
        Just("thanks!".to_owned()),
        Just("I want to go to Lisbon from London in June".to_owned()),
        Just("just me, solo trip".to_owned()),
        Just("family of 5 with a budget of €3k".to_owned()),
        Just("we love food, a relaxed pace and a boutique hotel with a pool".to_owned()),
        Just("what do you recommend?".to_owned()),
        Just("2000".to_owned()),
        Just("15/08 to 22/08".to_owned()),
        "[a-zA-Z0-9 ,.!?€$-]{0,60}",
    ]
}

fn arb_prior_slots() -> impl Strategy<Value = TravelInfo> {
    let keys: Vec<String> =
        FieldSchema::travel().fields().iter().map(|field| field.key.clone()).collect();
    proptest::sample::subsequence(keys.clone(), 0..=keys.len()).prop_map(|keys| {
        keys.into_iter().map(|key| (key, SlotValue::text("already known"))).collect()
    })
}

fn arb_field_order() -> impl Strategy<Value = Vec<FieldDefinition>> {
    Just(FieldSchema::travel().fields().to_vec()).prop_shuffle()
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #[test]
    fn filled_slots_survive_any_message(
        prior in arb_prior_slots(),
        message in arb_message(),
    ) {
        let engine = ConversationEngine::default();
        let state = ConversationState::with_slots(prior.clone());

        let outcome = engine.process_turn(&message, state, start());

        for (key, value) in prior.iter() {
            prop_assert_eq!(outcome.state.slots.get(key), Some(value));
        }
        prop_assert!(outcome.extracted.keys().all(|key| !prior.is_filled(key)));
    }

    #[test]
    fn progress_and_phase_never_move_backwards(
        messages in proptest::collection::vec(arb_message(), 1..12),
    ) {
        let engine = ConversationEngine::default();
        let mut state = engine.initial_state();
        let mut at = start();

        for message in &messages {
            let before_filled = filled_count(engine.schema(), &state.slots);
            let before_completion = state.completion_percentage;
            let before_phase = state.phase;

            let outcome = engine.process_turn(message, state, at);
            state = outcome.state;
            at += Duration::seconds(30);

            prop_assert!(!outcome.reply.trim().is_empty());
            prop_assert!(filled_count(engine.schema(), &state.slots) >= before_filled);
            prop_assert!(state.completion_percentage >= before_completion);
            prop_assert!(state.phase >= before_phase);
            prop_assert!(state.history.len() <= engine.history_limit());
        }
    }

    #[test]
    fn cooperative_traveller_completes_within_schema_length(fields in arb_field_order()) {
        let engine = engine_for(fields);
        let mut state = engine.initial_state();
        let mut at = start();
        let mut turns = 0;

        while state.phase != ConversationPhase::Complete {
            prop_assert!(turns < engine.schema().len(), "ran out of turns");
            let key = state.expected_field_key.clone().unwrap_or_default();
            let field = engine.schema().get(&key).cloned();
            prop_assert!(field.is_some(), "expected key must name a schema field");
            let answer = field.as_ref().map(cooperative_answer).unwrap_or_default();

            let outcome = engine.process_turn(&answer, state, at);
            prop_assert!(outcome.state.slots.is_filled(&key), "answer for {} not accepted", key);
            state = outcome.state;
            at += Duration::seconds(30);
            turns += 1;
        }

        prop_assert_eq!(state.completion_percentage, 100);
        prop_assert_eq!(progress(engine.schema(), &state.slots), 100);
        prop_assert!(state.expected_field_key.is_none());
    }

    #[test]
    fn internal_faults_keep_slots_and_still_reply(
        prior in arb_prior_slots(),
        message in arb_message(),
        panics in any::<bool>(),
    ) {
        let schema = Arc::new(FieldSchema::travel());
        let engine =
            ConversationEngine::new(schema.clone(), FaultyExtractor { panics }, SlotFillingFlow);
        let state = ConversationState::with_slots(prior.clone());

        let outcome = engine.process_turn(&message, state, start());

        prop_assert!(outcome.recovered());
        prop_assert!(!outcome.reply.trim().is_empty());
        prop_assert_eq!(&outcome.state.slots, &prior);
        prop_assert_eq!(outcome.state.history.len(), 1);
    }

    #[test]
    fn extraction_is_deterministic(message in arb_message(), prior in arb_prior_slots()) {
        let schema = Arc::new(FieldSchema::travel());
        let extractor = RuleBasedExtractor::new(schema, ExtractionPolicy::default());

        let first = extractor.extract(&message, &prior, Some("destination"));
        let second = extractor.extract(&message, &prior, Some("destination"));

        prop_assert_eq!(first, second);
    }
}
