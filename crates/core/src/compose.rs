//! Reply composition: acknowledgments for what was just understood, then exactly one question or
//! the completion hand-off.

use std::sync::Arc;

use crate::domain::slots::{ExtractionResult, SlotValue, TravelInfo};
use crate::flows::states::PhaseAction;
use crate::progress::progress;
use crate::schema::{FieldDefinition, FieldKind, FieldSchema};

pub const COMPLETION_MESSAGE: &str = "Perfect! I have everything I need. Let me connect you with our travel expert to create your personalized itinerary!";
pub const GENERIC_ACKNOWLEDGMENT: &str = "Thanks for sharing that!";
pub const PROGRESS_REMARK: &str = "We're making great progress!";
pub const WELCOME: &str = "Hi! I'd love to help plan your trip.";
pub const NEUTRAL_ACKNOWLEDGMENT: &str = "Thanks!";
const SOLO_ACKNOWLEDGMENT: &str = "A solo adventure!";

/// Replies past this completion carry the progress remark.
const PROGRESS_REMARK_ABOVE: u8 = 20;

#[derive(Clone, Debug)]
pub struct ResponseComposer {
    schema: Arc<FieldSchema>,
}

impl ResponseComposer {
    pub fn new(schema: Arc<FieldSchema>) -> Self {
        Self { schema }
    }

    /// Composes the reply for a turn whose transition asked for `action`. Returns `None` when
    /// the action needs a question but no `next_field` was given.
    pub fn compose(
        &self,
        action: PhaseAction,
        extracted: &ExtractionResult,
        prior: &TravelInfo,
        next_field: Option<&FieldDefinition>,
    ) -> Option<String> {
        let mut merged = prior.clone();
        for (key, value) in extracted.iter() {
            merged.insert_if_absent(key, value.clone());
        }

        let mut parts = self.acknowledgments(action, extracted);
        if progress(&self.schema, &merged) > PROGRESS_REMARK_ABOVE {
            parts.push(PROGRESS_REMARK.to_owned());
        }

        parts.push(match action {
            PhaseAction::HandOffToPlanner => COMPLETION_MESSAGE.to_owned(),
            PhaseAction::WelcomeTraveler | PhaseAction::AskNextField => {
                self.question(next_field?, &merged)
            }
        });
        Some(parts.join(" "))
    }

    fn acknowledgments(&self, action: PhaseAction, extracted: &ExtractionResult) -> Vec<String> {
        if extracted.is_empty() {
            let opening = match action {
                PhaseAction::WelcomeTraveler => WELCOME,
                PhaseAction::AskNextField | PhaseAction::HandOffToPlanner => {
                    NEUTRAL_ACKNOWLEDGMENT
                }
            };
            return vec![opening.to_owned()];
        }

        let mut parts = Vec::with_capacity(extracted.len() + 1);
        let mut needs_generic = extracted.keys().any(|key| !self.schema.contains(key));
        for field in self.schema.fields() {
            let Some(value) = extracted.get(&field.key) else {
                continue;
            };
            match acknowledge(field, value) {
                Some(text) => parts.push(text),
                None => needs_generic = true,
            }
        }
        if needs_generic {
            parts.push(GENERIC_ACKNOWLEDGMENT.to_owned());
        }
        parts
    }

    /// Builds the question for `field`, phrased around what is already known.
    fn question(&self, field: &FieldDefinition, known: &TravelInfo) -> String {
        let destination = self.known_value(known, FieldKind::Destination);
        let travelers = self
            .known_value(known, FieldKind::TravelerCount)
            .and_then(SlotValue::as_count)
            .filter(|count| *count > 1);

        match (field.kind, destination, travelers) {
            (FieldKind::Departure, Some(destination), _) => {
                format!("Where will you be traveling from, to {destination}?")
            }
            (FieldKind::Dates, Some(destination), _) => {
                format!("When would you like to visit {destination}?")
            }
            (FieldKind::Budget, _, Some(count)) => {
                format!("What's your approximate budget for the {count} of you?")
            }
            _ => field.prompt.clone(),
        }
    }

    fn known_value<'a>(&self, known: &'a TravelInfo, kind: FieldKind) -> Option<&'a SlotValue> {
        self.schema
            .fields()
            .iter()
            .filter(|field| field.kind == kind)
            .find_map(|field| known.get(&field.key).filter(|value| !value.is_empty()))
    }
}

fn acknowledge(field: &FieldDefinition, value: &SlotValue) -> Option<String> {
    if field.kind == FieldKind::TravelerCount && value.as_count() == Some(1) {
        return Some(SOLO_ACKNOWLEDGMENT.to_owned());
    }
    field.acknowledge(value)
}
