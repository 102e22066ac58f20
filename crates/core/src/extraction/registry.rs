use std::collections::HashMap;

use crate::domain::slots::SlotValue;
use crate::extraction::budget::BudgetRecognizer;
use crate::extraction::dates::DateRecognizer;
use crate::extraction::keywords::ChoiceRecognizer;
use crate::extraction::location::{LocationRecognizer, LocationRole};
use crate::extraction::travelers::TravelerCountRecognizer;
use crate::extraction::{ExtractionPolicy, LiteralRecognizer};
use crate::schema::{FieldDefinition, FieldKind, FieldSchema};

/// Turns raw message text into a value for one field.
pub trait Recognizer: Send + Sync {
    /// Interprets the whole message as a direct answer to this field's question.
    fn answer(&self, text: &str) -> Option<SlotValue>;

    /// Looks for this field inside an arbitrary message. Fields without a reliable
    /// pattern only fill through `answer`.
    fn scan(&self, _text: &str) -> Option<SlotValue> {
        None
    }
}

#[derive(Default)]
pub struct RecognizerRegistry {
    recognizers: HashMap<String, Box<dyn Recognizer>>,
}

impl RecognizerRegistry {
    /// Binds a recognizer to every schema field according to its kind.
    pub fn for_schema(schema: &FieldSchema, policy: &ExtractionPolicy) -> Self {
        let mut registry = Self::default();
        for field in schema.fields() {
            registry.register_kind(field, policy);
        }
        registry
    }

    pub fn register<T>(&mut self, key: impl Into<String>, recognizer: T)
    where
        T: Recognizer + 'static,
    {
        self.recognizers.insert(key.into(), Box::new(recognizer));
    }

    pub fn get(&self, key: &str) -> Option<&dyn Recognizer> {
        self.recognizers.get(key).map(|recognizer| &**recognizer)
    }

    pub fn len(&self) -> usize {
        self.recognizers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.recognizers.is_empty()
    }

    fn register_kind(&mut self, field: &FieldDefinition, policy: &ExtractionPolicy) {
        let literal = LiteralRecognizer::new(policy.min_literal_chars, policy.max_literal_chars);
        let key = field.key.clone();
        match field.kind {
            FieldKind::Destination => self.register(
                key,
                LocationRecognizer::new(LocationRole::Destination, policy.max_location_tokens),
            ),
            FieldKind::Departure => self.register(
                key,
                LocationRecognizer::new(LocationRole::Departure, policy.max_location_tokens),
            ),
            FieldKind::Dates => self.register(key, DateRecognizer::new()),
            FieldKind::TravelerCount => {
                self.register(key, TravelerCountRecognizer::new(policy.max_travelers))
            }
            FieldKind::Budget => self.register(key, BudgetRecognizer::new()),
            FieldKind::Choice => {
                self.register(key, ChoiceRecognizer::new(&field.keywords, literal))
            }
            FieldKind::Text => self.register(key, literal),
        }
    }
}
