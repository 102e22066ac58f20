//! Slot Extraction
//!
//! Turns one free-text message into the values it carries for still-unfilled fields. A direct
//! answer to the expected field is tried first, then every other open field is scanned with
//! its registered recognizer. Extraction never fails on input text; unrecognized messages
//! yield an empty result.

pub mod budget;
pub mod dates;
pub mod keywords;
pub mod location;
pub mod registry;
pub mod text;
pub mod travelers;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::slots::{ExtractionResult, SlotValue, TravelInfo};
use crate::errors::DomainError;
use crate::schema::FieldSchema;

pub use registry::{Recognizer, RecognizerRegistry};

use text::{is_question, tokenize, trim_answer};

/// Messages made only of these words carry no field information.
const TRIVIAL_WORDS: &[&str] = &[
    "hi", "hello", "hey", "hiya", "yo", "ok", "okay", "k", "thanks", "thank", "thx", "ty", "you",
    "yes", "yeah", "yep", "yup", "sure", "cool", "great", "nice", "awesome", "alright", "hmm",
    "lol", "there", "please", "so", "much", "good", "morning", "afternoon", "evening", "a", "lot",
];

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionPolicy {
    /// Shorter messages are ignored unless they are all digits.
    pub min_message_chars: usize,
    pub min_literal_chars: usize,
    pub max_literal_chars: usize,
    pub max_location_tokens: usize,
    pub max_travelers: u8,
}

impl Default for ExtractionPolicy {
    fn default() -> Self {
        Self {
            min_message_chars: 2,
            min_literal_chars: 2,
            max_literal_chars: 120,
            max_location_tokens: 3,
            max_travelers: 20,
        }
    }
}

/// Greetings, acknowledgments and near-empty messages.
pub fn is_trivial(message: &str, policy: &ExtractionPolicy) -> bool {
    let message = message.trim();
    if !message.chars().any(char::is_alphanumeric) {
        return true;
    }
    if message.chars().all(|c| c.is_ascii_digit()) {
        return false;
    }
    if message.chars().count() < policy.min_message_chars {
        return true;
    }
    tokenize(message).iter().all(|token| TRIVIAL_WORDS.contains(&token.as_str()))
}

/// Accepts any trimmed answer inside a character window.
#[derive(Clone, Debug)]
pub struct LiteralRecognizer {
    min_chars: usize,
    max_chars: usize,
}

impl LiteralRecognizer {
    pub fn new(min_chars: usize, max_chars: usize) -> Self {
        let min_chars = min_chars.max(1);
        Self { min_chars, max_chars: max_chars.max(min_chars) }
    }
}

impl Recognizer for LiteralRecognizer {
    fn answer(&self, text: &str) -> Option<SlotValue> {
        if is_question(text) {
            return None;
        }
        let answer = trim_answer(text);
        let length = answer.chars().count();
        (self.min_chars..=self.max_chars).contains(&length).then(|| SlotValue::text(answer))
    }
}

pub trait SlotExtractor: Send + Sync {
    fn try_extract(
        &self,
        message: &str,
        slots: &TravelInfo,
        expected_key: Option<&str>,
    ) -> Result<ExtractionResult, DomainError>;
}

pub struct RuleBasedExtractor {
    schema: Arc<FieldSchema>,
    registry: RecognizerRegistry,
    policy: ExtractionPolicy,
}

impl RuleBasedExtractor {
    pub fn new(schema: Arc<FieldSchema>, policy: ExtractionPolicy) -> Self {
        let registry = RecognizerRegistry::for_schema(&schema, &policy);
        Self { schema, registry, policy }
    }

    pub fn with_registry(
        schema: Arc<FieldSchema>,
        registry: RecognizerRegistry,
        policy: ExtractionPolicy,
    ) -> Self {
        Self { schema, registry, policy }
    }

    pub fn policy(&self) -> &ExtractionPolicy {
        &self.policy
    }

    pub fn extract(
        &self,
        message: &str,
        slots: &TravelInfo,
        expected_key: Option<&str>,
    ) -> ExtractionResult {
        let mut extracted = ExtractionResult::new();
        if is_trivial(message, &self.policy) {
            debug!(event_name = "extraction.trivial_message", "message carries no field values");
            return extracted;
        }

        if let Some(key) = expected_key.filter(|key| !slots.is_filled(key)) {
            let answer = self.registry.get(key).and_then(|recognizer| recognizer.answer(message));
            if let Some(value) = answer {
                extracted.insert(key, value);
            }
        }

        for field in self.schema.fields() {
            if slots.is_filled(&field.key) || extracted.contains(&field.key) {
                continue;
            }
            let Some(recognizer) = self.registry.get(&field.key) else {
                continue;
            };
            if let Some(value) = recognizer.scan(message) {
                extracted.insert(field.key.clone(), value);
            }
        }

        debug!(
            event_name = "extraction.completed",
            expected_key = expected_key.unwrap_or("none"),
            extracted_keys = ?extracted.keys().collect::<Vec<_>>(),
            "message extraction completed"
        );
        extracted
    }
}

impl SlotExtractor for RuleBasedExtractor {
    fn try_extract(
        &self,
        message: &str,
        slots: &TravelInfo,
        expected_key: Option<&str>,
    ) -> Result<ExtractionResult, DomainError> {
        Ok(self.extract(message, slots, expected_key))
    }
}
