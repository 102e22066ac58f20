//! Field Schema
//!
//! The ordered set of slots a conversation collects. Order drives the default question
//! sequence; `kind` binds each field to a recognizer in the extraction registry.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::slots::SlotValue;

pub const VALUE_PLACEHOLDER: &str = "{value}";

/// Recognizer family bound to a field.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Destination,
    Departure,
    Dates,
    TravelerCount,
    Budget,
    /// Keyword set; matched keywords become the value.
    Choice,
    /// Any short free-text answer.
    #[default]
    Text,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDefinition {
    pub key: String,
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acknowledgment_template: Option<String>,
    #[serde(default)]
    pub kind: FieldKind,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keywords: Vec<String>,
}

impl FieldDefinition {
    pub fn new(key: impl Into<String>, prompt: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            key: key.into(),
            prompt: prompt.into(),
            acknowledgment_template: None,
            kind,
            keywords: Vec::new(),
        }
    }

    pub fn with_acknowledgment(mut self, template: impl Into<String>) -> Self {
        self.acknowledgment_template = Some(template.into());
        self
    }

    pub fn with_keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.keywords = keywords.into_iter().map(Into::into).collect();
        self
    }

    /// Renders the acknowledgment template for `value`, if the field has one.
    pub fn acknowledge(&self, value: &SlotValue) -> Option<String> {
        self.acknowledgment_template
            .as_ref()
            .map(|template| template.replace(VALUE_PLACEHOLDER, &value.to_string()))
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SchemaError {
    #[error("field schema must define at least one field")]
    Empty,
    #[error("field at position {position} has an empty key")]
    EmptyKey { position: usize },
    #[error("field key `{0}` is defined more than once")]
    DuplicateKey(String),
    #[error("field `{0}` has an empty prompt")]
    EmptyPrompt(String),
    #[error("acknowledgment for field `{0}` must not ask a question")]
    QuestionInAcknowledgment(String),
    #[error("choice field `{0}` must list at least one keyword")]
    MissingKeywords(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldSchema {
    fields: Vec<FieldDefinition>,
    index: HashMap<String, usize>,
}

impl FieldSchema {
    pub fn new(fields: Vec<FieldDefinition>) -> Result<Self, SchemaError> {
        if fields.is_empty() {
            return Err(SchemaError::Empty);
        }

        for (position, field) in fields.iter().enumerate() {
            if field.key.trim().is_empty() {
                return Err(SchemaError::EmptyKey { position });
            }
            if field.prompt.trim().is_empty() {
                return Err(SchemaError::EmptyPrompt(field.key.clone()));
            }
            if field.acknowledgment_template.as_deref().is_some_and(|ack| ack.contains('?')) {
                return Err(SchemaError::QuestionInAcknowledgment(field.key.clone()));
            }
            if field.kind == FieldKind::Choice
                && field.keywords.iter().all(|keyword| keyword.trim().is_empty())
            {
                return Err(SchemaError::MissingKeywords(field.key.clone()));
            }
        }

        let schema = Self::indexed(fields);
        if schema.index.len() != schema.fields.len() {
            let mut seen = HashSet::new();
            for field in &schema.fields {
                if !seen.insert(field.key.as_str()) {
                    return Err(SchemaError::DuplicateKey(field.key.clone()));
                }
            }
        }

        Ok(schema)
    }

    /// The travel-planning flow: fifteen fields, location and timing first.
    pub fn travel() -> Self {
        use FieldKind::{Budget, Choice, Dates, Departure, Destination, Text, TravelerCount};

        Self::indexed(vec![
            FieldDefinition::new("destination", "Where would you like to travel to?", Destination)
                .with_acknowledgment("{value} sounds amazing!"),
            FieldDefinition::new(
                "departure_location",
                "Where will you be traveling from?",
                Departure,
            )
            .with_acknowledgment("Great, traveling from {value}."),
            FieldDefinition::new("journey_dates", "When would you like to travel?", Dates)
                .with_acknowledgment("Perfect timing for {value}."),
            FieldDefinition::new(
                "travelers_count",
                "How many people will be traveling?",
                TravelerCount,
            )
            .with_acknowledgment("Lovely, {value} travelers."),
            FieldDefinition::new(
                "budget",
                "What's your approximate budget for this trip?",
                Budget,
            )
            .with_acknowledgment("Got it, working with a {value} budget."),
            FieldDefinition::new(
                "travel_style",
                "What type of experience are you looking for? (adventure, relaxation, culture, luxury, etc.)",
                Choice,
            )
            .with_keywords([
                "adventure",
                "adventurous",
                "relaxation",
                "relaxing",
                "culture",
                "cultural",
                "luxury",
                "romantic",
                "backpacking",
                "road trip",
                "beach holiday",
            ]),
            FieldDefinition::new(
                "accommodation_preference",
                "What's your accommodation preference? (budget, comfort, luxury, unique)",
                Text,
            ),
            FieldDefinition::new(
                "interests",
                "What interests you most? (culture, food, nightlife, nature, shopping, history, etc.)",
                Text,
            ),
            FieldDefinition::new(
                "travel_pace",
                "Do you prefer a relaxed, balanced, or busy travel pace?",
                Choice,
            )
            .with_keywords(["relaxed", "balanced", "busy", "slow", "fast", "packed", "leisurely"]),
            FieldDefinition::new(
                "spending_priorities",
                "Where would you like to prioritize spending? (accommodation, food, activities, shopping)",
                Text,
            ),
            FieldDefinition::new(
                "accommodation_type",
                "What type of accommodation do you prefer? (hotel, resort, apartment, villa, etc.)",
                Choice,
            )
            .with_keywords([
                "hotel",
                "boutique hotel",
                "resort",
                "apartment",
                "villa",
                "hostel",
                "airbnb",
                "guesthouse",
                "bed and breakfast",
                "cabin",
            ]),
            FieldDefinition::new(
                "location_preference",
                "Where would you prefer to stay? (city center, near beach, quiet area, etc.)",
                Text,
            ),
            FieldDefinition::new(
                "important_amenities",
                "What amenities are important to you? (wifi, pool, gym, spa, etc.)",
                Choice,
            )
            .with_keywords(["wifi", "wi-fi", "pool", "gym", "spa", "parking", "breakfast", "kitchen"]),
            FieldDefinition::new(
                "dietary_restrictions",
                "Do you have any dietary restrictions?",
                Text,
            ),
            FieldDefinition::new(
                "accessibility_requirements",
                "Any accessibility requirements we should know about?",
                Text,
            ),
        ])
    }

    fn indexed(fields: Vec<FieldDefinition>) -> Self {
        let index =
            fields.iter().enumerate().map(|(position, field)| (field.key.clone(), position)).collect();
        Self { fields, index }
    }

    pub fn fields(&self) -> &[FieldDefinition] {
        &self.fields
    }

    pub fn get(&self, key: &str) -> Option<&FieldDefinition> {
        self.index.get(key).map(|position| &self.fields[*position])
    }

    pub fn contains(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    pub fn position(&self, key: &str) -> Option<usize> {
        self.index.get(key).copied()
    }

    pub fn first(&self) -> Option<&FieldDefinition> {
        self.fields.first()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl Default for FieldSchema {
    fn default() -> Self {
        Self::travel()
    }
}
