//! Completion tracking over a field schema. Slot keys outside the schema are ignored.

use crate::domain::slots::TravelInfo;
use crate::schema::{FieldDefinition, FieldSchema};

/// First field, in schema order, that has no accepted value yet.
pub fn next_field<'a>(schema: &'a FieldSchema, slots: &TravelInfo) -> Option<&'a FieldDefinition> {
    schema.fields().iter().find(|field| !slots.is_filled(&field.key))
}

pub fn filled_count(schema: &FieldSchema, slots: &TravelInfo) -> usize {
    schema.fields().iter().filter(|field| slots.is_filled(&field.key)).count()
}

/// Percentage of schema fields filled, rounded half up.
pub fn progress(schema: &FieldSchema, slots: &TravelInfo) -> u8 {
    let total = schema.len();
    if total == 0 {
        return 100;
    }
    let filled = filled_count(schema, slots);
    let percentage = (filled * 200 + total) / (total * 2);
    u8::try_from(percentage.min(100)).unwrap_or(100)
}

#[cfg(test)]
mod tests {
    use crate::domain::slots::{SlotValue, TravelInfo};
    use crate::schema::{FieldDefinition, FieldKind, FieldSchema};

    use super::{filled_count, next_field, progress};

    fn three_fields() -> FieldSchema {
        FieldSchema::new(vec![
            FieldDefinition::new("destination", "Where to?", FieldKind::Destination),
            FieldDefinition::new("journey_dates", "When?", FieldKind::Dates),
            FieldDefinition::new("budget", "How much?", FieldKind::Budget),
        ])
        .expect("valid schema")
    }

    #[test]
    fn next_field_follows_schema_order() {
        let schema = three_fields();
        let slots = TravelInfo::from_iter([("journey_dates", SlotValue::text("June"))]);

        let next = next_field(&schema, &slots).map(|field| field.key.as_str());

        assert_eq!(next, Some("destination"));
    }

    #[test]
    fn next_field_is_none_once_everything_is_filled() {
        let schema = three_fields();
        let slots = TravelInfo::from_iter([
            ("destination", SlotValue::text("Lisbon")),
            ("journey_dates", SlotValue::text("June")),
            ("budget", SlotValue::text("flexible")),
        ]);

        assert!(next_field(&schema, &slots).is_none());
        assert_eq!(progress(&schema, &slots), 100);
    }

    #[test]
    fn progress_rounds_to_nearest_percent() {
        let schema = three_fields();
        let one = TravelInfo::from_iter([("destination", SlotValue::text("Lisbon"))]);
        let two = TravelInfo::from_iter([
            ("destination", SlotValue::text("Lisbon")),
            ("budget", SlotValue::text("flexible")),
        ]);

        assert_eq!(progress(&schema, &TravelInfo::new()), 0);
        assert_eq!(progress(&schema, &one), 33);
        assert_eq!(progress(&schema, &two), 67);
    }

    #[test]
    fn travel_schema_progress_matches_fifteen_fields() {
        let schema = FieldSchema::travel();
        let slots = TravelInfo::from_iter([
            ("destination", SlotValue::text("Lisbon")),
            ("departure_location", SlotValue::text("London")),
        ]);

        assert_eq!(progress(&schema, &slots), 13);
    }

    #[test]
    fn unknown_keys_do_not_count_towards_completion() {
        let schema = three_fields();
        let slots = TravelInfo::from_iter([
            ("favourite_colour", SlotValue::text("green")),
            ("destination", SlotValue::text("Lisbon")),
        ]);

        assert_eq!(filled_count(&schema, &slots), 1);
        assert_eq!(progress(&schema, &slots), 33);
    }
}
