use crate::domain::slots::SlotValue;
use crate::extraction::dates::mask_dates;
use crate::extraction::registry::Recognizer;
use crate::extraction::text::{contains_phrase, is_question, small_number, tokenize};

const GROUP_UNITS: &[&str] =
    &["people", "persons", "travelers", "travellers", "guests", "pax", "passengers"];
const ADULT_UNITS: &[&str] = &["adults", "adult", "grownups"];
const CHILD_UNITS: &[&str] = &["kids", "kid", "children", "child", "teens", "infants", "babies"];

const SOLO_PHRASES: &[&str] =
    &["solo", "alone", "just me", "only me", "on my own", "by myself", "myself only"];
const COUPLE_PHRASES: &[&str] = &["honeymoon", "both of us", "me and my partner"];

const COMPANIONS: &[&str] = &[
    "wife", "husband", "partner", "girlfriend", "boyfriend", "fiance", "fiancee", "spouse",
    "friend", "mom", "mum", "dad", "mother", "father", "sister", "brother", "son", "daughter",
    "kid", "child", "baby",
];
const COMPANION_GROUPS: &[&str] =
    &["friends", "kids", "children", "parents", "sisters", "brothers", "sons", "daughters"];
const COMPANION_LEADS: &[&str] = &["my", "our", "with", "and", "plus", "few", "some"];

/// Resolves how many people are traveling, quantifier phrases first.
#[derive(Clone, Debug)]
pub struct TravelerCountRecognizer {
    max_travelers: u8,
}

impl TravelerCountRecognizer {
    pub fn new(max_travelers: u8) -> Self {
        Self { max_travelers: max_travelers.max(1) }
    }

    fn bounded(&self, count: u32) -> Option<SlotValue> {
        u8::try_from(count)
            .ok()
            .filter(|count| (1..=self.max_travelers).contains(count))
            .map(SlotValue::Count)
    }

    fn quantified(&self, tokens: &[String]) -> Option<SlotValue> {
        if let Some(count) = family_of(tokens).or_else(|| stated_party(tokens)) {
            return self.bounded(count);
        }
        if let Some(companions) = companion_count(tokens) {
            return self.bounded((companions + 1).max(2));
        }
        if SOLO_PHRASES.iter().any(|phrase| contains_phrase(tokens, phrase)) {
            return self.bounded(1);
        }
        if is_couple(tokens) {
            return self.bounded(2);
        }
        None
    }
}

impl Recognizer for TravelerCountRecognizer {
    fn answer(&self, text: &str) -> Option<SlotValue> {
        if is_question(text) {
            return None;
        }
        let tokens = tokenize(text);
        self.quantified(&tokens).or_else(|| {
            tokenize(&mask_dates(text))
                .iter()
                .find_map(|token| small_number(token))
                .and_then(|count| self.bounded(u32::from(count)))
        })
    }

    fn scan(&self, text: &str) -> Option<SlotValue> {
        self.quantified(&tokenize(text))
    }
}

/// "family of 5", "party of four", "group of 6".
fn family_of(tokens: &[String]) -> Option<u32> {
    tokens.windows(3).find_map(|window| {
        let lead = matches!(window[0].as_str(), "family" | "party" | "group");
        (lead && window[1] == "of").then(|| small_number(&window[2])).flatten().map(u32::from)
    })
}

/// "4 people", "three of us", "2 adults and 2 kids".
fn stated_party(tokens: &[String]) -> Option<u32> {
    let mut members = 0_u32;
    let mut has_adults = false;

    for (index, token) in tokens.iter().enumerate() {
        let Some(count) = small_number(token).map(u32::from) else {
            continue;
        };
        let next = tokens.get(index + 1).map(String::as_str);
        match next {
            Some(unit) if GROUP_UNITS.contains(&unit) => return Some(count),
            Some("of") if tokens.get(index + 2).is_some_and(|word| word == "us") => {
                return Some(count)
            }
            Some(unit) if ADULT_UNITS.contains(&unit) => {
                members += count;
                has_adults = true;
            }
            Some(unit) if CHILD_UNITS.contains(&unit) => members += count,
            _ => {}
        }
    }

    (has_adults && members > 0).then_some(members)
}

/// Counts companions named next to a possessive or conjunction ("my wife", "with 2 kids").
fn companion_count(tokens: &[String]) -> Option<u32> {
    let mut companions = 0_u32;

    for (index, token) in tokens.iter().enumerate() {
        let single = COMPANIONS.contains(&token.as_str());
        let group = COMPANION_GROUPS.contains(&token.as_str());
        if !single && !group {
            continue;
        }

        let lead_window = &tokens[index.saturating_sub(2)..index];
        let stated = index
            .checked_sub(1)
            .and_then(|previous| small_number(&tokens[previous]))
            .map(u32::from);
        let introduced = stated.is_some()
            || lead_window.iter().any(|word| COMPANION_LEADS.contains(&word.as_str()));
        if !introduced {
            continue;
        }

        companions += match (stated, group) {
            (Some(count), _) => count,
            (None, true) => 2,
            (None, false) => 1,
        };
    }

    (companions > 0).then_some(companions)
}

fn is_couple(tokens: &[String]) -> bool {
    let couple = tokens.iter().enumerate().any(|(index, token)| {
        token == "couple" && tokens.get(index + 1).map(String::as_str) != Some("of")
    });
    couple || COUPLE_PHRASES.iter().any(|phrase| contains_phrase(tokens, phrase))
}
