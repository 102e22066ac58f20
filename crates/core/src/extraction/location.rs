use std::sync::OnceLock;

use regex::Regex;

use crate::domain::slots::SlotValue;
use crate::extraction::registry::Recognizer;
use crate::extraction::text::{is_month, is_question, tokenize, trim_answer};

/// Words that never start or appear in a place name answer.
const NON_PLACE_WORDS: &[&str] = &[
    "i", "i'm", "im", "i'd", "i'll", "i've", "we", "we're", "we'd", "we'll", "we've", "let's",
    "my", "our", "me", "you", "they", "it", "it's", "don't", "dont",
    "know", "sure", "unsure", "idea", "maybe", "perhaps", "probably", "not", "yet", "undecided",
    "decided", "deciding", "haven't", "havent", "hmm", "hm", "um", "uh", "idk", "dunno",
    "honestly", "good", "great", "let", "think", "thinking", "question", "still", "check", "ask",
    "later", "wait", "whatever", "depends", "nothing", "nowhere", "anything", "anywhere",
    "somewhere", "everywhere", "home", "work", "no", "none", "please", "thanks", "there", "here",
    "from", "to",
];

/// Words that may follow a place name in a direct answer ("Lisbon in June", "Paris please").
const TRAILING_DETAIL: &[&str] =
    &["in", "on", "for", "with", "around", "during", "next", "this", "and", "please"];

/// Lowercase particles allowed inside multi-word place names.
const NAME_PARTICLES: &[&str] = &[
    "de", "del", "da", "das", "do", "dos", "di", "la", "le", "les", "of", "on", "upon", "van",
    "von",
];

const DESTINATION_CONNECTORS: &[&str] = &[
    "i want to go to",
    "i'd like to go to",
    "we want to go to",
    "thinking of going to",
    "going to",
    "travel to",
    "traveling to",
    "travelling to",
    "visit",
    "visiting",
    "to",
];

const DEPARTURE_CONNECTORS: &[&str] = &[
    "we're leaving from",
    "leaving from",
    "departing from",
    "starting from",
    "flying from",
    "flying out of",
    "i live in",
    "we live in",
    "i'm in",
    "i am in",
    "based in",
    "from",
];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LocationRole {
    Destination,
    Departure,
}

#[derive(Clone, Debug)]
pub struct LocationRecognizer {
    role: LocationRole,
    max_tokens: usize,
}

impl LocationRecognizer {
    pub fn new(role: LocationRole, max_tokens: usize) -> Self {
        Self { role, max_tokens: max_tokens.max(1) }
    }

    fn connectors(&self) -> &'static [&'static str] {
        match self.role {
            LocationRole::Destination => DESTINATION_CONNECTORS,
            LocationRole::Departure => DEPARTURE_CONNECTORS,
        }
    }

    /// Connectors that introduce the other location role.
    fn opposing_connectors(&self) -> &'static [&'static str] {
        match self.role {
            LocationRole::Destination => DEPARTURE_CONNECTORS,
            LocationRole::Departure => DESTINATION_CONNECTORS,
        }
    }

    fn pattern(&self) -> &'static Regex {
        match self.role {
            LocationRole::Destination => destination_regex(),
            LocationRole::Departure => departure_regex(),
        }
    }
}

impl Recognizer for LocationRecognizer {
    fn answer(&self, text: &str) -> Option<SlotValue> {
        if is_question(text) {
            return None;
        }
        let answer = trim_answer(text);
        if connector_rest(answer, self.opposing_connectors()).is_some() {
            return None;
        }
        let candidate = connector_rest(answer, self.connectors()).unwrap_or(answer);
        accept_place(candidate, self.max_tokens)
            .or_else(|| self.leading_place_with_detail(candidate))
            .map(SlotValue::text)
    }

    fn scan(&self, text: &str) -> Option<SlotValue> {
        self.pattern().captures_iter(text).find_map(|captures| {
            let tail = captures.name("place")?.as_str();
            leading_place_name(tail, self.max_tokens).map(SlotValue::text)
        })
    }
}

impl LocationRecognizer {
    /// A capitalized lead followed by nothing or by trip detail. Any other continuation means
    /// the first word was only the start of a sentence.
    fn leading_place_with_detail(&self, text: &str) -> Option<String> {
        let place = leading_place_name(text, self.max_tokens)?;
        let Some(next) = text.split_whitespace().nth(place.split_whitespace().count()) else {
            return Some(place);
        };
        let next = next.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase();
        let opposing_lead = match self.role {
            LocationRole::Destination => "from",
            LocationRole::Departure => "to",
        };
        (TRAILING_DETAIL.contains(&next.as_str()) || next == opposing_lead).then_some(place)
    }
}

fn destination_regex() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r"(?i)\b(?:(?:travel(?:l?ing)?|go(?:ing)?|trip|fly(?:ing)?|head(?:ing)?|mov(?:e|ing)|getaway)\s+to|visit(?:ing)?|explor(?:e|ing)|destination(?:\s+is)?)\s+(?P<place>\p{L}[\p{L}\s,'.-]*)",
        )
        .expect("destination pattern is valid")
    })
}

fn departure_regex() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r"(?i)\b(?:(?:leaving|departing|starting|flying)\s+from|flying\s+out\s+of|based\s+in|(?:i|we)\s+live\s+in|from)\s+(?P<place>\p{L}[\p{L}\s,'.-]*)",
        )
        .expect("departure pattern is valid")
    })
}

/// The text after a leading connector, when one is present as a whole phrase.
fn connector_rest<'a>(text: &'a str, connectors: &[&str]) -> Option<&'a str> {
    let lowered = text.to_lowercase();
    connectors.iter().find_map(|connector| {
        if !lowered.starts_with(connector) {
            return None;
        }
        text.get(connector.len()..)
            .filter(|rest| rest.starts_with(char::is_whitespace))
            .map(str::trim)
    })
}

/// Accepts a whole answer as a place name.
fn accept_place(candidate: &str, max_tokens: usize) -> Option<String> {
    let candidate =
        candidate.trim().trim_matches(|c: char| matches!(c, '.' | ',' | '!' | ';' | ':'));
    if candidate.is_empty() {
        return None;
    }
    if !candidate.chars().all(|c| c.is_alphabetic() || matches!(c, ' ' | ',' | '\'' | '-' | '.')) {
        return None;
    }

    let words = candidate.split_whitespace().collect::<Vec<_>>();
    let capitalized = words.iter().all(|word| starts_uppercase(word) || is_particle(word));
    let within_budget = words.len() <= max_tokens || (capitalized && words.len() <= max_tokens + 2);
    if !within_budget {
        return None;
    }

    let tokens = tokenize(candidate);
    if tokens.iter().any(|token| NON_PLACE_WORDS.contains(&token.as_str())) {
        return None;
    }
    if tokens.iter().any(|token| is_month(token)) {
        return None;
    }

    Some(words.join(" "))
}

/// Takes the run of capitalized words at the start of a pattern capture.
fn leading_place_name(tail: &str, max_tokens: usize) -> Option<String> {
    let mut words = Vec::new();
    for raw in tail.split_whitespace() {
        let ends_clause = raw.ends_with([',', '.', ';']);
        let word = raw.trim_end_matches([',', '.', ';']);
        let accepted = if words.is_empty() {
            starts_uppercase(word)
        } else {
            starts_uppercase(word) || is_particle(word)
        };
        if !accepted || word.is_empty() {
            break;
        }
        words.push(word);
        if ends_clause || words.len() >= max_tokens + 2 {
            break;
        }
    }

    while words.last().is_some_and(|word| is_particle(word)) {
        words.pop();
    }

    accept_place(&words.join(" "), max_tokens + 2).filter(|_| !words.is_empty())
}

fn starts_uppercase(word: &str) -> bool {
    word.chars().next().is_some_and(char::is_uppercase)
}

fn is_particle(word: &str) -> bool {
    NAME_PARTICLES.contains(&word)
}
