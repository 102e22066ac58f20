use std::sync::OnceLock;

use regex::{Captures, Regex};

use crate::domain::slots::SlotValue;
use crate::extraction::registry::Recognizer;
use crate::extraction::text::{contains_phrase, is_question, tokenize};

/// Words that make a bare "may" read as the month.
const MAY_LEADS: &[&str] = &[
    "in", "during", "this", "next", "of", "until", "till", "by", "from", "since", "to", "through",
];

const RANGE_JOINERS: &[&str] =
    &["-", "\u{2013}", "to", "until", "till", "through", "thru", "and", "or"];

/// A numeric pair followed by one of these is a quantity, not a date.
const QUANTITY_WORDS: &[&str] = &[
    "people", "persons", "adults", "kids", "children", "travelers", "travellers", "guests",
    "days", "nights", "weeks", "months", "hours", "stars",
];

const OPEN_ENDED: &[&str] = &["flexible", "anytime", "any time", "whenever"];

#[derive(Clone, Debug, Default)]
pub struct DateRecognizer;

impl DateRecognizer {
    pub fn new() -> Self {
        Self
    }
}

impl Recognizer for DateRecognizer {
    fn answer(&self, text: &str) -> Option<SlotValue> {
        if is_question(text) {
            return None;
        }
        self.scan(text).or_else(|| {
            let tokens = tokenize(text);
            OPEN_ENDED
                .iter()
                .find(|phrase| contains_phrase(&tokens, phrase))
                .map(|phrase| SlotValue::text(*phrase))
        })
    }

    fn scan(&self, text: &str) -> Option<SlotValue> {
        let spans = absolute_spans(text);
        if let Some(span) = joined_range(text, &spans) {
            return Some(SlotValue::text(text[span.start..span.end].trim()));
        }

        relative_regex()
            .find(text)
            .map(|found| SlotValue::text(strip_preposition(found.as_str())))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Span {
    start: usize,
    end: usize,
}

fn month_regex() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r"(?i)\b(?:(?P<part>early|mid|late|end\s+of|beginning\s+of)[\s-]+)?(?:(?P<lead_day>[12]\d|3[01]|0?[1-9])(?:st|nd|rd|th)?\s+(?:of\s+)?)?(?P<month>january|february|march|april|may|june|july|august|september|october|november|december|jan|feb|mar|apr|jun|jul|aug|sept|sep|oct|nov|dec)\b\.?(?:\s+(?P<day>[12]\d|3[01]|0?[1-9])(?:st|nd|rd|th)?\b(?:\s*[-\x{2013}]\s*(?:[12]\d|3[01]|0?[1-9])(?:st|nd|rd|th)?\b)?)?(?:,?\s+(?P<year>\d{4})\b)?",
        )
        .expect("month date pattern is valid")
    })
}

fn numeric_regex() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r"\b(?P<first>\d{1,2})[/-](?P<second>\d{1,2})(?:[/-](?P<year>\d{4}|\d{2}))?\b",
        )
        .expect("numeric date pattern is valid")
    })
}

fn relative_regex() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r"(?i)\b(?:(?:next|this|coming)\s+(?:weekend|week|month|year|summer|winter|spring|autumn|fall)|(?:early|mid|late)[\s-](?:summer|winter|spring|autumn|fall)|(?:in|during|over)\s+(?:the\s+)?(?:summer|winter|spring|autumn|fall)|(?:summer|winter|spring|christmas|easter)\s+(?:holidays?|break|vacation)|christmas|easter|thanksgiving|new\s+year'?s?)\b",
        )
        .expect("relative date pattern is valid")
    })
}

/// `text` with every calendar date blanked out, for recognizers that read bare numbers.
pub fn mask_dates(text: &str) -> String {
    let mut masked = text.to_owned();
    for span in absolute_spans(text).iter().rev() {
        masked.replace_range(span.start..span.end, " ");
    }
    masked
}

fn absolute_spans(text: &str) -> Vec<Span> {
    let mut spans = Vec::new();

    for captures in month_regex().captures_iter(text) {
        let Some(whole) = captures.get(0) else {
            continue;
        };
        if is_bare_may(text, &captures, whole.start()) {
            continue;
        }
        spans.push(Span { start: whole.start(), end: whole.end() });
    }

    for captures in numeric_regex().captures_iter(text) {
        let Some(whole) = captures.get(0) else {
            continue;
        };
        if valid_day_month(&captures) && !followed_by_quantity(&text[whole.end()..]) {
            spans.push(Span { start: whole.start(), end: whole.end() });
        }
    }

    spans.sort_by_key(|span| span.start);
    let mut disjoint: Vec<Span> = Vec::with_capacity(spans.len());
    for span in spans {
        if disjoint.last().is_some_and(|last| span.start < last.end) {
            continue;
        }
        disjoint.push(span);
    }
    disjoint
}

/// Joins the first two dates when they read as a range ("June 3 to June 10").
fn joined_range(text: &str, spans: &[Span]) -> Option<Span> {
    let first = *spans.first()?;
    let Some(second) = spans.get(1) else {
        return Some(first);
    };

    let gap = text[first.end..second.start].trim().to_lowercase();
    if RANGE_JOINERS.contains(&gap.as_str()) {
        Some(Span { start: first.start, end: second.end })
    } else {
        Some(first)
    }
}

fn is_bare_may(text: &str, captures: &Captures<'_>, start: usize) -> bool {
    let is_may =
        captures.name("month").is_some_and(|month| month.as_str().eq_ignore_ascii_case("may"));
    let qualified =
        ["part", "lead_day", "day", "year"].iter().any(|name| captures.name(name).is_some());
    if !is_may || qualified {
        return false;
    }
    let previous = tokenize(&text[..start]).pop();
    !previous.is_some_and(|word| MAY_LEADS.contains(&word.as_str()))
}

/// Accepts day/month and month/day orderings.
fn valid_day_month(captures: &Captures<'_>) -> bool {
    let parse =
        |name: &str| captures.name(name).and_then(|value| value.as_str().parse::<u8>().ok());
    let (Some(first), Some(second)) = (parse("first"), parse("second")) else {
        return false;
    };
    let day_month = (1..=31).contains(&first) && (1..=12).contains(&second);
    let month_day = (1..=12).contains(&first) && (1..=31).contains(&second);
    day_month || month_day
}

fn followed_by_quantity(rest: &str) -> bool {
    tokenize(rest).first().is_some_and(|word| QUANTITY_WORDS.contains(&word.as_str()))
}

fn strip_preposition(phrase: &str) -> String {
    let mut words = phrase.split_whitespace().collect::<Vec<_>>();
    let leading = words.first().map(|word| word.to_lowercase());
    if matches!(leading.as_deref(), Some("in" | "during" | "over")) {
        words.remove(0);
        if words.first().is_some_and(|word| word.eq_ignore_ascii_case("the")) {
            words.remove(0);
        }
    }
    words.join(" ")
}
