use std::str::FromStr;
use std::sync::OnceLock;

use regex::{Captures, Regex};
use rust_decimal::Decimal;

use crate::domain::slots::{Currency, Money, SlotValue};
use crate::extraction::registry::Recognizer;
use crate::extraction::text::{contains_phrase, is_month, is_question, tokenize};

const BUDGET_CONTEXT: &[&str] =
    &["budget", "spend", "spending", "afford", "cap", "max", "maximum", "up to", "total"];

/// Words that turn a bare number into something other than money.
const UNIT_WORDS: &[&str] = &[
    "people", "persons", "adults", "kids", "children", "travelers", "travellers", "guests",
    "pax", "of", "days", "day", "nights", "night", "weeks", "week", "months", "month", "years",
    "year", "hours", "stars", "star", "am", "pm",
];

const QUALITATIVE: &[&str] = &[
    "no limit",
    "unlimited",
    "flexible",
    "mid-range",
    "moderate",
    "medium",
    "cheap",
    "low",
    "high",
    "luxury",
    "splurge",
];

#[derive(Clone, Debug, Default)]
pub struct BudgetRecognizer;

impl BudgetRecognizer {
    pub fn new() -> Self {
        Self
    }
}

impl Recognizer for BudgetRecognizer {
    fn answer(&self, text: &str) -> Option<SlotValue> {
        if is_question(text) {
            return None;
        }
        let candidates = amounts(text);
        if let Some(amount) = preferred(&candidates).or_else(|| candidates.first()) {
            return Some(SlotValue::Money(amount.money.clone()));
        }

        let tokens = tokenize(text);
        QUALITATIVE
            .iter()
            .find(|phrase| contains_phrase(&tokens, phrase))
            .map(|phrase| SlotValue::text(*phrase))
    }

    fn scan(&self, text: &str) -> Option<SlotValue> {
        let candidates = amounts(text);
        if let Some(amount) = preferred(&candidates) {
            return Some(SlotValue::Money(amount.money.clone()));
        }

        let tokens = tokenize(text);
        if !BUDGET_CONTEXT.iter().any(|phrase| contains_phrase(&tokens, phrase)) {
            return None;
        }
        candidates.first().map(|amount| SlotValue::Money(amount.money.clone()))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct Amount {
    money: Money,
    marked: bool,
}

/// The first amount that carries a currency designation.
fn preferred(candidates: &[Amount]) -> Option<&Amount> {
    candidates.iter().find(|amount| amount.marked)
}

fn amount_regex() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r"(?i)(?:(?P<prefix>[$€£¥₹]|\b(?:usd|eur|gbp|jpy|inr|aud|cad|chf)\b)\s*)?(?P<number>\d{1,3}(?:,\d{3})+(?:\.\d+)?|\d+(?:\.\d+)?)(?:\s*(?P<multiplier>k|m|thousand|grand)\b)?(?:\s*(?P<suffix>usd|eur|gbp|jpy|inr|aud|cad|chf|dollars?|euros?|pounds?|quid|bucks|yen|rupees?|francs?)\b)?",
        )
        .expect("amount pattern is valid")
    })
}

fn amounts(text: &str) -> Vec<Amount> {
    amount_regex()
        .captures_iter(text)
        .filter_map(|captures| parse_amount(text, &captures))
        .collect()
}

fn parse_amount(text: &str, captures: &Captures<'_>) -> Option<Amount> {
    let whole = captures.get(0)?;
    let currency = captures
        .name("prefix")
        .or_else(|| captures.name("suffix"))
        .and_then(|marker| Currency::from_marker(marker.as_str()));

    if !standalone(text, whole.start(), whole.end()) {
        return None;
    }
    let unit_or_date =
        followed_by_unit(&text[whole.end()..]) || after_month(&text[..whole.start()]);
    if currency.is_none() && unit_or_date {
        return None;
    }

    let digits = captures.name("number")?.as_str().replace(',', "");
    let mut amount = Decimal::from_str(&digits).ok()?;
    let scale = match captures.name("multiplier").map(|m| m.as_str().to_lowercase()).as_deref() {
        Some("k" | "thousand" | "grand") => Some(Decimal::from(1_000)),
        Some("m") => Some(Decimal::from(1_000_000)),
        _ => None,
    };
    if let Some(scale) = scale {
        amount = amount.checked_mul(scale)?;
    }

    Some(Amount { money: Money::new(amount.normalize(), currency), marked: currency.is_some() })
}

/// Rejects numbers glued to words, dates ("15/06") or clock times ("10:30").
fn standalone(text: &str, start: usize, end: usize) -> bool {
    let before = text[..start].chars().next_back();
    let mut after = text[end..].chars();
    let next = after.next();

    let clean_before =
        before.map_or(true, |c| !c.is_alphanumeric() && !matches!(c, '/' | ':' | '.'));
    let clean_after = match next {
        None => true,
        Some('.') => !after.next().is_some_and(|c| c.is_ascii_digit()),
        Some(c) => !c.is_alphanumeric() && !matches!(c, '/' | ':' | '-'),
    };
    clean_before && clean_after
}

fn followed_by_unit(rest: &str) -> bool {
    tokenize(rest).first().is_some_and(|word| UNIT_WORDS.contains(&word.as_str()))
}

fn after_month(preceding: &str) -> bool {
    tokenize(preceding).last().is_some_and(|word| is_month(word))
}
