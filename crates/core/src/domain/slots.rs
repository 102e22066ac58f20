use std::collections::BTreeMap;
use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    Usd,
    Eur,
    Gbp,
    Jpy,
    Inr,
    Aud,
    Cad,
    Chf,
}

impl Currency {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Usd => "USD",
            Self::Eur => "EUR",
            Self::Gbp => "GBP",
            Self::Jpy => "JPY",
            Self::Inr => "INR",
            Self::Aud => "AUD",
            Self::Cad => "CAD",
            Self::Chf => "CHF",
        }
    }

    /// Prefix used when rendering an amount. `None` renders the ISO code as a suffix.
    pub fn symbol(&self) -> Option<&'static str> {
        match self {
            Self::Usd => Some("$"),
            Self::Eur => Some("€"),
            Self::Gbp => Some("£"),
            Self::Jpy => Some("¥"),
            Self::Inr => Some("₹"),
            Self::Aud => Some("A$"),
            Self::Cad => Some("C$"),
            Self::Chf => None,
        }
    }

    /// Resolves a symbol, ISO code or currency word found next to an amount.
    pub fn from_marker(marker: &str) -> Option<Self> {
        match marker.trim().to_lowercase().as_str() {
            "$" | "usd" | "dollar" | "dollars" | "bucks" => Some(Self::Usd),
            "€" | "eur" | "euro" | "euros" => Some(Self::Eur),
            "£" | "gbp" | "pound" | "pounds" | "quid" => Some(Self::Gbp),
            "¥" | "jpy" | "yen" => Some(Self::Jpy),
            "₹" | "inr" | "rupee" | "rupees" => Some(Self::Inr),
            "aud" => Some(Self::Aud),
            "cad" => Some(Self::Cad),
            "chf" | "franc" | "francs" => Some(Self::Chf),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money {
    pub amount: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<Currency>,
}

impl Money {
    pub fn new(amount: Decimal, currency: Option<Currency>) -> Self {
        Self { amount, currency }
    }

    pub fn unmarked(amount: Decimal) -> Self {
        Self { amount, currency: None }
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.currency {
            Some(currency) => match currency.symbol() {
                Some(symbol) => write!(f, "{symbol}{}", self.amount),
                None => write!(f, "{} {}", self.amount, currency.code()),
            },
            None => write!(f, "{}", self.amount),
        }
    }
}

/// A value accepted for one slot.
///
/// Persisted states carry the untagged form: numbers are counts, objects are amounts and
/// strings are free text.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SlotValue {
    Count(u8),
    Money(Money),
    Text(String),
}

impl SlotValue {
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Self::Text(text) => text.trim().is_empty(),
            Self::Count(_) | Self::Money(_) => false,
        }
    }

    pub fn as_count(&self) -> Option<u8> {
        match self {
            Self::Count(count) => Some(*count),
            _ => None,
        }
    }
}

impl fmt::Display for SlotValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Count(count) => write!(f, "{count}"),
            Self::Money(money) => write!(f, "{money}"),
            Self::Text(text) => write!(f, "{}", text.trim()),
        }
    }
}

/// Slots accepted so far in one conversation, keyed by field key.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TravelInfo {
    slots: BTreeMap<String, SlotValue>,
}

impl TravelInfo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&SlotValue> {
        self.slots.get(key)
    }

    /// A key counts as filled only when it carries a non-empty value.
    pub fn is_filled(&self, key: &str) -> bool {
        self.slots.get(key).is_some_and(|value| !value.is_empty())
    }

    /// Stores `value` unless the key is already filled. Returns whether the value was taken.
    pub fn insert_if_absent(&mut self, key: impl Into<String>, value: SlotValue) -> bool {
        if value.is_empty() {
            return false;
        }
        let key = key.into();
        if self.is_filled(&key) {
            return false;
        }
        self.slots.insert(key, value);
        true
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &SlotValue)> {
        self.slots.iter().map(|(key, value)| (key.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

impl<K> FromIterator<(K, SlotValue)> for TravelInfo
where
    K: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, SlotValue)>>(iter: I) -> Self {
        let mut info = Self::default();
        for (key, value) in iter {
            info.insert_if_absent(key, value);
        }
        info
    }
}

/// Values recognized in the current turn only, before they are merged into `TravelInfo`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExtractionResult {
    values: BTreeMap<String, SlotValue>,
}

impl ExtractionResult {
    pub fn new() -> Self {
        Self::default()
    }

    /// First recognizer to produce a value for a key wins.
    pub fn insert(&mut self, key: impl Into<String>, value: SlotValue) -> bool {
        if value.is_empty() {
            return false;
        }
        let key = key.into();
        if self.values.contains_key(&key) {
            return false;
        }
        self.values.insert(key, value);
        true
    }

    pub fn get(&self, key: &str) -> Option<&SlotValue> {
        self.values.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &SlotValue)> {
        self.values.iter().map(|(key, value)| (key.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::{Currency, ExtractionResult, Money, SlotValue, TravelInfo};

    #[test]
    fn money_renders_symbol_or_code() {
        let euros = Money::new(Decimal::new(2000, 0), Some(Currency::Eur));
        let francs = Money::new(Decimal::new(1500, 0), Some(Currency::Chf));
        let bare = Money::unmarked(Decimal::new(2000, 0));

        assert_eq!(euros.to_string(), "€2000");
        assert_eq!(francs.to_string(), "1500 CHF");
        assert_eq!(bare.to_string(), "2000");
    }

    #[test]
    fn currency_markers_resolve_case_insensitively() {
        assert_eq!(Currency::from_marker("EUR"), Some(Currency::Eur));
        assert_eq!(Currency::from_marker("euros"), Some(Currency::Eur));
        assert_eq!(Currency::from_marker("$"), Some(Currency::Usd));
        assert_eq!(Currency::from_marker("Quid"), Some(Currency::Gbp));
        assert_eq!(Currency::from_marker("shells"), None);
    }

    #[test]
    fn filled_slots_are_never_overwritten() {
        let mut info = TravelInfo::new();
        assert!(info.insert_if_absent("destination", SlotValue::text("Lisbon")));
        assert!(!info.insert_if_absent("destination", SlotValue::text("Porto")));

        assert_eq!(info.get("destination"), Some(&SlotValue::text("Lisbon")));
    }

    #[test]
    fn blank_values_do_not_fill_a_slot() {
        let mut info = TravelInfo::new();
        assert!(!info.insert_if_absent("interests", SlotValue::text("   ")));
        assert!(!info.is_filled("interests"));
        assert!(info.is_empty());
    }

    #[test]
    fn extraction_keeps_first_value_per_key() {
        let mut extracted = ExtractionResult::new();
        assert!(extracted.insert("travelers_count", SlotValue::Count(2)));
        assert!(!extracted.insert("travelers_count", SlotValue::Count(4)));

        assert_eq!(extracted.get("travelers_count"), Some(&SlotValue::Count(2)));
        assert_eq!(extracted.len(), 1);
    }

    #[test]
    fn persisted_slots_decode_into_typed_values() {
        let raw = r#"{
            "destination": "Lisbon",
            "travelers_count": 2,
            "budget": { "amount": "2000", "currency": "EUR" }
        }"#;

        let info: TravelInfo = serde_json::from_str(raw).expect("persisted slots should decode");

        assert_eq!(info.get("destination"), Some(&SlotValue::text("Lisbon")));
        assert_eq!(info.get("travelers_count"), Some(&SlotValue::Count(2)));
        assert_eq!(
            info.get("budget").map(ToString::to_string).as_deref(),
            Some("€2000"),
            "budget should keep its currency after a round trip through storage"
        );
    }
}
