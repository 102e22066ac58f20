use crate::domain::slots::SlotValue;
use crate::extraction::registry::Recognizer;
use crate::extraction::text::{find_phrase, is_question, tokenize};
use crate::extraction::LiteralRecognizer;

/// Matches a field's keyword set; direct answers fall back to the literal window.
#[derive(Clone, Debug)]
pub struct ChoiceRecognizer {
    keywords: Vec<Vec<String>>,
    fallback: LiteralRecognizer,
}

impl ChoiceRecognizer {
    pub fn new(keywords: &[String], fallback: LiteralRecognizer) -> Self {
        let keywords = keywords
            .iter()
            .map(|keyword| tokenize(keyword))
            .filter(|phrase| !phrase.is_empty())
            .collect();
        Self { keywords, fallback }
    }
}

impl Recognizer for ChoiceRecognizer {
    fn answer(&self, text: &str) -> Option<SlotValue> {
        if is_question(text) {
            return None;
        }
        self.scan(text).or_else(|| self.fallback.answer(text))
    }

    fn scan(&self, text: &str) -> Option<SlotValue> {
        let tokens = tokenize(text);
        let mut hits = Vec::new();
        for phrase in &self.keywords {
            let mut offset = 0;
            while let Some(found) = find_phrase(&tokens[offset..], phrase) {
                hits.push((offset + found, phrase.len()));
                offset += found + phrase.len();
            }
        }

        // Earliest first, longer phrase first on ties so "boutique hotel" beats "hotel".
        hits.sort_by(|left, right| left.0.cmp(&right.0).then(right.1.cmp(&left.1)));

        let mut matched: Vec<String> = Vec::new();
        let mut covered_until = 0;
        for (start, len) in hits {
            if start < covered_until {
                continue;
            }
            covered_until = start + len;
            let phrase = tokens[start..start + len].join(" ");
            if !matched.iter().any(|earlier| contains_words(earlier, &phrase)) {
                matched.push(phrase);
            }
        }

        (!matched.is_empty()).then(|| SlotValue::text(matched.join(", ")))
    }
}

fn contains_words(haystack: &str, needle: &str) -> bool {
    format!(" {haystack} ").contains(&format!(" {needle} "))
}
