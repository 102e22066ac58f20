//! Shared text helpers for recognizers.

const INTERROGATIVES: &[&str] = &[
    "what", "where", "why", "how", "who", "which", "could", "would", "can", "do", "does", "is",
    "are", "should",
];

const MONTHS: &[&str] = &[
    "january",
    "february",
    "march",
    "april",
    "may",
    "june",
    "july",
    "august",
    "september",
    "october",
    "november",
    "december",
    "jan",
    "feb",
    "mar",
    "apr",
    "jun",
    "jul",
    "aug",
    "sep",
    "sept",
    "oct",
    "nov",
    "dec",
];

const NUMBER_WORDS: &[(&str, u8)] = &[
    ("one", 1),
    ("two", 2),
    ("three", 3),
    ("four", 4),
    ("five", 5),
    ("six", 6),
    ("seven", 7),
    ("eight", 8),
    ("nine", 9),
    ("ten", 10),
    ("eleven", 11),
    ("twelve", 12),
    ("thirteen", 13),
    ("fourteen", 14),
    ("fifteen", 15),
    ("sixteen", 16),
    ("seventeen", 17),
    ("eighteen", 18),
    ("nineteen", 19),
    ("twenty", 20),
];

/// Lowercased word tokens; punctuation other than apostrophes and inner hyphens splits words.
pub fn tokenize(text: &str) -> Vec<String> {
    let mut sanitized = String::with_capacity(text.len());
    for character in text.chars() {
        if character.is_alphanumeric() || matches!(character, '\'' | '’' | '-') {
            sanitized.extend(character.to_lowercase());
        } else {
            sanitized.push(' ');
        }
    }
    sanitized
        .split_whitespace()
        .map(|token| token.trim_matches('-').replace('’', "'"))
        .filter(|token| !token.is_empty())
        .collect()
}

pub fn is_question(text: &str) -> bool {
    if text.contains('?') {
        return true;
    }
    tokenize(text).first().is_some_and(|first| INTERROGATIVES.contains(&first.as_str()))
}

pub fn is_month(token: &str) -> bool {
    MONTHS.contains(&token.to_lowercase().trim_end_matches('.'))
}

pub fn number_word(token: &str) -> Option<u8> {
    let token = token.to_lowercase();
    NUMBER_WORDS.iter().find(|(word, _)| *word == token).map(|(_, value)| *value)
}

/// Parses a digit token or a number word.
pub fn small_number(token: &str) -> Option<u8> {
    token.parse::<u8>().ok().or_else(|| number_word(token))
}

pub fn number_word_pattern() -> String {
    NUMBER_WORDS.iter().map(|(word, _)| *word).collect::<Vec<_>>().join("|")
}

/// Trims whitespace and trailing sentence punctuation.
pub fn trim_answer(text: &str) -> &str {
    text.trim().trim_end_matches(['.', '!', ';', ',']).trim()
}

/// Finds `phrase` (already tokenized) as a contiguous run inside `tokens`.
pub fn find_phrase(tokens: &[String], phrase: &[String]) -> Option<usize> {
    if phrase.is_empty() || phrase.len() > tokens.len() {
        return None;
    }
    tokens.windows(phrase.len()).position(|window| window == phrase)
}

pub fn contains_phrase(tokens: &[String], phrase: &str) -> bool {
    find_phrase(tokens, &tokenize(phrase)).is_some()
}
