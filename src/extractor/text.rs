//! Bounded text helpers shared by the extractor, the rules and prompt builders.

use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;

/// Abbreviations whose trailing period must not end a sentence.
const ABBREVIATIONS: &[&str] = &[
    "Dr.", "Prof.", "Mr.", "Mrs.", "Ms.", "Inc.", "Ltd.", "Jr.", "Sr.", "St.", "vs.", "etc.",
    "e.g.", "i.e.", "U.S.", "approx.", "No.",
];

/// Stand-in for a masked period; never appears in crawled text.
const MASK: char = '\u{E000}';

/// Keep at most `max_chars` characters.
pub fn truncate_chars(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}

pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Remove anything that still looks like a tag.
pub fn strip_markup(s: &str) -> String {
    static TAG: OnceLock<Regex> = OnceLock::new();
    let tag = TAG.get_or_init(|| Regex::new(r"<[^>]*>").expect("static regex"));
    collapse_whitespace(&tag.replace_all(s, " "))
}

pub fn count_words(s: &str) -> usize {
    s.split_whitespace().count()
}

/// Split text into sentences on `.`, `!` and `?`, ignoring known abbreviations.
pub fn split_sentences(text: &str) -> Vec<String> {
    let mut masked = text.to_string();
    for abbreviation in ABBREVIATIONS {
        if masked.contains(abbreviation) {
            masked = mask_abbreviation(&masked, abbreviation);
        }
    }

    masked
        .split(['.', '!', '?'])
        .map(|s| s.replace(MASK, ".").trim().to_string())
        .filter(|s| s.chars().any(char::is_alphanumeric))
        .collect()
}

/// Mask the periods of `abbreviation` where it starts a word.
fn mask_abbreviation(text: &str, abbreviation: &str) -> String {
    let replacement = abbreviation.replace('.', &MASK.to_string());
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for (idx, _) in text.match_indices(abbreviation) {
        let before = text[..idx].chars().next_back();
        if before.is_some_and(char::is_alphanumeric) {
            continue;
        }
        out.push_str(&text[last..idx]);
        out.push_str(&replacement);
        last = idx + abbreviation.len();
    }
    out.push_str(&text[last..]);
    out
}

/// Average words per sentence, 0.0 when there are no sentences.
pub fn average_sentence_length(sentences: &[String]) -> f64 {
    if sentences.is_empty() {
        return 0.0;
    }
    let words: usize = sentences.iter().map(|s| count_words(s)).sum();
    words as f64 / sentences.len() as f64
}

/// Trim, drop empties, de-duplicate (case-insensitive, first spelling wins) and cap.
pub fn dedup_capped<I>(items: I, cap: usize) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for item in items {
        let item = strip_markup(item.trim());
        if item.is_empty() {
            continue;
        }
        if seen.insert(item.to_lowercase()) {
            out.push(item);
            if out.len() >= cap {
                break;
            }
        }
    }
    out
}

/// Case-insensitive whole-word containment.
pub fn contains_term(haystack_lower: &str, term: &str) -> bool {
    let term = term.trim().to_lowercase();
    if term.is_empty() {
        return false;
    }
    haystack_lower.match_indices(&term).any(|(idx, _)| {
        let before = haystack_lower[..idx].chars().next_back();
        let after = haystack_lower[idx + term.len()..].chars().next();
        !before.is_some_and(char::is_alphanumeric) && !after.is_some_and(char::is_alphanumeric)
    })
}
