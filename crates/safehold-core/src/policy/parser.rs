//! Policy document parser
//!
//! The document format is plain text with markdown-ish headings and bullets:
//! a heading containing one of the section keywords opens a rule section,
//! the next heading closes it, and every `- ` / `* ` bullet inside becomes
//! one rule. The parser is an explicit two-state machine driven by a line
//! classifier, so it does not depend on any specific markup dialect.

use std::collections::BTreeSet;

use super::Rule;

/// Headings containing any of these (case-insensitive) open a rule section
const SECTION_KEYWORDS: [&str; 5] = [
    "rules",
    "constraints",
    "requirements",
    "non-negotiable",
    "enforcement",
];

/// Common words excluded from trigger-term extraction
const STOP_WORDS: [&str; 20] = [
    "change",
    "iteration",
    "should",
    "never",
    "always",
    "avoid",
    "prefer",
    "keep",
    "make",
    "ensure",
    "with",
    "from",
    "that",
    "this",
    "over",
    "for",
    "and",
    "not",
    "use",
    "only",
];

/// Words shorter than this are never trigger terms
const MIN_TERM_LEN: usize = 6;

/// Parser state: inside or outside a rule section
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Outside,
    InRuleSection,
}

/// Classification of one input line
#[derive(Debug, Clone, PartialEq, Eq)]
enum LineClass {
    /// `#`-prefixed heading; payload is the heading text
    Heading(String),
    /// `- ` / `* ` bullet; payload is the bullet text
    Bullet(String),
    /// Anything else (prose, blank)
    Other,
}

fn classify(line: &str) -> LineClass {
    let trimmed = line.trim();
    if trimmed.starts_with('#') {
        return LineClass::Heading(trimmed.trim_start_matches('#').trim().to_string());
    }
    if let Some(rest) = trimmed.strip_prefix("- ").or_else(|| trimmed.strip_prefix("* ")) {
        let text = rest.trim();
        if !text.is_empty() {
            return LineClass::Bullet(text.to_string());
        }
    }
    LineClass::Other
}

fn heading_opens_rule_section(heading: &str) -> bool {
    let lower = heading.to_lowercase();
    SECTION_KEYWORDS.iter().any(|kw| lower.contains(kw))
}

/// Parse a policy document into rules
///
/// Rule ids are assigned in document order (`RULE_000`, `RULE_001`, ...).
pub fn parse_document(document: &str) -> Vec<Rule> {
    let mut state = State::Outside;
    let mut rules = Vec::new();

    for line in document.lines() {
        match classify(line) {
            LineClass::Heading(heading) => {
                state = if heading_opens_rule_section(&heading) {
                    State::InRuleSection
                } else {
                    State::Outside
                };
            }
            LineClass::Bullet(text) if state == State::InRuleSection => {
                let index = rules.len();
                rules.push(Rule {
                    id: format!("RULE_{:03}", index),
                    description: text.clone(),
                    trigger_terms: extract_trigger_terms(&text),
                    blocking: true,
                });
            }
            _ => {}
        }
    }

    rules
}

/// Extract trigger terms from a rule description
///
/// Two sources: (a) phrases delimited by backticks or double quotes, taken
/// verbatim (lower-cased); (b) remaining words longer than five characters
/// that are not stop words, with trailing punctuation stripped. Everything
/// is deduplicated via the returned set.
pub fn extract_trigger_terms(description: &str) -> BTreeSet<String> {
    let mut terms = BTreeSet::new();

    // (a) Quoted phrases
    let mut phrase_start: Option<usize> = None;
    for (i, c) in description.char_indices() {
        if c == '`' || c == '"' {
            match phrase_start {
                None => phrase_start = Some(i + c.len_utf8()),
                Some(start) => {
                    let phrase = description[start..i].trim();
                    if !phrase.is_empty() {
                        terms.insert(phrase.to_lowercase());
                    }
                    phrase_start = None;
                }
            }
        }
    }

    // (b) Long non-stop words
    for word in description.split_whitespace() {
        let stripped: &str = word.trim_end_matches(|c: char| !c.is_alphabetic());
        let lower = stripped.to_lowercase();
        if lower.len() >= MIN_TERM_LEN && !STOP_WORDS.contains(&lower.as_str()) {
            terms.insert(lower);
        }
    }

    terms
}
