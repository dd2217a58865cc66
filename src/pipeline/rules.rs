//! Keyword rules: the heuristic classifier used when the LLM path fails.
//!
//! Two pure pieces:
//! - `KeywordMatcher` decides placement relevance from sender indicators and
//!   subject keywords.
//! - `extract_fields` guesses company and role from the sender domain and
//!   subject.
//!
//! Nothing here does I/O.

use tracing::debug;

use crate::pipeline::types::{DEFAULT_ROLE, UNKNOWN_COMPANY};

/// High-confidence sender markers (placement cells, HR, careers teams).
pub const SENDER_INDICATORS: [&str; 6] = ["placement", "cdc", "hr", "recruit", "career", "talent"];

/// Role keywords in priority order. The first entry present in the subject wins.
pub const ROLE_KEYWORDS: [&str; 6] = [
    "engineer",
    "developer",
    "analyst",
    "intern",
    "manager",
    "associate",
];

/// Domain fragments that identify a relay rather than the hiring company.
const RELAY_DOMAIN_MARKERS: [&str; 2] = ["placements", "noreply"];

/// Subject/sender keyword matcher.
#[derive(Debug, Clone, Default)]
pub struct KeywordMatcher {
    /// Case-folded, de-duplicated subject keywords.
    keywords: Vec<String>,
}

impl KeywordMatcher {
    /// Build a matcher from configured subject keywords.
    pub fn new<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut folded: Vec<String> = Vec::new();
        for keyword in keywords {
            let keyword = keyword.as_ref().trim().to_lowercase();
            if !keyword.is_empty() && !folded.contains(&keyword) {
                folded.push(keyword);
            }
        }
        Self { keywords: folded }
    }

    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }

    /// Does this subject/sender pair look placement-related?
    pub fn matches(&self, subject: &str, sender: &str) -> bool {
        let sender = sender.to_lowercase();
        if let Some(indicator) = SENDER_INDICATORS.iter().find(|i| sender.contains(*i)) {
            debug!(sender = %sender, indicator, "Sender matched placement indicator");
            return true;
        }

        let subject = subject.to_lowercase();
        if let Some(keyword) = self.keywords.iter().find(|k| subject.contains(k.as_str())) {
            debug!(keyword = %keyword, "Subject matched placement keyword");
            return true;
        }

        false
    }
}

/// Guess `(company, role)` from sender and subject.
pub fn extract_fields(subject: &str, sender: &str) -> (String, String) {
    (company_from_sender(sender), role_from_subject(subject))
}

fn company_from_sender(sender: &str) -> String {
    let Some((_, domain)) = sender.split_once('@') else {
        return UNKNOWN_COMPANY.to_string();
    };
    let domain = domain.to_lowercase();
    if RELAY_DOMAIN_MARKERS.iter().any(|m| domain.contains(m)) {
        return UNKNOWN_COMPANY.to_string();
    }
    match domain.split('.').next() {
        Some(label) if !label.trim().is_empty() => title_case(label.trim()),
        _ => UNKNOWN_COMPANY.to_string(),
    }
}

fn role_from_subject(subject: &str) -> String {
    let subject = subject.to_lowercase();
    ROLE_KEYWORDS
        .iter()
        .find(|k| subject.contains(*k))
        .map(|k| title_case(k))
        .unwrap_or_else(|| DEFAULT_ROLE.to_string())
}

/// Uppercase the first letter of every alphabetic run, lowercase the rest.
pub fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut at_word_start = true;
    for ch in s.chars() {
        if ch.is_alphabetic() {
            if at_word_start {
                out.extend(ch.to_uppercase());
            } else {
                out.extend(ch.to_lowercase());
            }
            at_word_start = false;
        } else {
            out.push(ch);
            at_word_start = true;
        }
    }
    out
}
