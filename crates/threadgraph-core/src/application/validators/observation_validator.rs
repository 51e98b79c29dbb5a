//! Observation validation
//!
//! An observation should be one atomic fact: short, and at most a few
//! sentences. Technical tokens such as URLs, paths, IP addresses and
//! version numbers contain dots that are not sentence breaks, so they are
//! masked before sentences are counted.

use std::sync::LazyLock;

use regex::Regex;

use super::{MAX_OBSERVATION_LENGTH, MAX_SENTENCES, MIN_OBSERVATION_LENGTH};

const PLACEHOLDER: &str = "TECH";

/// Technical patterns, applied in order
static TECHNICAL_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        // URLs
        r"(?i)\b(?:https?|ftp)://\S*[^\s.!?,;]",
        // Windows paths
        r"\b[A-Za-z]:\\\S*[^\s.!?,;]",
        // Unix paths
        r"(?:~|\.\.?)?/[\w.~/-]*[\w~/-]",
        // IPv4 addresses, optional port
        r"\b\d{1,3}(?:\.\d{1,3}){3}(?::\d+)?\b",
        // Version numbers and decimals
        r"\bv?\d+(?:\.\d+)+(?:-[\w.]*\w)?\b",
        // Dotted abbreviations and common shortened words
        r"\b(?:[A-Za-z]\.){2,}|\b(?:Mr|Mrs|Ms|Dr|Prof|Sr|Jr|St|vs|etc|approx|Inc|Ltd|Co|No|Fig)\.",
        // Single-letter initials
        r"\b[A-Z]\.\s",
        // Hostnames and dotted identifiers
        r"\b(?:[A-Za-z0-9_-]+\.)+[A-Za-z][A-Za-z0-9_-]*\b",
    ]
    .into_iter()
    .map(|pattern| Regex::new(pattern).expect("technical pattern should compile"))
    .collect()
});

static SENTENCE_BREAK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[.!?]+").expect("sentence break pattern should compile"));

/// Why an observation was rejected
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservationViolation {
    pub message: String,
    pub suggestion: String,
}

/// Validator for observation content
pub struct ObservationValidator;

impl ObservationValidator {
    /// Validate one observation
    ///
    /// Rules:
    /// - Between 5 and 150 characters
    /// - At most 3 sentences, ignoring dots inside technical tokens
    pub fn validate(content: &str) -> Result<(), ObservationViolation> {
        let length = content.trim().chars().count();

        if length < MIN_OBSERVATION_LENGTH {
            return Err(ObservationViolation {
                message: format!(
                    "Observation too short ({length} characters, minimum {MIN_OBSERVATION_LENGTH})"
                ),
                suggestion: "State a complete fact, e.g. 'Uses PostgreSQL 15'".to_string(),
            });
        }

        if length > MAX_OBSERVATION_LENGTH {
            return Err(ObservationViolation {
                message: format!(
                    "Observation too long ({length} characters, maximum {MAX_OBSERVATION_LENGTH})"
                ),
                suggestion: "Split it into several atomic observations of one fact each"
                    .to_string(),
            });
        }

        let sentences = Self::count_sentences(content);
        if sentences > MAX_SENTENCES {
            return Err(ObservationViolation {
                message: format!(
                    "Observation has too many sentences ({sentences}, maximum {MAX_SENTENCES})"
                ),
                suggestion: "Keep one fact per observation and move the rest into new ones"
                    .to_string(),
            });
        }

        Ok(())
    }

    /// Count sentences after masking technical tokens
    pub fn count_sentences(content: &str) -> usize {
        let masked = Self::mask_technical(content);
        SENTENCE_BREAK
            .split(&masked)
            .filter(|segment| !segment.trim().is_empty())
            .count()
    }

    /// Replace technical tokens with a neutral placeholder
    pub fn mask_technical(content: &str) -> String {
        TECHNICAL_PATTERNS
            .iter()
            .fold(content.to_string(), |text, pattern| {
                pattern.replace_all(&text, PLACEHOLDER).into_owned()
            })
    }
}
