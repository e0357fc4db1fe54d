//! Plausibility checks for extracted transcript text.
//!
//! Validation never rejects a document; a failed report is logged and stored
//! next to the text.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

/// Words expected in a Sejm transcript.
pub const KEYWORDS: &[&str] = &[
    "posiedzenie",
    "marszałek",
    "poseł",
    "posłanka",
    "sejm",
    "głosowanie",
    "komisja",
    "sprawozdanie",
    "ustawa",
    "interpelacja",
    "punkt",
    "porządku",
    "obrady",
    "wicemarszałek",
    "przewodniczący",
    "sekretarz",
    "protokół",
    "rada ministrów",
    "rząd",
    "minister",
    "klub",
    "koło",
    "poselski",
];

const SUSPICIOUS: &[(&str, &str)] = &[
    (r"^[^a-ząćęłńóśźż]*$", "contains no letters"),
    (r"^\d+\s*$", "contains only digits"),
    (r"^[^\w\s]*$", "contains only symbols"),
];

static SUSPICIOUS_RE: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    SUSPICIOUS.iter().map(|(p, reason)| (Regex::new(p).expect("invalid suspicious-content pattern"), *reason)).collect()
});

/// Thresholds used by [`TextValidator`].
#[derive(Debug, Clone, PartialEq)]
pub struct TextValidator {
    pub min_chars: usize,
    pub min_keywords: usize,
    pub min_printable_ratio: f64,
    pub min_word_ratio: f64,
}

impl Default for TextValidator {
    fn default() -> Self {
        Self { min_chars: 500, min_keywords: 5, min_printable_ratio: 0.9, min_word_ratio: 0.7 }
    }
}

/// Outcome of validating one text.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub passed: bool,
    pub reasons: Vec<String>,
    pub keyword_hits: usize,
    pub char_count: usize,
}

impl TextValidator {
    /// Number of distinct keywords present (case-insensitive).
    pub fn keyword_hits(text: &str) -> usize {
        let lowered = text.to_lowercase();
        KEYWORDS.iter().filter(|k| lowered.contains(*k)).count()
    }

    /// Run every check and collect all failures.
    pub fn validate(&self, text: &str) -> ValidationReport {
        let trimmed = text.trim();
        let char_count = trimmed.chars().count();
        let keyword_hits = Self::keyword_hits(trimmed);
        let mut reasons = Vec::new();

        if char_count < self.min_chars {
            reasons.push(format!("too short: {char_count} < {} characters", self.min_chars));
        }

        if keyword_hits < self.min_keywords {
            reasons.push(format!("too few parliamentary keywords: {keyword_hits} < {}", self.min_keywords));
        }

        let printable = trimmed.chars().filter(|c| !c.is_control() || c.is_whitespace()).count();
        let printable_ratio = if char_count == 0 { 0.0 } else { printable as f64 / char_count as f64 };
        if printable_ratio < self.min_printable_ratio {
            reasons.push(format!("printable ratio {printable_ratio:.2} < {}", self.min_printable_ratio));
        }

        let words: Vec<&str> = trimmed.split_whitespace().collect();
        let long_words = words.iter().filter(|w| w.chars().count() > 2).count();
        let word_ratio = if words.is_empty() { 0.0 } else { long_words as f64 / words.len() as f64 };
        if word_ratio < self.min_word_ratio {
            reasons.push(format!("word ratio {word_ratio:.2} < {}", self.min_word_ratio));
        }

        let lowered = trimmed.to_lowercase();
        for (re, reason) in SUSPICIOUS_RE.iter() {
            if re.is_match(&lowered) {
                reasons.push(format!("suspicious content: {reason}"));
            }
        }

        ValidationReport { passed: reasons.is_empty(), reasons, keyword_hits, char_count }
    }
}
