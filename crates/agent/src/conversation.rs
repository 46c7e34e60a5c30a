//! Keyword intent classification for drafting turns.
//!
//! The classifier is deliberately narrow: free text in, one of four coarse
//! categories out. The state machine only ever branches on the category, so
//! a model-backed classifier can replace this one without touching routing.

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Intent {
    Title,
    Description,
    Steps,
    Ambiguous,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Title => "title",
            Self::Description => "description",
            Self::Steps => "steps",
            Self::Ambiguous => "ambiguous",
        }
    }
}

const TITLE_KEYWORDS: &[&str] = &["call", "name", "title"];
const DESCRIPTION_KEYWORDS: &[&str] = &["describe", "description", "about"];
const STEP_KEYWORDS: &[&str] = &["first", "then", "finally", "step"];

#[derive(Clone, Debug, Default)]
pub struct IntentClassifier;

impl IntentClassifier {
    pub fn new() -> Self {
        Self
    }

    /// Case-insensitive substring match, tested in priority order. The first
    /// matching category wins; there is no scoring.
    pub fn classify(&self, text: &str) -> Intent {
        let lowered = text.to_lowercase();
        if TITLE_KEYWORDS.iter().any(|k| lowered.contains(k)) {
            return Intent::Title;
        }
        if DESCRIPTION_KEYWORDS.iter().any(|k| lowered.contains(k)) {
            return Intent::Description;
        }
        if STEP_KEYWORDS.iter().any(|k| lowered.contains(k)) {
            return Intent::Steps;
        }
        Intent::Ambiguous
    }

    /// Trims the input and strips a trailing period; a candidate needs at
    /// least two words, otherwise the caller falls back to the raw text.
    pub fn extract_title(&self, text: &str) -> Option<String> {
        let candidate = text.trim().trim_end_matches('.');
        if candidate.split_whitespace().count() >= 2 {
            Some(candidate.to_string())
        } else {
            None
        }
    }

    /// Splits on sentence terminators (semicolons count) into non-empty
    /// trimmed segments, preserving input order.
    pub fn parse_steps(&self, text: &str) -> Vec<String> {
        text.replace(';', ".")
            .split('.')
            .map(str::trim)
            .filter(|segment| !segment.is_empty())
            .map(str::to_string)
            .collect()
    }
}
