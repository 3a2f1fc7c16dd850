//! Keyword-count urgency scoring of the latest contact message.

use crmsync_shared::{DEFAULT_KEYWORDS, Priority};

/// Keywords needed for [`Priority::UrgentReview`].
const URGENT_THRESHOLD: usize = 3;

/// Keyword classifier.
#[derive(Debug, Clone)]
pub struct Classifier {
    /// Lowercased, deduplicated, non-empty keywords.
    keywords: Vec<String>,
}

impl Classifier {
    /// Build a classifier over `keywords`.
    pub fn new<S: AsRef<str>>(keywords: &[S]) -> Self {
        let mut normalized: Vec<String> = Vec::with_capacity(keywords.len());
        for keyword in keywords {
            let keyword = keyword.as_ref().trim().to_lowercase();
            if !keyword.is_empty() && !normalized.contains(&keyword) {
                normalized.push(keyword);
            }
        }
        Self {
            keywords: normalized,
        }
    }

    /// Number of distinct keywords occurring anywhere in `text`, case-insensitively.
    pub fn score(&self, text: &str) -> usize {
        let text = text.to_lowercase();
        self.keywords
            .iter()
            .filter(|k| text.contains(k.as_str()))
            .count()
    }

    /// Priority for a record's latest contact text.
    pub fn classify(&self, text: Option<&str>) -> Priority {
        match text.map(|t| self.score(t)).unwrap_or(0) {
            0 => Priority::GeneralNote,
            n if n >= URGENT_THRESHOLD => Priority::UrgentReview,
            _ => Priority::ReviewForImprovement,
        }
    }
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new(DEFAULT_KEYWORDS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn broken_coffee_machine_is_urgent() {
        let classifier = Classifier::default();
        let text = "urgent issue with broken coffee machine, call 5551234567 asap";
        assert!(classifier.score(text) >= 4);
        assert_eq!(classifier.classify(Some(text)), Priority::UrgentReview);
    }

    #[test]
    fn thresholds() {
        let classifier = Classifier::default();
        assert_eq!(
            classifier.classify(Some("Could you improve the venue?")),
            Priority::ReviewForImprovement
        );
        assert_eq!(
            classifier.classify(Some("Please fix the BUG")),
            Priority::ReviewForImprovement
        );
        assert_eq!(classifier.classify(Some("Lovely evening, thanks!")), Priority::GeneralNote);
        assert_eq!(classifier.classify(Some("")), Priority::GeneralNote);
        assert_eq!(classifier.classify(None), Priority::GeneralNote);
    }

    #[test]
    fn keywords_count_once_each() {
        let classifier = Classifier::new(&["bug", "Bug", " "]);
        assert_eq!(classifier.score("bug bug bug"), 1);
        assert_eq!(classifier.classify(Some("bug bug bug")), Priority::ReviewForImprovement);
    }

    #[test]
    fn multi_word_keywords_match() {
        let classifier = Classifier::new(&["right away", "call"]);
        assert_eq!(classifier.score("Call me right away"), 2);
    }
}
