//! Classification collaborators for reason and food category.
//!
//! The controlled vocabularies are owned outside the core; extraction only
//! asks for a slug and resolves it through the store.

use crate::types::recall::Recall;

/// Classifies free recall text against a controlled reason vocabulary.
pub trait ReasonClassifier: Send + Sync {
    /// Slug of the matched reason, or `None` when nothing matches.
    fn classify(&self, text: &str) -> Option<String>;
}

/// Assigns a food category given the full record.
pub trait FoodCategoryClassifier: Send + Sync {
    /// Slug of the assigned category, or `None`.
    fn categorize(&self, recall: &Recall) -> Option<String>;
}

/// Keyword-matching reason classifier.
///
/// Scans the text case-insensitively for each reason's keywords; the first
/// reason with a hit wins, in configuration order.
#[derive(Default)]
pub struct KeywordReasonClassifier {
    vocabulary: Vec<(String, Vec<String>)>,
}

impl KeywordReasonClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a reason slug with its trigger keywords.
    pub fn with_reason<I, S>(mut self, slug: impl Into<String>, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.vocabulary.push((
            slug.into(),
            keywords
                .into_iter()
                .map(|k| k.into().to_lowercase())
                .collect(),
        ));
        self
    }
}

impl ReasonClassifier for KeywordReasonClassifier {
    fn classify(&self, text: &str) -> Option<String> {
        let haystack = text.to_lowercase();
        self.vocabulary
            .iter()
            .find(|(_, keywords)| keywords.iter().any(|k| haystack.contains(k.as_str())))
            .map(|(slug, _)| slug.clone())
    }
}
