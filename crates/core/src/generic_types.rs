use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Result of the language-understanding stage for a single utterance.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Analysis {
    /// Recognised intent, e.g. `greet` or `book_flight`.
    pub intent: Option<String>,
    /// Coarse sentiment: `positive`, `negative` or `neutral`.
    pub sentiment: Option<String>,
    /// Named entities keyed by type, e.g. `location -> "Tokyo"`.
    #[serde(default)]
    pub entities: HashMap<String, String>,
}

impl Analysis {
    pub fn with_intent(intent: impl Into<String>) -> Self {
        Self {
            intent: Some(intent.into()),
            ..Default::default()
        }
    }

    pub fn with_sentiment(sentiment: impl Into<String>) -> Self {
        Self {
            sentiment: Some(sentiment.into()),
            ..Default::default()
        }
    }

    pub fn entity(&self, key: &str) -> Option<&str> {
        self.entities.get(key).map(String::as_str)
    }
}
