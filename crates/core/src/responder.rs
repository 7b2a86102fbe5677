//! Rule-Based Responder
//!
//! Maps the understanding result onto a canned reply plus an expression key.
//! Intent wins over sentiment; anything unrecognised falls back to a neutral
//! request for clarification.

use crate::{Reaction, collaborators::Responder, generic_types::Analysis};
use anyhow::Result;
use async_trait::async_trait;

/// A `Responder` driven by a fixed intent/sentiment table.
#[derive(Debug, Clone, Copy, Default)]
pub struct RuleBasedResponder;

impl RuleBasedResponder {
    /// Picks the reaction for `analysis` without any I/O.
    pub fn react(&self, analysis: &Analysis) -> Reaction {
        match analysis.intent.as_deref() {
            Some("greet") => Reaction::new("Hello! How can I assist you today?", "happy"),
            Some("ask_help") => Reaction::new(
                "Sure, I'm here to help. What do you need assistance with?",
                "thinking",
            ),
            Some("goodbye") => Reaction::new("Goodbye! Have a great day!", "sad"),
            Some("book_flight") => {
                let location = analysis
                    .entity("location")
                    .unwrap_or("your desired destination");
                Reaction::new(
                    format!(
                        "Sure, I can help you book a flight to {location}. When would you like to travel?"
                    ),
                    "neutral",
                )
            }
            _ => match analysis.sentiment.as_deref() {
                Some("positive") => Reaction::new(
                    "I'm glad to hear that! How can I assist you further?",
                    "happy",
                ),
                Some("negative") => Reaction::new(
                    "I'm sorry you're feeling that way. How can I help?",
                    "concerned",
                ),
                _ => Reaction::new(
                    "I'm not sure how to respond to that. Could you please elaborate?",
                    "neutral",
                ),
            },
        }
    }
}

#[async_trait]
impl Responder for RuleBasedResponder {
    async fn respond(&self, _text: &str, analysis: &Analysis) -> Result<Reaction> {
        Ok(self.react(analysis))
    }
}
