//! Puppet Core
//!
//! Contracts for the collaborators that sit around the puppet controller:
//! speech transcription, language understanding, the respond/ignore decision,
//! response generation and speech synthesis. The controller crate drives these
//! through the interaction pipeline; only the rule-based responder and the
//! conversation context carry real logic here.

pub mod collaborators;
pub mod context;
pub mod generic_types;
pub mod responder;

/// What the response stage asks the runtime to do for one user utterance.
///
/// This keeps the responder decoupled from the controller: the responder picks
/// text and an expression key, the runtime decides how to put them on screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reaction {
    /// Text the avatar should say.
    pub text: String,
    /// Expression catalog key to show while speaking, if any.
    pub expression: Option<String>,
}

impl Reaction {
    pub fn new(text: impl Into<String>, expression: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            expression: Some(expression.into()),
        }
    }
}
