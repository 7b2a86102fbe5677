//! Collaborator Contracts
//!
//! Each stage of an interaction is a trait so the runtime can swap real
//! engines, mocks, or the `Unimplemented` placeholder without touching the
//! pipeline. The controller never looks inside these implementations.

use crate::{Reaction, generic_types::Analysis};
use anyhow::Result;
use async_trait::async_trait;
use std::path::Path;

/// Error surfaced by placeholder collaborators.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CollaboratorError {
    #[error("{stage} stage is not implemented")]
    NotImplemented { stage: &'static str },
}

impl CollaboratorError {
    /// Returns true if `err` is (or wraps) a `NotImplemented` error.
    pub fn is_not_implemented(err: &anyhow::Error) -> bool {
        matches!(
            err.downcast_ref::<CollaboratorError>(),
            Some(CollaboratorError::NotImplemented { .. })
        )
    }
}

/// Converts recorded speech into text.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, audio_path: &Path) -> Result<String>;
}

/// Extracts intent, sentiment and entities from text.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Analyzer: Send + Sync {
    async fn analyze(&self, text: &str) -> Result<Analysis>;
}

/// Decides whether an utterance deserves a reply at all.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ResponseDecider: Send + Sync {
    async fn should_respond(&self, analysis: &Analysis) -> Result<bool>;
}

/// Produces the reply text and the expression to show with it.
#[async_trait]
pub trait Responder: Send + Sync {
    async fn respond(&self, text: &str, analysis: &Analysis) -> Result<Reaction>;
}

/// Renders reply text to an audio file.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn synthesize(&self, text: &str, output_path: &Path) -> Result<()>;
}

/// Placeholder for every stage that has no engine wired in yet.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unimplemented;

#[async_trait]
impl Transcriber for Unimplemented {
    async fn transcribe(&self, _audio_path: &Path) -> Result<String> {
        Err(CollaboratorError::NotImplemented {
            stage: "transcription",
        }
        .into())
    }
}

#[async_trait]
impl Analyzer for Unimplemented {
    async fn analyze(&self, _text: &str) -> Result<Analysis> {
        Err(CollaboratorError::NotImplemented {
            stage: "understanding",
        }
        .into())
    }
}

#[async_trait]
impl ResponseDecider for Unimplemented {
    async fn should_respond(&self, _analysis: &Analysis) -> Result<bool> {
        Err(CollaboratorError::NotImplemented { stage: "decision" }.into())
    }
}

#[async_trait]
impl SpeechSynthesizer for Unimplemented {
    async fn synthesize(&self, _text: &str, _output_path: &Path) -> Result<()> {
        Err(CollaboratorError::NotImplemented { stage: "synthesis" }.into())
    }
}
