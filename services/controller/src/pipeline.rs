//! Drives one user utterance through the collaborator stages.

use crate::ws::Controller;
use anyhow::{Context, Result};
use puppet_core::{
    collaborators::{
        Analyzer, CollaboratorError, Responder, ResponseDecider, SpeechSynthesizer, Transcriber,
        Unimplemented,
    },
    context::ContextManager,
    responder::RuleBasedResponder,
};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// What happened to an utterance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// A reply was generated, shown and synthesized.
    Responded { reply: String },
    /// The decision stage chose not to reply.
    Ignored,
}

/// Transcribe, understand, decide, respond, speak.
pub struct InteractionPipeline {
    transcriber: Arc<dyn Transcriber>,
    analyzer: Arc<dyn Analyzer>,
    decider: Arc<dyn ResponseDecider>,
    responder: Arc<dyn Responder>,
    synthesizer: Arc<dyn SpeechSynthesizer>,
    context: ContextManager,
}

impl InteractionPipeline {
    pub fn new(
        transcriber: Arc<dyn Transcriber>,
        analyzer: Arc<dyn Analyzer>,
        decider: Arc<dyn ResponseDecider>,
        responder: Arc<dyn Responder>,
        synthesizer: Arc<dyn SpeechSynthesizer>,
    ) -> Self {
        Self {
            transcriber,
            analyzer,
            decider,
            responder,
            synthesizer,
            context: ContextManager::default(),
        }
    }

    /// Rule-based responses with every other stage left unimplemented.
    pub fn placeholder() -> Self {
        Self::new(
            Arc::new(Unimplemented),
            Arc::new(Unimplemented),
            Arc::new(Unimplemented),
            Arc::new(RuleBasedResponder),
            Arc::new(Unimplemented),
        )
    }

    pub fn context(&self) -> &ContextManager {
        &self.context
    }

    /// Handles one recorded utterance.
    ///
    /// A decision stage that is not implemented counts as "do not respond".
    /// Failing to show the expression is logged and does not stop the reply.
    #[instrument(skip(self, controller))]
    pub async fn process_audio(
        &mut self,
        controller: &Controller,
        audio_path: &Path,
        output_path: &Path,
    ) -> Result<Outcome> {
        let text = self
            .transcriber
            .transcribe(audio_path)
            .await
            .context("Transcription failed")?;
        info!(%text, "Transcribed utterance");

        let analysis = self
            .analyzer
            .analyze(&text)
            .await
            .context("Analysis failed")?;

        let should_reply = match self.decider.should_respond(&analysis).await {
            Ok(decision) => decision,
            Err(e) if CollaboratorError::is_not_implemented(&e) => {
                info!("Decision stage not implemented; not responding.");
                false
            }
            Err(e) => return Err(e.context("Decision failed")),
        };
        if !should_reply {
            info!("No response triggered.");
            return Ok(Outcome::Ignored);
        }

        let reaction = self
            .responder
            .respond(&text.to_lowercase(), &analysis)
            .await
            .context("Response generation failed")?;

        if let Some(key) = &reaction.expression {
            if let Err(e) = controller.set_expression(key).await {
                warn!(expression = %key, error = %e, "Could not show expression");
            }
        }

        self.context.add_to_history(text, reaction.text.clone());

        self.synthesizer
            .synthesize(&reaction.text, output_path)
            .await
            .context("Speech synthesis failed")?;

        Ok(Outcome::Responded {
            reply: reaction.text,
        })
    }
}
