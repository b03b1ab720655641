use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

/// Explicit unavailability signal; the caller decides the fallback, the
/// gateway never swallows a failure.
#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("classifier unavailable: {0}")]
    Unavailable(String),
    #[error("classifier timed out after {0:?}")]
    Timeout(Duration),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TurnRole {
    Customer,
    Assistant,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HistoryTurn {
    pub role: TurnRole,
    pub text: String,
}

/// A fully rendered classification request: the business-scoped system
/// prompt, the prior conversation, and the new message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClassifierPrompt {
    pub system: String,
    pub history: Vec<HistoryTurn>,
    pub message: String,
}

/// The external language model as a capability: text in, raw text out.
/// Everything downstream treats the response as untrusted.
#[async_trait]
pub trait Classifier: Send + Sync {
    async fn classify(&self, prompt: &ClassifierPrompt) -> Result<String, ClassifierError>;
}
