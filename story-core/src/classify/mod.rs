//! Text judgements used by the decision pipeline.
//!
//! Every stage that has to read meaning into a decision goes through the
//! [`Classifier`] trait, so the cheap keyword heuristics can be swapped for a
//! model-backed judge without touching the engine's control flow.

mod keyword;
mod semantic;

pub use keyword::{
    KeywordClassifier, DISCORD_KEYWORDS, NEGATIVE_KEYWORDS, POSITIVE_KEYWORDS,
};
pub use semantic::{SemanticClassifier, SEMANTIC_MODEL};

use crate::provider::ProviderError;
use crate::retry::RetryError;
use crate::world::{CharacterProfile, StoryEvent};
use async_trait::async_trait;
use thiserror::Error;

/// Errors from classifiers that consult an outside service.
#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("Classifier call failed: {0}")]
    Upstream(#[from] RetryError<ProviderError>),

    #[error("Unreadable classifier verdict: {0}")]
    Verdict(String),
}

/// How a decision treats the characters it names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sentiment {
    Positive,
    Negative,
    Neutral,
}

impl Sentiment {
    /// Affinity shift this sentiment produces.
    pub fn delta(self) -> i32 {
        match self {
            Sentiment::Positive => 1,
            Sentiment::Negative => -1,
            Sentiment::Neutral => 0,
        }
    }
}

/// Judgements the pipeline needs about decision text and plot continuity.
#[async_trait]
pub trait Classifier: Send + Sync {
    /// Whether `decision` plausibly belongs to `character` during `event`.
    async fn decision_fits(
        &self,
        decision: &str,
        character: &CharacterProfile,
        event: &StoryEvent,
    ) -> Result<bool, ClassifierError>;

    /// Whether `decision` expresses discord (arguing, fighting, opposing).
    async fn is_discordant(&self, decision: &str) -> Result<bool, ClassifierError>;

    /// How `subject`'s decision treats `other`.
    async fn sentiment(
        &self,
        decision: &str,
        subject: &str,
        other: &str,
    ) -> Result<Sentiment, ClassifierError>;

    /// Whether `current` continues the thread of `previous`.
    async fn follows(
        &self,
        previous: &StoryEvent,
        current: &StoryEvent,
    ) -> Result<bool, ClassifierError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentiment_delta() {
        assert_eq!(Sentiment::Positive.delta(), 1);
        assert_eq!(Sentiment::Negative.delta(), -1);
        assert_eq!(Sentiment::Neutral.delta(), 0);
    }
}
