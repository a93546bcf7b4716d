//! Model-backed classifier.
//!
//! Asks a fast, cheap model for a JSON verdict instead of matching keywords.
//! Every call goes through the same rate-limit backoff as agent decisions.

use super::{Classifier, ClassifierError, Sentiment};
use crate::provider::{ClaudeProvider, DecisionProvider, DecisionRequest, ProviderConfig};
use crate::retry::{with_backoff, RetryPolicy};
use crate::world::{CharacterProfile, StoryEvent};
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;

/// Default model for classification (fast and cheap).
pub const SEMANTIC_MODEL: &str = "claude-3-5-haiku-20241022";

const JUDGE_MAX_TOKENS: usize = 200;

const JUDGE_INSTRUCTIONS: &str = "You judge short pieces of an interactive story. \
Respond with ONLY a JSON object (no markdown, no explanation outside the JSON).";

#[derive(Debug, Deserialize)]
struct Verdict {
    verdict: bool,
}

#[derive(Debug, Deserialize)]
struct SentimentVerdict {
    sentiment: String,
}

/// Classifier that delegates each judgement to a completion model.
pub struct SemanticClassifier {
    provider: Arc<dyn DecisionProvider>,
    retry: RetryPolicy,
}

impl SemanticClassifier {
    /// Use any completion provider as the judge.
    pub fn new(provider: Arc<dyn DecisionProvider>) -> Self {
        Self {
            provider,
            retry: RetryPolicy::default(),
        }
    }

    /// Judge with Claude Haiku using ANTHROPIC_API_KEY.
    pub fn from_env() -> Result<Self, claude::Error> {
        let config = ProviderConfig::default()
            .with_model(SEMANTIC_MODEL)
            .with_max_tokens(JUDGE_MAX_TOKENS)
            .with_temperature(0.0);
        let provider = ClaudeProvider::from_env()?.with_config(config);
        Ok(Self::new(Arc::new(provider)))
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    async fn ask(&self, question: String) -> Result<String, ClassifierError> {
        let request = DecisionRequest {
            agent: "Judge".to_string(),
            instructions: JUDGE_INSTRUCTIONS.to_string(),
            event_context: String::new(),
            story_context: String::new(),
            prompt: question,
        };
        let provider = self.provider.as_ref();
        let request = &request;
        let answer = with_backoff(&self.retry, move || provider.decide(request)).await?;
        Ok(answer)
    }

    async fn ask_verdict(&self, question: String) -> Result<bool, ClassifierError> {
        let answer = self.ask(question).await?;
        let json = extract_json(&answer);
        let parsed: Verdict = serde_json::from_str(json)
            .map_err(|e| ClassifierError::Verdict(format!("{e}: {json}")))?;
        Ok(parsed.verdict)
    }
}

#[async_trait]
impl Classifier for SemanticClassifier {
    async fn decision_fits(
        &self,
        decision: &str,
        character: &CharacterProfile,
        event: &StoryEvent,
    ) -> Result<bool, ClassifierError> {
        let question = format!(
            r#"## Current Event
{title}
Details: {details}

## Character
{name} ({occupation}). Traits: {traits}

## Proposed Decision
"{decision}"

Is this decision related to the current event, or consistent with the character's traits?
Respond with {{"verdict": true}} or {{"verdict": false}}."#,
            title = event.title,
            details = event.details.join("; "),
            name = character.name,
            occupation = character.occupation,
            traits = character.traits().collect::<Vec<_>>().join(", "),
        );
        self.ask_verdict(question).await
    }

    async fn is_discordant(&self, decision: &str) -> Result<bool, ClassifierError> {
        let question = format!(
            r#"## Decision
"{decision}"

Does this decision involve arguing, fighting, disagreeing with, or opposing someone?
Respond with {{"verdict": true}} or {{"verdict": false}}."#
        );
        self.ask_verdict(question).await
    }

    async fn sentiment(
        &self,
        decision: &str,
        subject: &str,
        other: &str,
    ) -> Result<Sentiment, ClassifierError> {
        let question = format!(
            r#"## Decision by {subject}
"{decision}"

How does this decision treat {other}?
Respond with {{"sentiment": "positive"}}, {{"sentiment": "negative"}} or {{"sentiment": "neutral"}}."#
        );
        let answer = self.ask(question).await?;
        let json = extract_json(&answer);
        let parsed: SentimentVerdict = serde_json::from_str(json)
            .map_err(|e| ClassifierError::Verdict(format!("{e}: {json}")))?;
        match parsed.sentiment.to_lowercase().as_str() {
            "positive" => Ok(Sentiment::Positive),
            "negative" => Ok(Sentiment::Negative),
            "neutral" => Ok(Sentiment::Neutral),
            other => Err(ClassifierError::Verdict(format!(
                "unknown sentiment '{other}'"
            ))),
        }
    }

    async fn follows(
        &self,
        previous: &StoryEvent,
        current: &StoryEvent,
    ) -> Result<bool, ClassifierError> {
        let question = format!(
            r#"## Previous Section
{previous_title}
Details: {previous_details}

## Next Section
{current_title}

Does the next section plausibly continue from the previous one?
Respond with {{"verdict": true}} or {{"verdict": false}}."#,
            previous_title = previous.title,
            previous_details = previous.details.join("; "),
            current_title = current.title,
        );
        self.ask_verdict(question).await
    }
}

/// Extract JSON from a response that might have markdown code blocks.
fn extract_json(text: &str) -> &str {
    let text = text.trim();

    if let Some(start) = text.find("```json") {
        let content_start = start + 7;
        if let Some(end) = text[content_start..].find("```") {
            return text[content_start..content_start + end].trim();
        }
    }

    if let Some(start) = text.find("```") {
        let content_start = start + 3;
        if let Some(end) = text[content_start..].find("```") {
            return text[content_start..content_start + end].trim();
        }
    }

    text
}
