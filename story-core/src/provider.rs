//! The completion-service boundary.
//!
//! The engine never writes decision text itself; it asks a
//! [`DecisionProvider`] and then judges what comes back.

use crate::retry::Throttled;
use async_trait::async_trait;
use claude::{Claude, Message, Request};
use thiserror::Error;

/// Errors surfaced by a completion provider.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Completion failed: {0}")]
    Upstream(String),
}

impl Throttled for ProviderError {
    fn is_throttled(&self) -> bool {
        matches!(self, ProviderError::RateLimited(_))
    }
}

impl From<claude::Error> for ProviderError {
    fn from(err: claude::Error) -> Self {
        if err.is_rate_limited() {
            ProviderError::RateLimited(err.to_string())
        } else {
            ProviderError::Upstream(err.to_string())
        }
    }
}

/// Everything an agent is told before it decides.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecisionRequest {
    /// Who is deciding.
    pub agent: String,
    /// Standing in-character instructions.
    pub instructions: String,
    /// The active event.
    pub event_context: String,
    /// What has happened so far.
    pub story_context: String,
    /// The question for this turn.
    pub prompt: String,
}

/// Produces one decision string per request.
#[async_trait]
pub trait DecisionProvider: Send + Sync {
    async fn decide(&self, request: &DecisionRequest) -> Result<String, ProviderError>;
}

/// Generation settings for [`ClaudeProvider`].
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// The model to use (defaults to the client's model).
    pub model: Option<String>,

    /// Maximum tokens per decision.
    pub max_tokens: usize,

    /// Temperature for generation.
    pub temperature: Option<f32>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            model: None,
            max_tokens: 512,
            temperature: Some(0.8),
        }
    }
}

impl ProviderConfig {
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

/// Decisions written by Claude.
pub struct ClaudeProvider {
    client: Claude,
    config: ProviderConfig,
}

impl ClaudeProvider {
    pub fn new(client: Claude) -> Self {
        Self {
            client,
            config: ProviderConfig::default(),
        }
    }

    /// Create a provider from the ANTHROPIC_API_KEY environment variable.
    pub fn from_env() -> Result<Self, claude::Error> {
        Ok(Self::new(Claude::from_env()?))
    }

    pub fn with_config(mut self, config: ProviderConfig) -> Self {
        self.config = config;
        self
    }

    fn build_request(&self, request: &DecisionRequest) -> Request {
        let mut system = request.instructions.clone();
        if !request.story_context.is_empty() {
            system.push_str("\n\nAs a character, you have learned:\n");
            system.push_str(&request.story_context);
        }

        let mut user = String::new();
        if !request.event_context.is_empty() {
            user.push_str(&request.event_context);
            user.push_str("\n\n");
        }
        user.push_str(&request.prompt);

        let mut api_request = Request::new(vec![Message::user(user)])
            .with_system(system)
            .with_max_tokens(self.config.max_tokens);

        if let Some(ref model) = self.config.model {
            api_request = api_request.with_model(model);
        }
        if let Some(temp) = self.config.temperature {
            api_request = api_request.with_temperature(temp);
        }
        api_request
    }
}

#[async_trait]
impl DecisionProvider for ClaudeProvider {
    async fn decide(&self, request: &DecisionRequest) -> Result<String, ProviderError> {
        let response = self.client.complete(self.build_request(request)).await?;
        Ok(response.text.trim().to_string())
    }
}
