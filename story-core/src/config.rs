//! Engine configuration.

use crate::retry::RetryPolicy;
use std::path::PathBuf;

/// What to do when the same event keeps failing the round coherence gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RejectionPolicy {
    /// Stop the run with an error.
    #[default]
    Abort,
    /// Move past the event without committing any of its decisions.
    SkipEvent,
}

/// What to do when a snapshot can't be written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PersistencePolicy {
    /// Log a warning and keep running on the in-memory state.
    #[default]
    BestEffort,
    /// Stop the run with an error.
    Strict,
}

/// Configuration for a [`StoryEngine`](crate::StoryEngine).
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Upper bound on rounds played, rejected ones included.
    pub max_rounds: u32,

    /// Consecutive rejections of one event tolerated before
    /// `rejection_policy` kicks in.
    pub max_round_retries: u32,

    pub rejection_policy: RejectionPolicy,

    /// Backoff for throttled completion calls.
    pub retry: RetryPolicy,

    /// Seed for fallback decisions; random when unset.
    pub seed: Option<u64>,

    /// Where to write a snapshot after each commit.
    pub snapshot_path: Option<PathBuf>,

    pub persistence: PersistencePolicy,

    /// Where to append the conversation transcript.
    pub transcript_path: Option<PathBuf>,

    /// Ask each agent to act out its accepted decision.
    pub elaborate_decisions: bool,

    /// Ask a narrator to summarize each committed round.
    pub narrate: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_rounds: 30,
            max_round_retries: 5,
            rejection_policy: RejectionPolicy::default(),
            retry: RetryPolicy::default(),
            seed: None,
            snapshot_path: None,
            persistence: PersistencePolicy::default(),
            transcript_path: None,
            elaborate_decisions: false,
            narrate: false,
        }
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_rounds(mut self, rounds: u32) -> Self {
        self.max_rounds = rounds;
        self
    }

    pub fn with_max_round_retries(mut self, retries: u32) -> Self {
        self.max_round_retries = retries;
        self
    }

    pub fn with_rejection_policy(mut self, policy: RejectionPolicy) -> Self {
        self.rejection_policy = policy;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_snapshot_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.snapshot_path = Some(path.into());
        self
    }

    pub fn with_persistence(mut self, policy: PersistencePolicy) -> Self {
        self.persistence = policy;
        self
    }

    pub fn with_transcript_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.transcript_path = Some(path.into());
        self
    }

    pub fn with_elaboration(mut self, enabled: bool) -> Self {
        self.elaborate_decisions = enabled;
        self
    }

    pub fn with_narrator(mut self, enabled: bool) -> Self {
        self.narrate = enabled;
        self
    }
}
