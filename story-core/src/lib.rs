//! Turn-based multi-character story simulation driven by Claude.
//!
//! This crate provides:
//! - Character, event and story-state model loaded from JSON documents
//! - A per-round decision pipeline: propose, check, arbitrate, gate, commit
//! - Directional affinity between characters, bounded to [-10, 10]
//! - Pluggable keyword or model-backed classification
//! - Rate-limit backoff around every completion call
//! - Atomic snapshots for resuming a run
//!
//! # Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use story_core::{ClaudeProvider, EngineConfig, StoryContext, StoryEngine};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut ctx = StoryContext::load(
//!         "Rent-A-Girlfriend",
//!         "data/character_profiles.json",
//!         "data/story_events.json",
//!     )
//!     .await?;
//!
//!     let config = EngineConfig::new().with_snapshot_path("story_state.json");
//!     let mut engine = StoryEngine::new(Arc::new(ClaudeProvider::from_env()?), config);
//!
//!     let report = engine.run(&mut ctx).await?;
//!     println!("{} after {} rounds", report.outcome, report.rounds);
//!     Ok(())
//! }
//! ```

pub mod alternative;
pub mod classify;
pub mod coherence;
pub mod config;
pub mod conflict;
pub mod decision;
pub mod engine;
pub mod persist;
pub mod prompts;
pub mod provider;
pub mod relationship;
pub mod retry;
pub mod testing;
pub mod transcript;
pub mod world;

// Primary public API
pub use alternative::AlternativeGenerator;
pub use classify::{Classifier, ClassifierError, KeywordClassifier, SemanticClassifier, Sentiment};
pub use config::{EngineConfig, PersistencePolicy, RejectionPolicy};
pub use decision::{Decision, DecisionBatch, DecisionOrigin};
pub use engine::{
    CancelToken, CommittedRound, EngineError, Phase, RoundOutcome, RunOutcome, RunReport,
    SnapshotStatus, StoryEngine,
};
pub use persist::{resume, PersistError, Snapshot};
pub use provider::{ClaudeProvider, DecisionProvider, DecisionRequest, ProviderConfig, ProviderError};
pub use retry::{RetryError, RetryPolicy};
pub use world::{CharacterProfile, LoadError, StoryContext, StoryEvent};
