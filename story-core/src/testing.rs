//! Testing utilities for story runs.
//!
//! This module provides tools for tests that must not reach the network:
//! - `ScriptedProvider`, a completion provider that replays scripted replies
//! - Sample characters and events for a small, coherent story
//! - Assertion helpers for checking story state

use crate::provider::{DecisionProvider, DecisionRequest, ProviderError};
use crate::world::{CharacterProfile, StoryContext, StoryEvent, AFFINITY_MAX, AFFINITY_MIN};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

/// One scripted outcome.
#[derive(Debug, Clone)]
enum Step {
    Reply(String),
    Throttle,
    Fail(String),
}

#[derive(Debug, Default)]
struct Script {
    steps: VecDeque<Step>,
    requests: Vec<DecisionRequest>,
}

/// A provider that returns scripted outcomes in order.
///
/// Clones share the same script, so a test can hand one clone to the engine
/// and keep another to inspect the requests it received. Once the script runs
/// out, every call gets `"<agent> waits."`.
#[derive(Debug, Clone, Default)]
pub struct ScriptedProvider {
    script: Arc<Mutex<Script>>,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful reply.
    pub fn reply(self, text: impl Into<String>) -> Self {
        self.push(Step::Reply(text.into()));
        self
    }

    /// Queue several successful replies.
    pub fn replies<I, S>(self, texts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for text in texts {
            self.push(Step::Reply(text.into()));
        }
        self
    }

    /// Queue a rate-limit error.
    pub fn throttle(self) -> Self {
        self.push(Step::Throttle);
        self
    }

    /// Queue `count` rate-limit errors.
    pub fn throttles(self, count: usize) -> Self {
        for _ in 0..count {
            self.push(Step::Throttle);
        }
        self
    }

    /// Queue a hard failure.
    pub fn fail(self, message: impl Into<String>) -> Self {
        self.push(Step::Fail(message.into()));
        self
    }

    /// Every request received so far, in order.
    pub fn requests(&self) -> Vec<DecisionRequest> {
        self.lock().requests.clone()
    }

    /// Number of calls received so far.
    pub fn calls(&self) -> usize {
        self.lock().requests.len()
    }

    /// Number of scripted steps not yet consumed.
    pub fn remaining(&self) -> usize {
        self.lock().steps.len()
    }

    fn push(&self, step: Step) {
        self.lock().steps.push_back(step);
    }

    fn lock(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl DecisionProvider for ScriptedProvider {
    async fn decide(&self, request: &DecisionRequest) -> Result<String, ProviderError> {
        let mut script = self.lock();
        script.requests.push(request.clone());
        match script.steps.pop_front() {
            Some(Step::Reply(text)) => Ok(text),
            Some(Step::Throttle) => Err(ProviderError::RateLimited(
                "scripted rate limit".to_string(),
            )),
            Some(Step::Fail(message)) => Err(ProviderError::Upstream(message)),
            None => Ok(format!("{} waits.", request.agent)),
        }
    }
}

/// Kazuya, Chizuru and Mami, in that turn order.
pub fn sample_characters() -> Vec<CharacterProfile> {
    vec![
        CharacterProfile::new("Kazuya", 20, "College student")
            .with_personality(["indecisive", "kind"])
            .with_tendencies(["overthinks"])
            .with_affinity("Chizuru", 3)
            .with_affinity("Mami", -2),
        CharacterProfile::new("Chizuru", 20, "Rental girlfriend and actress")
            .with_personality(["professional", "caring"])
            .with_tendencies(["pragmatic"])
            .with_affinity("Kazuya", 1),
        CharacterProfile::new("Mami", 20, "College student")
            .with_personality(["manipulative", "charming"])
            .with_affinity("Kazuya", 2)
            .with_affinity("Chizuru", -3),
    ]
}

/// Three events where each title picks up a detail of the one before.
pub fn sample_events() -> Vec<StoryEvent> {
    vec![
        StoryEvent::new(1, "The First Rental", ["rental date", "breakup"]),
        StoryEvent::new(2, "Another Rental Date", ["family visit", "grandmother"]),
        StoryEvent::new(3, "The Grandmother Hospital Visit", ["hospital", "lie"]),
    ]
}

/// A fresh context over the sample characters and events.
pub fn sample_context() -> StoryContext {
    match StoryContext::new("Rent-A-Girlfriend", sample_characters(), sample_events()) {
        Ok(ctx) => ctx,
        Err(e) => panic!("sample story should be valid: {e}"),
    }
}

// =============================================================================
// Assertion Helpers
// =============================================================================

/// Assert `from`'s affinity toward `toward`.
#[track_caller]
pub fn assert_affinity(ctx: &StoryContext, from: &str, toward: &str, expected: i32) {
    let character = ctx
        .character(from)
        .unwrap_or_else(|| panic!("Expected character '{from}' to exist"));
    assert_eq!(
        character.affinity_toward(toward),
        expected,
        "Expected {from}'s affinity toward {toward} to be {expected}"
    );
}

/// Assert the event cursor position.
#[track_caller]
pub fn assert_cursor(ctx: &StoryContext, expected: usize) {
    assert_eq!(
        ctx.current_event_index(),
        expected,
        "Expected event cursor at {expected}"
    );
}

/// Assert every stored affinity lies within bounds.
#[track_caller]
pub fn assert_affinities_bounded(ctx: &StoryContext) {
    for character in ctx.characters() {
        for (other, value) in &character.relationships {
            assert!(
                (AFFINITY_MIN..=AFFINITY_MAX).contains(value),
                "{}'s affinity toward {other} is out of bounds: {value}",
                character.name
            );
        }
    }
}
