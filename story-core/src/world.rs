//! Story state: characters, plot events, and the simulation context.
//!
//! A [`StoryContext`] is the single mutable aggregate of a run. It is owned
//! by the engine and handed by reference to each pipeline stage.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;
use tokio::fs;

/// Lowest affinity one character can hold toward another.
pub const AFFINITY_MIN: i32 = -10;

/// Highest affinity one character can hold toward another.
pub const AFFINITY_MAX: i32 = 10;

/// Errors from loading characters or events.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Character name must not be empty")]
    UnnamedCharacter,

    #[error("Duplicate character name: {0}")]
    DuplicateCharacter(String),

    #[error("Event sections must start at 1 and increase (found {found} after {previous})")]
    SectionOrder { previous: u32, found: u32 },

    #[error("Event cursor {cursor} is past the end of {len} events")]
    CursorOutOfRange { cursor: usize, len: usize },
}

/// A character taking part in the story.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacterProfile {
    /// Unique key within a story.
    pub name: String,

    pub age: u32,

    pub occupation: String,

    /// Personality traits, in input order.
    #[serde(default)]
    pub personality: Vec<String>,

    /// How the character tends to make decisions.
    #[serde(default, rename = "decision_making_tendencies")]
    pub tendencies: Vec<String>,

    /// Directional affinity toward other characters, by name.
    #[serde(default, deserialize_with = "deserialize_affinities")]
    pub relationships: HashMap<String, i32>,
}

impl CharacterProfile {
    /// Create a character with no traits and no relationships.
    pub fn new(name: impl Into<String>, age: u32, occupation: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            age,
            occupation: occupation.into(),
            personality: Vec::new(),
            tendencies: Vec::new(),
            relationships: HashMap::new(),
        }
    }

    /// Add personality traits.
    pub fn with_personality<I, S>(mut self, traits: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.personality.extend(traits.into_iter().map(Into::into));
        self
    }

    /// Add decision-making tendencies.
    pub fn with_tendencies<I, S>(mut self, tendencies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tendencies.extend(tendencies.into_iter().map(Into::into));
        self
    }

    /// Set the affinity toward another character (clamped).
    pub fn with_affinity(mut self, other: impl Into<String>, affinity: i32) -> Self {
        self.relationships
            .insert(other.into(), clamp_affinity(affinity as i64));
        self
    }

    /// Affinity toward `other`; unseen pairs are neutral.
    pub fn affinity_toward(&self, other: &str) -> i32 {
        self.relationships.get(other).copied().unwrap_or(0)
    }

    /// Shift the affinity toward `other` by `delta`, staying within bounds.
    ///
    /// Returns the new value.
    pub fn adjust_affinity(&mut self, other: &str, delta: i32) -> i32 {
        let current = self.affinity_toward(other) as i64;
        let updated = clamp_affinity(current + delta as i64);
        self.relationships.insert(other.to_string(), updated);
        updated
    }

    /// Personality traits followed by decision tendencies.
    pub fn traits(&self) -> impl Iterator<Item = &str> {
        self.personality
            .iter()
            .chain(self.tendencies.iter())
            .map(String::as_str)
    }
}

/// One section of the plot outline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoryEvent {
    /// 1-based section number.
    pub section: u32,
    pub title: String,
    #[serde(default)]
    pub details: Vec<String>,
}

impl StoryEvent {
    pub fn new<I, S>(section: u32, title: impl Into<String>, details: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            section,
            title: title.into(),
            details: details.into_iter().map(Into::into).collect(),
        }
    }
}

/// The mutable state of one simulation run.
#[derive(Debug, Clone, PartialEq)]
pub struct StoryContext {
    pub title: String,
    characters: HashMap<String, CharacterProfile>,
    /// Turn order: load order of the characters.
    cast: Vec<String>,
    events: Vec<StoryEvent>,
    current_event_index: usize,
    /// Decisions from the last committed round, by agent name.
    decisions: HashMap<String, String>,
    /// Running summary handed to agents as accumulated story context.
    pub summary: String,
}

impl StoryContext {
    /// Build a fresh context with the cursor on the first event.
    pub fn new(
        title: impl Into<String>,
        characters: Vec<CharacterProfile>,
        events: Vec<StoryEvent>,
    ) -> Result<Self, LoadError> {
        validate_sections(&events)?;

        let mut cast = Vec::with_capacity(characters.len());
        let mut by_name = HashMap::with_capacity(characters.len());
        for character in characters {
            if character.name.trim().is_empty() {
                return Err(LoadError::UnnamedCharacter);
            }
            if by_name.contains_key(&character.name) {
                return Err(LoadError::DuplicateCharacter(character.name));
            }
            cast.push(character.name.clone());
            by_name.insert(character.name.clone(), character);
        }

        Ok(Self {
            title: title.into(),
            characters: by_name,
            cast,
            events,
            current_event_index: 0,
            decisions: HashMap::new(),
            summary: String::new(),
        })
    }

    /// Load both input documents and build a fresh context.
    pub async fn load(
        title: impl Into<String>,
        characters_path: impl AsRef<Path>,
        events_path: impl AsRef<Path>,
    ) -> Result<Self, LoadError> {
        let characters = load_characters(characters_path).await?;
        let events = load_events(events_path).await?;
        Self::new(title, characters, events)
    }

    /// Place the cursor, e.g. when resuming from a snapshot.
    pub fn with_cursor(mut self, cursor: usize) -> Result<Self, LoadError> {
        if cursor > self.events.len() {
            return Err(LoadError::CursorOutOfRange {
                cursor,
                len: self.events.len(),
            });
        }
        self.current_event_index = cursor;
        Ok(self)
    }

    /// Characters in turn order.
    pub fn characters(&self) -> impl Iterator<Item = &CharacterProfile> {
        self.cast.iter().filter_map(|name| self.characters.get(name))
    }

    /// Character names in turn order.
    pub fn cast(&self) -> &[String] {
        &self.cast
    }

    pub fn character(&self, name: &str) -> Option<&CharacterProfile> {
        self.characters.get(name)
    }

    pub fn character_mut(&mut self, name: &str) -> Option<&mut CharacterProfile> {
        self.characters.get_mut(name)
    }

    pub fn events(&self) -> &[StoryEvent] {
        &self.events
    }

    pub fn current_event_index(&self) -> usize {
        self.current_event_index
    }

    /// The event the current round is about, if any remain.
    pub fn current_event(&self) -> Option<&StoryEvent> {
        self.events.get(self.current_event_index)
    }

    /// The event before the current one.
    pub fn previous_event(&self) -> Option<&StoryEvent> {
        self.current_event_index
            .checked_sub(1)
            .and_then(|i| self.events.get(i))
    }

    /// Whether every event has been played.
    pub fn is_finished(&self) -> bool {
        self.current_event_index >= self.events.len()
    }

    /// Move the cursor to the next event. No-op once the events run out.
    pub(crate) fn advance(&mut self) -> bool {
        if self.is_finished() {
            return false;
        }
        self.current_event_index += 1;
        true
    }

    /// Decisions from the last committed round.
    pub fn last_decisions(&self) -> &HashMap<String, String> {
        &self.decisions
    }

    pub(crate) fn set_decisions(&mut self, decisions: HashMap<String, String>) {
        self.decisions = decisions;
    }

    /// Title, cast and plot outline as a plain-text summary.
    pub fn overview(&self) -> String {
        let mut summary = format!("Story Title: {}\n\nCharacters:\n", self.title);
        for character in self.characters() {
            summary.push_str(&format!(
                "- {}: {}, {}\n",
                character.name,
                character.occupation,
                character.personality.join(", ")
            ));
        }
        summary.push_str("\nMajor Events:\n");
        for event in &self.events {
            summary.push_str(&format!("- {}\n", event.title));
        }
        summary
    }
}

/// The characters input document.
#[derive(Debug, Deserialize)]
struct CharacterRoster {
    characters: Vec<CharacterProfile>,
}

/// The events input document.
#[derive(Debug, Deserialize)]
struct EventOutline {
    summary: Vec<StoryEvent>,
}

/// Parse a `{ "characters": [...] }` document.
pub fn parse_characters(json: &str) -> Result<Vec<CharacterProfile>, LoadError> {
    let roster: CharacterRoster = serde_json::from_str(json)?;
    Ok(roster.characters)
}

/// Parse a `{ "summary": [...] }` document.
pub fn parse_events(json: &str) -> Result<Vec<StoryEvent>, LoadError> {
    let outline: EventOutline = serde_json::from_str(json)?;
    validate_sections(&outline.summary)?;
    Ok(outline.summary)
}

pub async fn load_characters(path: impl AsRef<Path>) -> Result<Vec<CharacterProfile>, LoadError> {
    let content = fs::read_to_string(path).await?;
    parse_characters(&content)
}

pub async fn load_events(path: impl AsRef<Path>) -> Result<Vec<StoryEvent>, LoadError> {
    let content = fs::read_to_string(path).await?;
    parse_events(&content)
}

fn validate_sections(events: &[StoryEvent]) -> Result<(), LoadError> {
    let mut previous = 0;
    for event in events {
        if event.section <= previous {
            return Err(LoadError::SectionOrder {
                previous,
                found: event.section,
            });
        }
        previous = event.section;
    }
    Ok(())
}

pub(crate) fn clamp_affinity(value: i64) -> i32 {
    value.clamp(AFFINITY_MIN as i64, AFFINITY_MAX as i64) as i32
}

/// Relationship values may be numbers, numeric strings, or free-text
/// descriptions; anything non-numeric is neutral.
fn deserialize_affinities<'de, D>(deserializer: D) -> Result<HashMap<String, i32>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: HashMap<String, serde_json::Value> = HashMap::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .map(|(name, value)| (name, affinity_from_value(&value)))
        .collect())
}

fn affinity_from_value(value: &serde_json::Value) -> i32 {
    match value {
        serde_json::Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f.round() as i64))
            .map(clamp_affinity)
            .unwrap_or(0),
        serde_json::Value::String(s) => s.trim().parse::<i64>().map(clamp_affinity).unwrap_or(0),
        _ => 0,
    }
}
