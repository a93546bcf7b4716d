//! Case-insensitive substring heuristics.
//!
//! These are deliberately crude approximations: a decision "fits" when it
//! mentions an event detail or one of the character's traits, and sentiment
//! is whichever keyword set appears first. They are not semantic validation.

use super::{Classifier, ClassifierError, Sentiment};
use crate::world::{CharacterProfile, StoryEvent};
use async_trait::async_trait;

/// Words marking a decision as discordant.
pub const DISCORD_KEYWORDS: &[&str] = &["argue", "fight", "disagree", "oppose"];

/// Words that raise affinity toward the characters a decision names.
pub const POSITIVE_KEYWORDS: &[&str] = &["help", "support", "agree"];

/// Words that lower affinity toward the characters a decision names.
pub const NEGATIVE_KEYWORDS: &[&str] = &["argue", "disagree", "oppose"];

/// Keyword-matching classifier.
#[derive(Debug, Clone)]
pub struct KeywordClassifier {
    discord: Vec<String>,
    positive: Vec<String>,
    negative: Vec<String>,
}

impl Default for KeywordClassifier {
    fn default() -> Self {
        Self {
            discord: to_owned(DISCORD_KEYWORDS),
            positive: to_owned(POSITIVE_KEYWORDS),
            negative: to_owned(NEGATIVE_KEYWORDS),
        }
    }
}

impl KeywordClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the discord keyword set.
    pub fn with_discord_keywords(mut self, keywords: &[&str]) -> Self {
        self.discord = to_owned(keywords);
        self
    }

    /// Replace the positive and negative sentiment sets.
    pub fn with_sentiment_keywords(mut self, positive: &[&str], negative: &[&str]) -> Self {
        self.positive = to_owned(positive);
        self.negative = to_owned(negative);
        self
    }

    /// A decision fits if it mentions any detail of the event or any trait
    /// or tendency of the character.
    pub fn fits(&self, decision: &str, character: &CharacterProfile, event: &StoryEvent) -> bool {
        let decision = decision.to_lowercase();
        event
            .details
            .iter()
            .map(String::as_str)
            .chain(character.traits())
            .any(|needle| contains_folded(&decision, needle))
    }

    pub fn discordant(&self, decision: &str) -> bool {
        let decision = decision.to_lowercase();
        self.discord.iter().any(|k| contains_folded(&decision, k))
    }

    /// Negative words are checked first: "disagree" contains "agree".
    pub fn sentiment_of(&self, decision: &str) -> Sentiment {
        let decision = decision.to_lowercase();
        if self.negative.iter().any(|k| contains_folded(&decision, k)) {
            Sentiment::Negative
        } else if self.positive.iter().any(|k| contains_folded(&decision, k)) {
            Sentiment::Positive
        } else {
            Sentiment::Neutral
        }
    }

    /// The current title must mention one of the previous event's details.
    pub fn continues(&self, previous: &StoryEvent, current: &StoryEvent) -> bool {
        let title = current.title.to_lowercase();
        previous
            .details
            .iter()
            .any(|detail| contains_folded(&title, detail))
    }
}

#[async_trait]
impl Classifier for KeywordClassifier {
    async fn decision_fits(
        &self,
        decision: &str,
        character: &CharacterProfile,
        event: &StoryEvent,
    ) -> Result<bool, ClassifierError> {
        Ok(self.fits(decision, character, event))
    }

    async fn is_discordant(&self, decision: &str) -> Result<bool, ClassifierError> {
        Ok(self.discordant(decision))
    }

    async fn sentiment(
        &self,
        decision: &str,
        _subject: &str,
        _other: &str,
    ) -> Result<Sentiment, ClassifierError> {
        Ok(self.sentiment_of(decision))
    }

    async fn follows(
        &self,
        previous: &StoryEvent,
        current: &StoryEvent,
    ) -> Result<bool, ClassifierError> {
        Ok(self.continues(previous, current))
    }
}

/// `haystack` must already be lowercase. Blank needles never match.
fn contains_folded(haystack: &str, needle: &str) -> bool {
    let needle = needle.trim();
    !needle.is_empty() && haystack.contains(&needle.to_lowercase())
}

fn to_owned(words: &[&str]) -> Vec<String> {
    words.iter().map(|w| w.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kazuya() -> CharacterProfile {
        CharacterProfile::new("Kazuya", 20, "College student")
            .with_personality(["Indecisive"])
            .with_tendencies(["overthinks"])
    }

    fn rental() -> StoryEvent {
        StoryEvent::new(1, "The First Rental", ["Rental Date", "breakup"])
    }

    #[test]
    fn test_fits_on_event_detail() {
        let classifier = KeywordClassifier::new();
        assert!(classifier.fits(
            "Kazuya nervously books a RENTAL DATE",
            &kazuya(),
            &rental()
        ));
    }

    #[test]
    fn test_fits_on_trait_or_tendency() {
        let classifier = KeywordClassifier::new();
        assert!(classifier.fits("Kazuya is indecisive again", &kazuya(), &rental()));
        assert!(classifier.fits("Kazuya Overthinks it", &kazuya(), &rental()));
    }

    #[test]
    fn test_unrelated_decision_does_not_fit() {
        let classifier = KeywordClassifier::new();
        assert!(!classifier.fits("Kazuya eats ramen", &kazuya(), &rental()));
    }

    #[test]
    fn test_blank_detail_never_matches() {
        let classifier = KeywordClassifier::new();
        let event = StoryEvent::new(1, "Blank", ["", "  "]);
        assert!(!classifier.fits("anything at all", &kazuya(), &event));
    }

    #[test]
    fn test_discord_keywords() {
        let classifier = KeywordClassifier::new();
        assert!(classifier.discordant("Mami decides to Oppose the plan"));
        assert!(classifier.discordant("They fight over it"));
        assert!(!classifier.discordant("Chizuru smiles politely"));

        let custom = KeywordClassifier::new().with_discord_keywords(&["duel"]);
        assert!(custom.discordant("Ruka challenges Chizuru to a duel"));
        assert!(!custom.discordant("They fight over it"));
    }

    #[test]
    fn test_sentiment_prefers_negative() {
        let classifier = KeywordClassifier::new();
        assert_eq!(
            classifier.sentiment_of("Chizuru decides to help Kazuya"),
            Sentiment::Positive
        );
        assert_eq!(
            classifier.sentiment_of("Mami disagrees with Chizuru"),
            Sentiment::Negative
        );
        assert_eq!(
            classifier.sentiment_of("Kazuya waves at Mami"),
            Sentiment::Neutral
        );
    }

    #[test]
    fn test_continuity_checks_previous_details_in_title() {
        let classifier = KeywordClassifier::new();
        let next = StoryEvent::new(2, "Another rental date goes wrong", ["grandmother"]);
        let unrelated = StoryEvent::new(2, "A day at the beach", ["sand"]);

        assert!(classifier.continues(&rental(), &next));
        assert!(!classifier.continues(&rental(), &unrelated));
    }
}
