//! Coherence gates: one per decision, one per round.

use crate::classify::{Classifier, ClassifierError};
use crate::decision::DecisionBatch;
use crate::world::StoryContext;

/// Whether `agent`'s proposed decision fits the active event or the agent's
/// own traits. Unknown agents and a finished story never fit.
pub async fn check_decision(
    classifier: &dyn Classifier,
    decision: &str,
    agent: &str,
    ctx: &StoryContext,
) -> Result<bool, ClassifierError> {
    let (Some(event), Some(character)) = (ctx.current_event(), ctx.character(agent)) else {
        return Ok(false);
    };
    classifier.decision_fits(decision, character, event).await
}

/// Verdict on a whole round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoundVerdict {
    Coherent,
    /// The current event doesn't continue from the previous one.
    Discontinuous { previous: u32, current: u32 },
    /// These characters are named in none of the round's decisions.
    Unrepresented(Vec<String>),
}

impl RoundVerdict {
    pub fn is_coherent(&self) -> bool {
        matches!(self, RoundVerdict::Coherent)
    }
}

/// Whether a round may be committed.
///
/// The current event must continue from the previous one (when there is one),
/// and every character must be named in at least one of the round's
/// decisions.
pub async fn check_round(
    classifier: &dyn Classifier,
    ctx: &StoryContext,
    batch: &DecisionBatch,
) -> Result<RoundVerdict, ClassifierError> {
    if let (Some(previous), Some(current)) = (ctx.previous_event(), ctx.current_event()) {
        if !classifier.follows(previous, current).await? {
            return Ok(RoundVerdict::Discontinuous {
                previous: previous.section,
                current: current.section,
            });
        }
    }

    let missing: Vec<String> = ctx
        .cast()
        .iter()
        .filter(|name| !batch.iter().any(|d| d.text.contains(name.as_str())))
        .cloned()
        .collect();

    if missing.is_empty() {
        Ok(RoundVerdict::Coherent)
    } else {
        Ok(RoundVerdict::Unrepresented(missing))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::KeywordClassifier;
    use crate::testing::sample_context;
    use crate::world::{CharacterProfile, StoryEvent};

    #[tokio::test]
    async fn test_decision_mentioning_detail_is_coherent() {
        let ctx = sample_context();
        let classifier = KeywordClassifier::new();
        assert!(
            check_decision(&classifier, "Mami watches the Rental Date", "Mami", &ctx)
                .await
                .unwrap()
        );
        assert!(!check_decision(&classifier, "Mami eats lunch", "Mami", &ctx)
            .await
            .unwrap());
        assert!(
            !check_decision(&classifier, "rental date", "Nobody", &ctx)
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn test_first_round_with_everyone_named_is_coherent() {
        let ctx = sample_context();
        let batch = DecisionBatch::new()
            .with("Kazuya", "Kazuya hesitates")
            .with("Chizuru", "Chizuru smiles")
            .with("Mami", "Mami watches");

        let verdict = check_round(&KeywordClassifier::new(), &ctx, &batch)
            .await
            .unwrap();
        assert!(verdict.is_coherent());
    }

    #[tokio::test]
    async fn test_names_may_come_from_any_decision() {
        let ctx = sample_context();
        let batch = DecisionBatch::new()
            .with("Kazuya", "Kazuya calls Chizuru and Mami")
            .with("Chizuru", "She agrees")
            .with("Mami", "She refuses");

        let verdict = check_round(&KeywordClassifier::new(), &ctx, &batch)
            .await
            .unwrap();
        assert_eq!(verdict, RoundVerdict::Coherent);
    }

    #[tokio::test]
    async fn test_missing_character_rejects_round() {
        let ctx = sample_context();
        let batch = DecisionBatch::new()
            .with("Kazuya", "Kazuya hesitates")
            .with("Chizuru", "Chizuru smiles")
            .with("Mami", "She watches");

        let verdict = check_round(&KeywordClassifier::new(), &ctx, &batch)
            .await
            .unwrap();
        assert_eq!(verdict, RoundVerdict::Unrepresented(vec!["Mami".to_string()]));
    }

    #[tokio::test]
    async fn test_discontinuous_events_reject_round() {
        let ctx = StoryContext::new(
            "Jumpy",
            vec![CharacterProfile::new("Ami", 20, "Student")],
            vec![
                StoryEvent::new(1, "Morning", ["coffee"]),
                StoryEvent::new(2, "A trip to the moon", ["rocket"]),
            ],
        )
        .unwrap()
        .with_cursor(1)
        .unwrap();
        let batch = DecisionBatch::new().with("Ami", "Ami boards the rocket");

        let verdict = check_round(&KeywordClassifier::new(), &ctx, &batch)
            .await
            .unwrap();
        assert_eq!(
            verdict,
            RoundVerdict::Discontinuous {
                previous: 1,
                current: 2
            }
        );
    }
}
