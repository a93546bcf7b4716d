//! Arbitration between contradictory decisions in the same round.
//!
//! Two decisions conflict when both are discordant. Each conflicting pair is
//! settled on its own: the stronger character keeps their decision, the other
//! gets a fallback. No attempt is made to settle chains of conflicts
//! transitively, so a character who loses one pair can still win another.

use crate::alternative::AlternativeGenerator;
use crate::classify::{Classifier, ClassifierError};
use crate::decision::{DecisionBatch, DecisionOrigin};
use crate::world::{CharacterProfile, StoryContext};
use rand::Rng;
use tracing::info;

/// How one conflicting pair was settled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Arbitration {
    pub winner: String,
    pub loser: String,
    pub winner_score: i64,
    pub loser_score: i64,
}

/// The arbitrated batch plus how each conflict went.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub batch: DecisionBatch,
    pub arbitrations: Vec<Arbitration>,
}

/// Total length of the character's traits plus their affinity toward the
/// opponent.
pub fn strength(character: &CharacterProfile, opponent: &str) -> i64 {
    let traits: i64 = character
        .personality
        .iter()
        .map(|t| t.chars().count() as i64)
        .sum();
    traits + character.affinity_toward(opponent) as i64
}

/// Settle every conflicting pair in `batch`.
///
/// Pairs are detected against the batch as submitted. On equal scores the
/// agent earlier in the batch wins.
pub async fn resolve_conflicts<R: Rng>(
    batch: &DecisionBatch,
    ctx: &StoryContext,
    classifier: &dyn Classifier,
    alternatives: &mut AlternativeGenerator<R>,
) -> Result<Resolution, ClassifierError> {
    let mut discordant = Vec::with_capacity(batch.len());
    for decision in batch.iter() {
        discordant.push(classifier.is_discordant(&decision.text).await?);
    }

    let agents: Vec<&str> = batch.iter().map(|d| d.agent.as_str()).collect();
    let mut resolved = batch.clone();
    let mut arbitrations = Vec::new();

    for i in 0..agents.len() {
        for j in (i + 1)..agents.len() {
            if !(discordant[i] && discordant[j]) {
                continue;
            }

            let (first, second) = (agents[i], agents[j]);
            let first_score = ctx.character(first).map(|c| strength(c, second)).unwrap_or(0);
            let second_score = ctx.character(second).map(|c| strength(c, first)).unwrap_or(0);

            let arbitration = if first_score >= second_score {
                Arbitration {
                    winner: first.to_string(),
                    loser: second.to_string(),
                    winner_score: first_score,
                    loser_score: second_score,
                }
            } else {
                Arbitration {
                    winner: second.to_string(),
                    loser: first.to_string(),
                    winner_score: second_score,
                    loser_score: first_score,
                }
            };

            info!(
                winner = %arbitration.winner,
                loser = %arbitration.loser,
                winner_score = arbitration.winner_score,
                loser_score = arbitration.loser_score,
                "Resolved conflicting decisions"
            );

            let already_replaced = resolved
                .get(&arbitration.loser)
                .is_some_and(|d| d.origin == DecisionOrigin::Arbitrated);
            if !already_replaced {
                let replacement = alternatives.generate(&arbitration.loser, ctx);
                resolved.insert(
                    arbitration.loser.clone(),
                    replacement,
                    DecisionOrigin::Arbitrated,
                );
            }

            arbitrations.push(arbitration);
        }
    }

    Ok(Resolution {
        batch: resolved,
        arbitrations,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::KeywordClassifier;
    use crate::world::StoryEvent;

    fn duel_context() -> StoryContext {
        let a = CharacterProfile::new("A", 20, "Student")
            .with_personality(["brave"])
            .with_affinity("B", 2);
        let b = CharacterProfile::new("B", 20, "Student")
            .with_personality(["kind"])
            .with_affinity("A", 1);
        StoryContext::new(
            "Duel",
            vec![a, b],
            vec![StoryEvent::new(1, "Showdown", ["duel"])],
        )
        .unwrap()
    }

    #[test]
    fn test_strength_score() {
        let ctx = duel_context();
        assert_eq!(strength(ctx.character("A").unwrap(), "B"), 7);
        assert_eq!(strength(ctx.character("B").unwrap(), "A"), 5);
    }

    #[tokio::test]
    async fn test_stronger_character_keeps_decision() {
        let ctx = duel_context();
        let batch = DecisionBatch::new()
            .with("A", "A decides to argue with B")
            .with("B", "B decides to argue with A");
        let mut alternatives = AlternativeGenerator::seeded(3);

        let resolution =
            resolve_conflicts(&batch, &ctx, &KeywordClassifier::new(), &mut alternatives)
                .await
                .unwrap();

        assert_eq!(
            resolution.arbitrations,
            vec![Arbitration {
                winner: "A".to_string(),
                loser: "B".to_string(),
                winner_score: 7,
                loser_score: 5,
            }]
        );
        let a = resolution.batch.get("A").unwrap();
        assert_eq!(a.text, "A decides to argue with B");
        assert_eq!(a.origin, DecisionOrigin::Agent);

        let b = resolution.batch.get("B").unwrap();
        assert_eq!(b.origin, DecisionOrigin::Arbitrated);
        assert!(b.text.starts_with("B decides to "));
        assert_ne!(b.text, "B decides to argue with A");
    }

    #[tokio::test]
    async fn test_different_discord_keywords_still_conflict() {
        let ctx = duel_context();
        let batch = DecisionBatch::new()
            .with("A", "A wants to fight")
            .with("B", "B will oppose A");
        let mut alternatives = AlternativeGenerator::seeded(3);

        let resolution =
            resolve_conflicts(&batch, &ctx, &KeywordClassifier::new(), &mut alternatives)
                .await
                .unwrap();
        assert_eq!(resolution.arbitrations.len(), 1);
        assert_eq!(resolution.batch.count(DecisionOrigin::Arbitrated), 1);
    }

    #[tokio::test]
    async fn test_tie_goes_to_first_in_batch() {
        let a = CharacterProfile::new("A", 20, "Student").with_personality(["calm"]);
        let b = CharacterProfile::new("B", 20, "Student").with_personality(["cool"]);
        let ctx = StoryContext::new("Tie", vec![b, a], vec![]).unwrap();
        let batch = DecisionBatch::new()
            .with("B", "B will argue")
            .with("A", "A will argue");
        let mut alternatives = AlternativeGenerator::seeded(3);

        let resolution =
            resolve_conflicts(&batch, &ctx, &KeywordClassifier::new(), &mut alternatives)
                .await
                .unwrap();
        assert_eq!(resolution.arbitrations[0].winner, "B");
        assert_eq!(resolution.batch.text_of("B"), Some("B will argue"));
    }

    #[tokio::test]
    async fn test_one_sided_discord_is_not_a_conflict() {
        let ctx = duel_context();
        let batch = DecisionBatch::new()
            .with("A", "A decides to argue with B")
            .with("B", "B bakes a cake");
        let mut alternatives = AlternativeGenerator::seeded(3);

        let resolution =
            resolve_conflicts(&batch, &ctx, &KeywordClassifier::new(), &mut alternatives)
                .await
                .unwrap();
        assert!(resolution.arbitrations.is_empty());
        assert_eq!(resolution.batch, batch);
    }
}
