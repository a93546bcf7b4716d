//! Affinity updates driven by committed decisions.
//!
//! Affinity is directional: a decision by A that names B only moves A's view
//! of B.

use crate::classify::{Classifier, ClassifierError};
use crate::decision::DecisionBatch;
use crate::world::StoryContext;

/// A pending affinity shift.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AffinityShift {
    pub from: String,
    pub toward: String,
    pub delta: i32,
}

/// An applied affinity change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AffinityChange {
    pub from: String,
    pub toward: String,
    pub before: i32,
    pub after: i32,
}

/// Work out every shift the round implies without touching the context.
pub async fn plan_round(
    ctx: &StoryContext,
    batch: &DecisionBatch,
    classifier: &dyn Classifier,
) -> Result<Vec<AffinityShift>, ClassifierError> {
    let mut shifts = Vec::new();

    for decision in batch.iter() {
        for other in ctx.cast() {
            if *other == decision.agent || !decision.text.contains(other.as_str()) {
                continue;
            }
            let sentiment = classifier
                .sentiment(&decision.text, &decision.agent, other)
                .await?;
            let delta = sentiment.delta();
            if delta != 0 {
                shifts.push(AffinityShift {
                    from: decision.agent.clone(),
                    toward: other.clone(),
                    delta,
                });
            }
        }
    }

    Ok(shifts)
}

/// Apply planned shifts, clamping every affinity into bounds.
pub fn apply_shifts(ctx: &mut StoryContext, shifts: &[AffinityShift]) -> Vec<AffinityChange> {
    shifts
        .iter()
        .filter_map(|shift| {
            let character = ctx.character_mut(&shift.from)?;
            let before = character.affinity_toward(&shift.toward);
            let after = character.adjust_affinity(&shift.toward, shift.delta);
            Some(AffinityChange {
                from: shift.from.clone(),
                toward: shift.toward.clone(),
                before,
                after,
            })
        })
        .collect()
}

/// Plan and apply in one step.
pub async fn update_relationships(
    ctx: &mut StoryContext,
    batch: &DecisionBatch,
    classifier: &dyn Classifier,
) -> Result<Vec<AffinityChange>, ClassifierError> {
    let shifts = plan_round(ctx, batch, classifier).await?;
    Ok(apply_shifts(ctx, &shifts))
}
