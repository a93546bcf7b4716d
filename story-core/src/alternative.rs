//! Fallback decisions that need no outside call.
//!
//! When an agent's own decision is rejected, the engine substitutes one of the
//! character's available options so the round always has a complete batch.

use crate::world::{CharacterProfile, StoryContext};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Options open to every character.
pub const GENERAL_OPTIONS: &[&str] = &[
    "talk to another character",
    "take an action related to the current event",
    "reflect on the situation",
];

/// Extra options unlocked by a keyword in the occupation.
const OCCUPATION_OPTIONS: &[(&str, &str)] = &[
    ("rental girlfriend", "go on a rental date"),
    ("student", "attend a class or study"),
];

/// Extra options unlocked by a keyword in a personality trait.
const PERSONALITY_OPTIONS: &[(&str, &str)] =
    &[("shy", "try to overcome shyness in a social situation")];

/// Every option `character` may fall back on, general ones first.
pub fn available_options(character: &CharacterProfile) -> Vec<String> {
    let mut options: Vec<String> = GENERAL_OPTIONS.iter().map(|o| o.to_string()).collect();

    let occupation = character.occupation.to_lowercase();
    for (keyword, option) in OCCUPATION_OPTIONS {
        if occupation.contains(keyword) {
            options.push(option.to_string());
        }
    }

    for (keyword, option) in PERSONALITY_OPTIONS {
        if character
            .personality
            .iter()
            .any(|t| t.to_lowercase().contains(keyword))
        {
            options.push(option.to_string());
        }
    }

    options
}

/// Picks fallback decisions uniformly from a character's options.
#[derive(Debug, Clone)]
pub struct AlternativeGenerator<R = StdRng> {
    rng: R,
}

impl AlternativeGenerator<StdRng> {
    /// Reproducible fallbacks.
    pub fn seeded(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    pub fn from_entropy() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }
}

impl<R: Rng> AlternativeGenerator<R> {
    pub fn with_rng(rng: R) -> Self {
        Self { rng }
    }

    /// "`<name>` decides to `<option>`" for a random available option.
    pub fn generate(&mut self, name: &str, ctx: &StoryContext) -> String {
        let options = match ctx.character(name) {
            Some(character) => available_options(character),
            None => GENERAL_OPTIONS.iter().map(|o| o.to_string()).collect(),
        };
        let choice = &options[self.rng.gen_range(0..options.len())];
        format!("{name} decides to {choice}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::sample_context;

    #[test]
    fn test_options_conditioned_on_profile() {
        let shy_student = CharacterProfile::new("Sumi", 19, "College Student and rental girlfriend")
            .with_personality(["Very shy", "earnest"]);
        let options = available_options(&shy_student);

        assert_eq!(&options[..3], GENERAL_OPTIONS);
        assert!(options.contains(&"go on a rental date".to_string()));
        assert!(options.contains(&"attend a class or study".to_string()));
        assert!(options.contains(&"try to overcome shyness in a social situation".to_string()));

        let clerk = CharacterProfile::new("Clerk", 40, "Shopkeeper");
        assert_eq!(available_options(&clerk).len(), GENERAL_OPTIONS.len());
    }

    #[test]
    fn test_generated_decision_is_attributed() {
        let ctx = sample_context();
        let mut generator = AlternativeGenerator::seeded(7);
        let kazuya = ctx.character("Kazuya").unwrap();
        let options = available_options(kazuya);

        for _ in 0..20 {
            let decision = generator.generate("Kazuya", &ctx);
            let option = decision
                .strip_prefix("Kazuya decides to ")
                .expect("decision should name the character");
            assert!(options.iter().any(|o| o == option));
        }
    }

    #[test]
    fn test_same_seed_same_choices() {
        let ctx = sample_context();
        let mut a = AlternativeGenerator::seeded(42);
        let mut b = AlternativeGenerator::seeded(42);
        for _ in 0..10 {
            assert_eq!(a.generate("Chizuru", &ctx), b.generate("Chizuru", &ctx));
        }
    }

    #[test]
    fn test_unknown_character_uses_general_options() {
        let ctx = sample_context();
        let mut generator = AlternativeGenerator::seeded(1);
        let decision = generator.generate("Stranger", &ctx);
        let option = decision.strip_prefix("Stranger decides to ").unwrap();
        assert!(GENERAL_OPTIONS.contains(&option));
    }
}
