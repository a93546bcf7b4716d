//! Prompt text sent to agents and the narrator.

use crate::alternative::available_options;
use crate::decision::DecisionBatch;
use crate::provider::DecisionRequest;
use crate::world::{CharacterProfile, StoryContext, StoryEvent};
use serde_json::{json, Map, Value};

/// Name the narrator speaks under.
pub const NARRATOR: &str = "Narrator";

/// Standing in-character instructions for one agent.
pub fn agent_instructions(character: &CharacterProfile, ctx: &StoryContext) -> String {
    let relationships = serde_json::to_string_pretty(&character.relationships)
        .unwrap_or_else(|_| "{}".to_string());

    let others: Map<String, Value> = ctx
        .characters()
        .filter(|c| c.name != character.name)
        .map(|c| {
            (
                c.name.clone(),
                json!({ "age": c.age, "occupation": c.occupation }),
            )
        })
        .collect();
    let others = serde_json::to_string_pretty(&others).unwrap_or_else(|_| "{}".to_string());

    format!(
        r#"You are {name}, age {age}, occupation: {occupation}.
Personality traits: {traits}
Decision-making tendencies: {tendencies}

Your relationships (affinity from -10 to 10):
{relationships}

Other characters in the story:
{others}

Story context:
Title: {title}

Your goal is to interact with other characters and make decisions that progress the story.
Always stay in character and make decisions based on your personality, relationships, and the current story context.
Answer with a single short decision in the third person that starts with your name."#,
        name = character.name,
        age = character.age,
        occupation = character.occupation,
        traits = character.personality.join(", "),
        tendencies = character.tendencies.join(", "),
        title = ctx.title,
    )
}

/// The active event as agents see it.
pub fn event_context(event: &StoryEvent) -> String {
    let details = event
        .details
        .iter()
        .map(|d| format!("- {d}"))
        .collect::<Vec<_>>()
        .join("\n");
    format!("Current event: {}\nDetails:\n{details}", event.title)
}

/// Ask for a decision, listing the character's options.
pub fn decision_prompt(options: &[String]) -> String {
    let listed = options
        .iter()
        .enumerate()
        .map(|(i, option)| format!("{}. {}", i + 1, capitalize(option)))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "What would you like to do? Choose from the following options or suggest your own:\n{listed}"
    )
}

/// Ask an agent to act out a decision it has already made.
pub fn elaboration_prompt(decision: &str) -> String {
    format!("Describe how you carry out this decision: {decision}")
}

/// The full request for `character`'s turn.
pub fn decision_request(character: &CharacterProfile, ctx: &StoryContext) -> DecisionRequest {
    DecisionRequest {
        agent: character.name.clone(),
        instructions: agent_instructions(character, ctx),
        event_context: ctx.current_event().map(event_context).unwrap_or_default(),
        story_context: ctx.summary.clone(),
        prompt: decision_prompt(&available_options(character)),
    }
}

/// Standing instructions for the narrator.
pub fn narrator_instructions(ctx: &StoryContext) -> String {
    format!(
        "You are the narrator for the story \"{}\". \
Your role is to summarize events and offer insights into character development and plot progression. \
Keep each summary to two or three sentences.",
        ctx.title
    )
}

/// Ask the narrator to sum up a committed round.
pub fn narration_request(ctx: &StoryContext, event: &StoryEvent, batch: &DecisionBatch) -> DecisionRequest {
    DecisionRequest {
        agent: NARRATOR.to_string(),
        instructions: narrator_instructions(ctx),
        event_context: event_context(event),
        story_context: ctx.summary.clone(),
        prompt: format!(
            "Summarize what just happened:\n{}",
            decision_lines(batch)
        ),
    }
}

/// Human-readable account of a committed round.
pub fn round_report(event: &StoryEvent, batch: &DecisionBatch) -> String {
    format!("Current Event: {}\n\n{}", event.title, decision_lines(batch))
}

fn decision_lines(batch: &DecisionBatch) -> String {
    batch
        .iter()
        .map(|d| format!("{}: {}", d.agent, d.text))
        .collect::<Vec<_>>()
        .join("\n")
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::sample_context;

    #[test]
    fn test_instructions_describe_character_and_cast() {
        let ctx = sample_context();
        let kazuya = ctx.character("Kazuya").unwrap();
        let instructions = agent_instructions(kazuya, &ctx);

        assert!(instructions.starts_with("You are Kazuya, age 20"));
        assert!(instructions.contains("indecisive"));
        assert!(instructions.contains("overthinks"));
        assert!(instructions.contains("\"Chizuru\""));
        assert!(instructions.contains(&ctx.title));
    }

    #[test]
    fn test_decision_prompt_numbers_options() {
        let prompt = decision_prompt(&["reflect on the situation".to_string()]);
        assert!(prompt.ends_with("1. Reflect on the situation"));
    }

    #[test]
    fn test_decision_request_carries_event_and_summary() {
        let mut ctx = sample_context();
        ctx.summary = "So far: nothing".to_string();
        let request = decision_request(ctx.character("Mami").unwrap(), &ctx);

        assert_eq!(request.agent, "Mami");
        assert!(request.event_context.starts_with("Current event: The First Rental"));
        assert!(request.event_context.contains("- rental date"));
        assert_eq!(request.story_context, "So far: nothing");
        assert!(request.prompt.contains("Attend a class or study"));
    }

    #[test]
    fn test_round_report() {
        let ctx = sample_context();
        let event = ctx.current_event().unwrap();
        let batch = DecisionBatch::new()
            .with("Kazuya", "Kazuya panics")
            .with("Mami", "Mami smirks");
        let report = round_report(event, &batch);
        assert_eq!(
            report,
            "Current Event: The First Rental\n\nKazuya: Kazuya panics\nMami: Mami smirks"
        );
    }
}
