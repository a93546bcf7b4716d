//! Play the bundled Rent-A-Girlfriend story against Claude.
//!
//! ```bash
//! cargo run -p story-core --example run_story -- [--resume] [--narrate] [--elaborate] [--semantic]
//! ```
//!
//! Snapshots go to `story_state.json` and the transcript to
//! `conversation_log.txt` in the current directory. Set `RUST_LOG` to change
//! the log level (default `story_core=info`).

use std::path::{Path, PathBuf};
use std::sync::Arc;

use story_core::{
    resume, ClaudeProvider, EngineConfig, SemanticClassifier, StoryContext, StoryEngine,
};
use tracing_subscriber::EnvFilter;

const TITLE: &str = "Rent-A-Girlfriend";
const SNAPSHOT_FILE: &str = "story_state.json";
const TRANSCRIPT_FILE: &str = "conversation_log.txt";

fn data_file(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("data").join(name)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("story_core=info")),
        )
        .init();

    if std::env::var("ANTHROPIC_API_KEY").is_err() {
        eprintln!("Error: ANTHROPIC_API_KEY environment variable not set.");
        eprintln!("Please set it in .env file or with: export ANTHROPIC_API_KEY=your_key_here");
        std::process::exit(1);
    }

    let args: Vec<String> = std::env::args().collect();
    let flag = |name: &str| args.iter().any(|a| a == name);

    let (run_id, mut ctx) = if flag("--resume") && Path::new(SNAPSHOT_FILE).exists() {
        let (run_id, ctx) = resume(SNAPSHOT_FILE).await?;
        println!(
            "Resuming run {run_id} at event {} of {}",
            ctx.current_event_index() + 1,
            ctx.events().len()
        );
        (Some(run_id), ctx)
    } else {
        let ctx = StoryContext::load(
            TITLE,
            data_file("character_profiles.json"),
            data_file("story_events.json"),
        )
        .await?;
        (None, ctx)
    };

    let config = EngineConfig::new()
        .with_snapshot_path(SNAPSHOT_FILE)
        .with_transcript_path(TRANSCRIPT_FILE)
        .with_narrator(flag("--narrate"))
        .with_elaboration(flag("--elaborate"));

    let mut engine = StoryEngine::new(Arc::new(ClaudeProvider::from_env()?), config);
    if let Some(run_id) = run_id {
        engine = engine.with_run_id(run_id);
    }
    if flag("--semantic") {
        engine = engine.with_classifier(SemanticClassifier::from_env()?);
    }

    let report = engine.run(&mut ctx).await?;

    println!("\n=== {} ===", ctx.title);
    println!("Outcome: {}", report.outcome);
    println!(
        "Rounds: {} ({} committed, {} rejected)",
        report.rounds, report.commits, report.rejections
    );
    println!("Fallback decisions: {}", report.fallbacks);
    println!("Conflicts settled: {}", report.arbitrations);
    if !report.skipped_sections.is_empty() {
        println!("Skipped sections: {:?}", report.skipped_sections);
    }

    println!("\nRelationships:");
    for character in ctx.characters() {
        let mut relationships: Vec<_> = character.relationships.iter().collect();
        relationships.sort();
        let listed = relationships
            .iter()
            .map(|(other, affinity)| format!("{other} {affinity:+}"))
            .collect::<Vec<_>>()
            .join(", ");
        println!("  {}: {listed}", character.name);
    }

    Ok(())
}
