//! The turn scheduler.
//!
//! One round per event: every character proposes a decision in turn order,
//! the batch is arbitrated and gated, and only a coherent round is committed.
//! A rejected round leaves the context untouched and is replayed for the same
//! event.
//!
//! Everything that can fail (completion calls, classifier calls) happens
//! before the first mutation of a round, so a fatal error never leaves a
//! half-applied round behind.

use crate::alternative::AlternativeGenerator;
use crate::classify::{Classifier, ClassifierError, KeywordClassifier};
use crate::coherence::{check_decision, check_round, RoundVerdict};
use crate::config::{EngineConfig, PersistencePolicy, RejectionPolicy};
use crate::conflict::{resolve_conflicts, Arbitration};
use crate::decision::{DecisionBatch, DecisionOrigin};
use crate::persist::{PersistError, Snapshot};
use crate::prompts;
use crate::provider::{DecisionProvider, DecisionRequest, ProviderError};
use crate::relationship::{apply_shifts, plan_round, AffinityChange};
use crate::retry::{with_backoff, RetryError};
use crate::transcript::Transcript;
use crate::world::StoryContext;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Errors that end a run.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Completion call for {agent} failed: {source}")]
    Upstream {
        agent: String,
        #[source]
        source: RetryError<ProviderError>,
    },

    #[error("Classifier error: {0}")]
    Classifier(#[from] ClassifierError),

    #[error("Section {section} was rejected {attempts} times in a row")]
    RejectionLimit { section: u32, attempts: u32 },

    #[error("Snapshot error: {0}")]
    Persist(#[from] PersistError),
}

impl EngineError {
    /// Short label for the kind of failure, used in the final log line.
    pub fn cause(&self) -> &'static str {
        match self {
            EngineError::Upstream { source, .. } if source.is_exhausted() => {
                "upstream throttling exhausted"
            }
            EngineError::Upstream { .. } => "upstream hard failure",
            EngineError::Classifier(ClassifierError::Upstream(source))
                if source.is_exhausted() =>
            {
                "upstream throttling exhausted"
            }
            EngineError::Classifier(ClassifierError::Upstream(_)) => "upstream hard failure",
            EngineError::Classifier(ClassifierError::Verdict(_)) => "unreadable classifier verdict",
            EngineError::RejectionLimit { .. } => "rejection cap",
            EngineError::Persist(_) => "persistence",
        }
    }
}

/// Where the scheduler is within a round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    AwaitingDecisions,
    Resolving,
    CoherenceGate,
    Committed,
    Rejected,
    EventsExhausted,
    TurnLimitReached,
    Cancelled,
}

impl Phase {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Phase::EventsExhausted | Phase::TurnLimitReached | Phase::Cancelled
        )
    }
}

/// How a run ended without error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    EventsExhausted,
    TurnLimitReached,
    Cancelled,
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunOutcome::EventsExhausted => write!(f, "all events played"),
            RunOutcome::TurnLimitReached => write!(f, "turn limit reached"),
            RunOutcome::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Tally of a finished run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub outcome: RunOutcome,
    /// Rounds played, rejected ones included.
    pub rounds: u32,
    pub commits: u32,
    pub rejections: u32,
    /// Fallback decisions that made it into committed rounds.
    pub fallbacks: u32,
    /// Conflicts settled in committed rounds.
    pub arbitrations: u32,
    /// Sections passed over under [`RejectionPolicy::SkipEvent`].
    pub skipped_sections: Vec<u32>,
    pub snapshot_failures: u32,
}

/// What happened to the snapshot after a commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnapshotStatus {
    /// No snapshot path configured.
    Disabled,
    Saved,
    /// The write failed and the run went on under the best-effort policy.
    Failed(String),
}

/// A committed round.
#[derive(Debug, Clone)]
pub struct CommittedRound {
    pub section: u32,
    pub batch: DecisionBatch,
    pub arbitrations: Vec<Arbitration>,
    pub changes: Vec<AffinityChange>,
    /// Agent name and elaboration, when elaboration is enabled.
    pub elaborations: Vec<(String, String)>,
    pub narration: Option<String>,
    pub snapshot: SnapshotStatus,
}

/// Result of a single round.
#[derive(Debug, Clone)]
pub enum RoundOutcome {
    Committed(CommittedRound),
    /// Nothing was committed; the same event is up again.
    Rejected { section: u32, verdict: RoundVerdict },
    /// There was no event left to play.
    EventsExhausted,
}

/// Stops a run between rounds.
///
/// A completion call already in flight is not interrupted.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Drives a story from its current event to the end.
pub struct StoryEngine {
    provider: Arc<dyn DecisionProvider>,
    classifier: Box<dyn Classifier>,
    alternatives: AlternativeGenerator,
    config: EngineConfig,
    transcript: Transcript,
    cancel: CancelToken,
    run_id: Uuid,
    phase: Phase,
}

impl StoryEngine {
    /// Create an engine using the keyword classifier.
    pub fn new(provider: Arc<dyn DecisionProvider>, config: EngineConfig) -> Self {
        let alternatives = match config.seed {
            Some(seed) => AlternativeGenerator::seeded(seed),
            None => AlternativeGenerator::from_entropy(),
        };
        let transcript = match &config.transcript_path {
            Some(path) => Transcript::to_file(path.clone()),
            None => Transcript::in_memory(),
        };

        Self {
            provider,
            classifier: Box::new(KeywordClassifier::new()),
            alternatives,
            config,
            transcript,
            cancel: CancelToken::new(),
            run_id: Uuid::new_v4(),
            phase: Phase::AwaitingDecisions,
        }
    }

    /// Judge decisions with another classifier.
    pub fn with_classifier(mut self, classifier: impl Classifier + 'static) -> Self {
        self.classifier = Box::new(classifier);
        self
    }

    /// Continue an earlier run, e.g. after resuming from its snapshot.
    pub fn with_run_id(mut self, run_id: Uuid) -> Self {
        self.run_id = run_id;
        self
    }

    /// A handle that cancels this engine's run.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    /// Play rounds until the events run out, the turn limit is hit, or the
    /// run is cancelled.
    pub async fn run(&mut self, ctx: &mut StoryContext) -> Result<RunReport, EngineError> {
        info!(
            run_id = %self.run_id,
            title = %ctx.title,
            cursor = ctx.current_event_index(),
            events = ctx.events().len(),
            "Starting story run"
        );

        if ctx.summary.is_empty() {
            ctx.summary = ctx.overview();
        }
        for character in ctx.characters() {
            self.transcript.record_profile(character);
        }

        let mut rounds = 0;
        let mut commits = 0;
        let mut rejections = 0;
        let mut fallbacks = 0;
        let mut arbitrations = 0;
        let mut skipped_sections = Vec::new();
        let mut snapshot_failures = 0;
        let mut consecutive_rejections = 0;

        let outcome = loop {
            if self.cancel.is_cancelled() {
                self.set_phase(Phase::Cancelled);
                break RunOutcome::Cancelled;
            }
            if ctx.is_finished() {
                self.set_phase(Phase::EventsExhausted);
                break RunOutcome::EventsExhausted;
            }
            if rounds >= self.config.max_rounds {
                self.set_phase(Phase::TurnLimitReached);
                break RunOutcome::TurnLimitReached;
            }

            rounds += 1;
            let round = match self.play_round(ctx).await {
                Ok(round) => round,
                Err(e) => return Err(self.halt(e).await),
            };

            match round {
                RoundOutcome::Committed(committed) => {
                    consecutive_rejections = 0;
                    commits += 1;
                    fallbacks += committed.batch.count(DecisionOrigin::Fallback) as u32;
                    arbitrations += committed.arbitrations.len() as u32;
                    if matches!(committed.snapshot, SnapshotStatus::Failed(_)) {
                        snapshot_failures += 1;
                    }
                    self.flush_transcript().await;
                }
                RoundOutcome::Rejected { section, .. } => {
                    rejections += 1;
                    consecutive_rejections += 1;
                    if consecutive_rejections <= self.config.max_round_retries {
                        continue;
                    }
                    match self.config.rejection_policy {
                        RejectionPolicy::Abort => {
                            let e = EngineError::RejectionLimit {
                                section,
                                attempts: consecutive_rejections,
                            };
                            return Err(self.halt(e).await);
                        }
                        RejectionPolicy::SkipEvent => {
                            warn!(
                                section,
                                attempts = consecutive_rejections,
                                "Rejection cap reached; skipping event"
                            );
                            self.transcript.record(format!(
                                "Section {section} skipped after {consecutive_rejections} rejected rounds"
                            ));
                            ctx.advance();
                            skipped_sections.push(section);
                            consecutive_rejections = 0;
                        }
                    }
                }
                RoundOutcome::EventsExhausted => {
                    self.set_phase(Phase::EventsExhausted);
                    break RunOutcome::EventsExhausted;
                }
            }
        };

        info!(
            outcome = %outcome,
            rounds,
            commits,
            rejections,
            cursor = ctx.current_event_index(),
            "Story run finished"
        );
        self.transcript
            .record(format!("Run finished: {outcome} after {rounds} rounds"));
        self.flush_transcript().await;

        Ok(RunReport {
            outcome,
            rounds,
            commits,
            rejections,
            fallbacks,
            arbitrations,
            skipped_sections,
            snapshot_failures,
        })
    }

    /// Play one round for the current event.
    pub async fn play_round(&mut self, ctx: &mut StoryContext) -> Result<RoundOutcome, EngineError> {
        self.set_phase(Phase::AwaitingDecisions);
        let Some(event) = ctx.current_event().cloned() else {
            self.set_phase(Phase::EventsExhausted);
            return Ok(RoundOutcome::EventsExhausted);
        };
        let section = event.section;
        self.transcript.record(prompts::event_context(&event));

        let mut batch = DecisionBatch::new();
        for name in ctx.cast().to_vec() {
            let Some(character) = ctx.character(&name) else {
                continue;
            };
            let request = prompts::decision_request(character, ctx);
            let proposed = self.ask(&request).await?;

            let coherent =
                check_decision(self.classifier.as_ref(), &proposed, &name, ctx).await?;
            if coherent {
                debug!(agent = %name, decision = %proposed, "Decision accepted");
                self.transcript.record(format!("{name}: {proposed}"));
                batch.insert(name, proposed, DecisionOrigin::Agent);
            } else {
                let fallback = self.alternatives.generate(&name, ctx);
                info!(
                    agent = %name,
                    rejected = %proposed,
                    fallback = %fallback,
                    "Decision incoherent; substituting fallback"
                );
                self.transcript
                    .record(format!("{name}: {fallback} (fallback for: {proposed})"));
                batch.insert(name, fallback, DecisionOrigin::Fallback);
            }
        }

        self.set_phase(Phase::Resolving);
        let resolution =
            resolve_conflicts(&batch, ctx, self.classifier.as_ref(), &mut self.alternatives)
                .await?;
        for arbitration in &resolution.arbitrations {
            self.transcript.record(format!(
                "Conflict: {} prevails over {} ({} to {})",
                arbitration.winner,
                arbitration.loser,
                arbitration.winner_score,
                arbitration.loser_score
            ));
        }
        let batch = resolution.batch;

        self.set_phase(Phase::CoherenceGate);
        let verdict = check_round(self.classifier.as_ref(), ctx, &batch).await?;
        if !verdict.is_coherent() {
            self.set_phase(Phase::Rejected);
            warn!(section, verdict = ?verdict, "Round rejected; replaying event");
            self.transcript.record(format!(
                "Round for \"{}\" rejected: {}",
                event.title,
                describe(&verdict)
            ));
            return Ok(RoundOutcome::Rejected { section, verdict });
        }

        // Fallible work first; nothing below the next block can fail.
        let shifts = plan_round(ctx, &batch, self.classifier.as_ref()).await?;
        let mut elaborations = Vec::new();
        if self.config.elaborate_decisions {
            for decision in batch.iter().filter(|d| d.origin == DecisionOrigin::Agent) {
                let Some(character) = ctx.character(&decision.agent) else {
                    continue;
                };
                let mut request = prompts::decision_request(character, ctx);
                request.prompt = prompts::elaboration_prompt(&decision.text);
                let text = self.ask(&request).await?;
                elaborations.push((decision.agent.clone(), text));
            }
        }
        let narration = if self.config.narrate {
            let request = prompts::narration_request(ctx, &event, &batch);
            Some(self.ask(&request).await?)
        } else {
            None
        };

        let changes = apply_shifts(ctx, &shifts);
        for change in &changes {
            debug!(
                from = %change.from,
                toward = %change.toward,
                before = change.before,
                after = change.after,
                "Affinity updated"
            );
        }
        ctx.set_decisions(batch.to_map());
        for (agent, text) in &elaborations {
            self.transcript.record(format!("{agent}: {text}"));
        }
        if let Some(narration) = &narration {
            ctx.summary.push_str("\n\n");
            ctx.summary.push_str(narration);
            self.transcript
                .record(format!("{}: {narration}", prompts::NARRATOR));
        }
        self.transcript.record(prompts::round_report(&event, &batch));
        ctx.advance();
        self.set_phase(Phase::Committed);
        info!(
            section,
            title = %event.title,
            fallbacks = batch.count(DecisionOrigin::Fallback),
            arbitrations = resolution.arbitrations.len(),
            "Round committed"
        );

        let snapshot = self.checkpoint(ctx).await?;

        Ok(RoundOutcome::Committed(CommittedRound {
            section,
            batch,
            arbitrations: resolution.arbitrations,
            changes,
            elaborations,
            narration,
            snapshot,
        }))
    }

    /// One completion call under the retry policy.
    async fn ask(&self, request: &DecisionRequest) -> Result<String, EngineError> {
        let provider = self.provider.as_ref();
        with_backoff(&self.config.retry, move || provider.decide(request))
            .await
            .map_err(|source| EngineError::Upstream {
                agent: request.agent.clone(),
                source,
            })
    }

    async fn checkpoint(&self, ctx: &StoryContext) -> Result<SnapshotStatus, EngineError> {
        let Some(path) = &self.config.snapshot_path else {
            return Ok(SnapshotStatus::Disabled);
        };

        match Snapshot::capture(self.run_id, ctx).save_json(path).await {
            Ok(()) => {
                debug!(path = %path.display(), "Snapshot saved");
                Ok(SnapshotStatus::Saved)
            }
            Err(e) => match self.config.persistence {
                PersistencePolicy::BestEffort => {
                    warn!(
                        path = %path.display(),
                        error = %e,
                        "Snapshot failed; continuing on in-memory state"
                    );
                    Ok(SnapshotStatus::Failed(e.to_string()))
                }
                PersistencePolicy::Strict => Err(e.into()),
            },
        }
    }

    /// Log a fatal error and hand it back.
    async fn halt(&mut self, e: EngineError) -> EngineError {
        error!(run_id = %self.run_id, cause = e.cause(), error = %e, "Story run halted");
        self.transcript
            .record(format!("Run halted ({}): {e}", e.cause()));
        self.flush_transcript().await;
        e
    }

    async fn flush_transcript(&mut self) {
        if let Err(e) = self.transcript.flush().await {
            warn!(error = %e, "Failed to write transcript");
        }
    }

    fn set_phase(&mut self, phase: Phase) {
        if self.phase != phase {
            debug!(from = ?self.phase, to = ?phase, "Phase transition");
        }
        self.phase = phase;
    }
}

fn describe(verdict: &RoundVerdict) -> String {
    match verdict {
        RoundVerdict::Coherent => "coherent".to_string(),
        RoundVerdict::Discontinuous { previous, current } => {
            format!("section {current} does not follow section {previous}")
        }
        RoundVerdict::Unrepresented(names) => {
            format!("no decision names {}", names.join(", "))
        }
    }
}
