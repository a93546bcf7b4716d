//! Snapshot persistence for resuming a run.
//!
//! A snapshot is written to a temporary sibling file and renamed over the
//! target, so a crash mid-write leaves the previous snapshot intact.

use crate::world::{CharacterProfile, LoadError, StoryContext, StoryEvent};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

/// Errors from persistence operations.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid snapshot: {0}")]
    Invalid(#[from] LoadError),

    #[error("Snapshot lists {0} in the cast but has no profile for them")]
    MissingCharacter(String),

    #[error("Version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u32, found: u32 },
}

/// Current snapshot file version.
const SNAPSHOT_VERSION: u32 = 1;

/// Everything needed to resume a run from its last committed round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Format version for compatibility checking.
    pub version: u32,

    /// The run this snapshot belongs to.
    pub run_id: Uuid,

    /// When the snapshot was taken (seconds since the Unix epoch).
    pub saved_at: String,

    pub title: String,

    pub current_event_index: usize,

    pub summary: String,

    /// Turn order.
    pub cast: Vec<String>,

    pub characters: HashMap<String, CharacterProfile>,

    pub events: Vec<StoryEvent>,

    /// Decisions from the last committed round.
    #[serde(default)]
    pub decisions: HashMap<String, String>,
}

impl Snapshot {
    /// Capture the full state of `ctx`.
    pub fn capture(run_id: Uuid, ctx: &StoryContext) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            run_id,
            saved_at: timestamp(),
            title: ctx.title.clone(),
            current_event_index: ctx.current_event_index(),
            summary: ctx.summary.clone(),
            cast: ctx.cast().to_vec(),
            characters: ctx
                .characters()
                .map(|c| (c.name.clone(), c.clone()))
                .collect(),
            events: ctx.events().to_vec(),
            decisions: ctx.last_decisions().clone(),
        }
    }

    /// Rebuild the context this snapshot was taken from.
    pub fn into_context(self) -> Result<StoryContext, PersistError> {
        let mut characters = self.characters;
        let mut ordered = Vec::with_capacity(characters.len());
        for name in &self.cast {
            let profile = characters
                .remove(name)
                .ok_or_else(|| PersistError::MissingCharacter(name.clone()))?;
            ordered.push(profile);
        }
        // Profiles outside the recorded cast join at the end, by name.
        let mut extras: Vec<_> = characters.into_values().collect();
        extras.sort_by(|a, b| a.name.cmp(&b.name));
        ordered.extend(extras);

        let mut ctx = StoryContext::new(self.title, ordered, self.events)?
            .with_cursor(self.current_event_index)?;
        ctx.summary = self.summary;
        ctx.set_decisions(self.decisions);
        Ok(ctx)
    }

    /// Write to `path` atomically.
    pub async fn save_json(&self, path: impl AsRef<Path>) -> Result<(), PersistError> {
        let path = path.as_ref();
        let content = serde_json::to_string_pretty(self)?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }

        let temp = temp_path(path);
        let mut file = fs::File::create(&temp).await?;
        file.write_all(content.as_bytes()).await?;
        file.sync_all().await?;
        drop(file);

        if let Err(e) = fs::rename(&temp, path).await {
            let _ = fs::remove_file(&temp).await;
            return Err(e.into());
        }
        Ok(())
    }

    /// Load from a JSON file.
    pub async fn load_json(path: impl AsRef<Path>) -> Result<Self, PersistError> {
        let content = fs::read_to_string(path).await?;
        let snapshot: Self = serde_json::from_str(&content)?;

        if snapshot.version != SNAPSHOT_VERSION {
            return Err(PersistError::VersionMismatch {
                expected: SNAPSHOT_VERSION,
                found: snapshot.version,
            });
        }

        Ok(snapshot)
    }
}

/// Load a snapshot and rebuild its context in one step.
pub async fn resume(path: impl AsRef<Path>) -> Result<(Uuid, StoryContext), PersistError> {
    let snapshot = Snapshot::load_json(path).await?;
    let run_id = snapshot.run_id;
    Ok((run_id, snapshot.into_context()?))
}

/// Default snapshot file name for a story title.
pub fn snapshot_path(base_dir: impl AsRef<Path>, title: &str) -> PathBuf {
    let sanitized = title
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '_' })
        .collect::<String>();
    base_dir.as_ref().join(format!("{sanitized}_state.json"))
}

fn temp_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "snapshot".to_string());
    path.with_file_name(format!(".{name}.tmp"))
}

/// Seconds since the Unix epoch.
fn timestamp() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};

    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    format!("{}", now.as_secs())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::sample_context;
    use tempfile::TempDir;

    #[test]
    fn test_snapshot_path() {
        let path = snapshot_path("/saves", "Rent-A-Girlfriend");
        assert!(path
            .to_string_lossy()
            .ends_with("Rent_A_Girlfriend_state.json"));
    }

    #[test]
    fn test_temp_path_is_sibling() {
        let temp = temp_path(Path::new("/saves/story.json"));
        assert_eq!(temp, PathBuf::from("/saves/.story.json.tmp"));
    }

    #[test]
    fn test_capture_and_rebuild() {
        let mut ctx = sample_context().with_cursor(2).unwrap();
        ctx.summary = "Kazuya rented Chizuru.".to_string();
        ctx.character_mut("Mami").unwrap().adjust_affinity("Kazuya", 3);

        let rebuilt = Snapshot::capture(Uuid::new_v4(), &ctx).into_context().unwrap();
        assert_eq!(rebuilt, ctx);
    }

    #[test]
    fn test_missing_profile_rejected() {
        let mut snapshot = Snapshot::capture(Uuid::new_v4(), &sample_context());
        snapshot.characters.remove("Mami");
        assert!(matches!(
            snapshot.into_context(),
            Err(PersistError::MissingCharacter(name)) if name == "Mami"
        ));
    }

    #[tokio::test]
    async fn test_save_and_load_round_trip() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let path = temp_dir.path().join("nested").join("story.json");

        let ctx = sample_context().with_cursor(1).unwrap();
        let run_id = Uuid::new_v4();
        Snapshot::capture(run_id, &ctx)
            .save_json(&path)
            .await
            .expect("Save should succeed");

        assert!(path.exists());
        assert!(!temp_path(&path).exists());

        let (loaded_id, loaded) = resume(&path).await.expect("Load should succeed");
        assert_eq!(loaded_id, run_id);
        assert_eq!(loaded.current_event_index(), 1);
        assert_eq!(loaded.cast(), ctx.cast());
        assert_eq!(loaded.events(), ctx.events());
        assert_eq!(
            loaded.character("Kazuya").unwrap(),
            ctx.character("Kazuya").unwrap()
        );
    }

    #[tokio::test]
    async fn test_version_mismatch() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let path = temp_dir.path().join("old.json");

        let mut snapshot = Snapshot::capture(Uuid::new_v4(), &sample_context());
        snapshot.version = 99;
        snapshot.save_json(&path).await.unwrap();

        assert!(matches!(
            Snapshot::load_json(&path).await,
            Err(PersistError::VersionMismatch {
                expected: 1,
                found: 99
            })
        ));
    }
}
