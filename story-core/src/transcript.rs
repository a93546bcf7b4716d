//! Conversation transcript of a run.
//!
//! Entries are kept in memory and, when a file is configured, appended to it
//! on each flush.

use crate::world::CharacterProfile;
use std::path::{Path, PathBuf};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;

#[derive(Debug, Default)]
pub struct Transcript {
    entries: Vec<String>,
    path: Option<PathBuf>,
    flushed: usize,
}

impl Transcript {
    /// Keep entries in memory only.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Also append entries to `path`.
    pub fn to_file(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            ..Self::default()
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn record(&mut self, entry: impl Into<String>) {
        self.entries.push(entry.into());
    }

    /// Record a character's profile block.
    pub fn record_profile(&mut self, character: &CharacterProfile) {
        let relationships = serde_json::to_string_pretty(&character.relationships)
            .unwrap_or_else(|_| "{}".to_string());
        self.record(format!(
            "Character Profile - {}:\n  Age: {}\n  Occupation: {}\n  Personality: {}\n  Relationships: {}",
            character.name,
            character.age,
            character.occupation,
            character.personality.join(", "),
            relationships
        ));
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    /// Append entries recorded since the last flush to the file, if any.
    pub async fn flush(&mut self) -> std::io::Result<()> {
        let Some(path) = &self.path else {
            self.flushed = self.entries.len();
            return Ok(());
        };
        if self.flushed == self.entries.len() {
            return Ok(());
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await?;
        for entry in &self.entries[self.flushed..] {
            file.write_all(entry.as_bytes()).await?;
            file.write_all(b"\n\n").await?;
        }
        file.flush().await?;
        self.flushed = self.entries.len();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_profile_entry() {
        let mut transcript = Transcript::in_memory();
        let kazuya = CharacterProfile::new("Kazuya", 20, "College student")
            .with_personality(["kind", "indecisive"]);
        transcript.record_profile(&kazuya);

        let entry = &transcript.entries()[0];
        assert!(entry.starts_with("Character Profile - Kazuya:"));
        assert!(entry.contains("Personality: kind, indecisive"));
    }

    #[tokio::test]
    async fn test_flush_appends_only_new_entries() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let path = temp_dir.path().join("conversation_log.txt");
        let mut transcript = Transcript::to_file(&path);

        transcript.record("first");
        transcript.flush().await.unwrap();
        transcript.record("second");
        transcript.flush().await.unwrap();
        transcript.flush().await.unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "first\n\nsecond\n\n");
    }
}
