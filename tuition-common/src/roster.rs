//! Roster file
//!
//! The roster is a flat newline-delimited list of student names. It is read
//! fresh on every request; writes go to a temp file that is renamed into
//! place so a reader never sees a half-written roster.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::Result;

/// Split submitted roster text into names
///
/// Lines are trimmed, blank lines dropped, and duplicates removed keeping
/// the first occurrence.
pub fn parse_roster_text(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter(|line| seen.insert(*line))
        .map(str::to_owned)
        .collect()
}

/// Render names back to newline-delimited text
pub fn render_roster_text(names: &[String]) -> String {
    names.join("\n")
}

/// Handle to the roster file on disk
#[derive(Debug, Clone)]
pub struct RosterFile {
    path: PathBuf,
    write_lock: Arc<Mutex<()>>,
}

impl RosterFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current roster; a missing file is an empty roster
    pub async fn load(&self) -> Result<Vec<String>> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(text) => Ok(parse_roster_text(&text)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("Roster file {} not found, using empty roster", self.path.display());
                Ok(Vec::new())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Replace the roster
    pub async fn save(&self, names: &[String]) -> Result<()> {
        let _guard = self.write_lock.lock().await;

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let tmp = self.path.with_extension("txt.tmp");
        let mut text = render_roster_text(names);
        if !text.is_empty() {
            text.push('\n');
        }
        tokio::fs::write(&tmp, text).await?;
        tokio::fs::rename(&tmp, &self.path).await?;

        info!(students = names.len(), "Roster saved to {}", self.path.display());
        Ok(())
    }

    /// Create an empty roster file if none exists
    pub async fn ensure_exists(&self) -> Result<()> {
        if !tokio::fs::try_exists(&self.path).await? {
            self.save(&[]).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_roster_text_normalizes() {
        let names = parse_roster_text("  Avi \n\nBen\r\nAvi\n   \nDana");
        assert_eq!(names, vec!["Avi", "Ben", "Dana"]);
    }

    #[tokio::test]
    async fn test_missing_file_is_empty_roster() {
        let dir = TempDir::new().unwrap();
        let roster = RosterFile::new(dir.path().join("roster.txt"));
        assert!(roster.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let dir = TempDir::new().unwrap();
        let roster = RosterFile::new(dir.path().join("roster.txt"));

        let names = vec!["Ben".to_string(), "Avi".to_string()];
        roster.save(&names).await.unwrap();

        assert_eq!(roster.load().await.unwrap(), names);
        let raw = std::fs::read_to_string(roster.path()).unwrap();
        assert_eq!(raw, "Ben\nAvi\n");
        assert!(!dir.path().join("roster.txt.tmp").exists());
    }

    #[tokio::test]
    async fn test_ensure_exists_keeps_existing_roster() {
        let dir = TempDir::new().unwrap();
        let roster = RosterFile::new(dir.path().join("roster.txt"));

        roster.ensure_exists().await.unwrap();
        assert!(roster.path().exists());

        roster.save(&["Avi".to_string()]).await.unwrap();
        roster.ensure_exists().await.unwrap();
        assert_eq!(roster.load().await.unwrap(), vec!["Avi"]);
    }
}
