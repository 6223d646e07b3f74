use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::datetime::DateMarker;

const SESSION_FILE: &str = "session.json";
const HISTORY_LIMIT: usize = 50;

/// A view and date the calendar was showing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionEntry {
    pub view_type: String,
    pub date: DateMarker,
}

/// What the CLI remembers between runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    #[serde(default)]
    pub current: Option<SessionEntry>,
    #[serde(default)]
    pub history: Vec<SessionEntry>,
}

impl Session {
    /// Moves to `next`, remembering the previous position. No-op when
    /// nothing changed.
    pub fn advance(&mut self, next: SessionEntry) {
        if self.current.as_ref() == Some(&next) {
            return;
        }
        if let Some(previous) = self.current.replace(next) {
            self.history.push(previous);
            if self.history.len() > HISTORY_LIMIT {
                let excess = self.history.len() - HISTORY_LIMIT;
                self.history.drain(..excess);
            }
        }
    }

    /// Steps back to the most recent previous position.
    pub fn back(&mut self) -> Option<&SessionEntry> {
        let previous = self.history.pop()?;
        self.current = Some(previous);
        self.current.as_ref()
    }
}

#[derive(Debug)]
pub struct DataStore {
    pub data_dir: PathBuf,
    pub session_path: PathBuf,
}

impl DataStore {
    #[tracing::instrument(skip(data_dir))]
    pub fn open(data_dir: &Path) -> anyhow::Result<Self> {
        let data_dir = data_dir.to_path_buf();
        fs::create_dir_all(&data_dir)
            .with_context(|| format!("failed to create {}", data_dir.display()))?;

        let session_path = data_dir.join(SESSION_FILE);

        info!(
            data_dir = %data_dir.display(),
            session = %session_path.display(),
            "opened datastore"
        );

        Ok(Self {
            data_dir,
            session_path,
        })
    }

    #[tracing::instrument(skip(self))]
    pub fn load_session(&self) -> anyhow::Result<Session> {
        if !self.session_path.exists() {
            debug!("no saved session");
            return Ok(Session::default());
        }

        let raw = fs::read_to_string(&self.session_path)
            .with_context(|| format!("failed reading {}", self.session_path.display()))?;
        if raw.trim().is_empty() {
            return Ok(Session::default());
        }

        let session: Session = serde_json::from_str(&raw)
            .with_context(|| format!("failed parsing {}", self.session_path.display()))?;
        debug!(history = session.history.len(), "loaded session");
        Ok(session)
    }

    #[tracing::instrument(skip(self, session))]
    pub fn save_session(&self, session: &Session) -> anyhow::Result<()> {
        save_json_atomic(&self.session_path, session).context("failed to save session.json")
    }
}

#[tracing::instrument(skip(path, value))]
fn save_json_atomic<T: Serialize>(path: &Path, value: &T) -> anyhow::Result<()> {
    debug!(file = %path.display(), "saving json atomically");

    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut temp = NamedTempFile::new_in(dir)?;
    serde_json::to_writer_pretty(&mut temp, value)?;
    writeln!(temp)?;
    temp.flush()?;

    temp.persist(path)
        .map_err(|err| anyhow!("failed to persist {}: {}", path.display(), err))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datetime::ymd;

    fn entry(view: &str, day: u32) -> SessionEntry {
        SessionEntry {
            view_type: view.to_string(),
            date: ymd(2024, 6, day).expect("valid date"),
        }
    }

    #[test]
    fn advance_and_back() {
        let mut session = Session::default();
        session.advance(entry("dayGridMonth", 1));
        session.advance(entry("dayGridMonth", 1));
        session.advance(entry("timeGridWeek", 9));
        assert_eq!(session.history.len(), 1);

        assert_eq!(session.back(), Some(&entry("dayGridMonth", 1)));
        assert!(session.history.is_empty());
        assert_eq!(session.back(), None);
    }

    #[test]
    fn history_is_bounded() {
        let mut session = Session::default();
        for i in 0..(HISTORY_LIMIT + 10) {
            session.advance(SessionEntry {
                view_type: format!("view{i}"),
                date: ymd(2024, 1, 1).expect("valid date"),
            });
        }
        assert_eq!(session.history.len(), HISTORY_LIMIT);
        assert_eq!(session.history[0].view_type, "view9");
    }
}
