//! Persistence of progress and history.
//!
//! Stores are fallible; [`load_session`] never is. A store that cannot be
//! read yields an empty session and a warning.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::model::HistoryEntry;
use crate::session::{Progress, Session};

const PROGRESS_FILE: &str = "progress.json";
const HISTORY_FILE: &str = "history.json";

/// Read/write contract for session state.
pub trait ProgressStore: Send + Sync {
    fn load_progress(&self) -> Result<Progress>;
    fn save_progress(&self, progress: &Progress) -> Result<()>;
    fn load_history(&self) -> Result<Vec<HistoryEntry>>;
    fn save_history(&self, history: &[HistoryEntry]) -> Result<()>;
}

/// Load a session, degrading to defaults on any read failure.
pub fn load_session(store: &dyn ProgressStore) -> Session {
    let progress = store.load_progress().unwrap_or_else(|e| {
        tracing::warn!("could not load progress, starting fresh: {e:#}");
        Progress::default()
    });
    let history = store.load_history().unwrap_or_else(|e| {
        tracing::warn!("could not load history, starting fresh: {e:#}");
        Vec::new()
    });
    Session::from_parts(progress, history)
}

/// Persist both halves of a session.
pub fn save_session(store: &dyn ProgressStore, session: &Session) -> Result<()> {
    store.save_progress(session.progress())?;
    store.save_history(session.history())?;
    Ok(())
}

/// JSON files in a data directory.
///
/// Missing files read as empty state. A file that cannot be parsed is renamed
/// to `<name>.corrupt-<timestamp>` before the error is returned. Submitted
/// code is not written.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn read<T: DeserializeOwned + Default>(&self, name: &str) -> Result<T> {
        let path = self.dir.join(name);
        if !path.exists() {
            return Ok(T::default());
        }
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        serde_json::from_str(&content).map_err(|e| {
            let err = anyhow::Error::new(e).context(format!("failed to parse {}", path.display()));
            match quarantine(&path) {
                Ok(aside) => {
                    err.context(format!("moved unreadable file to {}", aside.display()))
                }
                Err(move_err) => {
                    err.context(format!("could not move unreadable file aside: {move_err:#}"))
                }
            }
        })
    }

    fn write<T: Serialize + ?Sized>(&self, name: &str, value: &T) -> Result<()> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("failed to create {}", self.dir.display()))?;
        let path = self.dir.join(name);
        let json = serde_json::to_string_pretty(value).context("failed to serialize state")?;
        // Replace atomically.
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, json)
            .with_context(|| format!("failed to write {}", tmp.display()))?;
        std::fs::rename(&tmp, &path)
            .with_context(|| format!("failed to replace {}", path.display()))?;
        Ok(())
    }
}

/// Move an unreadable state file out of the way so the next save cannot
/// overwrite it.
fn quarantine(path: &Path) -> Result<PathBuf> {
    let stamp = chrono::Utc::now().format("%Y%m%dT%H%M%S%.3f");
    let mut aside = path.as_os_str().to_owned();
    aside.push(format!(".corrupt-{stamp}"));
    let aside = PathBuf::from(aside);
    std::fs::rename(path, &aside)
        .with_context(|| format!("failed to rename {}", path.display()))?;
    tracing::warn!("unreadable state file kept at {}", aside.display());
    Ok(aside)
}

impl ProgressStore for JsonFileStore {
    fn load_progress(&self) -> Result<Progress> {
        self.read(PROGRESS_FILE)
    }

    fn save_progress(&self, progress: &Progress) -> Result<()> {
        self.write(PROGRESS_FILE, progress)
    }

    fn load_history(&self) -> Result<Vec<HistoryEntry>> {
        self.read(HISTORY_FILE)
    }

    fn save_history(&self, history: &[HistoryEntry]) -> Result<()> {
        self.write(HISTORY_FILE, history)
    }
}

/// In-memory store, mainly for tests and embedding.
#[derive(Debug, Default)]
pub struct MemoryStore {
    progress: Mutex<Progress>,
    history: Mutex<Vec<HistoryEntry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProgressStore for MemoryStore {
    fn load_progress(&self) -> Result<Progress> {
        let guard = self
            .progress
            .lock()
            .map_err(|_| anyhow::anyhow!("progress lock poisoned"))?;
        Ok(guard.clone())
    }

    fn save_progress(&self, progress: &Progress) -> Result<()> {
        let mut guard = self
            .progress
            .lock()
            .map_err(|_| anyhow::anyhow!("progress lock poisoned"))?;
        *guard = progress.clone();
        Ok(())
    }

    fn load_history(&self) -> Result<Vec<HistoryEntry>> {
        let guard = self
            .history
            .lock()
            .map_err(|_| anyhow::anyhow!("history lock poisoned"))?;
        Ok(guard.clone())
    }

    fn save_history(&self, history: &[HistoryEntry]) -> Result<()> {
        let mut guard = self
            .history
            .lock()
            .map_err(|_| anyhow::anyhow!("history lock poisoned"))?;
        *guard = history.to_vec();
        Ok(())
    }
}
