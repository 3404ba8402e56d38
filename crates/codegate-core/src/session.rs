//! Session-scoped state: accumulated progress and the attempt history.
//!
//! A [`Session`] is created explicitly by the caller and passed to whatever
//! needs it. The evaluator never touches it; recording an outcome is the
//! caller's job once the record is known.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::model::{HistoryEntry, ScoreRecord};
use crate::statistics::{aggregate, delta, AggregateStats, ScoreDelta};

/// Accumulated progress across challenges.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    #[serde(default)]
    pub total_xp: u64,
    #[serde(default)]
    pub completed_tasks: BTreeSet<String>,
}

/// Owned per-session state.
#[derive(Debug, Clone, Default)]
pub struct Session {
    progress: Progress,
    history: Vec<HistoryEntry>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a session from previously stored parts.
    pub fn from_parts(progress: Progress, history: Vec<HistoryEntry>) -> Self {
        Self { progress, history }
    }

    pub fn progress(&self) -> &Progress {
        &self.progress
    }

    /// All entries in the order they were recorded.
    pub fn history(&self) -> &[HistoryEntry] {
        &self.history
    }

    pub fn is_completed(&self, task_id: &str) -> bool {
        self.progress.completed_tasks.contains(task_id)
    }

    /// Append an outcome to the history.
    ///
    /// The first approved attempt of a task marks it completed and awards
    /// `xp_reward`. Returns the XP awarded by this call.
    pub fn record(
        &mut self,
        task_id: &str,
        record: ScoreRecord,
        code: Option<String>,
        xp_reward: u32,
    ) -> u32 {
        let approved = record.status().is_approved();
        self.history.push(HistoryEntry::new(task_id, record, code));

        if approved && self.progress.completed_tasks.insert(task_id.to_string()) {
            self.progress.total_xp += xp_reward as u64;
            tracing::info!(task = task_id, xp = xp_reward, "task completed");
            xp_reward
        } else {
            0
        }
    }

    /// Entries for one task, oldest first.
    pub fn task_history(&self, task_id: &str) -> Vec<HistoryEntry> {
        self.history
            .iter()
            .filter(|e| e.task_id == task_id)
            .cloned()
            .collect()
    }

    /// Score change between the last two attempts of a task.
    pub fn task_delta(&self, task_id: &str) -> ScoreDelta {
        delta(&self.task_history(task_id))
    }

    /// Statistics over the whole history.
    pub fn stats(&self) -> AggregateStats {
        aggregate(&self.history)
    }

    /// Clear history and progress.
    pub fn reset(&mut self) {
        self.history.clear();
        self.progress = Progress::default();
    }
}
