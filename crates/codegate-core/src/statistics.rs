//! Trend statistics over the evaluation history.
//!
//! Everything here is recomputed from the full history on every call. There
//! is no running state to invalidate when the history is cleared.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{Category, HistoryEntry, Verdict, MAX_TOTAL_SCORE};

/// One attempt in the progression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptPoint {
    /// 1-based attempt index in stored order.
    pub attempt: usize,
    pub task_id: String,
    pub created_at: DateTime<Utc>,
    pub total_score: u8,
    pub status: Verdict,
}

/// Average score of one category.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CategoryAverage {
    pub category: Category,
    pub average: f64,
}

/// Change between a task's two most recent attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "points", rename_all = "snake_case")]
pub enum ScoreDelta {
    NoPriorAttempt,
    Change(i32),
}

/// Per-task summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskStats {
    pub task_id: String,
    pub attempts: usize,
    pub approved: usize,
    pub best_score: u8,
    pub latest_score: u8,
    pub delta: ScoreDelta,
}

/// Aggregate statistics over a history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateStats {
    pub progression: Vec<AttemptPoint>,
    /// One entry per category, in [`Category::ALL`] order.
    pub averages: Vec<CategoryAverage>,
    pub strongest: Category,
    pub weakest: Category,
    /// Trend of total scores across the whole history, in percentage points
    /// of the maximum total.
    pub improvement_rate: f64,
    pub total_attempts: usize,
    pub approved_count: usize,
    /// Approved attempts divided by all attempts.
    pub success_rate: f64,
    pub per_task: BTreeMap<String, TaskStats>,
}

impl AggregateStats {
    /// Average for one category.
    pub fn average(&self, category: Category) -> f64 {
        self.averages
            .iter()
            .find(|a| a.category == category)
            .map(|a| a.average)
            .unwrap_or(0.0)
    }
}

/// Compute aggregate statistics from a history in stored order.
pub fn aggregate(entries: &[HistoryEntry]) -> AggregateStats {
    let total_attempts = entries.len();

    let progression = entries
        .iter()
        .enumerate()
        .map(|(i, e)| AttemptPoint {
            attempt: i + 1,
            task_id: e.task_id.clone(),
            created_at: e.created_at,
            total_score: e.record.total_score(),
            status: e.record.status(),
        })
        .collect();

    let mut sums = [0u64; 6];
    for entry in entries {
        for (sum, score) in sums.iter_mut().zip(entry.record.rubric().scores()) {
            *sum += score as u64;
        }
    }
    let means: [f64; 6] = sums.map(|sum| mean_of(sum, total_attempts));
    let (strongest, weakest) = strongest_and_weakest(&means);

    let averages = Category::ALL
        .into_iter()
        .zip(means)
        .map(|(category, average)| CategoryAverage { category, average })
        .collect();

    let approved_count = entries
        .iter()
        .filter(|e| e.record.status().is_approved())
        .count();
    let success_rate = if total_attempts == 0 {
        0.0
    } else {
        approved_count as f64 / total_attempts as f64
    };

    let totals: Vec<u8> = entries.iter().map(|e| e.record.total_score()).collect();

    AggregateStats {
        progression,
        averages,
        strongest,
        weakest,
        improvement_rate: improvement_rate(&totals),
        total_attempts,
        approved_count,
        success_rate,
        per_task: per_task_stats(entries),
    }
}

/// Difference between the latest and the previous attempt of one task.
///
/// `task_history` must hold a single task's entries in stored order.
pub fn delta(task_history: &[HistoryEntry]) -> ScoreDelta {
    let totals: Vec<u8> = task_history.iter().map(|e| e.record.total_score()).collect();
    delta_of(&totals)
}

fn delta_of(totals: &[u8]) -> ScoreDelta {
    match totals {
        [.., previous, latest] => ScoreDelta::Change(*latest as i32 - *previous as i32),
        _ => ScoreDelta::NoPriorAttempt,
    }
}

/// Trend across a sequence of totals.
///
/// The history is split in half; the result is the mean of the recent half
/// minus the mean of the earlier half, expressed as a percentage of the
/// maximum total. Fewer than two attempts give `0.0`.
pub fn improvement_rate(totals: &[u8]) -> f64 {
    if totals.len() < 2 {
        return 0.0;
    }
    let (earlier, recent) = totals.split_at(totals.len() / 2);
    let mean = |xs: &[u8]| mean_of(xs.iter().map(|&x| x as u64).sum(), xs.len());
    (mean(recent) - mean(earlier)) / MAX_TOTAL_SCORE as f64 * 100.0
}

/// Highest and lowest category in one pass; earlier categories win ties.
fn strongest_and_weakest(means: &[f64; 6]) -> (Category, Category) {
    let mut strongest = 0;
    let mut weakest = 0;
    for (i, &mean) in means.iter().enumerate().skip(1) {
        if mean > means[strongest] {
            strongest = i;
        }
        if mean < means[weakest] {
            weakest = i;
        }
    }
    (Category::ALL[strongest], Category::ALL[weakest])
}

fn per_task_stats(entries: &[HistoryEntry]) -> BTreeMap<String, TaskStats> {
    let mut grouped: BTreeMap<&str, Vec<&HistoryEntry>> = BTreeMap::new();
    for entry in entries {
        grouped.entry(entry.task_id.as_str()).or_default().push(entry);
    }

    grouped
        .into_iter()
        .map(|(task_id, group)| {
            let totals: Vec<u8> = group.iter().map(|e| e.record.total_score()).collect();
            let stats = TaskStats {
                task_id: task_id.to_string(),
                attempts: group.len(),
                approved: group
                    .iter()
                    .filter(|e| e.record.status().is_approved())
                    .count(),
                best_score: totals.iter().copied().max().unwrap_or(0),
                latest_score: totals.last().copied().unwrap_or(0),
                delta: delta_of(&totals),
            };
            (task_id.to_string(), stats)
        })
        .collect()
}

fn mean_of(sum: u64, count: usize) -> f64 {
    if count == 0 {
        0.0
    } else {
        sum as f64 / count as f64
    }
}
