//! The `codegate stats` command.

use std::path::PathBuf;

use anyhow::Result;
use comfy_table::{Cell, Table};
use serde::Serialize;

use codegate_core::model::Category;
use codegate_core::session::Progress;
use codegate_core::statistics::{aggregate, AggregateStats, ScoreDelta};
use codegate_core::store::load_session;

use crate::OutputFormat;

#[derive(Serialize)]
struct StatsOutput<'a> {
    progress: &'a Progress,
    stats: &'a AggregateStats,
}

pub fn execute(
    task: Option<String>,
    data_dir: Option<PathBuf>,
    format: OutputFormat,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let (_, store) = super::open_store(config_path.as_deref(), data_dir)?;
    let session = load_session(&store);

    let stats = match &task {
        Some(id) => aggregate(&session.task_history(id)),
        None => session.stats(),
    };

    if format == OutputFormat::Json {
        let output = StatsOutput {
            progress: session.progress(),
            stats: &stats,
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    if stats.total_attempts == 0 {
        match &task {
            Some(id) => println!("No attempts recorded for '{id}'."),
            None => println!("No attempts recorded yet."),
        }
        return Ok(());
    }

    println!(
        "Attempts: {}  Approved: {} ({:.0}%)  XP: {}  Completed: {}",
        stats.total_attempts,
        stats.approved_count,
        stats.success_rate * 100.0,
        session.progress().total_xp,
        session.progress().completed_tasks.len(),
    );
    println!("Improvement rate: {:+.1}", stats.improvement_rate);
    println!(
        "Strongest: {}  Weakest: {}",
        stats.strongest.label(),
        stats.weakest.label()
    );

    let mut averages = Table::new();
    averages.set_header(vec!["Category", "Average"]);
    for category in Category::ALL {
        averages.add_row(vec![
            Cell::new(category.label()),
            Cell::new(format!("{:.1}", stats.average(category))),
        ]);
    }
    println!("\n{averages}");

    let mut tasks = Table::new();
    tasks.set_header(vec!["Challenge", "Attempts", "Approved", "Best", "Latest", "Change"]);
    for task_stats in stats.per_task.values() {
        let change = match task_stats.delta {
            ScoreDelta::Change(points) => format!("{points:+}"),
            ScoreDelta::NoPriorAttempt => "-".to_string(),
        };
        tasks.add_row(vec![
            Cell::new(&task_stats.task_id),
            Cell::new(task_stats.attempts),
            Cell::new(task_stats.approved),
            Cell::new(task_stats.best_score),
            Cell::new(task_stats.latest_score),
            Cell::new(change),
        ]);
    }
    println!("\n{tasks}");

    let mut progression = Table::new();
    progression.set_header(vec!["#", "When", "Challenge", "Score", "Verdict"]);
    for point in &stats.progression {
        progression.add_row(vec![
            Cell::new(point.attempt),
            Cell::new(point.created_at.format("%Y-%m-%d %H:%M")),
            Cell::new(&point.task_id),
            Cell::new(point.total_score),
            Cell::new(point.status),
        ]);
    }
    println!("\n{progression}");

    Ok(())
}
