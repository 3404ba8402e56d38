//! The `codegate review` command.

use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::Serialize;

use codegate_core::catalog::{load_catalogs, Challenge};
use codegate_core::decision::{rejection_reason, RejectionReason};
use codegate_core::engine::{Evaluation, Evaluator, FallbackCause};
use codegate_core::model::{Category, ScoreRecord};
use codegate_core::statistics::ScoreDelta;
use codegate_core::store::{load_session, save_session};

use crate::OutputFormat;

pub struct ReviewArgs {
    pub catalog: PathBuf,
    pub task: String,
    pub file: PathBuf,
    pub provider: Option<String>,
    pub model: Option<String>,
    pub data_dir: Option<PathBuf>,
    pub format: OutputFormat,
    pub config: Option<PathBuf>,
}

#[derive(Serialize)]
struct ReviewOutput<'a> {
    task_id: &'a str,
    record: &'a ScoreRecord,
    #[serde(skip_serializing_if = "Option::is_none")]
    rejection_reason: Option<RejectionReason>,
    #[serde(skip_serializing_if = "Option::is_none")]
    fallback: Option<&'static str>,
    delta: ScoreDelta,
    xp_awarded: u32,
    latency_ms: u64,
}

pub async fn execute(args: ReviewArgs) -> Result<()> {
    let (config, store) = super::open_store(args.config.as_deref(), args.data_dir)?;

    let challenge = find_challenge(&args.catalog, &args.task)?;
    let code = std::fs::read_to_string(&args.file)
        .with_context(|| format!("failed to read submission: {}", args.file.display()))?;

    let provider = config.provider(args.provider.as_deref())?;
    let evaluator = Evaluator::new(provider, config.to_evaluator_config(args.model.as_deref()));

    let request = challenge.request(code);
    let evaluation = evaluator.evaluate_detailed(&request).await?;

    let mut session = load_session(&store);
    let xp_awarded = session.record(
        &challenge.id,
        evaluation.record.clone(),
        Some(request.code),
        challenge.xp,
    );
    if let Err(e) = save_session(&store, &session) {
        tracing::warn!("progress was not saved: {e:#}");
    }

    let output = ReviewOutput {
        task_id: &challenge.id,
        record: &evaluation.record,
        rejection_reason: evaluation
            .fallback
            .is_none()
            .then(|| rejection_reason(&evaluation.record, challenge.kind))
            .flatten(),
        fallback: evaluation.fallback.as_ref().map(fallback_label),
        delta: session.task_delta(&challenge.id),
        xp_awarded,
        latency_ms: evaluation.latency_ms,
    };

    match args.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&output)?),
        OutputFormat::Text => print_text(&challenge, &evaluation, &output),
    }

    Ok(())
}

/// Coarse label shown to the submitter. Validation details stay in the logs.
fn fallback_label(cause: &FallbackCause) -> &'static str {
    match cause {
        FallbackCause::Timeout => "timeout",
        FallbackCause::CollaboratorFault(_) => "unavailable",
        FallbackCause::Validation(_) => "unreadable",
    }
}

fn find_challenge(catalog: &std::path::Path, task: &str) -> Result<Challenge> {
    let catalogs = load_catalogs(catalog)?;
    catalogs
        .iter()
        .find_map(|c| c.find(task))
        .cloned()
        .with_context(|| format!("challenge '{task}' not found in {}", catalog.display()))
}

fn print_text(challenge: &Challenge, evaluation: &Evaluation, output: &ReviewOutput<'_>) {
    let record = &evaluation.record;

    println!("{} [{}]", challenge.title, challenge.id);
    println!(
        "Verdict: {}  ({}/{})",
        record.status(),
        record.total_score(),
        codegate_core::model::MAX_TOTAL_SCORE
    );

    if evaluation.fallback.is_none() {
        for category in Category::ALL {
            println!("  {:<28} {:>2}/10", category.label(), record.score(category));
        }
    }

    println!();
    println!("{}", record.feedback_summary());

    if let Some(reason) = &output.rejection_reason {
        println!("Not approved: {reason}");
    }

    if !record.line_comments().is_empty() {
        println!("\nLine comments:");
        for comment in record.line_comments() {
            println!(
                "  L{} [{}] {}",
                comment.line_number, comment.severity, comment.comment
            );
        }
    }

    for suggestion in record.diff_suggestions() {
        println!("\nSuggestion: {}", suggestion.explanation);
        for line in suggestion.original.lines() {
            println!("  - {line}");
        }
        for line in suggestion.suggested.lines() {
            println!("  + {line}");
        }
    }

    match output.delta {
        ScoreDelta::Change(points) => println!("\nChange since last attempt: {points:+}"),
        ScoreDelta::NoPriorAttempt => println!("\nFirst attempt at this challenge."),
    }
    if output.xp_awarded > 0 {
        println!("Challenge completed! +{} XP", output.xp_awarded);
    }
}
