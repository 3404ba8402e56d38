//! Core data model types for codegate.
//!
//! These are the fundamental types the whole system passes around: the
//! validated [`ScoreRecord`], the transient [`EvaluationRequest`], and the
//! append-only [`HistoryEntry`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::ValidationFailure;

/// Highest score a single rubric category can receive.
pub const MAX_CATEGORY_SCORE: u8 = 10;

/// Highest possible total score (six categories at ten points each).
pub const MAX_TOTAL_SCORE: u8 = 60;

/// One of the six rubric categories.
///
/// Variant order is the tie-break order used wherever categories are ranked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    FunctionalCorrectness,
    CodeReadability,
    StructureModularity,
    PerformanceEfficiency,
    SecurityPractices,
    ErrorHandling,
}

impl Category {
    /// All categories in tie-break order.
    pub const ALL: [Category; 6] = [
        Category::FunctionalCorrectness,
        Category::CodeReadability,
        Category::StructureModularity,
        Category::PerformanceEfficiency,
        Category::SecurityPractices,
        Category::ErrorHandling,
    ];

    /// Field name used for this category in the wire format.
    pub fn key(self) -> &'static str {
        match self {
            Category::FunctionalCorrectness => "functional_correctness",
            Category::CodeReadability => "code_readability",
            Category::StructureModularity => "structure_modularity",
            Category::PerformanceEfficiency => "performance_efficiency",
            Category::SecurityPractices => "security_practices",
            Category::ErrorHandling => "error_handling",
        }
    }

    /// Human-readable label.
    pub fn label(self) -> &'static str {
        match self {
            Category::FunctionalCorrectness => "Functional correctness",
            Category::CodeReadability => "Readability",
            Category::StructureModularity => "Structure & modularity",
            Category::PerformanceEfficiency => "Performance",
            Category::SecurityPractices => "Security",
            Category::ErrorHandling => "Error handling",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|c| c.key() == s.to_lowercase())
            .ok_or_else(|| format!("unknown category: {s}"))
    }
}

/// Per-category scores, each expected in `0..=10`.
///
/// A `Rubric` on its own is unchecked data; range checks happen when it is
/// wrapped in a [`ScoreRecord`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rubric {
    pub functional_correctness: u8,
    pub code_readability: u8,
    pub structure_modularity: u8,
    pub performance_efficiency: u8,
    pub security_practices: u8,
    pub error_handling: u8,
}

impl Rubric {
    /// Build a rubric from scores listed in [`Category::ALL`] order.
    pub fn from_scores(scores: [u8; 6]) -> Self {
        Self {
            functional_correctness: scores[0],
            code_readability: scores[1],
            structure_modularity: scores[2],
            performance_efficiency: scores[3],
            security_practices: scores[4],
            error_handling: scores[5],
        }
    }

    /// Scores in [`Category::ALL`] order.
    pub fn scores(&self) -> [u8; 6] {
        [
            self.functional_correctness,
            self.code_readability,
            self.structure_modularity,
            self.performance_efficiency,
            self.security_practices,
            self.error_handling,
        ]
    }

    pub fn get(&self, category: Category) -> u8 {
        self.scores()[category.index()]
    }

    /// Sum of all six categories.
    pub fn total(&self) -> u8 {
        self.scores()
            .iter()
            .fold(0u8, |acc, &score| acc.saturating_add(score))
    }

    fn check_range(&self) -> Result<(), ValidationFailure> {
        for category in Category::ALL {
            let score = self.get(category);
            if score > MAX_CATEGORY_SCORE {
                return Err(ValidationFailure::OutOfRangeScore {
                    category,
                    found: score.to_string(),
                });
            }
        }
        Ok(())
    }
}

/// Admission verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verdict {
    Approved,
    Rejected,
}

impl Verdict {
    pub fn is_approved(self) -> bool {
        matches!(self, Verdict::Approved)
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Approved => write!(f, "APPROVED"),
            Verdict::Rejected => write!(f, "REJECTED"),
        }
    }
}

impl FromStr for Verdict {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "APPROVED" => Ok(Verdict::Approved),
            "REJECTED" => Ok(Verdict::Rejected),
            other => Err(format!("unknown verdict: {other}")),
        }
    }
}

/// Severity of a line-level remark.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
            Severity::Info => write!(f, "info"),
        }
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "error" => Ok(Severity::Error),
            "warning" => Ok(Severity::Warning),
            "info" => Ok(Severity::Info),
            other => Err(format!("unknown severity: {other}")),
        }
    }
}

/// A remark attached to one line of the submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineComment {
    /// 1-based line number.
    pub line_number: u32,
    pub comment: String,
    pub severity: Severity,
}

/// A proposed edit to the submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffSuggestion {
    pub original: String,
    pub suggested: String,
    pub explanation: String,
}

/// The validated outcome of one evaluation.
///
/// Fields are private so the record can only exist in a checked state: every
/// category is within range and `total_score` is the sum of the rubric.
/// Deserialization goes through the response validator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "serde_json::Value")]
pub struct ScoreRecord {
    total_score: u8,
    rubric: Rubric,
    status: Verdict,
    feedback_summary: String,
    line_comments: Vec<LineComment>,
    diff_suggestions: Vec<DiffSuggestion>,
}

impl ScoreRecord {
    /// Build a record, deriving the total from the rubric.
    pub fn new(
        rubric: Rubric,
        status: Verdict,
        feedback_summary: impl Into<String>,
        line_comments: Vec<LineComment>,
        diff_suggestions: Vec<DiffSuggestion>,
    ) -> Result<Self, ValidationFailure> {
        rubric.check_range()?;
        if let Some(index) = line_comments.iter().position(|c| c.line_number == 0) {
            return Err(ValidationFailure::MalformedPayload(format!(
                "line_comments[{index}]: line_number must be at least 1"
            )));
        }
        Ok(Self {
            total_score: rubric.total(),
            rubric,
            status,
            feedback_summary: feedback_summary.into(),
            line_comments,
            diff_suggestions,
        })
    }

    /// All-zero rejected record used whenever no trustworthy assessment exists.
    pub fn fallback(feedback_summary: impl Into<String>) -> Self {
        Self {
            total_score: 0,
            rubric: Rubric::default(),
            status: Verdict::Rejected,
            feedback_summary: feedback_summary.into(),
            line_comments: Vec::new(),
            diff_suggestions: Vec::new(),
        }
    }

    /// Return a copy of this record carrying `status` instead.
    pub fn with_verdict(self, status: Verdict) -> Self {
        Self { status, ..self }
    }

    pub fn total_score(&self) -> u8 {
        self.total_score
    }

    pub fn rubric(&self) -> &Rubric {
        &self.rubric
    }

    pub fn score(&self, category: Category) -> u8 {
        self.rubric.get(category)
    }

    pub fn status(&self) -> Verdict {
        self.status
    }

    pub fn feedback_summary(&self) -> &str {
        &self.feedback_summary
    }

    pub fn line_comments(&self) -> &[LineComment] {
        &self.line_comments
    }

    pub fn diff_suggestions(&self) -> &[DiffSuggestion] {
        &self.diff_suggestions
    }
}

/// How a submission is graded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionKind {
    #[default]
    Standard,
    /// Hotfix for a live incident; performance is held to a higher bar.
    ProductionIncident,
}

impl fmt::Display for SubmissionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubmissionKind::Standard => write!(f, "standard"),
            SubmissionKind::ProductionIncident => write!(f, "production_incident"),
        }
    }
}

impl FromStr for SubmissionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "standard" => Ok(SubmissionKind::Standard),
            "production_incident" | "incident" => Ok(SubmissionKind::ProductionIncident),
            other => Err(format!("unknown submission kind: {other}")),
        }
    }
}

/// A single request to evaluate submitted code. Never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationRequest {
    /// Identifier of the challenge being attempted.
    pub task_id: String,
    /// The submitted source code.
    pub code: String,
    /// Requirements the code is judged against, in display order.
    pub requirements: Vec<String>,
    #[serde(default)]
    pub kind: SubmissionKind,
}

/// One past evaluation outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: Uuid,
    pub task_id: String,
    pub created_at: DateTime<Utc>,
    pub record: ScoreRecord,
    /// Submitted code, kept for review during the session only.
    #[serde(skip)]
    pub code: Option<String>,
}

impl HistoryEntry {
    pub fn new(task_id: impl Into<String>, record: ScoreRecord, code: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            task_id: task_id.into(),
            created_at: Utc::now(),
            record,
            code,
        }
    }
}
