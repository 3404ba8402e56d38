//! Admission decisions.
//!
//! The verdict is always derived here from the validated scores. Whatever
//! verdict the collaborator reported is ignored.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::model::{Category, ScoreRecord, SubmissionKind, Verdict};

/// Minimum functional correctness score for approval.
pub const MIN_FUNCTIONAL_CORRECTNESS: u8 = 7;
/// Minimum security score for approval.
pub const MIN_SECURITY: u8 = 6;
/// Minimum total score for approval.
pub const MIN_TOTAL: u8 = 30;
/// Minimum performance score for production incident fixes.
pub const MIN_INCIDENT_PERFORMANCE: u8 = 8;

/// The rule that rejected a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum RejectionReason {
    FunctionalCorrectness { score: u8 },
    Security { score: u8 },
    TotalScore { total: u8 },
    IncidentPerformance { score: u8 },
}

impl fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectionReason::FunctionalCorrectness { score } => write!(
                f,
                "functional correctness {score}/10 is below the minimum of {MIN_FUNCTIONAL_CORRECTNESS}"
            ),
            RejectionReason::Security { score } => {
                write!(f, "security {score}/10 is below the minimum of {MIN_SECURITY}")
            }
            RejectionReason::TotalScore { total } => {
                write!(f, "total score {total}/60 is below the minimum of {MIN_TOTAL}")
            }
            RejectionReason::IncidentPerformance { score } => write!(
                f,
                "performance {score}/10 is below the production incident minimum of {MIN_INCIDENT_PERFORMANCE}"
            ),
        }
    }
}

/// Return the first rule that rejects `record`, or `None` if it passes.
///
/// Rules are checked in precedence order: correctness, security, total,
/// then the production incident performance floor.
pub fn rejection_reason(record: &ScoreRecord, kind: SubmissionKind) -> Option<RejectionReason> {
    let correctness = record.score(Category::FunctionalCorrectness);
    if correctness < MIN_FUNCTIONAL_CORRECTNESS {
        return Some(RejectionReason::FunctionalCorrectness { score: correctness });
    }

    let security = record.score(Category::SecurityPractices);
    if security < MIN_SECURITY {
        return Some(RejectionReason::Security { score: security });
    }

    let total = record.total_score();
    if total < MIN_TOTAL {
        return Some(RejectionReason::TotalScore { total });
    }

    let performance = record.score(Category::PerformanceEfficiency);
    if kind == SubmissionKind::ProductionIncident && performance < MIN_INCIDENT_PERFORMANCE {
        return Some(RejectionReason::IncidentPerformance { score: performance });
    }

    None
}

/// Decide whether a submission is admitted.
pub fn decide(record: &ScoreRecord, kind: SubmissionKind) -> Verdict {
    match rejection_reason(record, kind) {
        Some(_) => Verdict::Rejected,
        None => Verdict::Approved,
    }
}
