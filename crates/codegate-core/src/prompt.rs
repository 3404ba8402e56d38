//! Evaluation prompt construction.

use std::fmt::Write;

use crate::model::{Category, EvaluationRequest, SubmissionKind};

/// System prompt sent to the collaborator unless overridden.
pub const REVIEWER_SYSTEM_PROMPT: &str = "You are a senior code reviewer grading a practice submission. Respond ONLY with a single JSON object matching the requested schema. Do not wrap it in prose.";

const SCHEMA: &str = r#"{
  "total_score": <integer 0-60>,
  "rubric": {
    "functional_correctness": <integer 0-10>,
    "code_readability": <integer 0-10>,
    "structure_modularity": <integer 0-10>,
    "performance_efficiency": <integer 0-10>,
    "security_practices": <integer 0-10>,
    "error_handling": <integer 0-10>
  },
  "status": "APPROVED" | "REJECTED",
  "feedback_summary": <string>,
  "line_comments": [{"line_number": <integer >= 1>, "comment": <string>, "severity": "error" | "warning" | "info"}],
  "diff_suggestions": [{"original": <string>, "suggested": <string>, "explanation": <string>}]
}"#;

/// Build the user prompt for one evaluation request.
pub fn build_prompt(request: &EvaluationRequest) -> String {
    let mut prompt = String::with_capacity(request.code.len() + 1024);

    let _ = writeln!(prompt, "Task: {}", request.task_id);
    match request.kind {
        SubmissionKind::Standard => {
            prompt.push_str("Submission type: standard practice exercise.\n");
        }
        SubmissionKind::ProductionIncident => {
            prompt.push_str(
                "Submission type: PRODUCTION INCIDENT hotfix. Judge performance strictly; \
                 this code runs on a hot path under live load.\n",
            );
        }
    }

    prompt.push_str("\nRequirements:\n");
    for (i, requirement) in request.requirements.iter().enumerate() {
        let _ = writeln!(prompt, "{}. {}", i + 1, requirement);
    }

    prompt.push_str("\nScore each category from 0 to 10:\n");
    for category in Category::ALL {
        let _ = writeln!(prompt, "- {} ({})", category.key(), category.label());
    }

    prompt.push_str("\nLine numbers refer to the numbered listing below.\n\nSubmission:\n```\n");
    for (i, line) in request.code.lines().enumerate() {
        let _ = writeln!(prompt, "{:>4} | {}", i + 1, line);
    }
    prompt.push_str("```\n\nRespond with JSON in exactly this shape:\n");
    prompt.push_str(SCHEMA);
    prompt.push('\n');
    prompt
}
