//! Evaluation orchestrator.
//!
//! Checks the request, prompts the collaborator under a fixed time budget,
//! validates the answer and derives the verdict. Every collaborator-side
//! failure is absorbed into a rejected fallback record; only request-shape
//! problems are returned as errors.

use std::sync::Arc;
use std::time::Duration;

use futures::stream::{FuturesUnordered, StreamExt};
use tokio::sync::Semaphore;
use tokio::time::Instant;
use tracing::instrument;

use crate::decision::decide;
use crate::error::{ProviderError, RequestInvalid, ValidationFailure};
use crate::model::{EvaluationRequest, ScoreRecord};
use crate::prompt::{build_prompt, REVIEWER_SYSTEM_PROMPT};
use crate::traits::{GenerateRequest, LlmProvider};
use crate::validator::validate_response;

/// Wall-clock budget for one collaborator call.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Largest submission, in characters, that is sent for evaluation.
pub const DEFAULT_MAX_CODE_CHARS: usize = 50_000;

const TIMEOUT_SUMMARY: &str =
    "The reviewer took too long to respond, so this submission could not be graded. Please try again.";
const FAULT_SUMMARY: &str =
    "The reviewer is unavailable right now, so this submission could not be graded. Please try again.";
const UNREADABLE_SUMMARY: &str =
    "The reviewer's assessment could not be read, so this submission could not be graded. Please resubmit.";

/// Configuration for the evaluator.
#[derive(Debug, Clone)]
pub struct EvaluatorConfig {
    /// Model identifier passed to the provider.
    pub model: String,
    /// Budget for a single collaborator call.
    pub timeout: Duration,
    /// Submission size cap in characters.
    pub max_code_chars: usize,
    /// Max tokens for the assessment.
    pub max_tokens: u32,
    /// Sampling temperature.
    pub temperature: f64,
    /// Concurrent evaluations in [`Evaluator::evaluate_many`].
    pub parallelism: usize,
    /// Optional system prompt override.
    pub system_prompt_override: Option<String>,
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self {
            model: "claude-sonnet-4-20250514".into(),
            timeout: DEFAULT_TIMEOUT,
            max_code_chars: DEFAULT_MAX_CODE_CHARS,
            max_tokens: 2048,
            temperature: 0.0,
            parallelism: 4,
            system_prompt_override: None,
        }
    }
}

/// Why an evaluation ended in a fallback record.
///
/// Kept for logs and diagnostics; never shown verbatim to the submitter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FallbackCause {
    Timeout,
    CollaboratorFault(String),
    Validation(ValidationFailure),
}

impl FallbackCause {
    /// Summary placed in the fallback record.
    pub fn summary(&self) -> &'static str {
        match self {
            FallbackCause::Timeout => TIMEOUT_SUMMARY,
            FallbackCause::CollaboratorFault(_) => FAULT_SUMMARY,
            FallbackCause::Validation(_) => UNREADABLE_SUMMARY,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            FallbackCause::Timeout => "collaborator_timeout",
            FallbackCause::CollaboratorFault(_) => "collaborator_fault",
            FallbackCause::Validation(failure) => failure.kind(),
        }
    }
}

/// A finished evaluation with its diagnostics.
#[derive(Debug, Clone)]
pub struct Evaluation {
    pub record: ScoreRecord,
    /// Set when `record` is a fallback rather than a real assessment.
    pub fallback: Option<FallbackCause>,
    /// Time spent waiting on the collaborator.
    pub latency_ms: u64,
}

/// The evaluation orchestrator.
pub struct Evaluator {
    provider: Arc<dyn LlmProvider>,
    config: EvaluatorConfig,
}

impl Evaluator {
    pub fn new(provider: Arc<dyn LlmProvider>, config: EvaluatorConfig) -> Self {
        Self { provider, config }
    }

    pub fn config(&self) -> &EvaluatorConfig {
        &self.config
    }

    /// Check the request shape without contacting the collaborator.
    pub fn check_request(&self, request: &EvaluationRequest) -> Result<(), RequestInvalid> {
        if request.task_id.trim().is_empty() {
            return Err(RequestInvalid::MissingTaskId);
        }
        if request.code.trim().is_empty() {
            return Err(RequestInvalid::EmptyCode);
        }
        if request.requirements.iter().all(|r| r.trim().is_empty()) {
            return Err(RequestInvalid::NoRequirements);
        }
        let len = request.code.chars().count();
        if len > self.config.max_code_chars {
            return Err(RequestInvalid::CodeTooLarge {
                len,
                max: self.config.max_code_chars,
            });
        }
        Ok(())
    }

    /// Evaluate a submission, returning only the record.
    pub async fn evaluate(
        &self,
        request: &EvaluationRequest,
    ) -> Result<ScoreRecord, RequestInvalid> {
        self.evaluate_detailed(request).await.map(|e| e.record)
    }

    /// Evaluate a submission, keeping fallback diagnostics.
    #[instrument(skip_all, fields(task = %request.task_id, kind = %request.kind))]
    pub async fn evaluate_detailed(
        &self,
        request: &EvaluationRequest,
    ) -> Result<Evaluation, RequestInvalid> {
        self.check_request(request)?;

        let generate = GenerateRequest {
            model: self.config.model.clone(),
            prompt: build_prompt(request),
            system_prompt: Some(
                self.config
                    .system_prompt_override
                    .clone()
                    .unwrap_or_else(|| REVIEWER_SYSTEM_PROMPT.to_string()),
            ),
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
            json_response: true,
        };
        tracing::debug!(
            provider = self.provider.name(),
            prompt_chars = generate.prompt.len(),
            "requesting assessment"
        );

        let start = Instant::now();
        // Dropping the future on timeout abandons the call; a late answer is never observed.
        let outcome =
            tokio::time::timeout(self.config.timeout, self.provider.generate(&generate)).await;
        let latency_ms = start.elapsed().as_millis() as u64;

        let assessed = match outcome {
            Err(_) => Err(FallbackCause::Timeout),
            Ok(Err(e)) => {
                let transport_timeout = e
                    .downcast_ref::<ProviderError>()
                    .is_some_and(ProviderError::is_timeout);
                if transport_timeout {
                    Err(FallbackCause::Timeout)
                } else {
                    Err(FallbackCause::CollaboratorFault(format!("{e:#}")))
                }
            }
            Ok(Ok(response)) => {
                validate_response(&response.content).map_err(FallbackCause::Validation)
            }
        };

        let evaluation = match assessed {
            Ok(record) => {
                let verdict = decide(&record, request.kind);
                if verdict != record.status() {
                    tracing::debug!(
                        reported = %record.status(),
                        derived = %verdict,
                        "overriding collaborator verdict"
                    );
                }
                Evaluation {
                    record: record.with_verdict(verdict),
                    fallback: None,
                    latency_ms,
                }
            }
            Err(cause) => {
                match &cause {
                    FallbackCause::CollaboratorFault(detail) => {
                        tracing::warn!(
                            cause = cause.kind(),
                            latency_ms,
                            "collaborator failed: {detail}"
                        );
                    }
                    FallbackCause::Validation(failure) => {
                        tracing::warn!(
                            cause = cause.kind(),
                            latency_ms,
                            "assessment rejected: {failure}"
                        );
                    }
                    FallbackCause::Timeout => {
                        tracing::warn!(cause = cause.kind(), latency_ms, "collaborator timed out");
                    }
                }
                Evaluation {
                    record: ScoreRecord::fallback(cause.summary()),
                    fallback: Some(cause),
                    latency_ms,
                }
            }
        };

        tracing::info!(
            total = evaluation.record.total_score(),
            verdict = %evaluation.record.status(),
            latency_ms,
            "evaluation complete"
        );
        Ok(evaluation)
    }

    /// Evaluate independent requests concurrently.
    ///
    /// At most `parallelism` collaborator calls are in flight at once. Results
    /// come back in the same order as `requests`.
    pub async fn evaluate_many(
        &self,
        requests: &[EvaluationRequest],
    ) -> Vec<Result<ScoreRecord, RequestInvalid>> {
        let semaphore = Semaphore::new(self.config.parallelism.max(1));

        let mut futures: FuturesUnordered<_> = requests
            .iter()
            .enumerate()
            .map(|(index, request)| {
                let semaphore = &semaphore;
                async move {
                    let _permit = semaphore.acquire().await.ok();
                    (index, self.evaluate(request).await)
                }
            })
            .collect();

        let mut results = Vec::with_capacity(requests.len());
        while let Some(item) = futures.next().await {
            results.push(item);
        }
        results.sort_by_key(|(index, _)| *index);
        results.into_iter().map(|(_, result)| result).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;
    use serde_json::json;

    use crate::model::{Category, SubmissionKind, Verdict};
    use crate::traits::{GenerateResponse, ModelInfo, TokenUsage};

    enum Script {
        Reply(String),
        Fail(fn() -> anyhow::Error),
        Slow(Duration, String),
    }

    struct ScriptedProvider {
        script: Script,
        calls: AtomicU32,
    }

    impl ScriptedProvider {
        fn new(script: Script) -> Arc<Self> {
            Arc::new(Self {
                script,
                calls: AtomicU32::new(0),
            })
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::Relaxed)
        }
    }

    #[async_trait]
    impl LlmProvider for ScriptedProvider {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn generate(&self, request: &GenerateRequest) -> anyhow::Result<GenerateResponse> {
            self.calls.fetch_add(1, Ordering::Relaxed);
            let content = match &self.script {
                Script::Reply(text) => text.clone(),
                Script::Fail(make) => return Err(make()),
                Script::Slow(delay, text) => {
                    tokio::time::sleep(*delay).await;
                    text.clone()
                }
            };
            Ok(GenerateResponse {
                content,
                model: request.model.clone(),
                token_usage: TokenUsage::default(),
                latency_ms: 0,
            })
        }

        fn available_models(&self) -> Vec<ModelInfo> {
            vec![]
        }
    }

    fn assessment(scores: [u8; 6], status: &str) -> String {
        json!({
            "total_score": 60,
            "rubric": {
                "functional_correctness": scores[0],
                "code_readability": scores[1],
                "structure_modularity": scores[2],
                "performance_efficiency": scores[3],
                "security_practices": scores[4],
                "error_handling": scores[5]
            },
            "status": status,
            "feedback_summary": "Reviewed.",
            "line_comments": [],
            "diff_suggestions": []
        })
        .to_string()
    }

    fn request(kind: SubmissionKind) -> EvaluationRequest {
        EvaluationRequest {
            task_id: "lru-cache".into(),
            code: "struct Lru;".into(),
            requirements: vec!["Evict least recently used".into()],
            kind,
        }
    }

    #[tokio::test]
    async fn approved_assessment() {
        let provider = ScriptedProvider::new(Script::Reply(assessment(
            [8, 7, 7, 7, 7, 6],
            "REJECTED",
        )));
        let evaluator = Evaluator::new(provider.clone(), EvaluatorConfig::default());

        let evaluation = evaluator
            .evaluate_detailed(&request(SubmissionKind::Standard))
            .await
            .unwrap();
        assert!(evaluation.fallback.is_none());
        assert_eq!(evaluation.record.total_score(), 42);
        assert_eq!(evaluation.record.status(), Verdict::Approved);
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn collaborator_cannot_self_approve() {
        let provider = ScriptedProvider::new(Script::Reply(assessment(
            [6, 10, 10, 10, 10, 10],
            "APPROVED",
        )));
        let evaluator = Evaluator::new(provider, EvaluatorConfig::default());

        let record = evaluator
            .evaluate(&request(SubmissionKind::Standard))
            .await
            .unwrap();
        assert_eq!(record.status(), Verdict::Rejected);
        assert_eq!(record.total_score(), 56);
    }

    #[tokio::test]
    async fn incident_floor_applies() {
        let provider = ScriptedProvider::new(Script::Reply(assessment(
            [9, 9, 9, 7, 9, 9],
            "APPROVED",
        )));
        let evaluator = Evaluator::new(provider, EvaluatorConfig::default());

        let record = evaluator
            .evaluate(&request(SubmissionKind::ProductionIncident))
            .await
            .unwrap();
        assert_eq!(record.total_score(), 52);
        assert_eq!(record.status(), Verdict::Rejected);
    }

    #[tokio::test]
    async fn malformed_payload_falls_back() {
        let provider = ScriptedProvider::new(Script::Reply("Looks great to me, ship it!".into()));
        let evaluator = Evaluator::new(provider, EvaluatorConfig::default());

        let evaluation = evaluator
            .evaluate_detailed(&request(SubmissionKind::Standard))
            .await
            .unwrap();
        assert_eq!(evaluation.record.status(), Verdict::Rejected);
        assert_eq!(evaluation.record.total_score(), 0);
        assert_eq!(evaluation.record.feedback_summary(), UNREADABLE_SUMMARY);
        assert!(matches!(
            evaluation.fallback,
            Some(FallbackCause::Validation(ValidationFailure::MalformedPayload(_)))
        ));
    }

    #[tokio::test]
    async fn out_of_range_payload_falls_back_without_leaking() {
        let provider = ScriptedProvider::new(Script::Reply(assessment(
            [8, 7, 7, 7, 14, 6],
            "APPROVED",
        )));
        let evaluator = Evaluator::new(provider, EvaluatorConfig::default());

        let evaluation = evaluator
            .evaluate_detailed(&request(SubmissionKind::Standard))
            .await
            .unwrap();
        assert_eq!(evaluation.record.status(), Verdict::Rejected);
        assert!(!evaluation.record.feedback_summary().contains("security"));
        assert_eq!(
            evaluation.fallback,
            Some(FallbackCause::Validation(ValidationFailure::OutOfRangeScore {
                category: Category::SecurityPractices,
                found: "14".into()
            }))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn slow_collaborator_times_out() {
        let provider = ScriptedProvider::new(Script::Slow(
            Duration::from_secs(30),
            assessment([10, 10, 10, 10, 10, 10], "APPROVED"),
        ));
        let evaluator = Evaluator::new(provider, EvaluatorConfig::default());

        let evaluation = evaluator
            .evaluate_detailed(&request(SubmissionKind::Standard))
            .await
            .unwrap();
        assert_eq!(evaluation.fallback, Some(FallbackCause::Timeout));
        assert_eq!(evaluation.record.status(), Verdict::Rejected);
        assert_eq!(evaluation.record.feedback_summary(), TIMEOUT_SUMMARY);
        assert!(evaluation.latency_ms >= 10_000);
    }

    #[tokio::test(start_paused = true)]
    async fn answer_inside_budget_is_used() {
        let provider = ScriptedProvider::new(Script::Slow(
            Duration::from_secs(9),
            assessment([10, 10, 10, 10, 10, 10], "APPROVED"),
        ));
        let evaluator = Evaluator::new(provider, EvaluatorConfig::default());

        let record = evaluator
            .evaluate(&request(SubmissionKind::Standard))
            .await
            .unwrap();
        assert_eq!(record.total_score(), 60);
        assert_eq!(record.status(), Verdict::Approved);
    }

    #[tokio::test]
    async fn transport_fault_falls_back() {
        let provider = ScriptedProvider::new(Script::Fail(|| {
            ProviderError::NetworkError("connection reset".into()).into()
        }));
        let evaluator = Evaluator::new(provider.clone(), EvaluatorConfig::default());

        let evaluation = evaluator
            .evaluate_detailed(&request(SubmissionKind::Standard))
            .await
            .unwrap();
        assert!(matches!(
            evaluation.fallback,
            Some(FallbackCause::CollaboratorFault(_))
        ));
        assert_eq!(evaluation.record.feedback_summary(), FAULT_SUMMARY);
        // No automatic retry.
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn provider_timeout_is_classified_as_timeout() {
        let provider = ScriptedProvider::new(Script::Fail(|| ProviderError::Timeout(10).into()));
        let evaluator = Evaluator::new(provider, EvaluatorConfig::default());

        let evaluation = evaluator
            .evaluate_detailed(&request(SubmissionKind::Standard))
            .await
            .unwrap();
        assert_eq!(evaluation.fallback, Some(FallbackCause::Timeout));
    }

    #[tokio::test]
    async fn oversize_code_never_reaches_collaborator() {
        let provider = ScriptedProvider::new(Script::Reply(assessment(
            [10, 10, 10, 10, 10, 10],
            "APPROVED",
        )));
        let evaluator = Evaluator::new(provider.clone(), EvaluatorConfig::default());

        let mut req = request(SubmissionKind::Standard);
        req.code = "x".repeat(DEFAULT_MAX_CODE_CHARS + 1);
        let err = evaluator.evaluate(&req).await.unwrap_err();
        assert_eq!(
            err,
            RequestInvalid::CodeTooLarge {
                len: DEFAULT_MAX_CODE_CHARS + 1,
                max: DEFAULT_MAX_CODE_CHARS
            }
        );
        assert_eq!(provider.calls(), 0);

        req.code = "x".repeat(DEFAULT_MAX_CODE_CHARS);
        assert!(evaluator.evaluate(&req).await.is_ok());
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn empty_fields_are_request_errors() {
        let provider = ScriptedProvider::new(Script::Reply(String::new()));
        let evaluator = Evaluator::new(provider.clone(), EvaluatorConfig::default());

        let mut req = request(SubmissionKind::Standard);
        req.code = "   \n".into();
        assert_eq!(evaluator.evaluate(&req).await.unwrap_err(), RequestInvalid::EmptyCode);

        let mut req = request(SubmissionKind::Standard);
        req.requirements.clear();
        assert_eq!(
            evaluator.evaluate(&req).await.unwrap_err(),
            RequestInvalid::NoRequirements
        );

        let mut req = request(SubmissionKind::Standard);
        req.task_id = String::new();
        assert_eq!(
            evaluator.evaluate(&req).await.unwrap_err(),
            RequestInvalid::MissingTaskId
        );
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn size_cap_counts_characters() {
        let provider = ScriptedProvider::new(Script::Reply(assessment(
            [10, 10, 10, 10, 10, 10],
            "APPROVED",
        )));
        let config = EvaluatorConfig {
            max_code_chars: 4,
            ..Default::default()
        };
        let evaluator = Evaluator::new(provider, config);

        let mut req = request(SubmissionKind::Standard);
        // Four characters, twelve bytes.
        req.code = "日本語字".into();
        assert!(evaluator.evaluate(&req).await.is_ok());
    }

    #[tokio::test]
    async fn evaluate_many_preserves_order() {
        let provider = ScriptedProvider::new(Script::Reply(assessment(
            [8, 7, 7, 7, 7, 6],
            "APPROVED",
        )));
        let config = EvaluatorConfig {
            parallelism: 2,
            ..Default::default()
        };
        let evaluator = Evaluator::new(provider.clone(), config);

        let mut bad = request(SubmissionKind::Standard);
        bad.code.clear();
        let requests = vec![
            request(SubmissionKind::Standard),
            bad,
            request(SubmissionKind::ProductionIncident),
        ];

        let results = evaluator.evaluate_many(&requests).await;
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].as_ref().unwrap().status(), Verdict::Approved);
        assert_eq!(results[1].as_ref().unwrap_err(), &RequestInvalid::EmptyCode);
        assert_eq!(results[2].as_ref().unwrap().status(), Verdict::Rejected);
        assert_eq!(provider.calls(), 2);
    }
}
