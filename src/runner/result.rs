//! Per-trial outcomes, aggregates and the evaluation report.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::config::{ExecutionMode, TargetBand};
use crate::grading::{CheckMap, GradeReport};
use crate::llm::Usage;
use crate::scaffold::AgentOutcome;

/// How a trial ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrialStatus {
    /// A submission was produced and graded.
    Graded,
    /// The agent finished without submitting code.
    NoSubmission,
    /// The model call failed and the trial was abandoned.
    TransportFailed,
}

impl fmt::Display for TrialStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrialStatus::Graded => write!(f, "graded"),
            TrialStatus::NoSubmission => write!(f, "no_submission"),
            TrialStatus::TransportFailed => write!(f, "transport_failed"),
        }
    }
}

/// Result of one trial.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrialOutcome {
    /// Trial index, starting at 1.
    pub trial_id: usize,
    pub status: TrialStatus,
    pub passed: bool,
    /// Always in `[0, 1]`; zero unless graded.
    pub score: f64,
    /// Grader feedback, empty unless graded.
    pub feedback: String,
    pub details: Option<CheckMap>,
    pub submission: Option<String>,
    pub steps_taken: usize,
    pub tool_calls: usize,
    /// Tokens consumed by the trial's model calls.
    #[serde(default)]
    pub usage: Usage,
    pub duration_ms: u64,
    /// Transport error text for abandoned trials.
    pub error: Option<String>,
}

impl TrialOutcome {
    /// A trial whose submission was graded.
    pub fn graded(
        trial_id: usize,
        agent: &AgentOutcome,
        submission: &str,
        report: GradeReport,
        duration: Duration,
    ) -> Self {
        Self {
            trial_id,
            status: TrialStatus::Graded,
            passed: report.passed,
            score: report.score,
            feedback: report.feedback,
            details: report.details,
            submission: Some(submission.to_string()),
            steps_taken: agent.steps_taken,
            tool_calls: agent.tool_calls,
            usage: agent.usage.clone(),
            duration_ms: millis(duration),
            error: None,
        }
    }

    /// A trial where the agent never submitted.
    pub fn no_submission(trial_id: usize, agent: &AgentOutcome, duration: Duration) -> Self {
        Self {
            trial_id,
            status: TrialStatus::NoSubmission,
            passed: false,
            score: 0.0,
            feedback: String::new(),
            details: None,
            submission: None,
            steps_taken: agent.steps_taken,
            tool_calls: agent.tool_calls,
            usage: agent.usage.clone(),
            duration_ms: millis(duration),
            error: None,
        }
    }

    /// A trial cut short by a model transport failure.
    pub fn transport_failed(trial_id: usize, error: impl Into<String>, duration: Duration) -> Self {
        Self {
            trial_id,
            status: TrialStatus::TransportFailed,
            passed: false,
            score: 0.0,
            feedback: String::new(),
            details: None,
            submission: None,
            steps_taken: 0,
            tool_calls: 0,
            usage: Usage::default(),
            duration_ms: millis(duration),
            error: Some(error.into()),
        }
    }

    /// Whether a submission reached the grader.
    pub fn has_submission(&self) -> bool {
        self.status == TrialStatus::Graded
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Descriptive statistics over all trials.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregateResult {
    pub total: usize,
    pub passed: usize,
    pub mean_score: f64,
    /// Passed fraction in `[0, 1]`.
    pub pass_rate: f64,
}

impl AggregateResult {
    /// Compute the aggregate; an empty run yields all zeros.
    pub fn from_trials(trials: &[TrialOutcome]) -> Self {
        let total = trials.len();
        if total == 0 {
            return Self::default();
        }
        let passed = trials.iter().filter(|t| t.passed).count();
        let score_sum: f64 = trials.iter().map(|t| t.score).sum();
        Self {
            total,
            passed,
            mean_score: score_sum / total as f64,
            pass_rate: passed as f64 / total as f64,
        }
    }
}

/// Everything recorded about one evaluation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub mode: ExecutionMode,
    pub model: String,
    /// Trials in reporting order.
    pub trials: Vec<TrialOutcome>,
    pub aggregate: AggregateResult,
    pub target: TargetBand,
    pub target_met: bool,
}

impl EvaluationReport {
    /// Assemble a report, computing the aggregate from `trials`.
    pub fn new(
        started_at: DateTime<Utc>,
        mode: ExecutionMode,
        model: impl Into<String>,
        trials: Vec<TrialOutcome>,
        target: TargetBand,
    ) -> Self {
        let aggregate = AggregateResult::from_trials(&trials);
        Self {
            run_id: Uuid::new_v4(),
            started_at,
            completed_at: Utc::now(),
            mode,
            model: model.into(),
            trials,
            aggregate,
            target,
            target_met: target.contains(aggregate.pass_rate),
        }
    }
}
