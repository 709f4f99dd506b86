//! Evaluation executor - runs trials and aggregates their outcomes.

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use futures::stream::{FuturesUnordered, StreamExt};
use tracing::{debug, error, info, info_span, Instrument};

use super::config::{ExecutionMode, RunConfig};
use super::result::{EvaluationReport, TrialOutcome};
use crate::grading::Grader;
use crate::llm::LlmProvider;
use crate::scaffold::{AgentLoop, ToolRegistry};

/// Callback invoked with each trial outcome as soon as it is known.
pub type TrialObserver = Box<dyn Fn(&TrialOutcome) + Send + Sync>;

/// Runs independent trials of the agent against the grader.
pub struct EvaluationRunner {
    llm_client: Arc<dyn LlmProvider>,
    tools: Arc<ToolRegistry>,
    grader: Arc<Grader>,
    config: RunConfig,
    observer: Option<TrialObserver>,
}

impl EvaluationRunner {
    /// Creates a runner. Every trial shares the (stateless) collaborators but
    /// owns its own conversation.
    pub fn new(
        llm_client: Arc<dyn LlmProvider>,
        tools: Arc<ToolRegistry>,
        grader: Arc<Grader>,
        config: RunConfig,
    ) -> Self {
        Self {
            llm_client,
            tools,
            grader,
            config,
            observer: None,
        }
    }

    /// Registers a callback for per-trial reporting.
    pub fn with_observer<F>(mut self, observer: F) -> Self
    where
        F: Fn(&TrialOutcome) + Send + Sync + 'static,
    {
        self.observer = Some(Box::new(observer));
        self
    }

    /// Gets the run configuration.
    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Runs every trial and returns the report.
    ///
    /// Trials are listed in reporting order: completion order when
    /// concurrent, index order when sequential.
    pub async fn run_all(&self, prompt: &str) -> EvaluationReport {
        let started_at = Utc::now();
        let num_runs = self.config.num_runs;
        info!(
            num_runs,
            mode = %self.config.mode,
            model = %self.config.agent.model,
            "Starting evaluation"
        );

        let mut trials = Vec::with_capacity(num_runs);
        match self.config.mode {
            ExecutionMode::Concurrent => {
                let mut pending: FuturesUnordered<_> =
                    (1..=num_runs).map(|id| self.run_trial(id, prompt)).collect();
                while let Some(outcome) = pending.next().await {
                    self.report(&outcome);
                    trials.push(outcome);
                }
            }
            ExecutionMode::Sequential => {
                for id in 1..=num_runs {
                    let outcome = self.run_trial(id, prompt).await;
                    self.report(&outcome);
                    trials.push(outcome);
                }
            }
        }

        let report = EvaluationReport::new(
            started_at,
            self.config.mode,
            self.config.agent.model.clone(),
            trials,
            self.config.target,
        );
        info!(
            total = report.aggregate.total,
            passed = report.aggregate.passed,
            pass_rate = report.aggregate.pass_rate,
            mean_score = report.aggregate.mean_score,
            target_met = report.target_met,
            "Evaluation complete"
        );
        report
    }

    /// Runs one trial: agent loop, then grading of whatever it submitted.
    ///
    /// Never fails. A transport error ends the trial as a zero-score
    /// outcome instead of aborting the run.
    pub async fn run_trial(&self, trial_id: usize, prompt: &str) -> TrialOutcome {
        let span = info_span!("trial", trial_id);
        async move {
            let start = Instant::now();
            let agent = AgentLoop::new(
                Arc::clone(&self.llm_client),
                Arc::clone(&self.tools),
                self.config.agent.clone(),
            );

            let outcome = match agent.run(prompt).await {
                Err(e) => {
                    error!(error = %e, "Model transport failed; trial abandoned");
                    TrialOutcome::transport_failed(trial_id, e.to_string(), start.elapsed())
                }
                Ok(result) => match result.final_submission() {
                    None => TrialOutcome::no_submission(trial_id, &result, start.elapsed()),
                    Some(code) => {
                        let report = self.grader.grade(code).await;
                        TrialOutcome::graded(trial_id, &result, code, report, start.elapsed())
                    }
                },
            };

            info!(
                status = %outcome.status,
                score = outcome.score,
                passed = outcome.passed,
                "Trial finished"
            );
            outcome
        }
        .instrument(span)
        .await
    }

    fn report(&self, outcome: &TrialOutcome) {
        if let Some(observer) = &self.observer {
            observer(outcome);
        }
    }
}

/// Writes the report as pretty JSON.
pub fn save_report(report: &EvaluationReport, path: &Path) -> Result<(), RunnerError> {
    let json = serde_json::to_string_pretty(report)
        .map_err(|e| RunnerError::Serialize(format!("Failed to serialize report: {}", e)))?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, json)?;
    debug!(path = %path.display(), "Saved evaluation report");
    Ok(())
}

/// Error types for the runner.
#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    #[error("Serialization error: {0}")]
    Serialize(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
