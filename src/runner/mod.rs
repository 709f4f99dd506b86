//! Evaluation orchestrator.
//!
//! Runs N independent trials of the repair agent and grades each final
//! submission.
//!
//! # Architecture
//!
//! ```text
//! prompt → AgentLoop (per trial) → submission? → Grader → TrialOutcome
//!                                                             ↓
//!                                   AggregateResult ← EvaluationReport
//! ```
//!
//! Trials share no mutable state. In concurrent mode outcomes are reported
//! as they complete; in sequential mode they are reported in index order.
//!
//! # Example
//!
//! ```ignore
//! use gauntlet::runner::{EvaluationRunner, ExecutionMode, RunConfig};
//!
//! let config = RunConfig::new(10).with_mode(ExecutionMode::Concurrent);
//! let runner = EvaluationRunner::new(llm, tools, grader, config)
//!     .with_observer(|trial| println!("trial {}: {:.0}%", trial.trial_id, trial.score * 100.0));
//! let report = runner.run_all(&build_prompt()).await;
//! println!("pass rate: {:.1}%", report.aggregate.pass_rate * 100.0);
//! ```

pub mod config;
pub mod executor;
pub mod result;

pub use config::{ExecutionMode, RunConfig, TargetBand};
pub use executor::{save_report, EvaluationRunner, RunnerError, TrialObserver};
pub use result::{AggregateResult, EvaluationReport, TrialOutcome, TrialStatus};
