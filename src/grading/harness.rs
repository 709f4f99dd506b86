//! Grading harness: runs a submitted routine through every tier.

use std::sync::Arc;

use tracing::{debug, info, warn};

use super::checks::{
    self, crash_issue, guardrail_patterns, truncate, CheckMap, CheckResult, GradeReport,
    HARNESS_MESSAGE_LIMIT,
};
use super::scenarios;
use crate::error::{RoutineError, SandboxError};
use crate::sandbox::{Sandbox, Value};

/// Entry point every submission must define.
pub const ENTRY_POINT: &str = "process_batch";

/// Grades submissions against the tiered scenarios.
pub struct Grader {
    sandbox: Arc<dyn Sandbox>,
    entry: String,
}

impl Grader {
    /// Create a grader that loads submissions into `sandbox`.
    pub fn new(sandbox: Arc<dyn Sandbox>) -> Self {
        Self {
            sandbox,
            entry: ENTRY_POINT.to_string(),
        }
    }

    /// Override the entry point name.
    pub fn with_entry(mut self, entry: impl Into<String>) -> Self {
        self.entry = entry.into();
        self
    }

    /// Grade a submission. Never fails: infrastructure faults come back as a
    /// zero-score report with `Harness error` feedback.
    pub async fn grade(&self, source: &str) -> GradeReport {
        match self.try_grade(source).await {
            Ok(report) => {
                info!(
                    score = report.score,
                    passed = report.passed,
                    "Submission graded"
                );
                report
            }
            Err(e) => {
                warn!(error = %e, "Grading harness failed");
                GradeReport::harness_error(&e.to_string())
            }
        }
    }

    async fn try_grade(&self, source: &str) -> Result<GradeReport, SandboxError> {
        if let Err(e) = self.sandbox.resolve(source, &self.entry).await {
            let feedback = match e.into_routine_fault()? {
                RoutineError::MissingEntry { entry } => format!("{} missing", entry),
                fault => format!(
                    "{} failed to load: {}",
                    self.entry,
                    truncate(&fault.to_string(), HARNESS_MESSAGE_LIMIT)
                ),
            };
            info!(feedback = %feedback, "Submission rejected before tiers");
            return Ok(GradeReport::rejected(feedback));
        }

        let mut issues = Vec::new();

        // Tier 1: data integrity
        let tier1 = self
            .check(
                source,
                scenarios::integrity_events(),
                scenarios::fresh_state(),
                checks::tier1_integrity,
            )
            .await?;
        let tier1 = settle(tier1, "Tier1 crash", &mut issues);
        if !tier1 {
            issues.push("Tier1 cascade unresolved".to_string());
        }

        // Tier 2: statistical stability, both halves always run
        let flat_events = scenarios::flat_events();
        let flat_len = flat_events.items().map_or(0, <[Value]>::len);
        let flat = self
            .check(source, flat_events, scenarios::fresh_state(), |r| {
                checks::tier2_flat(r, flat_len)
            })
            .await?;
        let flat = settle(flat, "Tier2 flat crash", &mut issues);
        let heavy = self
            .check(
                source,
                scenarios::heavy_tail_events(),
                scenarios::fresh_state(),
                checks::tier2_heavy,
            )
            .await?;
        let heavy = settle(heavy, "Tier2 heavy crash", &mut issues);
        let tier2 = flat && heavy;
        if !tier2 {
            issues.push("Tier2 balance broken".to_string());
        }

        // Tier 3: resilience under a near-full state
        let tier3 = self
            .check(
                source,
                scenarios::flood_events(),
                scenarios::hot_state(),
                checks::tier3_resilience,
            )
            .await?;
        let tier3 = settle(tier3, "Tier3 crash", &mut issues);
        if !tier3 {
            issues.push("Tier3 resilience missing".to_string());
        }

        let valid = self
            .check(
                source,
                scenarios::sanity_events(),
                scenarios::fresh_state(),
                checks::validity,
            )
            .await?;
        let valid = settle(valid, "Validity crash", &mut issues);
        if !valid {
            issues.push("Outputs not trustworthy".to_string());
        }

        let patterns = guardrail_patterns(source);
        if !patterns {
            issues.push("Guardrail keywords missing".to_string());
        }

        let checks = CheckMap {
            tier1,
            tier2,
            tier3,
            valid,
            patterns,
        };
        debug!(?checks, issues = issues.len(), "Tier checks complete");
        Ok(GradeReport::from_checks(checks, &issues))
    }

    /// Invoke the routine on one scenario and inspect what it returned.
    ///
    /// Routine faults and inspection crashes both come back as `Err` inside
    /// the `Ok`; only sandbox infrastructure faults escape.
    async fn check<F>(
        &self,
        source: &str,
        events: Value,
        state: Value,
        inspect: F,
    ) -> Result<CheckResult, SandboxError>
    where
        F: FnOnce(&Value) -> CheckResult,
    {
        match self
            .sandbox
            .invoke(source, &self.entry, vec![events, state])
            .await
        {
            Ok(result) => Ok(inspect(&result)),
            Err(e) => Ok(Err(e.into_routine_fault()?.to_string())),
        }
    }
}

/// Collapse a check result to a boolean, recording crashes as issues.
fn settle(result: CheckResult, label: &str, issues: &mut Vec<String>) -> bool {
    match result {
        Ok(passed) => passed,
        Err(message) => {
            debug!(tier = label, error = %message, "Tier crashed");
            issues.push(crash_issue(label, &message));
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sandbox::ExecOutcome;
    use async_trait::async_trait;
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    type Routine = dyn Fn(&[Value]) -> Result<Value, RoutineError> + Send + Sync;

    /// Sandbox whose "source" is a key into a table of Rust routines.
    struct ClosureSandbox {
        routines: BTreeMap<String, Box<Routine>>,
        calls: AtomicUsize,
        broken: bool,
    }

    impl ClosureSandbox {
        fn new() -> Self {
            Self {
                routines: BTreeMap::new(),
                calls: AtomicUsize::new(0),
                broken: false,
            }
        }

        fn with<F>(mut self, source: &str, routine: F) -> Self
        where
            F: Fn(&[Value]) -> Result<Value, RoutineError> + Send + Sync + 'static,
        {
            self.routines.insert(source.to_string(), Box::new(routine));
            self
        }
    }

    #[async_trait]
    impl Sandbox for ClosureSandbox {
        async fn evaluate(&self, _: &str) -> ExecOutcome {
            ExecOutcome::output("Executed")
        }

        async fn resolve(&self, source: &str, entry: &str) -> Result<(), RoutineError> {
            if source.starts_with("syntax") {
                return Err(RoutineError::Load("SyntaxError: invalid syntax".to_string()));
            }
            match self.routines.contains_key(source) {
                true => Ok(()),
                false => Err(RoutineError::MissingEntry {
                    entry: entry.to_string(),
                }),
            }
        }

        async fn invoke(
            &self,
            source: &str,
            entry: &str,
            args: Vec<Value>,
        ) -> Result<Value, RoutineError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.broken {
                return Err(SandboxError::Protocol("driver vanished".to_string()).into());
            }
            let routine = self.routines.get(source).ok_or_else(|| RoutineError::MissingEntry {
                entry: entry.to_string(),
            })?;
            routine(args.as_slice())
        }
    }

    fn rows(args: &[Value]) -> Vec<Value> {
        args[0].items().map(<[Value]>::to_vec).unwrap_or_default()
    }

    fn reading(row: &Value) -> Option<f64> {
        let parsed = match row.get("reading")? {
            Value::Str(s) => s.trim().parse::<f64>().ok(),
            other => other.as_number(),
        };
        parsed.filter(|r| r.is_finite())
    }

    /// A hardened routine: parse, sort, drop spikes by median distance, keep
    /// the buffer bounded and report telemetry.
    fn hardened(args: &[Value]) -> Result<Value, RoutineError> {
        let mut clean: Vec<(i64, f64, Value)> = rows(args)
            .into_iter()
            .filter_map(|row| {
                let ts = match row.get("ts") {
                    Some(Value::Int(ts)) => *ts,
                    _ => 0,
                };
                let r = reading(&row)?;
                let tag = row.get("tag").cloned().unwrap_or(Value::None);
                Some((ts, r, tag))
            })
            .collect();
        clean.sort_by_key(|(ts, _, _)| *ts);

        let mut sorted: Vec<f64> = clean.iter().map(|(_, r, _)| *r).collect();
        sorted.sort_by(f64::total_cmp);
        let median = sorted.get(sorted.len() / 2).copied().unwrap_or(0.0);
        clean.retain(|(_, r, _)| (r - median).abs() < 100.0);

        let n = clean.len().max(1) as f64;
        let mean = clean.iter().map(|(_, r, _)| r).sum::<f64>() / n;
        let var = clean.iter().map(|(_, r, _)| (r - mean).powi(2)).sum::<f64>() / n;

        let records: Vec<Value> = clean
            .into_iter()
            .map(|(ts, r, tag)| {
                Value::dict([
                    ("ts", Value::Int(ts)),
                    ("reading", Value::Float(r)),
                    ("tag", tag),
                ])
            })
            .collect();
        let state = Value::dict([("buffer", Value::deque(records.clone(), 240))]);

        Ok(Value::dict([
            ("clean", Value::List(records)),
            ("mean", Value::Float(mean)),
            ("std", Value::Float(var.sqrt())),
            ("state", state),
            ("telemetry", Value::dict([("fallback", Value::Bool(false))])),
        ]))
    }

    /// The reference defect: z-scores against a raw standard deviation.
    fn divides_by_std(args: &[Value]) -> Result<Value, RoutineError> {
        let readings: Vec<f64> = rows(args)
            .iter()
            .map(|row| reading(row).ok_or_else(|| RoutineError::Raised(
                "could not convert string to float: 'bad'".to_string(),
            )))
            .collect::<Result<_, _>>()?;
        let n = readings.len() as f64;
        let mean = readings.iter().sum::<f64>() / n;
        let std = (readings.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n).sqrt();
        if std == 0.0 {
            return Err(RoutineError::Raised("float division by zero".to_string()));
        }
        Ok(Value::dict([
            ("clean", Value::List(rows(args))),
            ("mean", Value::Float(mean)),
            ("std", Value::Float(std)),
        ]))
    }

    const HARDENED: &str = "hardened # guardrail telemetry";
    const BUGGY: &str = "buggy";

    fn sandbox() -> ClosureSandbox {
        ClosureSandbox::new()
            .with(HARDENED, hardened)
            .with(BUGGY, divides_by_std)
    }

    #[tokio::test]
    async fn test_missing_entry_short_circuits() {
        let sandbox = Arc::new(sandbox());
        let report = Grader::new(sandbox.clone()).grade("x = 1").await;

        assert!(!report.passed);
        assert_eq!(report.score, 0.0);
        assert_eq!(report.feedback, "process_batch missing");
        assert!(report.details.is_none());
        assert_eq!(sandbox.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_load_failure_is_a_submission_fault() {
        let report = Grader::new(Arc::new(sandbox())).grade("syntax error(").await;
        assert!(!report.passed);
        assert_eq!(report.score, 0.0);
        assert_eq!(
            report.feedback,
            "process_batch failed to load: SyntaxError: invalid syntax"
        );
    }

    #[tokio::test]
    async fn test_zero_std_division_fails_tier2() {
        let report = Grader::new(Arc::new(sandbox())).grade(BUGGY).await;
        let details = report.details.unwrap();

        assert!(!report.passed);
        assert!(!details.tier2);
        assert!(!details.tier1);
        assert!(!details.patterns);
        assert!(report.feedback.starts_with("✗ "));
        assert!(report
            .feedback
            .contains("Tier2 flat crash: float division by zero"));
        assert!(report.feedback.contains("Tier2 balance broken"));
        assert!(report.feedback.contains("Guardrail keywords missing"));
        assert!((report.score - details.score()).abs() < 1e-12);
    }

    #[tokio::test]
    async fn test_hardened_routine_passes_everything() {
        let report = Grader::new(Arc::new(sandbox())).grade(HARDENED).await;

        assert_eq!(
            report.details,
            Some(CheckMap {
                tier1: true,
                tier2: true,
                tier3: true,
                valid: true,
                patterns: true,
            })
        );
        assert!(report.passed);
        assert_eq!(report.score, 1.0);
        assert_eq!(report.feedback, "✓ All tiers stable");
    }

    #[tokio::test]
    async fn test_grading_is_idempotent() {
        let grader = Grader::new(Arc::new(sandbox()));
        let first = grader.grade(BUGGY).await;
        let second = grader.grade(BUGGY).await;
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_each_tier_gets_fresh_state() {
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let recorder = seen.clone();
        let sandbox = ClosureSandbox::new().with("recording", move |args| {
            recorder.lock().unwrap().push(args[1].get("seen").cloned());
            hardened(args)
        });

        Grader::new(Arc::new(sandbox)).grade("recording").await;
        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 5);
        assert_eq!(seen.iter().filter(|s| **s == Some(Value::Int(0))).count(), 4);
        assert_eq!(seen[3], Some(Value::Int(190)));
    }

    #[tokio::test]
    async fn test_non_dict_result_crashes_every_tier() {
        let sandbox = ClosureSandbox::new().with("list # monitor fallback", |_| Ok(Value::List(vec![])));
        let report = Grader::new(Arc::new(sandbox))
            .grade("list # monitor fallback")
            .await;

        let details = report.details.unwrap();
        assert_eq!(details.passed_count(), 1);
        assert!(details.patterns);
        assert!((report.score - 0.2).abs() < 1e-12);
        assert!(report
            .feedback
            .contains("Tier1 crash: 'list' object has no attribute 'get'"));
        assert!(report.feedback.contains("Validity crash:"));
    }

    #[tokio::test]
    async fn test_tier_timeout_is_a_tier_fault() {
        let sandbox = ClosureSandbox::new().with("slow", |_| {
            Err(SandboxError::Timeout { seconds: 30 }.into())
        });
        let report = Grader::new(Arc::new(sandbox)).grade("slow").await;

        assert!(report.details.is_some());
        assert!(report.feedback.contains("Tier1 crash: timed out after 30s"));
    }

    #[tokio::test]
    async fn test_interpreter_exit_mid_tier_is_a_tier_fault() {
        let source = "exits when hot # guardrail telemetry";
        let sandbox = ClosureSandbox::new().with(source, |args| {
            if args[1].get("seen") == Some(&Value::Int(190)) {
                return Err(SandboxError::Exited {
                    status: "exit status: 0".to_string(),
                    stderr: String::new(),
                }
                .into());
            }
            hardened(args)
        });
        let report = Grader::new(Arc::new(sandbox)).grade(source).await;

        let details = report.details.expect("earlier tiers are kept");
        assert!(details.tier1 && details.tier2 && details.valid && details.patterns);
        assert!(!details.tier3);
        assert!(!report.passed);
        assert!((report.score - 0.8).abs() < 1e-12);
        assert!(report
            .feedback
            .contains("Tier3 crash: interpreter exited with exit status: 0"));
        assert!(!report.feedback.contains("Harness error"));
    }

    #[tokio::test]
    async fn test_infrastructure_fault_is_a_harness_error() {
        let mut sandbox = sandbox();
        sandbox.broken = true;
        let report = Grader::new(Arc::new(sandbox)).grade(HARDENED).await;

        assert!(!report.passed);
        assert_eq!(report.score, 0.0);
        assert!(report.details.is_none());
        assert!(report.feedback.starts_with("Harness error: "));
        assert!(report.feedback.contains("driver vanished"));
    }
}
