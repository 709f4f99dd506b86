//! Tier checks over routine results and the report they roll up into.
//!
//! A check returns `Ok(passed)` or `Err(message)` when inspecting the result
//! hits something a Python caller would have crashed on (calling `.get` on a
//! list, comparing a string with a number). Crashes are recorded as tier
//! faults exactly like exceptions raised by the routine itself.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use super::scenarios::BUFFER_CAPACITY;
use crate::sandbox::Value;

/// Outcome of inspecting one tier result.
pub type CheckResult = Result<bool, String>;

/// Vocabulary taken as evidence of defensive code.
pub const GUARDRAIL_KEYWORDS: [&str; 5] =
    ["guardrail", "telemetry", "monitor", "backpressure", "fallback"];

/// Distinct keywords required for the pattern check.
pub const GUARDRAIL_MIN_HITS: usize = 2;

/// Readings at or above this value count as unfiltered spikes.
pub const SPIKE_CEILING: i64 = 900;

/// Feedback for a submission that passes every check.
pub const SUCCESS_FEEDBACK: &str = "✓ All tiers stable";

/// Characters of an exception message kept in a crash issue.
pub const CRASH_MESSAGE_LIMIT: usize = 40;

/// Characters of a harness failure kept in feedback.
pub const HARNESS_MESSAGE_LIMIT: usize = 80;

/// Pass/fail per check, in evaluation order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckMap {
    pub tier1: bool,
    pub tier2: bool,
    pub tier3: bool,
    pub valid: bool,
    pub patterns: bool,
}

impl CheckMap {
    /// Named outcomes in evaluation order.
    pub fn entries(&self) -> [(&'static str, bool); 5] {
        [
            ("tier1", self.tier1),
            ("tier2", self.tier2),
            ("tier3", self.tier3),
            ("valid", self.valid),
            ("patterns", self.patterns),
        ]
    }

    pub fn passed_count(&self) -> usize {
        self.entries().iter().filter(|(_, ok)| *ok).count()
    }

    /// Fraction of checks that passed.
    pub fn score(&self) -> f64 {
        self.passed_count() as f64 / self.entries().len() as f64
    }

    pub fn all_passed(&self) -> bool {
        self.entries().iter().all(|(_, ok)| *ok)
    }
}

/// Grading verdict for one submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradeReport {
    pub passed: bool,
    /// Fraction of checks passed, in `[0, 1]`.
    pub score: f64,
    pub feedback: String,
    /// Present whenever the tiers actually ran.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<CheckMap>,
}

impl GradeReport {
    /// Build the report for a completed tier run.
    pub fn from_checks(checks: CheckMap, issues: &[String]) -> Self {
        let passed = checks.all_passed();
        let feedback = if passed {
            SUCCESS_FEEDBACK.to_string()
        } else {
            failure_feedback(issues)
        };
        Self {
            passed,
            score: checks.score(),
            feedback,
            details: Some(checks),
        }
    }

    /// A submission rejected before any tier ran.
    pub fn rejected(feedback: impl Into<String>) -> Self {
        Self {
            passed: false,
            score: 0.0,
            feedback: feedback.into(),
            details: None,
        }
    }

    /// Grading itself broke down.
    pub fn harness_error(message: &str) -> Self {
        Self::rejected(format!(
            "Harness error: {}",
            truncate(message, HARNESS_MESSAGE_LIMIT)
        ))
    }
}

/// `"✗ "` followed by the distinct issues in first-seen order.
pub fn failure_feedback(issues: &[String]) -> String {
    let mut distinct: Vec<&str> = Vec::with_capacity(issues.len());
    for issue in issues {
        if !distinct.contains(&issue.as_str()) {
            distinct.push(issue);
        }
    }
    format!("✗ {}", distinct.join("; "))
}

/// Keep at most `limit` characters.
pub fn truncate(text: &str, limit: usize) -> &str {
    match text.char_indices().nth(limit) {
        Some((index, _)) => &text[..index],
        None => text,
    }
}

/// Crash issue line for a tier, e.g. `Tier1 crash: division by zero`.
pub fn crash_issue(label: &str, message: &str) -> String {
    format!("{}: {}", label, truncate(message, CRASH_MESSAGE_LIMIT))
}

/// Static check: at least two distinct guardrail keywords appear in the
/// lower-cased source.
pub fn guardrail_patterns(source: &str) -> bool {
    let lowered = source.to_lowercase();
    GUARDRAIL_KEYWORDS
        .iter()
        .filter(|keyword| lowered.contains(*keyword))
        .count()
        >= GUARDRAIL_MIN_HITS
}

/// Tier 1: at least two clean rows, two numeric readings, and timestamps of
/// dict rows non-decreasing in output order.
pub fn tier1_integrity(result: &Value) -> CheckResult {
    let clean = lookup(result, "clean")?.unwrap_or(&EMPTY_LIST);
    let rows = match clean {
        Value::List(rows) | Value::Tuple(rows) if rows.len() >= 2 => rows,
        _ => return Ok(false),
    };

    let numeric = rows
        .iter()
        .filter(|row| row.get("reading").is_some_and(Value::is_number))
        .count();
    let stamps: Vec<&Value> = rows
        .iter()
        .filter(|row| row.is_dict())
        .map(|row| row.get("ts").unwrap_or(&Value::None))
        .collect();

    Ok(numeric >= 2 && non_decreasing(&stamps)?)
}

/// Tier 2, zero variance: `clean` is a list with at most one of the six
/// rows dropped, and `std` is neither NaN nor negative.
pub fn tier2_flat(result: &Value, batch_len: usize) -> CheckResult {
    let std = lookup(result, "std")?.unwrap_or(&Value::None);
    let clean = lookup(result, "clean")?.unwrap_or(&EMPTY_LIST);

    let is_list = matches!(clean, Value::List(_));
    let kept = length(clean)?;
    let std_ok = matches!(std.as_number(), Some(s) if !s.is_nan() && s >= 0.0);
    Ok(is_list && kept + 1 >= batch_len && std_ok)
}

/// Tier 2, heavy tail: at least four rows kept, every spike dropped, and at
/// least one minority row kept.
pub fn tier2_heavy(result: &Value) -> CheckResult {
    let clean = lookup(result, "clean")?.unwrap_or(&EMPTY_LIST);
    let enough = matches!(clean, Value::List(rows) if rows.len() >= 4);

    let rows = iterate(clean)?;
    let readings: Vec<&Value> = rows
        .iter()
        .filter(|row| row.is_dict())
        .map(|row| row.get("reading").unwrap_or(&ZERO))
        .collect();
    let Some(highest) = maximum(&readings)? else {
        // Python folds `[] and ...` into a bool accumulator and raises.
        return Err("unsupported operand type(s) for &=: 'bool' and 'list'".to_string());
    };
    let spikes_dropped = compare(highest, &Value::Int(SPIKE_CEILING))? == Some(Ordering::Less);

    let minorities = rows
        .iter()
        .filter(|row| row.get("tag").and_then(Value::as_str) == Some("minority"))
        .count();
    Ok(enough && spikes_dropped && minorities >= 1)
}

/// Tier 3: the returned buffer stays within capacity and any telemetry is a
/// structured record or an explicit `True`.
pub fn tier3_resilience(result: &Value) -> CheckResult {
    let state = lookup(result, "state")?.unwrap_or(&EMPTY_DICT);
    let buffer = lookup(state, "buffer")?.unwrap_or(&EMPTY_LIST);

    let bounded = match buffer {
        Value::Deque { items, .. } | Value::List(items) => items.len() <= BUFFER_CAPACITY,
        _ => false,
    };

    let telemetry_ok = match lookup(result, "telemetry")? {
        None | Some(Value::Dict(_)) | Some(Value::Bool(true)) => true,
        Some(_) => false,
    };

    Ok(bounded && telemetry_ok)
}

/// Validity: `mean` and `std` are real numbers and no clean reading is NaN.
pub fn validity(result: &Value) -> CheckResult {
    let mut valid = true;
    for key in ["mean", "std"] {
        let value = lookup(result, key)?.unwrap_or(&Value::None);
        valid &= value.is_number() && !value.is_nan();
    }

    let clean = lookup(result, "clean")?.unwrap_or(&EMPTY_LIST);
    for row in iterate(clean)? {
        let reading = lookup(&row, "reading")?;
        valid &= !reading.is_some_and(Value::is_nan);
    }
    Ok(valid)
}

static EMPTY_LIST: Value = Value::List(Vec::new());
static ZERO: Value = Value::Int(0);
static EMPTY_DICT: Value = Value::Dict(std::collections::BTreeMap::new());

/// `value.get(key)`, failing the way Python does on a non-dict.
fn lookup<'a>(value: &'a Value, key: &str) -> Result<Option<&'a Value>, String> {
    match value {
        Value::Dict(map) => Ok(map.get(key)),
        other => Err(format!(
            "'{}' object has no attribute 'get'",
            other.type_name()
        )),
    }
}

/// `len(value)`, failing the way Python does on unsized objects.
fn length(value: &Value) -> Result<usize, String> {
    match value {
        Value::List(items) | Value::Tuple(items) | Value::Deque { items, .. } => Ok(items.len()),
        Value::Iterable { items, sized: true, .. } => Ok(items.len()),
        Value::Dict(map) => Ok(map.len()),
        Value::Str(s) => Ok(s.chars().count()),
        other => Err(format!(
            "object of type '{}' has no len()",
            other.type_name()
        )),
    }
}

/// Elements produced by iterating a value; dicts yield their keys.
fn iterate(value: &Value) -> Result<Vec<Value>, String> {
    match value {
        Value::List(items)
        | Value::Tuple(items)
        | Value::Deque { items, .. }
        | Value::Iterable { items, .. } => Ok(items.clone()),
        Value::Dict(map) => Ok(map.keys().cloned().map(Value::Str).collect()),
        Value::Str(s) => Ok(s.chars().map(|c| Value::Str(c.to_string())).collect()),
        other => Err(format!("'{}' object is not iterable", other.type_name())),
    }
}

/// Rich comparison; `None` when the values are unordered (NaN).
fn compare(a: &Value, b: &Value) -> Result<Option<Ordering>, String> {
    match (ordinal(a), ordinal(b)) {
        (Some(x), Some(y)) => Ok(x.partial_cmp(&y)),
        _ => match (a, b) {
            (Value::Str(x), Value::Str(y)) => Ok(Some(x.cmp(y))),
            _ => Err(format!(
                "'<' not supported between instances of '{}' and '{}'",
                a.type_name(),
                b.type_name()
            )),
        },
    }
}

/// Numeric value for ordering; booleans order as 0 and 1.
fn ordinal(value: &Value) -> Option<f64> {
    match value {
        Value::Bool(b) => Some(f64::from(u8::from(*b))),
        other => other.as_number(),
    }
}

fn non_decreasing(values: &[&Value]) -> Result<bool, String> {
    for pair in values.windows(2) {
        match compare(pair[0], pair[1])? {
            Some(Ordering::Less) | Some(Ordering::Equal) => {}
            _ => return Ok(false),
        }
    }
    Ok(true)
}

/// Largest element, keeping the first on ties or unordered comparisons.
fn maximum<'a>(values: &[&'a Value]) -> Result<Option<&'a Value>, String> {
    let mut best: Option<&'a Value> = None;
    for value in values {
        best = match best {
            None => Some(*value),
            Some(current) if compare(value, current)? == Some(Ordering::Greater) => Some(*value),
            keep => keep,
        };
    }
    Ok(best)
}
