//! Task prompt for the repair agent.
//!
//! The defective reference routine is embedded verbatim; the agent is asked
//! to return a hardened `process_batch(events, state)`.

/// Defective reference routine shown to the agent.
///
/// Fails every tier: it crashes on unparseable readings, divides by a zero
/// standard deviation on flat input and grows its buffer without bound.
pub const BUGGY_PIPELINE: &str = r#"
import math, statistics as stats

def process_batch(events, state):
    if state is None:
        state = {}
    state.setdefault("seen", 0)
    state.setdefault("limit", 500)
    state.setdefault("buffer", [])
    readings = [float(e["reading"]) for e in events]
    mean = sum(readings) / len(readings)
    std = stats.pstdev(readings)
    scores = [(x - mean) / std for x in readings]
    clean = [ev for ev, score in zip(events, scores) if abs(score) < state.get("z_cutoff", 3)]
    state["seen"] += len(events)
    if state["seen"] > state["limit"]:
        state["buffer"].extend(clean)
    return {"clean": clean, "mean": mean, "std": std, "alerts": [], "state": state}
"#;

/// Build the task prompt around a reference routine.
pub fn build_prompt_for(pipeline: &str) -> String {
    format!(
        r#"You are the FIXER agent on call for a production ML preprocessing service that is failing in cascades. Investigate the pipeline below and harden it against THREE tiers of bugs. A fix for a later tier must not regress an earlier one.

```python
{pipeline}
```

TIER 1 - Data integrity: survive NaN storms, string injections and timestamp drift. Clean output must stay sorted by timestamp and carry numeric readings.
TIER 2 - Statistical stability: no zero-division on flat segments; trim heavy-tail spikes without deleting legitimate minority patterns.
TIER 3 - Resilience: stop buffer blowups, add telemetry and backpressure, keep state bounded across retries.

Requirements:
- Put guardrails in front of risky math.
- Keep good data while dropping corrupt records.
- Emit telemetry describing the safeguards that fired (backpressure, monitoring).
- Use `python_expression` to experiment, then call `submit_code` with a complete `process_batch(events, state)` implementation only.
"#
    )
}

/// Build the task prompt around [`BUGGY_PIPELINE`].
pub fn build_prompt() -> String {
    build_prompt_for(BUGGY_PIPELINE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_embeds_pipeline() {
        let prompt = build_prompt();
        assert!(prompt.contains("def process_batch(events, state):"));
        assert!(prompt.contains("TIER 3"));
        assert!(prompt.contains("submit_code"));
    }

    #[test]
    fn test_prompt_for_custom_pipeline() {
        let prompt = build_prompt_for("def process_batch(e, s): return {}");
        assert!(prompt.contains("def process_batch(e, s): return {}"));
        assert!(!prompt.contains("pstdev"));
    }
}
