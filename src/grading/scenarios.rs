//! Synthetic inputs for each grading tier.
//!
//! Every function builds a new value, so no tier ever sees state left over
//! from another.

use crate::sandbox::Value;

/// Ingest limit carried by every state.
pub const STATE_LIMIT: i64 = 200;

/// Capacity of a fresh state's buffer and the bound tier 3 enforces.
pub const BUFFER_CAPACITY: usize = 240;

/// Capacity of the pre-loaded buffer fed to tier 3.
pub const HOT_BUFFER_CAPACITY: usize = 260;

/// Records already sitting in the pre-loaded buffer.
pub const HOT_BUFFER_FILL: i64 = 150;

/// `seen` counter of the pre-loaded state, just under the limit.
pub const HOT_SEEN: i64 = 190;

const Z_CUTOFF: i64 = 3;

fn event(ts: i64, reading: impl Into<Value>, tag: &str) -> Value {
    Value::dict([
        ("ts", Value::Int(ts)),
        ("reading", reading.into()),
        ("tag", Value::from(tag)),
    ])
}

/// `{seen: 0, limit: 200, buffer: deque(maxlen=240), z_cutoff: 3}`
pub fn fresh_state() -> Value {
    Value::dict([
        ("seen", Value::Int(0)),
        ("limit", Value::Int(STATE_LIMIT)),
        ("buffer", Value::deque(Vec::new(), BUFFER_CAPACITY)),
        ("z_cutoff", Value::Int(Z_CUTOFF)),
    ])
}

/// Tier 1: a NaN string, a missing reading, garbage text and two valid
/// readings, all with shuffled timestamps.
pub fn integrity_events() -> Value {
    Value::List(vec![
        event(3, " NaN", "sensor"),
        event(2, "5.4", "healthy"),
        event(1, None::<&str>, "sensor"),
        event(5, "bad", "sensor"),
        event(4, "7.2", "healthy"),
    ])
}

/// Tier 2: six identical readings.
pub fn flat_events() -> Value {
    Value::List((0..6).map(|i| event(i, 9.0, "core")).collect())
}

/// Tier 2: a tight core, two extreme spikes and two minority readings just
/// below the core.
pub fn heavy_tail_events() -> Value {
    let core = (0..6).map(|i| event(i, 10.0 + 0.1 * i as f64, "core"));
    let spikes = (0..2).map(|i| event(100 + i, 1000.0, "spike"));
    let minority = (0..2).map(|i| event(200 + i, 9.5, "minority"));
    Value::List(core.chain(spikes).chain(minority).collect())
}

/// Tier 3: sixty streaming events.
pub fn flood_events() -> Value {
    Value::List(
        (0..60)
            .map(|i| event(i, (i % 7) as f64, "stream"))
            .collect(),
    )
}

/// Tier 3: a state close to its limit whose buffer already holds 150 of 260.
pub fn hot_state() -> Value {
    let buffered = (0..HOT_BUFFER_FILL)
        .map(|k| Value::dict([("ts", Value::Int(-k))]))
        .collect();
    Value::dict([
        ("seen", Value::Int(HOT_SEEN)),
        ("limit", Value::Int(STATE_LIMIT)),
        ("buffer", Value::deque(buffered, HOT_BUFFER_CAPACITY)),
        ("z_cutoff", Value::Int(Z_CUTOFF)),
    ])
}

/// Validity: five well-formed events.
pub fn sanity_events() -> Value {
    Value::List((0..5).map(|i| event(i, i as f64, "test")).collect())
}
