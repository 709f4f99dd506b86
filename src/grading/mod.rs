//! Multi-tier grading of submitted routines.
//!
//! A submission must define `process_batch(events, state)`. The harness runs
//! it against four independent scenarios plus a static keyword check:
//!
//! | Check | Scenario |
//! |---|---|
//! | `tier1` | corrupt readings with shuffled timestamps |
//! | `tier2` | a flat segment and a heavy-tailed batch with minority rows |
//! | `tier3` | a 60-event flood into a near-capacity state |
//! | `valid` | five clean events; `mean`/`std`/readings must not be NaN |
//! | `patterns` | guardrail vocabulary in the source text |
//!
//! The score is the fraction of checks passed; a submission passes only when
//! all five hold.

pub mod checks;
pub mod harness;
pub mod scenarios;

pub use checks::{CheckMap, GradeReport, GUARDRAIL_KEYWORDS, SUCCESS_FEEDBACK};
pub use harness::{Grader, ENTRY_POINT};
