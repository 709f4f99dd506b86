//! Configuration for evaluation runs.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::scaffold::AgentConfig;

/// How trials are scheduled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// Start every trial at once and report them as they complete.
    #[default]
    Concurrent,
    /// Run trials one after another in index order.
    Sequential,
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionMode::Concurrent => write!(f, "concurrent"),
            ExecutionMode::Sequential => write!(f, "sequential"),
        }
    }
}

/// Pass-rate band the benchmark is calibrated for. Advisory only.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TargetBand {
    pub min: f64,
    pub max: f64,
}

impl TargetBand {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// Whether `pass_rate` (a fraction) falls inside the band, inclusive.
    pub fn contains(&self, pass_rate: f64) -> bool {
        (self.min..=self.max).contains(&pass_rate)
    }
}

impl Default for TargetBand {
    fn default() -> Self {
        Self::new(0.10, 0.40)
    }
}

impl fmt::Display for TargetBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.0}-{:.0}%", self.min * 100.0, self.max * 100.0)
    }
}

/// Configuration for an evaluation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Number of independent trials.
    pub num_runs: usize,
    /// Trial scheduling.
    pub mode: ExecutionMode,
    /// Settings for each trial's agent loop.
    pub agent: AgentConfig,
    /// Pass-rate band reported against.
    pub target: TargetBand,
}

impl RunConfig {
    /// Creates a new run configuration with defaults.
    pub fn new(num_runs: usize) -> Self {
        Self {
            num_runs,
            mode: ExecutionMode::default(),
            agent: AgentConfig::default(),
            target: TargetBand::default(),
        }
    }

    /// Sets the execution mode.
    pub fn with_mode(mut self, mode: ExecutionMode) -> Self {
        self.mode = mode;
        self
    }

    /// Sets the agent configuration.
    pub fn with_agent(mut self, agent: AgentConfig) -> Self {
        self.agent = agent;
        self
    }

    /// Sets the target band.
    pub fn with_target(mut self, target: TargetBand) -> Self {
        self.target = target;
        self
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self::new(10)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_config_defaults() {
        let config = RunConfig::default();
        assert_eq!(config.num_runs, 10);
        assert_eq!(config.mode, ExecutionMode::Concurrent);
        assert_eq!(config.agent.max_steps, 18);
        assert_eq!(config.target, TargetBand::new(0.10, 0.40));
    }

    #[test]
    fn test_run_config_builder() {
        let config = RunConfig::new(3)
            .with_mode(ExecutionMode::Sequential)
            .with_agent(AgentConfig::new().with_max_steps(5))
            .with_target(TargetBand::new(0.2, 0.5));

        assert_eq!(config.num_runs, 3);
        assert_eq!(config.mode, ExecutionMode::Sequential);
        assert_eq!(config.agent.max_steps, 5);
        assert_eq!(config.target.max, 0.5);
    }

    #[test]
    fn test_target_band_is_inclusive() {
        let band = TargetBand::default();
        assert!(band.contains(0.10));
        assert!(band.contains(0.40));
        assert!(band.contains(0.25));
        assert!(!band.contains(0.0));
        assert!(!band.contains(0.5));
        assert_eq!(band.to_string(), "10-40%");
    }

    #[test]
    fn test_execution_mode_display() {
        assert_eq!(ExecutionMode::Concurrent.to_string(), "concurrent");
        assert_eq!(ExecutionMode::Sequential.to_string(), "sequential");
    }
}
