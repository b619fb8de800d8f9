//! Configuration types for the scheduling system.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::ScheduleError;
use crate::models::Time;

/// Budget and behaviour settings for one scheduling run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverSettings {
    /// Wall-clock budget for the exact solver, in seconds.
    pub time_budget_seconds: f64,
    /// Threads used by the exact solver's search.
    pub worker_count: usize,
    /// Deterministic work budget: maximum search nodes (None = unlimited).
    pub node_limit: Option<u64>,
    /// Latest end time any task may have (None = unbounded timeline).
    pub planning_horizon: Option<Time>,
    /// Verbosity level: 0=silent, 1=changes, 2=checks, 3=debug.
    pub verbosity: u8,
}

impl Default for SolverSettings {
    fn default() -> Self {
        Self {
            time_budget_seconds: 10.0,
            worker_count: 1,
            node_limit: None,
            planning_horizon: None,
            verbosity: 0,
        }
    }
}

impl SolverSettings {
    pub fn with_time_budget(mut self, seconds: f64) -> Self {
        self.time_budget_seconds = seconds;
        self
    }

    pub fn with_workers(mut self, worker_count: usize) -> Self {
        self.worker_count = worker_count;
        self
    }

    pub fn with_node_limit(mut self, node_limit: u64) -> Self {
        self.node_limit = Some(node_limit);
        self
    }

    pub fn with_planning_horizon(mut self, horizon: Time) -> Self {
        self.planning_horizon = Some(horizon);
        self
    }

    pub fn with_verbosity(mut self, verbosity: u8) -> Self {
        self.verbosity = verbosity;
        self
    }

    pub fn validate(&self) -> Result<(), ScheduleError> {
        if !self.time_budget_seconds.is_finite() || self.time_budget_seconds < 0.0 {
            return Err(ScheduleError::InvalidSettings(format!(
                "time_budget_seconds must be a finite non-negative number, got {}",
                self.time_budget_seconds
            )));
        }
        if let Err(err) = Duration::try_from_secs_f64(self.time_budget_seconds) {
            return Err(ScheduleError::InvalidSettings(format!(
                "time_budget_seconds {} is out of range: {}",
                self.time_budget_seconds, err
            )));
        }
        if self.worker_count == 0 {
            return Err(ScheduleError::InvalidSettings(
                "worker_count must be at least 1".to_string(),
            ));
        }
        if let Some(horizon) = self.planning_horizon {
            if horizon <= 0 {
                return Err(ScheduleError::InvalidSettings(format!(
                    "planning_horizon must be positive, got {}",
                    horizon
                )));
            }
        }
        Ok(())
    }

    /// The time budget as a `Duration`, saturating at `Duration::MAX`.
    pub fn time_budget(&self) -> Duration {
        Duration::try_from_secs_f64(self.time_budget_seconds.max(0.0)).unwrap_or(Duration::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        let settings = SolverSettings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.time_budget(), Duration::from_secs(10));
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(SolverSettings::default().with_workers(0).validate().is_err());
        assert!(SolverSettings::default()
            .with_time_budget(f64::NAN)
            .validate()
            .is_err());
        assert!(SolverSettings::default()
            .with_time_budget(-1.0)
            .validate()
            .is_err());
        assert!(SolverSettings::default()
            .with_planning_horizon(0)
            .validate()
            .is_err());
    }

    #[test]
    fn test_rejects_budget_beyond_duration() {
        let settings = SolverSettings::default().with_time_budget(1e20);
        assert!(matches!(
            settings.validate(),
            Err(ScheduleError::InvalidSettings(_))
        ));
        assert_eq!(settings.time_budget(), Duration::MAX);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let settings: SolverSettings =
            serde_json::from_str(r#"{"time_budget_seconds": 2.5, "worker_count": 4}"#).unwrap();
        assert_eq!(settings.worker_count, 4);
        assert_eq!(settings.node_limit, None);
        assert_eq!(settings.verbosity, 0);
    }
}
