//! Error types for the scheduling pipeline.

use std::fmt;
use thiserror::Error;

/// Pipeline stage a failure originated from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Stage {
    Prune,
    Heuristic,
    HintConversion,
    Solve,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Prune => "prune",
            Stage::Heuristic => "heuristic",
            Stage::HintConversion => "hint_conversion",
            Stage::Solve => "solve",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that can occur while building or solving a scheduling problem.
///
/// Input variants are fatal: nothing is computed and no partial result is
/// returned. `Stage` wraps any other failure with the stage it came from.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScheduleError {
    #[error("Duplicate task id: {0}")]
    DuplicateTask(String),
    #[error("Duplicate resource id: {0}")]
    DuplicateResource(String),
    #[error("Task {task} has non-positive duration {duration}")]
    NonPositiveDuration { task: String, duration: i64 },
    #[error("Task {0} has no acceptable ranks")]
    EmptyRankSet(String),
    #[error("Task {0} lists itself as a predecessor")]
    SelfDependency(String),
    #[error("Task {task} references unknown predecessor {predecessor}")]
    UnknownPredecessor { task: String, predecessor: String },
    #[error("Unknown resource: {0}")]
    UnknownResource(String),
    #[error("Malformed calendar for resource {resource}: {reason}")]
    MalformedCalendar { resource: String, reason: String },
    #[error("Timeline overflow: {0} exceeds the supported maximum time")]
    TimelineOverflow(String),
    #[error("Circular dependency detected among tasks: {}", .0.join(", "))]
    CircularDependency(Vec<String>),
    #[error("Invalid settings: {0}")]
    InvalidSettings(String),
    #[error("Invalid hint: {0}")]
    InvalidHint(String),
    #[error("{stage} stage failed: {message}")]
    Stage { stage: Stage, message: String },
}

impl ScheduleError {
    /// Whether this is a fatal input error (malformed tasks, resources,
    /// calendars, settings, or cyclic precedence).
    pub fn is_input_error(&self) -> bool {
        !matches!(
            self,
            ScheduleError::InvalidHint(_) | ScheduleError::Stage { .. }
        )
    }

    /// Wrap this error with the stage it surfaced in.
    ///
    /// Errors that already carry a stage are returned unchanged.
    pub fn in_stage(self, stage: Stage) -> Self {
        match self {
            ScheduleError::Stage { .. } => self,
            other => ScheduleError::Stage {
                stage,
                message: other.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_message_lists_tasks() {
        let err = ScheduleError::CircularDependency(vec!["A".to_string(), "B".to_string()]);
        assert_eq!(
            err.to_string(),
            "Circular dependency detected among tasks: A, B"
        );
        assert!(err.is_input_error());
    }

    #[test]
    fn test_in_stage_wraps_once() {
        let err = ScheduleError::InvalidHint("task Q is unknown".to_string())
            .in_stage(Stage::HintConversion)
            .in_stage(Stage::Solve);
        assert_eq!(
            err,
            ScheduleError::Stage {
                stage: Stage::HintConversion,
                message: "Invalid hint: task Q is unknown".to_string(),
            }
        );
        assert!(!err.is_input_error());
    }
}
