//! Exact solver: builds the constraint model, warm-starts it from a hint,
//! and runs a budgeted branch-and-bound search.

mod model;
mod search;
mod termination;

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::SolverSettings;
use crate::error::{ScheduleError, Stage};
use crate::hints::{self, HintTable};
use crate::models::{Schedule, Time};
use crate::pruning::PrunedProblem;
use crate::validation;
use crate::{log_changes, log_checks};

pub use model::CpModel;
pub use search::ObjectiveKey;
pub use termination::{Budget, StopReason};

/// Lifecycle and verdict of an exact solve.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SolverStatus {
    NotStarted,
    Running,
    /// Search exhausted; the schedule is provably optimal.
    SolvedOptimal,
    /// A schedule was found but optimality was not proven.
    SolvedFeasible,
    /// Search exhausted without any schedule within the horizon.
    Infeasible,
    /// The wall-clock budget ran out.
    TimedOut,
    /// A progress listener asked the search to stop.
    Cancelled,
}

impl SolverStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SolverStatus::NotStarted => "NOT_STARTED",
            SolverStatus::Running => "RUNNING",
            SolverStatus::SolvedOptimal => "SOLVED_OPTIMAL",
            SolverStatus::SolvedFeasible => "SOLVED_FEASIBLE",
            SolverStatus::Infeasible => "INFEASIBLE",
            SolverStatus::TimedOut => "TIMED_OUT",
            SolverStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn is_solved(&self) -> bool {
        matches!(
            self,
            SolverStatus::SolvedOptimal | SolverStatus::SolvedFeasible
        )
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, SolverStatus::NotStarted | SolverStatus::Running)
    }
}

impl std::fmt::Display for SolverStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Receives the incumbent objective whenever the search improves it.
///
/// `elapsed_fraction` is the share of the time budget used so far. Returning
/// false cancels the search; cancellation is only observed here.
pub trait ProgressListener: Send {
    fn on_improved(&mut self, objective: Time, elapsed_fraction: f64) -> bool;
}

impl<F> ProgressListener for F
where
    F: FnMut(Time, f64) -> bool + Send,
{
    fn on_improved(&mut self, objective: Time, elapsed_fraction: f64) -> bool {
        self(objective, elapsed_fraction)
    }
}

/// Listener that ignores progress and never cancels.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoProgress;

impl ProgressListener for NoProgress {
    fn on_improved(&mut self, _objective: Time, _elapsed_fraction: f64) -> bool {
        true
    }
}

/// Search statistics of one solve.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchStats {
    pub nodes_explored: u64,
    pub elapsed: Duration,
    pub workers: usize,
    /// Whether the hint produced the initial incumbent.
    pub seeded_from_hint: bool,
}

/// Result of an exact solve.
#[derive(Clone, Debug, PartialEq)]
pub struct SolveOutcome {
    /// Best schedule found, sorted by task id; empty if none.
    pub schedule: Schedule,
    pub status: SolverStatus,
    /// Makespan of `schedule`, if one was found.
    pub objective: Option<Time>,
    pub stats: SearchStats,
}

/// Exact solver over a pruned problem.
///
/// Minimizes makespan, then the sum of start times, then the
/// `(start, resource)` pairs in task id order, so equal inputs give equal
/// schedules when the search completes.
#[derive(Clone, Debug)]
pub struct ExactSolver {
    settings: SolverSettings,
    status: SolverStatus,
}

impl ExactSolver {
    pub fn new(settings: SolverSettings) -> Self {
        Self {
            settings,
            status: SolverStatus::NotStarted,
        }
    }

    pub fn settings(&self) -> &SolverSettings {
        &self.settings
    }

    /// Status of the last solve, `NotStarted` before the first.
    pub fn status(&self) -> SolverStatus {
        self.status
    }

    /// Solve for start times and resources of every active task.
    ///
    /// `horizon` bounds every end time. A hint, complete or partial, is
    /// repaired into the initial incumbent. The listener sees every
    /// improvement and may cancel the search.
    pub fn solve(
        &mut self,
        pruned: &PrunedProblem<'_>,
        horizon: Time,
        hint: Option<&HintTable>,
        listener: &mut dyn ProgressListener,
    ) -> Result<SolveOutcome, ScheduleError> {
        self.settings.validate()?;
        self.status = SolverStatus::Running;
        let result = self.run(pruned, horizon, hint, listener);
        self.status = match &result {
            Ok(outcome) => outcome.status,
            Err(_) => SolverStatus::NotStarted,
        };
        result
    }

    fn run(
        &self,
        pruned: &PrunedProblem<'_>,
        horizon: Time,
        hint: Option<&HintTable>,
        listener: &mut dyn ProgressListener,
    ) -> Result<SolveOutcome, ScheduleError> {
        let verbosity = self.settings.verbosity;
        let model = CpModel::build(pruned, horizon);
        let mut stats = SearchStats {
            workers: self.settings.worker_count,
            ..SearchStats::default()
        };

        log_checks!(
            verbosity,
            "Model: {} tasks, {} resources, {} precedence links, horizon {}",
            model.task_count(),
            model.resource_count(),
            model.precedence_count(),
            horizon
        );

        if model.task_count() == 0 {
            return Ok(SolveOutcome {
                schedule: Schedule::new(),
                status: SolverStatus::SolvedOptimal,
                objective: Some(0),
                stats,
            });
        }
        if let Some(task) = model.empty_domain() {
            log_changes!(
                verbosity,
                "Task {} cannot finish within horizon {}",
                model.task_id(task),
                horizon
            );
            return Ok(SolveOutcome {
                schedule: Schedule::new(),
                status: SolverStatus::Infeasible,
                objective: None,
                stats,
            });
        }

        let seed = match hint {
            Some(table) => {
                let vars = hints::encode(table, &model, pruned.snapshot())?;
                search::seed_from_hint(&model, &vars)
            }
            None => None,
        };
        stats.seeded_from_hint = seed.is_some();
        if let Some(seed) = &seed {
            log_changes!(
                verbosity,
                "Warm start from hint: makespan {}",
                seed.key.makespan
            );
        }

        let limits = search::SearchLimits {
            time_limit: self.settings.time_budget(),
            node_limit: self.settings.node_limit,
            workers: self.settings.worker_count,
            verbosity,
        };
        let outcome = search::run(&model, seed, &limits, listener)?;
        stats.nodes_explored = outcome.nodes;
        stats.elapsed = outcome.elapsed;

        let status = match (outcome.stop, outcome.best.is_some()) {
            (None, true) => SolverStatus::SolvedOptimal,
            (None, false) => SolverStatus::Infeasible,
            (Some(StopReason::NodeLimit), true) => SolverStatus::SolvedFeasible,
            (Some(StopReason::NodeLimit), false) | (Some(StopReason::TimeBudget), _) => {
                SolverStatus::TimedOut
            }
            (Some(StopReason::Cancelled), _) => SolverStatus::Cancelled,
        };

        let (schedule, objective) = match outcome.best {
            Some(best) => {
                let schedule = hints::decode(&best.vars, &model).to_schedule();
                (schedule, Some(best.key.makespan))
            }
            None => (Schedule::new(), None),
        };

        if !schedule.is_empty() {
            let violations = validation::verify_assignments(pruned.snapshot(), &schedule);
            if let Some(first) = violations.first() {
                return Err(ScheduleError::Stage {
                    stage: Stage::Solve,
                    message: format!("solver produced an invalid schedule: {}", first),
                });
            }
        }

        log_changes!(
            verbosity,
            "Exact solve finished: {} (objective {:?}, {} nodes)",
            status,
            objective,
            stats.nodes_explored
        );

        Ok(SolveOutcome {
            schedule,
            status,
            objective,
            stats,
        })
    }
}
