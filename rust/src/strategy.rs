//! Common interface over the two scheduling stages.

use crate::error::ScheduleError;
use crate::heuristic::{serial_bound, ListScheduler};
use crate::hints::HintTable;
use crate::models::{RemovedTask, Schedule, Time};
use crate::pruning::PrunedProblem;
use crate::solver::{ExactSolver, NoProgress, ProgressListener, SearchStats, SolverStatus};

/// Optional inputs to a planning call.
#[derive(Default)]
pub struct PlanRequest<'a> {
    /// Upper bound on end times. Strategies pick their own when absent.
    pub horizon: Option<Time>,
    pub hint: Option<&'a HintTable>,
    pub listener: Option<&'a mut dyn ProgressListener>,
}

/// What a strategy produced.
#[derive(Clone, Debug, PartialEq)]
pub struct Plan {
    pub schedule: Schedule,
    pub status: SolverStatus,
    pub objective: Option<Time>,
    /// Tasks this strategy removed beyond those already pruned.
    pub removed: Vec<RemovedTask>,
    /// Tasks it could not place, sorted by id.
    pub unplaced: Vec<String>,
    pub horizon: Time,
    /// Contention-free makespan, when the strategy computes one.
    pub relaxed_makespan: Option<Time>,
    pub stats: SearchStats,
}

/// A way of turning a pruned problem into a schedule.
pub trait SchedulingStrategy {
    fn name(&self) -> &'static str;

    fn plan(
        &mut self,
        problem: &PrunedProblem<'_>,
        request: PlanRequest<'_>,
    ) -> Result<Plan, ScheduleError>;
}

impl SchedulingStrategy for ListScheduler {
    fn name(&self) -> &'static str {
        "list_heuristic"
    }

    /// A complete pass is `SolvedFeasible`; one that left tasks unplaced is
    /// `Infeasible` from the heuristic's point of view, with a partial schedule.
    fn plan(
        &mut self,
        problem: &PrunedProblem<'_>,
        _request: PlanRequest<'_>,
    ) -> Result<Plan, ScheduleError> {
        let outcome = self.schedule(problem);
        let complete = outcome.is_complete();
        Ok(Plan {
            objective: complete.then(|| outcome.hint.makespan()),
            status: if complete {
                SolverStatus::SolvedFeasible
            } else {
                SolverStatus::Infeasible
            },
            schedule: outcome.hint,
            removed: outcome.removed,
            unplaced: outcome.unplaced,
            horizon: outcome.horizon,
            relaxed_makespan: Some(outcome.relaxed_makespan),
            stats: SearchStats {
                workers: 1,
                ..SearchStats::default()
            },
        })
    }
}

impl SchedulingStrategy for ExactSolver {
    fn name(&self) -> &'static str {
        "exact_branch_and_bound"
    }

    /// Without a horizon, tasks run back to back after every blackout,
    /// capped by the planning horizon.
    fn plan(
        &mut self,
        problem: &PrunedProblem<'_>,
        request: PlanRequest<'_>,
    ) -> Result<Plan, ScheduleError> {
        let horizon = request.horizon.unwrap_or_else(|| {
            let bound = serial_bound(problem.snapshot(), problem.order().iter().copied());
            self.settings()
                .planning_horizon
                .map_or(bound, |h| bound.min(h))
        });
        let mut no_progress = NoProgress;
        let listener: &mut dyn ProgressListener = match request.listener {
            Some(listener) => listener,
            None => &mut no_progress,
        };
        let outcome = self.solve(problem, horizon, request.hint, listener)?;
        let mut unplaced: Vec<String> = Vec::new();
        if outcome.schedule.is_empty() {
            unplaced.extend(
                problem
                    .order()
                    .iter()
                    .map(|&t| problem.snapshot().task(t).id.clone()),
            );
            unplaced.sort();
        }
        Ok(Plan {
            schedule: outcome.schedule,
            status: outcome.status,
            objective: outcome.objective,
            removed: Vec::new(),
            unplaced,
            horizon,
            relaxed_makespan: None,
            stats: outcome.stats,
        })
    }
}
