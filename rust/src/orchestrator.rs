//! End-to-end scheduling run: prune, heuristic, hint conversion, exact solve.

use serde::{Deserialize, Serialize};

use crate::config::SolverSettings;
use crate::error::{ScheduleError, Stage};
use crate::heuristic::ListScheduler;
use crate::hints::HintTable;
use crate::models::{RemovedTask, Resource, Schedule, Task, Time, UnavailableRange};
use crate::problem::ProblemSnapshot;
use crate::pruning::prune;
use crate::solver::{ExactSolver, NoProgress, ProgressListener, SolverStatus};
use crate::strategy::{PlanRequest, SchedulingStrategy};
use crate::validation;

/// The three input tables plus settings, as a calling layer would send them.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SchedulingRequest {
    pub tasks: Vec<Task>,
    pub resources: Vec<Resource>,
    #[serde(default)]
    pub unavailable: Vec<UnavailableRange>,
    #[serde(default)]
    pub settings: SolverSettings,
}

/// Numbers describing how a run went.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostics {
    /// Makespan of the heuristic hint (of its placed tasks if partial).
    pub hint_makespan: Time,
    pub hint_complete: bool,
    /// Upper bound on end times given to the exact solver.
    pub horizon: Time,
    /// Makespan ignoring resource contention; a lower bound.
    pub relaxed_makespan: Time,
    pub nodes_explored: u64,
    pub elapsed_ms: u64,
    pub workers: usize,
}

/// Result of one run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SchedulingResult {
    /// Assignments sorted by task id; empty if no schedule was found.
    pub schedule: Schedule,
    /// Removed tasks sorted by task id.
    pub removed_tasks: Vec<RemovedTask>,
    pub solver_status: SolverStatus,
    /// Makespan of `schedule`, if one was found.
    pub objective_value: Option<Time>,
    pub diagnostics: Diagnostics,
}

/// Keep input errors as they are; tag anything else with its stage.
fn wrap(err: ScheduleError, stage: Stage) -> ScheduleError {
    match err {
        ScheduleError::InvalidHint(_) => err.in_stage(Stage::HintConversion),
        err if err.is_input_error() => err,
        err => err.in_stage(stage),
    }
}

/// Runs the scheduling pipeline over one input snapshot.
#[derive(Clone, Debug, Default)]
pub struct Orchestrator {
    settings: SolverSettings,
}

impl Orchestrator {
    pub fn new(settings: SolverSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &SolverSettings {
        &self.settings
    }

    /// Schedule the given tables without progress reporting.
    pub fn run(
        &self,
        tasks: Vec<Task>,
        resources: Vec<Resource>,
        unavailable: Vec<UnavailableRange>,
    ) -> Result<SchedulingResult, ScheduleError> {
        self.run_with_progress(tasks, resources, unavailable, &mut NoProgress)
    }

    /// Schedule the given tables, reporting solver improvements to
    /// `listener`, which may cancel the exact stage.
    pub fn run_with_progress(
        &self,
        tasks: Vec<Task>,
        resources: Vec<Resource>,
        unavailable: Vec<UnavailableRange>,
        listener: &mut dyn ProgressListener,
    ) -> Result<SchedulingResult, ScheduleError> {
        self.settings.validate()?;
        let snapshot = ProblemSnapshot::new(tasks, resources, unavailable)?;
        self.run_snapshot(&snapshot, listener)
    }

    /// Schedule an already validated snapshot. The snapshot is never modified.
    pub fn run_snapshot(
        &self,
        snapshot: &ProblemSnapshot,
        listener: &mut dyn ProgressListener,
    ) -> Result<SchedulingResult, ScheduleError> {
        self.settings.validate()?;
        let verbosity = self.settings.verbosity;

        let pruned = prune(snapshot, verbosity).map_err(|e| wrap(e, Stage::Prune))?;
        tracing::info!(
            stage = Stage::Prune.as_str(),
            tasks = snapshot.task_count(),
            kept = pruned.active_count(),
            removed = pruned.removed().len(),
            "stage finished"
        );

        let mut heuristic = ListScheduler::new(&self.settings);
        let rough = heuristic
            .plan(&pruned, PlanRequest::default())
            .map_err(|e| wrap(e, Stage::Heuristic))?;
        let hint_complete = rough.unplaced.is_empty();
        tracing::info!(
            stage = Stage::Heuristic.as_str(),
            strategy = heuristic.name(),
            makespan = rough.schedule.makespan(),
            complete = hint_complete,
            removed = rough.removed.len(),
            horizon = rough.horizon,
            "stage finished"
        );

        let hint =
            HintTable::from_schedule(&rough.schedule).map_err(|e| wrap(e, Stage::HintConversion))?;
        let narrowed = pruned.without(&rough.removed);
        tracing::info!(
            stage = Stage::HintConversion.as_str(),
            rows = hint.len(),
            "stage finished"
        );

        let mut solver = ExactSolver::new(self.settings.clone());
        let plan = solver
            .plan(
                &narrowed,
                PlanRequest {
                    horizon: Some(rough.horizon),
                    hint: Some(&hint),
                    listener: Some(listener),
                },
            )
            .map_err(|e| wrap(e, Stage::Solve))?;
        tracing::info!(
            stage = Stage::Solve.as_str(),
            strategy = solver.name(),
            status = plan.status.as_str(),
            objective = ?plan.objective,
            nodes = plan.stats.nodes_explored,
            "stage finished"
        );

        if !plan.schedule.is_empty() {
            let violations =
                validation::verify_coverage(snapshot, &plan.schedule, narrowed.removed());
            if let Some(first) = violations.first() {
                return Err(ScheduleError::Stage {
                    stage: Stage::Solve,
                    message: format!("incomplete schedule: {}", first),
                });
            }
        }

        Ok(SchedulingResult {
            schedule: plan.schedule,
            removed_tasks: narrowed.removed().to_vec(),
            solver_status: plan.status,
            objective_value: plan.objective,
            diagnostics: Diagnostics {
                hint_makespan: hint.makespan(),
                hint_complete,
                horizon: rough.horizon,
                relaxed_makespan: rough.relaxed_makespan.unwrap_or(0),
                nodes_explored: plan.stats.nodes_explored,
                elapsed_ms: u64::try_from(plan.stats.elapsed.as_millis()).unwrap_or(u64::MAX),
                workers: plan.stats.workers,
            },
        })
    }
}

/// Run a full request with its own settings.
pub fn schedule(request: SchedulingRequest) -> Result<SchedulingResult, ScheduleError> {
    Orchestrator::new(request.settings).run(request.tasks, request.resources, request.unavailable)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RemovalReason;

    fn settings() -> SolverSettings {
        SolverSettings::default().with_time_budget(30.0)
    }

    #[test]
    fn test_pipeline_end_to_end() {
        let result = Orchestrator::new(settings())
            .run(
                vec![
                    Task::new("A", 3).with_rank("op"),
                    Task::new("B", 3).with_rank("op"),
                    Task::new("C", 2).with_rank("op").with_predecessor("A"),
                    Task::new("E", 1).with_rank("Z"),
                ],
                vec![Resource::new("R1", "op"), Resource::new("R2", "op")],
                vec![],
            )
            .unwrap();

        assert_eq!(result.solver_status, SolverStatus::SolvedOptimal);
        assert_eq!(result.objective_value, Some(5));
        assert_eq!(result.schedule.len(), 3);
        assert_eq!(
            result.removed_tasks,
            vec![RemovedTask::new("E", RemovalReason::NoCompatibleResource)]
        );
        assert!(result.diagnostics.hint_complete);
        assert_eq!(result.diagnostics.horizon, 5);
        assert_eq!(result.diagnostics.relaxed_makespan, 5);
    }

    #[test]
    fn test_input_errors_propagate_unchanged() {
        let err = Orchestrator::new(settings())
            .run(
                vec![
                    Task::new("A", 1).with_rank("op").with_predecessor("B"),
                    Task::new("B", 1).with_rank("op").with_predecessor("A"),
                ],
                vec![Resource::new("R", "op")],
                vec![],
            )
            .unwrap_err();
        assert_eq!(
            err,
            ScheduleError::CircularDependency(vec!["A".to_string(), "B".to_string()])
        );

        let err = Orchestrator::new(settings().with_workers(0))
            .run(vec![], vec![], vec![])
            .unwrap_err();
        assert!(matches!(err, ScheduleError::InvalidSettings(_)));

        let err = Orchestrator::new(settings().with_time_budget(1e20))
            .run(vec![], vec![], vec![])
            .unwrap_err();
        assert!(matches!(err, ScheduleError::InvalidSettings(_)));

        let err = Orchestrator::new(settings())
            .run(
                vec![Task::new("A", 1).with_rank("op")],
                vec![Resource::new("R", "op")],
                vec![UnavailableRange::new("R", 3, Time::MAX)],
            )
            .unwrap_err();
        assert!(matches!(err, ScheduleError::MalformedCalendar { .. }));
    }

    #[test]
    fn test_wrap_tags_stage_failures_only() {
        let input = ScheduleError::UnknownResource("R".to_string());
        assert_eq!(wrap(input.clone(), Stage::Solve), input);

        let hint = wrap(ScheduleError::InvalidHint("x".to_string()), Stage::Solve);
        assert!(matches!(
            hint,
            ScheduleError::Stage {
                stage: Stage::HintConversion,
                ..
            }
        ));
    }

    #[test]
    fn test_request_from_json() {
        let request: SchedulingRequest = serde_json::from_str(
            r#"{
                "tasks": [
                    {"id": "A", "duration": 2, "acceptable_ranks": ["op"]},
                    {"id": "B", "duration": 1, "acceptable_ranks": ["op"], "predecessors": ["A"]}
                ],
                "resources": [{"id": "R", "rank": "op"}],
                "settings": {"time_budget_seconds": 5.0}
            }"#,
        )
        .unwrap();
        let result = schedule(request).unwrap();
        assert_eq!(result.objective_value, Some(3));

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["solver_status"], "SOLVED_OPTIMAL");
        assert_eq!(json["schedule"]["assignments"][1]["start"], 2);
    }
}
