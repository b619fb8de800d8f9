//! Rank-aware greedy list scheduler.

use crate::config::SolverSettings;
use crate::models::{Assignment, RemovalReason, RemovedTask, Schedule, Time};
use crate::problem::ProblemSnapshot;
use crate::pruning::PrunedProblem;
use crate::{log_changes, log_checks, log_debug};

use super::resource_schedule::ResourceSchedule;

/// Output of the greedy pass.
#[derive(Clone, Debug, Default)]
pub struct HeuristicOutcome {
    /// Hint schedule, sorted by task id. Partial if `unplaced` is non-empty.
    pub hint: Schedule,
    /// Upper bound on the optimal makespan, used as the solver's horizon.
    pub horizon: Time,
    /// Makespan if every rank had unlimited resources (a lower bound).
    pub relaxed_makespan: Time,
    /// Tasks found unschedulable at this stage, sorted by task id.
    pub removed: Vec<RemovedTask>,
    /// Tasks that could not be placed within the planning horizon because of
    /// contention, sorted by task id.
    pub unplaced: Vec<String>,
}

impl HeuristicOutcome {
    pub fn is_complete(&self) -> bool {
        self.unplaced.is_empty()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Placement {
    Pending,
    Placed { end: Time },
    Unplaced,
    Removed,
}

/// Greedy list scheduler.
///
/// Tasks are taken in the pruner's topological order, ties by ascending id.
/// Ids are unique, so a task's priority never decides between two ready
/// tasks. Each task goes to the rank-compatible resource
/// offering the earliest completion, at the first free slot that avoids
/// blackouts and earlier assignments. Ties go to the lower resource id.
#[derive(Clone, Debug, Default)]
pub struct ListScheduler {
    planning_horizon: Option<Time>,
    verbosity: u8,
}

impl ListScheduler {
    pub fn new(settings: &SolverSettings) -> Self {
        Self {
            planning_horizon: settings.planning_horizon,
            verbosity: settings.verbosity,
        }
    }

    /// Run the greedy pass over the pruned problem.
    pub fn schedule(&self, pruned: &PrunedProblem<'_>) -> HeuristicOutcome {
        let snapshot = pruned.snapshot();
        let verbosity = self.verbosity;
        let n = snapshot.task_count();

        let calendars: Vec<ResourceSchedule> = snapshot
            .resources()
            .iter()
            .enumerate()
            .map(|(r, res)| ResourceSchedule::new(res.id.clone(), snapshot.calendar(r)))
            .collect();
        let mut schedules = calendars.clone();

        let mut placement = vec![Placement::Pending; n];
        let mut relaxed_end: Vec<Time> = vec![0; n];
        let mut outcome = HeuristicOutcome::default();

        for &task_idx in pruned.order() {
            let task = snapshot.task(task_idx);
            let preds = snapshot.predecessors(task_idx);

            if preds.iter().any(|&p| placement[p] == Placement::Removed) {
                placement[task_idx] = Placement::Removed;
                log_changes!(verbosity, "Removed task {}: predecessor removed", task.id);
                outcome.removed.push(RemovedTask::new(
                    task.id.clone(),
                    RemovalReason::PredecessorRemoved,
                ));
                continue;
            }

            let candidates = snapshot.eligible_resources(task_idx);

            // Contention-free completion: calendar only, predecessors at their
            // own contention-free completion.
            let relaxed_start = preds.iter().map(|&p| relaxed_end[p]).max().unwrap_or(0);
            let relaxed_finish = candidates
                .iter()
                .map(|&r| calendars[r].earliest_slot(relaxed_start, task.duration) + task.duration)
                .min();
            let Some(relaxed_finish) = relaxed_finish else {
                // Pruning guarantees a candidate; treat a gap here as blocked.
                placement[task_idx] = Placement::Removed;
                outcome.removed.push(RemovedTask::new(
                    task.id.clone(),
                    RemovalReason::NoCompatibleResource,
                ));
                continue;
            };
            relaxed_end[task_idx] = relaxed_finish;

            if self.planning_horizon.is_some_and(|h| relaxed_finish > h) {
                placement[task_idx] = Placement::Removed;
                log_changes!(
                    verbosity,
                    "Removed task {}: calendars block it past the planning horizon (earliest finish {})",
                    task.id,
                    relaxed_finish
                );
                outcome.removed.push(RemovedTask::new(
                    task.id.clone(),
                    RemovalReason::CalendarBlocked,
                ));
                continue;
            }
            outcome.relaxed_makespan = outcome.relaxed_makespan.max(relaxed_finish);

            if preds.iter().any(|&p| placement[p] == Placement::Unplaced) {
                placement[task_idx] = Placement::Unplaced;
                log_checks!(verbosity, "  Skipping {}: predecessor unplaced", task.id);
                outcome.unplaced.push(task.id.clone());
                continue;
            }

            let earliest = preds
                .iter()
                .filter_map(|&p| match placement[p] {
                    Placement::Placed { end } => Some(end),
                    _ => None,
                })
                .max()
                .unwrap_or(0);

            let mut best: Option<(Time, usize, Time)> = None;
            for &r in &candidates {
                let start = schedules[r].earliest_slot(earliest, task.duration);
                let end = start + task.duration;
                log_checks!(
                    verbosity,
                    "  Considering {} on {}: [{}, {})",
                    task.id,
                    schedules[r].resource_id,
                    start,
                    end
                );
                if best.map_or(true, |(best_end, _, _)| end < best_end) {
                    best = Some((end, r, start));
                }
            }

            match best {
                Some((end, r, start)) if self.planning_horizon.map_or(true, |h| end <= h) => {
                    schedules[r].add_busy_period(start, end);
                    placement[task_idx] = Placement::Placed { end };
                    let resource_id = &snapshot.resource(r).id;
                    log_changes!(
                        verbosity,
                        "Scheduled task {} on {} from {} to {}",
                        task.id,
                        resource_id,
                        start,
                        end
                    );
                    outcome.hint.add_assignment(Assignment::new(
                        task.id.clone(),
                        resource_id.clone(),
                        start,
                        end,
                    ));
                }
                _ => {
                    placement[task_idx] = Placement::Unplaced;
                    log_changes!(
                        verbosity,
                        "Could not place task {} within the planning horizon",
                        task.id
                    );
                    outcome.unplaced.push(task.id.clone());
                }
            }
        }

        outcome.hint.sort_by_task();
        outcome.removed.sort_by(|a, b| a.task_id.cmp(&b.task_id));
        outcome.unplaced.sort();

        outcome.horizon = if outcome.is_complete() {
            outcome.hint.makespan()
        } else {
            let kept = (0..n).filter(|&t| {
                pruned.is_active(t) && placement[t] != Placement::Removed
            });
            let bound = serial_bound(snapshot, kept);
            self.planning_horizon.map_or(bound, |h| bound.min(h))
        };

        log_debug!(
            verbosity,
            "Heuristic: makespan {}, horizon {}, relaxed {}, {} removed, {} unplaced",
            outcome.hint.makespan(),
            outcome.horizon,
            outcome.relaxed_makespan,
            outcome.removed.len(),
            outcome.unplaced.len()
        );

        outcome
    }
}

/// Makespan of running `tasks` one after another once every blackout has
/// passed. Always feasible, so it bounds the optimum from above.
pub fn serial_bound(snapshot: &ProblemSnapshot, tasks: impl Iterator<Item = usize>) -> Time {
    let clear_from = (0..snapshot.resource_count())
        .map(|r| snapshot.calendar(r).clear_from())
        .max()
        .unwrap_or(0);
    clear_from + tasks.map(|t| snapshot.task(t).duration).sum::<Time>()
}
