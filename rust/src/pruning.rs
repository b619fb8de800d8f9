//! Feasibility pruning: cycle detection and removal of unschedulable tasks.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use crate::error::ScheduleError;
use crate::models::{RemovalReason, RemovedTask};
use crate::problem::ProblemSnapshot;
use crate::{log_changes, log_debug};

/// The task set left after pruning, in topological order.
///
/// Borrows the snapshot; removing more tasks produces a new value.
#[derive(Clone, Debug)]
pub struct PrunedProblem<'a> {
    snapshot: &'a ProblemSnapshot,
    order: Vec<usize>,
    active: Vec<bool>,
    removed: Vec<RemovedTask>,
}

impl<'a> PrunedProblem<'a> {
    pub fn snapshot(&self) -> &'a ProblemSnapshot {
        self.snapshot
    }

    /// Active task indices in topological order, ties by ascending id.
    pub fn order(&self) -> &[usize] {
        &self.order
    }

    pub fn is_active(&self, task_idx: usize) -> bool {
        self.active[task_idx]
    }

    pub fn active_count(&self) -> usize {
        self.order.len()
    }

    /// Removed tasks with their reasons, sorted by task id.
    pub fn removed(&self) -> &[RemovedTask] {
        &self.removed
    }

    /// A copy with `extra` tasks removed as well.
    pub fn without(&self, extra: &[RemovedTask]) -> PrunedProblem<'a> {
        let mut active = self.active.clone();
        let mut removed = self.removed.clone();
        for entry in extra {
            if let Some(idx) = self.snapshot.task_index(&entry.task_id) {
                if active[idx] {
                    active[idx] = false;
                    removed.push(entry.clone());
                }
            }
        }
        removed.sort_by(|a, b| a.task_id.cmp(&b.task_id));
        let order = self.order.iter().copied().filter(|&t| active[t]).collect();
        PrunedProblem {
            snapshot: self.snapshot,
            order,
            active,
            removed,
        }
    }
}

/// Perform a topological sort of all tasks using Kahn's algorithm.
///
/// Ready tasks are taken in ascending id order, which gives a stable order.
/// Returns the tasks participating in cycles as an error.
fn topological_order(snapshot: &ProblemSnapshot) -> Result<Vec<usize>, ScheduleError> {
    let n = snapshot.task_count();
    let mut in_degree: Vec<usize> = (0..n).map(|t| snapshot.predecessors(t).len()).collect();

    let mut ready: BinaryHeap<Reverse<usize>> = (0..n)
        .filter(|&t| in_degree[t] == 0)
        .map(Reverse)
        .collect();

    let mut result: Vec<usize> = Vec::with_capacity(n);
    while let Some(Reverse(task)) = ready.pop() {
        result.push(task);
        for &succ in snapshot.successors(task) {
            in_degree[succ] -= 1;
            if in_degree[succ] == 0 {
                ready.push(Reverse(succ));
            }
        }
    }

    if result.len() != n {
        let mut emitted = vec![false; n];
        for &t in &result {
            emitted[t] = true;
        }
        return Err(ScheduleError::CircularDependency(cycle_members(
            snapshot, &emitted,
        )));
    }

    Ok(result)
}

/// Tasks left over by Kahn's algorithm, minus those that merely hang off a
/// cycle (strip nodes with no remaining successors until stable).
fn cycle_members(snapshot: &ProblemSnapshot, emitted: &[bool]) -> Vec<String> {
    let n = snapshot.task_count();
    let mut remaining: Vec<bool> = emitted.iter().map(|e| !e).collect();

    loop {
        let mut changed = false;
        for t in 0..n {
            if remaining[t] && !snapshot.successors(t).iter().any(|&s| remaining[s]) {
                remaining[t] = false;
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }

    (0..n)
        .filter(|&t| remaining[t])
        .map(|t| snapshot.task(t).id.clone())
        .collect()
}

/// Detect cycles and remove tasks that can never be scheduled.
///
/// A cycle anywhere is fatal. Tasks with no resource of an acceptable rank
/// are removed with `no_compatible_resource`; their descendants follow with
/// `predecessor_removed`.
pub fn prune(snapshot: &ProblemSnapshot, verbosity: u8) -> Result<PrunedProblem<'_>, ScheduleError> {
    let topo = topological_order(snapshot)?;

    let mut active = vec![true; snapshot.task_count()];
    let mut removed: Vec<RemovedTask> = Vec::new();
    for &task in &topo {
        let task_id = &snapshot.task(task).id;
        let reason = if snapshot.eligible_resources(task).is_empty() {
            Some(RemovalReason::NoCompatibleResource)
        } else if snapshot.predecessors(task).iter().any(|&p| !active[p]) {
            Some(RemovalReason::PredecessorRemoved)
        } else {
            None
        };

        if let Some(reason) = reason {
            active[task] = false;
            log_changes!(verbosity, "Removed task {} ({})", task_id, reason);
            removed.push(RemovedTask::new(task_id.clone(), reason));
        }
    }
    removed.sort_by(|a, b| a.task_id.cmp(&b.task_id));

    let order: Vec<usize> = topo.into_iter().filter(|&t| active[t]).collect();
    log_debug!(
        verbosity,
        "Pruning kept {} of {} tasks",
        order.len(),
        snapshot.task_count()
    );

    Ok(PrunedProblem {
        snapshot,
        order,
        active,
        removed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Resource, Task};

    fn snapshot(tasks: Vec<Task>) -> ProblemSnapshot {
        ProblemSnapshot::new(tasks, vec![Resource::new("R", "welder")], vec![]).unwrap()
    }

    fn ids(pruned: &PrunedProblem<'_>) -> Vec<String> {
        pruned
            .order()
            .iter()
            .map(|&t| pruned.snapshot().task(t).id.clone())
            .collect()
    }

    #[test]
    fn test_topological_order_ties_by_id() {
        let snap = snapshot(vec![
            Task::new("D", 1).with_rank("welder").with_predecessor("A"),
            Task::new("C", 1).with_rank("welder"),
            Task::new("B", 1).with_rank("welder").with_predecessor("C"),
            Task::new("A", 1).with_rank("welder"),
        ]);
        let pruned = prune(&snap, 0).unwrap();
        assert_eq!(ids(&pruned), vec!["A", "C", "B", "D"]);
        assert!(pruned.removed().is_empty());
    }

    #[test]
    fn test_cycle_is_fatal() {
        let snap = snapshot(vec![
            Task::new("A", 1).with_rank("welder").with_predecessor("B"),
            Task::new("B", 1).with_rank("welder").with_predecessor("A"),
            Task::new("C", 1).with_rank("welder").with_predecessor("B"),
            Task::new("D", 1).with_rank("welder"),
        ]);
        let err = prune(&snap, 0).unwrap_err();
        assert_eq!(
            err,
            ScheduleError::CircularDependency(vec!["A".to_string(), "B".to_string()])
        );
    }

    #[test]
    fn test_incompatible_rank_removed_with_descendants() {
        let snap = snapshot(vec![
            Task::new("E", 2).with_rank("Z"),
            Task::new("F", 1).with_rank("welder").with_predecessor("E"),
            Task::new("G", 1).with_rank("welder"),
        ]);
        let pruned = prune(&snap, 0).unwrap();

        assert_eq!(ids(&pruned), vec!["G"]);
        assert_eq!(
            pruned.removed(),
            &[
                RemovedTask::new("E", RemovalReason::NoCompatibleResource),
                RemovedTask::new("F", RemovalReason::PredecessorRemoved),
            ]
        );
    }

    #[test]
    fn test_without_creates_new_value() {
        let snap = snapshot(vec![
            Task::new("A", 1).with_rank("welder"),
            Task::new("B", 1).with_rank("welder"),
        ]);
        let pruned = prune(&snap, 0).unwrap();
        let narrowed = pruned.without(&[RemovedTask::new("A", RemovalReason::CalendarBlocked)]);

        assert_eq!(pruned.active_count(), 2);
        assert_eq!(ids(&narrowed), vec!["B"]);
        assert!(!narrowed.is_active(0));
        assert_eq!(narrowed.removed().len(), 1);
    }
}
