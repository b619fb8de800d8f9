//! Schedule verification against the problem it was built for.
//!
//! Checks that every assignment respects its task's duration and ranks, its
//! predecessors, and its resource's calendar and other assignments, and that
//! each task is either scheduled or removed but never both.

use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::models::{Assignment, RemovedTask, Schedule};
use crate::problem::ProblemSnapshot;

/// A single broken schedule property.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    pub kind: ViolationKind,
    /// Task (or resource, for overlaps) the violation is about.
    pub entity_id: String,
    pub message: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    UnknownTask,
    UnknownResource,
    DuplicateAssignment,
    /// `end - start` differs from the task's duration, or the start is negative.
    WrongDuration,
    RankMismatch,
    PrecedenceViolated,
    ResourceOverlap,
    /// The assignment intersects a blackout of its resource.
    ResourceUnavailable,
    /// A task is neither scheduled nor removed.
    MissingTask,
    /// A task is both scheduled and removed.
    RemovedButScheduled,
}

impl Violation {
    fn new(kind: ViolationKind, entity_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            entity_id: entity_id.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Check durations, ranks, precedence, calendars and resource exclusivity.
///
/// Predecessors that are not in the schedule are not checked here; see
/// `verify_coverage`.
pub fn verify_assignments(snapshot: &ProblemSnapshot, schedule: &Schedule) -> Vec<Violation> {
    let mut violations = Vec::new();
    let mut by_task: FxHashMap<usize, &Assignment> = FxHashMap::default();
    let mut by_resource: FxHashMap<usize, Vec<&Assignment>> = FxHashMap::default();

    for a in &schedule.assignments {
        let Some(t) = snapshot.task_index(&a.task_id) else {
            violations.push(Violation::new(
                ViolationKind::UnknownTask,
                &a.task_id,
                format!("Assignment for unknown task '{}'", a.task_id),
            ));
            continue;
        };
        let Some(r) = snapshot.resource_index(&a.resource_id) else {
            violations.push(Violation::new(
                ViolationKind::UnknownResource,
                &a.task_id,
                format!(
                    "Task '{}' assigned to unknown resource '{}'",
                    a.task_id, a.resource_id
                ),
            ));
            continue;
        };
        if by_task.insert(t, a).is_some() {
            violations.push(Violation::new(
                ViolationKind::DuplicateAssignment,
                &a.task_id,
                format!("Task '{}' is assigned more than once", a.task_id),
            ));
            continue;
        }

        let task = snapshot.task(t);
        if a.start < 0 || a.end.checked_sub(a.start) != Some(task.duration) {
            violations.push(Violation::new(
                ViolationKind::WrongDuration,
                &a.task_id,
                format!(
                    "Task '{}' runs [{}, {}) but has duration {}",
                    a.task_id, a.start, a.end, task.duration
                ),
            ));
        }
        if !task.accepts(&snapshot.resource(r).rank) {
            violations.push(Violation::new(
                ViolationKind::RankMismatch,
                &a.task_id,
                format!(
                    "Task '{}' does not accept rank '{}' of resource '{}'",
                    a.task_id,
                    snapshot.resource(r).rank,
                    a.resource_id
                ),
            ));
        }
        if !snapshot.calendar(r).is_free(a.start, a.end) {
            violations.push(Violation::new(
                ViolationKind::ResourceUnavailable,
                &a.task_id,
                format!(
                    "Task '{}' runs [{}, {}) while '{}' is unavailable",
                    a.task_id, a.start, a.end, a.resource_id
                ),
            ));
        }
        by_resource.entry(r).or_default().push(a);
    }

    for (&t, a) in &by_task {
        for &p in snapshot.predecessors(t) {
            if let Some(pred) = by_task.get(&p) {
                if a.start < pred.end {
                    violations.push(Violation::new(
                        ViolationKind::PrecedenceViolated,
                        &a.task_id,
                        format!(
                            "Task '{}' starts at {} before predecessor '{}' ends at {}",
                            a.task_id, a.start, pred.task_id, pred.end
                        ),
                    ));
                }
            }
        }
    }

    for (&r, assignments) in &mut by_resource {
        assignments.sort_by_key(|a| (a.start, a.end));
        for pair in assignments.windows(2) {
            if pair[0].overlaps(pair[1].start, pair[1].end) {
                violations.push(Violation::new(
                    ViolationKind::ResourceOverlap,
                    &snapshot.resource(r).id,
                    format!(
                        "Tasks '{}' and '{}' overlap on resource '{}'",
                        pair[0].task_id,
                        pair[1].task_id,
                        snapshot.resource(r).id
                    ),
                ));
            }
        }
    }

    violations.sort_by(|a, b| (&a.entity_id, &a.message).cmp(&(&b.entity_id, &b.message)));
    violations
}

/// Check that every task is scheduled or removed, and not both.
pub fn verify_coverage(
    snapshot: &ProblemSnapshot,
    schedule: &Schedule,
    removed: &[RemovedTask],
) -> Vec<Violation> {
    let scheduled: FxHashSet<&str> = schedule
        .assignments
        .iter()
        .map(|a| a.task_id.as_str())
        .collect();
    let removed: FxHashSet<&str> = removed.iter().map(|r| r.task_id.as_str()).collect();

    let mut violations = Vec::new();
    for task in snapshot.tasks() {
        let id = task.id.as_str();
        match (scheduled.contains(id), removed.contains(id)) {
            (true, true) => violations.push(Violation::new(
                ViolationKind::RemovedButScheduled,
                id,
                format!("Task '{}' is both scheduled and removed", id),
            )),
            (false, false) => violations.push(Violation::new(
                ViolationKind::MissingTask,
                id,
                format!("Task '{}' is neither scheduled nor removed", id),
            )),
            _ => {}
        }
    }
    violations
}

/// All checks at once.
pub fn verify(
    snapshot: &ProblemSnapshot,
    schedule: &Schedule,
    removed: &[RemovedTask],
) -> Vec<Violation> {
    let mut violations = verify_assignments(snapshot, schedule);
    violations.extend(verify_coverage(snapshot, schedule, removed));
    violations
}
