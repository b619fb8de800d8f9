//! Compiled constraint model for the exact solver.

use rustc_hash::FxHashMap;

use crate::heuristic::ResourceSchedule;
use crate::models::Time;
use crate::pruning::PrunedProblem;

/// Integer model of one scheduling problem.
///
/// Per task: a start variable with domain `[earliest_start, horizon - duration]`
/// and a resource-choice variable over its rank-compatible resources.
/// Per resource: a no-overlap constraint over its tasks and its blackouts.
/// Per predecessor link: `start(task) >= start(pred) + duration(pred)`.
///
/// Tasks are indexed in ascending id order; resources by ascending id
/// (their "ordinal").
#[derive(Clone, Debug)]
pub struct CpModel {
    task_ids: Vec<String>,
    durations: Vec<Time>,
    predecessors: Vec<Vec<usize>>,
    successors: Vec<Vec<usize>>,
    candidates: Vec<Vec<usize>>,
    resource_ids: Vec<String>,
    calendars: Vec<ResourceSchedule>,
    topo_order: Vec<usize>,
    earliest_start: Vec<Time>,
    horizon: Time,
    task_lookup: FxHashMap<String, usize>,
    resource_lookup: FxHashMap<String, usize>,
}

impl CpModel {
    /// Build the model for the active tasks of `pruned`.
    pub fn build(pruned: &PrunedProblem<'_>, horizon: Time) -> Self {
        let snapshot = pruned.snapshot();

        let mut active: Vec<usize> = pruned.order().to_vec();
        active.sort_unstable();
        let mut model_index: FxHashMap<usize, usize> = FxHashMap::default();
        for (m, &t) in active.iter().enumerate() {
            model_index.insert(t, m);
        }

        let task_ids: Vec<String> = active.iter().map(|&t| snapshot.task(t).id.clone()).collect();
        let durations: Vec<Time> = active.iter().map(|&t| snapshot.task(t).duration).collect();
        let predecessors: Vec<Vec<usize>> = active
            .iter()
            .map(|&t| {
                snapshot
                    .predecessors(t)
                    .iter()
                    .filter_map(|p| model_index.get(p).copied())
                    .collect()
            })
            .collect();
        let mut successors: Vec<Vec<usize>> = vec![Vec::new(); active.len()];
        for (m, preds) in predecessors.iter().enumerate() {
            for &p in preds {
                successors[p].push(m);
            }
        }
        let candidates: Vec<Vec<usize>> = active
            .iter()
            .map(|&t| snapshot.eligible_resources(t))
            .collect();

        let resource_ids: Vec<String> = snapshot.resources().iter().map(|r| r.id.clone()).collect();
        let calendars: Vec<ResourceSchedule> = resource_ids
            .iter()
            .enumerate()
            .map(|(r, id)| ResourceSchedule::new(id.clone(), snapshot.calendar(r)))
            .collect();

        let topo_order: Vec<usize> = pruned
            .order()
            .iter()
            .filter_map(|t| model_index.get(t).copied())
            .collect();

        // Calendar-aware earliest starts, ignoring contention.
        let mut earliest_start: Vec<Time> = vec![0; active.len()];
        for &m in &topo_order {
            let ready = predecessors[m]
                .iter()
                .map(|&p| earliest_start[p] + durations[p])
                .max()
                .unwrap_or(0);
            earliest_start[m] = candidates[m]
                .iter()
                .map(|&r| calendars[r].earliest_slot(ready, durations[m]))
                .min()
                .unwrap_or(ready);
        }

        let task_lookup = task_ids.iter().cloned().enumerate().map(|(i, id)| (id, i)).collect();
        let resource_lookup = resource_ids
            .iter()
            .cloned()
            .enumerate()
            .map(|(i, id)| (id, i))
            .collect();

        Self {
            task_ids,
            durations,
            predecessors,
            successors,
            candidates,
            resource_ids,
            calendars,
            topo_order,
            earliest_start,
            horizon,
            task_lookup,
            resource_lookup,
        }
    }

    pub fn task_count(&self) -> usize {
        self.task_ids.len()
    }

    pub fn resource_count(&self) -> usize {
        self.resource_ids.len()
    }

    pub fn horizon(&self) -> Time {
        self.horizon
    }

    pub fn task_id(&self, task: usize) -> &str {
        &self.task_ids[task]
    }

    pub fn resource_id(&self, resource: usize) -> &str {
        &self.resource_ids[resource]
    }

    pub fn task_index(&self, id: &str) -> Option<usize> {
        self.task_lookup.get(id).copied()
    }

    pub fn resource_index(&self, id: &str) -> Option<usize> {
        self.resource_lookup.get(id).copied()
    }

    pub fn duration(&self, task: usize) -> Time {
        self.durations[task]
    }

    pub fn predecessors(&self, task: usize) -> &[usize] {
        &self.predecessors[task]
    }

    pub fn successors(&self, task: usize) -> &[usize] {
        &self.successors[task]
    }

    /// Resource-choice domain, ascending ordinal.
    pub fn candidates(&self, task: usize) -> &[usize] {
        &self.candidates[task]
    }

    pub fn topo_order(&self) -> &[usize] {
        &self.topo_order
    }

    /// Blackout-only timelines, one per resource.
    pub fn calendars(&self) -> &[ResourceSchedule] {
        &self.calendars
    }

    pub fn earliest_start(&self, task: usize) -> Time {
        self.earliest_start[task]
    }

    /// Start variable domain `[earliest, horizon - duration]`; empty when
    /// the lower end exceeds the upper end.
    pub fn start_domain(&self, task: usize) -> (Time, Time) {
        (
            self.earliest_start[task],
            self.horizon.saturating_sub(self.durations[task]),
        )
    }

    /// First task whose start domain is empty, if any. Such a model is
    /// infeasible without search.
    pub fn empty_domain(&self) -> Option<usize> {
        (0..self.task_count()).find(|&t| {
            let (lo, hi) = self.start_domain(t);
            lo > hi
        })
    }

    pub fn precedence_count(&self) -> usize {
        self.predecessors.iter().map(|p| p.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Resource, Task, UnavailableRange};
    use crate::problem::ProblemSnapshot;
    use crate::pruning::prune;

    fn snapshot() -> ProblemSnapshot {
        ProblemSnapshot::new(
            vec![
                Task::new("C", 1).with_rank("op").with_predecessor("B"),
                Task::new("A", 2).with_rank("op"),
                Task::new("B", 3).with_rank("op").with_rank("lead").with_predecessor("A"),
                Task::new("E", 1).with_rank("Z"),
            ],
            vec![Resource::new("R1", "op"), Resource::new("R2", "lead")],
            vec![UnavailableRange::new("R1", 2, 4)],
        )
        .unwrap()
    }

    #[test]
    fn test_build_model() {
        let snap = snapshot();
        let pruned = prune(&snap, 0).unwrap();
        let model = CpModel::build(&pruned, 20);

        // E is pruned away
        assert_eq!(model.task_count(), 3);
        assert_eq!(model.task_id(0), "A");
        assert_eq!(model.task_index("C"), Some(2));
        assert_eq!(model.task_index("E"), None);
        assert_eq!(model.resource_index("R2"), Some(1));
        assert_eq!(model.candidates(1), &[0, 1]);
        assert_eq!(model.precedence_count(), 2);
        assert_eq!(model.topo_order(), &[0, 1, 2]);
    }

    #[test]
    fn test_earliest_starts_respect_calendars() {
        let snap = snapshot();
        let pruned = prune(&snap, 0).unwrap();
        let model = CpModel::build(&pruned, 20);

        // A fits before the blackout; B can use R2 right after A
        assert_eq!(model.earliest_start(0), 0);
        assert_eq!(model.earliest_start(1), 2);
        // C only runs on R1, blocked on days 2..=4, B ends at 5 at the earliest
        assert_eq!(model.earliest_start(2), 5);
        assert_eq!(model.start_domain(2), (5, 19));
        assert_eq!(model.empty_domain(), None);
    }

    #[test]
    fn test_empty_domain_detected() {
        let snap = snapshot();
        let pruned = prune(&snap, 0).unwrap();
        let model = CpModel::build(&pruned, 5);
        assert_eq!(model.empty_domain(), Some(2));
    }
}
