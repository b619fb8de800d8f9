//! Depth-first branch-and-bound over a serial schedule-generation scheme.
//!
//! A node is a partial schedule. Branching picks one eligible task (all its
//! predecessors placed) and one compatible resource, and places the task at
//! the earliest slot on that resource. Placements are generated in
//! non-decreasing `(start, task)` order, so each schedule is reached through
//! exactly one path. Nodes whose lower bound cannot beat the incumbent are
//! pruned.

use parking_lot::Mutex;
use rayon::prelude::*;
use std::time::Duration;

use crate::error::{ScheduleError, Stage};
use crate::heuristic::ResourceSchedule;
use crate::hints::VariableAssignment;
use crate::models::Time;
use crate::{log_changes, log_checks, log_debug};

use super::model::CpModel;
use super::termination::{Budget, StopReason};
use super::ProgressListener;

/// Lexicographic objective: makespan, then sum of starts, then the
/// `(start, resource ordinal)` pairs in task id order.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct ObjectiveKey {
    pub makespan: Time,
    pub start_sum: Time,
    pub placements: Vec<(Time, usize)>,
}

/// A complete solution and its objective.
#[derive(Clone, Debug)]
pub struct Incumbent {
    pub key: ObjectiveKey,
    pub vars: VariableAssignment,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
struct Move {
    start: Time,
    task: usize,
    resource: usize,
}

#[derive(Clone, Debug)]
struct Node {
    schedules: Vec<ResourceSchedule>,
    vars: VariableAssignment,
    pending_preds: Vec<usize>,
    placed: usize,
    last: Option<(Time, usize)>,
    makespan: Time,
    start_sum: Time,
}

impl Node {
    fn root(model: &CpModel) -> Self {
        let n = model.task_count();
        Self {
            schedules: model.calendars().to_vec(),
            vars: VariableAssignment::unassigned(n),
            pending_preds: (0..n).map(|t| model.predecessors(t).len()).collect(),
            placed: 0,
            last: None,
            makespan: 0,
            start_sum: 0,
        }
    }

    fn is_placed(&self, task: usize) -> bool {
        self.vars.starts[task].is_some()
    }

    fn is_eligible(&self, task: usize) -> bool {
        !self.is_placed(task) && self.pending_preds[task] == 0
    }

    /// Earliest start allowed by placed predecessors and calendars.
    fn ready_time(&self, model: &CpModel, task: usize) -> Time {
        model
            .predecessors(task)
            .iter()
            .filter_map(|&p| self.vars.starts[p].map(|s| s + model.duration(p)))
            .fold(model.earliest_start(task), Time::max)
    }

    fn place(&mut self, model: &CpModel, mv: Move) {
        let end = mv.start + model.duration(mv.task);
        self.schedules[mv.resource].add_busy_period(mv.start, end);
        self.vars.starts[mv.task] = Some(mv.start);
        self.vars.resources[mv.task] = Some(mv.resource);
        for &succ in model.successors(mv.task) {
            self.pending_preds[succ] -= 1;
        }
        self.placed += 1;
        self.last = Some((mv.start, mv.task));
        self.makespan = self.makespan.max(end);
        self.start_sum += mv.start;
    }

    fn child(&self, model: &CpModel, mv: Move) -> Self {
        let mut child = self.clone();
        child.place(model, mv);
        child
    }

    fn into_incumbent(self) -> Incumbent {
        let placements = self
            .vars
            .starts
            .iter()
            .zip(&self.vars.resources)
            .map(|(s, r)| (s.unwrap_or(0), r.unwrap_or(0)))
            .collect();
        Incumbent {
            key: ObjectiveKey {
                makespan: self.makespan,
                start_sum: self.start_sum,
                placements,
            },
            vars: self.vars,
        }
    }
}

/// Limits and parallelism for one search.
#[derive(Clone, Debug)]
pub struct SearchLimits {
    pub time_limit: Duration,
    pub node_limit: Option<u64>,
    pub workers: usize,
    pub verbosity: u8,
}

#[derive(Debug)]
pub struct SearchOutcome {
    pub best: Option<Incumbent>,
    pub stop: Option<StopReason>,
    pub nodes: u64,
    pub elapsed: Duration,
}

struct Shared<'l> {
    incumbent: Option<Incumbent>,
    listener: &'l mut dyn ProgressListener,
}

struct Search<'m, 'l> {
    model: &'m CpModel,
    budget: Budget,
    shared: Mutex<Shared<'l>>,
    verbosity: u8,
}

impl Search<'_, '_> {
    /// Accept `candidate` if it beats the incumbent, then report it.
    fn offer(&self, candidate: Incumbent) {
        let mut shared = self.shared.lock();
        if shared
            .incumbent
            .as_ref()
            .is_some_and(|inc| inc.key <= candidate.key)
        {
            return;
        }
        let objective = candidate.key.makespan;
        log_changes!(
            self.verbosity,
            "New incumbent: makespan {}, start sum {}",
            objective,
            candidate.key.start_sum
        );
        shared.incumbent = Some(candidate);

        let fraction = self.budget.elapsed_fraction();
        if !shared.listener.on_improved(objective, fraction) {
            log_changes!(self.verbosity, "Search cancelled by progress listener");
            self.budget.request_stop(StopReason::Cancelled);
        }
    }

    fn is_dominated(&self, bound: &ObjectiveKey) -> bool {
        bound.makespan > self.model.horizon()
            || self
                .shared
                .lock()
                .incumbent
                .as_ref()
                .is_some_and(|inc| *bound >= inc.key)
    }

    /// Optimistic key for every completion of `node`.
    ///
    /// Unplaced tasks get the earliest slot they could still take: after
    /// their predecessors' bounds, not before the canonical-order floor, and
    /// on the best candidate resource given the node's committed timelines.
    fn lower_bound(&self, node: &Node) -> ObjectiveKey {
        let model = self.model;
        let n = model.task_count();
        let mut bound_start: Vec<Time> = vec![0; n];
        let mut makespan = node.makespan;
        let mut start_sum = 0;

        for &t in model.topo_order() {
            if let Some(start) = node.vars.starts[t] {
                bound_start[t] = start;
                start_sum += start;
                continue;
            }
            let duration = model.duration(t);
            let mut earliest = model.earliest_start(t);
            if let Some((last_start, last_task)) = node.last {
                let floor = if t > last_task { last_start } else { last_start + 1 };
                earliest = earliest.max(floor);
            }
            for &p in model.predecessors(t) {
                earliest = earliest.max(bound_start[p] + model.duration(p));
            }
            let start = model
                .candidates(t)
                .iter()
                .map(|&r| node.schedules[r].earliest_slot(earliest, duration))
                .min()
                .unwrap_or(earliest);
            bound_start[t] = start;
            start_sum += start;
            makespan = makespan.max(start + duration);
        }

        let placements = bound_start
            .into_iter()
            .zip(&node.vars.resources)
            .map(|(s, r)| (s, r.unwrap_or(0)))
            .collect();
        ObjectiveKey {
            makespan,
            start_sum,
            placements,
        }
    }

    /// Child placements in `(start, task, resource)` order.
    fn moves(&self, node: &Node) -> Vec<Move> {
        let model = self.model;
        let mut moves = Vec::new();
        for task in (0..model.task_count()).filter(|&t| node.is_eligible(t)) {
            let duration = model.duration(task);
            let ready = node.ready_time(model, task);
            for &resource in model.candidates(task) {
                let start = node.schedules[resource].earliest_slot(ready, duration);
                if start + duration > model.horizon() {
                    continue;
                }
                if node.last.is_some_and(|last| (start, task) < last) {
                    continue;
                }
                moves.push(Move {
                    start,
                    task,
                    resource,
                });
            }
        }
        moves.sort_unstable();
        moves
    }

    /// Returns the node's moves, or None if the node is a leaf, pruned, or
    /// the budget ran out.
    fn expand(&self, node: &Node) -> Option<Vec<Move>> {
        if !self.budget.tick() {
            return None;
        }
        if node.placed == self.model.task_count() {
            self.offer(node.clone().into_incumbent());
            return None;
        }
        let bound = self.lower_bound(node);
        if self.is_dominated(&bound) {
            log_debug!(
                self.verbosity,
                "Pruned node at depth {} (bound makespan {})",
                node.placed,
                bound.makespan
            );
            return None;
        }
        Some(self.moves(node))
    }

    fn explore(&self, node: &Node) {
        let Some(moves) = self.expand(node) else {
            return;
        };
        for mv in moves {
            if self.budget.is_stopped() {
                return;
            }
            self.explore(&node.child(self.model, mv));
        }
    }

    /// Root branches are split across the pool; each subtree is searched
    /// depth-first against the shared incumbent.
    fn explore_parallel(&self, root: &Node) {
        let Some(moves) = self.expand(root) else {
            return;
        };
        log_checks!(
            self.verbosity,
            "Splitting {} root branches across workers",
            moves.len()
        );
        moves.par_iter().for_each(|&mv| {
            if !self.budget.is_stopped() {
                self.explore(&root.child(self.model, mv));
            }
        });
    }
}

/// Turn a (possibly partial) hint into a complete schedule by list
/// scheduling in hinted start order.
///
/// Unhinted tasks come last, by id. A task keeps its hinted resource when
/// that resource is compatible and otherwise takes the resource with the
/// earliest slot. Each task goes to the earliest slot after its
/// predecessors, so a valid complete hint is never made worse. Returns None
/// if some task does not fit within the horizon.
pub fn seed_from_hint(model: &CpModel, hint: &VariableAssignment) -> Option<Incumbent> {
    let mut node = Node::root(model);
    while node.placed < model.task_count() {
        let task = (0..model.task_count())
            .filter(|&t| node.is_eligible(t))
            .min_by_key(|&t| (hint.starts.get(t).copied().flatten().unwrap_or(Time::MAX), t))?;
        let duration = model.duration(task);
        let ready = node.ready_time(model, task);
        let hinted = hint
            .resources
            .get(task)
            .copied()
            .flatten()
            .filter(|r| model.candidates(task).contains(r));
        let resource = match hinted {
            Some(r) => r,
            None => model
                .candidates(task)
                .iter()
                .copied()
                .min_by_key(|&r| (node.schedules[r].earliest_slot(ready, duration), r))?,
        };
        let start = node.schedules[resource].earliest_slot(ready, duration);
        if start + duration > model.horizon() {
            return None;
        }
        node.place(
            model,
            Move {
                start,
                task,
                resource,
            },
        );
    }
    Some(node.into_incumbent())
}

/// Run the branch-and-bound search, optionally starting from `seed`.
pub fn run(
    model: &CpModel,
    seed: Option<Incumbent>,
    limits: &SearchLimits,
    listener: &mut dyn ProgressListener,
) -> Result<SearchOutcome, ScheduleError> {
    let search = Search {
        model,
        budget: Budget::new(limits.time_limit, limits.node_limit),
        shared: Mutex::new(Shared {
            incumbent: None,
            listener,
        }),
        verbosity: limits.verbosity,
    };

    if let Some(seed) = seed {
        search.offer(seed);
    }

    if !search.budget.is_stopped() {
        let root = Node::root(model);
        if limits.workers <= 1 {
            search.explore(&root);
        } else {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(limits.workers)
                .build()
                .map_err(|e| ScheduleError::Stage {
                    stage: Stage::Solve,
                    message: format!("failed to start worker pool: {}", e),
                })?;
            pool.install(|| search.explore_parallel(&root));
        }
    }

    let Search { budget, shared, .. } = search;
    let stop = budget.stop_reason();
    log_debug!(
        limits.verbosity,
        "Search finished: {} nodes, stop reason {:?}",
        budget.nodes(),
        stop
    );
    Ok(SearchOutcome {
        best: shared.into_inner().incumbent,
        stop,
        nodes: budget.nodes(),
        elapsed: budget.elapsed(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Resource, Task, UnavailableRange};
    use crate::problem::ProblemSnapshot;
    use crate::pruning::prune;
    use crate::solver::NoProgress;

    fn limits() -> SearchLimits {
        SearchLimits {
            time_limit: Duration::from_secs(30),
            node_limit: None,
            workers: 1,
            verbosity: 0,
        }
    }

    fn model_of(
        tasks: Vec<Task>,
        resources: Vec<Resource>,
        unavailable: Vec<UnavailableRange>,
        horizon: Time,
    ) -> CpModel {
        let snapshot = ProblemSnapshot::new(tasks, resources, unavailable).unwrap();
        let pruned = prune(&snapshot, 0).unwrap();
        CpModel::build(&pruned, horizon)
    }

    #[test]
    fn test_finds_parallel_optimum() {
        // Greedy in id order would stack A and B on R1; the optimum splits them.
        let model = model_of(
            vec![
                Task::new("A", 3).with_rank("op"),
                Task::new("B", 3).with_rank("op"),
                Task::new("C", 2).with_rank("op").with_predecessor("A").with_predecessor("B"),
            ],
            vec![Resource::new("R1", "op"), Resource::new("R2", "op")],
            vec![],
            20,
        );
        let outcome = run(&model, None, &limits(), &mut NoProgress).unwrap();
        let best = outcome.best.unwrap();

        assert_eq!(outcome.stop, None);
        assert_eq!(best.key.makespan, 5);
        assert_eq!(best.key.start_sum, 3);
        // Lexicographic tie-break: A and C on R1, B on R2
        assert_eq!(best.key.placements, vec![(0, 0), (0, 1), (3, 0)]);
    }

    #[test]
    fn test_blackout_respected() {
        let model = model_of(
            vec![Task::new("D", 3).with_rank("op")],
            vec![Resource::new("R1", "op"), Resource::new("R2", "op")],
            vec![UnavailableRange::new("R1", 0, 9), UnavailableRange::new("R2", 2, 4)],
            20,
        );
        let best = run(&model, None, &limits(), &mut NoProgress)
            .unwrap()
            .best
            .unwrap();
        assert_eq!(best.key.placements, vec![(5, 1)]);
    }

    #[test]
    fn test_exhausted_without_solution() {
        let model = model_of(
            vec![Task::new("A", 3).with_rank("op"), Task::new("B", 3).with_rank("op")],
            vec![Resource::new("R", "op")],
            vec![],
            5,
        );
        let outcome = run(&model, None, &limits(), &mut NoProgress).unwrap();
        assert!(outcome.best.is_none());
        assert_eq!(outcome.stop, None);
    }

    #[test]
    fn test_seed_reproduces_valid_hint() {
        let model = model_of(
            vec![
                Task::new("A", 2).with_rank("op"),
                Task::new("B", 2).with_rank("op"),
            ],
            vec![Resource::new("R1", "op"), Resource::new("R2", "op")],
            vec![],
            10,
        );
        let hint = VariableAssignment {
            starts: vec![Some(2), Some(0)],
            resources: vec![Some(0), Some(0)],
        };
        let seed = seed_from_hint(&model, &hint).unwrap();
        // B first (earlier hinted start), then A right after it on R1
        assert_eq!(seed.key.placements, vec![(2, 0), (0, 0)]);
        assert_eq!(seed.key.makespan, 4);
    }

    #[test]
    fn test_seed_repairs_partial_hint() {
        let model = model_of(
            vec![
                Task::new("A", 2).with_rank("op"),
                Task::new("B", 2).with_rank("op").with_predecessor("A"),
            ],
            vec![Resource::new("R1", "op"), Resource::new("R2", "op")],
            vec![],
            10,
        );
        let mut hint = VariableAssignment::unassigned(2);
        hint.starts[0] = Some(0);
        hint.resources[0] = Some(1);
        let seed = seed_from_hint(&model, &hint).unwrap();
        assert_eq!(seed.key.placements, vec![(0, 1), (2, 0)]);
        assert!(seed.vars.is_complete());
    }

    #[test]
    fn test_seed_respects_horizon() {
        let model = model_of(
            vec![Task::new("A", 4).with_rank("op"), Task::new("B", 4).with_rank("op")],
            vec![Resource::new("R", "op")],
            vec![],
            6,
        );
        assert!(seed_from_hint(&model, &VariableAssignment::unassigned(2)).is_none());
    }

    #[test]
    fn test_listener_sees_improvements_and_can_cancel() {
        let model = model_of(
            (0..6)
                .map(|i| Task::new(format!("T{}", i), 1 + i as Time).with_rank("op"))
                .collect(),
            vec![Resource::new("R1", "op"), Resource::new("R2", "op")],
            vec![],
            100,
        );
        let mut seen = Vec::new();
        let mut listener = |objective: Time, fraction: f64| {
            assert!((0.0..=1.0).contains(&fraction));
            seen.push(objective);
            false
        };
        let outcome = run(&model, None, &limits(), &mut listener).unwrap();
        assert_eq!(outcome.stop, Some(StopReason::Cancelled));
        assert_eq!(seen.len(), 1);
        assert!(outcome.best.is_some());
    }

    #[test]
    fn test_node_limit_stops_search() {
        let model = model_of(
            (0..8)
                .map(|i| Task::new(format!("T{}", i), 2 + (i % 3) as Time).with_rank("op"))
                .collect(),
            vec![Resource::new("R1", "op"), Resource::new("R2", "op")],
            vec![],
            100,
        );
        let outcome = run(
            &model,
            None,
            &SearchLimits {
                node_limit: Some(5),
                ..limits()
            },
            &mut NoProgress,
        )
        .unwrap();
        assert_eq!(outcome.stop, Some(StopReason::NodeLimit));
        assert_eq!(outcome.nodes, 5);
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let tasks = || {
            vec![
                Task::new("A", 3).with_rank("op"),
                Task::new("B", 2).with_rank("op"),
                Task::new("C", 2).with_rank("op").with_predecessor("A"),
                Task::new("D", 4).with_rank("op").with_predecessor("B"),
                Task::new("E", 1).with_rank("op"),
            ]
        };
        let resources = || vec![Resource::new("R1", "op"), Resource::new("R2", "op")];

        let model = model_of(tasks(), resources(), vec![], 20);
        let sequential = run(&model, None, &limits(), &mut NoProgress)
            .unwrap()
            .best
            .unwrap();
        let parallel = run(
            &model,
            None,
            &SearchLimits {
                workers: 3,
                ..limits()
            },
            &mut NoProgress,
        )
        .unwrap()
        .best
        .unwrap();
        assert_eq!(sequential.key, parallel.key);
    }
}
