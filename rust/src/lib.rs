//! Rank-aware resource-constrained project scheduling.
//!
//! Tasks with fixed durations and precedence links are placed on single-rank
//! resources with blackout calendars. A greedy list scheduler produces a
//! hint, and a budgeted branch-and-bound solver warm-starts from it to
//! minimize makespan.

pub mod calendar;
pub mod config;
pub mod error;
pub mod heuristic;
pub mod hints;
pub mod interner;
pub mod logging;
pub mod models;
pub mod orchestrator;
pub mod problem;
pub mod pruning;
pub mod solver;
pub mod strategy;
pub mod validation;

#[cfg(feature = "python")]
mod python;

pub use config::SolverSettings;
pub use error::{ScheduleError, Stage};
pub use heuristic::{HeuristicOutcome, ListScheduler};
pub use hints::{HintRow, HintTable};
pub use models::{
    Assignment, Rank, RemovalReason, RemovedTask, Resource, Schedule, Task, Time,
    UnavailableRange,
};
pub use orchestrator::{schedule, Diagnostics, Orchestrator, SchedulingRequest, SchedulingResult};
pub use problem::ProblemSnapshot;
pub use pruning::{prune, PrunedProblem};
pub use solver::{ExactSolver, NoProgress, ProgressListener, SolveOutcome, SolverStatus};
pub use strategy::{Plan, PlanRequest, SchedulingStrategy};
pub use validation::{Violation, ViolationKind};
