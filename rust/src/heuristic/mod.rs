//! Fast heuristic scheduler producing warm-start hints.
//!
//! A rank-aware greedy list scheduler in the serial schedule-generation
//! style: one pass in topological order, each task committed to the resource
//! finishing it first. The resulting schedule seeds the exact solver and its
//! makespan bounds the solver's search horizon.

mod list_scheduler;
mod resource_schedule;

pub use list_scheduler::{serial_bound, HeuristicOutcome, ListScheduler};
pub use resource_schedule::ResourceSchedule;
