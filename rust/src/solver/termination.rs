//! Search budget shared by all workers: wall clock, node count, cancellation.

use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::time::{Duration, Instant};

/// Why a search stopped before exhausting its tree.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum StopReason {
    TimeBudget = 1,
    NodeLimit = 2,
    Cancelled = 3,
}

impl StopReason {
    fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(StopReason::TimeBudget),
            2 => Some(StopReason::NodeLimit),
            3 => Some(StopReason::Cancelled),
            _ => None,
        }
    }
}

/// Limits checked at every search node.
///
/// The first stop request wins; later ones are ignored.
#[derive(Debug)]
pub struct Budget {
    started: Instant,
    time_limit: Duration,
    node_limit: Option<u64>,
    nodes: AtomicU64,
    stop: AtomicU8,
}

impl Budget {
    pub fn new(time_limit: Duration, node_limit: Option<u64>) -> Self {
        Self {
            started: Instant::now(),
            time_limit,
            node_limit,
            nodes: AtomicU64::new(0),
            stop: AtomicU8::new(0),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Share of the wall-clock budget used so far, in `[0, 1]`.
    pub fn elapsed_fraction(&self) -> f64 {
        if self.time_limit.is_zero() {
            return 1.0;
        }
        (self.elapsed().as_secs_f64() / self.time_limit.as_secs_f64()).min(1.0)
    }

    /// Count one node and check the limits. Returns false once the search
    /// must stop.
    pub fn tick(&self) -> bool {
        if self.is_stopped() {
            return false;
        }
        let visited = self.nodes.fetch_add(1, Ordering::Relaxed) + 1;
        if self.node_limit.is_some_and(|limit| visited > limit) {
            self.request_stop(StopReason::NodeLimit);
            return false;
        }
        if self.elapsed() >= self.time_limit {
            self.request_stop(StopReason::TimeBudget);
            return false;
        }
        true
    }

    pub fn request_stop(&self, reason: StopReason) {
        let _ = self
            .stop
            .compare_exchange(0, reason as u8, Ordering::SeqCst, Ordering::SeqCst);
    }

    pub fn stop_reason(&self) -> Option<StopReason> {
        StopReason::from_u8(self.stop.load(Ordering::SeqCst))
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.load(Ordering::Relaxed) != 0
    }

    /// Nodes explored, never more than the node limit.
    pub fn nodes(&self) -> u64 {
        let counted = self.nodes.load(Ordering::Relaxed);
        self.node_limit.map_or(counted, |limit| counted.min(limit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_limit_stops() {
        let budget = Budget::new(Duration::from_secs(60), Some(2));
        assert!(budget.tick());
        assert!(budget.tick());
        assert!(!budget.tick());
        assert_eq!(budget.stop_reason(), Some(StopReason::NodeLimit));
        assert_eq!(budget.nodes(), 2);
    }

    #[test]
    fn test_zero_time_budget_stops_immediately() {
        let budget = Budget::new(Duration::ZERO, None);
        assert!(!budget.tick());
        assert_eq!(budget.stop_reason(), Some(StopReason::TimeBudget));
        assert_eq!(budget.elapsed_fraction(), 1.0);
    }

    #[test]
    fn test_first_stop_reason_wins() {
        let budget = Budget::new(Duration::from_secs(60), None);
        assert_eq!(budget.stop_reason(), None);
        budget.request_stop(StopReason::Cancelled);
        budget.request_stop(StopReason::TimeBudget);
        assert_eq!(budget.stop_reason(), Some(StopReason::Cancelled));
        assert!(!budget.tick());
    }
}
