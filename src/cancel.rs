//! Cooperative stop signal shared by every long-running phase.
//!
//! Combines an external cancellation flag with an optional wall-clock
//! deadline. Loops poll [`StopSignal::should_stop`] at iteration boundaries
//! and return their best-so-far result when it fires.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Cancellation flag plus optional deadline.
#[derive(Debug, Clone, Default)]
pub struct StopSignal {
    cancel: Option<Arc<AtomicBool>>,
    deadline: Option<Instant>,
}

impl StopSignal {
    /// A signal that never fires.
    pub fn never() -> Self {
        Self::default()
    }

    /// Stops when `flag` is set to `true`.
    pub fn from_flag(flag: Arc<AtomicBool>) -> Self {
        Self {
            cancel: Some(flag),
            deadline: None,
        }
    }

    /// Adds a deadline `budget` from now. Keeps the earlier deadline if one
    /// is already set.
    pub fn with_budget(self, budget: Duration) -> Self {
        self.with_deadline(Instant::now() + budget)
    }

    /// Adds an absolute deadline, keeping the earlier one.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(match self.deadline {
            Some(existing) => existing.min(deadline),
            None => deadline,
        });
        self
    }

    /// Child signal sharing the cancel flag, bounded by an extra budget.
    pub fn child(&self, budget: Option<Duration>) -> Self {
        match budget {
            Some(b) => self.clone().with_budget(b),
            None => self.clone(),
        }
    }

    /// Whether the external flag has been raised.
    pub fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
    }

    /// Whether the deadline has passed.
    pub fn is_expired(&self) -> bool {
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// Whether the current phase should wind down.
    pub fn should_stop(&self) -> bool {
        self.is_cancelled() || self.is_expired()
    }

    /// Time left before the deadline, if any.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_never_does_not_stop() {
        let signal = StopSignal::never();
        assert!(!signal.should_stop());
        assert!(signal.remaining().is_none());
    }

    #[test]
    fn test_flag_cancels() {
        let flag = Arc::new(AtomicBool::new(false));
        let signal = StopSignal::from_flag(flag.clone());
        assert!(!signal.should_stop());
        flag.store(true, Ordering::Relaxed);
        assert!(signal.is_cancelled());
        assert!(signal.should_stop());
    }

    #[test]
    fn test_zero_budget_expires() {
        let signal = StopSignal::never().with_budget(Duration::ZERO);
        assert!(signal.is_expired());
    }

    #[test]
    fn test_child_keeps_earlier_deadline() {
        let parent = StopSignal::never().with_budget(Duration::ZERO);
        let child = parent.child(Some(Duration::from_secs(3600)));
        assert!(child.is_expired());
    }
}
