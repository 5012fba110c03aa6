//! Startup sampling window
//!
//! After a receiver starts it listens for a fixed period before reporting
//! merged data, so that every source already transmitting is discovered
//! before the consumer sees a merge. The transition to steady state is
//! one-way for the lifetime of a run.

use std::time::{Duration, Instant};

/// Sampling controller state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamplingState {
    Sampling,
    Steady,
}

/// Timed Sampling -> Steady state machine
#[derive(Debug, Clone)]
pub struct SamplingController {
    state: SamplingState,
    period: Duration,
    started_at: Instant,
}

impl SamplingController {
    /// Enter `Sampling` at `now`
    pub fn start(period: Duration, now: Instant) -> Self {
        Self {
            state: SamplingState::Sampling,
            period,
            started_at: now,
        }
    }

    pub fn state(&self) -> SamplingState {
        self.state
    }

    pub fn is_sampling(&self) -> bool {
        self.state == SamplingState::Sampling
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// When the sampling window closes
    pub fn deadline(&self) -> Instant {
        self.started_at + self.period
    }

    /// Move to `Steady` once the window has elapsed
    ///
    /// Returns true exactly once, on the call that performs the transition.
    pub fn poll(&mut self, now: Instant) -> bool {
        if self.state == SamplingState::Sampling && now >= self.deadline() {
            self.state = SamplingState::Steady;
            return true;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transition_after_period() {
        let start = Instant::now();
        let mut sampling = SamplingController::start(Duration::from_millis(1500), start);
        assert!(sampling.is_sampling());
        assert_eq!(sampling.deadline(), start + Duration::from_millis(1500));

        assert!(!sampling.poll(start + Duration::from_millis(1499)));
        assert!(sampling.is_sampling());

        assert!(sampling.poll(start + Duration::from_millis(1500)));
        assert_eq!(sampling.state(), SamplingState::Steady);
    }

    #[test]
    fn test_transition_is_one_way() {
        let start = Instant::now();
        let mut sampling = SamplingController::start(Duration::from_millis(10), start);
        assert!(sampling.poll(start + Duration::from_secs(1)));
        assert!(!sampling.poll(start + Duration::from_secs(2)));
        assert_eq!(sampling.state(), SamplingState::Steady);
    }

    #[test]
    fn test_zero_period_ends_on_first_poll() {
        let start = Instant::now();
        let mut sampling = SamplingController::start(Duration::ZERO, start);
        assert!(sampling.poll(start));
    }
}
