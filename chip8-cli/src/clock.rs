//! Host clock.
use std::time::{Duration, Instant};

/// Fixed interval timer, polled by the event loop.
///
/// The virtual machine never schedules anything itself. The driver owns the
/// clocks and decides when to step the CPU and when to count down the timers.
pub struct Clock {
    interval: Duration,
    last: Instant,
}

impl Clock {
    /// Creates a new clock with the current time as internal state.
    pub fn new(interval: impl Into<Duration>) -> Self {
        Self {
            interval: interval.into(),
            last: Instant::now(),
        }
    }

    /// Set the clock state back to zero.
    pub fn reset(&mut self) {
        self.last = Instant::now()
    }

    /// Time left until the next cycle.
    pub fn remaining(&self) -> Duration {
        self.interval.saturating_sub(self.last.elapsed())
    }

    /// Check whether a full interval has elapsed, and start the next cycle if so.
    pub fn tick(&mut self) -> bool {
        let elapsed = self.last.elapsed();
        if elapsed < self.interval {
            return false;
        }

        if elapsed >= self.interval * 2 {
            // Reset back to zero, rather than trying to catch up.
            //
            // If the process was suspended, and a large amount of
            // time has elapsed until it is resumed, it should simply
            // continue at the next cycle running at its usual speed.
            self.reset();
        } else {
            self.last += self.interval;
        }

        true
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_tick() {
        let mut clock = Clock::new(Duration::from_millis(5));
        assert!(!clock.tick());
        std::thread::sleep(Duration::from_millis(6));
        assert!(clock.tick());
        assert!(clock.remaining() <= Duration::from_millis(5));
    }

    #[test]
    fn test_zero_interval_always_ticks() {
        let mut clock = Clock::new(Duration::ZERO);
        assert!(clock.tick());
        assert!(clock.tick());
        assert_eq!(clock.remaining(), Duration::ZERO);
    }
}
