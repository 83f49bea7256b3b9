//! Strictly monotonic timestamp source.
//!
//! Last-write-wins merging is only sound if each peer's own stamps never
//! repeat or go backwards, even when the wall clock stalls or steps back.

use chrono::{DateTime, Duration, Utc};

/// Issues strictly increasing timestamps for the owner's own mutations.
#[derive(Debug)]
pub struct MonotonicClock {
    last: DateTime<Utc>,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            last: Utc::now() - Duration::milliseconds(1),
        }
    }

    /// Resume from a persisted snapshot so stamps stay monotonic across
    /// restarts with a skewed wall clock.
    pub fn resume_from(last: DateTime<Utc>) -> Self {
        Self { last }
    }

    /// Next stamp: the wall clock, nudged forward if it has not advanced.
    pub fn next(&mut self) -> DateTime<Utc> {
        let now = Utc::now();
        let stamp = if now > self.last {
            now
        } else {
            self.last + Duration::milliseconds(1)
        };
        self.last = stamp;
        stamp
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stamps_strictly_increase() {
        let mut clock = MonotonicClock::new();
        let mut prev = clock.next();
        for _ in 0..1_000 {
            let next = clock.next();
            assert!(next > prev);
            prev = next;
        }
    }

    #[test]
    fn test_resume_never_reissues_old_stamps() {
        let future = Utc::now() + Duration::seconds(30);
        let mut clock = MonotonicClock::resume_from(future);
        assert!(clock.next() > future);
    }
}
