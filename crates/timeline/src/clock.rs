//! Time sources.

use std::sync::{Mutex, OnceLock};
use std::time::Instant;

use crate::entry::HighResTimeStamp;

static TIME_ORIGIN: OnceLock<Instant> = OnceLock::new();

/// The instant all [`HighResTimeStamp`]s are measured from.
///
/// Fixed the first time any timestamp is read.
pub fn time_origin() -> Instant {
    *TIME_ORIGIN.get_or_init(Instant::now)
}

/// A source of high resolution timestamps.
pub trait Clock: Send + Sync {
    fn now(&self) -> HighResTimeStamp;
}

/// Monotonic clock backed by [`Instant`].
#[derive(Debug, Clone, Copy, Default)]
pub struct MonotonicClock;

impl Clock for MonotonicClock {
    #[inline]
    fn now(&self) -> HighResTimeStamp {
        HighResTimeStamp::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug, Default)]
pub struct FixedClock {
    current: Mutex<HighResTimeStamp>,
}

impl FixedClock {
    pub fn new(start: HighResTimeStamp) -> Self {
        Self {
            current: Mutex::new(start),
        }
    }

    pub fn set(&self, ts: HighResTimeStamp) {
        if let Ok(mut current) = self.current.lock() {
            *current = ts;
        }
    }

    pub fn advance(&self, ms: f64) {
        if let Ok(mut current) = self.current.lock() {
            *current = HighResTimeStamp::from_millis(current.as_millis() + ms);
        }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> HighResTimeStamp {
        self.current
            .lock()
            .map(|current| *current)
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_clock_advance() {
        let clock = FixedClock::new(HighResTimeStamp::from_millis(5.0));
        assert_eq!(clock.now(), HighResTimeStamp::from_millis(5.0));

        clock.advance(2.5);
        assert_eq!(clock.now(), HighResTimeStamp::from_millis(7.5));

        clock.set(HighResTimeStamp::ZERO);
        assert_eq!(clock.now(), HighResTimeStamp::ZERO);
    }

    #[test]
    fn test_monotonic_clock_is_relative_to_origin() {
        let now = MonotonicClock.now();
        assert!(now.as_millis() >= 0.0);
    }
}
