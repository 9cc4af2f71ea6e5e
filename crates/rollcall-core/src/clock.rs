//! Wall-clock source for attendance timestamps.

use chrono::{Local, NaiveDateTime};

/// Supplies the local date and time a mark is stamped with.
pub trait Clock {
    fn now(&self) -> NaiveDateTime;
}

/// Local system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// Clock pinned to one instant. Movable with [`FixedClock::set`].
#[derive(Debug, Clone)]
pub struct FixedClock {
    at: std::cell::Cell<NaiveDateTime>,
}

impl FixedClock {
    pub fn new(at: NaiveDateTime) -> Self {
        Self {
            at: std::cell::Cell::new(at),
        }
    }

    pub fn set(&self, at: NaiveDateTime) {
        self.at.set(at);
    }
}

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        self.at.get()
    }
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now(&self) -> NaiveDateTime {
        (**self).now()
    }
}
