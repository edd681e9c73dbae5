//! Ledger clock: the single source of "now" for every timestamp written.

use crate::types::Timestamp;
use chrono::{Duration, SubsecRound, Utc};
use std::cell::Cell;

pub trait Clock {
    fn now(&self) -> Timestamp;
}

/// Production clock backed by the system time, truncated to the
/// microseconds that survive text storage.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Utc::now().trunc_subsecs(6)
    }
}

/// Hand-driven clock for tests and replays.
/// Every call to `now()` advances by `step` so consecutive rows get
/// distinct, ordered timestamps.
#[derive(Debug, Clone)]
pub struct ManualClock {
    current: Cell<Timestamp>,
    step:    Duration,
}

impl ManualClock {
    pub fn new(start: Timestamp) -> Self {
        Self { current: Cell::new(start), step: Duration::seconds(1) }
    }

    pub fn advance(&self, by: Duration) {
        self.current.set(self.current.get() + by);
    }

    pub fn peek(&self) -> Timestamp {
        self.current.get()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        let now = self.current.get();
        self.current.set(now + self.step);
        now
    }
}
