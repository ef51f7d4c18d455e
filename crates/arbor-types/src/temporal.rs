use std::fmt;

use serde::{Deserialize, Serialize};

/// Logical timestamp ordering every event and query of a workload.
///
/// This is an event counter, not wall-clock time. Workloads issue strictly
/// increasing timestamps and never share one between two events.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(u64);

impl Timestamp {
    /// Sentinel `valid_until` of a revision that has not been closed yet.
    pub const OPEN: Timestamp = Timestamp(u64::MAX);

    /// The genesis instant, before any event.
    pub const ZERO: Timestamp = Timestamp(0);

    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn get(self) -> u64 {
        self.0
    }

    /// The next tick.
    pub fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }

    /// Ticks elapsed since `earlier`, zero if `earlier` is not earlier.
    pub fn since(self, earlier: Timestamp) -> u64 {
        self.0.saturating_sub(earlier.0)
    }

    pub fn is_open(self) -> bool {
        self == Self::OPEN
    }
}

impl fmt::Debug for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_open() {
            write!(f, "t=open")
        } else {
            write!(f, "t={}", self.0)
        }
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_open() {
            write!(f, "open")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

impl From<u64> for Timestamp {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

/// Validity window of a stored revision.
///
/// A revision written at `since` is visible to reads at any `t` with
/// `since < t <= until`: the mutation at `since` itself still observes the
/// prior state, and a revision closed at `until` is still the truth at
/// `until`. At most one revision per key is open (`until == OPEN`).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Validity {
    pub since: Timestamp,
    pub until: Timestamp,
}

impl Validity {
    /// A window opened at `since` and never closed.
    pub fn open_from(since: Timestamp) -> Self {
        Self {
            since,
            until: Timestamp::OPEN,
        }
    }

    /// A window opened at `since` that inherits an existing upper bound.
    pub fn between(since: Timestamp, until: Timestamp) -> Self {
        Self { since, until }
    }

    /// Whether this revision is the truth as of `t`.
    pub fn is_active_at(&self, t: Timestamp) -> bool {
        self.since < t && t <= self.until
    }

    pub fn is_open(&self) -> bool {
        self.until.is_open()
    }

    /// Close the window at `t`.
    pub fn close_at(&mut self, t: Timestamp) {
        self.until = t;
    }
}

impl fmt::Debug for Validity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}]", self.since, self.until)
    }
}
