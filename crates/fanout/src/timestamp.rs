// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Logical timestamps for cache entries and lock timeouts.

use std::{
    sync::atomic::{AtomicU64, Ordering},
    time::{Duration, UNIX_EPOCH},
};

use tick::Clock;

/// Number of timestamp units in one millisecond.
///
/// One unit is a 100 nanosecond tick.
pub const ONE_MS: u64 = 10_000;

const NANOS_PER_UNIT: u128 = 100;

/// A source of strictly increasing timestamps.
///
/// Timestamps follow the clock's system time in 100 nanosecond ticks since the
/// Unix epoch, but never repeat or go backwards: when two calls land on the same
/// tick, or the clock steps back, the later call gets the previous value plus one.
///
/// # Examples
///
/// ```
/// use fanout::Timestamper;
/// use tick::Clock;
///
/// let timestamper = Timestamper::new(Clock::new_frozen());
/// let first = timestamper.next();
/// let second = timestamper.next();
/// assert!(second > first);
/// ```
#[derive(Debug)]
pub struct Timestamper {
    clock: Clock,
    last: AtomicU64,
}

impl Timestamper {
    /// Creates a timestamp source reading `clock`.
    #[must_use]
    pub fn new(clock: Clock) -> Self {
        Self {
            clock,
            last: AtomicU64::new(0),
        }
    }

    /// Returns the next timestamp.
    pub fn next(&self) -> u64 {
        let now = self.now();
        let previous = self
            .last
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |last| Some(now.max(last.saturating_add(1))))
            .unwrap_or_else(|last| last);
        now.max(previous.saturating_add(1))
    }

    fn now(&self) -> u64 {
        let since_epoch = self.clock.system_time().duration_since(UNIX_EPOCH).unwrap_or_default();
        u64::try_from(since_epoch.as_nanos() / NANOS_PER_UNIT).unwrap_or(u64::MAX)
    }
}

/// Converts a duration to timestamp units.
#[must_use]
pub fn to_timestamp_units(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis())
        .unwrap_or(u64::MAX)
        .saturating_mul(ONE_MS)
}
