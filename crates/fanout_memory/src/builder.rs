// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Builder for configuring in-memory backend instances.
//!
//! Settings apply to every region the instance creates. The builder keeps moka's
//! types out of the public API.

use std::hash::Hash;
use std::marker::PhantomData;
use std::time::Duration;

use fanout_region::LockOptions;
use tick::Clock;

use crate::instance::InMemoryInstance;

/// Per-region settings shared by all regions of one instance.
#[derive(Debug, Clone)]
pub(crate) struct RegionSettings {
    pub(crate) clock: Clock,
    pub(crate) max_capacity: Option<u64>,
    pub(crate) time_to_live: Option<Duration>,
    pub(crate) time_to_idle: Option<Duration>,
    pub(crate) lock: LockOptions,
}

impl RegionSettings {
    pub(crate) fn new(clock: Clock) -> Self {
        Self {
            clock,
            max_capacity: None,
            time_to_live: None,
            time_to_idle: None,
            lock: LockOptions::default(),
        }
    }
}

/// Builder for configuring an `InMemoryInstance`.
///
/// # Examples
///
/// ```
/// use fanout_memory::InMemoryInstance;
/// use fanout_region::LockOptions;
/// use std::time::Duration;
/// use tick::Clock;
///
/// let clock = Clock::new_frozen();
/// let instance = InMemoryInstance::<String, i32>::builder(clock, "node-a")
///     .max_capacity(1000)
///     .time_to_live(Duration::from_secs(300))
///     .time_to_idle(Duration::from_secs(60))
///     .lock_options(LockOptions::default().key_timeout(Duration::from_secs(2)))
///     .build();
///
/// assert_eq!(instance.name(), "node-a");
/// ```
#[derive(Debug)]
pub struct InMemoryInstanceBuilder<K, V> {
    name: String,
    settings: RegionSettings,
    _phantom: PhantomData<(K, V)>,
}

impl<K, V> InMemoryInstanceBuilder<K, V> {
    /// Creates a new builder with default settings.
    ///
    /// Regions are unbounded, never expire entries, and use default lock options.
    /// Lock expiry is measured on `clock`.
    #[must_use]
    pub fn new(clock: Clock, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            settings: RegionSettings::new(clock),
            _phantom: PhantomData,
        }
    }

    /// Sets the maximum number of entries each region holds.
    ///
    /// Once reached, entries are evicted with moka's `TinyLFU` policy.
    #[must_use]
    pub fn max_capacity(mut self, capacity: u64) -> Self {
        self.settings.max_capacity = Some(capacity);
        self
    }

    /// Sets the time-to-live for entries, measured from insertion.
    #[must_use]
    pub fn time_to_live(mut self, duration: Duration) -> Self {
        self.settings.time_to_live = Some(duration);
        self
    }

    /// Sets the time-to-idle for entries, reset on each access.
    #[must_use]
    pub fn time_to_idle(mut self, duration: Duration) -> Self {
        self.settings.time_to_idle = Some(duration);
        self
    }

    /// Sets the lock options used by every region.
    #[must_use]
    pub fn lock_options(mut self, options: LockOptions) -> Self {
        self.settings.lock = options;
        self
    }

    /// Builds the configured `InMemoryInstance`.
    #[must_use]
    pub fn build(self) -> InMemoryInstance<K, V>
    where
        K: Hash + Eq + Send + Sync + 'static,
        V: Clone + Send + Sync + 'static,
    {
        InMemoryInstance::from_parts(self.name, self.settings)
    }
}
