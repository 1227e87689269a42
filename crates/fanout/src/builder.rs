// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Builder for replicated caches.

use std::{marker::PhantomData, sync::Arc, time::Duration};

use fanout_region::{Error, RegionStrategy};
use tick::Clock;

use crate::{
    ReplicatedCache, ReplicatedCacheOptions,
    telemetry::FanoutTelemetry,
    timestamp::{Timestamper, to_timestamp_units},
};

/// Builder for a [`ReplicatedCache`].
///
/// Created by [`ReplicatedCache::builder`]. Strategies are kept in the order they
/// are added; that order is the fan-out order for writes and locks.
///
/// # Examples
///
/// ```
/// use fanout::{ReplicatedCache, ReplicatedCacheOptions};
/// use fanout_memory::InMemoryInstance;
/// use std::time::Duration;
/// use tick::Clock;
///
/// let clock = Clock::new_frozen();
/// let instances = [
///     InMemoryInstance::<String, i32>::new(clock.clone(), "node-a"),
///     InMemoryInstance::<String, i32>::new(clock.clone(), "node-b"),
/// ];
///
/// let cache = ReplicatedCache::builder::<String, i32>(clock, "users")
///     .strategies(instances.iter().map(|i| i.ensure_region("users").0))
///     .options(&ReplicatedCacheOptions::default().lock_key_timeout(Duration::from_secs(2)))
///     .logs()
///     .build()
///     .expect("valid configuration");
///
/// assert_eq!(cache.strategy_count(), 2);
/// assert_eq!(cache.timeout(), 2_000 * fanout::ONE_MS);
/// ```
#[derive(Debug)]
pub struct ReplicatedCacheBuilder<K, V, S> {
    region: String,
    strategies: Vec<S>,
    clock: Clock,
    lock_key_timeout: Duration,
    logs: bool,
    timestamper: Option<Arc<Timestamper>>,
    _phantom: PhantomData<fn(K) -> V>,
}

impl<K, V, S> ReplicatedCacheBuilder<K, V, S> {
    pub(crate) fn new(clock: Clock, region: impl Into<String>) -> Self {
        let defaults = ReplicatedCacheOptions::default();
        Self {
            region: region.into(),
            strategies: Vec::new(),
            clock,
            lock_key_timeout: defaults.get_lock_key_timeout(),
            logs: defaults.logs_enabled(),
            timestamper: None,
            _phantom: PhantomData,
        }
    }

    /// Adds one backend strategy.
    #[must_use]
    pub fn strategy(mut self, strategy: S) -> Self {
        self.strategies.push(strategy);
        self
    }

    /// Adds several backend strategies, in iteration order.
    #[must_use]
    pub fn strategies(mut self, strategies: impl IntoIterator<Item = S>) -> Self {
        self.strategies.extend(strategies);
        self
    }

    /// Sets the lock key timeout reported by [`ReplicatedCache::timeout`].
    #[must_use]
    pub fn lock_key_timeout(mut self, timeout: Duration) -> Self {
        self.lock_key_timeout = timeout;
        self
    }

    /// Applies the lock key timeout and logging switch from `options`.
    ///
    /// The region passed to [`ReplicatedCache::builder`] is kept.
    #[must_use]
    pub fn options(mut self, options: &ReplicatedCacheOptions) -> Self {
        self.lock_key_timeout = options.get_lock_key_timeout();
        self.logs = options.logs_enabled();
        self
    }

    /// Enables structured logging of cache activity.
    ///
    /// Has no effect unless the `logs` feature is enabled.
    #[must_use]
    pub fn logs(mut self) -> Self {
        self.logs = true;
        self
    }

    /// Shares a timestamp source with other caches.
    ///
    /// By default every cache gets its own, reading the builder's clock.
    #[must_use]
    pub fn timestamper(mut self, timestamper: Arc<Timestamper>) -> Self {
        self.timestamper = Some(timestamper);
        self
    }
}

impl<K, V, S> ReplicatedCacheBuilder<K, V, S>
where
    S: RegionStrategy<K, V>,
{
    /// Builds the cache, validating every strategy once.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the region name is empty or no strategy
    /// was added, and the first error reported by a strategy's `validate`.
    pub fn build(self) -> Result<ReplicatedCache<K, V, S>, Error> {
        if self.region.is_empty() {
            return Err(Error::configuration("region name must not be empty"));
        }
        if self.strategies.is_empty() {
            return Err(Error::configuration(format!(
                "replicated cache for region {} needs at least one strategy",
                self.region
            )));
        }
        for strategy in &self.strategies {
            strategy.validate()?;
        }

        let timestamper = self
            .timestamper
            .unwrap_or_else(|| Arc::new(Timestamper::new(self.clock.clone())));

        Ok(ReplicatedCache::new(
            self.region,
            self.strategies,
            self.clock,
            timestamper,
            to_timestamp_units(self.lock_key_timeout),
            FanoutTelemetry::new(self.logs),
        ))
    }
}
