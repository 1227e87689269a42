// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The replicated cache facade.

use std::{fmt, marker::PhantomData, sync::Arc};

use fanout_region::{Error, LockToken, RegionStrategy};
use tick::Clock;

use crate::{
    blocking::BlockingCache,
    builder::ReplicatedCacheBuilder,
    telemetry::{FanoutActivity, FanoutOperation, FanoutTelemetry, ext::ClockExt},
    timestamp::Timestamper,
};

/// Per-backend lock tokens from one facade lock, index-aligned with the strategies.
///
/// # Examples
///
/// ```
/// use fanout::LockTokens;
/// use fanout_region::LockToken;
///
/// let tokens = LockTokens::from(vec![LockToken::new("a"), LockToken::new("b")]);
/// assert_eq!(tokens.len(), 2);
/// assert_eq!(tokens.get(1).map(LockToken::as_str), Some("b"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LockTokens(Vec<LockToken>);

impl LockTokens {
    /// Returns the number of tokens.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if there are no tokens.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the token of the strategy at `index`.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&LockToken> {
        self.0.get(index)
    }

    /// Iterates the tokens in strategy order.
    pub fn iter(&self) -> std::slice::Iter<'_, LockToken> {
        self.0.iter()
    }

    /// Returns the tokens as a slice.
    #[must_use]
    pub fn as_slice(&self) -> &[LockToken] {
        &self.0
    }

    /// Consumes the collection and returns the tokens.
    #[must_use]
    pub fn into_vec(self) -> Vec<LockToken> {
        self.0
    }
}

impl From<Vec<LockToken>> for LockTokens {
    fn from(tokens: Vec<LockToken>) -> Self {
        Self(tokens)
    }
}

impl<'a> IntoIterator for &'a LockTokens {
    type Item = &'a LockToken;
    type IntoIter = std::slice::Iter<'a, LockToken>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// An error raised by one strategy in a fan-out.
struct StrategyFailure {
    strategy: usize,
    error: Error,
}

trait AtStrategy<T> {
    fn at(self, strategy: usize) -> Result<T, StrategyFailure>;
}

impl<T> AtStrategy<T> for Result<T, Error> {
    fn at(self, strategy: usize) -> Result<T, StrategyFailure> {
        self.map_err(|error| StrategyFailure { strategy, error })
    }
}

/// The keys a lock call covers.
enum LockScope<'a, K> {
    Key(&'a K),
    Keys(&'a [K]),
}

impl<K> Clone for LockScope<'_, K> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<K> Copy for LockScope<'_, K> {}

impl<K> LockScope<'_, K> {
    fn lock_operation(self) -> FanoutOperation {
        match self {
            Self::Key(_) => FanoutOperation::Lock,
            Self::Keys(_) => FanoutOperation::LockMany,
        }
    }

    fn unlock_operation(self) -> FanoutOperation {
        match self {
            Self::Key(_) => FanoutOperation::Unlock,
            Self::Keys(_) => FanoutOperation::UnlockMany,
        }
    }
}

/// One logical cache region replicated over several independent backends.
///
/// `ReplicatedCache` holds a fixed, ordered set of [`RegionStrategy`] instances, one
/// per backend, and presents them as a single cache:
///
/// - Reads go to one strategy picked uniformly at random.
/// - Writes (`put`, `remove`, `clear`) go to every strategy in order. The first
///   failure is returned at once; strategies already written are not rolled back
///   and later ones are not attempted, so a failed write can leave backends
///   diverged.
/// - Locks are all-or-nothing: every strategy is locked in order, and if one
///   fails, the locks already taken are released before the error is returned.
///
/// Operations run sequentially on the caller's task; the facade spawns nothing and
/// applies no timeouts of its own.
///
/// # Examples
///
/// ```
/// use fanout::ReplicatedCache;
/// use fanout_memory::InMemoryInstance;
/// use tick::Clock;
/// # futures::executor::block_on(async {
///
/// let clock = Clock::new_frozen();
/// let node_a = InMemoryInstance::<String, i32>::new(clock.clone(), "node-a");
/// let node_b = InMemoryInstance::<String, i32>::new(clock.clone(), "node-b");
///
/// let cache = ReplicatedCache::builder::<String, i32>(clock, "users")
///     .strategy(node_a.ensure_region("users").0)
///     .strategy(node_b.ensure_region("users").0)
///     .build()?;
///
/// cache.put(&"alice".to_string(), &42).await?;
/// assert_eq!(cache.get(&"alice".to_string()).await?, Some(42));
///
/// let tokens = cache.lock(&"alice".to_string()).await?;
/// cache.unlock(&"alice".to_string(), &tokens).await?;
/// # Ok::<(), fanout::Error>(())
/// # });
/// ```
pub struct ReplicatedCache<K, V, S> {
    region: String,
    strategies: Vec<S>,
    clock: Clock,
    timestamper: Arc<Timestamper>,
    timeout: u64,
    telemetry: FanoutTelemetry,
    _phantom: PhantomData<fn(K) -> V>,
}

impl<K, V, S> fmt::Debug for ReplicatedCache<K, V, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReplicatedCache")
            .field("region", &self.region)
            .field("strategies", &self.strategies.len())
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl<S> ReplicatedCache<(), (), S> {
    /// Creates a builder for a replicated cache over `region`.
    ///
    /// The clock stamps writes and times each fan-out call.
    ///
    /// # Examples
    ///
    /// ```
    /// use fanout::ReplicatedCache;
    /// use fanout_memory::InMemoryRegion;
    /// use std::time::Duration;
    /// use tick::Clock;
    ///
    /// let clock = Clock::new_frozen();
    /// let cache = ReplicatedCache::builder::<String, i32>(clock.clone(), "users")
    ///     .strategy(InMemoryRegion::<String, i32>::new(clock, "users"))
    ///     .lock_key_timeout(Duration::from_secs(10))
    ///     .build()
    ///     .expect("valid configuration");
    ///
    /// assert_eq!(cache.strategy_count(), 1);
    /// ```
    #[must_use]
    pub fn builder<K, V>(clock: Clock, region: impl Into<String>) -> ReplicatedCacheBuilder<K, V, S> {
        ReplicatedCacheBuilder::new(clock, region)
    }
}

impl<K, V, S> ReplicatedCache<K, V, S> {
    pub(crate) fn new(
        region: String,
        strategies: Vec<S>,
        clock: Clock,
        timestamper: Arc<Timestamper>,
        timeout: u64,
        telemetry: FanoutTelemetry,
    ) -> Self {
        Self {
            region,
            strategies,
            clock,
            timestamper,
            timeout,
            telemetry,
            _phantom: PhantomData,
        }
    }

    /// Returns the region name.
    #[must_use]
    pub fn region_name(&self) -> &str {
        &self.region
    }

    /// Returns the number of replicated backends.
    #[must_use]
    pub fn strategy_count(&self) -> usize {
        self.strategies.len()
    }

    /// Returns the strategies in fan-out order.
    #[must_use]
    pub fn strategies(&self) -> &[S] {
        &self.strategies
    }

    /// Returns the next logical timestamp, in units of [`ONE_MS`](crate::ONE_MS) per
    /// millisecond.
    ///
    /// Timestamps are strictly increasing and independent of the backends.
    pub fn next_timestamp(&self) -> u64 {
        self.timestamper.next()
    }

    /// Returns the configured lock key timeout in timestamp units.
    #[must_use]
    pub fn timeout(&self) -> u64 {
        self.timeout
    }

    /// Releases the facade.
    ///
    /// The facade owns no connections, so this only records the event; closing the
    /// backends is up to whoever created them.
    pub fn destroy(&self) {
        self.record(FanoutOperation::Destroy, FanoutActivity::Destroyed, None, None);
    }

    /// Returns a synchronous view of this cache.
    ///
    /// Each call drives the async operation to completion on the calling thread,
    /// so it suits backends that need no particular runtime, such as the in-memory
    /// one.
    #[must_use]
    pub fn blocking(&self) -> BlockingCache<'_, K, V, S> {
        BlockingCache::new(self)
    }

    fn pick(&self) -> usize {
        fastrand::usize(..self.strategies.len())
    }

    fn record(
        &self,
        operation: FanoutOperation,
        activity: FanoutActivity,
        strategy: Option<usize>,
        duration: Option<std::time::Duration>,
    ) {
        self.telemetry.record(&self.region, operation, activity, strategy, duration);
    }
}

impl<K, V, S> ReplicatedCache<K, V, S>
where
    K: Sync,
    V: Send + Sync,
    S: RegionStrategy<K, V>,
{
    /// Gets a value from one randomly chosen backend.
    ///
    /// No consistency check is made against the other backends.
    ///
    /// # Errors
    ///
    /// Returns the chosen backend's error.
    pub async fn get(&self, key: &K) -> Result<Option<V>, Error> {
        let index = self.pick();
        let timed = self.clock.timed_async(self.strategies[index].get(key)).await;

        let activity = match &timed.result {
            Ok(Some(_)) => FanoutActivity::Hit,
            Ok(None) => FanoutActivity::Miss,
            Err(_) => FanoutActivity::Error,
        };
        self.record(FanoutOperation::Get, activity, Some(index), Some(timed.duration));
        timed.result
    }

    /// Gets several values from one randomly chosen backend, index-aligned with
    /// `keys`.
    ///
    /// # Errors
    ///
    /// Returns the chosen backend's error.
    pub async fn get_many(&self, keys: &[K]) -> Result<Vec<Option<V>>, Error> {
        let index = self.pick();
        let timed = self.clock.timed_async(self.strategies[index].get_many(keys)).await;

        let activity = if timed.result.is_ok() {
            FanoutActivity::Hit
        } else {
            FanoutActivity::Error
        };
        self.record(FanoutOperation::GetMany, activity, Some(index), Some(timed.duration));
        timed.result
    }

    /// Stores a value on every backend in order.
    ///
    /// # Errors
    ///
    /// Returns the first backend error. Backends before the failing one keep the
    /// value; later backends are not attempted.
    pub async fn put(&self, key: &K, value: &V) -> Result<(), Error> {
        let fan_out = async {
            for (index, strategy) in self.strategies.iter().enumerate() {
                strategy.put(key, value).await.at(index)?;
            }
            Ok::<_, StrategyFailure>(())
        };
        self.observe(FanoutOperation::Put, fan_out, |()| FanoutActivity::Replicated).await
    }

    /// Stores several values on every backend in order.
    ///
    /// # Errors
    ///
    /// Returns an invalid argument error, before any backend is touched, if `keys`
    /// and `values` differ in length. Otherwise behaves like [`put`](Self::put).
    pub async fn put_many(&self, keys: &[K], values: &[V]) -> Result<(), Error> {
        if keys.len() != values.len() {
            return Err(Error::invalid_argument(format!(
                "put_many got {} keys but {} values",
                keys.len(),
                values.len()
            )));
        }

        let fan_out = async {
            for (index, strategy) in self.strategies.iter().enumerate() {
                strategy.put_many(keys, values).await.at(index)?;
            }
            Ok::<_, StrategyFailure>(())
        };
        self.observe(FanoutOperation::PutMany, fan_out, |()| FanoutActivity::Replicated).await
    }

    /// Removes a key from every backend in order.
    ///
    /// Returns `true` if any backend held the key.
    ///
    /// # Errors
    ///
    /// Returns the first backend error, with the same partial effect as
    /// [`put`](Self::put).
    pub async fn remove(&self, key: &K) -> Result<bool, Error> {
        let fan_out = async {
            let mut removed = false;
            for (index, strategy) in self.strategies.iter().enumerate() {
                removed |= strategy.remove(key).await.at(index)?;
            }
            Ok::<_, StrategyFailure>(removed)
        };
        self.observe(FanoutOperation::Remove, fan_out, |_| FanoutActivity::Replicated).await
    }

    /// Clears the region on every backend in order.
    ///
    /// # Errors
    ///
    /// Returns the first backend error, with the same partial effect as
    /// [`put`](Self::put).
    pub async fn clear(&self) -> Result<(), Error> {
        let fan_out = async {
            for (index, strategy) in self.strategies.iter().enumerate() {
                strategy.clear().await.at(index)?;
            }
            Ok::<_, StrategyFailure>(())
        };
        self.observe(FanoutOperation::Clear, fan_out, |()| FanoutActivity::Cleared).await
    }

    /// Locks a key on every backend.
    ///
    /// # Errors
    ///
    /// If any backend fails, the locks already taken on earlier backends are
    /// released (failures to release are logged and ignored), later backends are
    /// not called, and the original error is returned.
    pub async fn lock(&self, key: &K) -> Result<LockTokens, Error> {
        self.acquire(LockScope::Key(key)).await
    }

    /// Locks a set of keys together on every backend.
    ///
    /// # Errors
    ///
    /// Same rollback behavior as [`lock`](Self::lock).
    pub async fn lock_many(&self, keys: &[K]) -> Result<LockTokens, Error> {
        self.acquire(LockScope::Keys(keys)).await
    }

    /// Releases a key on every backend with the tokens from [`lock`](Self::lock).
    ///
    /// Every backend is attempted even if an earlier one fails.
    ///
    /// # Errors
    ///
    /// Returns an invalid argument error if the token count differs from the
    /// strategy count; otherwise the first backend error, after all backends were
    /// attempted.
    pub async fn unlock(&self, key: &K, tokens: &LockTokens) -> Result<(), Error> {
        self.release(LockScope::Key(key), tokens).await
    }

    /// Releases a set of keys on every backend with the tokens from
    /// [`lock_many`](Self::lock_many).
    ///
    /// # Errors
    ///
    /// Same as [`unlock`](Self::unlock).
    pub async fn unlock_many(&self, keys: &[K], tokens: &LockTokens) -> Result<(), Error> {
        self.release(LockScope::Keys(keys), tokens).await
    }

    async fn observe<T>(
        &self,
        operation: FanoutOperation,
        fan_out: impl Future<Output = Result<T, StrategyFailure>>,
        activity: impl FnOnce(&T) -> FanoutActivity,
    ) -> Result<T, Error> {
        let timed = self.clock.timed_async(fan_out).await;
        match timed.result {
            Ok(value) => {
                self.record(operation, activity(&value), None, Some(timed.duration));
                Ok(value)
            }
            Err(failure) => {
                self.record(operation, FanoutActivity::Error, Some(failure.strategy), Some(timed.duration));
                Err(failure.error)
            }
        }
    }

    async fn lock_one(strategy: &S, scope: LockScope<'_, K>) -> Result<LockToken, Error> {
        match scope {
            LockScope::Key(key) => strategy.lock(key).await,
            LockScope::Keys(keys) => strategy.lock_many(keys).await,
        }
    }

    async fn unlock_one(strategy: &S, scope: LockScope<'_, K>, token: &LockToken) -> Result<usize, Error> {
        match scope {
            LockScope::Key(key) => strategy.unlock(key, token).await.map(usize::from),
            LockScope::Keys(keys) => strategy.unlock_many(keys, token).await,
        }
    }

    async fn acquire(&self, scope: LockScope<'_, K>) -> Result<LockTokens, Error> {
        let operation = scope.lock_operation();
        let fan_out = async {
            let mut tokens = Vec::with_capacity(self.strategies.len());
            for (index, strategy) in self.strategies.iter().enumerate() {
                match Self::lock_one(strategy, scope).await {
                    Ok(token) => tokens.push(token),
                    Err(error) => {
                        self.roll_back(scope, &tokens).await;
                        return Err(StrategyFailure { strategy: index, error });
                    }
                }
            }
            Ok(LockTokens(tokens))
        };
        self.observe(operation, fan_out, |_| FanoutActivity::Locked).await
    }

    /// Releases the locks taken on the first `acquired.len()` strategies.
    async fn roll_back(&self, scope: LockScope<'_, K>, acquired: &[LockToken]) {
        let operation = scope.unlock_operation();
        for (index, (strategy, token)) in self.strategies.iter().zip(acquired).enumerate() {
            let activity = match Self::unlock_one(strategy, scope, token).await {
                Ok(_) => FanoutActivity::RolledBack,
                Err(_) => FanoutActivity::RollbackFailed,
            };
            self.record(operation, activity, Some(index), None);
        }
    }

    async fn release(&self, scope: LockScope<'_, K>, tokens: &LockTokens) -> Result<(), Error> {
        if tokens.len() != self.strategies.len() {
            return Err(Error::invalid_argument(format!(
                "{} lock tokens given for {} strategies",
                tokens.len(),
                self.strategies.len()
            )));
        }

        let fan_out = async {
            let mut first_failure = None;
            for (index, (strategy, token)) in self.strategies.iter().zip(tokens).enumerate() {
                if let Err(error) = Self::unlock_one(strategy, scope, token).await
                    && first_failure.is_none()
                {
                    first_failure = Some(StrategyFailure { strategy: index, error });
                }
            }
            first_failure.map_or(Ok(()), Err)
        };
        self.observe(scope.unlock_operation(), fan_out, |()| FanoutActivity::Unlocked).await
    }
}
