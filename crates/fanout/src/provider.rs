// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Owner of the replicated caches of an application.

use std::{collections::HashMap, fmt, sync::Arc};

use fanout_region::{Error, RegionSetup, RegionStrategy};
use parking_lot::Mutex;
use tick::Clock;

use crate::{ReplicatedCache, ReplicatedCacheOptions, timestamp::Timestamper};

struct ProviderState<K, V, S> {
    running: bool,
    caches: HashMap<String, Arc<ReplicatedCache<K, V, S>>>,
}

/// Builds and owns one [`ReplicatedCache`] per region.
///
/// The provider creates the strategies of a region through a factory, builds the
/// cache with its default options, and hands out shared handles. All its caches
/// share one timestamp source. Strategies needing a live connection should be
/// created from connections opened up front; the factory itself is synchronous.
///
/// The factory runs without the provider's lock held, so it may call back into
/// the provider. When two callers build the same region at once, both factories
/// run and the first cache registered wins; the other caller gets that cache
/// with [`RegionSetup::AlreadyExists`].
///
/// A provider starts stopped. [`stop`](Self::stop) destroys and forgets every cache
/// it built.
///
/// # Examples
///
/// ```
/// use fanout::{CacheProvider, ReplicatedCacheOptions};
/// use fanout_memory::InMemoryInstance;
/// use fanout_region::RegionSetup;
/// use tick::Clock;
///
/// let clock = Clock::new_frozen();
/// let nodes = [
///     InMemoryInstance::<String, i32>::new(clock.clone(), "node-a"),
///     InMemoryInstance::<String, i32>::new(clock.clone(), "node-b"),
/// ];
///
/// let provider: CacheProvider<String, i32, _, _> = CacheProvider::new(
///     clock,
///     move |region: &str| Ok(nodes.iter().map(|n| n.ensure_region(region).0).collect()),
///     ReplicatedCacheOptions::default(),
/// );
/// provider.start();
///
/// let (users, setup) = provider.build_cache("users").expect("build failed");
/// assert_eq!(setup, RegionSetup::Created);
/// assert_eq!(users.strategy_count(), 2);
///
/// let (_, setup) = provider.build_cache("users").expect("build failed");
/// assert_eq!(setup, RegionSetup::AlreadyExists);
///
/// provider.stop();
/// assert!(provider.build_cache("users").is_err());
/// ```
pub struct CacheProvider<K, V, S, F> {
    factory: F,
    defaults: ReplicatedCacheOptions,
    clock: Clock,
    timestamper: Arc<Timestamper>,
    state: Mutex<ProviderState<K, V, S>>,
}

impl<K, V, S, F> fmt::Debug for CacheProvider<K, V, S, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        let mut regions: Vec<&String> = state.caches.keys().collect();
        regions.sort();
        f.debug_struct("CacheProvider")
            .field("defaults", &self.defaults)
            .field("running", &state.running)
            .field("regions", &regions)
            .finish_non_exhaustive()
    }
}

impl<K, V, S, F> CacheProvider<K, V, S, F>
where
    S: RegionStrategy<K, V>,
    F: Fn(&str) -> Result<Vec<S>, Error>,
{
    /// Creates a stopped provider.
    ///
    /// `factory` returns the strategies of a region, one per backend; `defaults`
    /// configures every cache (its region field is ignored). Every cache reads
    /// `clock`.
    pub fn new(clock: Clock, factory: F, defaults: ReplicatedCacheOptions) -> Self {
        Self {
            factory,
            defaults,
            timestamper: Arc::new(Timestamper::new(clock.clone())),
            clock,
            state: Mutex::new(ProviderState {
                running: false,
                caches: HashMap::new(),
            }),
        }
    }

    /// Starts the provider so that caches can be built.
    pub fn start(&self) {
        self.state.lock().running = true;
    }

    /// Stops the provider, destroying and forgetting every cache it built.
    ///
    /// Handles already given out stay usable; they are just no longer tracked.
    pub fn stop(&self) {
        let drained: Vec<_> = {
            let mut state = self.state.lock();
            state.running = false;
            state.caches.drain().map(|(_, cache)| cache).collect()
        };
        for cache in drained {
            cache.destroy();
        }
    }

    /// Returns `true` between [`start`](Self::start) and [`stop`](Self::stop).
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.state.lock().running
    }

    /// Returns the cache of `region`, building it on first use.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the provider is stopped, and otherwise any
    /// error from the factory or from building the cache.
    pub fn build_cache(&self, region: &str) -> Result<(Arc<ReplicatedCache<K, V, S>>, RegionSetup), Error> {
        if let Some(existing) = self.lookup(region)? {
            return Ok((existing, RegionSetup::AlreadyExists));
        }

        let strategies = (self.factory)(region)?;
        let cache = Arc::new(
            ReplicatedCache::builder::<K, V>(self.clock.clone(), region)
                .options(&self.defaults)
                .timestamper(Arc::clone(&self.timestamper))
                .strategies(strategies)
                .build()?,
        );

        let mut state = self.state.lock();
        if !state.running {
            return Err(stopped(region));
        }
        if let Some(existing) = state.caches.get(region) {
            return Ok((Arc::clone(existing), RegionSetup::AlreadyExists));
        }
        state.caches.insert(region.to_owned(), Arc::clone(&cache));
        Ok((cache, RegionSetup::Created))
    }

    fn lookup(&self, region: &str) -> Result<Option<Arc<ReplicatedCache<K, V, S>>>, Error> {
        let state = self.state.lock();
        if !state.running {
            return Err(stopped(region));
        }
        Ok(state.caches.get(region).cloned())
    }

    /// Returns the cache of `region` if it was built.
    #[must_use]
    pub fn cache(&self, region: &str) -> Option<Arc<ReplicatedCache<K, V, S>>> {
        self.state.lock().caches.get(region).cloned()
    }

    /// Returns the names of the regions with a built cache, sorted.
    #[must_use]
    pub fn regions(&self) -> Vec<String> {
        let mut regions: Vec<String> = self.state.lock().caches.keys().cloned().collect();
        regions.sort();
        regions
    }

    /// Returns the next timestamp from the source shared by all caches.
    pub fn next_timestamp(&self) -> u64 {
        self.timestamper.next()
    }
}

fn stopped(region: &str) -> Error {
    Error::configuration(format!("cannot build cache for region {region}: provider is stopped"))
}

#[cfg(test)]
mod tests {
    use fanout_region::testing::MockStrategy;

    use super::*;

    type Mock = MockStrategy<String, i32>;
    type Factory = fn(&str) -> Result<Vec<Mock>, Error>;

    fn mocks(region: &str) -> Result<Vec<Mock>, Error> {
        Ok(vec![MockStrategy::new(region), MockStrategy::new(region)])
    }

    fn provider(factory: Factory) -> CacheProvider<String, i32, Mock, Factory> {
        CacheProvider::new(Clock::new_frozen(), factory, ReplicatedCacheOptions::default())
    }

    #[test]
    fn new_provider_is_stopped() {
        let provider = provider(mocks);
        assert!(!provider.is_running());
        let error = provider.build_cache("r").expect_err("stopped provider should refuse");
        assert_eq!(error.kind(), fanout_region::ErrorKind::Configuration);
    }

    #[test]
    fn factory_errors_propagate() {
        let provider = provider(|_| Err(Error::backend("unreachable")));
        provider.start();
        let error = provider.build_cache("r").expect_err("factory error should propagate");
        assert!(error.is_backend());
        assert!(provider.regions().is_empty());
    }

    #[test]
    fn empty_factory_result_is_rejected() {
        let provider = provider(|_| Ok(Vec::new()));
        provider.start();
        assert!(provider.build_cache("r").is_err());
    }

    #[test]
    fn debug_lists_regions() {
        let provider = provider(mocks);
        provider.start();
        provider.build_cache("b").expect("build failed");
        provider.build_cache("a").expect("build failed");

        let debug = format!("{provider:?}");
        assert!(debug.contains("[\"a\", \"b\"]"), "{debug}");
    }

    type BoxedFactory = Box<dyn Fn(&str) -> Result<Vec<Mock>, Error>>;
    type Shared = Arc<CacheProvider<String, i32, Mock, BoxedFactory>>;

    /// Builds a provider whose factory first runs `hook` against the provider itself.
    fn reentrant(hook: impl Fn(&Shared, &str) -> Result<(), Error> + 'static) -> Shared {
        let provider = Arc::new_cyclic(|weak: &std::sync::Weak<CacheProvider<_, _, _, _>>| {
            let weak = weak.clone();
            let factory: BoxedFactory = Box::new(move |region: &str| {
                let provider = weak.upgrade().ok_or_else(|| Error::configuration("provider dropped"))?;
                hook(&provider, region)?;
                mocks(region)
            });
            CacheProvider::new(Clock::new_frozen(), factory, ReplicatedCacheOptions::default())
        });
        provider.start();
        provider
    }

    #[test]
    fn factory_may_call_back_into_the_provider() {
        let provider = reentrant(|provider, region| {
            assert!(provider.is_running());
            assert!(provider.cache(region).is_none());
            assert!(provider.regions().is_empty());
            Ok(())
        });

        let (_, setup) = provider.build_cache("users").expect("build failed");
        assert_eq!(setup, RegionSetup::Created);
        assert_eq!(provider.regions(), vec!["users".to_string()]);
    }

    #[test]
    fn region_built_during_factory_call_wins() {
        let nested = std::sync::atomic::AtomicBool::new(false);
        let provider = reentrant(move |provider, region| {
            if !nested.swap(true, std::sync::atomic::Ordering::SeqCst) {
                let (_, setup) = provider.build_cache(region)?;
                assert_eq!(setup, RegionSetup::Created);
            }
            Ok(())
        });

        let (outer, setup) = provider.build_cache("users").expect("build failed");
        assert_eq!(setup, RegionSetup::AlreadyExists);
        let registered = provider.cache("users").expect("cache should be registered");
        assert!(Arc::ptr_eq(&outer, &registered));
    }

    #[test]
    fn stop_during_factory_call_refuses_the_cache() {
        let provider = reentrant(|provider, _| {
            provider.stop();
            Ok(())
        });

        let error = provider.build_cache("users").expect_err("stopped provider should refuse");
        assert_eq!(error.kind(), fanout_region::ErrorKind::Configuration);
        assert!(provider.regions().is_empty());
    }
}
