// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::{collections::HashMap, fmt, hash::Hash, sync::Arc};

use fanout_region::RegionSetup;
use parking_lot::Mutex;
use tick::Clock;

use crate::{
    builder::{InMemoryInstanceBuilder, RegionSettings},
    region::InMemoryRegion,
};

struct InstanceInner<K, V>
where
    K: Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    name: String,
    settings: RegionSettings,
    regions: Mutex<HashMap<String, InMemoryRegion<K, V>>>,
}

/// One simulated cache backend holding named regions.
///
/// Each instance is independent of every other instance: a value written to a
/// region of one instance is invisible to the same region of another. Clones
/// share the same backend.
///
/// # Examples
///
/// ```
/// use fanout_memory::InMemoryInstance;
/// use fanout_region::RegionSetup;
/// use tick::Clock;
///
/// let instance = InMemoryInstance::<String, i32>::new(Clock::new_frozen(), "node-a");
///
/// let (_, first) = instance.ensure_region("users");
/// let (_, second) = instance.ensure_region("users");
/// assert_eq!(first, RegionSetup::Created);
/// assert_eq!(second, RegionSetup::AlreadyExists);
/// ```
pub struct InMemoryInstance<K, V>
where
    K: Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    inner: Arc<InstanceInner<K, V>>,
}

impl<K, V> Clone for InMemoryInstance<K, V>
where
    K: Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K, V> fmt::Debug for InMemoryInstance<K, V>
where
    K: Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InMemoryInstance")
            .field("name", &self.inner.name)
            .field("regions", &self.region_names())
            .finish_non_exhaustive()
    }
}

impl<K, V> InMemoryInstance<K, V>
where
    K: Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Creates an instance with default settings.
    #[must_use]
    pub fn new(clock: Clock, name: impl Into<String>) -> Self {
        Self::builder(clock, name).build()
    }

    /// Creates a builder for configuring an instance.
    #[must_use]
    pub fn builder(clock: Clock, name: impl Into<String>) -> InMemoryInstanceBuilder<K, V> {
        InMemoryInstanceBuilder::new(clock, name)
    }

    pub(crate) fn from_parts(name: String, settings: RegionSettings) -> Self {
        Self {
            inner: Arc::new(InstanceInner {
                name,
                settings,
                regions: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Returns the instance name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Returns the named region, creating it if needed.
    ///
    /// The call is idempotent: the returned [`RegionSetup`] tells whether the region
    /// was created by this call or already existed.
    pub fn ensure_region(&self, region: &str) -> (InMemoryRegion<K, V>, RegionSetup) {
        let mut regions = self.inner.regions.lock();
        if let Some(existing) = regions.get(region) {
            return (existing.clone(), RegionSetup::AlreadyExists);
        }

        let created = InMemoryRegion::from_settings(region, &self.inner.settings);
        regions.insert(region.to_owned(), created.clone());
        tracing::debug!(instance = %self.inner.name, region, "region created");
        (created, RegionSetup::Created)
    }

    /// Returns the named region if it exists.
    #[must_use]
    pub fn region(&self, region: &str) -> Option<InMemoryRegion<K, V>> {
        self.inner.regions.lock().get(region).cloned()
    }

    /// Returns the names of all regions, sorted.
    #[must_use]
    pub fn region_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.inner.regions.lock().keys().cloned().collect();
        names.sort();
        names
    }

    /// Drops a region and all its data, returning `true` if it existed.
    ///
    /// Strategies already handed out keep working on the dropped data; a later
    /// [`ensure_region`](Self::ensure_region) creates a fresh region.
    pub fn drop_region(&self, region: &str) -> bool {
        self.inner.regions.lock().remove(region).is_some()
    }
}
