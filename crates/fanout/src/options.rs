// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::time::Duration;

const DEFAULT_LOCK_KEY_TIMEOUT: Duration = Duration::from_secs(5);

/// Settings for a [`ReplicatedCache`](crate::ReplicatedCache).
///
/// With the `serde` feature, options deserialize from configuration. Durations use
/// ISO 8601 (`"PT5S"`) or the friendly format (`"5s"`); missing fields keep their
/// defaults.
///
/// # Examples
///
/// ```
/// use fanout::ReplicatedCacheOptions;
/// use std::time::Duration;
///
/// let options = ReplicatedCacheOptions::new("users")
///     .lock_key_timeout(Duration::from_secs(10))
///     .logs(true);
///
/// assert_eq!(options.get_region(), "users");
/// assert_eq!(options.get_lock_key_timeout(), Duration::from_secs(10));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize), serde(default))]
pub struct ReplicatedCacheOptions {
    region: String,
    #[cfg_attr(feature = "serde", serde(with = "fanout_region::serde_duration"))]
    lock_key_timeout: Duration,
    logs: bool,
}

impl Default for ReplicatedCacheOptions {
    fn default() -> Self {
        Self {
            region: String::new(),
            lock_key_timeout: DEFAULT_LOCK_KEY_TIMEOUT,
            logs: false,
        }
    }
}

impl ReplicatedCacheOptions {
    /// Creates default options for a region.
    #[must_use]
    pub fn new(region: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            ..Self::default()
        }
    }

    /// Sets the region name.
    #[must_use]
    pub fn region(mut self, region: impl Into<String>) -> Self {
        self.region = region.into();
        self
    }

    /// Sets the lock key timeout reported by [`timeout`](crate::ReplicatedCache::timeout).
    #[must_use]
    pub fn lock_key_timeout(mut self, timeout: Duration) -> Self {
        self.lock_key_timeout = timeout;
        self
    }

    /// Enables or disables structured logging.
    #[must_use]
    pub fn logs(mut self, enabled: bool) -> Self {
        self.logs = enabled;
        self
    }

    /// Returns the region name.
    #[must_use]
    pub fn get_region(&self) -> &str {
        &self.region
    }

    /// Returns the lock key timeout.
    #[must_use]
    pub fn get_lock_key_timeout(&self) -> Duration {
        self.lock_key_timeout
    }

    /// Returns `true` if structured logging is enabled.
    #[must_use]
    pub fn logs_enabled(&self) -> bool {
        self.logs
    }
}
