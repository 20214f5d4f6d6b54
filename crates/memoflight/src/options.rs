// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Cache configuration.

use std::time::Duration;

/// Default interval between lazy collector sweeps.
pub const DEFAULT_COLLECTION_INTERVAL: Duration = Duration::from_secs(60);

/// Timing configuration of a [`Cache`](crate::Cache), resolved once at construction.
///
/// | Field                 | Default | Meaning                                                    |
/// |-----------------------|---------|------------------------------------------------------------|
/// | `ttl`                 | 0       | How long a produced or written value stays fresh.          |
/// | `grace`               | 0       | How long past `ttl` a stale value is still served.         |
/// | `collection_interval` | 60 s    | Minimum time between two lazy collector sweeps.            |
///
/// With the default `ttl` of zero every value is already stale when it arrives, so a cache
/// with default options only coalesces concurrent misses.
///
/// With the `serde` feature, durations are (de)serialized as fractional seconds and missing
/// fields take their defaults:
///
/// ```
/// # #[cfg(feature = "serde")]
/// # {
/// use std::time::Duration;
/// use memoflight::CacheOptions;
///
/// let options: CacheOptions = serde_json::from_str(r#"{ "ttl": 30, "grace": 0.5 }"#).unwrap();
/// assert_eq!(options.ttl, Duration::from_secs(30));
/// assert_eq!(options.grace, Duration::from_millis(500));
/// assert_eq!(options.collection_interval, Duration::from_secs(60));
/// # }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
#[non_exhaustive]
pub struct CacheOptions {
    /// Time a value stays fresh when neither the producer nor the writer specifies one.
    #[cfg_attr(feature = "serde", serde(with = "seconds"))]
    pub ttl: Duration,

    /// Additional time after expiry during which the stale value is served while refreshing.
    #[cfg_attr(feature = "serde", serde(with = "seconds"))]
    pub grace: Duration,

    /// Minimum time between two sweeps of the lazy collector.
    #[cfg_attr(feature = "serde", serde(with = "seconds"))]
    pub collection_interval: Duration,
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self {
            ttl: Duration::ZERO,
            grace: Duration::ZERO,
            collection_interval: DEFAULT_COLLECTION_INTERVAL,
        }
    }
}

impl CacheOptions {
    /// Creates options with the default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the default time-to-live.
    #[must_use]
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Sets the grace period.
    #[must_use]
    pub fn with_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    /// Sets the minimum interval between collector sweeps.
    #[must_use]
    pub fn with_collection_interval(mut self, interval: Duration) -> Self {
        self.collection_interval = interval;
        self
    }
}

#[cfg(feature = "serde")]
mod seconds {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer, de::Error as _};

    pub(super) fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(duration.as_secs_f64())
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(D::Error::custom)
    }
}
