// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Builder for [`Cache`].

use std::{fmt::Debug, hash::Hash, time::Duration};

use tick::Clock;

use crate::{Cache, CacheOptions, Producer, stats::Counters};

/// Configures and constructs a [`Cache`].
///
/// Created by [`Cache::builder`]. Unset options keep the defaults listed on
/// [`CacheOptions`]; a cache built without a producer only serves values written with
/// [`Cache::set`].
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use memoflight::{Cache, Settle};
/// use tick::Clock;
///
/// let cache = Cache::builder::<String, String>(Clock::new_frozen())
///     .ttl(Duration::from_secs(60))
///     .grace(Duration::from_secs(30))
///     .collection_interval(Duration::from_secs(120))
///     .producer(|key: String, settle: Settle<String, String>| settle.ok(key.to_uppercase()))
///     .build();
///
/// assert_eq!(cache.options().grace, Duration::from_secs(30));
/// ```
pub struct CacheBuilder<K, V>
where
    K: Clone + Eq + Hash + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    clock: Clock,
    options: CacheOptions,
    producer: Option<Box<dyn Producer<K, V>>>,
    #[cfg(any(feature = "metrics", test))]
    meter: Option<opentelemetry::metrics::Meter>,
}

impl<K, V> CacheBuilder<K, V>
where
    K: Clone + Eq + Hash + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Creates a builder with default options and no producer.
    #[must_use]
    pub fn new(clock: Clock) -> Self {
        Self {
            clock,
            options: CacheOptions::default(),
            producer: None,
            #[cfg(any(feature = "metrics", test))]
            meter: None,
        }
    }

    /// Replaces all timing options at once, for example with values read from a config file.
    #[must_use]
    pub fn options(mut self, options: CacheOptions) -> Self {
        self.options = options;
        self
    }

    /// Sets how long values stay fresh unless the producer or writer says otherwise.
    #[must_use]
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.options.ttl = ttl;
        self
    }

    /// Sets how long past expiry a stale value keeps being served while it refreshes.
    #[must_use]
    pub fn grace(mut self, grace: Duration) -> Self {
        self.options.grace = grace;
        self
    }

    /// Sets the minimum time between two lazy collector sweeps.
    #[must_use]
    pub fn collection_interval(mut self, interval: Duration) -> Self {
        self.options.collection_interval = interval;
        self
    }

    /// Sets the producer called on misses and stale lookups.
    #[must_use]
    pub fn producer(mut self, producer: impl Producer<K, V> + 'static) -> Self {
        self.producer = Some(Box::new(producer));
        self
    }

    /// Sets an async function as the producer, spawning each invocation on Tokio.
    ///
    /// Shorthand for `.producer(SpawnProducer::new(func))`; see
    /// [`SpawnProducer`](crate::SpawnProducer).
    #[cfg(feature = "tokio")]
    #[cfg_attr(docsrs, doc(cfg(feature = "tokio")))]
    #[must_use]
    pub fn async_producer<F>(self, func: F) -> Self
    where
        crate::SpawnProducer<F>: Producer<K, V> + 'static,
    {
        self.producer(crate::SpawnProducer::new(func))
    }

    /// Reports every cache activity to a meter from `provider`.
    ///
    /// Each hit, miss, producer call, write, eviction and so on adds to the
    /// `memoflight.event.count` counter, with a `memoflight.activity` attribute naming what
    /// happened. [`Cache::stats`] keeps working either way.
    #[cfg(any(feature = "metrics", test))]
    #[cfg_attr(docsrs, doc(cfg(feature = "metrics")))]
    #[must_use]
    pub fn metrics(mut self, provider: &dyn opentelemetry::metrics::MeterProvider) -> Self {
        self.meter = Some(crate::metrics::create_meter(provider));
        self
    }

    /// Builds the cache.
    #[must_use]
    pub fn build(self) -> Cache<K, V> {
        #[cfg(any(feature = "metrics", test))]
        let counters = self.meter.as_ref().map_or_else(Counters::default, Counters::with_meter);
        #[cfg(not(any(feature = "metrics", test)))]
        let counters = Counters::default();

        Cache::new(self.options, self.clock, self.producer, counters)
    }
}

impl<K, V> Debug for CacheBuilder<K, V>
where
    K: Clone + Eq + Hash + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheBuilder")
            .field("options", &self.options)
            .field("has_producer", &self.producer.is_some())
            .finish_non_exhaustive()
    }
}
