// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The memoizing cache with request coalescing and grace-period refresh.

use std::{
    collections::{HashMap, hash_map},
    fmt::Debug,
    hash::Hash,
    sync::Arc,
    time::{Duration, Instant},
};

use futures::channel::oneshot;
use parking_lot::Mutex;
use tick::Clock;

use crate::{
    CacheOptions, CacheStats, Error, Lookup, Produced, Producer, Settle,
    builder::CacheBuilder,
    collector::Collector,
    entry::{Entry, FlightId, Waiter, notify},
    freshness::{Freshness, deadline_after},
    stats::{CacheActivity, Counters},
};

/// A memoizing cache in front of an asynchronous [`Producer`].
///
/// `Cache` serves values for a configurable time-to-live, coalesces concurrent misses for the
/// same key onto a single producer invocation, and optionally keeps serving a stale value for a
/// grace period while one background refresh runs.
///
/// A lookup classifies the key's entry:
///
/// - **Fresh** (`now < expires_at`): the value is returned immediately; the producer is not called.
/// - **Stale** (`expires_at <= now < expires_at + grace`): the old value is returned immediately
///   and, unless one is already running, a single background refresh is started.
/// - **Miss** (no value, or past grace): the caller waits for the producer. Only the first caller
///   starts an invocation; later callers join it and all receive the same outcome.
///
/// Failed invocations are never cached: every waiter receives the error, the entry is removed,
/// and the next lookup tries again.
///
/// Entries past their grace window are removed lazily by a collector that runs after successful
/// writes and settlements, at most once per
/// [`collection_interval`](CacheOptions::collection_interval). It can also be run explicitly with
/// [`collect`](Self::collect) or periodically with `spawn_collector` (`tokio` feature).
///
/// Cloning a `Cache` is cheap and all clones share the same entries.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use memoflight::{Cache, Settle};
/// use tick::Clock;
/// # futures::executor::block_on(async {
///
/// let cache = Cache::builder::<String, usize>(Clock::new_frozen())
///     .ttl(Duration::from_secs(30))
///     .grace(Duration::from_secs(10))
///     .producer(|key: String, settle: Settle<String, usize>| settle.ok(key.len()))
///     .build();
///
/// assert_eq!(cache.get("hello".to_string()).await?, 5);
/// assert!(cache.has(&"hello".to_string()));
/// assert_eq!(cache.size(), 1);
/// # Ok::<(), memoflight::Error>(())
/// # });
/// ```
pub struct Cache<K, V>
where
    K: Clone + Eq + Hash + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    shared: Arc<Shared<K, V>>,
}

pub(crate) struct Shared<K, V>
where
    K: Clone + Eq + Hash + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    options: CacheOptions,
    clock: Clock,
    producer: Option<Box<dyn Producer<K, V>>>,
    state: Mutex<State<K, V>>,
    counters: Counters,
}

struct State<K, V> {
    entries: HashMap<K, Entry<V>>,
    collector: Collector,
    next_flight: FlightId,
}

/// What a lookup decided while holding the lock.
enum Decision<V> {
    Fresh(V),
    Stale(V, Option<FlightId>),
    Pending(Option<FlightId>),
    NoProducer,
}

impl Cache<(), ()> {
    /// Creates a new cache builder.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::time::Duration;
    /// use memoflight::Cache;
    /// use tick::Clock;
    ///
    /// let cache = Cache::builder::<String, i32>(Clock::new_frozen())
    ///     .ttl(Duration::from_secs(60))
    ///     .build();
    /// assert_eq!(cache.size(), 0);
    /// ```
    #[must_use]
    pub fn builder<K, V>(clock: Clock) -> CacheBuilder<K, V>
    where
        K: Clone + Eq + Hash + Send + Sync + 'static,
        V: Clone + Send + Sync + 'static,
    {
        CacheBuilder::new(clock)
    }
}

impl<K, V> Cache<K, V>
where
    K: Clone + Eq + Hash + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub(crate) fn new(
        options: CacheOptions,
        clock: Clock,
        producer: Option<Box<dyn Producer<K, V>>>,
        counters: Counters,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                options,
                clock,
                producer,
                state: Mutex::new(State {
                    entries: HashMap::new(),
                    collector: Collector::new(options.collection_interval),
                    next_flight: 0,
                }),
                counters,
            }),
        }
    }

    /// Returns the options this cache was built with.
    #[must_use]
    pub fn options(&self) -> &CacheOptions {
        &self.shared.options
    }

    /// Returns the clock used for expiration decisions.
    #[must_use]
    pub fn clock(&self) -> &Clock {
        &self.shared.clock
    }

    /// Looks up `key`, starting or joining a producer invocation when needed.
    ///
    /// The returned [`Lookup`] exposes the synchronously available value through
    /// [`Lookup::current`] and resolves to the delivered result when awaited. See the
    /// type-level docs for how fresh, stale and missing entries are handled.
    ///
    /// A miss on a cache without a producer resolves to [`Error::NoProducer`] without creating
    /// an entry.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::time::Duration;
    /// use memoflight::Cache;
    /// use tick::Clock;
    /// # futures::executor::block_on(async {
    ///
    /// let cache = Cache::builder::<&str, i32>(Clock::new_frozen())
    ///     .ttl(Duration::from_secs(60))
    ///     .build();
    /// cache.set("answer", 42);
    ///
    /// let lookup = cache.get("answer");
    /// assert_eq!(lookup.current(), Some(&42));
    /// assert_eq!(lookup.await?, 42);
    /// # Ok::<(), memoflight::Error>(())
    /// # });
    /// ```
    pub fn get(&self, key: K) -> Lookup<V> {
        let (sender, receiver) = oneshot::channel();
        let current = self.shared.lookup(
            key,
            Box::new(move |result| {
                // The lookup may have been dropped; nobody is left to tell.
                let _ = sender.send(result);
            }),
        );
        Lookup::new(current, receiver)
    }

    /// Looks up `key`, delivering the result to `callback`.
    ///
    /// Returns the synchronously available value (fresh or stale), or `None` on a miss. The
    /// callback runs exactly once: immediately for fresh and stale values and configuration
    /// errors, or on the thread that settles the producer invocation for a miss. It never runs
    /// while the cache's lock is held, so it may call back into the cache.
    pub fn get_with<F>(&self, key: K, callback: F) -> Option<V>
    where
        F: FnOnce(Result<V, Error>) + Send + 'static,
    {
        self.shared.lookup(key, Box::new(callback))
    }

    /// Returns the value for `key` if it is fresh or within its grace period.
    ///
    /// Unlike [`get`](Self::get), this never creates entries, starts refreshes, or updates
    /// statistics.
    #[must_use]
    pub fn peek(&self, key: &K) -> Option<V> {
        let now = self.shared.clock.instant();
        let state = self.shared.state.lock();
        state
            .entries
            .get(key)
            .and_then(|entry| entry.servable(self.shared.options.grace, now))
            .cloned()
    }

    /// Stores `value` under `key` with the default TTL.
    ///
    /// See [`set_with_ttl`](Self::set_with_ttl).
    pub fn set(&self, key: K, value: V) -> &Self {
        self.set_with_ttl(key, value, self.shared.options.ttl)
    }

    /// Stores `value` under `key`, fresh for `ttl`.
    ///
    /// The write takes effect immediately: lookups waiting on the key receive `value`, and a
    /// producer invocation still outstanding for the key is superseded; its eventual settlement
    /// is discarded. Returns `self` so writes can be chained.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::time::Duration;
    /// use memoflight::Cache;
    /// use tick::Clock;
    ///
    /// let cache = Cache::builder::<&str, i32>(Clock::new_frozen()).build();
    /// cache
    ///     .set_with_ttl("a", 1, Duration::from_secs(60))
    ///     .set_with_ttl("b", 2, Duration::from_secs(60));
    /// assert_eq!(cache.size(), 2);
    /// ```
    pub fn set_with_ttl(&self, key: K, value: V, ttl: Duration) -> &Self {
        self.shared.write(key, value, ttl);
        self
    }

    /// Returns `true` if `key` has a value that is fresh or within its grace period.
    ///
    /// Whether a refresh is currently running for the key does not matter.
    #[must_use]
    pub fn has(&self, key: &K) -> bool {
        let now = self.shared.clock.instant();
        let state = self.shared.state.lock();
        state
            .entries
            .get(key)
            .is_some_and(|entry| entry.freshness(self.shared.options.grace, now).is_servable())
    }

    /// Returns the number of keys for which [`has`](Self::has) is `true`.
    ///
    /// This is computed on each call by scanning all entries.
    #[must_use]
    pub fn size(&self) -> usize {
        let now = self.shared.clock.instant();
        let grace = self.shared.options.grace;
        let state = self.shared.state.lock();
        state
            .entries
            .values()
            .filter(|entry| entry.freshness(grace, now).is_servable())
            .count()
    }

    /// Drops the value stored for `key`.
    ///
    /// An entry without an outstanding producer invocation is removed. If an invocation is
    /// outstanding, it stays registered together with its waiters and populates the entry
    /// when it settles. Returns `true` if a value was dropped.
    pub fn invalidate(&self, key: &K) -> bool {
        let mut state = self.shared.state.lock();
        let hash_map::Entry::Occupied(mut occupied) = state.entries.entry(key.clone()) else {
            return false;
        };

        let had_value = occupied.get().stored.is_some();
        if occupied.get().is_working() {
            occupied.get_mut().stored = None;
        } else {
            occupied.remove();
        }
        had_value
    }

    /// Sweeps the cache now, ignoring the collection interval.
    ///
    /// Removes every entry without an outstanding producer invocation whose value is past
    /// `expires_at + grace`, and returns the number of removed entries.
    pub fn collect(&self) -> usize {
        self.shared.collect()
    }

    /// Returns a snapshot of the cache's activity counters.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        self.shared.counters.snapshot()
    }

    /// Spawns a Tokio task that runs [`collect`](Self::collect) every `period` of the cache's
    /// clock.
    ///
    /// Ticks come from a [`tick::PeriodicTimer`] on the clock passed to [`Cache::builder`], so a
    /// clock driven by `tick::ClockControl` also drives the collector. The task holds only a
    /// weak reference to the cache and ends on the first tick after the last clone of the cache
    /// is dropped. Abort the returned handle to stop it sooner.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a Tokio runtime.
    #[cfg(feature = "tokio")]
    #[cfg_attr(docsrs, doc(cfg(feature = "tokio")))]
    pub fn spawn_collector(&self, period: Duration) -> tokio::task::JoinHandle<()> {
        use futures::StreamExt;

        let shared = Arc::downgrade(&self.shared);
        let mut ticks = tick::PeriodicTimer::new(&self.shared.clock, period);
        tokio::spawn(async move {
            while ticks.next().await.is_some() {
                let Some(shared) = shared.upgrade() else {
                    tracing::debug!("cache dropped, stopping collector task");
                    break;
                };
                shared.collect();
            }
        })
    }
}

impl<K, V> Shared<K, V>
where
    K: Clone + Eq + Hash + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn lookup(self: &Arc<Self>, key: K, waiter: Waiter<V>) -> Option<V> {
        let now = self.clock.instant();
        let grace = self.options.grace;
        let has_producer = self.producer.is_some();
        let mut waiter = Some(waiter);

        let decision = {
            let mut state = self.state.lock();
            let State { entries, next_flight, .. } = &mut *state;

            let served = entries.get_mut(&key).and_then(|entry| {
                let stored = entry.stored.as_ref()?;
                match stored.freshness(grace, now) {
                    Freshness::Fresh => Some(Decision::Fresh(stored.value.clone())),
                    Freshness::Stale => {
                        let value = stored.value.clone();
                        let refresh = (has_producer && !entry.is_working()).then(|| entry.begin_flight(next_flight));
                        Some(Decision::Stale(value, refresh))
                    }
                    Freshness::Expired => None,
                }
            });

            match served {
                Some(decision) => decision,
                None if !has_producer => Decision::NoProducer,
                None => {
                    let entry = entries.entry(key.clone()).or_insert_with(Entry::vacant);
                    if let Some(waiter) = waiter.take() {
                        entry.waiters.push(waiter);
                    }
                    let flight = (!entry.is_working()).then(|| entry.begin_flight(next_flight));
                    Decision::Pending(flight)
                }
            }
        };

        match decision {
            Decision::Fresh(value) => {
                self.counters.record(CacheActivity::Hit);
                if let Some(waiter) = waiter {
                    waiter(Ok(value.clone()));
                }
                Some(value)
            }
            Decision::Stale(value, refresh) => {
                self.counters.record(CacheActivity::StaleHit);
                if let Some(waiter) = waiter {
                    waiter(Ok(value.clone()));
                }
                if let Some(flight) = refresh {
                    tracing::debug!(flight, "serving stale value, refreshing in background");
                    self.start_flight(key, flight);
                }
                Some(value)
            }
            Decision::Pending(flight) => {
                self.counters.record(CacheActivity::Miss);
                if let Some(flight) = flight {
                    tracing::debug!(flight, "cache miss, invoking producer");
                    self.start_flight(key, flight);
                }
                None
            }
            Decision::NoProducer => {
                self.counters.record(CacheActivity::Miss);
                if let Some(waiter) = waiter {
                    waiter(Err(Error::NoProducer));
                }
                None
            }
        }
    }

    fn start_flight(self: &Arc<Self>, key: K, flight: FlightId) {
        let Some(producer) = &self.producer else {
            return;
        };

        self.counters.record(CacheActivity::ProducerCall);
        let settle = Settle::new(Arc::downgrade(self), key.clone(), flight);
        producer.produce(key, settle);
    }

    /// Applies the outcome of producer invocation `flight` for `key`.
    pub(crate) fn settle(&self, key: &K, flight: FlightId, outcome: Result<Produced<V>, Error>) {
        let now = self.clock.instant();
        let mut state = self.state.lock();

        let current = state.entries.get(key).is_some_and(|entry| entry.flight == Some(flight));
        if !current {
            drop(state);
            self.counters.record(CacheActivity::Superseded);
            tracing::debug!(flight, "discarding settlement of a superseded producer invocation");
            return;
        }

        match outcome {
            Ok(produced) => {
                let (value, ttl) = produced.into_parts();
                let expires_at = deadline_after(now, ttl.unwrap_or(self.options.ttl));
                let waiters = state
                    .entries
                    .get_mut(key)
                    .map(|entry| entry.install(value.clone(), expires_at))
                    .unwrap_or_default();
                self.collect_if_due(&mut state, now);
                drop(state);

                tracing::debug!(flight, waiters = waiters.len(), "producer settled");
                notify(waiters, &Ok(value));
            }
            Err(error) => {
                let waiters = state.entries.remove(key).map(|entry| entry.waiters).unwrap_or_default();
                drop(state);

                self.counters.record(CacheActivity::ProducerError);
                tracing::debug!(flight, waiters = waiters.len(), %error, "producer failed, entry removed");
                notify(waiters, &Err(error));
            }
        }
    }

    fn write(&self, key: K, value: V, ttl: Duration) {
        let now = self.clock.instant();
        let expires_at = deadline_after(now, ttl);
        let mut state = self.state.lock();

        let waiters = match state.entries.entry(key) {
            hash_map::Entry::Occupied(mut occupied) => {
                let entry = occupied.get_mut();
                if let Some(flight) = entry.flight {
                    tracing::debug!(flight, "write supersedes in-flight producer invocation");
                }
                entry.install(value.clone(), expires_at)
            }
            hash_map::Entry::Vacant(vacant) => {
                vacant.insert(Entry::with_value(value.clone(), expires_at));
                Vec::new()
            }
        };
        self.collect_if_due(&mut state, now);
        drop(state);

        self.counters.record(CacheActivity::Write);
        notify(waiters, &Ok(value));
    }

    fn collect(&self) -> usize {
        let now = self.clock.instant();
        let mut state = self.state.lock();
        let State { entries, collector, .. } = &mut *state;
        let removed = collector.sweep(entries, self.options.grace, now);
        drop(state);

        self.record_sweep(removed);
        removed
    }

    fn collect_if_due(&self, state: &mut State<K, V>, now: Instant) {
        let State { entries, collector, .. } = state;
        if let Some(removed) = collector.sweep_if_due(entries, self.options.grace, now) {
            self.record_sweep(removed);
        }
    }

    fn record_sweep(&self, removed: usize) {
        self.counters.record(CacheActivity::Sweep);
        self.counters
            .record_many(CacheActivity::Eviction, u64::try_from(removed).unwrap_or(u64::MAX));
        tracing::trace!(removed, "collector sweep finished");
    }
}

impl<K, V> Drop for Shared<K, V>
where
    K: Clone + Eq + Hash + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn drop(&mut self) {
        let entries = std::mem::take(&mut self.state.get_mut().entries);
        for entry in entries.into_values() {
            notify(entry.waiters, &Err(Error::Abandoned));
        }
    }
}

impl<K, V> Clone for Cache<K, V>
where
    K: Clone + Eq + Hash + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<K, V> Debug for Cache<K, V>
where
    K: Clone + Eq + Hash + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cache")
            .field("options", &self.shared.options)
            .field("has_producer", &self.shared.producer.is_some())
            .finish_non_exhaustive()
    }
}
