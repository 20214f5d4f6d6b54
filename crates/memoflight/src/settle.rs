// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The handle a producer uses to report the outcome of one invocation.

use std::{
    fmt::Debug,
    hash::Hash,
    sync::Weak,
    time::Duration,
};

use crate::{
    Error,
    cache::Shared,
    entry::FlightId,
};

/// A value returned by a producer, optionally overriding the cache's default TTL.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use memoflight::Produced;
///
/// let produced = Produced::new("page").with_ttl(Duration::from_secs(30));
/// assert_eq!(produced.ttl(), Some(Duration::from_secs(30)));
///
/// let produced: Produced<&str> = "page".into();
/// assert_eq!(produced.ttl(), None);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Produced<V> {
    value: V,
    ttl: Option<Duration>,
}

impl<V> Produced<V> {
    /// Wraps a value that uses the cache's default TTL.
    pub fn new(value: V) -> Self {
        Self { value, ttl: None }
    }

    /// Overrides the TTL for this value.
    #[must_use]
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Returns the produced value.
    pub fn value(&self) -> &V {
        &self.value
    }

    /// Returns the TTL override, if any.
    pub fn ttl(&self) -> Option<Duration> {
        self.ttl
    }

    /// Splits into the value and the TTL override.
    pub fn into_parts(self) -> (V, Option<Duration>) {
        (self.value, self.ttl)
    }
}

impl<V> From<V> for Produced<V> {
    fn from(value: V) -> Self {
        Self::new(value)
    }
}

/// Reports the outcome of one producer invocation back to the cache.
///
/// Every [`Producer`](crate::Producer) invocation receives exactly one `Settle`. Consuming it
/// through [`ok`](Self::ok), [`ok_with_ttl`](Self::ok_with_ttl), [`err`](Self::err) or
/// [`settle`](Self::settle) delivers the outcome to every lookup waiting on the key:
///
/// - on success the value is cached for its TTL and handed to all waiters;
/// - on failure all waiters receive the same [`Error::Producer`] and the entry is removed, so
///   the next lookup starts a fresh invocation.
///
/// A `Settle` may be sent to another thread or task and used long after `produce` returned.
/// Dropping it without settling delivers [`Error::Abandoned`]. A producer that holds on to it
/// forever leaves the key waiting forever; there is no timeout.
///
/// If an explicit [`set`](crate::Cache::set) replaced the entry while the invocation was
/// outstanding, the settlement is discarded.
pub struct Settle<K, V>
where
    K: Clone + Eq + Hash + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    shared: Weak<Shared<K, V>>,
    key: K,
    flight: FlightId,
    settled: bool,
}

impl<K, V> Settle<K, V>
where
    K: Clone + Eq + Hash + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub(crate) fn new(shared: Weak<Shared<K, V>>, key: K, flight: FlightId) -> Self {
        Self {
            shared,
            key,
            flight,
            settled: false,
        }
    }

    /// Returns the key being produced.
    #[must_use]
    pub fn key(&self) -> &K {
        &self.key
    }

    /// Settles successfully with the cache's default TTL.
    pub fn ok(self, value: V) {
        self.complete(Ok(Produced::new(value)));
    }

    /// Settles successfully with a TTL specific to this value.
    pub fn ok_with_ttl(self, value: V, ttl: Duration) {
        self.complete(Ok(Produced::new(value).with_ttl(ttl)));
    }

    /// Settles with an error. The error is delivered to all waiters and is not cached.
    pub fn err(self, error: impl Into<Box<dyn std::error::Error + Send + Sync>>) {
        self.complete(Err(Error::from_source(error)));
    }

    /// Settles with the outcome of a fallible computation.
    pub fn settle<P, E>(self, result: Result<P, E>)
    where
        P: Into<Produced<V>>,
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        self.complete(result.map(Into::into).map_err(Error::from_source));
    }

    fn complete(mut self, outcome: Result<Produced<V>, Error>) {
        self.deliver(outcome);
    }

    fn deliver(&mut self, outcome: Result<Produced<V>, Error>) {
        if self.settled {
            return;
        }
        self.settled = true;

        match self.shared.upgrade() {
            Some(shared) => shared.settle(&self.key, self.flight, outcome),
            None => tracing::trace!(flight = self.flight, "cache dropped before settlement"),
        }
    }
}

impl<K, V> Drop for Settle<K, V>
where
    K: Clone + Eq + Hash + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn drop(&mut self) {
        if !self.settled {
            tracing::debug!(flight = self.flight, "settle handle dropped without an outcome");
            self.deliver(Err(Error::Abandoned));
        }
    }
}

impl<K, V> Debug for Settle<K, V>
where
    K: Clone + Eq + Hash + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Settle")
            .field("flight", &self.flight)
            .field("settled", &self.settled)
            .finish_non_exhaustive()
    }
}
