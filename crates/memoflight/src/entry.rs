// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Per-key cache entries and their waiters.

use std::{
    mem,
    time::{Duration, Instant},
};

use crate::{
    Error,
    freshness::{Deadline, Freshness},
};

/// Identifies one producer invocation.
pub(crate) type FlightId = u64;

/// A pending callback awaiting the outcome of an in-flight producer invocation.
pub(crate) type Waiter<V> = Box<dyn FnOnce(Result<V, Error>) + Send>;

/// A value that was successfully produced or written.
#[derive(Debug)]
pub(crate) struct Stored<V> {
    pub(crate) value: V,
    pub(crate) expires_at: Deadline,
}

impl<V> Stored<V> {
    pub(crate) fn freshness(&self, grace: Duration, now: Instant) -> Freshness {
        Freshness::classify(self.expires_at, grace, now)
    }
}

pub(crate) struct Entry<V> {
    /// `None` until a value has been produced or written.
    pub(crate) stored: Option<Stored<V>>,
    /// The producer invocation whose settlement this entry accepts, if any.
    pub(crate) flight: Option<FlightId>,
    pub(crate) waiters: Vec<Waiter<V>>,
}

impl<V> Entry<V> {
    /// Placeholder created by the first missing lookup.
    pub(crate) fn vacant() -> Self {
        Self {
            stored: None,
            flight: None,
            waiters: Vec::new(),
        }
    }

    pub(crate) fn with_value(value: V, expires_at: Deadline) -> Self {
        Self {
            stored: Some(Stored { value, expires_at }),
            flight: None,
            waiters: Vec::new(),
        }
    }

    pub(crate) fn is_working(&self) -> bool {
        self.flight.is_some()
    }

    /// Claims a new flight id and marks the entry as working.
    pub(crate) fn begin_flight(&mut self, next_flight: &mut FlightId) -> FlightId {
        *next_flight = next_flight.wrapping_add(1);
        self.flight = Some(*next_flight);
        *next_flight
    }

    /// Installs a value, ending any flight, and hands back the waiters to notify.
    pub(crate) fn install(&mut self, value: V, expires_at: Deadline) -> Vec<Waiter<V>> {
        self.stored = Some(Stored { value, expires_at });
        self.flight = None;
        mem::take(&mut self.waiters)
    }

    /// Freshness of the stored value; an entry without a value counts as expired.
    pub(crate) fn freshness(&self, grace: Duration, now: Instant) -> Freshness {
        self.stored
            .as_ref()
            .map_or(Freshness::Expired, |stored| stored.freshness(grace, now))
    }

    /// Returns the value if it may still be served.
    pub(crate) fn servable(&self, grace: Duration, now: Instant) -> Option<&V> {
        let stored = self.stored.as_ref()?;
        stored.freshness(grace, now).is_servable().then_some(&stored.value)
    }

    /// Whether the collector may drop this entry.
    pub(crate) fn is_collectable(&self, grace: Duration, now: Instant) -> bool {
        !self.is_working() && self.freshness(grace, now) == Freshness::Expired
    }
}

/// Delivers `result` to every waiter in registration order.
pub(crate) fn notify<V: Clone>(waiters: Vec<Waiter<V>>, result: &Result<V, Error>) {
    for waiter in waiters {
        waiter(result.clone());
    }
}
