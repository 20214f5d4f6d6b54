// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Lazy, interval-gated eviction of entries that left their grace window.

use std::{
    collections::HashMap,
    hash::Hash,
    time::{Duration, Instant},
};

use crate::entry::Entry;

#[derive(Debug)]
pub(crate) struct Collector {
    interval: Duration,
    last_run: Option<Instant>,
}

impl Collector {
    pub(crate) fn new(interval: Duration) -> Self {
        Self { interval, last_run: None }
    }

    /// A collector that never ran is always due.
    pub(crate) fn is_due(&self, now: Instant) -> bool {
        self.last_run
            .is_none_or(|last_run| now.saturating_duration_since(last_run) >= self.interval)
    }

    /// Sweeps only when the interval has elapsed. Returns `None` when the sweep was skipped.
    pub(crate) fn sweep_if_due<K: Eq + Hash, V>(
        &mut self,
        entries: &mut HashMap<K, Entry<V>>,
        grace: Duration,
        now: Instant,
    ) -> Option<usize> {
        self.is_due(now).then(|| self.sweep(entries, grace, now))
    }

    /// Removes every idle entry at or past `expires_at + grace` and returns how many were removed.
    pub(crate) fn sweep<K: Eq + Hash, V>(&mut self, entries: &mut HashMap<K, Entry<V>>, grace: Duration, now: Instant) -> usize {
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_collectable(grace, now));
        self.last_run = Some(now);
        before - entries.len()
    }
}
