// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Activity counters, optionally mirrored to an OpenTelemetry meter.

use std::sync::atomic::{AtomicU64, Ordering};

#[cfg(any(feature = "metrics", test))]
use opentelemetry::{
    KeyValue,
    metrics::{Counter, Meter},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CacheActivity {
    Hit,
    StaleHit,
    Miss,
    ProducerCall,
    ProducerError,
    Superseded,
    Write,
    Eviction,
    Sweep,
}

impl CacheActivity {
    #[cfg_attr(not(any(feature = "metrics", test)), expect(dead_code, reason = "only exported as a metric attribute"))]
    pub(crate) const fn as_str(self) -> &'static str {
        match self {
            Self::Hit => "memoflight.hit",
            Self::StaleHit => "memoflight.stale_hit",
            Self::Miss => "memoflight.miss",
            Self::ProducerCall => "memoflight.producer_call",
            Self::ProducerError => "memoflight.producer_error",
            Self::Superseded => "memoflight.superseded",
            Self::Write => "memoflight.write",
            Self::Eviction => "memoflight.eviction",
            Self::Sweep => "memoflight.sweep",
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct Counters {
    hits: AtomicU64,
    stale_hits: AtomicU64,
    misses: AtomicU64,
    producer_calls: AtomicU64,
    producer_errors: AtomicU64,
    superseded: AtomicU64,
    writes: AtomicU64,
    evictions: AtomicU64,
    sweeps: AtomicU64,
    #[cfg(any(feature = "metrics", test))]
    events: Option<Counter<u64>>,
}

impl Counters {
    /// Creates counters that also add every recorded activity to `meter`.
    #[cfg(any(feature = "metrics", test))]
    pub(crate) fn with_meter(meter: &Meter) -> Self {
        Self {
            events: Some(crate::metrics::create_event_counter(meter)),
            ..Self::default()
        }
    }

    pub(crate) fn record(&self, activity: CacheActivity) {
        self.record_many(activity, 1);
    }

    pub(crate) fn record_many(&self, activity: CacheActivity, count: u64) {
        if count == 0 {
            return;
        }

        #[cfg(any(feature = "metrics", test))]
        if let Some(events) = &self.events {
            events.add(count, &[KeyValue::new(crate::metrics::ACTIVITY_ATTRIBUTE, activity.as_str())]);
        }

        let counter = match activity {
            CacheActivity::Hit => &self.hits,
            CacheActivity::StaleHit => &self.stale_hits,
            CacheActivity::Miss => &self.misses,
            CacheActivity::ProducerCall => &self.producer_calls,
            CacheActivity::ProducerError => &self.producer_errors,
            CacheActivity::Superseded => &self.superseded,
            CacheActivity::Write => &self.writes,
            CacheActivity::Eviction => &self.evictions,
            CacheActivity::Sweep => &self.sweeps,
        };
        counter.fetch_add(count, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            stale_hits: self.stale_hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            producer_calls: self.producer_calls.load(Ordering::Relaxed),
            producer_errors: self.producer_errors.load(Ordering::Relaxed),
            superseded: self.superseded.load(Ordering::Relaxed),
            writes: self.writes.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            sweeps: self.sweeps.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of a cache's activity counters.
///
/// Counters are updated with relaxed ordering; a snapshot taken while other threads use the
/// cache is not guaranteed to be mutually consistent across fields.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[non_exhaustive]
pub struct CacheStats {
    /// Lookups answered with a fresh value.
    pub hits: u64,
    /// Lookups answered with a stale value inside the grace period.
    pub stale_hits: u64,
    /// Lookups that had to wait for (or failed to find) a producer result.
    pub misses: u64,
    /// Producer invocations started, including background refreshes.
    pub producer_calls: u64,
    /// Producer invocations that settled with an error or were abandoned.
    pub producer_errors: u64,
    /// Settlements discarded because an explicit write replaced their flight.
    pub superseded: u64,
    /// Explicit writes.
    pub writes: u64,
    /// Entries removed by the collector.
    pub evictions: u64,
    /// Collector sweeps performed.
    pub sweeps: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{metrics::ACTIVITY_ATTRIBUTE, testing::MetricTester};

    fn activity(activity: CacheActivity) -> KeyValue {
        KeyValue::new(ACTIVITY_ATTRIBUTE, activity.as_str())
    }

    #[test]
    fn record_updates_matching_counter() {
        let counters = Counters::default();

        counters.record(CacheActivity::Hit);
        counters.record(CacheActivity::Hit);
        counters.record(CacheActivity::Miss);
        counters.record_many(CacheActivity::Eviction, 5);

        let stats = counters.snapshot();
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.evictions, 5);
        assert_eq!(stats.producer_calls, 0);
    }

    #[test]
    fn meter_receives_each_activity() {
        let tester = MetricTester::new();
        let meter = crate::metrics::create_meter(tester.meter_provider());
        let counters = Counters::with_meter(&meter);

        counters.record(CacheActivity::Hit);
        counters.record(CacheActivity::Hit);
        counters.record(CacheActivity::ProducerError);
        counters.record_many(CacheActivity::Eviction, 3);

        assert_eq!(tester.event_count(&activity(CacheActivity::Hit)), 2);
        assert_eq!(tester.event_count(&activity(CacheActivity::ProducerError)), 1);
        assert_eq!(tester.event_count(&activity(CacheActivity::Eviction)), 3);
        assert_eq!(tester.event_count(&activity(CacheActivity::Miss)), 0);
        assert_eq!(counters.snapshot().hits, 2);
    }

    #[test]
    fn empty_batches_are_not_recorded() {
        let tester = MetricTester::new();
        let meter = crate::metrics::create_meter(tester.meter_provider());
        let counters = Counters::with_meter(&meter);

        counters.record_many(CacheActivity::Eviction, 0);

        assert_eq!(tester.event_count(&activity(CacheActivity::Eviction)), 0);
        assert_eq!(counters.snapshot(), CacheStats::default());
    }

    #[test]
    fn activity_names_are_distinct() {
        let all = [
            CacheActivity::Hit,
            CacheActivity::StaleHit,
            CacheActivity::Miss,
            CacheActivity::ProducerCall,
            CacheActivity::ProducerError,
            CacheActivity::Superseded,
            CacheActivity::Write,
            CacheActivity::Eviction,
            CacheActivity::Sweep,
        ];
        let names: std::collections::HashSet<_> = all.into_iter().map(CacheActivity::as_str).collect();
        assert_eq!(names.len(), all.len());
    }
}
